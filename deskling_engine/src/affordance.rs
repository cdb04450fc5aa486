// The affordance board: how mascots find interaction partners.
//
// A mascot may advertise at most one capability string at a time. ScanMove
// leaves query the board for a live advertiser of a configured capability
// and walk toward it. The board is a bounded slot table behind one mutex;
// every access is short and non-blocking, so it stays safe to consult from
// a parallel interpolation thread.
//
// Replacing or clearing a mascot's advertisement is an atomic swap under
// the lock: observers never see a mascot with two entries.

use crate::types::{EnvId, MascotId};
use deskling_prng::GameRng;
use std::sync::Mutex;
use tracing::debug;

#[derive(Clone, Debug)]
struct BoardEntry {
    mascot: MascotId,
    env: EnvId,
    affordance: String,
}

#[derive(Debug, Default)]
struct BoardInner {
    slots: Vec<Option<BoardEntry>>,
    occupied: u32,
}

/// Bounded, mutex-guarded advertisement table.
#[derive(Debug)]
pub struct AffordanceBoard {
    inner: Mutex<BoardInner>,
}

impl AffordanceBoard {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(BoardInner {
                slots: (0..capacity).map(|_| None).collect(),
                occupied: 0,
            }),
        }
    }

    /// Advertise a capability, replace the current advertisement, or clear
    /// it (`None`). A full board drops new advertisements silently.
    pub fn announce(&self, mascot: MascotId, env: EnvId, affordance: Option<&str>) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let existing = inner
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.mascot == mascot));
        match affordance {
            Some(affordance) => {
                debug!(mascot = %mascot, affordance, "announcing affordance");
                let entry = BoardEntry {
                    mascot,
                    env,
                    affordance: affordance.to_owned(),
                };
                if let Some(i) = existing {
                    inner.slots[i] = Some(entry);
                } else if let Some(i) = inner.slots.iter().position(Option::is_none) {
                    inner.slots[i] = Some(entry);
                    inner.occupied += 1;
                }
            }
            None => {
                if let Some(i) = existing {
                    debug!(mascot = %mascot, "withdrawing affordance");
                    inner.slots[i] = None;
                    inner.occupied -= 1;
                }
            }
        }
    }

    /// Remove a mascot's advertisement, if any.
    pub fn clear(&self, mascot: MascotId) {
        // env is ignored on the clearing path.
        self.announce(mascot, EnvId(0), None);
    }

    /// Whether a mascot currently advertises exactly this capability.
    pub fn advertises(&self, mascot: MascotId, affordance: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.slots.iter().any(|s| {
            s.as_ref()
                .is_some_and(|e| e.mascot == mascot && e.affordance == affordance)
        })
    }

    /// Pick a random mascot advertising `affordance`, excluding the
    /// requester. Candidates on other environments qualify only in unified
    /// mode.
    pub fn find_target(
        &self,
        rng: &mut GameRng,
        affordance: &str,
        requester: MascotId,
        requester_env: EnvId,
        unified: bool,
    ) -> Option<MascotId> {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.occupied == 0 {
            return None;
        }
        let candidates: Vec<MascotId> = inner
            .slots
            .iter()
            .filter_map(|s| s.as_ref())
            .filter(|e| {
                e.mascot != requester
                    && e.affordance == affordance
                    && (unified || e.env == requester_env)
            })
            .map(|e| e.mascot)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.index(candidates.len())])
    }

    pub fn occupied(&self) -> u32 {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).occupied
    }
}

// Behaviors and weighted behavior selection.
//
// A behavior names a root action and carries a selection weight. When a
// mascot's action stack fully resolves, the driver builds a pool from the
// species' root behavior list (plus the finished behavior's next list) and
// draws the next behavior weighted by frequency, conditions permitting.
//
// A behavior marked `is_group` is never selected itself: its condition
// gates the inclusion of its child list into the pool, recursively.

use crate::action::ActionNode;
use crate::mascot::Mascot;
use crate::script::{self, Expression, ScriptEngine};
use deskling_prng::GameRng;
use std::sync::Arc;
use tracing::warn;

/// A selectable top-level behavior.
#[derive(Clone, Debug)]
pub struct Behavior {
    pub name: String,
    /// Root action. Absent only on condition groups.
    pub action: Option<Arc<ActionNode>>,
    pub condition: Option<Arc<Expression>>,
    /// Default selection weight when referenced without one.
    pub weight: u64,
    /// Hidden behaviors are reachable only by name (interactions, hotspots),
    /// never by weighted selection.
    pub hidden: bool,
    /// Condition group: gates `next` into the pool instead of being
    /// selectable.
    pub is_group: bool,
    /// When this behavior completes, whether its `next` list extends the
    /// root list (true) or replaces it (false).
    pub add_next: bool,
    /// Behaviors offered after this one completes.
    pub next: Vec<BehaviorRef>,
}

impl Behavior {
    pub fn new(name: impl Into<String>, action: Arc<ActionNode>, weight: u64) -> Self {
        Self {
            name: name.into(),
            action: Some(action),
            condition: None,
            weight,
            hidden: false,
            is_group: false,
            add_next: true,
            next: Vec::new(),
        }
    }
}

/// A weighted reference to a behavior from a behavior list.
#[derive(Clone, Debug)]
pub struct BehaviorRef {
    pub behavior: Arc<Behavior>,
    pub weight: u64,
    pub condition: Option<Arc<Expression>>,
}

impl BehaviorRef {
    pub fn new(behavior: Arc<Behavior>) -> Self {
        let weight = behavior.weight;
        Self {
            behavior,
            weight,
            condition: None,
        }
    }

    pub fn weighted(behavior: Arc<Behavior>, weight: u64) -> Self {
        Self {
            behavior,
            weight,
            condition: None,
        }
    }
}

/// One entry of a mascot's current behavior pool.
#[derive(Clone, Debug)]
pub struct PoolEntry {
    pub behavior: Arc<Behavior>,
    pub weight: u64,
}

/// Weighted draw over the pool. Sums the weights of entries whose condition
/// passes, draws uniformly over the total, and walks the pool subtracting
/// weights until the draw is exhausted. Entries whose condition errors are
/// skipped with a warning rather than aborting selection.
pub(crate) fn select_from_pool(
    pool: &[PoolEntry],
    scripts: &dyn ScriptEngine,
    mascot: &Mascot,
    rng: &mut GameRng,
) -> Option<Arc<Behavior>> {
    let mut total: u64 = 0;
    for entry in pool {
        if entry.weight == 0 {
            continue;
        }
        match script::check_condition(scripts, mascot, entry.behavior.condition.as_ref()) {
            Ok(true) => total += entry.weight,
            Ok(false) => {}
            Err(e) => warn!(mascot = %mascot.id, behavior = %entry.behavior.name, error = %e, "behavior condition failed during selection"),
        }
    }
    if total == 0 {
        return None;
    }
    let mut roll = (rng.next_f64() * total as f64) as i64;
    for entry in pool {
        if entry.weight == 0 {
            continue;
        }
        match script::check_condition(scripts, mascot, entry.behavior.condition.as_ref()) {
            Ok(true) => {}
            _ => continue,
        }
        roll -= entry.weight as i64;
        if roll <= 0 {
            return Some(entry.behavior.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::prototype::MascotPrototype;
    use crate::testkit::StubScripts;
    use crate::types::{EnvId, MascotId, ProgramId, SurfaceId};

    fn mascot() -> Mascot {
        Mascot::new(
            MascotId(0),
            Arc::new(MascotPrototype::new("tabby")),
            EnvId(0),
            SurfaceId(0),
        )
    }

    fn entry(name: &str, weight: u64) -> PoolEntry {
        let behavior = Arc::new(Behavior::new(
            name,
            Arc::new(ActionNode::new(name, ActionKind::Animate)),
            weight,
        ));
        PoolEntry { behavior, weight }
    }

    #[test]
    fn zero_weight_entries_are_never_selected() {
        let pool = vec![entry("Walk", 10), entry("Never", 0)];
        let scripts = StubScripts::new();
        let m = mascot();
        let mut rng = deskling_prng::GameRng::new(7);
        for _ in 0..100 {
            let picked = select_from_pool(&pool, &scripts, &m, &mut rng);
            assert_eq!(picked.map(|b| b.name.clone()).as_deref(), Some("Walk"));
        }
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let scripts = StubScripts::new();
        let m = mascot();
        let mut rng = deskling_prng::GameRng::new(7);
        assert!(select_from_pool(&[], &scripts, &m, &mut rng).is_none());
        let all_zero = vec![entry("A", 0), entry("B", 0)];
        assert!(select_from_pool(&all_zero, &scripts, &m, &mut rng).is_none());
    }

    #[test]
    fn failing_condition_excludes_an_entry() {
        let mut blocked = entry("Blocked", 1000);
        let mut b = (*blocked.behavior).clone();
        b.condition = Some(Arc::new(Expression::new(ProgramId(1))));
        blocked.behavior = Arc::new(b);
        let pool = vec![blocked, entry("Walk", 1)];
        let scripts = StubScripts::new().with_value(ProgramId(1), 0.0);
        let m = mascot();
        let mut rng = deskling_prng::GameRng::new(7);
        for _ in 0..50 {
            let picked = select_from_pool(&pool, &scripts, &m, &mut rng);
            assert_eq!(picked.map(|b| b.name.clone()).as_deref(), Some("Walk"));
        }
    }

    #[test]
    fn all_positive_entries_are_reachable() {
        let pool = vec![entry("Walk", 5), entry("Sit", 5)];
        let scripts = StubScripts::new();
        let m = mascot();
        let mut rng = deskling_prng::GameRng::new(7);
        let mut saw_walk = false;
        let mut saw_sit = false;
        for _ in 0..200 {
            match select_from_pool(&pool, &scripts, &m, &mut rng)
                .map(|b| b.name.clone())
                .as_deref()
            {
                Some("Walk") => saw_walk = true,
                Some("Sit") => saw_sit = true,
                other => panic!("unexpected selection: {other:?}"),
            }
        }
        assert!(saw_walk && saw_sit);
    }

    #[test]
    fn selection_is_deterministic_under_a_seed() {
        let pool = vec![entry("Walk", 3), entry("Sit", 7), entry("Nap", 1)];
        let scripts = StubScripts::new();
        let m = mascot();
        let mut rng_a = deskling_prng::GameRng::new(99);
        let mut rng_b = deskling_prng::GameRng::new(99);
        for _ in 0..50 {
            let a = select_from_pool(&pool, &scripts, &m, &mut rng_a).map(|b| b.name.clone());
            let b = select_from_pool(&pool, &scripts, &m, &mut rng_b).map(|b| b.name.clone());
            assert_eq!(a, b);
        }
    }
}

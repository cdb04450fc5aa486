// Per-mascot state snapshots for client synchronization.
//
// A `MascotSnapshot` is everything an observing client needs to mirror one
// mascot: identity, species, engine state, current behavior/action names,
// the names on the action stack, position and facing, and the full variable
// slot table. The engine emits one per mascot per sync point; a
// `ColonyUpdate` bundles a whole tick.

use serde::{Deserialize, Serialize};

/// Coarse engine state of a mascot, as exposed to clients.
///
/// Mirrors the engine's internal state enum. Kept as its own type so the
/// wire format does not move when engine internals are refactored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotState {
    Idle,
    Stay,
    Move,
    Fall,
    Interact,
    Drag,
    DragResist,
    ScanMove,
    WindowFall,
    WindowWalk,
}

/// Value of one variable slot. The kind is implied by the variant: a slot's
/// numeric kind is fixed for the life of the mascot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SlotValue {
    Int(i32),
    Float(f32),
}

/// One variable slot: current value, whether an override marked it used,
/// and the id of the bound script (if any) so debugging clients can relate
/// a value back to the expression that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub value: SlotValue,
    pub used: bool,
    pub program: Option<u16>,
}

/// Complete observable state of one mascot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MascotSnapshot {
    pub id: u32,
    pub species: String,
    pub state: SnapshotState,
    /// Name of the current top-level behavior, if one is active.
    pub behavior: Option<String>,
    /// Name of the currently executing action, if one is active.
    pub action: Option<String>,
    /// Action names on the stack, outermost first. Does not include the
    /// currently executing action.
    pub action_stack: Vec<String>,
    pub x: i32,
    pub y: i32,
    pub facing_right: bool,
    /// Capability currently advertised for interaction, if any.
    pub affordance: Option<String>,
    /// Every variable slot, indexed by slot id.
    pub slots: Vec<SlotSnapshot>,
}

/// All mascots at one tick, as broadcast to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColonyUpdate {
    pub tick: u32,
    pub mascots: Vec<MascotSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> MascotSnapshot {
        MascotSnapshot {
            id: 3,
            species: "tabby".into(),
            state: SnapshotState::Fall,
            behavior: Some("Fall".into()),
            action: Some("Falling".into()),
            action_stack: vec!["FallSequence".into()],
            x: 120,
            y: 480,
            facing_right: false,
            affordance: Some("Cuddle".into()),
            slots: vec![
                SlotSnapshot {
                    value: SlotValue::Int(120),
                    used: false,
                    program: None,
                },
                SlotSnapshot {
                    value: SlotValue::Float(2.5),
                    used: true,
                    program: Some(17),
                },
            ],
        }
    }

    #[test]
    fn snapshot_roundtrip() {
        let snap = sample_snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let restored: MascotSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, restored);
    }

    #[test]
    fn colony_update_roundtrip() {
        let update = ColonyUpdate {
            tick: 90210,
            mascots: vec![sample_snapshot()],
        };
        let json = serde_json::to_string(&update).unwrap();
        let restored: ColonyUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(update, restored);
    }

    #[test]
    fn slot_value_distinguishes_kinds() {
        let int_json = serde_json::to_string(&SlotValue::Int(1)).unwrap();
        let float_json = serde_json::to_string(&SlotValue::Float(1.0)).unwrap();
        assert_ne!(int_json, float_json);
    }
}

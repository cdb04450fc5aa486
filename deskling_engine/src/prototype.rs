// Species prototypes and the prototype store.
//
// A prototype is the immutable definition of one species: its actions and
// behaviors by name, the root behavior list, the variable slot layout, and
// the designated recovery behaviors (fall, drag, thrown). Prototypes are
// loaded once by the configuration layer and shared by every mascot of the
// species.

use crate::action::ActionNode;
use crate::behavior::{Behavior, BehaviorRef};
use crate::variables::VarKind;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Immutable species definition.
#[derive(Clone, Debug)]
pub struct MascotPrototype {
    /// Internal species name, unique within the store.
    pub name: String,
    pub display_name: String,
    pub actions: FxHashMap<String, Arc<ActionNode>>,
    pub behaviors: FxHashMap<String, Arc<Behavior>>,
    /// Behaviors offered when no completed behavior constrains the choice.
    pub root_behaviors: Vec<BehaviorRef>,
    /// Forced when the mascot loses its footing or leaves the screen.
    pub fall_behavior: Option<Arc<Behavior>>,
    /// Forced when the user picks the mascot up.
    pub drag_behavior: Option<Arc<Behavior>>,
    /// Forced when the user releases a drag with velocity.
    pub thrown_behavior: Option<Arc<Behavior>>,
    /// Kinds of species-defined custom slots, appended after the named
    /// slots.
    pub extra_slots: Vec<VarKind>,
}

impl MascotPrototype {
    /// An empty prototype; the configuration layer fills in definitions.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            actions: FxHashMap::default(),
            behaviors: FxHashMap::default(),
            root_behaviors: Vec::new(),
            fall_behavior: None,
            drag_behavior: None,
            thrown_behavior: None,
            extra_slots: Vec::new(),
        }
    }

    pub fn behavior(&self, name: &str) -> Option<Arc<Behavior>> {
        self.behaviors.get(name).cloned()
    }

    pub fn action(&self, name: &str) -> Option<Arc<ActionNode>> {
        self.actions.get(name).cloned()
    }
}

/// Species lookup by name. Owned by the host; the engine only reads it
/// (Transform target lookups, Breed clone species).
#[derive(Clone, Debug, Default)]
pub struct PrototypeStore {
    by_name: FxHashMap<String, Arc<MascotPrototype>>,
}

impl PrototypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prototype: Arc<MascotPrototype>) {
        self.by_name.insert(prototype.name.clone(), prototype);
    }

    pub fn get(&self, name: &str) -> Option<Arc<MascotPrototype>> {
        self.by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

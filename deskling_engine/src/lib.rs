// deskling_engine — behavior-tree execution core for desktop mascots.
//
// This crate animates autonomous on-screen mascots by repeatedly
// evaluating a tree of reusable behavior fragments ("actions") against
// per-mascot state. Each mascot owns a stack of active actions; every
// tick the engine walks the stack, asks the active leaf to advance
// physics and animation, and asks every ancestor whether the branch
// should continue, restart, or yield to a sibling.
//
// Module overview:
// - `engine.rs`:      Colony, the tick driver, and transition semantics.
// - `actions/`:       The action kinds (leaves and structural) and their
//                     shared advance/recovery helpers.
// - `mascot.rs`:      Per-mascot runtime state and snapshots.
// - `action.rs`:      Immutable action nodes and call-site references.
// - `behavior.rs`:    Behaviors and weighted selection.
// - `variables.rs`:   The typed scripted-variable store and override
//                     resolution.
// - `animation.rs`:   Animations, poses, hotspots.
// - `affordance.rs`:  The mutex-guarded advertisement board.
// - `prototype.rs`:   Species definitions and the prototype store.
// - `environment.rs`: The display-layer trait boundary.
// - `script.rs`:      The expression-evaluator trait boundary.
// - `config.rs`:      Engine-wide feature toggles.
// - `types.rs`:       Ids, borders, transitions, geometry.
//
// The display layer, the expression VM, configuration loading, and the
// broadcast protocol are collaborators behind traits; this crate holds
// only the execution semantics. All randomness flows through the
// caller-owned `deskling_prng::GameRng`, so a seeded run replays
// identically.

pub mod action;
pub mod affordance;
pub mod animation;
pub mod behavior;
pub mod config;
pub mod engine;
pub mod environment;
pub mod mascot;
pub mod prototype;
pub mod script;
pub mod types;
pub mod variables;

mod actions;

#[cfg(test)]
pub(crate) mod testkit;

pub use action::{ActionContent, ActionKind, ActionNode, ActionRef};
pub use affordance::AffordanceBoard;
pub use animation::{Animation, Hotspot, HotspotButton, HotspotShape, Pose};
pub use behavior::{Behavior, BehaviorRef};
pub use config::EngineConfig;
pub use engine::{Colony, SpawnParams, TickCtx, TickError};
pub use environment::{Environment, ForeignWindow, flip_y};
pub use mascot::{Mascot, MAX_STACK_DEPTH};
pub use prototype::{MascotPrototype, PrototypeStore};
pub use script::{Expression, ScriptEngine, ScriptError};
pub use types::{
    Border, BoundingBox, EnvId, MascotId, MascotState, MoveReply, MoveStatus, ProgramId,
    SurfaceId, TickEvent, Transition,
};
pub use variables::{Slot, VarBinding, VarKind, VarValue, VariableStore};

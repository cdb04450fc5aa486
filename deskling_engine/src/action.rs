// Action nodes and action references.
//
// An `ActionNode` is the immutable, shared definition of one reusable
// behavior fragment, loaded once from configuration and pointed at by every
// mascot that runs it (`Arc`, never cloned per mascot). An `ActionRef` is a
// call-site binding of a node: the same node can be reused from different
// places in the tree with a different guard, duration limit, or variable
// overrides.
//
// Invariant: leaf kinds hold only animations in their content; the
// structural kinds (Sequence, Select) hold only actions and references.
// Violations are configuration defects and surface as structural errors at
// run time.

use crate::animation::Animation;
use crate::script::Expression;
use crate::types::Border;
use crate::variables::VarTable;
use std::sync::Arc;

/// Exhaustive action kind tag. Dispatch is a `match` over this enum, so a
/// new kind fails to compile until every handler covers it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    /// Baseline leaf: play animations, drift by the pose velocity.
    Animate,
    /// Structural: run children in order, resuming where it left off.
    Sequence,
    /// Structural: re-scan children each activation, run the first eligible.
    Select,
    /// Walk toward scripted target coordinates.
    Move,
    /// Gravity/drag integration until a surface opposes the velocity.
    Fall,
    /// Spawn clones at a scripted interval, up to a scripted count.
    Breed,
    /// Swap this mascot to another species.
    Transform,
    /// Hold a visible interaction state (partner of an affordance match).
    Interact,
    /// Struggle against a drag grab; escapes when the user persists.
    Resist,
    /// One-shot position delta, then immediately done.
    Offset,
    /// Seek a mascot advertising an affordance and start an interaction.
    ScanMove,
    /// Fall while carrying the foreign window.
    WindowFall,
    /// Walk while carrying the foreign window.
    WindowWalk,
}

impl ActionKind {
    pub fn is_structural(self) -> bool {
        matches!(self, ActionKind::Sequence | ActionKind::Select)
    }
}

/// One entry of a node's ordered content list.
#[derive(Clone, Debug)]
pub enum ActionContent {
    Animation(Arc<Animation>),
    /// A nested node used with its own defaults.
    Action(Arc<ActionNode>),
    /// A parameterized use of a shared node.
    Reference(ActionRef),
}

/// Immutable, shared definition of one action.
#[derive(Clone, Debug)]
pub struct ActionNode {
    pub name: String,
    pub kind: ActionKind,
    pub content: Vec<ActionContent>,
    /// Required terrain under the mascot; `None` means any.
    pub border: Option<Border>,
    pub condition: Option<Arc<Expression>>,
    pub loops: bool,
    /// Capability string advertised while this action runs.
    pub affordance: Option<String>,
    /// Default variable bindings, indexed by slot id.
    pub defaults: VarTable,
    /// Behavior this mascot takes when an interaction is established
    /// (ScanMove initiator side).
    pub behavior: Option<String>,
    /// Behavior assigned to the interaction partner, or resumed after a
    /// transform.
    pub target_behavior: Option<String>,
    /// Behavior a Breed clone starts with.
    pub born_behavior: Option<String>,
    /// Species a Breed clone belongs to; `None` clones the parent species.
    pub born_species: Option<String>,
    /// Species a Transform turns this mascot into.
    pub transform_species: Option<String>,
    /// Flip the interaction partner's facing when it matches ours.
    pub target_look: bool,
}

impl ActionNode {
    /// A bare node of the given kind; callers fill in what they need.
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            content: Vec::new(),
            border: None,
            condition: None,
            loops: false,
            affordance: None,
            defaults: VarTable::new(),
            behavior: None,
            target_behavior: None,
            born_behavior: None,
            born_species: None,
            transform_species: None,
            target_look: false,
        }
    }
}

/// A call-site binding of an action node. Cheap to clone; the driver copies
/// it freely while walking the stack.
#[derive(Clone, Debug)]
pub struct ActionRef {
    pub node: Arc<ActionNode>,
    /// Overriding guard; falls back to the node's own condition.
    pub condition: Option<Arc<Expression>>,
    /// Duration-limit script evaluated at init.
    pub duration: Option<Arc<Expression>>,
    /// Sparse per-slot overrides; an entry applies only when marked used.
    pub overrides: Arc<VarTable>,
}

impl ActionRef {
    /// A reference with no call-site parameters.
    pub fn plain(node: Arc<ActionNode>) -> Self {
        Self {
            node,
            condition: None,
            duration: None,
            overrides: Arc::new(VarTable::new()),
        }
    }

    /// The guard that applies at this call site: the override when present,
    /// else the node's own condition.
    pub fn effective_condition(&self) -> Option<&Arc<Expression>> {
        self.condition.as_ref().or(self.node.condition.as_ref())
    }

    pub fn same_node(&self, other: &ActionRef) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

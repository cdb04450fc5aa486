// Per-mascot runtime state.
//
// A `Mascot` is one animated agent: its species prototype, its variable
// slots, the active action-reference stack, the current behavior and
// animation, and the bookkeeping the action kinds lean on (frame timers,
// duration deadlines, breed counters, drag flags). The tick driver in
// `engine.rs` mutates this; nothing here runs behavior by itself.

use crate::action::ActionRef;
use crate::affordance::AffordanceBoard;
use crate::animation::{Animation, Hotspot, Pose};
use crate::behavior::{Behavior, PoolEntry};
use crate::environment::Environment;
use crate::prototype::MascotPrototype;
use crate::script::{Expression, ScriptEngine, ScriptError};
use crate::types::{EnvId, MascotId, MascotState, SurfaceId};
use crate::variables::{Slot, VarBinding, VarValue, VariableStore};
use deskling_protocol::{MascotSnapshot, SlotSnapshot, SlotValue, SnapshotState};
use std::sync::Arc;

/// Deepest allowed action-reference nesting. Exceeding it is a
/// configuration defect.
pub const MAX_STACK_DEPTH: usize = 128;

/// The guard condition latched when an action initializes. `evaluated`
/// carries the evaluate-once flag: a latched condition is not re-run on
/// later ticks.
#[derive(Clone, Debug, Default)]
pub struct ConditionCache {
    pub expr: Option<Arc<Expression>>,
    pub evaluated: bool,
}

/// One suspended ancestor on the action stack: the reference that was
/// running plus the content index to resume it at.
#[derive(Clone, Debug)]
pub struct StackFrame {
    pub action: ActionRef,
    pub resume_index: u16,
}

/// One live mascot.
#[derive(Debug)]
pub struct Mascot {
    pub id: MascotId,
    pub prototype: Arc<MascotPrototype>,
    pub env: EnvId,
    pub surface: SurfaceId,
    pub state: MascotState,
    pub vars: VariableStore,

    /// Suspended ancestors, outermost first. The innermost executing leaf
    /// is `current_action`, not a stack entry.
    pub stack: Vec<StackFrame>,
    pub current_action: Option<ActionRef>,
    pub current_behavior: Option<Arc<Behavior>>,
    pub current_animation: Option<Arc<Animation>>,
    pub current_condition: ConditionCache,
    pub behavior_pool: Vec<PoolEntry>,

    /// Resume index of the structural action currently executing.
    pub action_index: u16,
    pub animation_index: u16,
    pub frame_index: u16,
    /// Tick at which the displayed frame expires.
    pub next_frame_tick: u32,
    /// Duration deadline in ticks; 0 means unset.
    pub action_duration: u32,
    /// Tick at which the current action was entered.
    pub action_tick: u32,

    /// Interaction partner targeted by ScanMove.
    pub target_mascot: Option<MascotId>,
    /// Capability currently advertised on the board, mirrored here.
    pub current_affordance: Option<String>,

    pub dragged: bool,
    pub dragged_tick: u32,
    pub hotspot_active: bool,
    pub hotspot_behavior: Option<Arc<Behavior>>,

    /// Clones produced by the current Breed action.
    pub born_count: u16,
    /// Tick of the last clone, for interval pacing.
    pub born_tick: u32,
}

impl Mascot {
    pub(crate) fn new(
        id: MascotId,
        prototype: Arc<MascotPrototype>,
        env: EnvId,
        surface: SurfaceId,
    ) -> Self {
        let vars = VariableStore::with_layout(&prototype.extra_slots);
        Self {
            id,
            prototype,
            env,
            surface,
            state: MascotState::Idle,
            vars,
            stack: Vec::new(),
            current_action: None,
            current_behavior: None,
            current_animation: None,
            current_condition: ConditionCache::default(),
            behavior_pool: Vec::new(),
            action_index: 0,
            animation_index: 0,
            frame_index: 0,
            next_frame_tick: 0,
            action_duration: 0,
            action_tick: 0,
            target_mascot: None,
            current_affordance: None,
            dragged: false,
            dragged_tick: 0,
            hotspot_active: false,
            hotspot_behavior: None,
            born_count: 0,
            born_tick: 0,
        }
    }

    /// Swap this mascot to another species in place, keeping identity,
    /// environment, and surface. Variables, stacks, and behavior state all
    /// reset; the caller restores what should survive (position, facing).
    pub(crate) fn reinit(&mut self, prototype: Arc<MascotPrototype>, board: &AffordanceBoard) {
        board.clear(self.id);
        self.vars = VariableStore::with_layout(&prototype.extra_slots);
        self.prototype = prototype;
        self.state = MascotState::Idle;
        self.stack.clear();
        self.current_action = None;
        self.current_behavior = None;
        self.current_animation = None;
        self.current_condition = ConditionCache::default();
        self.behavior_pool.clear();
        self.action_index = 0;
        self.animation_index = 0;
        self.frame_index = 0;
        self.next_frame_tick = 0;
        self.action_duration = 0;
        self.target_mascot = None;
        self.current_affordance = None;
        self.dragged = false;
        self.hotspot_active = false;
        self.hotspot_behavior = None;
        self.born_count = 0;
        self.born_tick = 0;
    }

    // -----------------------------------------------------------------
    // Position and facing
    // -----------------------------------------------------------------

    pub fn x(&self) -> i32 {
        self.vars.get_i(Slot::X)
    }

    pub fn y(&self) -> i32 {
        self.vars.get_i(Slot::Y)
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.vars.set_i(Slot::X, x);
        self.vars.set_i(Slot::Y, y);
    }

    pub fn facing_right(&self) -> bool {
        self.vars.get_i(Slot::FacingRight) != 0
    }

    pub fn set_facing_right(&mut self, facing_right: bool) {
        self.vars.set_i(Slot::FacingRight, i32::from(facing_right));
    }

    pub fn velocity(&self) -> (f32, f32) {
        (
            self.vars.get_f(Slot::VelocityX),
            self.vars.get_f(Slot::VelocityY),
        )
    }

    /// Shift position (and live targets) when the environment's origin
    /// moves within the unified coordinate space.
    pub fn apply_environment_offset(&mut self, dx: i32, dy: i32) {
        if dx != 0 {
            self.vars.set_i(Slot::X, self.x() + dx);
            if self.vars.get_i(Slot::TargetX) != -1 {
                let tx = self.vars.get_i(Slot::TargetX);
                self.vars.set_i(Slot::TargetX, tx + dx);
            }
        }
        if dy != 0 {
            self.vars.set_i(Slot::Y, self.y() + dy);
            if self.vars.get_i(Slot::TargetY) != -1 {
                let ty = self.vars.get_i(Slot::TargetY);
                self.vars.set_i(Slot::TargetY, ty + dy);
            }
        }
    }

    // -----------------------------------------------------------------
    // Pose handling
    // -----------------------------------------------------------------

    /// Present a pose and start its frame timer. Outside the airborne
    /// states the pose's velocity becomes the mascot's velocity; while
    /// falling the integrator owns the velocity slots.
    pub(crate) fn attach_pose(&mut self, env: &mut dyn Environment, pose: &Pose, tick: u32) {
        env.present_pose(self.surface, pose, self.facing_right());
        self.next_frame_tick = tick + pose.duration;
        if !self.state.is_airborne() {
            self.vars.set_f(Slot::VelocityX, pose.velocity_x as f32);
            self.vars.set_f(Slot::VelocityY, pose.velocity_y as f32);
        }
    }

    /// Re-present the current frame, used when facing flips mid-animation.
    pub(crate) fn reattach_pose(&mut self, env: &mut dyn Environment) {
        let Some(animation) = self.current_animation.clone() else {
            return;
        };
        if self.frame_index == 0 {
            return;
        }
        let Some(pose) = animation.frames.get(self.frame_index as usize - 1).copied() else {
            return;
        };
        env.present_pose(self.surface, &pose, self.facing_right());
    }

    // -----------------------------------------------------------------
    // Variables
    // -----------------------------------------------------------------

    /// Copy a binding into a live slot and, when it carries a script,
    /// evaluate it immediately and store the result by the slot's kind.
    /// Script failure is a hard error for the owning action's init.
    pub(crate) fn adopt_variable(
        &mut self,
        slot: Slot,
        binding: &VarBinding,
        scripts: &dyn ScriptEngine,
    ) -> Result<(), ScriptError> {
        self.vars.adopt(slot, binding);
        self.execute_slot(slot, scripts)
    }

    /// Evaluate a slot's bound script, if the slot is marked used.
    pub(crate) fn execute_slot(
        &mut self,
        slot: Slot,
        scripts: &dyn ScriptEngine,
    ) -> Result<(), ScriptError> {
        let s = self.vars.slot(slot);
        if !s.used {
            return Ok(());
        }
        let Some(expr) = s.expr.clone() else {
            return Ok(());
        };
        let result = scripts.evaluate(expr.program, self)?;
        self.vars.store_result(slot, result);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Affordances and hotspots
    // -----------------------------------------------------------------

    pub(crate) fn announce_affordance(&mut self, board: &AffordanceBoard, affordance: Option<&str>) {
        self.current_affordance = affordance.map(str::to_owned);
        board.announce(self.id, self.env, affordance);
    }

    /// The hotspot under a surface-local point on the current animation,
    /// if its bound behavior exists.
    pub fn hotspot_at(&self, x: i32, y: i32) -> Option<&Hotspot> {
        let animation = self.current_animation.as_ref()?;
        animation
            .hotspots
            .iter()
            .find(|h| h.contains(x, y) && self.prototype.behavior(&h.behavior).is_some())
    }

    // -----------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------

    /// Serializable state for the outward-facing protocol layer.
    pub fn snapshot(&self) -> MascotSnapshot {
        MascotSnapshot {
            id: self.id.0,
            species: self.prototype.name.clone(),
            state: snapshot_state(self.state),
            behavior: self.current_behavior.as_ref().map(|b| b.name.clone()),
            action: self.current_action.as_ref().map(|a| a.node.name.clone()),
            action_stack: self
                .stack
                .iter()
                .map(|f| f.action.node.name.clone())
                .collect(),
            x: self.x(),
            y: self.y(),
            facing_right: self.facing_right(),
            affordance: self.current_affordance.clone(),
            slots: self
                .vars
                .iter()
                .map(|s| SlotSnapshot {
                    value: match s.value {
                        VarValue::Int(v) => SlotValue::Int(v),
                        VarValue::Float(v) => SlotValue::Float(v),
                    },
                    used: s.used,
                    program: s.expr.as_ref().map(|e| e.program.0),
                })
                .collect(),
        }
    }
}

fn snapshot_state(state: MascotState) -> SnapshotState {
    match state {
        MascotState::Idle => SnapshotState::Idle,
        MascotState::Stay => SnapshotState::Stay,
        MascotState::Move => SnapshotState::Move,
        MascotState::Fall => SnapshotState::Fall,
        MascotState::Interact => SnapshotState::Interact,
        MascotState::Drag => SnapshotState::Drag,
        MascotState::DragResist => SnapshotState::DragResist,
        MascotState::ScanMove => SnapshotState::ScanMove,
        MascotState::WindowFall => SnapshotState::WindowFall,
        MascotState::WindowWalk => SnapshotState::WindowWalk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{StubScripts, proto};
    use crate::types::ProgramId;
    use crate::variables::VarKind as VK;

    fn mascot() -> Mascot {
        Mascot::new(MascotId(1), proto("tabby"), EnvId(0), SurfaceId(0))
    }

    #[test]
    fn position_accessors() {
        let mut m = mascot();
        m.set_position(30, 40);
        assert_eq!((m.x(), m.y()), (30, 40));
    }

    #[test]
    fn facing_round_trips_through_slot() {
        let mut m = mascot();
        assert!(!m.facing_right());
        m.set_facing_right(true);
        assert!(m.facing_right());
        assert_eq!(m.vars.get_i(Slot::FacingRight), 1);
    }

    #[test]
    fn adopt_variable_evaluates_script() {
        let mut m = mascot();
        let scripts = StubScripts::new().with_value(ProgramId(9), 123.7);
        let binding = VarBinding::scripted(Arc::new(Expression::new(ProgramId(9))));
        m.adopt_variable(Slot::TargetX, &binding, &scripts).unwrap();
        // TargetX is an int slot: the scripted result truncates.
        assert_eq!(m.vars.get_i(Slot::TargetX), 123);
    }

    #[test]
    fn adopt_variable_surfaces_script_failure() {
        let mut m = mascot();
        let scripts = StubScripts::new().with_error(ProgramId(9));
        let binding = VarBinding::scripted(Arc::new(Expression::new(ProgramId(9))));
        assert!(m.adopt_variable(Slot::TargetX, &binding, &scripts).is_err());
    }

    #[test]
    fn environment_offset_moves_live_targets_only() {
        let mut m = mascot();
        m.set_position(10, 20);
        m.vars.set_i(Slot::TargetX, 100);
        m.vars.set_i(Slot::TargetY, -1);
        m.apply_environment_offset(5, 7);
        assert_eq!((m.x(), m.y()), (15, 27));
        assert_eq!(m.vars.get_i(Slot::TargetX), 105);
        // The unset sentinel must not shift.
        assert_eq!(m.vars.get_i(Slot::TargetY), -1);
    }

    #[test]
    fn snapshot_carries_slots_and_names() {
        let mut m = mascot();
        m.set_position(3, 4);
        m.vars
            .adopt(Slot::Gravity, &VarBinding::literal(VarValue::Float(2.0)));
        let snap = m.snapshot();
        assert_eq!(snap.species, "tabby");
        assert_eq!((snap.x, snap.y), (3, 4));
        assert_eq!(snap.slots.len(), m.vars.len());
        assert!(snap.slots[Slot::Gravity.index()].used);
        assert_eq!(snap.behavior, None);
    }

    #[test]
    fn reinit_resets_state_but_keeps_identity() {
        let mut m = mascot();
        let board = AffordanceBoard::new(4);
        m.set_position(9, 9);
        m.born_count = 3;
        m.announce_affordance(&board, Some("Climb"));

        let mut other = MascotPrototype::new("calico");
        other.extra_slots = vec![VK::Float];
        m.reinit(Arc::new(other), &board);

        assert_eq!(m.id, MascotId(1));
        assert_eq!(m.prototype.name, "calico");
        assert_eq!(m.born_count, 0);
        assert_eq!(m.x(), 0);
        assert!(!board.advertises(MascotId(1), "Climb"));
        assert_eq!(m.vars.len(), crate::variables::SLOT_COUNT + 1);
    }
}

// Shared test fixtures: a scriptable stub evaluator, a stub display
// layer, prototype builders, and a bundled world that wires a colony to
// all of them.

use crate::action::{ActionContent, ActionKind, ActionNode};
use crate::affordance::AffordanceBoard;
use crate::animation::{Animation, Pose};
use crate::behavior::{Behavior, BehaviorRef};
use crate::config::EngineConfig;
use crate::engine::{Colony, SpawnParams, TickCtx, TickError};
use crate::environment::{Environment, ForeignWindow};
use crate::mascot::Mascot;
use crate::prototype::{MascotPrototype, PrototypeStore};
use crate::script::{ScriptEngine, ScriptError};
use crate::types::{
    Border, BoundingBox, EnvId, MascotId, MoveReply, MoveStatus, ProgramId, SurfaceId, TickEvent,
};
use deskling_prng::GameRng;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Stub script engine
// ---------------------------------------------------------------------------

/// Evaluator stub: programs map to fixed values or failures; unknown
/// programs evaluate to 1.0 (a passing condition). Call counts are
/// recorded for evaluate-once assertions.
pub(crate) struct StubScripts {
    values: RefCell<HashMap<u16, Result<f32, ()>>>,
    calls: RefCell<HashMap<u16, u32>>,
}

impl StubScripts {
    pub(crate) fn new() -> Self {
        Self {
            values: RefCell::new(HashMap::new()),
            calls: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn with_value(self, program: ProgramId, value: f32) -> Self {
        self.values.borrow_mut().insert(program.0, Ok(value));
        self
    }

    pub(crate) fn with_error(self, program: ProgramId) -> Self {
        self.values.borrow_mut().insert(program.0, Err(()));
        self
    }

    pub(crate) fn set_value(&self, program: ProgramId, value: f32) {
        self.values.borrow_mut().insert(program.0, Ok(value));
    }

    pub(crate) fn calls(&self, program: ProgramId) -> u32 {
        self.calls.borrow().get(&program.0).copied().unwrap_or(0)
    }
}

impl ScriptEngine for StubScripts {
    fn evaluate(&self, program: ProgramId, _mascot: &Mascot) -> Result<f32, ScriptError> {
        *self.calls.borrow_mut().entry(program.0).or_insert(0) += 1;
        match self.values.borrow().get(&program.0) {
            None => Ok(1.0),
            Some(Ok(v)) => Ok(*v),
            Some(Err(())) => Err(ScriptError {
                program,
                message: "stub failure".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Stub environment
// ---------------------------------------------------------------------------

/// Display-layer stub over a single 1920x1080 output. Moves clamp into the
/// work area; every move and presented pose is logged for assertions.
pub(crate) struct StubEnv {
    pub screen: (i32, i32),
    pub area: BoundingBox,
    pub scale: f32,
    /// Terrain reported everywhere (unless `floor_at_zero` applies).
    pub border: Border,
    /// Report `Floor` for any point with y <= 0.
    pub floor_at_zero: bool,
    pub window: Option<ForeignWindow>,
    pub window_movable: bool,
    pub pointer_deltas: VecDeque<(i32, i32)>,
    pub moves: Vec<(SurfaceId, i32, i32)>,
    pub window_moves: Vec<(i32, i32)>,
    pub presented: Vec<(SurfaceId, u32, bool)>,
    pub released: Vec<SurfaceId>,
    next_surface: u32,
}

impl StubEnv {
    pub(crate) fn new() -> Self {
        Self {
            screen: (1920, 1080),
            area: BoundingBox::new(0, 0, 1920, 1080),
            scale: 1.0,
            border: Border::None,
            floor_at_zero: false,
            window: None,
            window_movable: true,
            pointer_deltas: VecDeque::new(),
            moves: Vec::new(),
            window_moves: Vec::new(),
            presented: Vec::new(),
            released: Vec::new(),
            next_surface: 0,
        }
    }
}

impl Environment for StubEnv {
    fn border_type(&self, _env: EnvId, _x: i32, y: i32) -> Border {
        if self.floor_at_zero && y <= 0 {
            return Border::Floor;
        }
        self.border
    }

    fn screen_size(&self, _env: EnvId) -> (i32, i32) {
        self.screen
    }

    fn workarea(&self, _env: EnvId) -> BoundingBox {
        self.area
    }

    fn screen_scale(&self, _env: EnvId) -> f32 {
        self.scale
    }

    fn coordinate_delta(&self, _from: EnvId, _to: EnvId) -> (i32, i32) {
        (0, 0)
    }

    fn create_surface(&mut self, _env: EnvId) -> SurfaceId {
        let id = SurfaceId(self.next_surface);
        self.next_surface += 1;
        id
    }

    fn destroy_surface(&mut self, _surface: SurfaceId) {}

    fn present_pose(&mut self, surface: SurfaceId, pose: &Pose, facing_right: bool) {
        self.presented.push((surface, pose.sprite, facing_right));
    }

    fn move_surface(&mut self, surface: SurfaceId, x: i32, y: i32, _interpolate: bool) -> MoveReply {
        let cx = x.clamp(self.area.left(), self.area.right());
        let cy = y.clamp(self.area.bottom(), self.area.top());
        self.moves.push((surface, cx, cy));
        let status = if cx == x && cy == y {
            MoveStatus::Ok
        } else {
            MoveStatus::Clamped
        };
        MoveReply { status, x: cx, y: cy }
    }

    fn place_surface(&mut self, surface: SurfaceId, x: i32, y: i32) {
        self.moves.push((surface, x, y));
    }

    fn reset_interpolation(&mut self, _surface: SurfaceId) {}

    fn release_surface(&mut self, surface: SurfaceId) {
        self.released.push(surface);
    }

    fn pointer_delta(&mut self, _surface: SurfaceId, _tick: u32) -> (i32, i32) {
        self.pointer_deltas.pop_front().unwrap_or((0, 0))
    }

    fn foreign_window(&self, _env: EnvId) -> Option<ForeignWindow> {
        self.window
    }

    fn move_foreign_window(&mut self, _env: EnvId, x: i32, y: i32) -> MoveStatus {
        self.window_moves.push((x, y));
        MoveStatus::Ok
    }

    fn foreign_window_movable(&self, _env: EnvId) -> bool {
        self.window_movable
    }
}

// ---------------------------------------------------------------------------
// Definition builders
// ---------------------------------------------------------------------------

pub(crate) fn pose(duration: u32) -> Pose {
    Pose {
        sprite: 0,
        anchor_x: 0,
        anchor_y: 0,
        velocity_x: 0,
        velocity_y: 0,
        duration,
    }
}

pub(crate) fn pose_vel(duration: u32, velocity_x: i32, velocity_y: i32) -> Pose {
    Pose {
        velocity_x,
        velocity_y,
        ..pose(duration)
    }
}

pub(crate) fn pose_sprite(sprite: u32, duration: u32) -> Pose {
    Pose {
        sprite,
        ..pose(duration)
    }
}

pub(crate) fn animation(frames: Vec<Pose>) -> Arc<Animation> {
    Arc::new(Animation::new(frames))
}

/// A leaf node holding the given animations.
pub(crate) fn leaf(name: &str, kind: ActionKind, animations: Vec<Arc<Animation>>) -> ActionNode {
    let mut node = ActionNode::new(name, kind);
    node.content = animations.into_iter().map(ActionContent::Animation).collect();
    node
}

/// A one-animation Animate leaf with a single long frame.
pub(crate) fn idle_leaf(name: &str) -> ActionNode {
    let mut node = leaf(name, ActionKind::Animate, vec![animation(vec![pose(1)])]);
    node.loops = true;
    node
}

/// A bare prototype with no behaviors.
pub(crate) fn proto(name: &str) -> Arc<MascotPrototype> {
    Arc::new(MascotPrototype::new(name))
}

/// Prototype builder: registers behaviors, wires the root list, and marks
/// the designated fall behavior.
pub(crate) struct ProtoBuilder {
    proto: MascotPrototype,
}

impl ProtoBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            proto: MascotPrototype::new(name),
        }
    }

    /// Register a selectable behavior and offer it from the root list.
    pub(crate) fn behavior(mut self, behavior: Behavior) -> Self {
        let behavior = Arc::new(behavior);
        self.proto
            .behaviors
            .insert(behavior.name.clone(), behavior.clone());
        self.proto.root_behaviors.push(BehaviorRef::new(behavior));
        self
    }

    /// Register a behavior reachable only by name.
    pub(crate) fn hidden_behavior(mut self, mut behavior: Behavior) -> Self {
        behavior.hidden = true;
        let behavior = Arc::new(behavior);
        self.proto
            .behaviors
            .insert(behavior.name.clone(), behavior.clone());
        self
    }

    /// Register a Fall-rooted behavior and designate it as the species'
    /// fall recovery.
    pub(crate) fn fall(mut self, node: ActionNode) -> Self {
        let behavior = Arc::new(Behavior::new("Fall", Arc::new(node), 0));
        self.proto
            .behaviors
            .insert(behavior.name.clone(), behavior.clone());
        self.proto.fall_behavior = Some(behavior);
        self
    }

    pub(crate) fn drag(mut self, node: ActionNode) -> Self {
        let behavior = Arc::new(Behavior::new("Drag", Arc::new(node), 0));
        self.proto
            .behaviors
            .insert(behavior.name.clone(), behavior.clone());
        self.proto.drag_behavior = Some(behavior);
        self
    }

    pub(crate) fn build(self) -> Arc<MascotPrototype> {
        Arc::new(self.proto)
    }
}

/// A Fall leaf with one one-frame animation, suitable as a designated
/// fall behavior.
pub(crate) fn fall_node() -> ActionNode {
    leaf("Falling", ActionKind::Fall, vec![animation(vec![pose(1)])])
}

// ---------------------------------------------------------------------------
// Bundled world
// ---------------------------------------------------------------------------

/// A colony wired to stub collaborators, with helpers to run ticks and
/// engine entry points without hand-building a `TickCtx` each time.
pub(crate) struct TestWorld {
    pub env: StubEnv,
    pub scripts: StubScripts,
    pub prototypes: PrototypeStore,
    pub board: AffordanceBoard,
    pub config: EngineConfig,
    pub rng: GameRng,
    pub colony: Colony,
}

impl TestWorld {
    pub(crate) fn new() -> Self {
        Self {
            env: StubEnv::new(),
            scripts: StubScripts::new(),
            prototypes: PrototypeStore::new(),
            board: AffordanceBoard::new(16),
            config: EngineConfig::default(),
            rng: GameRng::new(42),
            colony: Colony::new(),
        }
    }

    pub(crate) fn spawn(&mut self, params: SpawnParams) -> MascotId {
        let mut ctx = TickCtx {
            tick: 0,
            env: &mut self.env,
            scripts: &self.scripts,
            prototypes: &self.prototypes,
            board: &self.board,
            config: &self.config,
            rng: &mut self.rng,
            population: 0,
        };
        self.colony.spawn(&mut ctx, params)
    }

    pub(crate) fn tick(&mut self, tick: u32) -> (Vec<TickEvent>, Vec<(MascotId, TickError)>) {
        let mut ctx = TickCtx {
            tick,
            env: &mut self.env,
            scripts: &self.scripts,
            prototypes: &self.prototypes,
            board: &self.board,
            config: &self.config,
            rng: &mut self.rng,
            population: 0,
        };
        self.colony.tick_all(&mut ctx)
    }

    /// Run ticks `[from, to)` in order, asserting none of them errors.
    pub(crate) fn run(&mut self, from: u32, to: u32) -> Vec<TickEvent> {
        let mut events = Vec::new();
        for t in from..to {
            let (mut evts, errors) = self.tick(t);
            assert!(errors.is_empty(), "tick {t} errored: {errors:?}");
            events.append(&mut evts);
        }
        events
    }

    /// Call into the colony with a fully wired context.
    pub(crate) fn with_ctx<R>(&mut self, f: impl FnOnce(&mut Colony, &mut TickCtx) -> R) -> R {
        let mut ctx = TickCtx {
            tick: 0,
            env: &mut self.env,
            scripts: &self.scripts,
            prototypes: &self.prototypes,
            board: &self.board,
            config: &self.config,
            rng: &mut self.rng,
            population: 0,
        };
        f(&mut self.colony, &mut ctx)
    }

    pub(crate) fn mascot(&self, id: MascotId) -> &Mascot {
        self.colony.get(id).expect("mascot exists")
    }
}

// The execution engine: colony, tick driver, and transition semantics.
//
// The driver walks one mascot at a time. Each tick it asks the active leaf
// to advance (`next`), interprets the returned transition, runs the leaf's
// physics step when the tick is stable, and performs the stack surgery the
// structural kinds ask for. Everything re-enters within the same tick until
// a stable state is reached, bounded by `MAX_REENTRIES`.
//
// Transition interpretation:
// - `Continue`: run the physics step, stay on this frame.
// - `Next`: pop one stack frame and resume the parent, or consult the
//   behavior selector when the root finished.
// - `Reenter`: redo the walk with updated state, same tick.
// - `Clone`, `Transform`, `Escape`: handled at the top of the tick loop.
//
// The colony owns all live mascots. While one mascot ticks it is taken out
// of the map, so cross-mascot actions (ScanMove) can freely address the
// rest of the colony without aliasing.

use crate::action::{ActionKind, ActionRef};
use crate::actions::dispatch;
use crate::affordance::AffordanceBoard;
use crate::behavior::{self, Behavior, BehaviorRef, PoolEntry};
use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::mascot::{ConditionCache, MAX_STACK_DEPTH, Mascot, StackFrame};
use crate::prototype::{MascotPrototype, PrototypeStore};
use crate::script::{self, ScriptEngine, ScriptError};
use crate::types::{EnvId, MascotId, TickEvent, Transition};
use crate::variables::Slot;
use deskling_prng::GameRng;
use deskling_protocol::ColonyUpdate;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Re-entry bound for the per-tick driver loops. A healthy tree settles in
/// a handful of iterations; hitting the bound means the configuration
/// cycles without consuming ticks.
const MAX_REENTRIES: usize = 16;

/// Hard failures that abort one mascot's processing for the tick. Guard
/// failures and missing resources are transitions, never errors.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("mascot {mascot}: script failed in action \"{action}\": {source}")]
    Script {
        mascot: MascotId,
        action: String,
        source: ScriptError,
    },
    #[error("mascot {mascot}: structural violation in action \"{action}\": {detail}")]
    Structural {
        mascot: MascotId,
        action: String,
        detail: &'static str,
    },
    #[error("mascot {mascot}: action stack overflow")]
    StackOverflow { mascot: MascotId },
    #[error("mascot {mascot}: no behavior available")]
    NoBehavior { mascot: MascotId },
    #[error("mascot {mascot}: behavior \"{behavior}\" rejected its root action")]
    BehaviorRejected { mascot: MascotId, behavior: String },
    #[error("mascot {mascot}: re-entry limit reached")]
    IterationLimit { mascot: MascotId },
    #[error("mascot {mascot}: clone failed")]
    CloneFailed { mascot: MascotId },
    #[error("mascot {mascot}: transform to species \"{species}\" failed")]
    TransformFailed { mascot: MascotId, species: String },
}

/// Wrap a script failure with the mascot and action identity.
pub(crate) fn script_failure(mascot: &Mascot, action: &str, source: ScriptError) -> TickError {
    TickError::Script {
        mascot: mascot.id,
        action: action.to_owned(),
        source,
    }
}

/// Everything one tick needs from the host, passed by reference. The
/// engine adds `population` before each mascot's turn.
pub struct TickCtx<'a> {
    pub tick: u32,
    pub env: &'a mut dyn Environment,
    pub scripts: &'a dyn ScriptEngine,
    pub prototypes: &'a PrototypeStore,
    pub board: &'a AffordanceBoard,
    pub config: &'a EngineConfig,
    pub rng: &'a mut GameRng,
    /// Live mascot count including the one currently ticking.
    pub population: u32,
}

/// Result of installing an action on a mascot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SetOutcome {
    /// The action initialized and is running.
    Ok,
    /// The action declined (guard failed, resource missing).
    Next,
    /// Init changed state (recovery redirect); redo the walk.
    Reenter,
}

/// Parameters for creating one mascot.
#[derive(Clone, Debug)]
pub struct SpawnParams {
    pub prototype: Arc<MascotPrototype>,
    /// Starting behavior name; the first tick forces the fall behavior if
    /// absent.
    pub behavior: Option<String>,
    pub env: EnvId,
    pub x: i32,
    pub y: i32,
    pub velocity: (f32, f32),
    pub gravity: f32,
    pub air_drag: (f32, f32),
    pub facing_right: bool,
}

impl SpawnParams {
    /// A mascot at a position with everything else defaulted.
    pub fn at(prototype: Arc<MascotPrototype>, env: EnvId, x: i32, y: i32) -> Self {
        Self {
            prototype,
            behavior: None,
            env,
            x,
            y,
            velocity: (0.0, 0.0),
            gravity: 0.0,
            air_drag: (0.0, 0.0),
            facing_right: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Behavior pool and selection
// ---------------------------------------------------------------------------

/// Rebuild or extend the mascot's behavior pool from a behavior list.
/// `from == None` uses the species' root list. Condition groups expand
/// recursively when their own condition passes.
pub(crate) fn build_behavior_pool(
    mascot: &mut Mascot,
    from: Option<Arc<Behavior>>,
    add: bool,
    ctx: &mut TickCtx,
) {
    if !add {
        mascot.behavior_pool.clear();
    }
    let list: Vec<BehaviorRef> = match &from {
        Some(b) => b.next.clone(),
        None => mascot.prototype.root_behaviors.clone(),
    };
    for entry in &list {
        if entry.behavior.is_group {
            match script::check_condition(ctx.scripts, mascot, entry.behavior.condition.as_ref()) {
                Ok(true) => build_behavior_pool(mascot, Some(entry.behavior.clone()), true, ctx),
                Ok(false) => {}
                Err(e) => {
                    warn!(mascot = %mascot.id, group = %entry.behavior.name, error = %e,
                          "behavior group condition failed");
                }
            }
            continue;
        }
        if entry.weight == 0 {
            continue;
        }
        if let Some(action) = &entry.behavior.action
            && let Some(required) = action.border
            && ctx.env.border_type(mascot.env, mascot.x(), mascot.y()) != required
        {
            continue;
        }
        match script::check_condition(ctx.scripts, mascot, entry.behavior.condition.as_ref()) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                warn!(mascot = %mascot.id, behavior = %entry.behavior.name, error = %e,
                      "behavior condition failed while building pool");
                return;
            }
        }
        if mascot.behavior_pool.len() >= 128 {
            break;
        }
        debug!(mascot = %mascot.id, behavior = %entry.behavior.name, "added behavior to pool");
        mascot.behavior_pool.push(PoolEntry {
            behavior: entry.behavior.clone(),
            weight: entry.weight,
        });
    }
}

/// Install a top-level behavior: clean the running action, reset all
/// per-action state, and rebuild the pool for the next selection.
pub(crate) fn set_behavior(mascot: &mut Mascot, behavior: Option<Arc<Behavior>>, ctx: &mut TickCtx) {
    if let Some(current) = mascot.current_action.clone() {
        dispatch::clean(current.node.kind, mascot, ctx.board);
    }
    mascot.current_behavior = behavior.clone();
    mascot.current_action = None;
    mascot.current_condition = ConditionCache::default();
    mascot.current_animation = None;
    mascot.animation_index = 0;
    mascot.frame_index = 0;
    mascot.action_index = 0;
    mascot.stack.clear();

    build_behavior_pool(mascot, None, false, ctx);
    if let Some(b) = behavior {
        if b.is_group {
            warn!(mascot = %mascot.id, behavior = %b.name, "condition group used as a behavior");
            return;
        }
        let add = b.add_next;
        build_behavior_pool(mascot, Some(b), add, ctx);
    }
}

/// Pick and install the next top-level behavior once the stack resolved.
/// Drag and hotspot grabs preempt weighted selection.
pub(crate) fn behavior_next(mascot: &mut Mascot, ctx: &mut TickCtx) -> Result<Transition, TickError> {
    if mascot.dragged {
        let drag = mascot.prototype.drag_behavior.clone();
        set_behavior(mascot, drag, ctx);
        return Ok(Transition::Continue);
    }
    if mascot.hotspot_active {
        let held = mascot.hotspot_behavior.clone();
        set_behavior(mascot, held, ctx);
        return Ok(Transition::Continue);
    }

    if let Some(b) = &mascot.current_behavior {
        info!(mascot = %mascot.id, behavior = %b.name, "completed behavior");
    }

    build_behavior_pool(mascot, None, false, ctx);
    if let Some(current) = mascot.current_behavior.clone() {
        let add = current.add_next;
        build_behavior_pool(mascot, Some(current), add, ctx);
    }
    if mascot.behavior_pool.is_empty() {
        warn!(mascot = %mascot.id, "behavior pool is empty, retrying with the root list");
        build_behavior_pool(mascot, None, false, ctx);
    }

    let pool = mascot.behavior_pool.clone();
    let Some(next) = behavior::select_from_pool(&pool, ctx.scripts, mascot, ctx.rng) else {
        warn!(mascot = %mascot.id, "no selectable behavior");
        return Err(TickError::NoBehavior { mascot: mascot.id });
    };
    set_behavior(mascot, Some(next), ctx);
    if let Some(b) = &mascot.current_behavior {
        info!(mascot = %mascot.id, behavior = %b.name, "initialized behavior");
    }
    Ok(Transition::Reenter)
}

// ---------------------------------------------------------------------------
// Action installation and the stack
// ---------------------------------------------------------------------------

pub(crate) fn set_action_internal(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    push_stack: bool,
    clear_stack: bool,
    ctx: &mut TickCtx,
) -> Result<SetOutcome, TickError> {
    debug!(mascot = %mascot.id, action = %actionref.node.name, push_stack, "setting action");

    let old_index = mascot.action_index;
    let old_action = mascot.current_action.replace(actionref.clone());
    if let Some(old) = &old_action {
        dispatch::clean(old.node.kind, mascot, ctx.board);
    }

    if push_stack {
        if clear_stack {
            mascot.stack.clear();
        }
        if mascot.stack.len() >= MAX_STACK_DEPTH {
            return Err(TickError::StackOverflow { mascot: mascot.id });
        }
        if let Some(old) = old_action {
            mascot.stack.push(StackFrame {
                action: old,
                resume_index: old_index,
            });
        }
    }

    match dispatch::init(mascot, actionref, ctx)? {
        Transition::Reenter => Ok(SetOutcome::Reenter),
        Transition::Next => Ok(SetOutcome::Next),
        _ => {
            mascot.action_tick = ctx.tick;
            Ok(SetOutcome::Ok)
        }
    }
}

pub(crate) fn set_action(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<SetOutcome, TickError> {
    set_action_internal(mascot, actionref, false, true, ctx)
}

/// Pop one stack frame, re-initialize the parent, and restore its resume
/// index (init resets it; the stored index wins).
pub(crate) fn pop_action_stack(
    mascot: &mut Mascot,
    ctx: &mut TickCtx,
) -> Result<SetOutcome, TickError> {
    let Some(frame) = mascot.stack.pop() else {
        return Ok(SetOutcome::Next);
    };
    debug!(mascot = %mascot.id, action = %frame.action.node.name, "resuming parent action");
    let outcome = set_action_internal(mascot, &frame.action, false, false, ctx)?;
    mascot.action_index = frame.resume_index;
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// The per-tick walk
// ---------------------------------------------------------------------------

/// Advance the active branch until it yields a stable transition for this
/// tick. Interprets leaf transitions, applies animation/pose switches, and
/// installs child actions handed down by the structural kinds.
pub(crate) fn action_get_next(
    colony: &mut Colony,
    mascot: &mut Mascot,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if mascot.current_action.is_none() {
        let Some(behavior) = mascot.current_behavior.clone() else {
            warn!(mascot = %mascot.id, "action iterator called without a behavior");
            return Err(TickError::NoBehavior { mascot: mascot.id });
        };
        let Some(action) = behavior.action.clone() else {
            warn!(mascot = %mascot.id, behavior = %behavior.name, "behavior has no action");
            return Err(TickError::NoBehavior { mascot: mascot.id });
        };
        let actionref = ActionRef::plain(action);
        match set_action(mascot, &actionref, ctx)? {
            SetOutcome::Ok => {}
            _ => {
                warn!(mascot = %mascot.id, behavior = %behavior.name,
                      "failed to start the behavior's root action");
                return Err(TickError::BehaviorRejected {
                    mascot: mascot.id,
                    behavior: behavior.name.clone(),
                });
            }
        }
    }

    for _ in 0..MAX_REENTRIES {
        let Some(actionref) = mascot.current_action.clone() else {
            // A handler reset the branch (recovery redirect); restart from
            // the behavior.
            return action_get_next(colony, mascot, ctx);
        };

        let outcome = dispatch::next(colony, mascot, &actionref, ctx)?;

        match outcome.status {
            Transition::Clone => return Ok(Transition::Clone),
            Transition::Transform => return Ok(Transition::Transform),
            Transition::Escape => {
                mascot.stack.clear();
                crate::actions::interact::resist_clean(mascot);
                return Ok(Transition::Escape);
            }
            Transition::Next => {
                if !mascot.stack.is_empty() {
                    pop_action_stack(mascot, ctx)?;
                    continue;
                }
                mascot.current_action = None;
                mascot.current_condition = ConditionCache::default();
                mascot.current_animation = None;
                return Ok(Transition::Next);
            }
            Transition::Reenter | Transition::Continue => {}
        }

        if let Some(animation) = outcome.next_animation {
            let changed = mascot
                .current_animation
                .as_ref()
                .is_none_or(|c| !Arc::ptr_eq(c, &animation));
            if changed {
                mascot.current_animation = Some(animation);
                mascot.animation_index = 0;
                mascot.frame_index = 0;
            }
        }
        if let Some(pose) = outcome.next_pose {
            mascot.attach_pose(ctx.env, &pose, ctx.tick);
        }

        if let Some(next_ref) = outcome.next_action {
            let same = mascot
                .current_action
                .as_ref()
                .is_some_and(|c| c.same_node(&next_ref));
            if !same {
                let nested = mascot
                    .current_action
                    .as_ref()
                    .is_some_and(|c| c.node.kind == ActionKind::Sequence);
                match set_action_internal(mascot, &next_ref, nested, false, ctx)? {
                    SetOutcome::Ok => {}
                    SetOutcome::Next if mascot.stack.is_empty() => return Ok(Transition::Next),
                    SetOutcome::Reenter if mascot.stack.is_empty() => {}
                    _ => {
                        pop_action_stack(mascot, ctx)?;
                        continue;
                    }
                }
            }
        }

        if outcome.status == Transition::Continue {
            return Ok(Transition::Continue);
        }
    }

    error!(mascot = %mascot.id, "action walk reached its re-entry limit");
    Err(TickError::IterationLimit { mascot: mascot.id })
}

// ---------------------------------------------------------------------------
// Clone, transform, drag
// ---------------------------------------------------------------------------

/// Create the clone a Breed action asked for: same or configured species,
/// offset by the born slots (mirrored by facing, scaled by the output
/// scale), inheriting physics parameters and facing.
fn spawn_clone(colony: &mut Colony, mascot: &Mascot, ctx: &mut TickCtx) -> Option<MascotId> {
    let node = mascot.current_action.as_ref().map(|a| a.node.clone());
    let born_species = node.as_ref().and_then(|n| n.born_species.clone());
    let born_behavior = node.as_ref().and_then(|n| n.born_behavior.clone());

    let prototype = match &born_species {
        Some(name) => {
            let Some(p) = ctx.prototypes.get(name) else {
                warn!(mascot = %mascot.id, species = %name, "clone species not found");
                return None;
            };
            p
        }
        None => mascot.prototype.clone(),
    };

    let scale = ctx.env.screen_scale(mascot.env);
    let direction = if mascot.facing_right() { -1 } else { 1 };
    let born_x = mascot.vars.get_i(Slot::BornX);
    let born_y = mascot.vars.get_i(Slot::BornY);
    let x = mascot.x() + ((born_x * direction) as f32 * scale) as i32;
    let y = mascot.y() + (born_y as f32 * scale) as i32;

    info!(mascot = %mascot.id, species = %prototype.name, x, y, "cloning mascot");
    let params = SpawnParams {
        prototype,
        behavior: born_behavior,
        env: mascot.env,
        x,
        y,
        velocity: (
            mascot.vars.get_f(Slot::InitialVelX),
            mascot.vars.get_f(Slot::InitialVelY),
        ),
        gravity: mascot.vars.get_f(Slot::Gravity),
        air_drag: (
            mascot.vars.get_f(Slot::AirDragX),
            mascot.vars.get_f(Slot::AirDragY),
        ),
        facing_right: mascot.facing_right(),
    };
    Some(colony.spawn(ctx, params))
}

/// Perform the species swap a Transform action asked for. The mascot keeps
/// its identity, surface, position, and facing; everything else resets to
/// the new species.
fn transform_in_place(mascot: &mut Mascot, ctx: &mut TickCtx) -> Result<(), TickError> {
    let node = mascot.current_action.as_ref().map(|a| a.node.clone());
    let species = node.as_ref().and_then(|n| n.transform_species.clone());
    let target_behavior = node.as_ref().and_then(|n| n.target_behavior.clone());

    let Some(species) = species else {
        return Err(TickError::TransformFailed {
            mascot: mascot.id,
            species: String::new(),
        });
    };
    let Some(prototype) = ctx.prototypes.get(&species) else {
        return Err(TickError::TransformFailed {
            mascot: mascot.id,
            species,
        });
    };

    info!(mascot = %mascot.id, from = %mascot.prototype.name, to = %prototype.name, "transforming");
    let (x, y, facing) = (mascot.x(), mascot.y(), mascot.facing_right());
    mascot.reinit(prototype.clone(), ctx.board);
    let behavior = target_behavior.as_deref().and_then(|n| prototype.behavior(n));
    if behavior.is_some() {
        set_behavior(mascot, behavior, ctx);
    } else {
        behavior_next(mascot, ctx)?;
    }
    mascot.set_position(x, y);
    mascot.set_facing_right(facing);
    Ok(())
}

/// End a drag: back to the thrown behavior (when released with velocity)
/// or the fall behavior.
pub(crate) fn drag_ended_inner(mascot: &mut Mascot, throw: bool, ctx: &mut TickCtx) {
    mascot.dragged = false;
    let behavior = if throw {
        mascot
            .prototype
            .thrown_behavior
            .clone()
            .or_else(|| mascot.prototype.fall_behavior.clone())
    } else {
        mascot.prototype.fall_behavior.clone()
    };
    set_behavior(mascot, behavior, ctx);
    ctx.env.release_surface(mascot.surface);
}

// ---------------------------------------------------------------------------
// Colony
// ---------------------------------------------------------------------------

/// The owning collection of live mascots.
#[derive(Default)]
pub struct Colony {
    mascots: BTreeMap<MascotId, Mascot>,
    next_id: u32,
}

impl Colony {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mascots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mascots.is_empty()
    }

    pub fn ids(&self) -> Vec<MascotId> {
        self.mascots.keys().copied().collect()
    }

    pub fn get(&self, id: MascotId) -> Option<&Mascot> {
        self.mascots.get(&id)
    }

    pub fn get_mut(&mut self, id: MascotId) -> Option<&mut Mascot> {
        self.mascots.get_mut(&id)
    }

    /// Create a mascot, its surface, and optionally its starting behavior.
    pub fn spawn(&mut self, ctx: &mut TickCtx, params: SpawnParams) -> MascotId {
        let id = MascotId(self.next_id);
        self.next_id += 1;

        let surface = ctx.env.create_surface(params.env);
        let mut mascot = Mascot::new(id, params.prototype.clone(), params.env, surface);
        mascot.set_position(params.x, params.y);
        mascot.vars.set_f(Slot::VelocityX, params.velocity.0);
        mascot.vars.set_f(Slot::VelocityY, params.velocity.1);
        mascot.vars.set_f(Slot::Gravity, params.gravity);
        mascot.vars.set_f(Slot::AirDragX, params.air_drag.0);
        mascot.vars.set_f(Slot::AirDragY, params.air_drag.1);
        mascot.set_facing_right(params.facing_right);

        if let Some(name) = &params.behavior {
            match params.prototype.behavior(name) {
                Some(b) => set_behavior(&mut mascot, Some(b), ctx),
                None => {
                    warn!(mascot = %id, behavior = %name, species = %params.prototype.name,
                          "starting behavior not found");
                }
            }
        }

        ctx.env.place_surface(surface, params.x, params.y);
        info!(mascot = %id, species = %params.prototype.name, x = params.x, y = params.y,
              "spawned mascot");
        self.mascots.insert(id, mascot);
        id
    }

    /// Remove a mascot, releasing its surface and board entry.
    pub fn dispose(
        &mut self,
        id: MascotId,
        env: &mut dyn Environment,
        board: &AffordanceBoard,
    ) -> bool {
        let Some(mascot) = self.mascots.remove(&id) else {
            return false;
        };
        board.clear(id);
        env.destroy_surface(mascot.surface);
        info!(mascot = %id, "disposed mascot");
        true
    }

    /// Walk every mascot once. Hard failures abort only the failing
    /// mascot's turn; they are logged and reported for host-level recovery.
    pub fn tick_all(&mut self, ctx: &mut TickCtx) -> (Vec<TickEvent>, Vec<(MascotId, TickError)>) {
        let mut events = Vec::new();
        let mut errors = Vec::new();
        for id in self.ids() {
            let Some(mut mascot) = self.mascots.remove(&id) else {
                continue;
            };
            ctx.population = (self.mascots.len() + 1) as u32;
            match self.tick_one(&mut mascot, ctx) {
                Ok(mascot_events) => events.extend(mascot_events),
                Err(e) => {
                    error!(mascot = %id, error = %e, "tick aborted");
                    errors.push((id, e));
                }
            }
            self.mascots.insert(id, mascot);
        }
        (events, errors)
    }

    /// One mascot's full turn: recovery, walk, physics, and tick-local
    /// re-entry until the state is stable.
    fn tick_one(
        &mut self,
        mascot: &mut Mascot,
        ctx: &mut TickCtx,
    ) -> Result<SmallVec<[TickEvent; 4]>, TickError> {
        let mut events: SmallVec<[TickEvent; 4]> = SmallVec::new();

        if mascot.current_behavior.is_none() {
            if let Some(fall) = mascot.prototype.fall_behavior.clone() {
                debug!(mascot = %mascot.id, "no behavior set, falling");
                set_behavior(mascot, Some(fall), ctx);
            } else {
                warn!(mascot = %mascot.id, "no behavior set and no fall behavior");
                build_behavior_pool(mascot, None, false, ctx);
            }
        }

        let mut result = Transition::Reenter;
        let mut iterations = 0;
        while result != Transition::Continue && iterations < MAX_REENTRIES {
            iterations += 1;
            result = action_get_next(self, mascot, ctx)?;
            if result == Transition::Continue
                && let Some(actionref) = mascot.current_action.clone()
            {
                result = dispatch::tick(self, mascot, &actionref, ctx)?;
            }

            match result {
                Transition::Next => {
                    result = behavior_next(mascot, ctx)?;
                }
                Transition::Clone => {
                    let Some(clone_id) = spawn_clone(self, mascot, ctx) else {
                        return Err(TickError::CloneFailed { mascot: mascot.id });
                    };
                    mascot.born_count += 1;
                    mascot.born_tick = ctx.tick;
                    events.push(TickEvent::Spawned(clone_id));
                    result = Transition::Reenter;
                }
                Transition::Transform => {
                    transform_in_place(mascot, ctx)?;
                    events.push(TickEvent::Transformed(mascot.id));
                    result = Transition::Continue;
                }
                Transition::Escape => {
                    ctx.env.release_surface(mascot.surface);
                    drag_ended_inner(mascot, false, ctx);
                }
                Transition::Continue | Transition::Reenter => {}
            }
        }

        if result != Transition::Continue {
            // Softlock watchdog: stop offering the behavior that cycles and
            // let the fall behavior take over next walk.
            warn!(mascot = %mascot.id, "tick never stabilized, suppressing current behavior");
            if let Some(current) = &mascot.current_behavior {
                for entry in &mut mascot.behavior_pool {
                    if Arc::ptr_eq(&entry.behavior, current) {
                        entry.weight = 0;
                    }
                }
            }
            set_behavior(mascot, None, ctx);
        }

        Ok(events)
    }

    /// Force a named top-level behavior on a mascot.
    pub fn apply_behavior(&mut self, id: MascotId, name: &str, ctx: &mut TickCtx) -> bool {
        let Some(mascot) = self.mascots.get_mut(&id) else {
            return false;
        };
        let Some(behavior) = mascot.prototype.behavior(name) else {
            warn!(mascot = %id, behavior = %name, "apply_behavior: unknown behavior");
            return false;
        };
        set_behavior(mascot, Some(behavior), ctx);
        true
    }

    /// Find a live interaction partner advertising `affordance`.
    pub fn target_by_affordance(
        &self,
        id: MascotId,
        affordance: &str,
        ctx: &mut TickCtx,
    ) -> Option<MascotId> {
        if !ctx.config.interactions {
            return None;
        }
        let mascot = self.mascots.get(&id)?;
        ctx.board.find_target(
            ctx.rng,
            affordance,
            id,
            mascot.env,
            ctx.config.unified_outputs,
        )
    }

    /// Begin a user drag. Refused while interacting or when the species
    /// has no drag behavior.
    pub fn drag_started(&mut self, id: MascotId, ctx: &mut TickCtx) -> bool {
        if !ctx.config.dragging {
            return false;
        }
        let Some(mascot) = self.mascots.get_mut(&id) else {
            return false;
        };
        if mascot.state == crate::types::MascotState::Interact
            || mascot.prototype.drag_behavior.is_none()
        {
            return false;
        }
        mascot.dragged = true;
        mascot.dragged_tick = 0;
        let drag = mascot.prototype.drag_behavior.clone();
        set_behavior(mascot, drag, ctx);
        true
    }

    /// End a user drag, optionally throwing.
    pub fn drag_ended(&mut self, id: MascotId, throw: bool, ctx: &mut TickCtx) -> bool {
        let Some(mascot) = self.mascots.get_mut(&id) else {
            return false;
        };
        drag_ended_inner(mascot, throw, ctx);
        true
    }

    /// Resolve a click on a mascot's surface against the current
    /// animation's hotspots; a hit forces the bound behavior.
    pub fn hotspot_click(
        &mut self,
        id: MascotId,
        x: i32,
        y: i32,
        button: crate::animation::HotspotButton,
        ctx: &mut TickCtx,
    ) -> bool {
        let Some(mascot) = self.mascots.get_mut(&id) else {
            return false;
        };
        let Some(hotspot) = mascot.hotspot_at(x, y) else {
            return false;
        };
        if hotspot.button != button {
            return false;
        }
        let Some(behavior) = mascot.prototype.behavior(&hotspot.behavior) else {
            return false;
        };
        mascot.hotspot_behavior = Some(behavior.clone());
        set_behavior(mascot, Some(behavior), ctx);
        true
    }

    /// Press-and-hold variant: the bound behavior persists until release.
    pub fn hotspot_hold(
        &mut self,
        id: MascotId,
        x: i32,
        y: i32,
        button: crate::animation::HotspotButton,
        release: bool,
        ctx: &mut TickCtx,
    ) -> bool {
        if release {
            let Some(mascot) = self.mascots.get_mut(&id) else {
                return false;
            };
            mascot.hotspot_active = false;
            mascot.hotspot_behavior = None;
            return true;
        }
        let hit = self.hotspot_click(id, x, y, button, ctx);
        if hit && let Some(mascot) = self.mascots.get_mut(&id) {
            mascot.hotspot_active = true;
        }
        hit
    }

    /// Move a mascot to another environment. The engine state carries
    /// over untouched; the host migrates the surface itself and may apply
    /// a coordinate offset afterwards (`Mascot::apply_environment_offset`).
    pub fn migrate(&mut self, id: MascotId, env: EnvId, board: &AffordanceBoard) -> bool {
        let Some(mascot) = self.mascots.get_mut(&id) else {
            return false;
        };
        info!(mascot = %id, from = mascot.env.0, to = env.0, "migrating environment");
        mascot.env = env;
        if let Some(affordance) = mascot.current_affordance.clone() {
            // Keep the board entry's environment in sync for same-output
            // target filtering.
            board.announce(id, env, Some(&affordance));
        }
        true
    }

    /// Serializable state of every mascot, for the protocol layer.
    pub fn snapshot(&self, tick: u32) -> ColonyUpdate {
        ColonyUpdate {
            tick,
            mascots: self.mascots.values().map(Mascot::snapshot).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionContent, ActionNode};
    use crate::animation::{Animation, Hotspot, HotspotButton, HotspotShape};
    use crate::environment::ForeignWindow;
    use crate::script::Expression;
    use crate::testkit::*;
    use crate::types::{Border, MascotState, ProgramId};
    use crate::variables::{Slot, VarBinding, VarTable, VarValue};

    fn spawn_with(
        world: &mut TestWorld,
        prototype: Arc<MascotPrototype>,
        behavior: &str,
        x: i32,
        y: i32,
    ) -> MascotId {
        let mut params = SpawnParams::at(prototype, EnvId(0), x, y);
        params.behavior = Some(behavior.into());
        world.spawn(params)
    }

    fn behavior_name(world: &TestWorld, id: MascotId) -> Option<String> {
        world
            .mascot(id)
            .current_behavior
            .as_ref()
            .map(|b| b.name.clone())
    }

    fn one_shot_leaf(name: &str, sprite: u32) -> Arc<ActionNode> {
        Arc::new(leaf(
            name,
            ActionKind::Animate,
            vec![animation(vec![pose_sprite(sprite, 1)])],
        ))
    }

    #[test]
    fn animate_behavior_loops() {
        let mut world = TestWorld::new();
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Idle", 100, 0);

        world.run(0, 4);

        let m = world.mascot(id);
        assert_eq!(m.state, MascotState::Stay);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Idle"));
        assert!(!world.env.presented.is_empty());
    }

    #[test]
    fn sequence_runs_children_in_order_and_completes() {
        let mut world = TestWorld::new();
        let mut routine = ActionNode::new("Routine", ActionKind::Sequence);
        routine.content = vec![
            ActionContent::Action(one_shot_leaf("StepA", 1)),
            ActionContent::Action(one_shot_leaf("StepB", 2)),
        ];
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("DoRoutine", Arc::new(routine), 10))
            .fall(fall_node())
            .build();
        spawn_with(&mut world, proto, "DoRoutine", 100, 0);

        world.run(0, 4);

        // Both children run exactly once per pass, in order; the sequence
        // completes and the behavior selector starts it over.
        let sprites: Vec<u32> = world.env.presented.iter().map(|p| p.1).collect();
        assert_eq!(sprites, vec![1, 2, 1, 2]);
    }

    #[test]
    fn selector_reevaluates_from_first_child() {
        let mut world = TestWorld::new();
        world.scripts.set_value(ProgramId(1), 0.0);
        world.scripts.set_value(ProgramId(2), 0.0);

        let mut child_a = leaf(
            "PreenA",
            ActionKind::Animate,
            vec![animation(vec![pose_sprite(1, 1)])],
        );
        child_a.condition = Some(Arc::new(Expression::new(ProgramId(1))));
        let mut child_b = leaf(
            "PreenB",
            ActionKind::Animate,
            vec![animation(vec![pose_sprite(2, 1)])],
        );
        child_b.condition = Some(Arc::new(Expression::new(ProgramId(2))));
        let child_c = leaf(
            "PreenC",
            ActionKind::Animate,
            vec![animation(vec![pose_sprite(3, 1)])],
        );

        let mut selector = ActionNode::new("PickPreen", ActionKind::Select);
        selector.content = vec![
            ActionContent::Action(Arc::new(child_a)),
            ActionContent::Action(Arc::new(child_b)),
            ActionContent::Action(Arc::new(child_c)),
        ];
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Preen", Arc::new(selector), 10))
            .fall(fall_node())
            .build();
        spawn_with(&mut world, proto, "Preen", 100, 0);

        world.run(0, 6);

        // Only the third child ever runs, and the failing guards are
        // re-scanned on every activation.
        assert!(world.env.presented.iter().all(|p| p.1 == 3));
        assert!(world.scripts.calls(ProgramId(1)) >= 3);
    }

    #[test]
    fn animation_switch_resets_frame_within_the_tick() {
        let mut world = TestWorld::new();
        let mut anim_walk = Animation::new(vec![pose_sprite(10, 1), pose_sprite(11, 1)]);
        anim_walk.condition = Some(Arc::new(Expression::new(ProgramId(7))));
        let anim_rest = Animation::new(vec![pose_sprite(20, 1), pose_sprite(21, 1)]);

        let mut node = ActionNode::new("Fidget", ActionKind::Animate);
        node.content = vec![
            ActionContent::Animation(Arc::new(anim_walk)),
            ActionContent::Animation(Arc::new(anim_rest)),
        ];
        node.loops = true;
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Fidget", Arc::new(node), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Fidget", 100, 0);

        world.run(0, 2);
        let sprites: Vec<u32> = world.env.presented.iter().map(|p| p.1).collect();
        assert_eq!(sprites, vec![10, 11]);

        // Guard flips; the new animation's first frame shows this same tick.
        world.scripts.set_value(ProgramId(7), 0.0);
        world.run(2, 3);
        assert_eq!(world.env.presented.last().map(|p| p.1), Some(20));
        assert_eq!(world.mascot(id).frame_index, 1);
    }

    fn approach_node() -> Arc<ActionNode> {
        let mut node = leaf(
            "Approach",
            ActionKind::Move,
            vec![animation(vec![pose_vel(1, -5, 0)])],
        );
        node.defaults
            .set(Slot::TargetX, VarBinding::literal(VarValue::Int(100)));
        Arc::new(node)
    }

    #[test]
    fn reference_override_beats_node_default() {
        let mut world = TestWorld::new();
        let node = approach_node();
        let mut overrides = VarTable::new();
        overrides.set(Slot::TargetX, VarBinding::literal(VarValue::Int(250)));
        let reference = ActionRef {
            node,
            condition: None,
            duration: None,
            overrides: Arc::new(overrides),
        };
        let mut wander = ActionNode::new("Wander", ActionKind::Sequence);
        wander.content = vec![ActionContent::Reference(reference)];
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("GoPlaces", Arc::new(wander), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "GoPlaces", 0, 0);

        world.run(0, 1);
        assert_eq!(world.mascot(id).vars.get_i(Slot::TargetX), 250);
    }

    #[test]
    fn unused_override_falls_back_to_node_default() {
        let mut world = TestWorld::new();
        let reference = ActionRef::plain(approach_node());
        let mut wander = ActionNode::new("Wander", ActionKind::Sequence);
        wander.content = vec![ActionContent::Reference(reference)];
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("GoPlaces", Arc::new(wander), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "GoPlaces", 0, 0);

        world.run(0, 1);
        assert_eq!(world.mascot(id).vars.get_i(Slot::TargetX), 100);
    }

    #[test]
    fn out_of_bounds_recovery_teleports_and_falls() {
        let mut world = TestWorld::new();
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Idle", -1, 300);

        world.run(0, 1);

        let m = world.mascot(id);
        assert!(m.x() >= 0 && m.x() < 1920, "x = {}", m.x());
        // Teleported to 256 under the top edge, then the forced fall
        // integrated one step downward within the same tick.
        assert_eq!(m.y(), 1080 - 256 - 2);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Fall"));
        assert_eq!(m.state, MascotState::Fall);
    }

    #[test]
    fn border_requirement_skips_to_sibling() {
        let mut world = TestWorld::new();
        world.env.border = Border::Floor;

        let mut climb = leaf(
            "Climb",
            ActionKind::Animate,
            vec![animation(vec![pose_sprite(5, 1)])],
        );
        climb.border = Some(Border::Wall);
        let mut sit = leaf(
            "SitDown",
            ActionKind::Animate,
            vec![animation(vec![pose_sprite(6, 1)])],
        );
        sit.border = Some(Border::Floor);

        let mut selector = ActionNode::new("Settle", ActionKind::Select);
        selector.content = vec![
            ActionContent::Action(Arc::new(climb)),
            ActionContent::Action(Arc::new(sit)),
        ];
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("SettleDown", Arc::new(selector), 10))
            .fall(fall_node())
            .build();
        spawn_with(&mut world, proto, "SettleDown", 100, 0);

        world.run(0, 2);
        assert!(world.env.presented.iter().all(|p| p.1 == 6));
    }

    #[test]
    fn losing_ground_forces_fall() {
        let mut world = TestWorld::new();
        // A platform under the mascot: floor everywhere for now.
        world.env.border = Border::Floor;

        let mut sit = idle_leaf("SitDown");
        sit.border = Some(Border::Floor);
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Sit", Arc::new(sit), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Sit", 100, 200);

        world.run(0, 2);
        assert_eq!(world.mascot(id).state, MascotState::Stay);

        // The platform vanishes; only the work-area bottom is a floor now.
        // The same tick must recover into a fall.
        world.env.border = Border::None;
        world.env.floor_at_zero = true;
        world.run(2, 3);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Fall"));
        assert_eq!(world.mascot(id).state, MascotState::Fall);

        // And the fall lands on the bottom floor, where sitting resumes.
        world.run(3, 40);
        let m = world.mascot(id);
        assert_eq!(m.y(), 0);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Sit"));
    }

    #[test]
    fn fall_watchdog_ends_a_stalled_fall() {
        let mut world = TestWorld::new();
        let mut hover = leaf("Hover", ActionKind::Fall, vec![animation(vec![pose(1)])]);
        hover
            .defaults
            .set(Slot::Gravity, VarBinding::literal(VarValue::Float(0.0)));
        hover
            .defaults
            .set(Slot::AirDragX, VarBinding::literal(VarValue::Float(0.0)));
        hover
            .defaults
            .set(Slot::AirDragY, VarBinding::literal(VarValue::Float(0.0)));
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Drift", Arc::new(hover), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Drift", 500, 500);

        // Nothing moves, so the watchdog deadline is never refreshed.
        world.run(0, 5);
        assert_eq!(world.mascot(id).action_tick, 0);

        // On the fifth tick the watchdog ends the action and the selector
        // restarts the only available behavior.
        world.run(5, 6);
        assert_eq!(world.mascot(id).action_tick, 5);
    }

    #[test]
    fn fall_lands_on_the_floor() {
        let mut world = TestWorld::new();
        world.env.floor_at_zero = true;
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Fall", 100, 300);

        world.run(0, 60);

        let m = world.mascot(id);
        assert_eq!(m.y(), 0);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Idle"));
        assert_eq!(m.state, MascotState::Stay);
    }

    #[test]
    fn affordance_rendezvous_switches_both_behaviors() {
        let mut world = TestWorld::new();

        let mut host_node = leaf(
            "WaitForFriend",
            ActionKind::Animate,
            vec![animation(vec![pose(1)])],
        );
        host_node.loops = true;
        host_node.affordance = Some("Cuddle".into());
        let host_proto = ProtoBuilder::new("host")
            .behavior(Behavior::new("Available", Arc::new(host_node), 10))
            .hidden_behavior(Behavior::new("BeCuddled", Arc::new(idle_leaf("Hug")), 0))
            .fall(fall_node())
            .build();

        let mut seek = leaf(
            "SeekFriend",
            ActionKind::ScanMove,
            vec![animation(vec![pose_vel(1, -10, 0)])],
        );
        seek.affordance = Some("Cuddle".into());
        seek.behavior = Some("Cuddling".into());
        seek.target_behavior = Some("BeCuddled".into());
        let seeker_proto = ProtoBuilder::new("seeker")
            .behavior(Behavior::new("Seek", Arc::new(seek), 10))
            .hidden_behavior(Behavior::new("Cuddling", Arc::new(idle_leaf("Hug")), 0))
            .fall(fall_node())
            .build();

        let host = spawn_with(&mut world, host_proto, "Available", 500, 0);
        let seeker = spawn_with(&mut world, seeker_proto, "Seek", 400, 0);

        world.run(0, 20);

        assert_eq!(behavior_name(&world, host).as_deref(), Some("BeCuddled"));
        assert_eq!(behavior_name(&world, seeker).as_deref(), Some("Cuddling"));
        assert!(!world.board.advertises(host, "Cuddle"));
        assert_eq!(world.board.occupied(), 0);
    }

    #[test]
    fn breed_paces_clones_by_interval() {
        let mut world = TestWorld::new();
        let mut nursery = leaf("Nursery", ActionKind::Breed, vec![animation(vec![pose(1)])]);
        nursery.loops = true;
        nursery
            .defaults
            .set(Slot::BornCount, VarBinding::literal(VarValue::Int(2)));
        nursery
            .defaults
            .set(Slot::BornInterval, VarBinding::literal(VarValue::Int(3)));
        nursery.born_behavior = Some("Idle".into());
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 10))
            .hidden_behavior(Behavior::new("Nest", Arc::new(nursery), 0))
            .fall(fall_node())
            .build();
        spawn_with(&mut world, proto, "Nest", 100, 0);

        let events = world.run(0, 20);

        let spawned = events
            .iter()
            .filter(|e| matches!(e, TickEvent::Spawned(_)))
            .count();
        assert_eq!(spawned, 2);
        assert_eq!(world.colony.len(), 3);
    }

    #[test]
    fn transform_swaps_species_in_place() {
        let mut world = TestWorld::new();
        let calico = ProtoBuilder::new("calico")
            .behavior(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 10))
            .fall(fall_node())
            .build();
        world.prototypes.insert(calico);

        let mut cocoon = leaf("Cocoon", ActionKind::Transform, vec![animation(vec![pose(1)])]);
        cocoon.transform_species = Some("calico".into());
        cocoon.target_behavior = Some("Idle".into());
        let tabby = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Change", Arc::new(cocoon), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, tabby, "Change", 321, 0);

        let events = world.run(0, 3);

        assert!(events.contains(&TickEvent::Transformed(id)));
        let m = world.mascot(id);
        assert_eq!(m.prototype.name, "calico");
        assert_eq!(m.x(), 321);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Idle"));
    }

    #[test]
    fn resist_escalates_to_drag_when_pulled() {
        let mut world = TestWorld::new();
        world.env.pointer_deltas.push_back((6, 0));

        let mut squirm = leaf(
            "Squirm",
            ActionKind::Resist,
            vec![animation(vec![pose(1), pose(1)])],
        );
        squirm.loops = true;
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Struggle", Arc::new(squirm), 10))
            .drag(idle_leaf("Carried"))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Struggle", 100, 100);

        world.run(0, 1);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Drag"));
    }

    #[test]
    fn resist_escape_breaks_the_grab() {
        let mut world = TestWorld::new();
        let squirm = leaf("Squirm", ActionKind::Resist, vec![animation(vec![pose(1)])]);
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Struggle", Arc::new(squirm), 10))
            .drag(idle_leaf("Carried"))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Struggle", 100, 100);

        world.run(0, 2);

        assert!(!world.env.released.is_empty());
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Fall"));
        assert!(!world.mascot(id).dragged);
    }

    #[test]
    fn window_fall_carries_the_window_along() {
        let mut world = TestWorld::new();
        world.config.window_interactions = true;
        world.env.window = Some(ForeignWindow {
            x: -10,
            y: 535,
            width: 100,
            height: 50,
            active: true,
            moved: false,
        });

        let mut carry = leaf("CarryFall", ActionKind::WindowFall, vec![animation(vec![pose(1)])]);
        carry
            .defaults
            .set(Slot::WindowOffsetX, VarBinding::literal(VarValue::Int(10)));
        carry
            .defaults
            .set(Slot::WindowOffsetY, VarBinding::literal(VarValue::Int(5)));
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("CarryDown", Arc::new(carry), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "CarryDown", 100, 500);

        world.run(0, 3);

        let m = world.mascot(id);
        assert_eq!(m.state, MascotState::WindowFall);
        assert!(m.y() < 500);
        assert!(!world.env.window_moves.is_empty());
    }

    #[test]
    fn window_fall_redirects_when_feature_disabled() {
        let mut world = TestWorld::new();
        let carry = leaf("CarryFall", ActionKind::WindowFall, vec![animation(vec![pose(1)])]);
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("CarryDown", Arc::new(carry), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "CarryDown", 100, 500);

        // The redirect happens during init of the behavior's root action,
        // which aborts this tick; the fall behavior is installed regardless.
        let _ = world.tick(0);
        world.run(1, 2);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Fall"));
    }

    #[test]
    fn offset_applies_a_one_shot_delta() {
        let mut world = TestWorld::new();
        let mut hop = ActionNode::new("Hop", ActionKind::Offset);
        hop.defaults
            .set(Slot::X, VarBinding::literal(VarValue::Int(30)));
        hop.defaults
            .set(Slot::Y, VarBinding::literal(VarValue::Int(10)));

        let mut seq = ActionNode::new("HopThenSit", ActionKind::Sequence);
        seq.content = vec![
            ActionContent::Action(Arc::new(hop)),
            ActionContent::Action(Arc::new(idle_leaf("Sit"))),
        ];
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("HopOnce", Arc::new(seq), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "HopOnce", 100, 100);

        world.run(0, 1);

        let m = world.mascot(id);
        assert_eq!((m.x(), m.y()), (130, 90));
        assert_eq!(m.current_action.as_ref().map(|a| a.node.name.as_str()), Some("Sit"));
    }

    #[test]
    fn hotspot_click_forces_the_bound_behavior() {
        let mut world = TestWorld::new();
        let mut anim = Animation::new(vec![pose(1)]);
        anim.hotspots.push(Hotspot {
            shape: HotspotShape::Rectangle,
            x: 0,
            y: 0,
            width: 50,
            height: 50,
            behavior: "Pet".into(),
            button: HotspotButton::Left,
        });
        let mut stand = ActionNode::new("Stand", ActionKind::Animate);
        stand.content = vec![ActionContent::Animation(Arc::new(anim))];
        stand.loops = true;
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Idle", Arc::new(stand), 10))
            .hidden_behavior(Behavior::new("Pet", Arc::new(idle_leaf("Purr")), 0))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Idle", 100, 0);
        world.run(0, 1);

        let hit = world.with_ctx(|colony, ctx| {
            colony.hotspot_click(id, 10, 10, HotspotButton::Left, ctx)
        });
        assert!(hit);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Pet"));

        // Wrong button: no hit.
        let miss = world.with_ctx(|colony, ctx| {
            colony.hotspot_click(id, 10, 10, HotspotButton::Right, ctx)
        });
        assert!(!miss);
    }

    #[test]
    fn apply_behavior_forces_a_named_behavior() {
        let mut world = TestWorld::new();
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 10))
            .hidden_behavior(Behavior::new("Wave", Arc::new(idle_leaf("WaveAnim")), 0))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Idle", 100, 0);

        let ok = world.with_ctx(|colony, ctx| colony.apply_behavior(id, "Wave", ctx));
        assert!(ok);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Wave"));

        let missing = world.with_ctx(|colony, ctx| colony.apply_behavior(id, "Nope", ctx));
        assert!(!missing);
    }

    #[test]
    fn snapshot_reports_stack_and_action() {
        let mut world = TestWorld::new();
        let mut routine = ActionNode::new("Routine", ActionKind::Sequence);
        routine.content = vec![ActionContent::Action(Arc::new(idle_leaf("StepA")))];
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("DoRoutine", Arc::new(routine), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "DoRoutine", 7, 8);

        world.run(0, 1);

        let update = world.colony.snapshot(0);
        assert_eq!(update.mascots.len(), 1);
        let snap = &update.mascots[0];
        assert_eq!(snap.id, id.0);
        assert_eq!(snap.behavior.as_deref(), Some("DoRoutine"));
        assert_eq!(snap.action.as_deref(), Some("StepA"));
        assert_eq!(snap.action_stack, vec!["Routine".to_string()]);
        assert_eq!((snap.x, snap.y), (7, 8));
    }

    #[test]
    fn evaluate_once_guard_is_checked_only_at_init() {
        let mut world = TestWorld::new();
        let mut node = idle_leaf("Stare");
        node.condition = Some(Arc::new(Expression::once(ProgramId(9))));
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Watch", Arc::new(node), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Watch", 100, 0);

        world.run(0, 1);
        assert_eq!(world.scripts.calls(ProgramId(9)), 1);

        // Even a now-false guard does not end the action: it was latched.
        world.scripts.set_value(ProgramId(9), 0.0);
        world.run(1, 4);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Watch"));
        assert_eq!(world.scripts.calls(ProgramId(9)), 1);
    }

    #[test]
    fn script_failure_aborts_the_mascot_tick() {
        let mut world = TestWorld::new();
        world.scripts = StubScripts::new().with_error(ProgramId(13));

        let mut node = idle_leaf("Cursed");
        node.condition = Some(Arc::new(Expression::new(ProgramId(13))));
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Doomed", Arc::new(node), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Doomed", 100, 0);

        let (_, errors) = world.tick(0);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0].1, TickError::Script { mascot, .. } if mascot == id));
        // The mascot survives for host-level recovery.
        assert!(world.colony.get(id).is_some());
    }

    #[test]
    fn condition_groups_expand_into_the_pool() {
        let mut world = TestWorld::new();
        let idle = Arc::new(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 5));
        let night_play = Arc::new(Behavior::new("NightPlay", Arc::new(idle_leaf("Play")), 5));
        let group = Arc::new(Behavior {
            name: "NightOnly".into(),
            action: None,
            condition: Some(Arc::new(Expression::new(ProgramId(40)))),
            weight: 0,
            hidden: false,
            is_group: true,
            add_next: true,
            next: vec![BehaviorRef::new(night_play.clone())],
        });
        let mut proto = MascotPrototype::new("tabby");
        proto.behaviors.insert("Idle".into(), idle.clone());
        proto.behaviors.insert("NightPlay".into(), night_play);
        proto.behaviors.insert("NightOnly".into(), group.clone());
        proto.root_behaviors = vec![BehaviorRef::new(idle), BehaviorRef::new(group)];
        let id = world.spawn(SpawnParams::at(Arc::new(proto), EnvId(0), 0, 0));

        world.scripts.set_value(ProgramId(40), 0.0);
        let names = world.with_ctx(|colony, ctx| {
            let m = colony.get_mut(id).unwrap();
            build_behavior_pool(m, None, false, ctx);
            m.behavior_pool
                .iter()
                .map(|e| e.behavior.name.clone())
                .collect::<Vec<_>>()
        });
        assert_eq!(names, vec!["Idle".to_string()]);

        world.scripts.set_value(ProgramId(40), 1.0);
        let names = world.with_ctx(|colony, ctx| {
            let m = colony.get_mut(id).unwrap();
            build_behavior_pool(m, None, false, ctx);
            m.behavior_pool
                .iter()
                .map(|e| e.behavior.name.clone())
                .collect::<Vec<_>>()
        });
        assert_eq!(names, vec!["Idle".to_string(), "NightPlay".to_string()]);
    }

    #[test]
    fn drag_lifecycle_forces_drag_then_fall() {
        let mut world = TestWorld::new();
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 10))
            .drag(idle_leaf("Carried"))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Idle", 100, 0);

        let grabbed = world.with_ctx(|colony, ctx| colony.drag_started(id, ctx));
        assert!(grabbed);
        assert!(world.mascot(id).dragged);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Drag"));

        let dropped = world.with_ctx(|colony, ctx| colony.drag_ended(id, false, ctx));
        assert!(dropped);
        assert!(!world.mascot(id).dragged);
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Fall"));
    }

    #[test]
    fn migrate_keeps_state_and_moves_board_entry() {
        let mut world = TestWorld::new();
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Idle", 100, 50);
        world.board.announce(id, EnvId(0), Some("Cuddle"));
        world
            .colony
            .get_mut(id)
            .unwrap()
            .current_affordance = Some("Cuddle".into());

        assert!(world.colony.migrate(id, EnvId(1), &world.board));

        let m = world.mascot(id);
        assert_eq!(m.env, EnvId(1));
        assert_eq!((m.x(), m.y()), (100, 50));
        assert_eq!(behavior_name(&world, id).as_deref(), Some("Idle"));
        // The advertisement followed the mascot to the new environment.
        let mut rng = deskling_prng::GameRng::new(1);
        assert_eq!(
            world
                .board
                .find_target(&mut rng, "Cuddle", MascotId(99), EnvId(1), false),
            Some(id)
        );
    }

    #[test]
    fn dispose_releases_surface_and_board_entry() {
        let mut world = TestWorld::new();
        let proto = ProtoBuilder::new("tabby")
            .behavior(Behavior::new("Idle", Arc::new(idle_leaf("Sit")), 10))
            .fall(fall_node())
            .build();
        let id = spawn_with(&mut world, proto, "Idle", 100, 0);
        world.board.announce(id, EnvId(0), Some("Cuddle"));

        let removed = {
            let TestWorld { env, board, colony, .. } = &mut world;
            colony.dispose(id, env, board)
        };
        assert!(removed);
        assert!(world.colony.is_empty());
        assert!(!world.board.advertises(id, "Cuddle"));
    }
}

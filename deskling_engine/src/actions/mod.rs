// Action kind implementations.
//
// Every kind implements up to four hooks: `init` (called when the action is
// installed), `next` (advance the per-tick state machine and report a
// transition), `tick` (the physics step, run only when `next` said
// `Continue`), and `clean` (reset the mascot fields the kind owns).
// `dispatch` routes the driver to the right hook by matching on the
// exhaustive kind tag.
//
// The helpers in this module are the contracts every leaf shares: recovery
// checks, guard evaluation, duration limits, and the first-match-wins
// animation scan with its frame-advance rules.

pub(crate) mod animate;
pub(crate) mod breed;
pub(crate) mod fall;
pub(crate) mod interact;
pub(crate) mod offset;
pub(crate) mod scan;
pub(crate) mod select;
pub(crate) mod sequence;
pub(crate) mod transform;
pub(crate) mod walk;
pub(crate) mod window_fall;

use crate::action::{ActionContent, ActionRef};
use crate::animation::{Animation, Pose};
use crate::engine::{self, TickCtx, TickError};
use crate::mascot::{ConditionCache, Mascot};
use crate::script;
use crate::types::{Border, Transition};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What a kind's `next` hook hands back to the driver.
pub(crate) struct NextOutcome {
    pub status: Transition,
    /// Child to install (structural kinds) or the same node (no-op).
    pub next_action: Option<ActionRef>,
    /// Newly selected animation, when it changed.
    pub next_animation: Option<Arc<Animation>>,
    /// Frame to present this tick.
    pub next_pose: Option<Pose>,
}

impl NextOutcome {
    pub(crate) fn of(status: Transition) -> Self {
        Self {
            status,
            next_action: None,
            next_animation: None,
            next_pose: None,
        }
    }
}

/// What happens when a leaf's animation runs out of frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FrameWrap {
    /// Restart at frame 0 unconditionally (kinds that end on an external
    /// condition: falling, walking to a target).
    Always,
    /// Restart only when the node loops.
    IfLoop,
    /// Restart when the node loops or a duration limit is running.
    IfLoopOrDuration,
}

// ---------------------------------------------------------------------------
// Recovery checks
// ---------------------------------------------------------------------------

/// Teleport a mascot that left the work area back inside and force its
/// fall behavior. Self-heals within the same tick via `Reenter`.
pub(crate) fn out_of_bounds_check(mascot: &mut Mascot, ctx: &mut TickCtx) -> Transition {
    let area = ctx.env.workarea(mascot.env);
    if area.contains(mascot.x(), mascot.y()) {
        return Transition::Continue;
    }
    info!(mascot = %mascot.id, x = mascot.x(), y = mascot.y(), "out of bounds, respawning");
    let x = ctx.rng.range_i32(0, area.width.max(1));
    let y = area.height - 256;
    mascot.set_position(x, y);
    let fall = mascot.prototype.fall_behavior.clone();
    engine::set_behavior(mascot, fall, ctx);
    ctx.env.place_surface(mascot.surface, x, y);
    ctx.env.reset_interpolation(mascot.surface);
    Transition::Reenter
}

/// Check the action's border requirement against the terrain under the
/// mascot. On a mismatch: plain floor means "let a sibling try" (`Next`);
/// anything else means the mascot lost its footing, so force the fall
/// behavior and re-enter.
pub(crate) fn ground_check(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Transition {
    let Some(required) = actionref.node.border else {
        return Transition::Continue;
    };
    let actual = ctx.env.border_type(mascot.env, mascot.x(), mascot.y());
    if actual == required {
        return Transition::Continue;
    }
    if actual != Border::Floor {
        let fall = mascot.prototype.fall_behavior.clone();
        engine::set_behavior(mascot, fall, ctx);
        dispatch::clean(actionref.node.kind, mascot, ctx.board);
        return Transition::Reenter;
    }
    Transition::Next
}

/// Whether the node's border requirement currently holds (the recheck the
/// moving kinds use every tick, with no recovery redirect).
pub(crate) fn border_holds(mascot: &Mascot, actionref: &ActionRef, ctx: &TickCtx) -> bool {
    match actionref.node.border {
        None => true,
        Some(required) => ctx.env.border_type(mascot.env, mascot.x(), mascot.y()) == required,
    }
}

// ---------------------------------------------------------------------------
// Guards, duration, caches
// ---------------------------------------------------------------------------

/// Evaluate both the call-site and the node guard at init. `Ok(false)`
/// means a guard said no; script failure is a hard error.
pub(crate) fn check_guards(
    mascot: &Mascot,
    actionref: &ActionRef,
    ctx: &TickCtx,
) -> Result<bool, TickError> {
    let ref_pass = script::check_condition(ctx.scripts, mascot, actionref.condition.as_ref())
        .map_err(|e| engine::script_failure(mascot, &actionref.node.name, e))?;
    let node_pass = script::check_condition(ctx.scripts, mascot, actionref.node.condition.as_ref())
        .map_err(|e| engine::script_failure(mascot, &actionref.node.name, e))?;
    Ok(ref_pass && node_pass)
}

/// Re-evaluate both guards on a later tick; evaluate-once guards pass.
pub(crate) fn recheck_guards(
    mascot: &Mascot,
    actionref: &ActionRef,
    ctx: &TickCtx,
) -> Result<bool, TickError> {
    let node_pass = script::recheck_condition(ctx.scripts, mascot, actionref.node.condition.as_ref())
        .map_err(|e| engine::script_failure(mascot, &actionref.node.name, e))?;
    let ref_pass = script::recheck_condition(ctx.scripts, mascot, actionref.condition.as_ref())
        .map_err(|e| engine::script_failure(mascot, &actionref.node.name, e))?;
    Ok(ref_pass && node_pass)
}

/// Latch the effective guard for this action so collaborators (and the
/// Breed physics step) can consult it without re-resolving.
pub(crate) fn cache_condition(mascot: &mut Mascot, actionref: &ActionRef) {
    let cond = actionref.effective_condition();
    mascot.current_condition = ConditionCache {
        expr: cond.cloned(),
        evaluated: cond.is_some_and(|c| c.evaluate_once),
    };
}

/// Evaluate the call-site duration limit. Returns the absolute deadline
/// and the raw scripted value; evaluation failure logs and leaves the
/// duration unset.
pub(crate) fn eval_duration(
    mascot: &Mascot,
    actionref: &ActionRef,
    ctx: &TickCtx,
) -> Option<(u32, f32)> {
    let expr = actionref.duration.as_ref()?;
    match ctx.scripts.evaluate(expr.program, mascot) {
        Ok(v) => Some((ctx.tick.saturating_add(v as u32), v)),
        Err(e) => {
            warn!(mascot = %mascot.id, action = %actionref.node.name, error = %e,
                  "duration limit failed to evaluate");
            None
        }
    }
}

/// Reset the frame/animation bookkeeping every leaf init performs.
pub(crate) fn reset_animation_state(mascot: &mut Mascot) {
    mascot.action_index = 0;
    mascot.frame_index = 0;
    mascot.next_frame_tick = 0;
    mascot.animation_index = 0;
}

// ---------------------------------------------------------------------------
// Animation scan and frame advance
// ---------------------------------------------------------------------------

/// First-match-wins scan over the node's content: the first animation
/// whose own guard passes is selected. Non-animation content in a leaf is
/// a structural violation.
pub(crate) fn scan_animation(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &TickCtx,
) -> Result<Option<Arc<Animation>>, TickError> {
    for (i, item) in actionref.node.content.iter().enumerate() {
        let ActionContent::Animation(animation) = item else {
            error!(mascot = %mascot.id, action = %actionref.node.name,
                   "leaf action contains non-animation content");
            return Err(TickError::Structural {
                mascot: mascot.id,
                action: actionref.node.name.clone(),
                detail: "leaf content must be animations",
            });
        };
        match script::check_condition(ctx.scripts, mascot, animation.condition.as_ref()) {
            Ok(true) => {
                mascot.animation_index = i as u16;
                return Ok(Some(animation.clone()));
            }
            Ok(false) => {}
            Err(e) => return Err(engine::script_failure(mascot, &actionref.node.name, e)),
        }
    }
    Ok(None)
}

/// The shared leaf advance step: select an animation, restart the frame
/// counter when the selection changed (and re-enter so the new first frame
/// shows this same tick), otherwise advance the frame when its timer
/// elapsed, applying the kind's wrap rule when frames run out.
pub(crate) fn advance_animation(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &TickCtx,
    wrap: FrameWrap,
    exhausted: Transition,
) -> Result<NextOutcome, TickError> {
    let Some(selected) = scan_animation(mascot, actionref, ctx)? else {
        return Ok(NextOutcome::of(Transition::Next));
    };

    let changed = mascot
        .current_animation
        .as_ref()
        .is_none_or(|c| !Arc::ptr_eq(c, &selected));
    if changed {
        mascot.frame_index = 0;
        mascot.next_frame_tick = ctx.tick;
        let mut outcome = NextOutcome::of(Transition::Reenter);
        outcome.next_animation = Some(selected);
        return Ok(outcome);
    }

    let mut outcome = NextOutcome::of(Transition::Continue);
    if mascot.next_frame_tick <= ctx.tick {
        if mascot.frame_index as usize >= selected.frames.len() {
            let wraps = match wrap {
                FrameWrap::Always => true,
                FrameWrap::IfLoop => actionref.node.loops,
                FrameWrap::IfLoopOrDuration => actionref.node.loops || mascot.action_duration != 0,
            };
            if !wraps {
                return Ok(NextOutcome::of(exhausted));
            }
            mascot.frame_index = 0;
        }
        outcome.next_pose = selected.frames.get(mascot.frame_index as usize).copied();
        mascot.frame_index += 1;
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub(crate) mod dispatch {
    use super::*;
    use crate::action::ActionKind;
    use crate::affordance::AffordanceBoard;
    use crate::engine::Colony;

    pub(crate) fn init(
        mascot: &mut Mascot,
        actionref: &ActionRef,
        ctx: &mut TickCtx,
    ) -> Result<Transition, TickError> {
        match actionref.node.kind {
            ActionKind::Animate => animate::init(mascot, actionref, ctx),
            ActionKind::Interact => interact::interact_init(mascot, actionref, ctx),
            ActionKind::Resist => interact::resist_init(mascot, actionref, ctx),
            ActionKind::Sequence => sequence::init(mascot, actionref, ctx),
            ActionKind::Select => select::init(mascot, actionref, ctx),
            ActionKind::Move => walk::move_init(mascot, actionref, ctx),
            ActionKind::WindowWalk => walk::window_init(mascot, actionref, ctx),
            ActionKind::Fall => fall::init(mascot, actionref, ctx),
            ActionKind::WindowFall => window_fall::init(mascot, actionref, ctx),
            ActionKind::Breed => breed::init(mascot, actionref, ctx),
            ActionKind::Transform => transform::init(mascot, actionref, ctx),
            ActionKind::Offset => offset::init(mascot, actionref, ctx),
            ActionKind::ScanMove => scan::init(mascot, actionref, ctx),
        }
    }

    pub(crate) fn next(
        colony: &mut Colony,
        mascot: &mut Mascot,
        actionref: &ActionRef,
        ctx: &mut TickCtx,
    ) -> Result<NextOutcome, TickError> {
        match actionref.node.kind {
            ActionKind::Animate | ActionKind::Interact => animate::next(mascot, actionref, ctx),
            ActionKind::Resist => interact::resist_next(mascot, actionref, ctx),
            ActionKind::Sequence => sequence::next(mascot, actionref, ctx),
            ActionKind::Select => select::next(mascot, actionref, ctx),
            ActionKind::Move => walk::move_next(mascot, actionref, ctx),
            ActionKind::WindowWalk => walk::window_next(mascot, actionref, ctx),
            ActionKind::Fall => fall::next(mascot, actionref, ctx),
            ActionKind::WindowFall => window_fall::next(mascot, actionref, ctx),
            ActionKind::Breed => breed::next(mascot, actionref, ctx),
            ActionKind::Transform => transform::next(mascot, actionref, ctx),
            ActionKind::Offset => Ok(NextOutcome::of(Transition::Next)),
            ActionKind::ScanMove => scan::next(colony, mascot, actionref, ctx),
        }
    }

    pub(crate) fn tick(
        colony: &mut Colony,
        mascot: &mut Mascot,
        actionref: &ActionRef,
        ctx: &mut TickCtx,
    ) -> Result<Transition, TickError> {
        match actionref.node.kind {
            ActionKind::Animate | ActionKind::Interact | ActionKind::Transform => {
                animate::tick(mascot, actionref, ctx)
            }
            ActionKind::Resist => interact::resist_tick(mascot, actionref, ctx),
            ActionKind::Sequence => {
                warn!(mascot = %mascot.id, action = %actionref.node.name,
                      "physics step invoked on a sequence");
                Ok(Transition::Continue)
            }
            ActionKind::Select => {
                error!(mascot = %mascot.id, action = %actionref.node.name,
                       "physics step invoked on a selector");
                Err(TickError::Structural {
                    mascot: mascot.id,
                    action: actionref.node.name.clone(),
                    detail: "selectors have no physics step",
                })
            }
            ActionKind::Move => walk::move_tick(mascot, actionref, ctx),
            ActionKind::WindowWalk => walk::window_tick(mascot, actionref, ctx),
            ActionKind::Fall => fall::tick(mascot, actionref, ctx),
            ActionKind::WindowFall => window_fall::tick(mascot, actionref, ctx),
            ActionKind::Breed => breed::tick(mascot, actionref, ctx),
            ActionKind::Offset => Ok(Transition::Continue),
            ActionKind::ScanMove => scan::tick(colony, mascot, actionref, ctx),
        }
    }

    pub(crate) fn clean(kind: ActionKind, mascot: &mut Mascot, board: &AffordanceBoard) {
        match kind {
            ActionKind::Animate => animate::clean(mascot, board),
            ActionKind::Interact => interact::interact_clean(mascot, board),
            ActionKind::Resist => interact::resist_clean(mascot),
            ActionKind::Sequence => sequence::clean(mascot),
            ActionKind::Select => select::clean(mascot),
            ActionKind::Move | ActionKind::WindowWalk => walk::clean(mascot, board),
            ActionKind::Fall | ActionKind::WindowFall => fall::clean(mascot, board),
            ActionKind::Breed => breed::clean(mascot),
            ActionKind::Transform => transform::clean(mascot),
            ActionKind::Offset => {}
            ActionKind::ScanMove => scan::clean(mascot, board),
        }
    }
}

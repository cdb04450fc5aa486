// Interact and Resist.
//
// Interact is the visible half of an established rendezvous: an Animate
// body that enters the interact state (which blocks dragging) and
// advertises the node's affordance. Resist is drag-grab feedback: the
// mascot struggles while the user holds it, escaping into the drag
// behavior when the pointer moves far enough, or breaking free of the
// grab entirely when its animation plays out.

use super::{
    FrameWrap, NextOutcome, advance_animation, border_holds, cache_condition, check_guards,
    eval_duration, ground_check, reset_animation_state,
};
use crate::action::ActionRef;
use crate::affordance::AffordanceBoard;
use crate::engine::{self, TickCtx, TickError};
use crate::mascot::Mascot;
use crate::types::{MascotState, Transition};
use tracing::debug;

/// Pointer travel that converts resistance into a full drag.
const DRAG_ESCAPE_THRESHOLD: i32 = 5;

pub(crate) fn interact_init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if actionref.node.content.is_empty() {
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "interact action has no content",
        });
    }
    debug!(mascot = %mascot.id, action = %actionref.node.name, "initializing interact action");

    let grounded = ground_check(mascot, actionref, ctx);
    if grounded != Transition::Continue {
        return Ok(grounded);
    }
    if !check_guards(mascot, actionref, ctx)? {
        return Ok(Transition::Next);
    }
    cache_condition(mascot, actionref);
    mascot.action_duration = eval_duration(mascot, actionref, ctx).map_or(0, |(deadline, _)| deadline);
    reset_animation_state(mascot);

    mascot.state = MascotState::Interact;
    let affordance = actionref.node.affordance.clone();
    mascot.announce_affordance(ctx.board, affordance.as_deref());
    Ok(Transition::Continue)
}

pub(crate) fn interact_clean(mascot: &mut Mascot, board: &AffordanceBoard) {
    mascot.animation_index = 0;
    mascot.frame_index = 0;
    mascot.next_frame_tick = 0;
    mascot.action_duration = 0;
    mascot.announce_affordance(board, None);
}

pub(crate) fn resist_init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if actionref.node.content.is_empty() {
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "resist action has no content",
        });
    }
    if !border_holds(mascot, actionref, ctx) {
        return Ok(Transition::Next);
    }
    if !check_guards(mascot, actionref, ctx)? {
        return Ok(Transition::Next);
    }
    cache_condition(mascot, actionref);

    if let Some((deadline, raw)) = eval_duration(mascot, actionref, ctx) {
        if raw == 0.0 {
            return Ok(Transition::Next);
        }
        mascot.action_duration = deadline;
    }

    reset_animation_state(mascot);
    mascot.announce_affordance(ctx.board, None);
    mascot.state = MascotState::DragResist;
    Ok(Transition::Continue)
}

pub(crate) fn resist_next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    // When the animation plays out without loop or duration, the mascot
    // breaks free of the grab: Escape, not an ordinary exit.
    advance_animation(
        mascot,
        actionref,
        ctx,
        FrameWrap::IfLoopOrDuration,
        Transition::Escape,
    )
}

/// Sample the pointer and follow it a little; sustained pulling switches
/// to the drag behavior proper.
pub(crate) fn resist_tick(
    mascot: &mut Mascot,
    _actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    let (dx, dy) = ctx.env.pointer_delta(mascot.surface, ctx.tick);
    if dx != 0 || dy != 0 {
        let x = mascot.x() + dx;
        let y = mascot.y() + dy;
        mascot.set_position(x, y);
    }
    if dx.abs() >= DRAG_ESCAPE_THRESHOLD || dy.abs() >= DRAG_ESCAPE_THRESHOLD {
        mascot.dragged_tick = ctx.tick;
        let drag = mascot.prototype.drag_behavior.clone();
        engine::set_behavior(mascot, drag, ctx);
        return Ok(Transition::Reenter);
    }
    Ok(Transition::Continue)
}

pub(crate) fn resist_clean(mascot: &mut Mascot) {
    mascot.animation_index = 0;
    mascot.frame_index = 0;
    mascot.next_frame_tick = 0;
    mascot.action_duration = 0;
}

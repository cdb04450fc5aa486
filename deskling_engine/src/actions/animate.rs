// Animate: the baseline leaf.
//
// Plays its animations (optionally looping) and drifts the mascot by the
// velocity the current pose imposes. Interact shares this advance and
// physics step, differing only at init.

use super::{
    FrameWrap, NextOutcome, advance_animation, cache_condition, check_guards, eval_duration,
    ground_check, out_of_bounds_check, recheck_guards, reset_animation_state,
};
use crate::action::ActionRef;
use crate::affordance::AffordanceBoard;
use crate::engine::{TickCtx, TickError};
use crate::mascot::Mascot;
use crate::types::{MascotState, Transition};
use tracing::debug;

pub(crate) fn init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if actionref.node.content.is_empty() {
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "animate action has no content",
        });
    }
    debug!(mascot = %mascot.id, action = %actionref.node.name, "initializing animate action");

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
    mascot.state = MascotState::Stay;
    let affordance = actionref.node.affordance.clone();
    mascot.announce_affordance(ctx.board, affordance.as_deref());

    Ok(Transition::Continue)
}

pub(crate) fn next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    if mascot.action_duration != 0 && ctx.tick >= mascot.action_duration {
        return Ok(NextOutcome::of(Transition::Next));
    }

    let grounded = ground_check(mascot, actionref, ctx);
    if grounded != Transition::Continue {
        return Ok(NextOutcome::of(grounded));
    }
    if !recheck_guards(mascot, actionref, ctx)? {
        return Ok(NextOutcome::of(Transition::Next));
    }

    advance_animation(mascot, actionref, ctx, FrameWrap::IfLoop, Transition::Next)
}

/// Drift by the pose velocity. Horizontal velocity moves against the
/// facing direction; vertical velocity is screen-down positive.
pub(crate) fn tick(
    mascot: &mut Mascot,
    _actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    let oob = out_of_bounds_check(mascot, ctx);
    if oob != Transition::Continue {
        return Ok(oob);
    }

    let (vel_x, vel_y) = mascot.velocity();
    if vel_x == 0.0 && vel_y == 0.0 {
        return Ok(Transition::Continue);
    }

    let x = mascot.x();
    let y = mascot.y();
    let step_x = if mascot.facing_right() { -vel_x } else { vel_x };
    let new_x = (x as f32 + step_x) as i32;
    let new_y = (y as f32 - vel_y) as i32;

    if new_x != x || new_y != y {
        let reply = ctx.env.move_surface(mascot.surface, new_x, new_y, true);
        mascot.set_position(reply.x, reply.y);
    }
    Ok(Transition::Continue)
}

pub(crate) fn clean(mascot: &mut Mascot, board: &AffordanceBoard) {
    mascot.animation_index = 0;
    mascot.frame_index = 0;
    mascot.next_frame_tick = 0;
    mascot.action_duration = 0;
    mascot.announce_affordance(board, None);
}

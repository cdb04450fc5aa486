// Transform: swap this mascot to another species.
//
// The target species must exist in the prototype store at init (a missing
// species declines rather than erroring, so a misconfigured tree degrades
// to its siblings). The species swap itself is performed by the driver
// when this kind reports the `Transform` transition: on duration expiry,
// or when the animation plays out without looping.

use super::{
    FrameWrap, NextOutcome, advance_animation, cache_condition, check_guards, eval_duration,
    ground_check, recheck_guards, reset_animation_state,
};
use crate::action::ActionRef;
use crate::engine::{TickCtx, TickError};
use crate::mascot::Mascot;
use crate::types::Transition;
use tracing::warn;

pub(crate) fn init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    match actionref.node.transform_species.as_deref() {
        Some(species) => {
            if ctx.prototypes.get(species).is_none() {
                warn!(mascot = %mascot.id, species, "transform target species not found");
                return Ok(Transition::Next);
            }
        }
        None => {
            warn!(mascot = %mascot.id, action = %actionref.node.name,
                  "transform action has no target species");
            return Ok(Transition::Next);
        }
    }

    let grounded = ground_check(mascot, actionref, ctx);
    if grounded != Transition::Continue {
        return Ok(grounded);
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
    Ok(Transition::Continue)
}

pub(crate) fn next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    if mascot.action_duration != 0 && ctx.tick >= mascot.action_duration {
        return Ok(NextOutcome::of(Transition::Transform));
    }

    let grounded = ground_check(mascot, actionref, ctx);
    if grounded != Transition::Continue {
        return Ok(NextOutcome::of(grounded));
    }
    if !recheck_guards(mascot, actionref, ctx)? {
        return Ok(NextOutcome::of(Transition::Next));
    }

    advance_animation(
        mascot,
        actionref,
        ctx,
        FrameWrap::IfLoopOrDuration,
        Transition::Transform,
    )
}

pub(crate) fn clean(mascot: &mut Mascot) {
    mascot.animation_index = 0;
    mascot.frame_index = 0;
    mascot.next_frame_tick = 0;
    mascot.action_duration = 0;
}

// Breed: spawn clones at a scripted interval, up to a scripted count.
//
// Gated on the global breeding flag and the population cap; both produce a
// silent decline, never an error. The clone itself is created by the
// driver when this kind reports the `Clone` transition.

use super::{
    NextOutcome, cache_condition, check_guards, eval_duration, ground_check, out_of_bounds_check,
    recheck_guards, reset_animation_state, scan_animation,
};
use crate::action::ActionRef;
use crate::engine::{TickCtx, TickError};
use crate::mascot::Mascot;
use crate::types::Transition;
use crate::variables::{Slot, resolve};
use std::sync::Arc;
use tracing::warn;

pub(crate) fn init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if !ctx.config.breeding {
        return Ok(Transition::Next);
    }
    if ctx.config.mascot_limit <= ctx.population {
        return Ok(Transition::Next);
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
    mascot.born_count = 0;
    mascot.born_tick = ctx.tick;

    for slot in [Slot::BornX, Slot::BornY, Slot::BornInterval, Slot::BornCount] {
        mascot.vars.set_i(slot, 0);
    }
    for slot in [Slot::BornX, Slot::BornY, Slot::BornCount, Slot::BornInterval] {
        let binding = resolve(&actionref.overrides, &actionref.node.defaults, slot).clone();
        mascot
            .adopt_variable(slot, &binding, ctx.scripts)
            .map_err(|e| crate::engine::script_failure(mascot, &actionref.node.name, e))?;
        if slot == Slot::BornCount && !binding.used {
            mascot.vars.set_i(Slot::BornCount, 1);
        }
    }

    mascot.announce_affordance(ctx.board, None);
    Ok(Transition::Continue)
}

pub(crate) fn next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    // A contentless breed is a pure spawner.
    if actionref.node.content.is_empty() {
        return Ok(NextOutcome::of(Transition::Clone));
    }

    let grounded = ground_check(mascot, actionref, ctx);
    if grounded != Transition::Continue {
        return Ok(NextOutcome::of(grounded));
    }
    if !recheck_guards(mascot, actionref, ctx)? {
        return Ok(NextOutcome::of(Transition::Next));
    }

    let remaining = mascot.vars.get_i(Slot::BornCount) > mascot.born_count as i32;

    if mascot.action_duration != 0 && mascot.action_duration <= ctx.tick {
        if remaining {
            return Ok(NextOutcome::of(Transition::Clone));
        }
        return Ok(NextOutcome::of(Transition::Next));
    }

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

    // Interval pacing between clones.
    let interval = mascot.vars.get_i(Slot::BornInterval);
    if interval > 0
        && (ctx.tick - mascot.born_tick) as i32 > interval
        && (mascot.born_count as i32) < mascot.vars.get_i(Slot::BornCount)
    {
        return Ok(NextOutcome::of(Transition::Clone));
    }

    let mut outcome = NextOutcome::of(Transition::Continue);
    if mascot.next_frame_tick <= ctx.tick {
        if mascot.frame_index as usize >= selected.frames.len() {
            if actionref.node.loops || mascot.action_duration != 0 {
                mascot.frame_index = 0;
            } else if remaining {
                return Ok(NextOutcome::of(Transition::Clone));
            } else {
                return Ok(NextOutcome::of(Transition::Next));
            }
        }
        outcome.next_pose = selected.frames.get(mascot.frame_index as usize).copied();
        mascot.frame_index += 1;
    }
    Ok(outcome)
}

/// No movement; just re-checks the latched guard unless it was
/// evaluate-once.
pub(crate) fn tick(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    let oob = out_of_bounds_check(mascot, ctx);
    if oob != Transition::Continue {
        return Ok(oob);
    }

    if mascot.current_condition.expr.is_some() && !mascot.current_condition.evaluated {
        let value = match actionref.node.condition.as_ref() {
            Some(cond) => match ctx.scripts.evaluate(cond.program, mascot) {
                Ok(v) => v,
                Err(e) => {
                    warn!(mascot = %mascot.id, action = %actionref.node.name, error = %e,
                          "breed guard failed mid-action");
                    0.0
                }
            },
            None => 1.0,
        };
        if value == 0.0 {
            return Ok(Transition::Next);
        }
    }
    Ok(Transition::Continue)
}

pub(crate) fn clean(mascot: &mut Mascot) {
    mascot.animation_index = 0;
    mascot.frame_index = 0;
    mascot.next_frame_tick = 0;
    mascot.action_duration = 0;
}

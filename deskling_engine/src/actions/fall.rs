// Fall: gravity and drag integration until a surface opposes the motion.
//
// The numeric rule every falling kind shares: per axis,
// `v = v - v*drag (+ gravity on y)`, then the velocity's integer part
// becomes the step and its fractional part accumulates in the ModX/ModY
// slots, re-extracted with a floating modulo each tick. Sub-integer
// velocities therefore still move the mascot over several ticks instead of
// truncating to zero forever.
//
// A 5-tick watchdog refreshed on every successful move ends the action if
// the environment keeps rejecting movement.

use super::{
    FrameWrap, NextOutcome, advance_animation, cache_condition, check_guards, eval_duration,
    out_of_bounds_check, recheck_guards, reset_animation_state,
};
use crate::action::ActionRef;
use crate::affordance::AffordanceBoard;
use crate::engine::{TickCtx, TickError};
use crate::mascot::Mascot;
use crate::types::{Border, MascotState, MoveStatus, Transition};
use crate::variables::{Slot, resolve};
use tracing::{debug, info};

/// Ticks without a successful move before the fall gives up.
pub(crate) const STALL_WATCHDOG: u32 = 5;

pub(crate) const DEFAULT_AIR_DRAG_X: f32 = 0.05;
pub(crate) const DEFAULT_AIR_DRAG_Y: f32 = 0.1;
pub(crate) const DEFAULT_GRAVITY: f32 = 2.0;

pub(crate) fn init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if actionref.node.content.is_empty() {
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "fall action has no content",
        });
    }

    if !check_guards(mascot, actionref, ctx)? {
        return Ok(Transition::Next);
    }
    cache_condition(mascot, actionref);

    if let Some((deadline, _)) = eval_duration(mascot, actionref, ctx) {
        mascot.action_duration = deadline;
    }
    reset_animation_state(mascot);

    for slot in [
        Slot::VelocityX,
        Slot::VelocityY,
        Slot::AirDragX,
        Slot::AirDragY,
        Slot::InitialVelX,
        Slot::InitialVelY,
    ] {
        mascot.vars.set_f(slot, 0.0);
    }

    resolve_physics_slots(mascot, actionref, ctx)?;

    // Abort when the terrain already opposes the direction of travel.
    let border = ctx.env.border_type(mascot.env, mascot.x(), mascot.y());
    if mascot.vars.get_f(Slot::InitialVelY) < 0.0 {
        if border == Border::Ceiling {
            clean(mascot, ctx.board);
            return Ok(Transition::Next);
        }
    } else if border != Border::None {
        clean(mascot, ctx.board);
        return Ok(Transition::Next);
    }
    if mascot.vars.get_f(Slot::InitialVelX) == 0.0 && border == Border::Wall {
        clean(mascot, ctx.board);
        return Ok(Transition::Next);
    }

    let ivx = mascot.vars.get_f(Slot::InitialVelX);
    let ivy = mascot.vars.get_f(Slot::InitialVelY);
    mascot.vars.set_f(Slot::VelocityX, ivx);
    mascot.vars.set_f(Slot::VelocityY, ivy);

    mascot.state = MascotState::Fall;
    mascot.action_duration = ctx.tick + STALL_WATCHDOG;
    let affordance = actionref.node.affordance.clone();
    mascot.announce_affordance(ctx.board, affordance.as_deref());

    info!(mascot = %mascot.id, action = %actionref.node.name, "started falling");
    Ok(Transition::Continue)
}

/// Resolve InitialVelX/Y, AirDragX/Y, and Gravity from the call-site
/// overrides or the node defaults, with the engine's fallback constants
/// for anything left unbound.
pub(crate) fn resolve_physics_slots(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &TickCtx,
) -> Result<(), TickError> {
    for slot in [
        Slot::InitialVelX,
        Slot::InitialVelY,
        Slot::AirDragX,
        Slot::AirDragY,
        Slot::Gravity,
    ] {
        let binding = resolve(&actionref.overrides, &actionref.node.defaults, slot).clone();
        mascot
            .adopt_variable(slot, &binding, ctx.scripts)
            .map_err(|e| crate::engine::script_failure(mascot, &actionref.node.name, e))?;
        if !binding.used {
            match slot {
                Slot::AirDragX => mascot.vars.set_f(slot, DEFAULT_AIR_DRAG_X),
                Slot::AirDragY => mascot.vars.set_f(slot, DEFAULT_AIR_DRAG_Y),
                Slot::Gravity => mascot.vars.set_f(slot, DEFAULT_GRAVITY),
                _ => {}
            }
        }
    }
    Ok(())
}

/// One integration step: returns the integer displacement and updates the
/// velocity and remainder slots in place. Facing follows the horizontal
/// velocity sign.
pub(crate) fn integrate(mascot: &mut Mascot) -> (i32, i32) {
    let mut vel_x = mascot.vars.get_f(Slot::VelocityX);
    let mut vel_y = mascot.vars.get_f(Slot::VelocityY);
    let drag_x = mascot.vars.get_f(Slot::AirDragX);
    let drag_y = mascot.vars.get_f(Slot::AirDragY);
    let gravity = mascot.vars.get_f(Slot::Gravity);

    vel_x -= vel_x * drag_x;
    vel_y = vel_y - vel_y * drag_y + gravity;
    mascot.vars.set_f(Slot::VelocityX, vel_x);
    mascot.vars.set_f(Slot::VelocityY, vel_y);

    let mod_x = mascot.vars.get_f(Slot::ModX) + vel_x % 1.0;
    let mod_y = mascot.vars.get_f(Slot::ModY) + vel_y % 1.0;
    let step_x = (vel_x.trunc() + mod_x) as i32;
    let step_y = (vel_y.trunc() + mod_y) as i32;
    mascot.vars.set_f(Slot::ModX, mod_x % 1.0);
    mascot.vars.set_f(Slot::ModY, mod_y % 1.0);

    (step_x, step_y)
}

pub(crate) fn tick(
    mascot: &mut Mascot,
    _actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    let oob = out_of_bounds_check(mascot, ctx);
    if oob != Transition::Continue {
        return Ok(oob);
    }

    let mut facing = mascot.facing_right();
    let vel_x = mascot.vars.get_f(Slot::VelocityX);
    if vel_x != 0.0 {
        facing = vel_x > 0.0;
    }

    let (step_x, step_y) = integrate(mascot);
    let pos_x = mascot.x() + step_x;
    let pos_y = mascot.y() - step_y;

    if mascot.facing_right() != facing {
        mascot.set_facing_right(facing);
        mascot.reattach_pose(ctx.env);
    }

    if pos_x != mascot.x() || pos_y != mascot.y() {
        let reply = ctx.env.move_surface(mascot.surface, pos_x, pos_y, true);
        mascot.set_position(reply.x, reply.y);
        if reply.status == MoveStatus::Clamped {
            // Nudge out of the two sticky corners the clamp can pin us to.
            let (screen_w, _) = ctx.env.screen_size(mascot.env);
            if mascot.x() == 0 && mascot.y() == 0 {
                mascot.vars.set_i(Slot::X, 1);
            } else if mascot.y() == -1 && mascot.x() == screen_w {
                mascot.vars.set_i(Slot::X, screen_w - 1);
            }
            return Ok(Transition::Reenter);
        }
        mascot.action_duration = ctx.tick + STALL_WATCHDOG;
    }

    Ok(Transition::Continue)
}

pub(crate) fn next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    let border = ctx.env.border_type(mascot.env, mascot.x(), mascot.y());
    if landed(border, mascot.vars.get_f(Slot::VelocityY)) {
        return Ok(NextOutcome::of(Transition::Next));
    }

    if mascot.action_duration <= ctx.tick {
        debug!(mascot = %mascot.id, "fall watchdog elapsed");
        return Ok(NextOutcome::of(Transition::Next));
    }

    if !recheck_guards(mascot, actionref, ctx)? {
        return Ok(NextOutcome::of(Transition::Next));
    }

    let mut outcome =
        advance_animation(mascot, actionref, ctx, FrameWrap::Always, Transition::Next)?;
    if outcome.status == Transition::Continue || outcome.status == Transition::Reenter {
        outcome.next_action = Some(actionref.clone());
    }
    Ok(outcome)
}

/// Whether the terrain under the mascot opposes the current motion: any
/// wall, a ceiling against upward velocity, a floor against downward
/// velocity, or any surface at all when vertically at rest.
pub(crate) fn landed(border: Border, vel_y: f32) -> bool {
    if border == Border::Wall {
        return true;
    }
    if vel_y != 0.0 {
        (border == Border::Ceiling && vel_y < 0.0) || (border == Border::Floor && vel_y > 0.0)
    } else {
        border != Border::None
    }
}

pub(crate) fn clean(mascot: &mut Mascot, board: &AffordanceBoard) {
    for slot in [
        Slot::VelocityX,
        Slot::VelocityY,
        Slot::ModX,
        Slot::ModY,
        Slot::AirDragX,
        Slot::AirDragY,
        Slot::Gravity,
    ] {
        mascot.vars.set_f(slot, 0.0);
    }
    mascot.announce_affordance(board, None);
}

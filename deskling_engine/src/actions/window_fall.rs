// WindowFall: fall while carrying the foreign window.
//
// Same integration as Fall, plus the window is repositioned against the
// mascot's corner (by the WindowOffsetX/Y slots, mirrored by facing) on
// every step. Feature-gated; when the carry is impossible for any reason
// (feature off, window missing, inactive, moved away, or drifted beyond
// tolerance) the mascot drops into its plain fall behavior.

use super::{
    FrameWrap, NextOutcome, advance_animation, cache_condition, check_guards, eval_duration,
    out_of_bounds_check, recheck_guards, reset_animation_state,
};
use crate::action::ActionRef;
use crate::actions::fall;
use crate::engine::{self, TickCtx, TickError};
use crate::environment::{ForeignWindow, flip_y};
use crate::mascot::Mascot;
use crate::types::{Border, MascotState, MoveStatus, Transition};
use crate::variables::Slot;
use tracing::{debug, info};

/// Pixel tolerance before the carried window counts as lost.
const CARRY_TOLERANCE: i32 = 50;

/// Redirect into the plain fall behavior.
fn drop_into_fall(mascot: &mut Mascot, ctx: &mut TickCtx) -> Transition {
    let fall_behavior = mascot.prototype.fall_behavior.clone();
    engine::set_behavior(mascot, fall_behavior, ctx);
    Transition::Reenter
}

pub(crate) fn init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if !ctx.config.window_interactions {
        debug!(mascot = %mascot.id, "window interactions disabled, falling instead");
        return Ok(drop_into_fall(mascot, ctx));
    }
    if actionref.node.content.is_empty() {
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "window fall action has no content",
        });
    }
    let window = ctx.env.foreign_window(mascot.env);
    let usable = window.is_some_and(|w| w.active) && ctx.env.foreign_window_movable(mascot.env);
    if !usable {
        debug!(mascot = %mascot.id, "no usable foreign window, falling instead");
        return Ok(drop_into_fall(mascot, ctx));
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
    fall::resolve_physics_slots(mascot, actionref, ctx)?;
    for slot in [Slot::WindowOffsetX, Slot::WindowOffsetY] {
        let binding =
            crate::variables::resolve(&actionref.overrides, &actionref.node.defaults, slot).clone();
        mascot
            .adopt_variable(slot, &binding, ctx.scripts)
            .map_err(|e| engine::script_failure(mascot, &actionref.node.name, e))?;
    }

    let ivx = mascot.vars.get_f(Slot::InitialVelX);
    let ivy = mascot.vars.get_f(Slot::InitialVelY);
    mascot.vars.set_f(Slot::VelocityX, ivx);
    mascot.vars.set_f(Slot::VelocityY, ivy);

    mascot.state = MascotState::WindowFall;
    mascot.action_duration = ctx.tick + fall::STALL_WATCHDOG;
    let affordance = actionref.node.affordance.clone();
    mascot.announce_affordance(ctx.board, affordance.as_deref());
    Ok(Transition::Continue)
}

fn window_offsets(mascot: &Mascot, ctx: &TickCtx) -> (i32, i32) {
    let scale = ctx.env.screen_scale(mascot.env);
    (
        (mascot.vars.get_i(Slot::WindowOffsetX) as f32 / scale) as i32,
        (mascot.vars.get_i(Slot::WindowOffsetY) as f32 / scale) as i32,
    )
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

    let (step_x, step_y) = fall::integrate(mascot);
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
            let area = ctx.env.workarea(mascot.env);
            if mascot.x() == 0 && mascot.y() == 0 {
                mascot.vars.set_i(Slot::X, 1);
            } else if mascot.y() == -1 && mascot.x() == area.width {
                mascot.vars.set_i(Slot::X, area.width - 1);
            }
            return Ok(Transition::Reenter);
        }
        mascot.action_duration = ctx.tick + fall::STALL_WATCHDOG;

        if let Some(window) = ctx.env.foreign_window(mascot.env)
            && window.active
        {
            let (offset_x, offset_y) = window_offsets(mascot, ctx);
            let area_h = ctx.env.workarea(mascot.env).height;
            let win_x = if facing {
                mascot.x() - offset_x
            } else {
                mascot.x() + offset_x - window.width
            };
            let win_y = flip_y(area_h, mascot.y()) + offset_y - window.height;
            if ctx.env.move_foreign_window(mascot.env, win_x, win_y) == MoveStatus::Invalid {
                return Ok(drop_into_fall(mascot, ctx));
            }
        }
    }
    Ok(Transition::Continue)
}

/// Whether the carried window slipped out of the mascot's grip.
fn window_lost(mascot: &Mascot, window: &ForeignWindow, ctx: &TickCtx) -> bool {
    if !window.active || window.moved {
        return true;
    }
    let (offset_x, offset_y) = window_offsets(mascot, ctx);
    let area_h = ctx.env.workarea(mascot.env).height;
    let mascot_screen_y = flip_y(area_h, mascot.y());
    let corner_x = if mascot.facing_right() {
        window.x
    } else {
        window.x + window.width
    };
    let grip_x = mascot.x()
        + if mascot.facing_right() {
            offset_x
        } else {
            -offset_x
        };
    let distance_x = (grip_x - corner_x).abs();
    let distance_y = ((mascot_screen_y + offset_y) - (window.y + window.height)).abs();
    distance_x > CARRY_TOLERANCE || distance_y > CARRY_TOLERANCE
}

pub(crate) fn next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    let border = ctx.env.border_type(mascot.env, mascot.x(), mascot.y());
    if border == Border::Wall {
        return Ok(NextOutcome::of(Transition::Next));
    }

    let window = ctx.env.foreign_window(mascot.env);
    let lost = match &window {
        Some(w) => window_lost(mascot, w, ctx),
        None => true,
    };
    if lost {
        info!(mascot = %mascot.id, "carried window lost");
        let fall_behavior = mascot.prototype.fall_behavior.clone();
        engine::set_behavior(mascot, fall_behavior, ctx);
        fall::clean(mascot, ctx.board);
        return Ok(NextOutcome::of(Transition::Next));
    }

    if fall::landed(border, mascot.vars.get_f(Slot::VelocityY)) {
        return Ok(NextOutcome::of(Transition::Next));
    }
    if mascot.action_duration <= ctx.tick {
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

// Move: walk toward scripted target coordinates. WindowWalk is the same
// stepping with the foreign window dragged along.
//
// Targets resolve at init from the call-site overrides; an unbound axis
// becomes the -1 sentinel and is not constrained. The walk speed comes
// from the current pose's velocity, clamping at arrival so the mascot
// never overshoots.

use super::{
    FrameWrap, NextOutcome, advance_animation, border_holds, cache_condition, check_guards,
    eval_duration, out_of_bounds_check, recheck_guards, reset_animation_state,
};
use crate::action::ActionRef;
use crate::affordance::AffordanceBoard;
use crate::engine::{self, TickCtx, TickError};
use crate::environment::flip_y;
use crate::mascot::Mascot;
use crate::types::{MascotState, MoveStatus, Transition};
use crate::variables::{Slot, resolve};
use tracing::debug;

/// Resolve TargetX/TargetY from overrides-else-defaults; unbound axes get
/// the -1 sentinel.
fn resolve_targets(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &TickCtx,
) -> Result<(), TickError> {
    mascot.vars.set_i(Slot::TargetX, 0);
    mascot.vars.set_i(Slot::TargetY, 0);
    mascot.vars.set_f(Slot::VelocityX, 0.0);
    mascot.vars.set_f(Slot::VelocityY, 0.0);

    for slot in [Slot::TargetX, Slot::TargetY] {
        let binding = resolve(&actionref.overrides, &actionref.node.defaults, slot).clone();
        mascot
            .adopt_variable(slot, &binding, ctx.scripts)
            .map_err(|e| engine::script_failure(mascot, &actionref.node.name, e))?;
        if !binding.used {
            mascot.vars.set_i(slot, -1);
        }
    }
    Ok(())
}

pub(crate) fn move_init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if actionref.node.content.is_empty() {
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "move action has no content",
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
    resolve_targets(mascot, actionref, ctx)?;

    // Targets arrive in screen coordinates; clamp to the screen and flip y
    // into mascot space.
    let (screen_w, screen_h) = ctx.env.screen_size(mascot.env);
    let tx = mascot.vars.get_i(Slot::TargetX);
    if tx != -1 {
        mascot.vars.set_i(Slot::TargetX, tx.clamp(0, screen_w));
    }
    let ty = mascot.vars.get_i(Slot::TargetY);
    if ty != -1 {
        let clamped = ty.clamp(0, screen_h);
        mascot
            .vars
            .set_i(Slot::TargetY, flip_y(ctx.env.workarea(mascot.env).height, clamped));
    }

    mascot.state = MascotState::Move;
    let affordance = actionref.node.affordance.clone();
    mascot.announce_affordance(ctx.board, affordance.as_deref());
    Ok(Transition::Continue)
}

pub(crate) fn window_init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if !ctx.config.window_interactions {
        debug!(mascot = %mascot.id, "window interactions disabled, falling instead");
        let fall = mascot.prototype.fall_behavior.clone();
        engine::set_behavior(mascot, fall, ctx);
        return Ok(Transition::Reenter);
    }
    if actionref.node.content.is_empty() {
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "window walk action has no content",
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
    resolve_targets(mascot, actionref, ctx)?;

    for slot in [Slot::WindowOffsetX, Slot::WindowOffsetY] {
        let binding = resolve(&actionref.overrides, &actionref.node.defaults, slot).clone();
        mascot
            .adopt_variable(slot, &binding, ctx.scripts)
            .map_err(|e| engine::script_failure(mascot, &actionref.node.name, e))?;
    }

    // Window walks stay within the work area and keep targets in mascot
    // coordinates.
    let area = ctx.env.workarea(mascot.env);
    let tx = mascot.vars.get_i(Slot::TargetX);
    if tx != -1 {
        mascot.vars.set_i(Slot::TargetX, tx.clamp(0, area.width));
    }
    let ty = mascot.vars.get_i(Slot::TargetY);
    if ty != -1 {
        mascot.vars.set_i(Slot::TargetY, ty.clamp(0, area.height));
    }

    mascot.state = MascotState::WindowWalk;
    let affordance = actionref.node.affordance.clone();
    mascot.announce_affordance(ctx.board, affordance.as_deref());
    Ok(Transition::Continue)
}

fn arrived(mascot: &Mascot) -> bool {
    let tx = mascot.vars.get_i(Slot::TargetX);
    let ty = mascot.vars.get_i(Slot::TargetY);
    (mascot.x() == tx || tx == -1) && (mascot.y() == ty || ty == -1)
}

fn shared_next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    if mascot.action_duration != 0 && ctx.tick >= mascot.action_duration {
        return Ok(NextOutcome::of(Transition::Next));
    }
    if !border_holds(mascot, actionref, ctx) {
        return Ok(NextOutcome::of(Transition::Next));
    }
    if arrived(mascot) {
        return Ok(NextOutcome::of(Transition::Next));
    }
    if !recheck_guards(mascot, actionref, ctx)? {
        return Ok(NextOutcome::of(Transition::Next));
    }
    advance_animation(mascot, actionref, ctx, FrameWrap::Always, Transition::Next)
}

pub(crate) fn move_next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    shared_next(mascot, actionref, ctx)
}

pub(crate) fn window_next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    // Losing the window mid-walk drops the mascot into a plain fall.
    let window = ctx.env.foreign_window(mascot.env);
    let lost = match window {
        Some(w) => !w.active || w.moved,
        None => true,
    };
    if lost {
        debug!(mascot = %mascot.id, "foreign window lost during walk");
        let fall = mascot.prototype.fall_behavior.clone();
        engine::set_behavior(mascot, fall, ctx);
        clean(mascot, ctx.board);
        return Ok(NextOutcome::of(Transition::Next));
    }
    shared_next(mascot, actionref, ctx)
}

/// Step the horizontal axis one tick, clamping at arrival. Pose velocities
/// are negative-forward: facing right subtracts the velocity, facing left
/// adds it, so a walking pose's `-2` moves the mascot 2 px toward its
/// target either way.
pub(crate) fn step_axis_x(pos: i32, target: i32, vel: f32, facing_right: bool) -> i32 {
    if facing_right {
        if pos as f32 - vel > target as f32 {
            target
        } else {
            (pos as f32 - vel) as i32
        }
    } else if (pos as f32 + vel) < target as f32 {
        target
    } else {
        (pos as f32 + vel) as i32
    }
}

/// Step the vertical axis one tick, clamping at arrival. Positive pose
/// velocity moves down (mascot y grows up).
pub(crate) fn step_axis_y(pos: i32, target: i32, vel: f32) -> i32 {
    let down = pos > target;
    if down {
        if pos as f32 - vel <= target as f32 {
            target
        } else {
            (pos as f32 - vel) as i32
        }
    } else if pos as f32 + vel >= target as f32 {
        target
    } else {
        (pos as f32 + vel) as i32
    }
}

/// Advance both axes toward the targets. Returns the stepped position and
/// the effective (clamped) targets used for the arrival comparison.
pub(crate) fn step_toward_targets(
    mascot: &mut Mascot,
    ctx: &mut TickCtx,
    clamp_to_workarea: bool,
) -> (i32, i32, i32, i32) {
    let area = ctx.env.workarea(mascot.env);
    let (screen_w, screen_h) = ctx.env.screen_size(mascot.env);
    let (low_x, high_x, low_y, high_y) = if clamp_to_workarea {
        (area.left(), area.right(), area.bottom(), area.top())
    } else {
        (0, screen_w, 0, screen_h)
    };

    let mut pos_x = mascot.x();
    let mut pos_y = mascot.y();
    let (vel_x, vel_y) = mascot.velocity();
    let mut facing = mascot.facing_right();

    let mut tx = mascot.vars.get_i(Slot::TargetX);
    if tx != -1 {
        if pos_x < tx {
            facing = true;
        } else if pos_x > tx {
            facing = false;
        }
        tx = tx.clamp(low_x, high_x);
        pos_x = step_axis_x(pos_x, tx, vel_x, facing);
    }

    let mut ty = mascot.vars.get_i(Slot::TargetY);
    if ty != -1 {
        let clamped = ty.clamp(low_y, high_y);
        if clamped != ty {
            mascot.vars.set_i(Slot::TargetY, clamped);
            ty = clamped;
        }
        pos_y = step_axis_y(pos_y, clamped, vel_y);
    }

    if mascot.facing_right() != facing {
        mascot.set_facing_right(facing);
        mascot.reattach_pose(ctx.env);
    }
    (pos_x, pos_y, tx, ty)
}

pub(crate) fn move_tick(
    mascot: &mut Mascot,
    _actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    let oob = out_of_bounds_check(mascot, ctx);
    if oob != Transition::Continue {
        return Ok(oob);
    }

    let clamp_to_workarea = mascot.state == MascotState::WindowWalk;
    let (pos_x, pos_y, tx, ty) = step_toward_targets(mascot, ctx, clamp_to_workarea);

    if (pos_x == tx || tx == -1) && (pos_y == ty || ty == -1) {
        debug!(mascot = %mascot.id, x = pos_x, y = pos_y, "reached move target");
        let reply = ctx.env.move_surface(mascot.surface, pos_x, pos_y, true);
        mascot.set_position(reply.x, reply.y);
        return Ok(Transition::Reenter);
    }

    if pos_x != mascot.x() || pos_y != mascot.y() {
        let reply = ctx.env.move_surface(mascot.surface, pos_x, pos_y, true);
        mascot.set_position(reply.x, reply.y);
        if reply.status == MoveStatus::Clamped {
            // The environment refused the path; stop constraining either
            // axis and let `next` finish the action.
            mascot.vars.set_i(Slot::TargetX, -1);
            mascot.vars.set_i(Slot::TargetY, -1);
            return Ok(Transition::Reenter);
        }
    }
    Ok(Transition::Continue)
}

pub(crate) fn window_tick(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    let before_x = mascot.x();
    let before_y = mascot.y();
    let result = move_tick(mascot, actionref, ctx)?;

    if (mascot.x() != before_x || mascot.y() != before_y)
        && let Some(window) = ctx.env.foreign_window(mascot.env)
        && window.active
    {
        let scale = ctx.env.screen_scale(mascot.env);
        let offset_x = (mascot.vars.get_i(Slot::WindowOffsetX) as f32 / scale) as i32;
        let offset_y = (mascot.vars.get_i(Slot::WindowOffsetY) as f32 / scale) as i32;
        let area_h = ctx.env.workarea(mascot.env).height;
        let win_x = if mascot.facing_right() {
            mascot.x() - offset_x
        } else {
            mascot.x() + offset_x - window.width
        };
        let win_y = flip_y(area_h, mascot.y()) + offset_y - window.height;
        if ctx.env.move_foreign_window(mascot.env, win_x, win_y) == MoveStatus::Invalid {
            let fall = mascot.prototype.fall_behavior.clone();
            engine::set_behavior(mascot, fall, ctx);
            return Ok(Transition::Reenter);
        }
    }
    Ok(result)
}

pub(crate) fn clean(mascot: &mut Mascot, board: &AffordanceBoard) {
    mascot.vars.set_i(Slot::TargetX, 0);
    mascot.vars.set_i(Slot::TargetY, 0);
    mascot.vars.set_f(Slot::VelocityX, 0.0);
    mascot.vars.set_f(Slot::VelocityY, 0.0);
    mascot.announce_affordance(board, None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horizontal_step_moves_against_pose_velocity_sign() {
        // Walking poses carry negative-forward velocity.
        assert_eq!(step_axis_x(400, 500, -10.0, true), 410);
        assert_eq!(step_axis_x(600, 500, -10.0, false), 590);
    }

    #[test]
    fn horizontal_step_clamps_at_arrival() {
        assert_eq!(step_axis_x(495, 500, -10.0, true), 500);
        assert_eq!(step_axis_x(505, 500, -10.0, false), 500);
    }

    #[test]
    fn vertical_step_moves_toward_target() {
        // Positive velocity, target below: descend.
        assert_eq!(step_axis_y(300, 0, 5.0), 295);
        // Target above: ascend.
        assert_eq!(step_axis_y(0, 300, 5.0), 5);
    }

    #[test]
    fn vertical_step_clamps_at_arrival() {
        assert_eq!(step_axis_y(3, 0, 5.0), 0);
        assert_eq!(step_axis_y(297, 300, 5.0), 300);
    }
}

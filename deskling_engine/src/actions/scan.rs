// ScanMove: seek a mascot advertising an affordance and establish an
// interaction on arrival.
//
// The target is acquired at init (no advertiser means the action simply
// declines) and re-validated every tick; a target that stopped advertising
// is replaced when another advertiser exists. Arrival is proximity-based:
// within twice the larger of the two mascots' speeds, in the same
// environment. On arrival both mascots switch to their configured
// interaction behaviors and both advertisements are withdrawn before
// either is surfaced outward.

use super::{
    FrameWrap, NextOutcome, advance_animation, border_holds, cache_condition, check_guards,
    eval_duration, ground_check, out_of_bounds_check, recheck_guards, reset_animation_state, walk,
};
use crate::action::ActionRef;
use crate::affordance::AffordanceBoard;
use crate::engine::{self, Colony, TickCtx, TickError};
use crate::environment::flip_y;
use crate::mascot::Mascot;
use crate::types::{MascotState, MoveStatus, Transition};
use crate::variables::Slot;
use tracing::{debug, warn};

fn find_target(mascot: &Mascot, actionref: &ActionRef, ctx: &mut TickCtx) -> Option<crate::types::MascotId> {
    if !ctx.config.interactions {
        return None;
    }
    let affordance = actionref.node.affordance.as_deref()?;
    ctx.board.find_target(
        ctx.rng,
        affordance,
        mascot.id,
        mascot.env,
        ctx.config.unified_outputs,
    )
}

pub(crate) fn init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if actionref.node.content.is_empty() {
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "scan action has no content",
        });
    }

    // No partner is not an error; let a sibling run instead.
    let Some(target) = find_target(mascot, actionref, ctx) else {
        debug!(mascot = %mascot.id, action = %actionref.node.name, "no interaction target");
        return Ok(Transition::Next);
    };

    let grounded = ground_check(mascot, actionref, ctx);
    if grounded != Transition::Continue {
        return Ok(grounded);
    }
    if !check_guards(mascot, actionref, ctx)? {
        return Ok(Transition::Next);
    }
    cache_condition(mascot, actionref);
    if let Some((deadline, _)) = eval_duration(mascot, actionref, ctx) {
        mascot.action_duration = deadline;
    }
    reset_animation_state(mascot);
    mascot.vars.set_f(Slot::VelocityX, 0.0);
    mascot.vars.set_f(Slot::VelocityY, 0.0);

    mascot.state = MascotState::ScanMove;
    mascot.announce_affordance(ctx.board, None);
    mascot.target_mascot = Some(target);

    Ok(Transition::Continue)
}

/// Assign both sides their configured interaction behaviors. Both mascots'
/// states change together, before either is visible to callers again.
fn establish_interaction(
    colony: &mut Colony,
    mascot: &mut Mascot,
    target_id: crate::types::MascotId,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> bool {
    let node = &actionref.node;
    let (Some(my_behavior_name), Some(your_behavior_name)) =
        (node.behavior.as_deref(), node.target_behavior.as_deref())
    else {
        warn!(mascot = %mascot.id, action = %node.name, "interaction behaviors not configured");
        return false;
    };
    let Some(my_behavior) = mascot.prototype.behavior(my_behavior_name) else {
        warn!(mascot = %mascot.id, behavior = %my_behavior_name, "interaction behavior not found");
        return false;
    };
    let Some(target) = colony.get_mut(target_id) else {
        return false;
    };
    let Some(your_behavior) = target.prototype.behavior(your_behavior_name) else {
        warn!(mascot = %mascot.id, behavior = %your_behavior_name,
              "partner interaction behavior not found");
        return false;
    };

    target.announce_affordance(ctx.board, None);
    let (x, y) = (mascot.x(), mascot.y());
    target.set_position(x, y);
    if node.target_look && mascot.facing_right() == target.facing_right() {
        let flipped = !mascot.facing_right();
        target.set_facing_right(flipped);
    }
    engine::set_behavior(target, Some(your_behavior), ctx);
    engine::set_behavior(mascot, Some(my_behavior), ctx);
    true
}

pub(crate) fn next(
    colony: &mut Colony,
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

    // Arrival check against the live partner.
    if let Some(target_id) = mascot.target_mascot
        && let Some(target) = colony.get(target_id)
    {
        let dx = (target.x() - mascot.x()) as f32;
        let dy = (target.y() - mascot.y()) as f32;
        let distance = (dx * dx + dy * dy).sqrt() as i32;
        let (tvx, tvy) = target.velocity();
        let (mvx, mvy) = mascot.velocity();
        let target_speed = ((tvx * tvx + tvy * tvy).sqrt() * 2.0) as i32;
        let my_speed = ((mvx * mvx + mvy * mvy).sqrt() * 2.0) as i32;

        if distance <= target_speed.max(my_speed) && mascot.env == target.env {
            clean(mascot, ctx.board);
            if establish_interaction(colony, mascot, target_id, actionref, ctx) {
                return Ok(NextOutcome::of(Transition::Reenter));
            }
            return Ok(NextOutcome::of(Transition::Next));
        }
    }

    // The partner must still advertise; otherwise try to find a new one.
    let affordance = actionref.node.affordance.as_deref().unwrap_or_default();
    let still_advertised = mascot
        .target_mascot
        .is_some_and(|t| colony.get(t).is_some() && ctx.board.advertises(t, affordance));
    if !still_advertised {
        mascot.target_mascot = None;
        let Some(new_target) = find_target(mascot, actionref, ctx) else {
            return Ok(NextOutcome::of(Transition::Next));
        };
        mascot.target_mascot = Some(new_target);
    }

    if !recheck_guards(mascot, actionref, ctx)? {
        return Ok(NextOutcome::of(Transition::Next));
    }

    advance_animation(mascot, actionref, ctx, FrameWrap::Always, Transition::Next)
}

pub(crate) fn tick(
    colony: &mut Colony,
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    let _ = actionref;
    let oob = out_of_bounds_check(mascot, ctx);
    if oob != Transition::Continue {
        return Ok(oob);
    }

    let Some(target_id) = mascot.target_mascot else {
        return Ok(Transition::Continue);
    };
    let Some(target) = colony.get(target_id) else {
        return Ok(Transition::Continue);
    };

    // Chase point: the partner's position translated into our coordinate
    // space (outputs may have different origins and heights).
    let (delta_x, delta_y) = ctx.env.coordinate_delta(target.env, mascot.env);
    let target_area_h = ctx.env.workarea(target.env).height;
    let my_area_h = ctx.env.workarea(mascot.env).height;
    let chase_x = target.x() + delta_x;
    let chase_y = flip_y(my_area_h, flip_y(target_area_h, target.y()) + delta_y);

    mascot.vars.set_i(Slot::TargetX, chase_x);
    mascot.vars.set_i(Slot::TargetY, chase_y);

    let (pos_x, pos_y, tx, ty) = walk::step_toward_targets(mascot, ctx, true);

    if (pos_x == tx || tx == -1) && (pos_y == ty || ty == -1) {
        debug!(mascot = %mascot.id, x = pos_x, y = pos_y, "reached scan target");
        let reply = ctx.env.move_surface(mascot.surface, pos_x, pos_y, true);
        mascot.set_position(reply.x, reply.y);
        if reply.status != MoveStatus::Ok {
            // The chase point is unreachable; pin the target to where we
            // stand so the arrival check can settle.
            mascot.vars.set_i(Slot::TargetX, mascot.x());
            mascot.vars.set_i(Slot::TargetY, mascot.y());
        }
        return Ok(Transition::Reenter);
    }

    if pos_x != mascot.x() || pos_y != mascot.y() {
        let reply = ctx.env.move_surface(mascot.surface, pos_x, pos_y, true);
        mascot.set_position(reply.x, reply.y);
    }
    Ok(Transition::Continue)
}

pub(crate) fn clean(mascot: &mut Mascot, board: &AffordanceBoard) {
    mascot.vars.set_i(Slot::TargetX, 0);
    mascot.vars.set_i(Slot::TargetY, 0);
    mascot.vars.set_f(Slot::VelocityX, 0.0);
    mascot.vars.set_f(Slot::VelocityY, 0.0);
    mascot.target_mascot = None;
    mascot.state = MascotState::Idle;
    mascot.announce_affordance(board, None);
}

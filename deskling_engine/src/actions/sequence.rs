// Sequence: run children in declared order, resuming where it left off.
//
// The resume index lives on the mascot (`action_index`) and is saved on
// the action stack while a child runs, so a sequence interrupted mid-tree
// picks up at the right child across ticks. Reaching the end either wraps
// to the first child (looping or duration-bound sequences) or reports
// `Next` for the sequence's own frame.

use super::{NextOutcome, cache_condition, check_guards, eval_duration, recheck_guards};
use crate::action::{ActionContent, ActionRef};
use crate::engine::{self, TickCtx, TickError};
use crate::mascot::Mascot;
use crate::types::{Border, Transition};
use tracing::{debug, warn};

pub(crate) fn init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if actionref.node.content.is_empty() {
        warn!(mascot = %mascot.id, action = %actionref.node.name, "sequence has no children");
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "sequence has no children",
        });
    }
    debug!(mascot = %mascot.id, action = %actionref.node.name, "initializing sequence");

    // Border requirement with off-surface recovery: open air under a
    // grounded sequence forces the fall behavior.
    if let Some(required) = actionref.node.border {
        let actual = ctx.env.border_type(mascot.env, mascot.x(), mascot.y());
        if actual != required {
            if actual == Border::None {
                let fall = mascot.prototype.fall_behavior.clone();
                engine::set_behavior(mascot, fall, ctx);
                clean(mascot);
                return Ok(Transition::Reenter);
            }
            return Ok(Transition::Next);
        }
    }

    if !check_guards(mascot, actionref, ctx)? {
        return Ok(Transition::Next);
    }
    cache_condition(mascot, actionref);

    mascot.action_duration = eval_duration(mascot, actionref, ctx).map_or(0, |(deadline, _)| deadline);
    mascot.action_index = 0;
    mascot.announce_affordance(ctx.board, None);
    Ok(Transition::Continue)
}

pub(crate) fn next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    if mascot.action_duration != 0 && ctx.tick >= mascot.action_duration {
        debug!(mascot = %mascot.id, action = %actionref.node.name, "sequence duration elapsed");
        return Ok(NextOutcome::of(Transition::Next));
    }
    if !recheck_guards(mascot, actionref, ctx)? {
        return Ok(NextOutcome::of(Transition::Next));
    }

    let mut index = mascot.action_index as usize;
    if index >= actionref.node.content.len() {
        if actionref.node.loops || mascot.action_duration != 0 {
            debug!(mascot = %mascot.id, action = %actionref.node.name, "sequence wrapped");
            index = 0;
        } else {
            return Ok(NextOutcome::of(Transition::Next));
        }
    }
    mascot.action_index = index as u16 + 1;

    let child = match &actionref.node.content[index] {
        ActionContent::Animation(_) => {
            return Err(TickError::Structural {
                mascot: mascot.id,
                action: actionref.node.name.clone(),
                detail: "sequence contains a raw animation",
            });
        }
        ActionContent::Action(node) => ActionRef::plain(node.clone()),
        ActionContent::Reference(reference) => reference.clone(),
    };

    let mut outcome = NextOutcome::of(Transition::Reenter);
    outcome.next_action = Some(child);
    Ok(outcome)
}

pub(crate) fn clean(mascot: &mut Mascot) {
    mascot.action_index = 0;
    mascot.action_duration = 0;
}

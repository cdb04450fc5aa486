// Select: re-scan children on every activation and run the first eligible.
//
// Unlike Sequence, a selector never resumes an index: each activation
// walks the children from the first, skipping any whose border requirement
// or guard fails, and hands the first passing child to the driver. When
// none pass the selector itself reports `Next`.

use super::{NextOutcome, border_holds, cache_condition, check_guards, recheck_guards};
use crate::action::{ActionContent, ActionRef};
use crate::engine::{TickCtx, TickError};
use crate::mascot::Mascot;
use crate::script;
use crate::types::Transition;
use tracing::warn;

pub(crate) fn init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if actionref.node.content.is_empty() {
        warn!(mascot = %mascot.id, action = %actionref.node.name, "selector has no children");
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "selector has no children",
        });
    }

    if !border_holds(mascot, actionref, ctx) {
        return Ok(Transition::Next);
    }
    if !check_guards(mascot, actionref, ctx)? {
        return Ok(Transition::Next);
    }
    cache_condition(mascot, actionref);

    mascot.action_index = 0;
    mascot.announce_affordance(ctx.board, None);
    Ok(Transition::Continue)
}

pub(crate) fn next(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<NextOutcome, TickError> {
    if !recheck_guards(mascot, actionref, ctx)? {
        return Ok(NextOutcome::of(Transition::Next));
    }

    for item in &actionref.node.content {
        let candidate = match item {
            ActionContent::Animation(_) => {
                return Err(TickError::Structural {
                    mascot: mascot.id,
                    action: actionref.node.name.clone(),
                    detail: "selector contains a raw animation",
                });
            }
            ActionContent::Action(node) => {
                let mut reference = ActionRef::plain(node.clone());
                reference.condition = node.condition.clone();
                reference
            }
            ActionContent::Reference(reference) => reference.clone(),
        };

        if !border_holds(mascot, &candidate, ctx) {
            continue;
        }
        let ref_pass = script::check_condition(ctx.scripts, mascot, candidate.condition.as_ref())
            .map_err(|e| crate::engine::script_failure(mascot, &candidate.node.name, e))?;
        let node_pass =
            script::check_condition(ctx.scripts, mascot, candidate.node.condition.as_ref())
                .map_err(|e| crate::engine::script_failure(mascot, &candidate.node.name, e))?;
        if !ref_pass || !node_pass {
            continue;
        }

        let mut outcome = NextOutcome::of(Transition::Reenter);
        outcome.next_action = Some(candidate);
        return Ok(outcome);
    }
    Ok(NextOutcome::of(Transition::Next))
}

pub(crate) fn clean(mascot: &mut Mascot) {
    mascot.action_index = 0;
}

// Offset: a one-shot position delta, then immediately done.
//
// The X and Y bindings are read as a displacement, not a destination: x
// adds, y subtracts (a positive y offset moves the mascot down the
// screen). Offset actions carry no animations; content is a structural
// violation.

use super::{cache_condition, check_guards};
use crate::action::ActionRef;
use crate::engine::{TickCtx, TickError};
use crate::mascot::Mascot;
use crate::types::Transition;
use crate::variables::{Slot, resolve};

pub(crate) fn init(
    mascot: &mut Mascot,
    actionref: &ActionRef,
    ctx: &mut TickCtx,
) -> Result<Transition, TickError> {
    if !actionref.node.content.is_empty() {
        return Err(TickError::Structural {
            mascot: mascot.id,
            action: actionref.node.name.clone(),
            detail: "offset action must not contain animations or children",
        });
    }

    if !check_guards(mascot, actionref, ctx)? {
        return Ok(Transition::Next);
    }
    cache_condition(mascot, actionref);

    let x = mascot.x();
    let y = mascot.y();
    for slot in [Slot::X, Slot::Y] {
        let binding = resolve(&actionref.overrides, &actionref.node.defaults, slot).clone();
        mascot
            .adopt_variable(slot, &binding, ctx.scripts)
            .map_err(|e| crate::engine::script_failure(mascot, &actionref.node.name, e))?;
    }

    let new_x = x + mascot.x();
    let new_y = y - mascot.y();
    ctx.env.place_surface(mascot.surface, new_x, new_y);
    ctx.env.reset_interpolation(mascot.surface);
    mascot.set_position(new_x, new_y);

    Ok(Transition::Next)
}

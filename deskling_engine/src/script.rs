// Script evaluation boundary.
//
// The engine never interprets script text or bytecode itself; conditions,
// durations, and scripted variables reference compiled programs by id, and
// the host supplies a `ScriptEngine` that runs them against a mascot's
// state. Conditions treat a result of 0.0 as false, anything else as true.

use crate::mascot::Mascot;
use crate::types::ProgramId;
use std::sync::Arc;
use thiserror::Error;

/// A reference to one compiled script, plus its evaluation policy.
///
/// `evaluate_once` conditions are checked only when an action initializes,
/// never on the per-tick recheck.
#[derive(Clone, Debug)]
pub struct Expression {
    pub program: ProgramId,
    pub evaluate_once: bool,
}

impl Expression {
    pub fn new(program: ProgramId) -> Self {
        Self {
            program,
            evaluate_once: false,
        }
    }

    pub fn once(program: ProgramId) -> Self {
        Self {
            program,
            evaluate_once: true,
        }
    }
}

/// Failure reported by the script engine. Always a hard stop for the
/// operation that needed the value.
#[derive(Clone, Debug, Error)]
#[error("script {program} failed: {message}")]
pub struct ScriptError {
    pub program: ProgramId,
    pub message: String,
}

/// External expression evaluator. Programs may read any of the mascot's
/// variable slots; they must not block or perform I/O.
pub trait ScriptEngine {
    fn evaluate(&self, program: ProgramId, mascot: &Mascot) -> Result<f32, ScriptError>;
}

/// Evaluate a guard condition. Absent conditions pass.
pub(crate) fn check_condition(
    scripts: &dyn ScriptEngine,
    mascot: &Mascot,
    condition: Option<&Arc<Expression>>,
) -> Result<bool, ScriptError> {
    let Some(condition) = condition else {
        return Ok(true);
    };
    let value = scripts.evaluate(condition.program, mascot)?;
    Ok(value != 0.0)
}

/// Re-evaluate a guard on a later tick. Evaluate-once conditions were
/// settled at init and always pass here.
pub(crate) fn recheck_condition(
    scripts: &dyn ScriptEngine,
    mascot: &Mascot,
    condition: Option<&Arc<Expression>>,
) -> Result<bool, ScriptError> {
    if let Some(condition) = condition
        && condition.evaluate_once
    {
        return Ok(true);
    }
    check_condition(scripts, mascot, condition)
}

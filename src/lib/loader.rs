use super::calculator::{CalculatorSpec, SpecError};
use super::generator::GeneratedCalculatorSpec;
use super::routine::{Routine, RoutineError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, PartialEq)]
pub enum LoadError {
    #[error("generated calculator has no title")]
    MissingTitle,
    #[error(transparent)]
    Routine(#[from] RoutineError),
    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// Checks what the wire format alone cannot: a title that is not blank.
pub fn check_structure(raw: &GeneratedCalculatorSpec) -> Result<(), LoadError> {
    if raw.title.trim().is_empty() {
        return Err(LoadError::MissingTitle);
    }
    Ok(())
}

/// Turns a generated definition into a live calculator definition.
///
/// A blank routine gives a calculator whose readonly fields never change.
pub fn load(raw: GeneratedCalculatorSpec) -> Result<CalculatorSpec, LoadError> {
    check_structure(&raw)?;
    let GeneratedCalculatorSpec {
        title,
        description,
        fields,
        calculate_function,
    } = raw;
    let description = Some(description).filter(|d| !d.trim().is_empty());
    let spec = CalculatorSpec::new(title, description, fields)?;
    if calculate_function.trim().is_empty() {
        info!("calculator `{}` has no routine", spec.title());
        return Ok(spec);
    }
    let routine = Routine::load(&calculate_function)?;
    Ok(spec.with_recompute(routine))
}

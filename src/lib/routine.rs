//! Recompute routines delivered as text by a model.
//!
//! The text is parsed into a small expression language and evaluated by an
//! interpreter that can only read the inputs it is handed and call a closed
//! set of numeric functions.
use super::calculator::{Recompute, Values};
use thiserror::Error;
use tracing::{debug, warn};

mod ast;
mod interpreter;
mod lexer;
mod parser;

use interpreter::{Interpreter, Value};

pub const MAX_SOURCE_LENGTH: usize = 16 * 1024;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoutineError {
    #[error("invalid routine at offset {offset}: {message}")]
    Lex { offset: usize, message: String },
    #[error("invalid routine: {0}")]
    Parse(String),
    #[error("routine failed: {0}")]
    Eval(String),
    #[error("routine is {0} bytes long")]
    TooLong(usize),
}

impl RoutineError {
    fn lex(offset: usize, message: impl Into<String>) -> Self {
        Self::Lex {
            offset,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Routine {
    statements: Vec<ast::Statement>,
}

impl Routine {
    pub fn load(source: &str) -> Result<Self, RoutineError> {
        if source.len() > MAX_SOURCE_LENGTH {
            return Err(RoutineError::TooLong(source.len()));
        }
        let tokens = lexer::tokenize(source)?;
        let statements = parser::Parser::new(tokens).program()?;
        debug!(target: "routine", "loaded routine of {} statements", statements.len());
        Ok(Self { statements })
    }

    /// Runs the routine once.
    ///
    /// Booleans in the returned object become `1` and `0`. A routine that
    /// finishes without returning yields no values.
    pub fn evaluate(&self, values: &Values) -> Result<Values, RoutineError> {
        let returned = Interpreter::new(values).run(&self.statements)?;
        let entries = match returned {
            None => return Ok(Values::new()),
            Some(Value::Object(entries)) => entries,
            Some(other) => {
                return Err(RoutineError::Eval(format!(
                    "routine returned {other:?} instead of an object"
                )))
            }
        };
        entries
            .into_iter()
            .map(|(name, value)| match value {
                Value::Number(n) => Ok((name, n)),
                Value::Bool(b) => Ok((name, if b { 1.0 } else { 0.0 })),
                Value::Object(_) => Err(RoutineError::Eval(format!(
                    "result `{name}` is not a number"
                ))),
            })
            .collect()
    }
}

impl Recompute for Routine {
    fn recompute(&self, values: &Values) -> Values {
        self.evaluate(values).unwrap_or_else(|e| {
            warn!(target: "routine", "{e}");
            Values::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::calculator::{Calculator, CalculatorSpec};
    use crate::lib::field::Field;

    const TIP: &str = "const tipAmount = (values.bill * values.tipPercent) / 100; const total = values.bill + tipAmount; return { tipAmount: Math.round(tipAmount * 100) / 100, total: Math.round(total * 100) / 100 };";

    fn values<const N: usize>(pairs: [(&str, f64); N]) -> Values {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn tip_routine() {
        let routine = Routine::load(TIP).unwrap();
        let result = routine
            .evaluate(&values([("bill", 80.0), ("tipPercent", 15.0)]))
            .unwrap();
        assert_eq!(result, values([("tipAmount", 12.0), ("total", 92.0)]));
    }
    #[test]
    fn booleans_become_numbers() {
        let routine = Routine::load("return { big: values.x > 10, small: values.x < 10 }").unwrap();
        assert_eq!(
            routine.evaluate(&values([("x", 11.0)])).unwrap(),
            values([("big", 1.0), ("small", 0.0)])
        );
    }
    #[test]
    fn returning_a_number_is_an_error() {
        let routine = Routine::load("return 1").unwrap();
        assert!(matches!(routine.evaluate(&Values::new()), Err(RoutineError::Eval(_))));
        assert!(routine.recompute(&Values::new()).is_empty());
    }
    #[test]
    fn oversized_source_is_rejected() {
        let source = format!("return {{}}{}", " ".repeat(MAX_SOURCE_LENGTH));
        assert!(matches!(Routine::load(&source), Err(RoutineError::TooLong(_))));
    }
    #[test]
    fn load_reports_syntax_errors() {
        assert!(matches!(Routine::load("return {"), Err(RoutineError::Parse(_))));
        assert!(matches!(Routine::load("return @"), Err(RoutineError::Lex { .. })));
    }
    #[test]
    fn longest_flat_sum_is_rejected_at_load() {
        let mut source = String::from("return { y: 1");
        while source.len() + 2 + " }".len() <= MAX_SOURCE_LENGTH {
            source.push_str("+1");
        }
        source.push_str(" }");
        assert!(matches!(Routine::load(&source), Err(RoutineError::Parse(_))));
    }
    #[test]
    fn failing_routine_keeps_previous_outputs() {
        let spec = CalculatorSpec::new(
            "Ratio",
            None,
            vec![
                Field::input("a", "A", 4.0),
                Field::input("b", "B", 2.0),
                Field::output("ratio", "Ratio"),
            ],
        )
        .unwrap()
        .with_recompute(
            Routine::load("if (values.b == 0) return undefinedName; return { ratio: values.a / values.b }")
                .unwrap(),
        );
        let mut calculator = Calculator::new(spec);
        calculator.set_field_value("a", "9").unwrap();
        assert_eq!(calculator.snapshot().value("ratio"), Some(4.5));
        calculator.set_field_value("b", "0").unwrap();
        assert_eq!(calculator.snapshot().value("ratio"), Some(4.5));
        assert_eq!(calculator.snapshot().value("b"), Some(0.0));
    }
}

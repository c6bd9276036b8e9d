use super::field::{parse_input, Field};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

mod format;

pub use format::locale_number;

/// Field name to value, as exchanged with a recompute function.
pub type Values = BTreeMap<String, f64>;

/// Derives the readonly fields of a calculator from its editable ones.
///
/// Implementations must be pure: the same inputs always give the same outputs.
pub trait Recompute: Send + Sync {
    fn recompute(&self, values: &Values) -> Values;
}

impl<F> Recompute for F
where
    F: Fn(&Values) -> Values + Send + Sync,
{
    fn recompute(&self, values: &Values) -> Values {
        self(values)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    #[error("calculator title is empty")]
    EmptyTitle,
    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),
    #[error("field `{0}` has a non-finite value")]
    NonFiniteValue(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("no field named `{0}`")]
    UnknownField(String),
    #[error("field `{0}` is readonly")]
    ReadonlyField(String),
}

/// An immutable calculator definition.
#[derive(Clone)]
pub struct CalculatorSpec {
    title: String,
    description: Option<String>,
    fields: Vec<Field>,
    recompute: Option<Arc<dyn Recompute>>,
}

impl Debug for CalculatorSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatorSpec")
            .field("title", &self.title)
            .field("description", &self.description)
            .field("fields", &self.fields)
            .field("recompute", &self.recompute.is_some())
            .finish()
    }
}

impl CalculatorSpec {
    pub fn new(
        title: impl Into<String>,
        description: Option<String>,
        fields: Vec<Field>,
    ) -> Result<Self, SpecError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(SpecError::EmptyTitle);
        }
        let mut names = HashSet::new();
        for field in &fields {
            if !names.insert(field.name.as_str()) {
                return Err(SpecError::DuplicateField(field.name.clone()));
            }
            if !field.value.is_finite() {
                return Err(SpecError::NonFiniteValue(field.name.clone()));
            }
        }
        Ok(Self {
            title,
            description,
            fields,
            recompute: None,
        })
    }
    pub fn with_recompute(mut self, recompute: impl Recompute + 'static) -> Self {
        self.recompute = Some(Arc::new(recompute));
        self
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
    pub fn has_recompute(&self) -> bool {
        self.recompute.is_some()
    }

    pub fn initialize(&self) -> Snapshot {
        Snapshot {
            fields: self.fields.clone(),
        }
    }

    /// Applies one edit and recomputes the readonly fields.
    ///
    /// `raw` never causes an error: unparsable input is taken as `0`.
    pub fn set_field_value(
        &self,
        state: &Snapshot,
        name: &str,
        raw: &str,
    ) -> Result<Snapshot, EditError> {
        let index = state
            .position(name)
            .ok_or_else(|| EditError::UnknownField(name.to_string()))?;
        if state.fields[index].readonly {
            return Err(EditError::ReadonlyField(name.to_string()));
        }

        let mut next = state.clone();
        next.fields[index].value = parse_input(raw);

        let Some(recompute) = &self.recompute else {
            return Ok(next);
        };
        let results = recompute.recompute(&next.inputs());
        for field in next.fields.iter_mut().filter(|f| f.readonly) {
            match results.get(&field.name) {
                Some(value) if value.is_finite() => field.value = *value,
                Some(value) => {
                    debug!("ignore non-finite result {value} for `{}`", field.name)
                }
                None => {}
            }
        }
        Ok(next)
    }
}

/// The field values of one live calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    fields: Vec<Field>,
}

impl Snapshot {
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
    pub fn value(&self, name: &str) -> Option<f64> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value)
    }
    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
    /// Current values of the editable fields.
    pub fn inputs(&self) -> Values {
        self.fields
            .iter()
            .filter(|f| !f.readonly)
            .map(|f| (f.name.clone(), f.value))
            .collect()
    }
    /// `"{label}: {value}"` for each readonly field, in field order.
    pub fn readonly_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.fields
            .iter()
            .filter(|f| f.readonly)
            .map(|f| format!("{}: {}", f.label, locale_number(f.value)))
    }
    pub fn clipboard_text(&self) -> String {
        self.readonly_lines().collect::<Vec<_>>().join("\n")
    }
}

/// A calculator instance: a shared definition plus its own snapshot.
#[derive(Debug, Clone)]
pub struct Calculator {
    spec: Arc<CalculatorSpec>,
    state: Snapshot,
}

impl Calculator {
    pub fn new(spec: impl Into<Arc<CalculatorSpec>>) -> Self {
        let spec = spec.into();
        let state = spec.initialize();
        Self { spec, state }
    }
    pub fn spec(&self) -> &CalculatorSpec {
        &self.spec
    }
    pub fn title(&self) -> &str {
        self.spec.title()
    }
    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }
    pub fn set_field_value(&mut self, name: &str, raw: &str) -> Result<(), EditError> {
        self.state = self.spec.set_field_value(&self.state, name, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubler() -> CalculatorSpec {
        CalculatorSpec::new(
            "Doubler",
            None,
            vec![
                Field::input("x", "X", 1.0),
                Field::output("double", "Double"),
                Field::output("kept", "Kept"),
            ],
        )
        .unwrap()
        .with_recompute(|values: &Values| {
            Values::from([
                ("double".to_string(), values["x"] * 2.0),
                ("x".to_string(), 99.0),
                ("unknown".to_string(), 1.0),
            ])
        })
    }

    #[test]
    fn initialize_is_verbatim() {
        let spec = doubler();
        let state = spec.initialize();
        assert_eq!(state.fields(), spec.fields());
    }
    #[test]
    fn edit_recomputes_readonly_fields() {
        let spec = doubler();
        let state = spec.set_field_value(&spec.initialize(), "x", "21").unwrap();
        assert_eq!(state.value("x"), Some(21.0));
        assert_eq!(state.value("double"), Some(42.0));
    }
    #[test]
    fn results_for_editable_or_unknown_names_are_ignored() {
        let spec = doubler();
        let state = spec.set_field_value(&spec.initialize(), "x", "3").unwrap();
        assert_eq!(state.value("x"), Some(3.0));
        assert_eq!(state.value("unknown"), None);
    }
    #[test]
    fn absent_results_keep_prior_value() {
        let mut fields = doubler().fields().to_vec();
        fields[2].value = 7.0;
        let spec = CalculatorSpec::new("Doubler", None, fields)
            .unwrap()
            .with_recompute(|values: &Values| Values::from([("double".to_string(), values["x"])]));
        let state = spec.set_field_value(&spec.initialize(), "x", "5").unwrap();
        assert_eq!(state.value("kept"), Some(7.0));
    }
    #[test]
    fn non_finite_results_are_ignored() {
        let spec = CalculatorSpec::new(
            "Ratio",
            None,
            vec![Field::input("x", "X", 1.0), Field::output("inverse", "1/X")],
        )
        .unwrap()
        .with_recompute(|values: &Values| {
            Values::from([("inverse".to_string(), 1.0 / values["x"])])
        });
        let state = spec.set_field_value(&spec.initialize(), "x", "4").unwrap();
        assert_eq!(state.value("inverse"), Some(0.25));
        let state = spec.set_field_value(&state, "x", "0").unwrap();
        assert_eq!(state.value("inverse"), Some(0.25));
    }
    #[test]
    fn malformed_input_is_zero() {
        let spec = doubler();
        let state = spec.set_field_value(&spec.initialize(), "x", "abc").unwrap();
        assert_eq!(state.value("x"), Some(0.0));
        assert_eq!(state.value("double"), Some(0.0));
    }
    #[test]
    fn editing_readonly_or_unknown_is_rejected() {
        let spec = doubler();
        let state = spec.initialize();
        assert_eq!(
            spec.set_field_value(&state, "double", "1"),
            Err(EditError::ReadonlyField("double".to_string()))
        );
        assert_eq!(
            spec.set_field_value(&state, "nope", "1"),
            Err(EditError::UnknownField("nope".to_string()))
        );
    }
    #[test]
    fn repeated_edit_is_idempotent() {
        let spec = doubler();
        let once = spec.set_field_value(&spec.initialize(), "x", "12.5").unwrap();
        let current = once.value("x").unwrap().to_string();
        let twice = spec.set_field_value(&once, "x", &current).unwrap();
        let thrice = spec.set_field_value(&twice, "x", &current).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice, thrice);
    }
    #[test]
    fn without_recompute_only_the_edit_applies() {
        let spec = CalculatorSpec::new(
            "Plain",
            None,
            vec![Field::input("a", "A", 0.0), Field::output("b", "B")],
        )
        .unwrap();
        let state = spec.set_field_value(&spec.initialize(), "a", "2").unwrap();
        assert_eq!(state.value("a"), Some(2.0));
        assert_eq!(state.value("b"), Some(0.0));
    }
    #[test]
    fn spec_validation() {
        let duplicate = vec![Field::input("a", "A", 0.0), Field::output("a", "A again")];
        assert_eq!(
            CalculatorSpec::new("Dup", None, duplicate).unwrap_err(),
            SpecError::DuplicateField("a".to_string())
        );
        assert_eq!(
            CalculatorSpec::new(" ", None, vec![]).unwrap_err(),
            SpecError::EmptyTitle
        );
        assert_eq!(
            CalculatorSpec::new("Nan", None, vec![Field::input("a", "A", f64::NAN)]).unwrap_err(),
            SpecError::NonFiniteValue("a".to_string())
        );
    }
    #[test]
    fn clipboard_lists_readonly_fields_in_order() {
        let mut calculator = Calculator::new(doubler());
        calculator.set_field_value("x", "600").unwrap();
        assert_eq!(
            calculator.snapshot().clipboard_text(),
            "Double: 1,200\nKept: 0"
        );
    }
    #[test]
    fn calculators_do_not_share_state() {
        let spec = Arc::new(doubler());
        let mut first = Calculator::new(spec.clone());
        let second = Calculator::new(spec);
        first.set_field_value("x", "10").unwrap();
        assert_eq!(first.snapshot().value("x"), Some(10.0));
        assert_eq!(second.snapshot().value("x"), Some(1.0));
    }
}

use crate::lib::field::Field;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A calculator definition as produced by a model.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "calculator")]
pub struct GeneratedCalculatorSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<Field>,
    /// Body of a routine of one parameter `values` returning the readonly values.
    #[serde(default)]
    pub calculate_function: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    pub calculator: GeneratedCalculatorSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            details: None,
        }
    }
    pub fn with_details(mut self, details: impl ToString) -> Self {
        self.details = Some(details.to_string());
        self
    }
}

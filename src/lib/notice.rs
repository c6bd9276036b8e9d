use super::generator::GenerationError;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Destructive,
}

/// A short message shown to the user after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
}

impl Notice {
    fn new(title: &str, description: Option<String>, severity: Severity) -> Self {
        Self {
            title: title.to_string(),
            description,
            severity,
        }
    }
    pub fn empty_prompt() -> Self {
        Self::new(
            "Please enter a description",
            Some("Tell me what kind of calculator you'd like to create!".to_string()),
            Severity::Destructive,
        )
    }
    pub fn generation_failed() -> Self {
        Self::new(
            "Generation failed",
            Some("Please try again with a different description.".to_string()),
            Severity::Destructive,
        )
    }
    pub fn generated(title: &str) -> Self {
        Self::new(
            "Calculator generated!",
            Some(format!("Created \"{title}\" for you to use.")),
            Severity::Info,
        )
    }
    pub fn copied() -> Self {
        Self::new("Results copied to clipboard!", None, Severity::Info)
    }
    pub fn generation_pending() -> Self {
        Self::new(
            "Still generating",
            Some("Wait for the current calculator to be ready.".to_string()),
            Severity::Destructive,
        )
    }
}

impl From<&GenerationError> for Notice {
    fn from(error: &GenerationError) -> Self {
        match error {
            GenerationError::EmptyPrompt => Self::empty_prompt(),
            GenerationError::InProgress => Self::generation_pending(),
            GenerationError::Failed(_) | GenerationError::Load(_) => Self::generation_failed(),
        }
    }
}

impl Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title)?;
        if let Some(description) = &self.description {
            write!(f, " {description}")?;
        }
        Ok(())
    }
}

use super::calculator::CalculatorSpec;
use super::loader::{self, LoadError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub mod completion_api;
pub mod endpoint;
mod prompt;
pub mod schema;

pub use completion_api::Llm;
pub use endpoint::Endpoint;
pub use schema::GeneratedCalculatorSpec;

pub const EXAMPLE_PROMPTS: [&str; 5] = [
    "Calculate mortgage payments with principal, interest rate, and loan term",
    "Tip calculator for restaurant bills with customizable tip percentage",
    "Investment ROI calculator with initial investment and returns",
    "BMI calculator using height and weight",
    "Compound interest calculator for savings growth",
];

/// Anything that turns a description into a raw calculator definition.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<GeneratedCalculatorSpec>;
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("the prompt is empty")]
    EmptyPrompt,
    #[error("a calculator is already being generated")]
    InProgress,
    #[error("generation failed: {0:#}")]
    Failed(anyhow::Error),
    #[error("generated calculator is invalid: {0}")]
    Load(#[from] LoadError),
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Generates calculators one request at a time.
pub struct Generator {
    backend: Arc<dyn Backend>,
    in_flight: AtomicBool,
}

impl Generator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn generate(&self, prompt: &str) -> Result<CalculatorSpec, GenerationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        let _in_flight = InFlight::acquire(&self.in_flight).ok_or(GenerationError::InProgress)?;

        info!("generating calculator for prompt: {prompt}");
        let raw = self
            .backend
            .generate(prompt)
            .await
            .map_err(GenerationError::Failed)?;
        let spec = loader::load(raw)?;
        info!("generated calculator `{}`", spec.title());
        Ok(spec)
    }
}

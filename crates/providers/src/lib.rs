//! Model access for brandforge.
//!
//! The [`OpenAiCompatProvider`] speaks HTTP to an OpenAI-compatible endpoint;
//! the [`ModelGateway`] wraps any `brandforge_core::Provider` with pricing,
//! retry, cancellation, cost logging and structured-output recovery.

pub mod gateway;
pub mod openai_compat;
pub mod retry;
pub mod structured;

#[cfg(any(test, feature = "testing"))]
pub mod test_helpers;

pub use gateway::ModelGateway;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryPolicy;
pub use structured::StructuredOutput;

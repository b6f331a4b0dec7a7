//! Core pipeline for Harvest.
//!
//! Turns a model's free-form answer into validated [`HeritageSite`] records:
//! [`request`] builds the prompt, [`extract`] isolates the JSON span,
//! [`validate`] checks each element, and [`pipeline`] runs them in order
//! around an [`LlmGateway`](harvest_gateway::LlmGateway).
//!
//! [`HeritageSite`]: harvest_shared::HeritageSite

pub mod extract;
pub mod pipeline;
pub mod request;
pub mod validate;

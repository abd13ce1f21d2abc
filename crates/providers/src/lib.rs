//! Model gateway adapters for Provost.
//!
//! The orchestration core depends only on the `ModelGateway` contract;
//! this crate supplies the concrete adapters that speak to real providers.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatGateway;

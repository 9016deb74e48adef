//! Haven remote stage contracts and adapters.
//!
//! Classification, risk scoring and simulation are opaque remote models.
//! This crate holds the contracts the pipeline consumes them through
//! (async traits), the HTTP adapters that implement those contracts, and
//! the bounded-backoff retry helper used around every remote call.
//!
//! Responses are parsed into typed structs and validated at this boundary;
//! malformed or out-of-range payloads surface as typed contract violations
//! and never reach the pipeline.

#![deny(unsafe_code)]

mod contract;
mod http;
mod retry;

pub use contract::{Classifier, RiskScorer, Simulator, StageError};
pub use http::{HttpClassifier, HttpRiskScorer, HttpSimulator, StageEndpoint};
pub use retry::{with_retry, RetryPolicy, Transient};

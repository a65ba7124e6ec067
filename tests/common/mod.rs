#![allow(dead_code)]
//! Shared test utilities for integration tests.
//!
//! - `fixtures`: runs, outcomes and fast retry settings
//! - `transport`: a scripted in-process [`UploadTransport`](mteval_upload::UploadTransport)

pub mod fixtures;
pub mod transport;

pub use fixtures::{
    delivered, fast_policy, greeting_run, named_run, rate_limited, rejected, target, unavailable,
};
pub use transport::ScriptedTransport;

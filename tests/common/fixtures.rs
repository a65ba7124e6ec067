//! Runs and outcomes shared by the integration tests.

use mteval_upload::{
    DeliveryTarget, Outcome, Rejection, RetryConfig, RetryPolicy, Run, Segment,
};
use std::time::Duration;

/// The single-segment English to French run used throughout.
pub fn greeting_run() -> Run {
    Run::new(
        "default",
        "greetings",
        "en",
        "fr",
        vec![Segment::new("Hello", "Bonjour")],
    )
}

/// A distinct run per `dataset_name`.
pub fn named_run(dataset_name: &str) -> Run {
    Run::new(
        "default",
        dataset_name,
        "en",
        "de",
        vec![
            Segment::new("Good morning", "Guten Morgen"),
            Segment::new("Thank you", "Danke").with_reference("Vielen Dank"),
        ],
    )
}

pub fn target() -> DeliveryTarget {
    DeliveryTarget::new("http://localhost:8000", "test-key")
}

/// Millisecond-scale backoff so retry tests stay fast.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(RetryConfig::new(max_attempts, 1, 8))
}

pub fn delivered() -> Outcome {
    Outcome::Delivered {
        status: 201,
        remote_id: Some(1),
    }
}

pub fn unavailable() -> Outcome {
    Outcome::RejectedTransient(Rejection::new(Some(503), "service unavailable"))
}

pub fn rate_limited(retry_after: Duration) -> Outcome {
    let mut rejection = Rejection::new(Some(429), "too many requests");
    rejection.retry_after = Some(retry_after);
    Outcome::RejectedTransient(rejection)
}

pub fn rejected(status: u16) -> Outcome {
    Outcome::RejectedPermanent(Rejection::new(Some(status), "request rejected"))
}

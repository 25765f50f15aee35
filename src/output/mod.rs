//! Output verification module

pub mod verifier;

pub use verifier::{check_duration, ClipVerifier, VerificationResult, MEASUREMENT_SLACK};

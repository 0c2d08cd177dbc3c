//! Services module for business logic

pub mod donation;
pub mod verification;
pub mod webhook_processor;

pub use verification::{
    DonationStatus, VerificationError, VerificationOrchestrator, VerificationOutcome,
    VerificationRequest, VerificationResult,
};

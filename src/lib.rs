//! GiveHaven backend: donation payment verification and campaign ledger
//! reconciliation service.
//!
//! The service sits between donor-facing clients and the payment gateway:
//! it creates pending donation records, hands donors off to the gateway's
//! checkout, and (on callback or webhook) verifies the payment outcome
//! exactly once, settling the donation and applying the confirmed amount to
//! the targeted campaign's running total.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;

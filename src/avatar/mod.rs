//! Avatar swap module
//!
//! Validates inbound avatar-export messages and replaces the current avatar.

pub mod swap;

pub use swap::{IgnoreReason, MessageOutcome, SwapController, SwapOutcome, SwapTicket};

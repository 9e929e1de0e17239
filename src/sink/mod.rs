//! # Sink Module
//!
//! Consumers of routed samples.
//!
//! This module handles:
//! - Broadcasting samples to live subscribers as named events ([`stream`])
//! - Appending samples to the active recording file ([`record`])

pub mod record;
pub mod stream;

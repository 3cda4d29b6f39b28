//! Core domain types for the essentials module.
//!
//! This module contains pure domain types with no host dependencies:
//! - Players as seen by the module
//! - Teleport request typestate machine

pub mod request;

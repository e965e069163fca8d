//! System utilities
//!
//! Hardware probing for the local inference path.

pub mod accelerator;

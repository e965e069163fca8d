//! Shared type definitions

pub mod config;
pub mod message;

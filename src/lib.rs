//! aihub library
//!
//! Edge functions for the AI hub backend plus the client-side pieces that talk
//! to them: the hybrid local/server selector, the preference store and the
//! session state.

pub mod backend;
pub mod client;
pub mod functions;
pub mod inference;
pub mod providers;
pub mod session;
pub mod storage;
pub mod system;
pub mod types;

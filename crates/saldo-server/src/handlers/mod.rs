//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod assistant;
pub mod items;
pub mod pluggy;

// Re-export all handlers for use in router
pub use assistant::*;
pub use items::*;
pub use pluggy::*;

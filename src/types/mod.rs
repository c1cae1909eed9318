//! Type definitions module
//!
//! Chat message types consumed and produced by the budgeting core.

pub mod messages;

// Re-export commonly used types
pub use messages::{Content, ContentPart, ImageUrl, InputAudio, Message, Role};

pub mod error;
pub mod options;
pub mod payload;

// Re-export commonly used types
pub use error::{CorruptReason, LogError};
pub use options::LogOptions;

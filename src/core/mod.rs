//! Core types shared by every layer of jelly-requester.

pub mod error;

// Re-export commonly used types
pub use error::{AppError, AppResult, StoreError, StoreResult};

//! Core types shared across proji: the error taxonomy and cancellation helpers.

pub mod cancel;
pub mod error;

pub use cancel::{OrCancel, checkpoint};
pub use error::{ErrorContext, ProjiError, find_error, user_friendly_error};

//! Core types shared by every cache component: the dependency descriptor
//! and the error taxonomy.

mod dependency;
pub mod error;

pub use dependency::Dependency;
pub use error::{BoxError, CacheError, ErrorContext, user_friendly_error};

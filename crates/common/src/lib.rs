//! Common utilities and types shared across vip-manager components.

pub mod error;
pub mod logging;

pub use error::{Error, Result};

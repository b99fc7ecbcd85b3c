//! # namecast-core
//!
//! Core crate for Namecast. Contains the unified error system, the
//! configuration schemas, and the object-storage trait every other crate
//! programs against.
//!
//! This crate has **no** internal dependencies on other Namecast crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;

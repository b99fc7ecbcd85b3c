//! Background maintenance for Namecast.
//!
//! This crate provides:
//! - A scratch reaper that removes orphaned job directories
//! - A sweeper that drops upload sessions nobody has touched for a while
//! - [`BackgroundTasks`], which owns the periodic loops and stops them on
//!   request

pub mod reaper;
pub mod session_sweeper;
pub mod tasks;

pub use reaper::{ReapReport, ScratchReaper};
pub use session_sweeper::SessionSweeper;
pub use tasks::{BackgroundTasks, PeriodicTask};

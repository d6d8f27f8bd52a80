//! # Sesame Interfaces (Public Page Contract)
//!
//! This crate defines the contract between the session bootstrapper and the
//! remote, script-capable document it drives. It provides protocol-agnostic
//! traits (`Page`, `PageLauncher`), the error type (`PageError`) and the
//! small data structures shared by every page implementation.

mod common;
mod error;
mod launcher;
mod page;

pub use common::*;
pub use error::*;
pub use launcher::*;
pub use page::*;

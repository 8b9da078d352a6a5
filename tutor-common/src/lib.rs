//! # Tutor Common Library
//!
//! Shared code for the tutor services:
//! - Error and result types
//! - Bootstrap configuration loading (CLI → ENV → TOML → defaults)
//! - Calendar clock used for daily quota resets
//! - SQLite initialization and schema

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, ManualClock, SystemClock};

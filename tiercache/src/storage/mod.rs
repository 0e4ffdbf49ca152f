//! Storage Module
//!
//! Durable tier of the cache:
//! - Medium: capability trait plus an in-process implementation
//! - File: directory-backed medium with a byte quota
//! - Durable: key layout, side index and the single writer queue

pub mod durable;
pub mod file;
pub mod medium;

pub use durable::{DurableStore, KeyLayout, PutOutcome};
pub use file::FileMedium;
pub use medium::{MemoryMedium, StorageMedium};

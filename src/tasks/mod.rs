//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is open.
//!
//! # Tasks
//! - Capacity janitor: age-based bulk eviction for the filesystem backend

mod janitor;

pub use janitor::spawn_janitor_task;

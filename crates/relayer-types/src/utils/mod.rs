//! Small helpers used throughout the relayer crates.

pub mod helpers;

pub use helpers::{current_timestamp, truncate_id};

//! # Core Module
//!
//! Concurrency primitives shared by the main thread and the chunk worker.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking
//! - `PlayerPositionCell`: Lock-free player chunk coordinate read by the job queue

pub mod mt_resource;
pub mod player_position;

pub use mt_resource::MtResource;
pub use player_position::PlayerPositionCell;

//! # Service Layer
//!
//! - `topology`: [`TopologyAccessor`] and its refresh loop
//! - `scheduler`: [`PollScheduler`] and the handle controlling its task

mod scheduler;
mod topology;


pub use scheduler::{PollScheduler, PollSchedulerHandle};
pub use topology::{topology_refresh_task, TopologyAccessor};

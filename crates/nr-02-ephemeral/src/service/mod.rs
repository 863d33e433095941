//! # Service Layer
//!
//! `RotationManager` implements [`crate::ports::RotationApi`] and doubles as
//! the registration observer; `rotation_task` drives it on an interval.

mod manager;
mod task;

#[cfg(test)]
mod tests;

pub use manager::RotationManager;
pub use task::rotation_task;

//! # Adapters

pub mod log_only;

pub use log_only::LogOnlyNotifier;

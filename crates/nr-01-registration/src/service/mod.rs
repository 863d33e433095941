//! # Service Layer
//!
//! `RegistrationService` owns the store operations (`store`) and implements
//! the remote-facing [`crate::ports::RegistrationApi`] (`rpc`).

mod store;
mod rpc;


pub use store::RegistrationService;

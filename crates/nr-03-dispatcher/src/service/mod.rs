//! # Service Layer

mod dispatcher;

#[cfg(test)]
mod tests;

pub use dispatcher::Dispatcher;

//! Cross-subsystem integration tests.

pub mod failure_budget;
pub mod flows;

#[cfg(test)]
pub(crate) mod fixture;

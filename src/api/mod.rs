//! HTTP surface

pub mod analyze;
pub mod health;

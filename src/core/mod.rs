//! Configuration and the value types shared across the crate.

pub mod config;
pub mod models;

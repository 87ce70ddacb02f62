//! Infrastructure adapters for config, logging, and the generation backend.

pub mod backend;
pub mod config;
pub mod logging;

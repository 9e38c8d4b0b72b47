//! Foundation module - Core utilities shared by every subsystem
//!
//! Currently this is the logging front-end; the ECS and render modules
//! log through the re-exported `log` macros.

pub mod logging;

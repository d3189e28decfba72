//! Logging setup for the command-line front end.

mod tracing_init;

pub use tracing_init::*;

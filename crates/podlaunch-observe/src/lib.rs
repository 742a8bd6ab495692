//! Logging for the launch bootstrap: one global `tracing` subscriber whose level
//! filter can be swapped after start-up.

mod logger;
pub use logger::*;

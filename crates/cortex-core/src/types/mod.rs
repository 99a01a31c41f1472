//! Core types for cortex.

mod filter;
mod graph;
mod message;

pub use filter::*;
pub use graph::*;
pub use message::*;

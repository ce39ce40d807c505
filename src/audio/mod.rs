//! Audio I/O and sample-level processing.

pub mod processing;
pub mod wav;

pub use processing::*;
pub use wav::*;

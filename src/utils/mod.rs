//! Utility modules for the selfswap CLI
//!
//! - [`progress`]: progress bars and spinners that respect `--no-progress`

pub mod progress;

pub use progress::{ProgressBar, ProgressStyle};

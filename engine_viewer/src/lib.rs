//! `engine_viewer`
//!
//! Console-driven asset viewer:
//! - Fixed-tick loop flushing the resource cache once per tick
//! - Console commands to hold, release and inspect assets
//! - Leak report on exit

pub mod viewer;

pub use viewer::{AssetViewer, HeldHandle, ViewerState};

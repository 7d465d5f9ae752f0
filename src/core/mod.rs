//! # Core Infrastructure Module
//!
//! Runtime building blocks shared by the dispatcher and the preview:
//! cooperative stop signals, adaptive pacing and distribution channels.

pub mod channel;
pub mod pacing;
pub mod stop;

pub use channel::{Broadcast, LatestValue, Subscription};
pub use pacing::FramePacer;
pub use stop::StopSignal;

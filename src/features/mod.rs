//! Feature Engine - Fused estimate and trend features
//!
//! - `fit`: regression blend of the auxiliary sources and the station's
//!   round-half-up integer prediction
//! - `trend`: noise-tolerant rising/falling/flat classification and
//!   step-wise drop counting over bounded histories

pub mod fit;
pub mod trend;

pub use fit::{fuse, fuse_available, jump_point, predict_integer};
pub use trend::{classify_trend, classify_trend_with, count_drops, three_point_cooling};

//! Strategy Kernel - threshold-crossing decisions for daily temperature markets
//!
//! The market asks whether the station's daily max will stay at or under a
//! round-number threshold. Two independent kernels decide when the day's
//! peak has passed:
//! - `resonance`: continuous fused-estimate trend with multi-source
//!   confirmation and an avoidance zone above every rounding cliff
//! - `phased`: afternoon phases with per-phase drop depth, resonance and
//!   duration requirements, a hard force-buy deadline and the forecast
//!   guard as an absolute veto
//!
//! Both are synchronous and never fail; the only side effect is the
//! resonance kernel appending to the fused-estimate history.

pub mod phased;
pub mod resonance;

pub use phased::{evaluate_phased_strategy, PhasedDecision, FORCE_BUY_WINDOW_HOURS};
pub use resonance::{evaluate_resonance_strategy, ResonanceDecision, ResonanceMeta};

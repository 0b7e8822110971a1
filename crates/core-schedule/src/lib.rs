//! Outpost Core Schedule: pure-logic pacing for the polling loop
//!
//! # Overview
//!
//! The agent sleeps between cycles for a delay that depends on the time of
//! day. This crate answers two questions, and nothing else:
//!
//! - **Is it active hours?** A half-open `[start, end)` hour window on a
//!   24-hour clock ([`ActiveWindow`]).
//! - **How long until the next cycle?** A base delay chosen from the
//!   activity state plus uniform jitter ([`SleepPolicy`]).
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Clocks (the caller passes the current hour)
//! - Randomness sources (the caller passes an [`rand::Rng`])
//! - Configuration files or the remote service
//!
//! # Example
//!
//! ```
//! use outpost_core_schedule::{ActiveWindow, SleepPolicy};
//!
//! let window: ActiveWindow = "9-17".parse().unwrap();
//! let policy = SleepPolicy {
//!     window,
//!     active_delay_secs: 600,
//!     inactive_delay_secs: 3600,
//!     inactive_still_active: true,
//! };
//!
//! let decision = policy.decide(10, &mut rand::rng());
//! assert!(decision.state.is_active());
//! assert!(decision.delay.as_secs() >= 600 + 20);
//! assert!(decision.delay.as_secs() <= 600 + 120);
//! ```

pub mod policy;
pub mod window;

pub use policy::{ActivityState, ScheduleDecision, SleepPolicy, JITTER_MAX_SECS, JITTER_MIN_SECS};
pub use window::{ActiveWindow, WindowParseError};

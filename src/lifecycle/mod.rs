//! Assertion lifecycle.
//!
//! Caches one signed assertion at a time, reuses it until it is consumed by a
//! successful exchange or comes within a safety margin of its expiry, and
//! drives the token exchange.

pub mod clock;
pub mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{
    AssertionState, TokenLifecycleManager, TokenLifecycleManagerBuilder, REGENERATION_MARGIN_SECS,
};

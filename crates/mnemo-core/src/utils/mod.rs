//! Common utilities.

mod time;

pub use time::{Clock, ManualClock, SystemClock, now_secs};

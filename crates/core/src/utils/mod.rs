pub mod time_utils;
pub mod validation;

pub use time_utils::{Clock, ManualClock, SystemClock};

mod diagnostic;
mod expectation;
mod matching;
mod report;

pub use diagnostic::*;
pub use expectation::*;
pub use matching::*;
pub use report::*;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

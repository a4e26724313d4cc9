mod formatters;
mod report;

pub use formatters::*;
pub use report::*;

mod error;
mod invoker;
mod output;
mod presets;

pub use error::*;
pub use invoker::*;
pub use output::*;
pub use presets::*;

mod discovery;
mod scanner;
mod text;

pub use discovery::*;
pub use scanner::*;
pub use text::*;

mod eviction;
mod matcher;
mod parse;
mod types;
mod window;

pub use eviction::*;
pub use matcher::*;
pub use parse::*;
pub use types::*;
pub use window::*;

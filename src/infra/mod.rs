mod clean;
mod config;
mod content;
mod scan;
mod search;
mod trash;

pub use clean::*;
pub use config::*;
pub use content::*;
pub use scan::*;
pub use search::*;
pub use trash::*;

pub mod collect;
pub mod error;
pub mod flatten;
pub mod io;
pub mod logging;
pub mod model;

pub use error::{Result, ToolError};

pub mod actions;
pub mod config;
pub mod error;
pub mod reducer;
pub mod registry;
pub mod state;

pub use actions::*;
pub use error::*;
pub use reducer::*;
pub use registry::*;
pub use state::*;

pub mod contracts;
pub mod executor;
pub mod local;
pub mod runtime;

pub use contracts::*;
pub use executor::*;
pub use local::*;
pub use runtime::*;

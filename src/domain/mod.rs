pub mod types;
pub mod usage;

pub use types::*;
pub use usage::*;

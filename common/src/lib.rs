pub mod types;
pub mod time;

pub use types::*;
pub use time::*;

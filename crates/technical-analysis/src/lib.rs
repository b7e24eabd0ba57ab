pub mod analyzer;
pub mod indicator_set;
pub mod indicators;


pub use analyzer::*;
pub use indicator_set::*;
pub use indicators::*;

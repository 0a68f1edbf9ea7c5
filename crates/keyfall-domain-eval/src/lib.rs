pub mod difficulty;
pub mod judge;
pub mod memory;
pub mod phase;

pub use difficulty::*;
pub use judge::*;
pub use memory::*;
pub use phase::*;

pub mod blocks;
pub mod setup;
pub mod util;

pub use blocks::*;
pub use setup::*;
pub use util::*;

pub mod market;
pub mod track;

pub use market::*;
pub use track::*;

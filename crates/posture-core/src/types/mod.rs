mod outcome;
mod verdict;

pub use outcome::*;
pub use verdict::*;

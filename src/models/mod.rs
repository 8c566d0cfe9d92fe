pub mod outcome;
pub mod proxy;

pub use outcome::*;
pub use proxy::*;

pub mod lenient;
pub mod snapshot;
pub mod thought;

pub use snapshot::*;
pub use thought::*;

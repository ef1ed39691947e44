pub mod stage;
pub mod structured;
pub mod summary;

pub use stage::*;
pub use structured::*;
pub use summary::*;

pub mod pipeline;
pub mod runner;

pub use pipeline::*;
pub use runner::*;

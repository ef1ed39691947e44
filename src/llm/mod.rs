pub mod adapter;
pub mod client;
pub mod generator;
pub mod prompts;

pub use adapter::*;
pub use client::*;
pub use generator::*;
pub use prompts::*;

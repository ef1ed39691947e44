pub mod list;
pub mod text;

pub use list::*;
pub use text::*;

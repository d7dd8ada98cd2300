pub mod entities;
pub mod macros;
pub mod status;

pub use entities::*;
pub use status::*;

pub mod model;
pub mod session;
pub mod usage;

pub use model::*;
pub use session::*;
pub use usage::*;

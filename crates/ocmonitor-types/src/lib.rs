pub mod domain;
pub mod error;
pub mod pricing;
mod util;

pub use domain::*;
pub use error::{Error, Result};
pub use pricing::*;
pub use util::*;

pub mod day;
pub mod error;
pub mod model;
pub mod streak;
pub mod traits;

pub use error::*;
pub use model::*;
pub use traits::*;

//! Conf module: configuration model and loading.

pub mod model;
pub mod load;

pub use load::ConfError;
pub use model::{ContentMode, HuntConfig};

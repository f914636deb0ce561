pub mod credential;
pub mod error;
pub mod modes;
pub mod request;
pub mod result;
pub mod studio;

pub use error::{MirageError, Result};

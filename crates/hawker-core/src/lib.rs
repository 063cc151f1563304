pub mod config;
pub mod error;
pub mod text;
pub mod types;

pub use config::HawkerConfig;
pub use error::{HawkerError, Result};
pub use types::*;

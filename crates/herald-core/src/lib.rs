pub mod config;
pub mod error;
pub mod permissions;
pub mod types;

pub use config::HeraldConfig;
pub use error::{HeraldError, Result};
pub use permissions::Permissions;
pub use types::*;

//! Herald HTTP surface.
//!
//! Serves a fixed `/health` endpoint and hands every other request to the
//! action dispatcher, which resolves it against the registered routes under
//! the configured mount prefix.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorBody};
pub use routes::{create_router, start_server};
pub use state::ApiState;

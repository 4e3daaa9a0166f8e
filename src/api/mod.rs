pub mod handlers;
pub mod routes;

pub use handlers::{AppState, ServerContext};
pub use routes::create_router;

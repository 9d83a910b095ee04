mod admin_routes;
pub mod config;
pub mod error;
mod http_layers;
mod message_routes;
pub mod metrics;
pub mod pagination;
mod post_routes;
mod search;
pub mod server;
pub(self) mod session;
pub mod state;
mod task_routes;
mod user_routes;

pub use config::ServerConfig;
pub use error::ApiError;
pub use http_layers::*;
pub use server::{make_app, run_server, serve};
pub use session::Session;
pub use state::ServerState;
pub use user_routes::UserView;

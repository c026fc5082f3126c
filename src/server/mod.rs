mod handlers;
mod routes;

pub use handlers::host_without_port;
pub use routes::{ControlServer, ServerState};

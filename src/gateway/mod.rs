pub mod auth;
pub mod server;

pub use self::server::{AppState, run};

mod error;

pub mod client;
pub mod server;

pub use client::{fetch_health, HttpTransport};
pub use error::NetworkError;
pub use server::run_rpc_server;

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod integrations;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use server::Server;

pub(crate) mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod observability;
pub mod relay;
pub mod routing;
pub mod state;
pub mod stream;
pub mod transcript;
pub mod transport;

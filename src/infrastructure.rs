//! Infrastructure layer - configuration, logging, and the HTTP fetch client.

pub mod config;
pub mod http_client;
pub mod logging;

pub use config::{AppConfig, ConfigManager, FetchPolicy};
pub use http_client::{
    FetchClient, FetchError, IdentityPool, Payload, RequestCounters, Transport, TransportError,
    TransportResponse,
};

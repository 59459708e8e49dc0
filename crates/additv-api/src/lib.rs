// additv-api: Async Rust client for the Additv printer backend

pub mod auth;
pub mod client;
pub mod error;
pub mod registration;
pub mod rest;
pub mod session;
pub mod transport;

pub use auth::{AuthUser, RotationObserver, TokenPair};
pub use client::BackendClient;
pub use error::Error;
pub use registration::{Registration, RegistrationRequest, register};
pub use transport::{TlsMode, TransportConfig};

// Root module for API clients
pub mod auth_client;
pub mod client_factory;
pub mod error_handling;
pub mod list_query;
pub mod request_client;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth_client::*;
pub use client_factory::*;
pub use error_handling::*;
pub use list_query::*;
pub use request_client::*;
pub use transport::*;

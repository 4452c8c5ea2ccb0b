//! HTTP implementation of the custom fields provider.

mod provider;
mod routes;

pub use provider::HttpFieldsProvider;
pub use routes::Routes;

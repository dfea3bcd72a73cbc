//! Built-in plugins.

mod api_errors;
mod data_cache;
mod logging;

pub use api_errors::ApiErrorPlugin;
pub use data_cache::{DataCachePlugin, CACHE_HIT_META};
pub use logging::LoggingPlugin;

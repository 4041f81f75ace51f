//! Configuration types and loading for docshift.
//!
//! Configuration is layered: an optional file in the `configuration` directory, then
//! `APP_`-prefixed environment variables, then whatever the caller overrides on top (usually
//! command line flags).

mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config, load_config_from};

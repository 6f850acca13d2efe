//! Library surface of the `fieldmap` binary: logging, configuration and
//! engine setup.

#![deny(unsafe_code)]

pub mod config;
pub mod logging;
pub mod setup;

pub use config::{DEFAULT_CONFIG_FILE, FieldmapConfig};
pub use setup::{build_engine, build_engine_with, load_store, read_request, schema_dir};

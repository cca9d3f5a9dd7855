//! pubsub-metadata: Middleware properties file types
//!
//! The properties file names the bridges a process may load and, per bridge,
//! the connection parameters of each named transport.

pub mod error;
pub mod properties;

pub use error::MetadataError;
pub use properties::{
    BridgeConfig, Properties, TransportParams, DEFAULT_PROPERTIES_DIR, DEFAULT_PROPERTIES_FILE,
};

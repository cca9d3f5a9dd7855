//! pubsub-tutorials: Shared pieces of the tutorial binaries
//!
//! - `topic-publish-one`: send one greeting and tear down
//! - `topic-publisher`: send a timestamp message on an interval until Ctrl-C
//! - `topic-subscriber`: print messages received on a topic until Ctrl-C

pub mod cli;
pub mod fields;
pub mod handlers;

pub use cli::{exit_code, init_tracing, parse_interval, ConnectionArgs, MAX_INTERVAL};
pub use fields::{
    asctime, greeting_message, timestamp_message, GREETING, GREETING_FIELD, TIMESTAMP_FIELD,
};
pub use handlers::TopicPrinter;

mod transport;

pub use transport::{NatsTransport, DEFAULT_NATS_URL};

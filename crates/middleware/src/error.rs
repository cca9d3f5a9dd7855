use std::fmt;

use pubsub_metadata::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("publish failed: {0}")]
    PublishFailed(String),
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),
    #[error("subscriber lagged, {0} messages dropped")]
    Lagged(u64),
    #[error("transport closed")]
    Closed,
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}

/// Outcome classification for every middleware operation.
///
/// The numeric code doubles as the process exit status of the tutorial
/// binaries when an operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    InitFailed,
    ConnectionFailed,
    AllocationFailed,
    SendFailed,
    SubscriptionFailed,
    TimerFailed,
    CodecFailed,
    ConfigError,
    InvalidState,
    NotFound,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::InitFailed => 1,
            Status::ConnectionFailed => 2,
            Status::AllocationFailed => 3,
            Status::SendFailed => 4,
            Status::SubscriptionFailed => 5,
            Status::TimerFailed => 6,
            Status::CodecFailed => 7,
            Status::ConfigError => 8,
            Status::InvalidState => 9,
            Status::NotFound => 10,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Status::Ok => "STATUS_OK",
            Status::InitFailed => "STATUS_INIT_FAILED",
            Status::ConnectionFailed => "STATUS_CONNECTION_FAILED",
            Status::AllocationFailed => "STATUS_ALLOCATION_FAILED",
            Status::SendFailed => "STATUS_SEND_FAILED",
            Status::SubscriptionFailed => "STATUS_SUBSCRIPTION_FAILED",
            Status::TimerFailed => "STATUS_TIMER_FAILED",
            Status::CodecFailed => "STATUS_CODEC_FAILED",
            Status::ConfigError => "STATUS_CONFIG_ERROR",
            Status::InvalidState => "STATUS_INVALID_STATE",
            Status::NotFound => "STATUS_NOT_FOUND",
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Error, Debug)]
pub enum MiddlewareError {
    #[error("bridge initialization failed: {0}")]
    Init(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("resource allocation failed: {0}")]
    Allocation(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("subscription failed: {0}")]
    Subscription(String),
    #[error("timer failed: {0}")]
    Timer(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("configuration error: {0}")]
    Config(#[from] MetadataError),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl MiddlewareError {
    pub fn status(&self) -> Status {
        match self {
            MiddlewareError::Init(_) => Status::InitFailed,
            MiddlewareError::Connection(_) => Status::ConnectionFailed,
            MiddlewareError::Allocation(_) => Status::AllocationFailed,
            MiddlewareError::Send(_) => Status::SendFailed,
            MiddlewareError::Subscription(_) => Status::SubscriptionFailed,
            MiddlewareError::Timer(_) => Status::TimerFailed,
            MiddlewareError::Codec(_) => Status::CodecFailed,
            MiddlewareError::Config(_) => Status::ConfigError,
            MiddlewareError::InvalidState(_) => Status::InvalidState,
            MiddlewareError::NotFound(_) => Status::NotFound,
        }
    }
}

impl From<TransportError> for MiddlewareError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::ConnectionFailed(msg) => MiddlewareError::Connection(msg),
            TransportError::PublishFailed(msg) => MiddlewareError::Send(msg),
            TransportError::SubscribeFailed(msg) => MiddlewareError::Subscription(msg),
            TransportError::Lagged(n) => {
                MiddlewareError::Subscription(format!("{} messages dropped", n))
            }
            TransportError::Closed => MiddlewareError::InvalidState("transport closed".to_string()),
            TransportError::ValidationFailed(msg) => MiddlewareError::InvalidState(msg),
        }
    }
}

impl From<serde_json::Error> for MiddlewareError {
    fn from(e: serde_json::Error) -> Self {
        MiddlewareError::Codec(e.to_string())
    }
}

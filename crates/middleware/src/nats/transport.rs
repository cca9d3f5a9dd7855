use std::sync::atomic::{AtomicBool, Ordering};

use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use pubsub_metadata::TransportParams;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::subject;
use crate::transport::{Subscription, Transport, TransportMessage};

/// Broker URL used when the properties file gives none
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// NATS subscription wrapper
struct NatsSubscription {
    pattern: String,
    subscriber: async_nats::Subscriber,
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next(&mut self) -> Result<TransportMessage, TransportError> {
        let msg = self.subscriber.next().await.ok_or(TransportError::Closed)?;

        Ok(TransportMessage {
            subject: msg.subject.to_string(),
            payload: msg.payload,
        })
    }

    async fn unsubscribe(mut self: Box<Self>) -> Result<(), TransportError> {
        debug!(pattern = %self.pattern, "NATS unsubscribe");
        self.subscriber
            .unsubscribe()
            .await
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))
    }
}

/// NATS transport implementation
pub struct NatsTransport {
    name: String,
    client: Client,
    closed: AtomicBool,
}

impl NatsTransport {
    /// Create a new NatsTransport from an existing client
    pub fn new(name: impl Into<String>, client: Client) -> Self {
        Self {
            name: name.into(),
            client,
            closed: AtomicBool::new(false),
        }
    }

    /// Connect to the NATS server described by `params`
    pub async fn connect(name: &str, params: &TransportParams) -> Result<Self, TransportError> {
        let url = params.url.as_deref().unwrap_or(DEFAULT_NATS_URL);

        let mut options = ConnectOptions::new();
        if let (Some(user), Some(pass)) = (&params.username, &params.password) {
            options = options.user_and_password(user.clone(), pass.clone());
        }
        if let Some(ref token) = params.token {
            options = options.token(token.clone());
        }
        if let Some(ref client_name) = params.client_name {
            options = options.name(client_name.clone());
        }

        let client = options
            .connect(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {}", url, e)))?;
        info!(transport = %name, url = %url, "Connected to NATS");
        Ok(Self::new(name, client))
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for NatsTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.ensure_open()?;
        subject::validate_topic(subject)?;
        self.client
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| TransportError::PublishFailed(e.to_string()))
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, TransportError> {
        self.ensure_open()?;
        subject::validate_pattern(pattern)?;
        let subscriber = self
            .client
            .subscribe(pattern.to_string())
            .await
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))?;
        Ok(Box::new(NatsSubscription {
            pattern: pattern.to_string(),
            subscriber,
        }))
    }

    async fn flush(&self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.client
            .flush()
            .await
            .map_err(|e| TransportError::PublishFailed(e.to_string()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.ensure_open()?;
        let flushed = self
            .client
            .flush()
            .await
            .map_err(|e| TransportError::PublishFailed(e.to_string()));
        self.closed.store(true, Ordering::SeqCst);
        debug!(transport = %self.name, "NATS transport closed");
        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running NATS server
    // Run: docker run -p 4222:4222 nats:latest

    #[tokio::test]
    #[ignore] // Requires NATS server
    async fn test_publish_succeeds() {
        let transport = NatsTransport::connect("vmr", &TransportParams::default())
            .await
            .unwrap();
        let result = transport.publish("test.subject", Bytes::from("hello")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        let params = TransportParams {
            url: Some("nats://127.0.0.1:1".to_string()),
            ..Default::default()
        };
        let result = NatsTransport::connect("vmr", &params).await;
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}

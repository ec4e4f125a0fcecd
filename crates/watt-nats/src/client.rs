use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use tracing::info;

pub struct NatsClient {
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: std::time::Duration) -> Result<Self> {
        info!("connecting to NATS at {} (timeout={:?})", url, timeout);

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("failed to connect to NATS")?;

        let jetstream = jetstream::new(client);

        info!("connected to NATS");
        Ok(Self { jetstream })
    }

    /// Create the stream if it does not exist yet. The stream carries exactly
    /// its own name as subject; usage samples and alerts each get one.
    pub async fn ensure_stream(&self, stream_name: &str) -> Result<()> {
        let stream_config = StreamConfig {
            name: stream_name.to_string(),
            subjects: vec![stream_name.to_string()],
            ..Default::default()
        };

        match self.jetstream.get_stream(stream_name).await {
            Ok(_) => {
                info!("stream '{}' already exists", stream_name);
            }
            Err(_) => {
                self.jetstream
                    .create_stream(stream_config)
                    .await
                    .context("failed to create stream")?;
                info!("created stream '{}'", stream_name);
            }
        }

        Ok(())
    }

    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    pub async fn close(self) {
        info!("closing NATS connection");
        // Connection closes when the client is dropped.
    }
}

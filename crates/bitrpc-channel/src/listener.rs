use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bitrpc_mux::MuxConfig;
use bitrpc_transport::{Endpoint, Listener};
use tracing::info;

use crate::channel::RequestChannel;
use crate::config::ChannelConfig;
use crate::connector::start_channel;
use crate::error::Result;
use crate::receiver::TargetResolver;

/// Accepts connections and starts a [`RequestChannel`] on each.
pub struct ChannelListener {
    listener: Listener,
    resolver: Arc<dyn TargetResolver>,
    mux_config: MuxConfig,
    channel_config: ChannelConfig,
    next_connection_id: AtomicU64,
}

impl ChannelListener {
    /// Bind `endpoint`. Accepted channels serve requests through `resolver`.
    pub fn bind(endpoint: &Endpoint, resolver: Arc<dyn TargetResolver>) -> Result<Self> {
        let listener = endpoint.bind()?;
        Ok(Self {
            listener,
            resolver,
            mux_config: MuxConfig::default(),
            channel_config: ChannelConfig::default(),
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// Override the multiplexer configuration of accepted connections.
    pub fn with_mux_config(mut self, config: MuxConfig) -> Self {
        self.mux_config = config;
        self
    }

    /// Override the channel configuration of accepted connections.
    pub fn with_channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Accept the next connection. Channels are labelled `conn-<n>`.
    pub fn accept(&self) -> Result<RequestChannel> {
        let stream = self.listener.accept()?;
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let label = format!("conn-{id}");
        info!(connection = %label, peer = %stream.peer_label(), "accepted connection");
        start_channel(
            label,
            stream,
            Arc::clone(&self.resolver),
            self.mux_config.clone(),
            self.channel_config.clone(),
        )
    }

    /// The endpoint actually bound.
    pub fn local_endpoint(&self) -> Endpoint {
        self.listener.local_endpoint()
    }
}

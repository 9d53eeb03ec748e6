//! `--config` file support.
//!
//! ```json
//! {
//!   "mux": { "fixed_channels": 4, "max_message_len": 4096 },
//!   "channel": { "short_channel": 0 },
//!   "serializer": { "max_string_length": 1024 }
//! }
//! ```
//!
//! Every key is optional; missing keys keep the library defaults.

use std::path::Path;
use std::time::Duration;

use bitrpc_channel::ChannelConfig;
use bitrpc_mux::MuxConfig;
use bitrpc_schema::SerializerOptions;
use serde::Deserialize;

use crate::exit::{io_error, CliError, CliResult, USAGE};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub mux: MuxSettings,
    pub channel: ChannelConfig,
    pub serializer: SerializerOptions,
}

/// Multiplexer overrides. Both ends must use the same channel counts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MuxSettings {
    pub fixed_channels: Option<u16>,
    pub stream_slots: Option<u16>,
    pub max_message_len: Option<usize>,
    pub stream_chunk_len: Option<usize>,
    pub max_payload_size: Option<usize>,
    pub write_timeout_ms: Option<u64>,
}

impl CliConfig {
    /// Read `path`, or return the defaults when there is none.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        Self::parse(&text)
            .map_err(|err| CliError::new(USAGE, format!("invalid config {}: {}", path.display(), err.message)))
    }

    pub fn parse(text: &str) -> CliResult<Self> {
        serde_json::from_str(text).map_err(|err| CliError::new(USAGE, err.to_string()))
    }

    pub fn mux_config(&self) -> MuxConfig {
        let mut config = MuxConfig::default();
        let settings = &self.mux;
        if let Some(count) = settings.fixed_channels {
            config.fixed_channels = count;
        }
        if let Some(slots) = settings.stream_slots {
            config.stream_slots = slots;
        }
        if let Some(len) = settings.max_message_len {
            config.max_message_len = len;
        }
        if let Some(len) = settings.stream_chunk_len {
            config.stream_chunk_len = len;
        }
        if let Some(size) = settings.max_payload_size {
            config.frame.max_payload_size = size;
        }
        if let Some(ms) = settings.write_timeout_ms {
            config.frame.write_timeout = Some(Duration::from_millis(ms));
        }
        config
    }
}

use serde::{Deserialize, Serialize};

/// Buffer size for calls when no short channel is in use.
pub const DEFAULT_FALLBACK_LEN: usize = 2048;

/// Request channel configuration. Both peers must agree on `short_channel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Fixed multiplexer channel for calls that fit one message.
    /// `None` sends every call over a pooled stream. Default: `Some(0)`.
    pub short_channel: Option<u16>,
    /// Bytes buffered before a call switches to a pooled stream when there is
    /// no short channel. Default: 2048.
    pub fallback_len: usize,
    /// Context id stamped on outbound requests. Default: 0.
    pub context_id: u16,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            short_channel: Some(0),
            fallback_len: DEFAULT_FALLBACK_LEN,
            context_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.short_channel, Some(0));
        assert_eq!(config.fallback_len, 2048);
        assert_eq!(config.context_id, 0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ChannelConfig = serde_json::from_str(r#"{"short_channel": null}"#).unwrap();
        assert_eq!(config.short_channel, None);
        assert_eq!(config.fallback_len, DEFAULT_FALLBACK_LEN);
    }
}

//! Addresses for outbound calls.

use uuid::Uuid;

use crate::channel::RequestChannel;
use crate::error::{ChannelError, Result};
use crate::header::{check_path_len, Addressing};
use crate::request::OutboundRequest;

/// Something calls can be sent to.
pub trait RequestTarget: Send + Sync {
    /// Path of the service on the peer.
    fn service_path(&self) -> &str;

    /// Interface the calls are encoded against.
    fn interface_id(&self) -> Uuid;

    fn start_request(&self, one_way: bool) -> Result<OutboundRequest>;
}

/// A target named by interface id and path, resolved by the peer's
/// [`TargetResolver`](crate::TargetResolver) on every call.
#[derive(Debug, Clone)]
pub struct LongTarget {
    channel: RequestChannel,
    path: String,
    interface_id: Uuid,
}

impl LongTarget {
    /// The empty path is reserved for the channel itself.
    pub fn new(channel: RequestChannel, path: impl Into<String>, interface_id: Uuid) -> Result<Self> {
        let path = path.into();
        if path.is_empty() {
            return Err(ChannelError::InvalidPath {
                path,
                reason: "the empty path is reserved",
            });
        }
        check_path_len(&path)?;
        Ok(Self {
            channel,
            path,
            interface_id,
        })
    }
}

impl RequestTarget for LongTarget {
    fn service_path(&self) -> &str {
        &self.path
    }

    fn interface_id(&self) -> Uuid {
        self.interface_id
    }

    fn start_request(&self, one_way: bool) -> Result<OutboundRequest> {
        self.channel
            .start_request(Addressing::long(self.interface_id, self.path.clone()), one_way)
    }
}

/// A target the peer registered under a numeric id with
/// [`RequestChannel::register_receiver`]. Requests carry only the id.
#[derive(Debug, Clone)]
pub struct ShortTarget {
    channel: RequestChannel,
    target_id: u32,
    path: String,
    interface_id: Uuid,
}

impl ShortTarget {
    pub fn new(
        channel: RequestChannel,
        target_id: u32,
        path: impl Into<String>,
        interface_id: Uuid,
    ) -> Self {
        Self {
            channel,
            target_id,
            path: path.into(),
            interface_id,
        }
    }

    pub fn target_id(&self) -> u32 {
        self.target_id
    }
}

impl RequestTarget for ShortTarget {
    fn service_path(&self) -> &str {
        &self.path
    }

    fn interface_id(&self) -> Uuid {
        self.interface_id
    }

    fn start_request(&self, one_way: bool) -> Result<OutboundRequest> {
        self.channel.start_request(
            Addressing::Short {
                target_id: self.target_id,
            },
            one_way,
        )
    }
}

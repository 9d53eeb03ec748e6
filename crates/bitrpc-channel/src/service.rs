//! Typed calls over a channel: interface contracts on both ends.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bitrpc_bits::{BitReader, BitWriter};
use bitrpc_schema::{ResolvedContract, ResolvedMethod, Value};
use parking_lot::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ChannelError, Result};
use crate::receiver::{RequestReceiver, TargetResolver};
use crate::request::{InboundRequest, StreamRequest};
use crate::target::RequestTarget;

/// Implementation behind a [`ServiceDispatcher`].
///
/// An `Err` is reported to the caller as an aborted call carrying the
/// message.
pub trait ServiceHandler: Send + Sync {
    fn invoke(&self, method: &ResolvedMethod, args: Vec<Value>) -> std::result::Result<Value, String>;
}

impl<F> ServiceHandler for F
where
    F: Fn(&ResolvedMethod, Vec<Value>) -> std::result::Result<Value, String> + Send + Sync,
{
    fn invoke(&self, method: &ResolvedMethod, args: Vec<Value>) -> std::result::Result<Value, String> {
        self(method, args)
    }
}

/// Calling side of a contract.
pub struct ServiceProxy {
    target: Arc<dyn RequestTarget>,
    contract: Arc<ResolvedContract>,
    timeout: Option<Duration>,
}

impl ServiceProxy {
    /// Fails if `target` addresses a different interface than `contract`.
    pub fn new(target: Arc<dyn RequestTarget>, contract: Arc<ResolvedContract>) -> Result<Self> {
        if target.interface_id() != contract.id() {
            return Err(ChannelError::InvalidState(
                "the target addresses a different interface than the contract",
            ));
        }
        Ok(Self {
            target,
            contract,
            timeout: None,
        })
    }

    /// Give up on two-way calls that get no response within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn contract(&self) -> &ResolvedContract {
        &self.contract
    }

    /// Call `method` with `args`.
    ///
    /// One-way methods return `Ok(None)` as soon as the request is sent.
    /// Two-way methods wait for the response and return the decoded value,
    /// or `None` when the method declares no return type. A timed-out call
    /// is aborted before [`ChannelError::Timeout`] is returned.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Option<Value>> {
        let method = self.contract.method(method)?;
        let mut writer = BitWriter::new(Vec::new());
        self.contract.encode_call(&mut writer, method, args)?;
        let body = writer.finish()?;

        let mut request = self.target.start_request(method.is_one_way())?;
        request.request_stream()?.write_all(&body)?;
        if method.is_one_way() {
            request.finish_request()?;
            return Ok(None);
        }

        let response = match request.wait_response(self.timeout) {
            Ok(response) => response,
            Err(ChannelError::Timeout(limit)) => {
                let message = format!("{} timed out after {limit:?}", method.name());
                if let Err(err) = request.abort(&message) {
                    debug!(call_id = request.call_id(), error = %err, "failed to abort timed-out call");
                }
                return Err(ChannelError::Timeout(limit));
            }
            Err(err) => return Err(err),
        };
        let mut reader = BitReader::new(response);
        Ok(self.contract.decode_return(&mut reader, method)?)
    }
}

impl std::fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("path", &self.target.service_path())
            .field("contract", &self.contract.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Serving side of a contract: decodes calls and runs a [`ServiceHandler`].
pub struct ServiceDispatcher {
    contract: Arc<ResolvedContract>,
    handler: Arc<dyn ServiceHandler>,
}

impl ServiceDispatcher {
    pub fn new(contract: Arc<ResolvedContract>, handler: Arc<dyn ServiceHandler>) -> Self {
        Self { contract, handler }
    }

    pub fn contract(&self) -> &ResolvedContract {
        &self.contract
    }
}

impl RequestReceiver for ServiceDispatcher {
    fn process_request(&self, mut request: InboundRequest) -> Result<()> {
        let decoded = self
            .contract
            .decode_call(&mut BitReader::new(request.request_stream()));
        let (method, args) = match decoded {
            Ok(call) => call,
            Err(err) => {
                request.abort(&format!("invalid call to {}: {err}", self.contract.name()))?;
                return Err(err.into());
            }
        };
        debug!(
            call_id = request.call_id(),
            method = method.name(),
            one_way = request.is_one_way(),
            "dispatching call"
        );

        let value = match self.handler.invoke(method, args) {
            Ok(value) => value,
            Err(message) => {
                request.abort(&message)?;
                return Err(ChannelError::Handler(message));
            }
        };
        if request.is_one_way() {
            if !value.is_null() {
                warn!(method = method.name(), "one-way handler returned a value; discarding it");
            }
            return Ok(());
        }

        let mut writer = BitWriter::new(Vec::new());
        let encoded = self
            .contract
            .encode_return(&mut writer, method, &value)
            .map_err(ChannelError::from)
            .and_then(|()| Ok(writer.finish()?));
        let payload = match encoded {
            Ok(payload) => payload,
            Err(err) => {
                request.abort(&format!("{} returned an unencodable value: {err}", method.name()))?;
                return Err(err);
            }
        };
        let mut response = request.response_stream()?;
        response.write_all(&payload)?;
        response.finish()
    }
}

impl std::fmt::Debug for ServiceDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceDispatcher")
            .field("contract", &self.contract.name())
            .finish()
    }
}

/// A [`TargetResolver`] backed by a table of `(path, interface id)` entries.
#[derive(Default)]
pub struct ServiceDirectory {
    services: RwLock<HashMap<(String, Uuid), Arc<dyn RequestReceiver>>>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `interface_id` at `path` with `receiver`, returning the receiver
    /// it replaces.
    pub fn register(
        &self,
        path: impl Into<String>,
        interface_id: Uuid,
        receiver: Arc<dyn RequestReceiver>,
    ) -> Option<Arc<dyn RequestReceiver>> {
        let path = path.into();
        debug!(%path, %interface_id, "registering service");
        self.services.write().insert((path, interface_id), receiver)
    }

    /// Serve `contract` at `path` through a [`ServiceDispatcher`].
    pub fn register_service(
        &self,
        path: impl Into<String>,
        contract: Arc<ResolvedContract>,
        handler: Arc<dyn ServiceHandler>,
    ) -> Option<Arc<dyn RequestReceiver>> {
        let interface_id = contract.id();
        self.register(
            path,
            interface_id,
            Arc::new(ServiceDispatcher::new(contract, handler)),
        )
    }

    pub fn unregister(&self, path: &str, interface_id: Uuid) -> Option<Arc<dyn RequestReceiver>> {
        self.services.write().remove(&(path.to_string(), interface_id))
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl TargetResolver for ServiceDirectory {
    fn resolve(&self, path: &str, interface_id: Uuid) -> Option<Arc<dyn RequestReceiver>> {
        self.services
            .read()
            .get(&(path.to_string(), interface_id))
            .cloned()
    }
}

impl std::fmt::Debug for ServiceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let services = self.services.read();
        let mut entries: Vec<_> = services.keys().collect();
        entries.sort();
        f.debug_struct("ServiceDirectory")
            .field("services", &entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Arc<dyn RequestReceiver> {
        Arc::new(|_request: InboundRequest| Ok(()))
    }

    #[test]
    fn directory_matches_path_and_interface() {
        let directory = ServiceDirectory::new();
        let id = Uuid::from_u128(7);
        assert!(directory.register("/svc", id, noop()).is_none());

        assert!(directory.resolve("/svc", id).is_some());
        assert!(directory.resolve("/svc", Uuid::from_u128(8)).is_none());
        assert!(directory.resolve("/other", id).is_none());
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn register_replaces_and_unregister_removes() {
        let directory = ServiceDirectory::new();
        let id = Uuid::from_u128(1);
        directory.register("/svc", id, noop());
        assert!(directory.register("/svc", id, noop()).is_some());
        assert_eq!(directory.len(), 1);

        assert!(directory.unregister("/svc", id).is_some());
        assert!(directory.is_empty());
        assert!(directory.unregister("/svc", id).is_none());
    }
}

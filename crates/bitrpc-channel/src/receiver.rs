use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::request::InboundRequest;

/// Handles inbound requests addressed to it.
///
/// Called on a thread of its own per request. An `Err` is logged by the
/// channel and nothing more; reporting failure to the caller is the
/// receiver's job (see [`InboundRequest::abort`]).
pub trait RequestReceiver: Send + Sync {
    fn process_request(&self, request: InboundRequest) -> Result<()>;
}

impl<F> RequestReceiver for F
where
    F: Fn(InboundRequest) -> Result<()> + Send + Sync,
{
    fn process_request(&self, request: InboundRequest) -> Result<()> {
        self(request)
    }
}

/// Maps long-form request targets to receivers.
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, path: &str, interface_id: Uuid) -> Option<Arc<dyn RequestReceiver>>;
}

/// A resolver that serves nothing, for channels that only make calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTargets;

impl TargetResolver for NoTargets {
    fn resolve(&self, _path: &str, _interface_id: Uuid) -> Option<Arc<dyn RequestReceiver>> {
        None
    }
}

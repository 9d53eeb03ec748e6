use std::sync::Arc;

use bitrpc_mux::{FramedMux, MuxConfig, Multiplexer};
use bitrpc_transport::{Endpoint, RpcStream};
use tracing::debug;

use crate::channel::RequestChannel;
use crate::config::ChannelConfig;
use crate::error::Result;
use crate::receiver::TargetResolver;

/// Connect to a listening channel with default configuration.
pub fn connect(endpoint: &Endpoint, resolver: Arc<dyn TargetResolver>) -> Result<RequestChannel> {
    connect_with_config(
        endpoint,
        resolver,
        MuxConfig::default(),
        ChannelConfig::default(),
    )
}

/// Connect with explicit configuration. Both ends must agree on the
/// multiplexer layout and the short channel.
pub fn connect_with_config(
    endpoint: &Endpoint,
    resolver: Arc<dyn TargetResolver>,
    mux_config: MuxConfig,
    channel_config: ChannelConfig,
) -> Result<RequestChannel> {
    let stream = endpoint.connect()?;
    debug!(%endpoint, "connected");
    start_channel(
        endpoint.to_string(),
        stream,
        resolver,
        mux_config,
        channel_config,
    )
}

pub(crate) fn start_channel(
    label: String,
    stream: RpcStream,
    resolver: Arc<dyn TargetResolver>,
    mux_config: MuxConfig,
    channel_config: ChannelConfig,
) -> Result<RequestChannel> {
    let mux: Arc<dyn Multiplexer> = Arc::new(FramedMux::over(stream, mux_config)?);
    RequestChannel::named(label, Arc::clone(&mux), resolver, channel_config).inspect_err(|_| {
        mux.close();
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::{Read, Write};
    use std::thread;
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::error::ChannelError;
    use crate::listener::ChannelListener;
    use crate::receiver::{NoTargets, RequestReceiver};
    use crate::request::InboundRequest;
    use crate::service::ServiceDirectory;
    use crate::target::RequestTarget;

    const ECHO: Uuid = Uuid::from_u128(0xec40);

    fn temp_endpoint(tag: &str) -> Endpoint {
        let dir = std::path::PathBuf::from(format!(
            "/tmp/bitrpc-conn-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        Endpoint::Unix(dir.join("rpc.sock"))
    }

    fn echo() -> Arc<dyn RequestReceiver> {
        Arc::new(|mut request: InboundRequest| -> Result<()> {
            let mut body = Vec::new();
            request.request_stream().read_to_end(&mut body)?;
            let mut response = request.response_stream()?;
            response.write_all(&body)?;
            response.finish()
        })
    }

    #[test]
    fn connect_and_call() {
        let endpoint = temp_endpoint("call");
        let directory = Arc::new(ServiceDirectory::new());
        directory.register("/echo", ECHO, echo());
        let listener = ChannelListener::bind(&endpoint, directory).expect("listener should bind");

        let server = thread::spawn(move || {
            let channel = listener.accept().expect("listener should accept");
            assert_eq!(channel.label(), "conn-1");
            channel
        });

        let client = connect(&endpoint, Arc::new(NoTargets)).expect("client should connect");
        let server_channel = server.join().expect("server thread should complete");

        let target = client.target("/echo", ECHO).expect("target should be valid");
        let mut request = target.start_request(false).expect("request should start");
        request
            .request_stream()
            .expect("body should be writable")
            .write_all(b"hello")
            .expect("body should be written");
        let mut response = request
            .wait_response(Some(Duration::from_secs(5)))
            .expect("response should arrive");
        let mut body = Vec::new();
        response.read_to_end(&mut body).expect("response should be readable");
        assert_eq!(body, b"hello");

        client.close();
        server_channel.close();
    }

    #[test]
    fn connect_to_missing_endpoint_fails() {
        let endpoint = temp_endpoint("missing");
        let err = connect(&endpoint, Arc::new(NoTargets)).unwrap_err();
        assert!(matches!(err, ChannelError::Transport(_)));
    }

    #[test]
    fn unknown_short_channel_closes_the_connection() {
        let endpoint = temp_endpoint("badcfg");
        let listener =
            ChannelListener::bind(&endpoint, Arc::new(NoTargets)).expect("listener should bind");
        let server = thread::spawn(move || listener.accept().map(|channel| channel.close()));

        let config = ChannelConfig {
            short_channel: Some(40),
            ..ChannelConfig::default()
        };
        let err = connect_with_config(
            &endpoint,
            Arc::new(NoTargets),
            MuxConfig::default(),
            config,
        )
        .unwrap_err();
        assert!(matches!(err, ChannelError::Mux(_)));
        server
            .join()
            .expect("server thread should complete")
            .expect("server should accept");
    }
}

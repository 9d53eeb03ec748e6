use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bitrpc_channel::{ChannelListener, RequestChannel, ServiceDirectory};
use bitrpc_transport::Endpoint;
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::config::CliConfig;
use crate::demo::{echo_contract, echo_handler, ECHO_PATH};
use crate::exit::{channel_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};

const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn run(args: ServeArgs, config: &CliConfig) -> CliResult<i32> {
    let endpoint =
        Endpoint::parse(&args.endpoint).map_err(|err| transport_error("invalid endpoint", err))?;

    let directory = Arc::new(ServiceDirectory::new());
    directory.register_service(
        ECHO_PATH,
        echo_contract(config.serializer)?,
        echo_handler(),
    );

    let listener = ChannelListener::bind(&endpoint, directory)
        .map_err(|err| channel_error("bind failed", err))?
        .with_mux_config(config.mux_config())
        .with_channel_config(config.channel.clone());
    let local = listener.local_endpoint();
    info!(endpoint = %local, path = ECHO_PATH, "serving Echo");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), local)?;

    let mut channels: Vec<RequestChannel> = Vec::new();
    let mut accepted = 0usize;
    while running.load(Ordering::SeqCst) {
        if args.max_connections.is_some_and(|max| accepted >= max) {
            break;
        }
        let channel = match listener.accept() {
            Ok(channel) => channel,
            Err(err) if running.load(Ordering::SeqCst) => {
                return Err(channel_error("accept failed", err));
            }
            Err(_) => break,
        };
        if !running.load(Ordering::SeqCst) {
            channel.close();
            break;
        }
        accepted += 1;
        channels.retain(|channel| !channel.is_closed());
        channels.push(channel);
    }

    while running.load(Ordering::SeqCst) && channels.iter().any(|channel| !channel.is_closed()) {
        std::thread::sleep(CLOSE_POLL_INTERVAL);
    }

    for channel in &channels {
        channel.close();
    }
    info!(connections = accepted, "server stopped");
    Ok(SUCCESS)
}

/// Stop on Ctrl-C. A blocked `accept` is woken by connecting to our own
/// endpoint once the flag is cleared.
fn install_ctrlc_handler(running: Arc<AtomicBool>, local: Endpoint) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        if let Err(err) = local.connect() {
            warn!(error = %err, "could not wake the accept loop");
        }
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

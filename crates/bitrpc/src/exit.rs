use std::fmt;
use std::io;

use bitrpc_channel::ChannelError;
use bitrpc_mux::MuxError;
use bitrpc_schema::SchemaError;
use bitrpc_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotFound
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn mux_error(context: &str, err: MuxError) -> CliError {
    match err {
        MuxError::Io(source) => io_error(context, source),
        MuxError::Transport(err) => transport_error(context, err),
        MuxError::PayloadTooLarge { .. } | MuxError::MessageTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        MuxError::InvalidConfig(_) | MuxError::UnknownChannel { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        MuxError::Closed | MuxError::ConnectionClosed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    match err {
        SchemaError::UnknownMethod { .. } | SchemaError::Arity { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Transport(err) => transport_error(context, err),
        ChannelError::Mux(err) => mux_error(context, err),
        ChannelError::Schema(err) => schema_error(context, err),
        ChannelError::Io(err) => io_error(context, err),
        ChannelError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ChannelError::Aborted(_) | ChannelError::ChannelClosed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        ChannelError::Bits(_) | ChannelError::InvalidHeader(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ChannelError::InvalidPath { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timeouts_map_to_124() {
        let err = channel_error("call failed", ChannelError::Timeout(Duration::from_secs(1)));
        assert_eq!(err.code, TIMEOUT);
        assert!(err.message.starts_with("call failed: "));
    }

    #[test]
    fn missing_socket_is_a_plain_failure() {
        let err = channel_error(
            "connect failed",
            ChannelError::Transport(TransportError::Connect {
                addr: "/tmp/none.sock".to_string(),
                source: io::ErrorKind::NotFound.into(),
            }),
        );
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn argument_errors_are_usage_errors() {
        let err = channel_error(
            "call failed",
            ChannelError::Schema(SchemaError::Arity {
                method: "add".to_string(),
                expected: 2,
                found: 1,
            }),
        );
        assert_eq!(err.code, USAGE);

        let err = schema_error(
            "bad argument",
            SchemaError::OutOfRange {
                field: "a".to_string(),
                value: 300,
                min: 0,
                max: 255,
            },
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn mux_io_errors_unwrap_to_their_kind() {
        let err = mux_error(
            "send failed",
            MuxError::Io(io::ErrorKind::PermissionDenied.into()),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }
}

use clap::{Args, Subcommand};

use crate::config::CliConfig;
use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod header;
pub mod precision;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the demo Echo contract at /echo.
    Serve(ServeArgs),
    /// Call a method of the demo Echo contract.
    Call(CallArgs),
    /// Print the bit width of an integer range.
    Precision(PrecisionArgs),
    /// Decode a call frame header from hex.
    Header(HeaderArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, config: &CliConfig, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, config),
        Command::Call(args) => call::run(args, config, format),
        Command::Precision(args) => precision::run(args, format),
        Command::Header(args) => header::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Endpoint to listen on (unix:<path>, tcp:<host:port>, or a socket path).
    pub endpoint: String,
    /// Stop accepting after N connections and exit once they have closed.
    #[arg(long)]
    pub max_connections: Option<usize>,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Endpoint to connect to.
    pub endpoint: String,
    /// Method name: echo, add, reverse or notify.
    pub method: String,
    /// Method arguments. Text for string parameters, JSON otherwise.
    #[arg(allow_hyphen_values = true)]
    pub args: Vec<String>,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PrecisionArgs {
    /// Smallest value of the range.
    #[arg(allow_negative_numbers = true)]
    pub min: i64,
    /// Largest value of the range.
    #[arg(allow_negative_numbers = true)]
    pub max: i64,
}

#[derive(Args, Debug)]
pub struct HeaderArgs {
    /// Frame bytes in hex; whitespace is ignored.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<std::time::Duration> {
    use std::time::Duration;

    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }
}

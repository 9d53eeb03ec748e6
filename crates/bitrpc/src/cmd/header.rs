use bitrpc_channel::{Addressing, CallHeader};
use serde_json::json;

use crate::cmd::HeaderArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{OutputFormat, Record};

pub fn run(args: HeaderArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = decode_hex(&args.hex)?;
    let (header, header_len) = CallHeader::decode(&bytes)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid call header: {err}")))?;

    let (kind, one_way, context_id, target) = match &header {
        CallHeader::Response { .. } => ("response", false, None, None),
        CallHeader::Request {
            one_way,
            context_id,
            target,
            ..
        } => ("request", *one_way, Some(*context_id), Some(target_json(target))),
    };

    Record::new()
        .field("kind", kind)
        .field("call_id", header.call_id())
        .field("flags", header.flags().bits())
        .field("one_way", one_way)
        .field("context_id", context_id)
        .field("target", target)
        .field("header_len", header_len)
        .field("payload_len", bytes.len() - header_len)
        .raw(format!("{header:?}"))
        .print(format);
    Ok(SUCCESS)
}

fn target_json(target: &Addressing) -> serde_json::Value {
    match target {
        Addressing::Short { target_id } => json!({ "target_id": target_id }),
        Addressing::Long { interface_id, path } => {
            json!({ "interface_id": interface_id.to_string(), "path": path })
        }
    }
}

fn decode_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let high = hex_value(pair[0]);
            let low = hex_value(pair[1]);
            match (high, low) {
                (Some(high), Some(low)) => Ok((high << 4) | low),
                _ => Err(CliError::new(
                    USAGE,
                    format!(
                        "invalid hex digit in {:?}",
                        String::from_utf8_lossy(pair)
                    ),
                )),
            }
        })
        .collect()
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

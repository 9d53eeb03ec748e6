use bitrpc_bits::precision;

use crate::cmd::PrecisionArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{OutputFormat, Record};

pub fn run(args: PrecisionArgs, format: OutputFormat) -> CliResult<i32> {
    if args.min > args.max {
        return Err(CliError::new(
            USAGE,
            format!("min {} is greater than max {}", args.min, args.max),
        ));
    }
    let bits = precision(args.min, args.max);
    let span = (args.max as i128 - args.min as i128) as u64;
    Record::new()
        .field("min", args.min)
        .field("max", args.max)
        .field("span", span)
        .field("bits", bits)
        .raw(bits.to_string())
        .print(format);
    Ok(SUCCESS)
}

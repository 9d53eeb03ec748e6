use std::sync::Arc;

use bitrpc_channel::{connect_with_config, NoTargets, ServiceProxy};
use bitrpc_schema::to_json;
use bitrpc_transport::Endpoint;
use tracing::debug;

use crate::cmd::{parse_duration, CallArgs};
use crate::config::CliConfig;
use crate::demo::{echo_contract, parse_args, ECHO_INTERFACE_ID, ECHO_PATH};
use crate::exit::{channel_error, schema_error, transport_error, CliResult, SUCCESS};
use crate::output::{display, OutputFormat, Record};

pub fn run(args: CallArgs, config: &CliConfig, format: OutputFormat) -> CliResult<i32> {
    let endpoint =
        Endpoint::parse(&args.endpoint).map_err(|err| transport_error("invalid endpoint", err))?;
    let timeout = parse_duration(&args.timeout)?;

    let contract = echo_contract(config.serializer)?;
    let method = contract
        .method(&args.method)
        .map_err(|err| schema_error("unknown method", err))?;
    let values = parse_args(&contract, method, &args.args)?;
    let one_way = method.is_one_way();

    let channel = connect_with_config(
        &endpoint,
        Arc::new(NoTargets),
        config.mux_config(),
        config.channel.clone(),
    )
    .map_err(|err| channel_error("connect failed", err))?;

    let outcome = channel
        .target(ECHO_PATH, ECHO_INTERFACE_ID)
        .and_then(|target| ServiceProxy::new(Arc::new(target), contract.clone()))
        .and_then(|proxy| proxy.with_timeout(timeout).call(&args.method, &values));
    channel.close();
    let result = outcome.map_err(|err| channel_error("call failed", err))?;
    debug!(method = %args.method, one_way, "call completed");

    let json = result.as_ref().map(to_json).unwrap_or(serde_json::Value::Null);
    let raw = display(&json);
    Record::new()
        .field("method", args.method.as_str())
        .field("one_way", one_way)
        .field("result", json)
        .raw(raw)
        .print(format);
    Ok(SUCCESS)
}

//! The `Echo` demo contract served by `bitrpc serve` and called by
//! `bitrpc call`.

use std::sync::Arc;

use bitrpc_channel::ServiceHandler;
use bitrpc_schema::{
    from_json, BitSerializer, FieldDef, IntKind, InterfaceContract, MethodDef, ResolvedContract,
    ResolvedMethod, SerializerOptions, TypeDesc, TypeRegistry, Value,
};
use uuid::Uuid;

use crate::exit::{schema_error, CliError, CliResult, USAGE};

pub const ECHO_INTERFACE_ID: Uuid = Uuid::from_u128(0x0b17_5e4d_ec40_4c11_8a2e_5d3f_6b7c_9e01);
pub const ECHO_PATH: &str = "/echo";

pub fn echo_contract(options: SerializerOptions) -> CliResult<Arc<ResolvedContract>> {
    let serializer = BitSerializer::new(TypeRegistry::new(), options)
        .map_err(|err| schema_error("serializer setup failed", err))?;
    let interface = InterfaceContract::new(ECHO_INTERFACE_ID, "Echo")
        .method(
            MethodDef::new("echo")
                .param(FieldDef::new("text", TypeDesc::String))
                .returns(TypeDesc::String),
        )
        .method(
            MethodDef::new("add")
                .param(FieldDef::new("a", TypeDesc::Int(IntKind::I32)))
                .param(FieldDef::new("b", TypeDesc::Int(IntKind::I32)))
                .returns(TypeDesc::Int(IntKind::I64)),
        )
        .method(
            MethodDef::new("reverse")
                .param(FieldDef::new("items", TypeDesc::array(TypeDesc::Int(IntKind::I32))))
                .returns(TypeDesc::array(TypeDesc::Int(IntKind::I32))),
        )
        .method(
            MethodDef::new("notify")
                .param(FieldDef::new("text", TypeDesc::String))
                .one_way(),
        );
    let contract = ResolvedContract::resolve(&interface, Arc::new(serializer))
        .map_err(|err| schema_error("contract setup failed", err))?;
    Ok(Arc::new(contract))
}

pub fn echo_handler() -> Arc<dyn ServiceHandler> {
    Arc::new(|method: &ResolvedMethod, args: Vec<Value>| -> Result<Value, String> {
        let mut args = args.into_iter();
        let first = args.next().unwrap_or(Value::Null);
        match method.name() {
            "echo" => Ok(first),
            "add" => {
                let (Value::I32(a), Some(Value::I32(b))) = (&first, args.next()) else {
                    return Err("add takes two i32 values".to_string());
                };
                Ok(Value::I64(i64::from(*a) + i64::from(b)))
            }
            "reverse" => match first {
                Value::Array(mut items) => {
                    items.reverse();
                    Ok(Value::Array(items))
                }
                other => Ok(other),
            },
            "notify" => {
                tracing::info!(text = first.as_str().unwrap_or_default(), "notification received");
                Ok(Value::Null)
            }
            other => Err(format!("Echo has no method {other}")),
        }
    })
}

/// Turn command-line arguments into call values.
///
/// String parameters take the text as given; every other parameter is
/// parsed as JSON.
pub fn parse_args(
    contract: &ResolvedContract,
    method: &ResolvedMethod,
    args: &[String],
) -> CliResult<Vec<Value>> {
    if args.len() != method.params().len() {
        return Err(CliError::new(
            USAGE,
            format!(
                "{} takes {} argument(s), {} given",
                method.name(),
                method.params().len(),
                args.len()
            ),
        ));
    }

    let registry = contract.serializer().registry();
    method
        .params()
        .iter()
        .zip(args)
        .map(|(param, raw)| {
            let json = match param.ty() {
                TypeDesc::String | TypeDesc::Char => serde_json::Value::String(raw.clone()),
                _ => serde_json::from_str(raw).map_err(|err| {
                    CliError::new(
                        USAGE,
                        format!("argument {}: {raw:?} is not valid JSON: {err}", param.name()),
                    )
                })?,
            };
            from_json(&json, param.ty(), registry)
                .map_err(|err| schema_error(&format!("argument {}", param.name()), err))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::DATA_INVALID;

    fn contract() -> Arc<ResolvedContract> {
        echo_contract(SerializerOptions::default()).expect("demo contract should resolve")
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn methods_are_numbered_in_order() {
        let contract = contract();
        let codes: Vec<_> = contract.methods().iter().map(|m| (m.name(), m.code())).collect();
        assert_eq!(
            codes,
            vec![("echo", 0), ("add", 1), ("reverse", 2), ("notify", 3)]
        );
        assert!(contract.method("notify").expect("notify exists").is_one_way());
    }

    #[test]
    fn arguments_follow_parameter_types() {
        let contract = contract();
        let add = contract.method("add").expect("add exists");
        assert_eq!(
            parse_args(&contract, add, &strings(&["2", "-7"])).expect("ints should parse"),
            vec![Value::I32(2), Value::I32(-7)]
        );

        let echo = contract.method("echo").expect("echo exists");
        assert_eq!(
            parse_args(&contract, echo, &strings(&["42"])).expect("text should pass through"),
            vec![Value::String("42".to_string())]
        );

        let reverse = contract.method("reverse").expect("reverse exists");
        assert_eq!(
            parse_args(&contract, reverse, &strings(&["[1,2]"])).expect("array should parse"),
            vec![Value::Array(vec![Value::I32(1), Value::I32(2)])]
        );
    }

    #[test]
    fn bad_arguments_are_rejected() {
        let contract = contract();
        let add = contract.method("add").expect("add exists");
        assert_eq!(parse_args(&contract, add, &strings(&["1"])).unwrap_err().code, USAGE);
        assert_eq!(
            parse_args(&contract, add, &strings(&["1", "x"])).unwrap_err().code,
            USAGE
        );
        assert_eq!(
            parse_args(&contract, add, &strings(&["1", "3000000000"])).unwrap_err().code,
            DATA_INVALID
        );
    }

    #[test]
    fn handler_implements_the_contract() {
        let contract = contract();
        let handler = echo_handler();
        let call = |name: &str, args: Vec<Value>| {
            handler.invoke(contract.method(name).expect("method exists"), args)
        };

        assert_eq!(call("add", vec![Value::I32(i32::MAX), Value::I32(1)]), Ok(Value::I64(2_147_483_648)));
        assert_eq!(
            call("reverse", vec![Value::Array(vec![Value::I32(1), Value::I32(2)])]),
            Ok(Value::Array(vec![Value::I32(2), Value::I32(1)]))
        );
        assert_eq!(call("echo", vec![Value::from("hi")]), Ok(Value::from("hi")));
        assert_eq!(call("notify", vec![Value::from("ping")]), Ok(Value::Null));
        assert!(call("add", vec![Value::I32(1), Value::Null]).is_err());
    }
}

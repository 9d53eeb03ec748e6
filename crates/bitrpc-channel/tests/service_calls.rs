#![cfg(unix)]

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bitrpc_channel::{
    ChannelConfig, ChannelError, NoTargets, RequestChannel, RequestTarget, ServiceDirectory,
    ServiceHandler, ServiceProxy,
};
use bitrpc_mux::{FramedMux, MuxConfig};
use bitrpc_schema::{
    Attribute, BitSerializer, CompoundType, FieldDef, IntKind, InterfaceContract, MethodDef,
    Object, ResolvedContract, ResolvedMethod, SchemaError, SerializerOptions, TypeDesc,
    TypeRegistry, Value,
};
use bitrpc_transport::RpcStream;
use uuid::Uuid;

const NOTES: Uuid = Uuid::from_u128(0x6e07_e5);

fn contract() -> Arc<ResolvedContract> {
    let registry = TypeRegistry::new()
        .with(
            CompoundType::new("Note")
                .field(FieldDef::new("text", TypeDesc::String).with(Attribute::MaxLength(64)))
                .field(FieldDef::new("stars", TypeDesc::Int(IntKind::U8)).with(Attribute::range(0, 5))),
        )
        .expect("registry should accept Note");
    let serializer = Arc::new(
        BitSerializer::new(registry, SerializerOptions::default())
            .expect("serializer should build"),
    );
    let interface = InterfaceContract::new(NOTES, "Notes")
        .method(
            MethodDef::new("add")
                .param(FieldDef::new("a", TypeDesc::Int(IntKind::I32)))
                .param(FieldDef::new("b", TypeDesc::Int(IntKind::I32)))
                .returns(TypeDesc::Int(IntKind::I64)),
        )
        .method(
            MethodDef::new("rate")
                .param(FieldDef::new("note", TypeDesc::compound("Note")))
                .returns(TypeDesc::compound("Note")),
        )
        .method(MethodDef::new("fail"))
        .method(MethodDef::new("sleep").param(FieldDef::new("ms", TypeDesc::Int(IntKind::U32))))
        .method(
            MethodDef::new("post")
                .param(FieldDef::new("text", TypeDesc::String))
                .one_way(),
        );
    Arc::new(ResolvedContract::resolve(&interface, serializer).expect("contract should resolve"))
}

fn handler(posted: mpsc::Sender<String>) -> Arc<dyn ServiceHandler> {
    let posted = Mutex::new(posted);
    Arc::new(
        move |method: &ResolvedMethod, args: Vec<Value>| -> Result<Value, String> {
            match (method.name(), args.as_slice()) {
                ("add", [Value::I32(a), Value::I32(b)]) => Ok(Value::I64(i64::from(*a) + i64::from(*b))),
                ("rate", [Value::Object(note)]) => {
                    let mut rated = note.clone();
                    rated.set("stars", Value::U8(5));
                    Ok(Value::Object(rated))
                }
                ("fail", []) => Err("the handler failed on purpose".to_string()),
                ("sleep", [Value::U32(ms)]) => {
                    std::thread::sleep(Duration::from_millis(u64::from(*ms)));
                    Ok(Value::Null)
                }
                ("post", [Value::String(text)]) => {
                    let sent = posted.lock().map_err(|e| e.to_string())?.send(text.clone());
                    sent.map_err(|e| e.to_string())?;
                    Ok(Value::Null)
                }
                (name, args) => Err(format!("unexpected call {name} with {} args", args.len())),
            }
        },
    )
}

struct Fixture {
    client: RequestChannel,
    server: RequestChannel,
    proxy: ServiceProxy,
    posted: mpsc::Receiver<String>,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.client.close();
        self.server.close();
    }
}

fn fixture() -> Fixture {
    let contract = contract();
    let (tx, posted) = mpsc::channel();
    let directory = Arc::new(ServiceDirectory::new());
    directory.register_service("/notes", Arc::clone(&contract), handler(tx));

    let (left, right) = RpcStream::pair().expect("stream pair should open");
    let left = Arc::new(FramedMux::over(left, MuxConfig::default()).expect("mux should start"));
    let right = Arc::new(FramedMux::over(right, MuxConfig::default()).expect("mux should start"));
    let client = RequestChannel::named("client", left, Arc::new(NoTargets), ChannelConfig::default())
        .expect("client should start");
    let server = RequestChannel::named("server", right, directory, ChannelConfig::default())
        .expect("server should start");

    let target: Arc<dyn RequestTarget> =
        Arc::new(client.target("/notes", NOTES).expect("target should be valid"));
    let proxy = ServiceProxy::new(target, contract)
        .expect("proxy should accept the target")
        .with_timeout(Duration::from_secs(5));
    Fixture {
        client,
        server,
        proxy,
        posted,
    }
}

#[test]
fn two_way_methods_return_values() {
    let f = fixture();
    let sum = f
        .proxy
        .call("add", &[Value::I32(i32::MAX), Value::I32(2)])
        .expect("add should succeed");
    assert_eq!(sum, Some(Value::I64(i64::from(i32::MAX) + 2)));

    let note = Object::new("Note").with("text", "bits").with("stars", Value::U8(1));
    let rated = f
        .proxy
        .call("rate", &[Value::Object(note)])
        .expect("rate should succeed");
    let expected = Object::new("Note").with("text", "bits").with("stars", Value::U8(5));
    assert_eq!(rated, Some(Value::Object(expected)));
    assert_eq!(f.client.pending_calls(), 0);
}

#[test]
fn methods_without_return_type_yield_none() {
    let f = fixture();
    assert_eq!(
        f.proxy.call("sleep", &[Value::U32(0)]).expect("sleep should succeed"),
        None
    );
}

#[test]
fn one_way_methods_return_immediately() {
    let f = fixture();
    let result = f
        .proxy
        .call("post", &[Value::from("hello")])
        .expect("post should be sent");
    assert_eq!(result, None);
    assert_eq!(
        f.posted
            .recv_timeout(Duration::from_secs(5))
            .expect("handler should see the post"),
        "hello"
    );
}

#[test]
fn handler_failure_aborts_the_call() {
    let f = fixture();
    let err = f.proxy.call("fail", &[]).unwrap_err();
    assert!(
        matches!(err, ChannelError::Aborted(ref m) if m == "the handler failed on purpose"),
        "{err}"
    );
    // The channel stays usable.
    assert!(f.proxy.call("add", &[Value::I32(1), Value::I32(1)]).is_ok());
}

#[test]
fn bad_arguments_fail_before_sending() {
    let f = fixture();
    let err = f.proxy.call("add", &[Value::I32(1)]).unwrap_err();
    assert!(matches!(err, ChannelError::Schema(SchemaError::Arity { .. })), "{err}");

    let err = f.proxy.call("add", &[Value::I32(1), Value::from("two")]).unwrap_err();
    assert!(matches!(err, ChannelError::Schema(_)), "{err}");

    let err = f.proxy.call("missing", &[]).unwrap_err();
    assert!(matches!(err, ChannelError::Schema(SchemaError::UnknownMethod { .. })), "{err}");
    assert_eq!(f.client.pending_calls(), 0);
}

#[test]
fn timed_out_calls_are_aborted() {
    let f = fixture();
    let target: Arc<dyn RequestTarget> =
        Arc::new(f.client.target("/notes", NOTES).expect("target should be valid"));
    let impatient = ServiceProxy::new(target, contract())
        .expect("proxy should accept the target")
        .with_timeout(Duration::from_millis(50));

    let err = impatient.call("sleep", &[Value::U32(500)]).unwrap_err();
    assert!(matches!(err, ChannelError::Timeout(_)), "{err}");
    assert_eq!(f.client.pending_calls(), 0);
}

#[test]
fn proxy_rejects_a_foreign_interface() {
    let f = fixture();
    let target: Arc<dyn RequestTarget> = Arc::new(
        f.client
            .target("/notes", Uuid::from_u128(1))
            .expect("target should be valid"),
    );
    assert!(matches!(
        ServiceProxy::new(target, contract()),
        Err(ChannelError::InvalidState(_))
    ));
}

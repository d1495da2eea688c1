//! End-to-end dispatch tests: coercion, handler, reply

use std::sync::Arc;

use route_contract::response::EncodeResult;
use route_contract::{
    describe_object, response_set, ApiResponse, DispatchFault, Dispatcher, Forbidden, HandlerError, Method,
    NoContent, NotFound, Outcome, RawInput, Reply, ResponseSchema, ResponseSet, RouteRegistry, Signal,
    SignalMap,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// =============================================================================
// Routes
// =============================================================================

#[derive(Debug, Deserialize)]
struct GetPerson {
    id: i64,
}

describe_object!(GetPerson => "GetPerson" { "id": i64 });

#[derive(Debug, Serialize)]
struct Person {
    name: String,
}

describe_object!(Person => "Person" { "name": String });

impl ApiResponse for Person {
    const KIND: &'static str = "person";
}

response_set! {
    enum PersonLookup {
        Found(Person),
        Missing(NotFound),
    }
}

fn get_person(request: GetPerson) -> Result<PersonLookup, HandlerError> {
    match request.id {
        1 => Ok(Person { name: "Paul".to_string() }.into()),
        2 => Err(Signal::Forbidden.into()),
        3 => Err(anyhow::anyhow!("connection reset by peer").into()),
        4 => panic!("index out of bounds"),
        _ => Ok(NotFound.into()),
    }
}

/// Declares `not_found` but replies with `forbidden`
struct Liar;

impl ResponseSet for Liar {
    fn declared() -> route_contract::Result<Vec<ResponseSchema>> {
        Ok(vec![ResponseSchema::of::<NotFound>()?])
    }

    fn into_reply(self) -> EncodeResult<Reply> {
        Reply::from_response(&Forbidden)
    }
}

#[derive(Debug, Deserialize)]
struct Archive {
    #[allow(dead_code)]
    ids: Vec<i64>,
}

describe_object!(Archive => "Archive" { "ids": Vec<i64> });

#[derive(Debug, Deserialize)]
struct SetLevel {
    #[allow(dead_code)]
    level: u8,
}

describe_object!(SetLevel => "SetLevel" { "level": u8 });

fn dispatcher() -> Dispatcher {
    let mut builder = RouteRegistry::builder();
    builder
        .blueprint("people", "/people")
        .api_get("/person", "get_person", get_person)
        .unwrap()
        .api_get("/liar", "liar", |_: GetPerson| Ok(Liar))
        .unwrap()
        .api_post("/archive", "archive", |_: Archive| Ok(NoContent))
        .unwrap()
        .api_post("/level", "set_level", |_: SetLevel| Ok(NoContent))
        .unwrap();
    let registry = builder.build().unwrap();

    Dispatcher::new(Arc::new(registry), SignalMap::standard()).unwrap()
}

fn get(dispatcher: &Dispatcher, endpoint: &str, id: &str) -> Result<route_contract::Dispatched, DispatchFault> {
    dispatcher.dispatch(endpoint, RawInput::query([("id", id)]))
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_declared_response_succeeds() {
    let dispatched = get(&dispatcher(), "people.get_person", "1").unwrap();
    assert_eq!(dispatched.outcome, Outcome::Success);
    assert_eq!(dispatched.reply.status, 200);
    assert_eq!(
        dispatched.reply.body,
        json!({"name": "Paul", "__type__": "person", "__http_status_code__": 200})
    );

    let dispatched = get(&dispatcher(), "people.get_person", "9").unwrap();
    assert_eq!(dispatched.outcome, Outcome::Success);
    assert_eq!(dispatched.reply.status, 404);
    assert_eq!(dispatched.reply.kind, "not_found");
}

#[test]
fn test_expected_signal_is_mapped() {
    let dispatched = get(&dispatcher(), "people.get_person", "2").unwrap();
    assert_eq!(dispatched.outcome, Outcome::Mapped);
    assert_eq!(dispatched.reply.status, 403);
    assert_eq!(dispatched.reply.body, json!({"__type__": "forbidden", "__http_status_code__": 403}));
}

#[test]
fn test_unexpected_error_is_opaque() {
    let dispatched = get(&dispatcher(), "people.get_person", "3").unwrap();
    assert_eq!(dispatched.outcome, Outcome::InternalError);
    assert_eq!(dispatched.reply.status, 500);
    assert!(!dispatched.reply.to_json().contains("connection reset"));
    assert_eq!(
        dispatched.reply.body,
        json!({"__type__": "internal_server_error", "__http_status_code__": 500})
    );
}

#[test]
fn test_panic_becomes_internal_error() {
    let dispatched = get(&dispatcher(), "people.get_person", "4").unwrap();
    assert_eq!(dispatched.outcome, Outcome::InternalError);
    assert_eq!(dispatched.reply, Reply::internal_error());
}

#[test]
fn test_invalid_query_is_bad_request() {
    let dispatched = get(&dispatcher(), "people.get_person", "abc").unwrap();
    assert_eq!(dispatched.outcome, Outcome::BadRequest);
    assert_eq!(dispatched.reply.status, 400);
    assert_eq!(dispatched.reply.kind, "bad_request");
    assert_eq!(dispatched.reply.body["errors"][0]["field"], json!("id"));
}

#[test]
fn test_unknown_field_is_bad_request() {
    let dispatched = dispatcher()
        .dispatch(
            "people.archive",
            RawInput::Json(json!({"ids": [1, 2], "force": true})),
        )
        .unwrap();
    assert_eq!(dispatched.outcome, Outcome::BadRequest);

    let errors = dispatched.reply.body["errors"].as_array().unwrap().clone();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["field"], json!("force"));
    assert_eq!(errors[0]["reason"], json!("unexpected field"));
}

#[test]
fn test_decode_failure_is_bad_request() {
    let dispatched = dispatcher()
        .dispatch("people.set_level", RawInput::Json(json!({"level": 300})))
        .unwrap();
    assert_eq!(dispatched.outcome, Outcome::BadRequest);
    assert_eq!(dispatched.reply.body["errors"][0]["field"], json!("level"));
}

#[test]
fn test_undeclared_response_is_a_fault() {
    let fault = get(&dispatcher(), "people.liar", "1").unwrap_err();
    match &fault {
        DispatchFault::UndeclaredResponse { endpoint, kind } => {
            assert_eq!(endpoint, "people.liar");
            assert_eq!(kind, "forbidden");
        }
        other => panic!("Expected UndeclaredResponse, got {:?}", other),
    }
    assert_eq!(fault.into_reply().status, 500);
}

#[test]
fn test_method_mismatch_and_unknown_endpoint() {
    let dispatcher = dispatcher();

    match dispatcher.dispatch("people.get_person", RawInput::Json(json!({"id": 1}))) {
        Err(DispatchFault::MethodMismatch { expected, received, .. }) => {
            assert_eq!(expected, Method::Get);
            assert_eq!(received, Method::Post);
        }
        other => panic!("Expected MethodMismatch, got {:?}", other),
    }

    assert!(matches!(
        get(&dispatcher, "people.nobody", "1"),
        Err(DispatchFault::UnknownEndpoint { .. })
    ));
}

#[test]
fn test_no_content_reply() {
    let dispatched = dispatcher()
        .dispatch("people.archive", RawInput::Json(json!({"ids": ["1", 2]})))
        .unwrap();
    assert_eq!(dispatched.outcome, Outcome::Success);
    assert_eq!(dispatched.reply.status, 200);
    assert_eq!(dispatched.reply.body, Value::Null);
}

#[test]
fn test_dispatcher_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Dispatcher>();
}

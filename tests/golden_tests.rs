//! Golden Tests for the Generated Contract
//!
//! Builds small registries and compares the rendered artifact byte for byte.

use route_contract::codegen::{generate, GENERATOR_SOURCE};
use route_contract::schema::{Decimal, ObjectRef, TypeDescriptor};
use route_contract::{
    describe_object, ApiResponse, ContractError, Describe, EnumSchema, Method, NoParams, NotFound,
    RegistryBuilder, RouteRegistry,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// Example Routes
// =============================================================================

#[derive(Debug, Serialize)]
struct GetRouteResponse {
    kia: String,
}

describe_object!(GetRouteResponse => "GetRouteResponse" { "kia": String });

impl ApiResponse for GetRouteResponse {
    const KIND: &'static str = "get_route_response";
}

#[derive(Debug, Deserialize)]
struct PostExampleParams {
    #[allow(dead_code)]
    parameter_one: String,
}

describe_object!(PostExampleParams => "PostExampleParams" { "parameter_one": String });

#[derive(Debug, Serialize)]
struct PostRouteResponse {
    result: String,
}

describe_object!(PostRouteResponse => "PostRouteResponse" { "result": String });

impl ApiResponse for PostRouteResponse {
    const KIND: &'static str = "post_route_response";
}

fn example_registry() -> RouteRegistry {
    let mut builder = RouteRegistry::builder();
    builder
        .register(Method::Get, "example.get_example", "/example/get", "views/example.rs", |_: NoParams| {
            Ok(GetRouteResponse { kia: "ora".to_string() })
        })
        .unwrap();
    builder
        .register(
            Method::Post,
            "example.post_example",
            "/example/post",
            "views/example.rs",
            |params: PostExampleParams| Ok(PostRouteResponse { result: params.parameter_one }),
        )
        .unwrap();
    builder.build().unwrap()
}

#[test]
fn test_example_contract() {
    let expected = format!(
        r#"/*
THIS FILE IS AUTO-GENERATED, DO NOT ALTER MANUALLY.

Please see {}
*/

// prettier-ignore
export interface ExampleGetExampleResponse {{
    "__type__": "get_route_response"
    "__http_status_code__": 200
    "kia": string
}}

// prettier-ignore
export interface ExamplePostExampleRequest {{
    "parameter_one": string
}}

// prettier-ignore
export interface ExamplePostExampleResponse {{
    "__type__": "post_route_response"
    "__http_status_code__": 200
    "result": string
}}

// prettier-ignore
export interface GET_MAP {{
    // views/example.rs
    "example.get_example": {{request: undefined, response: ExampleGetExampleResponse}}
}}

// prettier-ignore
export interface POST_MAP {{
    // views/example.rs
    "example.post_example": {{request: ExamplePostExampleRequest, response: ExamplePostExampleResponse}}
}}
"#,
        GENERATOR_SOURCE
    );

    let artifact = generate(&example_registry()).unwrap();
    assert_eq!(artifact.render(), expected);
}

#[test]
fn test_generation_is_deterministic() {
    let first = generate(&example_registry()).unwrap().render();
    let second = generate(&example_registry()).unwrap().render();
    assert_eq!(first, second);
}

// =============================================================================
// Shop Routes
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Status {
    Pending,
}

impl Describe for Status {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Enum(EnumSchema::new("Status", ["pending", "shipped"]))
    }
}

#[derive(Debug, Serialize)]
struct LineItem {
    sku: String,
    quantity: i64,
    price: Decimal,
}

describe_object!(LineItem => "LineItem" {
    "sku": String,
    "quantity": i64,
    "price": Decimal,
});

#[derive(Debug, Serialize)]
struct Card {
    last_four: String,
}

describe_object!(Card => "Card" { "last_four": String });

#[derive(Debug, Serialize)]
struct Voucher {
    code: String,
}

describe_object!(Voucher => "Voucher" { "code": String });

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Payment {
    Card(Card),
}

impl Describe for Payment {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Union(vec![Card::describe(), Voucher::describe()])
    }
}

#[derive(Debug, Serialize)]
struct Customer {}

impl Describe for Customer {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::imported("~/models", "Customer")
    }
}

#[derive(Debug, Serialize)]
struct Order {
    id: i64,
    status: Status,
    items: Vec<LineItem>,
    notes: Option<String>,
    payment: Payment,
    customer: Customer,
}

describe_object!(Order => "Order" {
    "id": i64,
    "status": Status,
    "items": Vec<LineItem>,
    "notes": Option<String>,
    "payment": Payment,
    "customer": Customer,
});

impl ApiResponse for Order {
    const KIND: &'static str = "order";
}

#[derive(Debug, Deserialize)]
struct FindOrder {
    #[allow(dead_code)]
    id: i64,
    #[allow(dead_code)]
    include_items: Option<bool>,
}

describe_object!(FindOrder => "FindOrder" {
    "id": i64,
    "include_items": Option<bool>,
});

route_contract::response_set! {
    enum OrderLookup {
        Found(Option<Order>),
        Missing(NotFound),
    }
}

fn find_order(_: FindOrder) -> Result<OrderLookup, route_contract::HandlerError> {
    Ok(OrderLookup::Missing(NotFound))
}

#[test]
fn test_nested_union_enum_and_import() {
    let mut builder = RouteRegistry::builder();
    builder
        .register(Method::Get, "shop.find_order", "/shop/order", "views/shop.rs", find_order)
        .unwrap();
    let registry = builder.build().unwrap();

    let expected = format!(
        r#"/*
THIS FILE IS AUTO-GENERATED, DO NOT ALTER MANUALLY.

Please see {}
*/
// prettier-ignore
import {{Customer}} from "~/models"

// prettier-ignore
export interface ShopFindOrderRequest {{
    "id": number
    "include_items": boolean | undefined
}}

// prettier-ignore
export type Status = "pending" | "shipped"

// prettier-ignore
export interface LineItem {{
    "sku": string
    "quantity": number
    "price": string
}}

// prettier-ignore
export interface Card {{
    "last_four": string
}}

// prettier-ignore
export interface Voucher {{
    "code": string
}}

// prettier-ignore
export interface ShopFindOrderResponse {{
    "__type__": "order"
    "__http_status_code__": 200
    "id": number
    "status": Status
    "items": LineItem[]
    "notes": string | undefined
    "payment": (Card | Voucher)
    "customer": Customer
}}

// prettier-ignore
export interface ShopFindOrderResponse1 {{
    "__type__": "not_found"
    "__http_status_code__": 404
}}

// prettier-ignore
export interface GET_MAP {{
    // views/shop.rs
    "shop.find_order": {{request: ShopFindOrderRequest, response?: ShopFindOrderResponse | ShopFindOrderResponse1}}
}}

// prettier-ignore
export interface POST_MAP {{
}}
"#,
        GENERATOR_SOURCE
    );

    assert_eq!(generate(&registry).unwrap().render(), expected);
}

// =============================================================================
// Shared Schemas
// =============================================================================

#[derive(Debug, Serialize)]
struct Tagged {
    tags: Vec<Tag>,
}

#[derive(Debug, Serialize)]
struct Tag {
    label: String,
}

describe_object!(Tag => "Tag" { "label": String });
describe_object!(Tagged => "Tagged" { "tags": Vec<Tag> });

impl ApiResponse for Tagged {
    const KIND: &'static str = "tagged";
}

#[test]
fn test_shared_nested_object_declared_once() {
    let mut builder = RouteRegistry::builder();
    {
        let mut notes = builder.blueprint("notes", "/notes");
        notes.api_get("/a", "first", |_: NoParams| Ok(Tagged { tags: vec![] })).unwrap();
        notes.api_get("/b", "second", |_: NoParams| Ok(Tagged { tags: vec![] })).unwrap();
    }
    let registry = builder.build().unwrap();

    let artifact = generate(&registry).unwrap();
    let idents: Vec<&str> = artifact.declarations.iter().map(|d| d.ident.as_str()).collect();
    assert_eq!(idents, vec!["Tag", "NotesFirstResponse", "NotesSecondResponse"]);
}

// =============================================================================
// Failures
// =============================================================================

#[derive(Debug, Deserialize)]
struct Node {}

impl Describe for Node {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Object(ObjectRef::deferred("Node", || {
            vec![route_contract::Field::of::<Vec<Node>>("children")]
        }))
    }
}

fn register_tree(builder: &mut RegistryBuilder) -> route_contract::Result<()> {
    builder.register(Method::Post, "tree.plant", "/tree", "views/tree.rs", |_: Node| {
        Ok(route_contract::NoContent)
    })
}

#[test]
fn test_schema_cycle_halts_registration() {
    let mut builder = RouteRegistry::builder();
    match register_tree(&mut builder) {
        Err(ContractError::SchemaCycle { chain }) => assert_eq!(chain, vec!["Node", "Node"]),
        other => panic!("Expected SchemaCycle, got {:?}", other),
    }
    assert!(builder.build().is_err());
}

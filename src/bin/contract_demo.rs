//! Demo application
//!
//! Registers the `example` and `people` blueprints and exposes the contract
//! CLI over them.
//!
//! Usage:
//!   contract-demo generate --output js/api/types.ts
//!   contract-demo check
//!   contract-demo routes

use std::process::ExitCode;

use route_contract::schema::TypeDescriptor;
use route_contract::{
    cli, describe_object, response_set, ApiResponse, Describe, EnumSchema, NoContent, NoParams, NotFound,
    RegistryBuilder, Result, Signal,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// example
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

// =============================================================================
// people
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Role {
    Admin,
    Member,
}

impl Describe for Role {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Enum(EnumSchema::new("Role", ["admin", "member"]))
    }
}

#[derive(Debug, Serialize)]
struct Person {
    name: String,
    role: Role,
}

describe_object!(Person => "Person" { "name": String, "role": Role });

impl ApiResponse for Person {
    const KIND: &'static str = "person";
}

#[derive(Debug, Deserialize)]
struct FindPersonParams {
    name: String,
    role: Option<Role>,
}

describe_object!(FindPersonParams => "FindPersonParams" {
    "name": String,
    "role": Option<Role>,
});

response_set! {
    enum PersonOrMissing {
        Found(Person),
        Missing(NotFound),
    }
}

#[derive(Debug, Deserialize)]
struct RenameParams {
    names: Vec<String>,
}

describe_object!(RenameParams => "RenameParams" { "names": Vec<String> });

fn register(builder: &mut RegistryBuilder) -> Result<()> {
    builder
        .blueprint("example", "/example")
        .api_get("/get", "get_example", |_: NoParams| {
            Ok(GetRouteResponse { kia: "ora".to_string() })
        })?
        .api_post("/post", "post_example", |params: PostExampleParams| {
            Ok(PostRouteResponse { result: params.parameter_one })
        })?;

    builder
        .blueprint("people", "/people")
        .api_get("/find", "find_person", |params: FindPersonParams| {
            if params.name.is_empty() {
                return Err(Signal::BadRequest("name must not be empty".to_string()).into());
            }
            if params.name != "Paul" {
                return Ok(PersonOrMissing::Missing(NotFound));
            }
            Ok(PersonOrMissing::Found(Person {
                name: params.name,
                role: params.role.unwrap_or(Role::Member),
            }))
        })?
        .api_post("/rename", "rename", |params: RenameParams| {
            tracing::info!(count = params.names.len(), "Renaming people");
            Ok(NoContent)
        })?;

    Ok(())
}

fn main() -> ExitCode {
    cli::run(register)
}

//! Response kinds
//!
//! Every value a handler may return is an [`ApiResponse`]: a serializable
//! object with a fixed discriminator (`__type__`) and HTTP status
//! (`__http_status_code__`). A route's declared response set is a
//! [`ResponseSet`], usually a single kind or a `response_set!` enum.

use std::any::TypeId;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coerce::FieldIssue;
use crate::error::{ContractError, Result};
use crate::schema::{Describe, Field, ObjectRef, TypeDescriptor};

/// Wire name of the discriminator field
pub const TYPE_FIELD: &str = "__type__";

/// Wire name of the status field
pub const STATUS_FIELD: &str = "__http_status_code__";

/// Result of serializing a response
pub type EncodeResult<T> = std::result::Result<T, serde_json::Error>;

// =============================================================================
// ApiResponse
// =============================================================================

/// A response kind a handler can return
pub trait ApiResponse: Serialize + Describe + 'static {
    /// snake_case discriminator, unique per kind
    const KIND: &'static str;

    /// HTTP status this kind is sent with
    const STATUS: u16 = 200;
}

/// A reply ready for the transport
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub kind: &'static str,
    pub body: Value,
}

impl Reply {
    /// Serialize a response, adding the discriminator fields
    pub fn from_response<R: ApiResponse>(response: &R) -> EncodeResult<Self> {
        let mut body = match serde_json::to_value(response)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                    "response {} must serialize to an object",
                    R::KIND
                )))
            }
        };
        body.insert(TYPE_FIELD.to_string(), Value::from(R::KIND));
        body.insert(STATUS_FIELD.to_string(), Value::from(R::STATUS));

        Ok(Self {
            status: R::STATUS,
            kind: R::KIND,
            body: Value::Object(body),
        })
    }

    /// The opaque reply sent for every unexpected failure
    pub fn internal_error() -> Self {
        let mut body = Map::new();
        body.insert(TYPE_FIELD.to_string(), Value::from(InternalServerError::KIND));
        body.insert(STATUS_FIELD.to_string(), Value::from(InternalServerError::STATUS));

        Self {
            status: InternalServerError::STATUS,
            kind: InternalServerError::KIND,
            body: Value::Object(body),
        }
    }

    /// Response body as sent on the wire
    pub fn to_json(&self) -> String {
        self.body.to_string()
    }
}

// =============================================================================
// Declared Responses
// =============================================================================

/// One member of a route's declared response set
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseSchema {
    Body {
        kind: &'static str,
        status: u16,
        /// Declared shape, discriminator fields included
        object: ObjectRef,
        /// Rust type the kind was declared by
        type_id: TypeId,
    },
    /// The handler may return nothing
    NoContent,
}

impl ResponseSchema {
    pub fn of<R: ApiResponse>() -> Result<Self> {
        match R::describe() {
            TypeDescriptor::Object(object) => Ok(ResponseSchema::Body {
                kind: R::KIND,
                status: R::STATUS,
                object: ObjectRef::deferred(object.name(), response_fields::<R>),
                type_id: TypeId::of::<R>(),
            }),
            other => Err(ContractError::unsupported(
                other,
                R::KIND,
                "responses must describe an object",
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResponseSchema::Body { kind, .. } => *kind,
            ResponseSchema::NoContent => NoContent::KIND,
        }
    }
}

/// Add `incoming` to a declared set.
///
/// The same schema declared twice is kept once. Two different schemas
/// sharing a kind are rejected, since a reply carries only its kind.
pub fn merge_declared(declared: &mut Vec<ResponseSchema>, incoming: Vec<ResponseSchema>) -> Result<()> {
    for schema in incoming {
        match declared.iter().find(|existing| existing.kind() == schema.kind()) {
            Some(existing) if *existing == schema => {}
            Some(_) => {
                return Err(ContractError::DuplicateResponseKind {
                    kind: schema.kind().to_string(),
                })
            }
            None => declared.push(schema),
        }
    }
    Ok(())
}

fn response_fields<R: ApiResponse>() -> Vec<Field> {
    let mut fields = vec![
        Field::new(TYPE_FIELD, TypeDescriptor::literal(R::KIND)),
        Field::new(STATUS_FIELD, TypeDescriptor::literal(i64::from(R::STATUS))),
    ];
    if let TypeDescriptor::Object(object) = R::describe() {
        fields.extend(object.fields().iter().cloned());
    }
    fields
}

/// The set of responses a route declares, closed at compile time
pub trait ResponseSet: Sized {
    /// Declared members, without duplicates
    fn declared() -> Result<Vec<ResponseSchema>>;

    /// Serialize the returned variant
    fn into_reply(self) -> EncodeResult<Reply>;
}

impl<R: ApiResponse> ResponseSet for R {
    fn declared() -> Result<Vec<ResponseSchema>> {
        Ok(vec![ResponseSchema::of::<R>()?])
    }

    fn into_reply(self) -> EncodeResult<Reply> {
        Reply::from_response(&self)
    }
}

/// Marker for "the handler returned nothing"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoContent;

impl NoContent {
    pub const KIND: &'static str = "no_content";
}

impl ResponseSet for NoContent {
    fn declared() -> Result<Vec<ResponseSchema>> {
        Ok(vec![ResponseSchema::NoContent])
    }

    fn into_reply(self) -> EncodeResult<Reply> {
        Ok(Reply {
            status: 200,
            kind: NoContent::KIND,
            body: Value::Null,
        })
    }
}

impl<R: ResponseSet> ResponseSet for Option<R> {
    fn declared() -> Result<Vec<ResponseSchema>> {
        let mut declared = R::declared()?;
        if !declared.contains(&ResponseSchema::NoContent) {
            declared.push(ResponseSchema::NoContent);
        }
        Ok(declared)
    }

    fn into_reply(self) -> EncodeResult<Reply> {
        match self {
            Some(inner) => inner.into_reply(),
            None => NoContent.into_reply(),
        }
    }
}

/// Declare a closed enum of response kinds and implement [`ResponseSet`]
/// for it.
///
/// ```
/// use route_contract::{response_set, NotFound};
/// # use route_contract::{describe_object, ApiResponse};
/// # #[derive(serde::Serialize)]
/// # struct Person { name: String }
/// # describe_object!(Person => "Person" { "name": String });
/// # impl ApiResponse for Person { const KIND: &'static str = "person"; }
///
/// response_set! {
///     enum PersonOrMissing {
///         Found(Person),
///         Missing(NotFound),
///     }
/// }
/// ```
#[macro_export]
macro_rules! response_set {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident($ty:ty)),+ $(,)? }) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant($ty)),+
        }

        impl $crate::response::ResponseSet for $name {
            fn declared() -> $crate::Result<::std::vec::Vec<$crate::response::ResponseSchema>> {
                let mut declared: ::std::vec::Vec<$crate::response::ResponseSchema> = ::std::vec::Vec::new();
                $(
                    $crate::response::merge_declared(
                        &mut declared,
                        <$ty as $crate::response::ResponseSet>::declared()?,
                    )?;
                )+
                Ok(declared)
            }

            fn into_reply(self) -> $crate::response::EncodeResult<$crate::response::Reply> {
                match self {
                    $($name::$variant(inner) => $crate::response::ResponseSet::into_reply(inner)),+
                }
            }
        }

        $(
            impl ::std::convert::From<$ty> for $name {
                fn from(value: $ty) -> Self {
                    $name::$variant(value)
                }
            }
        )+
    };
}

// =============================================================================
// Built-in Kinds
// =============================================================================

/// Request failed validation, or the handler signalled a bad request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadRequest {
    pub message: String,
    #[serde(default)]
    pub errors: Vec<FieldIssue>,
}

impl BadRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<FieldIssue>) -> Self {
        self.errors = errors;
        self
    }
}

crate::describe_object!(BadRequest => "BadRequest" {
    "message": String,
    "errors": Vec<FieldIssue>,
});

impl ApiResponse for BadRequest {
    const KIND: &'static str = "bad_request";
    const STATUS: u16 = 400;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Forbidden;

crate::describe_object!(Forbidden => "Forbidden" {});

impl ApiResponse for Forbidden {
    const KIND: &'static str = "forbidden";
    const STATUS: u16 = 403;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotFound;

crate::describe_object!(NotFound => "NotFound" {});

impl ApiResponse for NotFound {
    const KIND: &'static str = "not_found";
    const STATUS: u16 = 404;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InternalServerError;

crate::describe_object!(InternalServerError => "InternalServerError" {});

impl ApiResponse for InternalServerError {
    const KIND: &'static str = "internal_server_error";
    const STATUS: u16 = 500;
}

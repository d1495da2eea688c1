//! Route Registry
//!
//! Process-wide catalog of API endpoints and the schemas they accept and
//! return. Built once by an explicit startup pass through
//! [`RegistryBuilder`], read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::coerce;
use crate::dispatch::{HandlerError, Invocation};
use crate::error::{ContractError, Result};
use crate::response::{ResponseSchema, ResponseSet};
use crate::schema::{Describe, ObjectRef};

/// HTTP verb of an API route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

// =============================================================================
// Route Definition
// =============================================================================

/// Everything known about one endpoint except its handler
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub method: Method,
    /// Request parameters as one object
    pub request: ObjectRef,
    /// Declared responses, in declaration order
    pub responses: Vec<ResponseSchema>,
    /// `"{blueprint}.{handler}"`
    pub endpoint: String,
    /// Source file the route was registered from
    pub source: String,
    /// URL pattern the transport routes to this endpoint
    pub url: String,
}

impl RouteDefinition {
    /// Check whether `kind` is in the declared response set
    pub fn declares(&self, kind: &str) -> bool {
        self.responses.iter().any(|response| response.kind() == kind)
    }

    /// The handler may return nothing
    pub fn may_be_empty(&self) -> bool {
        self.responses.contains(&ResponseSchema::NoContent)
    }
}

pub(crate) type ErasedHandler = Box<dyn Fn(Map<String, Value>) -> Invocation + Send + Sync>;

/// A registered endpoint: definition plus type-erased handler
pub struct Route {
    pub definition: RouteDefinition,
    pub(crate) handler: ErasedHandler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Route Registry
// =============================================================================

/// Read-only catalog of endpoints, keyed by endpoint id
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: BTreeMap<String, Route>,
}

impl RouteRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn lookup(&self, endpoint: &str) -> Option<&RouteDefinition> {
        self.routes.get(endpoint).map(|route| &route.definition)
    }

    pub(crate) fn route(&self, endpoint: &str) -> Option<&Route> {
        self.routes.get(endpoint)
    }

    /// All definitions, sorted by endpoint id
    pub fn all_endpoints(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.values().map(|route| &route.definition)
    }

    /// Endpoint id -> URL pattern, for client-side routing
    pub fn url_map(&self) -> BTreeMap<String, String> {
        self.all_endpoints()
            .map(|definition| (definition.endpoint.clone(), definition.url.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

// =============================================================================
// Registry Builder
// =============================================================================

/// Collects registrations during startup.
///
/// The first failed registration poisons the builder: every later call,
/// `build` included, fails with [`ContractError::RegistryPoisoned`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    routes: BTreeMap<String, Route>,
    poisoned: Option<String>,
}

impl RegistryBuilder {
    /// Register a handler.
    ///
    /// The request type's descriptor must be an object. Request and
    /// response schemas are resolved immediately, so an unsupported type
    /// fails here rather than during generation.
    pub fn register<Req, Resp, F>(
        &mut self,
        method: Method,
        endpoint: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        handler: F,
    ) -> Result<()>
    where
        Req: DeserializeOwned + Describe + 'static,
        Resp: ResponseSet + 'static,
        F: Fn(Req) -> std::result::Result<Resp, HandlerError> + Send + Sync + 'static,
    {
        self.check_poisoned()?;

        let result = self.try_register::<Req, Resp, F>(method, endpoint.into(), url.into(), source.into(), handler);
        if let Err(err) = &result {
            tracing::error!(error = %err, "Route registration failed");
            self.poisoned = Some(err.to_string());
        }
        result
    }

    fn try_register<Req, Resp, F>(
        &mut self,
        method: Method,
        endpoint: String,
        url: String,
        source: String,
        handler: F,
    ) -> Result<()>
    where
        Req: DeserializeOwned + Describe + 'static,
        Resp: ResponseSet + 'static,
        F: Fn(Req) -> std::result::Result<Resp, HandlerError> + Send + Sync + 'static,
    {
        if endpoint.split('.').count() < 2 || endpoint.split('.').any(str::is_empty) {
            return Err(ContractError::InvalidEndpoint { endpoint });
        }
        if self.routes.contains_key(&endpoint) {
            return Err(ContractError::DuplicateEndpoint { endpoint });
        }

        let request = match Req::describe() {
            crate::schema::TypeDescriptor::Object(object) => object,
            other => {
                return Err(ContractError::unsupported(
                    other,
                    format!("{}:request", endpoint),
                    "request parameters must describe an object",
                ))
            }
        };

        let mut responses = Vec::new();
        crate::response::merge_declared(&mut responses, Resp::declared()?)?;

        let definition = RouteDefinition {
            method,
            request,
            responses,
            endpoint: endpoint.clone(),
            source,
            url,
        };
        crate::codegen::check_route(&definition)?;

        let handler: ErasedHandler = Box::new(move |input| {
            let request: Req = match coerce::decode(input) {
                Ok(request) => request,
                Err(failure) => return Invocation::Rejected(failure),
            };
            match handler(request) {
                Ok(response) => Invocation::Returned(response.into_reply()),
                Err(err) => Invocation::Raised(err),
            }
        });

        tracing::debug!(endpoint = %endpoint, method = %method, url = %definition.url, "Registered API route");
        self.routes.insert(endpoint, Route { definition, handler });
        Ok(())
    }

    fn check_poisoned(&self) -> Result<()> {
        match &self.poisoned {
            Some(reason) => Err(ContractError::RegistryPoisoned { reason: reason.clone() }),
            None => Ok(()),
        }
    }

    /// Group registrations under a blueprint name and URL prefix
    pub fn blueprint(&mut self, name: impl Into<String>, url_prefix: impl Into<String>) -> Blueprint<'_> {
        Blueprint {
            builder: self,
            name: name.into(),
            url_prefix: url_prefix.into(),
        }
    }

    /// Finish the startup pass
    pub fn build(self) -> Result<RouteRegistry> {
        self.check_poisoned()?;
        Ok(RouteRegistry { routes: self.routes })
    }
}

// =============================================================================
// Blueprint
// =============================================================================

/// A named group of routes sharing a URL prefix.
///
/// Endpoint ids are `"{name}.{handler}"`, URLs are `url_prefix + rule`, and
/// the source location is the file that called `api_get`/`api_post`.
#[derive(Debug)]
pub struct Blueprint<'a> {
    builder: &'a mut RegistryBuilder,
    name: String,
    url_prefix: String,
}

impl Blueprint<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    #[track_caller]
    pub fn api_get<Req, Resp, F>(&mut self, rule: &str, handler_name: &str, handler: F) -> Result<&mut Self>
    where
        Req: DeserializeOwned + Describe + 'static,
        Resp: ResponseSet + 'static,
        F: Fn(Req) -> std::result::Result<Resp, HandlerError> + Send + Sync + 'static,
    {
        let source = Location::caller().file();
        self.add(Method::Get, rule, handler_name, source, handler)
    }

    #[track_caller]
    pub fn api_post<Req, Resp, F>(&mut self, rule: &str, handler_name: &str, handler: F) -> Result<&mut Self>
    where
        Req: DeserializeOwned + Describe + 'static,
        Resp: ResponseSet + 'static,
        F: Fn(Req) -> std::result::Result<Resp, HandlerError> + Send + Sync + 'static,
    {
        let source = Location::caller().file();
        self.add(Method::Post, rule, handler_name, source, handler)
    }

    fn add<Req, Resp, F>(
        &mut self,
        method: Method,
        rule: &str,
        handler_name: &str,
        source: &str,
        handler: F,
    ) -> Result<&mut Self>
    where
        Req: DeserializeOwned + Describe + 'static,
        Resp: ResponseSet + 'static,
        F: Fn(Req) -> std::result::Result<Resp, HandlerError> + Send + Sync + 'static,
    {
        let endpoint = format!("{}.{}", self.name, handler_name);
        let url = format!("{}{}", self.url_prefix, rule);
        self.builder.register(method, endpoint, url, source, handler)?;
        Ok(self)
    }
}

/// Request type for handlers that take no parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoParams {}

crate::describe_object!(NoParams => "NoParams" {});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{ApiResponse, NoContent, NotFound};
    use crate::schema::TypeDescriptor;

    #[derive(Debug, Deserialize)]
    struct Lookup {
        #[allow(dead_code)]
        id: i64,
    }

    crate::describe_object!(Lookup => "Lookup" { "id": i64 });

    struct Timestamp;

    impl Describe for Timestamp {
        fn describe() -> TypeDescriptor {
            TypeDescriptor::Object(ObjectRef::new(
                "Timestamp",
                vec![crate::schema::Field::new("at", TypeDescriptor::Opaque("Instant".into()))],
            ))
        }
    }

    impl<'de> Deserialize<'de> for Timestamp {
        fn deserialize<D: serde::Deserializer<'de>>(_: D) -> std::result::Result<Self, D::Error> {
            Ok(Timestamp)
        }
    }

    fn not_found(_: Lookup) -> std::result::Result<NotFound, HandlerError> {
        Ok(NotFound)
    }

    #[test]
    fn test_blueprint_composes_endpoint_and_url() {
        let mut builder = RouteRegistry::builder();
        builder
            .blueprint("people", "/people")
            .api_get("/get", "get_person", not_found)
            .unwrap()
            .api_post("/delete", "delete_person", |_: NoParams| Ok(NoContent))
            .unwrap();
        let registry = builder.build().unwrap();

        let definition = registry.lookup("people.get_person").unwrap();
        assert_eq!(definition.method, Method::Get);
        assert_eq!(definition.url, "/people/get");
        assert!(definition.source.ends_with("registry.rs"));
        assert!(definition.declares("not_found"));
        assert!(!definition.may_be_empty());

        assert!(registry.lookup("people.delete_person").unwrap().may_be_empty());
        assert_eq!(
            registry.url_map().into_iter().collect::<Vec<_>>(),
            vec![
                ("people.delete_person".to_string(), "/people/delete".to_string()),
                ("people.get_person".to_string(), "/people/get".to_string()),
            ]
        );
    }

    #[test]
    fn test_duplicate_endpoint_poisons_builder() {
        let mut builder = RouteRegistry::builder();
        builder.register(Method::Get, "foo.bar", "/foo/bar", "here.rs", not_found).unwrap();

        let err = builder
            .register(Method::Get, "foo.bar", "/foo/bar", "here.rs", not_found)
            .unwrap_err();
        assert!(matches!(err, ContractError::DuplicateEndpoint { .. }));

        let err = builder
            .register(Method::Get, "foo.other", "/foo/other", "here.rs", not_found)
            .unwrap_err();
        assert!(matches!(err, ContractError::RegistryPoisoned { .. }));
        assert!(matches!(builder.build(), Err(ContractError::RegistryPoisoned { .. })));
    }

    #[derive(Debug, Serialize)]
    struct Count {
        a: i64,
    }

    crate::describe_object!(Count => "Count" { "a": i64 });

    impl ApiResponse for Count {
        const KIND: &'static str = "thing";
    }

    #[derive(Debug, Serialize)]
    struct Label {
        b: String,
    }

    crate::describe_object!(Label => "Label" { "b": String });

    impl ApiResponse for Label {
        const KIND: &'static str = "thing";
    }

    crate::response_set! {
        enum CountOrLabel {
            Counted(Count),
            Labelled(Label),
        }
    }

    crate::response_set! {
        enum MaybeCount {
            Counted(Option<Count>),
            Exactly(Count),
        }
    }

    #[test]
    fn test_shared_response_kind_fails_registration() {
        let mut builder = RouteRegistry::builder();
        let err = builder
            .register(Method::Get, "x.y", "/x/y", "here.rs", |_: NoParams| {
                Ok(CountOrLabel::Labelled(Label { b: "b".to_string() }))
            })
            .unwrap_err();
        match err {
            ContractError::DuplicateResponseKind { kind } => assert_eq!(kind, "thing"),
            other => panic!("Expected DuplicateResponseKind, got {:?}", other),
        }
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_repeated_response_schema_is_declared_once() {
        let mut builder = RouteRegistry::builder();
        builder
            .register(Method::Get, "x.y", "/x/y", "here.rs", |_: NoParams| {
                Ok(MaybeCount::Exactly(Count { a: 1 }))
            })
            .unwrap();
        let registry = builder.build().unwrap();

        let kinds: Vec<&str> = registry
            .lookup("x.y")
            .unwrap()
            .responses
            .iter()
            .map(ResponseSchema::kind)
            .collect();
        assert_eq!(kinds, vec!["thing", "no_content"]);
    }

    #[test]
    fn test_invalid_endpoint_id() {
        let mut builder = RouteRegistry::builder();
        for endpoint in ["nodot", "trailing.", ".leading"] {
            let mut builder = RouteRegistry::builder();
            let err = builder.register(Method::Get, endpoint, "/", "here.rs", not_found).unwrap_err();
            assert!(matches!(err, ContractError::InvalidEndpoint { .. }));
        }
        assert!(builder.register(Method::Get, "api.v2.items", "/", "here.rs", not_found).is_ok());
    }

    #[test]
    fn test_unsupported_request_fails_registration() {
        let mut builder = RouteRegistry::builder();
        let err = builder
            .register(Method::Post, "clock.set", "/clock", "here.rs", |_: Timestamp| Ok(NoContent))
            .unwrap_err();
        match err {
            ContractError::UnsupportedType { ty, path, .. } => {
                assert_eq!(ty, "Instant");
                assert_eq!(path, "clock.set:request.at");
            }
            other => panic!("Expected UnsupportedType, got {:?}", other),
        }
    }
}

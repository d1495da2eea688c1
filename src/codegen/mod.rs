//! Code Generation
//!
//! Walks a [`RouteRegistry`] and produces the client contract: one
//! TypeScript file holding every request/response interface plus the
//! `GET_MAP` and `POST_MAP` lookup interfaces.
//!
//! Architecture:
//! - [`resolve`]: descriptors -> resolved declarations (language-agnostic shape)
//! - [`names`]: collision-free identifiers
//! - [`typescript`]: pure text rendering
//! - [`emit`]: writes the artifact only when its content changed
//!
//! Endpoint-level interfaces are named after the endpoint
//! (`example.get_example` -> `ExampleGetExampleRequest`,
//! `ExampleGetExampleResponse`, `ExampleGetExampleResponse1`, ...); nested
//! objects and enums keep their schema names.

pub mod emit;
pub mod imports;
pub mod names;
pub mod resolve;
pub mod typescript;

use tracing::debug;

use crate::error::Result;
use crate::registry::{Method, RouteDefinition, RouteRegistry};
use crate::response::ResponseSchema;
use imports::ImportTable;
use resolve::{Declaration, TypeResolver};
use typescript::{quoted, render_declaration};

/// First line of the generated header
pub const HEADER_NOTICE: &str = "THIS FILE IS AUTO-GENERATED, DO NOT ALTER MANUALLY.";

/// Source file the header points readers at
pub const GENERATOR_SOURCE: &str = file!();

// =============================================================================
// Generated Artifact
// =============================================================================

/// One `GET_MAP`/`POST_MAP` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub endpoint: String,
    pub source: String,
    /// `None` when the request has no fields
    pub request: Option<String>,
    /// Identifiers of the declared body responses
    pub responses: Vec<String>,
    /// `NoContent` is among the declared responses
    pub may_be_empty: bool,
}

/// Everything one generation pass produced, in output order
#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub generator: String,
    pub imports: ImportTable,
    pub declarations: Vec<Declaration>,
    pub get_map: Vec<MapEntry>,
    pub post_map: Vec<MapEntry>,
}

impl GeneratedArtifact {
    /// Render the artifact file
    pub fn render(&self) -> String {
        let mut out = format!("/*\n{}\n\nPlease see {}\n*/\n", HEADER_NOTICE, self.generator);

        out.push_str(&self.imports.render());
        out.push('\n');

        for declaration in &self.declarations {
            out.push_str("// prettier-ignore\nexport ");
            out.push_str(&render_declaration(declaration));
            out.push_str("\n\n");
        }

        render_map(&mut out, "GET_MAP", &self.get_map, "undefined");
        out.push('\n');
        render_map(&mut out, "POST_MAP", &self.post_map, "{}");
        out
    }
}

/// A zero-field GET request renders `undefined`, a zero-field POST one `{}`
fn render_map(out: &mut String, name: &str, entries: &[MapEntry], empty_request: &str) {
    out.push_str(&format!("// prettier-ignore\nexport interface {} {{\n", name));
    for entry in entries {
        let response = if entry.responses.is_empty() {
            "undefined".to_string()
        } else {
            entry.responses.join(" | ")
        };
        out.push_str(&format!(
            "    // {}\n    {}: {{request: {}, response{}: {}}}\n",
            entry.source,
            quoted(&entry.endpoint),
            entry.request.as_deref().unwrap_or(empty_request),
            if entry.may_be_empty { "?" } else { "" },
            response,
        ));
    }
    out.push_str("}\n");
}

// =============================================================================
// Generation
// =============================================================================

/// Run one generation pass over every registered endpoint, in endpoint order
pub fn generate(registry: &RouteRegistry) -> Result<GeneratedArtifact> {
    let mut resolver = TypeResolver::new();
    let mut get_map = Vec::new();
    let mut post_map = Vec::new();

    for definition in registry.all_endpoints() {
        let entry = resolve_route(&mut resolver, definition)?;
        match definition.method {
            Method::Get => get_map.push(entry),
            Method::Post => post_map.push(entry),
        }
    }

    let (imports, declarations) = resolver.finish();
    debug!(
        endpoints = registry.len(),
        declarations = declarations.len(),
        "Generated API contract"
    );

    Ok(GeneratedArtifact {
        generator: GENERATOR_SOURCE.to_string(),
        imports,
        declarations,
        get_map,
        post_map,
    })
}

/// Resolve a single route in isolation, failing on anything unsupported
pub fn check_route(definition: &RouteDefinition) -> Result<()> {
    resolve_route(&mut TypeResolver::new(), definition).map(|_| ())
}

fn resolve_route(resolver: &mut TypeResolver, definition: &RouteDefinition) -> Result<MapEntry> {
    let endpoint = &definition.endpoint;

    let request = if definition.request.fields().is_empty() {
        None
    } else {
        Some(resolver.declare_root(
            &format!("{}.request", endpoint),
            &definition.request,
            &format!("{}:request", endpoint),
        )?)
    };

    let mut responses = Vec::new();
    for response in &definition.responses {
        if let ResponseSchema::Body { object, kind, .. } = response {
            responses.push(resolver.declare_root(
                &format!("{}.response", endpoint),
                object,
                &format!("{}:{}", endpoint, kind),
            )?);
        }
    }

    Ok(MapEntry {
        endpoint: endpoint.clone(),
        source: definition.source.clone(),
        request,
        responses,
        may_be_empty: definition.may_be_empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(endpoint: &str, request: Option<&str>, responses: &[&str], may_be_empty: bool) -> MapEntry {
        MapEntry {
            endpoint: endpoint.to_string(),
            source: "src/views.rs".to_string(),
            request: request.map(str::to_string),
            responses: responses.iter().map(|r| r.to_string()).collect(),
            may_be_empty,
        }
    }

    #[test]
    fn test_zero_field_request_asymmetry() {
        let artifact = GeneratedArtifact {
            generator: "gen.rs".to_string(),
            imports: ImportTable::new(),
            declarations: Vec::new(),
            get_map: vec![entry("a.list", None, &["AListResponse"], false)],
            post_map: vec![entry("a.clear", None, &[], true)],
        };
        let rendered = artifact.render();

        assert!(rendered.contains("    \"a.list\": {request: undefined, response: AListResponse}\n"));
        assert!(rendered.contains("    \"a.clear\": {request: {}, response?: undefined}\n"));
    }

    #[test]
    fn test_optional_response_marker() {
        let artifact = GeneratedArtifact {
            generator: "gen.rs".to_string(),
            imports: ImportTable::new(),
            declarations: Vec::new(),
            get_map: vec![entry("a.find", Some("AFindRequest"), &["AFindResponse", "AFindResponse1"], true)],
            post_map: Vec::new(),
        };

        assert_eq!(
            artifact.render(),
            "/*\nTHIS FILE IS AUTO-GENERATED, DO NOT ALTER MANUALLY.\n\nPlease see gen.rs\n*/\n\n\
             // prettier-ignore\nexport interface GET_MAP {\n\
             \x20   // src/views.rs\n\
             \x20   \"a.find\": {request: AFindRequest, response?: AFindResponse | AFindResponse1}\n\
             }\n\n\
             // prettier-ignore\nexport interface POST_MAP {\n}\n"
        );
    }
}

//! Route Contract
//!
//! Declare each API route's request and response shapes once, then derive
//! both a TypeScript client contract and runtime enforcement from that one
//! declaration.
//!
//! ## Features
//!
//! - **Explicit Schemas**: types describe themselves through [`Describe`]
//! - **Client Contract**: interfaces plus `GET_MAP`/`POST_MAP`, written only when changed
//! - **Request Coercion**: query strings and JSON bodies validated against the same schema
//! - **Closed Responses**: handlers can only return declared kinds; anything else is a fault
//!
//! ## Architecture
//!
//! ```text
//! RegistryBuilder ──register──▶ RouteRegistry ──┬──▶ codegen ──▶ js/api/types.ts
//!   (Blueprint)                                 │
//!                                               └──▶ Dispatcher
//!                                                      coerce ─▶ handler ─▶ Reply
//! ```

pub mod cli;
pub mod codegen;
pub mod coerce;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod response;
pub mod schema;

pub use codegen::emit::{sync_artifact, ArtifactEmitter, WriteOutcome};
pub use codegen::{generate, GeneratedArtifact};
pub use coerce::{FieldIssue, RawInput, ValidationFailure};
pub use config::{ContractConfig, RunMode};
pub use dispatch::{
    DispatchFault, Dispatched, Dispatcher, HandlerError, Outcome, Signal, SignalKind, SignalMap,
};
pub use error::{ContractError, Result};
pub use registry::{Blueprint, Method, NoParams, RegistryBuilder, RouteDefinition, RouteRegistry};
pub use response::{
    ApiResponse, BadRequest, Forbidden, InternalServerError, NoContent, NotFound, Reply,
    ResponseSchema, ResponseSet,
};
pub use schema::{Decimal, Describe, EnumSchema, Field, ObjectRef, TypeDescriptor};

//! Response dispatch
//!
//! Drives one request through coercion, the handler, and reply
//! serialization:
//!
//! ```text
//! received -> coercing -> coercion failed ------------------> bad request
//!                      -> invoking -> declared variant ------> success
//!                                  -> expected signal -------> mapped reply
//!                                  -> unexpected failure ----> logged, internal error
//!                                  -> undeclared variant ----> DispatchFault
//! ```
//!
//! Expected outcomes are logged at debug level only. Unexpected failures,
//! panics included, are logged in full and answered with an opaque 500.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::coerce::{coerce_request, RawInput, ValidationFailure};
use crate::error::{ContractError, Result};
use crate::registry::{Method, RouteRegistry};
use crate::response::{BadRequest, EncodeResult, Forbidden, NotFound, Reply};

// =============================================================================
// Handler Errors
// =============================================================================

/// Expected, non-exceptional ways for a handler to refuse a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Signal {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::BadRequest(_) => SignalKind::BadRequest,
            Signal::Forbidden => SignalKind::Forbidden,
            Signal::NotFound => SignalKind::NotFound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalKind {
    BadRequest,
    Forbidden,
    NotFound,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [SignalKind::BadRequest, SignalKind::Forbidden, SignalKind::NotFound];
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::BadRequest => f.write_str("bad_request"),
            SignalKind::Forbidden => f.write_str("forbidden"),
            SignalKind::NotFound => f.write_str("not_found"),
        }
    }
}

/// Failure returned by a handler
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Signal(#[from] Signal),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl HandlerError {
    /// Wrap any error as an unexpected failure
    pub fn unexpected<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        HandlerError::Unexpected(err.into())
    }
}

/// What the erased handler produced
pub(crate) enum Invocation {
    /// Coerced input did not decode into the request type
    Rejected(ValidationFailure),
    Returned(EncodeResult<Reply>),
    Raised(HandlerError),
}

// =============================================================================
// Signal Map
// =============================================================================

pub type SignalResponder = fn(&Signal) -> EncodeResult<Reply>;

/// Expected signal kind -> reply
#[derive(Clone, Default)]
pub struct SignalMap {
    responders: BTreeMap<SignalKind, SignalResponder>,
}

impl SignalMap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Maps each signal to its built-in response kind
    pub fn standard() -> Self {
        Self::empty()
            .with(SignalKind::BadRequest, |signal| {
                let message = match signal {
                    Signal::BadRequest(message) => message.clone(),
                    other => other.to_string(),
                };
                Reply::from_response(&BadRequest::new(message))
            })
            .with(SignalKind::Forbidden, |_| Reply::from_response(&Forbidden))
            .with(SignalKind::NotFound, |_| Reply::from_response(&NotFound))
    }

    pub fn with(mut self, kind: SignalKind, responder: SignalResponder) -> Self {
        self.responders.insert(kind, responder);
        self
    }

    /// `None` when no responder is configured for the signal's kind
    pub fn respond(&self, signal: &Signal) -> Option<EncodeResult<Reply>> {
        self.responders.get(&signal.kind()).map(|responder| responder(signal))
    }

    pub fn missing(&self) -> Vec<SignalKind> {
        SignalKind::ALL
            .into_iter()
            .filter(|kind| !self.responders.contains_key(kind))
            .collect()
    }
}

impl fmt::Debug for SignalMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.responders.keys()).finish()
    }
}

// =============================================================================
// Dispatch Results
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The handler returned a declared variant
    Success,
    /// The handler raised an expected signal
    Mapped,
    /// The request failed validation
    BadRequest,
    /// Something unexpected happened; details are in the log
    InternalError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub outcome: Outcome,
    pub reply: Reply,
}

/// Programming or configuration faults found while dispatching
#[derive(Debug, Error)]
pub enum DispatchFault {
    #[error("No API endpoint registered as {endpoint}")]
    UnknownEndpoint { endpoint: String },

    #[error("Endpoint {endpoint} accepts {expected}, received {received}")]
    MethodMismatch {
        endpoint: String,
        expected: Method,
        received: Method,
    },

    #[error("Invalid response generated by server: {endpoint} returned undeclared kind {kind}")]
    UndeclaredResponse { endpoint: String, kind: String },

    #[error("No response mapping configured for expected signal {signal} raised by {endpoint}")]
    UnmappedSignal { endpoint: String, signal: SignalKind },
}

impl DispatchFault {
    /// Faults never leak details to the client
    pub fn into_reply(self) -> Reply {
        Reply::internal_error()
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Runs requests against a built registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<RouteRegistry>,
    signals: SignalMap,
}

impl Dispatcher {
    /// Fails if any expected signal kind has no responder
    pub fn new(registry: Arc<RouteRegistry>, signals: SignalMap) -> Result<Self> {
        if let Some(kind) = signals.missing().first() {
            return Err(ContractError::UnmappedSignal {
                signal: kind.to_string(),
            });
        }
        Ok(Self { registry, signals })
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub fn dispatch(&self, endpoint: &str, input: RawInput) -> std::result::Result<Dispatched, DispatchFault> {
        let received = input.method();
        let span = tracing::info_span!("dispatch", endpoint = %endpoint, method = %received);
        let _enter = span.enter();

        let Some(route) = self.registry.route(endpoint) else {
            let fault = DispatchFault::UnknownEndpoint {
                endpoint: endpoint.to_string(),
            };
            error!(error = %fault, "Dispatch fault");
            return Err(fault);
        };
        let definition = &route.definition;

        if received != definition.method {
            let fault = DispatchFault::MethodMismatch {
                endpoint: endpoint.to_string(),
                expected: definition.method,
                received,
            };
            error!(error = %fault, "Dispatch fault");
            return Err(fault);
        }

        let coerced = match coerce_request(&definition.request, input) {
            Ok(coerced) => coerced,
            Err(failure) => return Ok(self.reject(failure)),
        };

        let invocation = match panic::catch_unwind(AssertUnwindSafe(|| (route.handler)(coerced))) {
            Ok(invocation) => invocation,
            Err(payload) => {
                error!(panic_message = %panic_message(payload.as_ref()), "Handler panicked");
                return Ok(internal_error());
            }
        };

        match invocation {
            Invocation::Rejected(failure) => {
                // Coercion passed, so the described fields and the request type disagree
                warn!(error = %failure, issues = ?failure.issues, "Coerced request failed to decode");
                Ok(self.reject(failure))
            }

            Invocation::Returned(Ok(reply)) => {
                if definition.declares(reply.kind) {
                    debug!(kind = reply.kind, status = reply.status, "Handler returned declared response");
                    Ok(Dispatched {
                        outcome: Outcome::Success,
                        reply,
                    })
                } else {
                    let fault = DispatchFault::UndeclaredResponse {
                        endpoint: endpoint.to_string(),
                        kind: reply.kind.to_string(),
                    };
                    error!(error = %fault, "Dispatch fault");
                    Err(fault)
                }
            }

            Invocation::Returned(Err(err)) => {
                error!(error = %err, "Failed to serialize handler response");
                Ok(internal_error())
            }

            Invocation::Raised(HandlerError::Signal(signal)) => match self.signals.respond(&signal) {
                Some(Ok(reply)) => {
                    debug!(signal = %signal.kind(), status = reply.status, "Handler raised expected signal");
                    Ok(Dispatched {
                        outcome: Outcome::Mapped,
                        reply,
                    })
                }
                Some(Err(err)) => {
                    error!(error = %err, signal = %signal.kind(), "Failed to serialize signal response");
                    Ok(internal_error())
                }
                None => {
                    let fault = DispatchFault::UnmappedSignal {
                        endpoint: endpoint.to_string(),
                        signal: signal.kind(),
                    };
                    error!(error = %fault, "Dispatch fault");
                    Err(fault)
                }
            },

            Invocation::Raised(HandlerError::Unexpected(err)) => {
                error!(error = ?err, "Unexpected handler failure");
                Ok(internal_error())
            }
        }
    }

    fn reject(&self, failure: ValidationFailure) -> Dispatched {
        debug!(issues = failure.issues.len(), "Request payload failed validation");
        let response = BadRequest::new(failure.to_string()).with_errors(failure.issues);
        match Reply::from_response(&response) {
            Ok(reply) => Dispatched {
                outcome: Outcome::BadRequest,
                reply,
            },
            Err(err) => {
                error!(error = %err, "Failed to serialize bad request response");
                internal_error()
            }
        }
    }
}

fn internal_error() -> Dispatched {
    Dispatched {
        outcome: Outcome::InternalError,
        reply: Reply::internal_error(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Resolution results

use crate::params::Params;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller should run for a resolved request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<'a, H> {
    /// A registered route handler (status 200)
    Route(&'a H),
    /// Redirect to the given location (status 301 or 307)
    Redirect(String),
    /// A handler registered for the outcome's status code
    Status(&'a H),
    /// No handler applies, render [`Outcome::default_body`]
    Default,
}

/// The decision reached for one `(method, path)` pair.
///
/// Resolution never fails: a miss is an outcome with a 404 or 405 status,
/// and a handler failure turns into a 500 outcome carrying the [`Failure`].
#[derive(Debug, Clone)]
pub struct Outcome<'a, H> {
    pub status: u16,
    pub target: Target<'a, H>,
    pub params: Params,
    /// Trailing-slash recommendation of the method's tree, kept for diagnostics
    pub tsr: bool,
    /// Methods that do match the path, only filled for 405
    pub allowed: Vec<String>,
    /// Set on 500 outcomes produced by [`Engine::dispatch`](crate::Engine::dispatch)
    pub failure: Option<Failure>,
}

impl<'a, H> Outcome<'a, H> {
    pub(crate) fn new(status: u16, target: Target<'a, H>) -> Self {
        Self {
            status,
            target,
            params: Params::new(),
            tsr: false,
            allowed: Vec::new(),
            failure: None,
        }
    }

    /// The handler to run, for route and status targets
    pub fn handler(&self) -> Option<&'a H> {
        match self.target {
            Target::Route(h) | Target::Status(h) => Some(h),
            Target::Redirect(_) | Target::Default => None,
        }
    }

    /// Redirect location, if this is a redirect
    pub fn location(&self) -> Option<&str> {
        match &self.target {
            Target::Redirect(location) => Some(location),
            _ => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.target, Target::Redirect(_))
    }

    pub fn is_found(&self) -> bool {
        matches!(self.target, Target::Route(_))
    }

    /// Captured value of the parameter `name`, `""` if absent
    pub fn param(&self, name: &str) -> &str {
        self.params.by_name(name)
    }

    /// Value for an `Allow` response header
    pub fn allow_header(&self) -> Option<String> {
        if self.allowed.is_empty() {
            None
        } else {
            Some(self.allowed.join(", "))
        }
    }

    /// Plain text body of the built-in status handler, e.g. `404 Not Found`
    pub fn default_body(&self) -> String {
        format!("{} {}", self.status, reason_phrase(self.status))
    }
}

/// How a handler failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The handler returned an error
    Error,
    /// The handler panicked
    Panic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Error => f.write_str("error"),
            FailureKind::Panic => f.write_str("panic"),
        }
    }
}

/// A recovered handler failure.
///
/// `message` is the top-level error text or panic payload, `detail` the full
/// error chain with backtrace when one was captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub detail: String,
}

impl Failure {
    pub(crate) fn from_error(err: &anyhow::Error) -> Self {
        Self {
            kind: FailureKind::Error,
            message: err.to_string(),
            detail: format!("{:?}", err),
        }
    }

    /// `site` is where the panic was raised, followed by a backtrace when
    /// `RUST_BACKTRACE` enables capturing
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>, site: Option<String>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_string()
        };

        let detail = match site {
            Some(site) => format!("{}\n{}", message, site),
            None => message.clone(),
        };

        Self {
            kind: FailureKind::Panic,
            message,
            detail,
        }
    }

    /// Prefix `detail` with the request and status that were being handled
    pub(crate) fn during(mut self, method: &str, path: &str, status: u16) -> Self {
        self.detail = format!("while handling {} {} ({}): {}", method, path, status, self.detail);
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler {}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Failure {}

/// Result of [`Engine::dispatch`](crate::Engine::dispatch): the outcome that
/// was finally invoked and what the invocation returned
#[derive(Debug)]
pub struct Dispatched<'a, H, R> {
    pub outcome: Outcome<'a, H>,
    /// `Err` only when the 500 handler failed as well
    pub result: Result<R, Failure>,
}

/// Standard reason phrase for an HTTP status code
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        413 => "Request Entity Too Large",
        414 => "Request URI Too Long",
        415 => "Unsupported Media Type",
        418 => "I'm a teapot",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "",
    }
}

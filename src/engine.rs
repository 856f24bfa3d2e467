//! Dispatch engine: one radix tree per HTTP method

use crate::config::EngineConfig;
use crate::error::RouteError;
use crate::outcome::{Dispatched, Failure, Outcome, Target};
use crate::path::clean_path;
use crate::route::HttpMethod;
use crate::tree::Tree;
use anyhow::{Context, Result};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use tracing::{debug, error, trace, warn};

/// Pseudo method whose tree holds the status handlers.
///
/// Status handlers are keyed by `/{code}{path}`, e.g. `/404/missing/page`.
pub const STATUS: &str = "STATUS";

/// Registering `(STATUS, DEFAULT_STATUS, h)` sets the engine-wide fallback
pub const DEFAULT_STATUS: &str = "DEFAULT";

/// Collects routes before an [`Engine`] is built.
///
/// This is the only phase in which routes can be added. Every error is a
/// setup mistake and should abort startup.
pub struct EngineBuilder<H> {
    config: EngineConfig,
    trees: HashMap<String, Tree<H>>,
    default_status: Option<H>,
}

impl<H> Default for EngineBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> EngineBuilder<H> {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            trees: HashMap::new(),
            default_status: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register `handler` for `method` and the path pattern `path`.
    ///
    /// Paths must start with `/`, except for the [`STATUS`] pseudo method.
    /// `(STATUS, "DEFAULT", h)` replaces the default status handler instead
    /// of adding a route.
    pub fn handle(&mut self, method: &str, path: &str, handler: H) -> Result<()> {
        if method == STATUS && path == DEFAULT_STATUS {
            self.default_status = Some(handler);
            debug!("default status handler replaced");
            return Ok(());
        }

        if method != STATUS && !path.starts_with('/') {
            return Err(RouteError::InvalidPath {
                path: path.to_string(),
            })
            .with_context(|| format!("Failed to register route {} {}", method, path));
        }

        self.trees
            .entry(method.to_string())
            .or_default()
            .add_route(path, handler)
            .with_context(|| format!("Failed to register route {} {}", method, path))?;

        debug!(method, path, "route registered");
        Ok(())
    }

    /// Register a clone of `handler` under every method in `methods`
    pub fn handle_methods(&mut self, methods: HttpMethod, path: &str, handler: H) -> Result<()>
    where
        H: Clone,
    {
        for method in methods.tokens() {
            self.handle(method, path, handler.clone())?;
        }
        Ok(())
    }

    /// Register a handler for every path answered with status `code`
    pub fn status(&mut self, code: u16, handler: H) -> Result<()> {
        self.handle(STATUS, &format!("/{}/*path", code), handler)
    }

    /// Handler used for status outcomes without a more specific handler
    pub fn default_status(&mut self, handler: H) {
        self.default_status = Some(handler);
        debug!("default status handler replaced");
    }

    /// Freeze the route set
    pub fn build(self) -> Engine<H> {
        let engine = Engine {
            config: self.config,
            trees: self.trees,
            default_status: self.default_status,
        };
        debug!(methods = ?engine.methods(), "engine built");
        engine
    }
}

/// Immutable route set, shared between threads behind an `Arc`.
///
/// To change routes at runtime build a new engine and swap it.
pub struct Engine<H> {
    config: EngineConfig,
    trees: HashMap<String, Tree<H>>,
    default_status: Option<H>,
}

impl<H> Engine<H> {
    pub fn builder() -> EngineBuilder<H> {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Methods with at least one route, sorted
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self
            .trees
            .keys()
            .map(String::as_str)
            .filter(|m| *m != STATUS)
            .collect();
        methods.sort_unstable();
        methods
    }

    /// The route tree of `method`
    pub fn tree(&self, method: &str) -> Option<&Tree<H>> {
        self.trees.get(method)
    }

    /// Resolve a request to an [`Outcome`].
    ///
    /// In order: the method's own route (200), a trailing-slash redirect, a
    /// redirect to the cleaned case-corrected path, 405 when another method
    /// has the path, and 404 otherwise. Redirects are 301 for `GET` and 307
    /// for every other method, and are never offered for `CONNECT` or `/`.
    pub fn resolve(&self, method: &str, path: &str) -> Outcome<'_, H> {
        let outcome = self.lookup(method, path);
        trace!(method, path, status = outcome.status, "resolved");
        outcome
    }

    fn lookup(&self, method: &str, path: &str) -> Outcome<'_, H> {
        let mut tsr = false;

        if let Some(tree) = self.request_tree(method) {
            let lookup = tree.get_value(path);
            if let Some(handler) = lookup.value {
                let mut outcome = Outcome::new(200, Target::Route(handler));
                outcome.params = lookup.params;
                return outcome;
            }
            tsr = lookup.tsr;

            if method != "CONNECT" && path != "/" {
                let code = if method == "GET" { 301 } else { 307 };

                if tsr && self.config.redirect_trailing_slash {
                    let location = match path.strip_suffix('/') {
                        Some(trimmed) => trimmed.to_string(),
                        None => format!("{}/", path),
                    };
                    return redirect(code, location, tsr);
                }

                if self.config.redirect_fixed_path {
                    let fixed = tree.find_case_insensitive_path(
                        &clean_path(path),
                        self.config.redirect_trailing_slash,
                    );
                    if let Some(location) = fixed {
                        return redirect(code, location, tsr);
                    }
                }
            }
        }

        let allowed = self.allowed(method, path);
        if !allowed.is_empty() {
            let mut outcome = self.status(405, path, tsr);
            outcome.allowed = allowed;
            return outcome;
        }

        self.status(404, path, tsr)
    }

    fn request_tree(&self, method: &str) -> Option<&Tree<H>> {
        if method == STATUS {
            return None;
        }
        self.trees.get(method)
    }

    // Other methods with a handler for exactly this path
    fn allowed(&self, method: &str, path: &str) -> Vec<String> {
        let mut allowed: Vec<String> = self
            .trees
            .iter()
            .filter(|(m, _)| m.as_str() != method && m.as_str() != STATUS)
            .filter(|(_, tree)| tree.get_value(path).value.is_some())
            .map(|(m, _)| m.clone())
            .collect();
        allowed.sort_unstable();
        allowed
    }

    fn status(&self, code: u16, path: &str, tsr: bool) -> Outcome<'_, H> {
        if let Some(tree) = self.trees.get(STATUS) {
            let lookup = tree.get_value(&format!("/{}{}", code, path));
            if let Some(handler) = lookup.value {
                let mut outcome = Outcome::new(code, Target::Status(handler));
                outcome.params = lookup.params;
                outcome.tsr = tsr;
                return outcome;
            }
        }

        let target = match &self.default_status {
            Some(handler) => Target::Status(handler),
            None => Target::Default,
        };
        let mut outcome = Outcome::new(code, target);
        outcome.tsr = tsr;
        outcome
    }

    /// Resolve a request and run `invoke` on the outcome.
    ///
    /// An `Err` or a panic from `invoke` is recovered into a [`Failure`],
    /// attached to a 500 outcome, and `invoke` runs again for that outcome.
    /// Should the 500 invocation fail too, its failure is returned in
    /// [`Dispatched::result`]; nothing unwinds out of this call.
    pub fn dispatch<R, F>(&self, method: &str, path: &str, mut invoke: F) -> Dispatched<'_, H, R>
    where
        F: FnMut(&Outcome<'_, H>) -> Result<R>,
    {
        let outcome = self.resolve(method, path);

        let failure = match invoke_guarded(&mut invoke, &outcome, method, path) {
            Ok(value) => {
                return Dispatched {
                    outcome,
                    result: Ok(value),
                }
            }
            Err(failure) => failure,
        };

        error!(
            method,
            path,
            status = outcome.status,
            kind = %failure.kind,
            message = %failure.message,
            "handler failed, dispatching 500"
        );

        let mut recovery = self.status(500, path, outcome.tsr);
        recovery.failure = Some(failure);

        let result = invoke_guarded(&mut invoke, &recovery, method, path);
        if let Err(failure) = &result {
            warn!(
                method,
                path,
                kind = %failure.kind,
                message = %failure.message,
                "500 handler failed"
            );
        }

        Dispatched {
            outcome: recovery,
            result,
        }
    }
}

fn redirect<'a, H>(code: u16, location: String, tsr: bool) -> Outcome<'a, H> {
    let mut outcome = Outcome::new(code, Target::Redirect(location));
    outcome.tsr = tsr;
    outcome
}

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static PANIC_SITE: RefCell<Option<String>> = const { RefCell::new(None) };
}

// Chains onto the hook in place at first dispatch. Only panics raised inside
// `invoke_guarded` on the same thread are recorded.
fn install_panic_recorder() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info: &panic::PanicHookInfo<'_>| {
            if GUARDED.with(Cell::get) {
                let mut site = match info.location() {
                    Some(location) => format!("panicked at {}", location),
                    None => "panicked at an unknown location".to_string(),
                };
                let backtrace = Backtrace::capture();
                if backtrace.status() == BacktraceStatus::Captured {
                    site.push_str(&format!("\nstack backtrace:\n{}", backtrace));
                }
                PANIC_SITE.with(|slot| *slot.borrow_mut() = Some(site));
            }
            previous(info);
        }));
    });
}

fn invoke_guarded<H, R, F>(
    invoke: &mut F,
    outcome: &Outcome<'_, H>,
    method: &str,
    path: &str,
) -> std::result::Result<R, Failure>
where
    F: FnMut(&Outcome<'_, H>) -> Result<R>,
{
    install_panic_recorder();
    PANIC_SITE.with(|slot| slot.borrow_mut().take());

    let guarded = GUARDED.with(|flag| flag.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(|| invoke(outcome)));
    GUARDED.with(|flag| flag.set(guarded));

    let failure = match result {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(err)) => Failure::from_error(&err),
        Err(payload) => {
            let site = PANIC_SITE.with(|slot| slot.borrow_mut().take());
            Failure::from_panic(payload, site)
        }
    };
    Err(failure.during(method, path, outcome.status))
}

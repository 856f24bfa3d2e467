//! # radix-dispatch
//!
//! Path dispatch for HTTP services, built on one radix tree per method.
//!
//! Provides:
//! - Static routes, named parameters (`:name`) and trailing catch-alls (`/*name`)
//! - Static and parameter routes side by side (`/user/new` next to `/user/:id`)
//! - Trailing-slash and case-insensitive redirect suggestions
//! - 405 detection with the list of allowed methods
//! - Status handlers per code, plus a default
//! - Recovery of failing or panicking handlers into a 500 outcome
//!
//! Routes are registered on an [`EngineBuilder`], which freezes into an
//! immutable [`Engine`] that can be shared between threads.
//!
//! ## Example
//!
//! ```rust
//! use radix_dispatch::{Engine, Target};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = Engine::builder();
//! builder.handle("GET", "/api/users", "list_users")?;
//! builder.handle("GET", "/api/user/:id", "show_user")?;
//! builder.handle("GET", "/static/*filepath", "assets")?;
//! let engine = builder.build();
//!
//! // Match exact path
//! let outcome = engine.resolve("GET", "/api/users");
//! assert_eq!(outcome.status, 200);
//! assert_eq!(outcome.handler(), Some(&"list_users"));
//!
//! // Match with parameter extraction
//! let outcome = engine.resolve("GET", "/api/user/123");
//! assert_eq!(outcome.param("id"), "123");
//!
//! // A trailing slash too many is redirected
//! let outcome = engine.resolve("GET", "/api/users/");
//! assert_eq!(outcome.status, 301);
//! assert_eq!(outcome.target, Target::Redirect("/api/users".to_string()));
//!
//! // Known path, wrong method
//! let outcome = engine.resolve("DELETE", "/api/users");
//! assert_eq!(outcome.status, 405);
//! assert_eq!(outcome.allow_header().as_deref(), Some("GET"));
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
mod outcome;
mod params;
mod path;
mod route;
mod tree;

// Re-export public types
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder, DEFAULT_STATUS, STATUS};
pub use error::RouteError;
pub use outcome::{reason_phrase, Dispatched, Failure, FailureKind, Outcome, Target};
pub use params::{Param, Params};
pub use path::clean_path;
pub use route::{HttpMethod, RoutePattern};
pub use tree::{Lookup, Tree};

// Re-export anyhow types for convenience
pub use anyhow::{Context, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    type Handler = fn(&Params, Option<&Failure>) -> Result<String>;

    fn show_user(params: &Params, _: Option<&Failure>) -> Result<String> {
        Ok(format!("user {}", params.by_name("id")))
    }

    fn failing(_: &Params, _: Option<&Failure>) -> Result<String> {
        Err(anyhow::anyhow!("database unavailable")).context("loading user")
    }

    fn panicking(_: &Params, _: Option<&Failure>) -> Result<String> {
        panic!("boom")
    }

    fn render_500(_: &Params, failure: Option<&Failure>) -> Result<String> {
        let failure = failure.context("500 without failure")?;
        Ok(format!("500: {}", failure.message))
    }

    fn run(outcome: &Outcome<'_, Handler>) -> Result<String> {
        match &outcome.target {
            Target::Route(h) | Target::Status(h) => h(&outcome.params, outcome.failure.as_ref()),
            Target::Redirect(location) => Ok(format!("redirect {}", location)),
            Target::Default => Ok(outcome.default_body()),
        }
    }

    fn engine_with(routes: &[(&str, &str)]) -> Engine<String> {
        let mut builder = Engine::builder();
        for (method, path) in routes {
            builder
                .handle(method, path, format!("{} {}", method, path))
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_basic_match() {
        let mut builder = Engine::builder();
        builder
            .handle("GET", "/api/users", serde_json::json!({"handler": "get_users"}))
            .unwrap();
        let engine = builder.build();

        let outcome = engine.resolve("GET", "/api/users");
        assert_eq!(outcome.status, 200);
        assert!(outcome.params.is_empty());
        assert!(!outcome.tsr);
        assert_eq!(outcome.handler().unwrap()["handler"], "get_users");
    }

    #[test]
    fn test_param_extraction() {
        let engine = engine_with(&[("GET", "/user/:id/post/:pid")]);

        let outcome = engine.resolve("GET", "/user/123/post/456");
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.param("id"), "123");
        assert_eq!(outcome.param("pid"), "456");

        let keys: Vec<&str> = outcome.params.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["id", "pid"]);
    }

    #[test]
    fn test_catch_all() {
        let engine = engine_with(&[("GET", "/files/*rest")]);

        let outcome = engine.resolve("GET", "/files/a/b/c");
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.param("rest"), "a/b/c");

        let outcome = engine.resolve("GET", "/files/documents/readme.txt");
        assert_eq!(outcome.param("rest"), "documents/readme.txt");
    }

    #[test]
    fn test_static_next_to_param() {
        for order in [["/user/new", "/user/:id"], ["/user/:id", "/user/new"]] {
            let engine = engine_with(&[("GET", order[0]), ("GET", order[1])]);

            let outcome = engine.resolve("GET", "/user/new");
            assert_eq!(outcome.handler().map(String::as_str), Some("GET /user/new"));
            assert!(outcome.params.is_empty());

            let outcome = engine.resolve("GET", "/user/123");
            assert_eq!(outcome.handler().map(String::as_str), Some("GET /user/:id"));
            assert_eq!(outcome.param("id"), "123");
        }
    }

    #[test]
    fn test_configuration_errors() {
        let mut builder = Engine::builder();
        builder.handle("GET", "/item/:id", 1).unwrap();

        let err = builder.handle("GET", "/item/:id", 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RouteError>(),
            Some(RouteError::Duplicate { .. })
        ));

        let err = builder.handle("GET", "/item/:identifier", 3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RouteError>(),
            Some(RouteError::WildcardConflict { .. })
        ));

        let err = builder.handle("GET", "item", 4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RouteError>(),
            Some(RouteError::InvalidPath { .. })
        ));

        // earlier routes are untouched
        let engine = builder.build();
        assert_eq!(engine.resolve("GET", "/item/5").handler(), Some(&1));
    }

    #[test]
    fn test_trailing_slash_redirect() {
        let engine = engine_with(&[("GET", "/user/:name/"), ("POST", "/user/:name/"), ("GET", "/x")]);

        let outcome = engine.resolve("GET", "/user/gopher");
        assert_eq!(outcome.status, 301);
        assert_eq!(outcome.location(), Some("/user/gopher/"));
        assert!(outcome.tsr);
        assert!(outcome.params.is_empty());

        let outcome = engine.resolve("POST", "/user/gopher");
        assert_eq!(outcome.status, 307);
        assert_eq!(outcome.location(), Some("/user/gopher/"));

        let outcome = engine.resolve("GET", "/x/");
        assert_eq!(outcome.status, 301);
        assert_eq!(outcome.location(), Some("/x"));
    }

    #[test]
    fn test_redirects_land_on_a_route() {
        let engine = engine_with(&[("GET", "/:id//*rest"), ("GET", "/s//"), ("GET", "/t//*rest")]);

        for path in ["/abc", "/abc/", "/ABC/", "/s/", "/t", "/t/"] {
            let outcome = engine.resolve("GET", path);
            if let Some(location) = outcome.location() {
                assert_eq!(
                    engine.resolve("GET", location).status,
                    200,
                    "{} redirected to {}",
                    path,
                    location
                );
            }
        }

        // removing the slash would miss, the fixed-path search appends one
        let outcome = engine.resolve("GET", "/abc/");
        assert!(!outcome.tsr);
        assert_eq!(outcome.location(), Some("/abc//"));
    }

    #[test]
    fn test_trailing_slash_redirect_disabled() {
        let mut builder = Engine::builder().with_config(EngineConfig {
            redirect_trailing_slash: false,
            ..Default::default()
        });
        builder.handle("GET", "/user/:name/", "profile").unwrap();
        let engine = builder.build();

        let outcome = engine.resolve("GET", "/user/gopher");
        assert_eq!(outcome.status, 404);
        assert_eq!(outcome.target, Target::Default);
        // the recommendation is still reported
        assert!(outcome.tsr);
    }

    #[test]
    fn test_method_not_allowed_vs_not_found() {
        let engine = engine_with(&[("POST", "/x"), ("DELETE", "/x"), ("GET", "/z")]);

        let outcome = engine.resolve("GET", "/x");
        assert_eq!(outcome.status, 405);
        assert_eq!(outcome.allowed, vec!["DELETE", "POST"]);
        assert_eq!(outcome.allow_header().as_deref(), Some("DELETE, POST"));
        assert_eq!(outcome.default_body(), "405 Method Not Allowed");

        let outcome = engine.resolve("GET", "/y");
        assert_eq!(outcome.status, 404);
        assert!(outcome.allowed.is_empty());
        assert_eq!(outcome.default_body(), "404 Not Found");

        // a method nobody registered
        let outcome = engine.resolve("PATCH", "/x");
        assert_eq!(outcome.status, 405);

        // the requested method never lists itself
        let outcome = engine.resolve("POST", "/z");
        assert_eq!(outcome.allowed, vec!["GET"]);
    }

    #[test]
    fn test_empty_engine() {
        let engine: Engine<()> = Engine::builder().build();

        let outcome = engine.resolve("GET", "/nope");
        assert_eq!(outcome.status, 404);
        assert!(!outcome.tsr);
        assert!(engine.methods().is_empty());
    }

    #[test]
    fn test_case_insensitive_redirect() {
        let engine = engine_with(&[("GET", "/User/Profile"), ("PUT", "/Docs/:page")]);

        let outcome = engine.resolve("GET", "/user/profile");
        assert_eq!(outcome.status, 301);
        assert_eq!(outcome.location(), Some("/User/Profile"));

        // the path is cleaned before the search
        let outcome = engine.resolve("GET", "/user//settings/../profile");
        assert_eq!(outcome.location(), Some("/User/Profile"));

        // a trailing slash is fixed along the way
        let outcome = engine.resolve("GET", "/USER/PROFILE/");
        assert_eq!(outcome.location(), Some("/User/Profile"));

        // parameter values keep the request's case
        let outcome = engine.resolve("PUT", "/docs/ReadMe");
        assert_eq!(outcome.status, 307);
        assert_eq!(outcome.location(), Some("/Docs/ReadMe"));
    }

    #[test]
    fn test_case_insensitive_redirect_disabled() {
        let mut builder = Engine::builder().with_config(
            EngineConfig::from_json(r#"{"redirect_fixed_path": false}"#).unwrap(),
        );
        builder.handle("GET", "/User/Profile", "profile").unwrap();
        let engine = builder.build();

        assert_eq!(engine.resolve("GET", "/user/profile").status, 404);
        assert_eq!(engine.resolve("GET", "/User/Profile").status, 200);
    }

    #[test]
    fn test_no_redirect_for_connect_or_root() {
        let engine = engine_with(&[("CONNECT", "/tunnel/"), ("GET", "//")]);

        let outcome = engine.resolve("CONNECT", "/tunnel");
        assert_eq!(outcome.status, 404);
        assert!(outcome.tsr);

        let outcome = engine.resolve("CONNECT", "/TUNNEL/");
        assert_eq!(outcome.status, 404);

        let outcome = engine.resolve("GET", "/");
        assert_eq!(outcome.status, 404);
        assert!(outcome.tsr);
    }

    #[test]
    fn test_status_handlers() {
        let mut builder = Engine::builder();
        builder.handle("GET", "/a", "route").unwrap();
        builder.status(404, "not found page").unwrap();
        builder.handle(STATUS, "/405/admin/*path", "admin 405").unwrap();
        builder.default_status("fallback");
        let engine = builder.build();

        let outcome = engine.resolve("GET", "/missing");
        assert_eq!(outcome.status, 404);
        assert_eq!(outcome.target, Target::Status(&"not found page"));
        assert_eq!(outcome.param("path"), "missing");

        let mut builder = Engine::builder();
        builder.handle("POST", "/admin/users", "create").unwrap();
        builder.handle("POST", "/users", "create").unwrap();
        builder.handle(STATUS, "/405/admin/*path", "admin 405").unwrap();
        builder.default_status("fallback");
        let engine = builder.build();

        let outcome = engine.resolve("GET", "/admin/users");
        assert_eq!(outcome.status, 405);
        assert_eq!(outcome.target, Target::Status(&"admin 405"));
        assert_eq!(outcome.allowed, vec!["POST"]);

        let outcome = engine.resolve("GET", "/users");
        assert_eq!(outcome.status, 405);
        assert_eq!(outcome.target, Target::Status(&"fallback"));
    }

    #[test]
    fn test_dispatch_success() {
        let mut builder: EngineBuilder<Handler> = Engine::builder();
        builder.handle("GET", "/user/:id", show_user).unwrap();
        let engine = builder.build();

        let dispatched = engine.dispatch("GET", "/user/42", run);
        assert_eq!(dispatched.outcome.status, 200);
        assert_eq!(dispatched.result.unwrap(), "user 42");

        let dispatched = engine.dispatch("GET", "/nowhere", run);
        assert_eq!(dispatched.outcome.status, 404);
        assert_eq!(dispatched.result.unwrap(), "404 Not Found");
    }

    #[test]
    fn test_dispatch_recovers_error() {
        let mut builder: EngineBuilder<Handler> = Engine::builder();
        builder.handle("GET", "/user/:id", failing).unwrap();
        builder.status(500, render_500).unwrap();
        let engine = builder.build();

        let dispatched = engine.dispatch("GET", "/user/42", run);
        assert_eq!(dispatched.outcome.status, 500);
        assert_eq!(dispatched.outcome.param("path"), "user/42");

        let failure = dispatched.outcome.failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Error);
        assert_eq!(failure.message, "loading user");
        assert!(failure.detail.contains("database unavailable"));
        assert!(failure.detail.starts_with("while handling GET /user/42 (200)"));

        assert_eq!(dispatched.result.unwrap(), "500: loading user");
    }

    #[test]
    fn test_dispatch_recovers_panic() {
        let mut builder: EngineBuilder<Handler> = Engine::builder();
        builder.handle("GET", "/boom", panicking).unwrap();
        let engine = builder.build();

        let dispatched = engine.dispatch("GET", "/boom", run);
        assert_eq!(dispatched.outcome.status, 500);
        assert!(matches!(dispatched.outcome.target, Target::Default));

        let failure = dispatched.outcome.failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::Panic);
        assert_eq!(failure.message, "boom");
        assert_ne!(failure.detail, failure.message);
        assert!(failure.detail.starts_with("while handling GET /boom (200): boom"));
        assert!(failure.detail.contains("panicked at src/lib.rs:"));
        assert_eq!(dispatched.result.unwrap(), "500 Internal Server Error");
    }

    #[test]
    fn test_dispatch_failing_500_handler() {
        let mut builder: EngineBuilder<Handler> = Engine::builder();
        builder.handle("GET", "/boom", panicking).unwrap();
        builder.status(500, failing).unwrap();
        let engine = builder.build();

        let dispatched = engine.dispatch("GET", "/boom", run);
        assert_eq!(dispatched.outcome.status, 500);
        assert_eq!(dispatched.outcome.failure.as_ref().unwrap().kind, FailureKind::Panic);

        let failure = dispatched.result.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Error);
        assert_eq!(failure.message, "loading user");
    }

    #[test]
    fn test_lookups_are_repeatable() {
        let routes = [
            ("GET", "/"),
            ("GET", "/a"),
            ("GET", "/b/:id"),
            ("GET", "/b/:id/edit"),
            ("GET", "/c/*rest"),
            ("GET", "/ab"),
        ];
        let engine = engine_with(&routes);

        let paths = ["/", "/a", "/ab", "/b/1", "/b/1/edit", "/c/x/y", "/zz", "/a/", "/AB"];
        let first: Vec<(u16, Option<String>, Params)> = paths
            .iter()
            .map(|p| {
                let o = engine.resolve("GET", p);
                (o.status, o.handler().cloned(), o.params)
            })
            .collect();

        for _ in 0..10 {
            for (path, expected) in paths.iter().zip(&first) {
                let o = engine.resolve("GET", path);
                assert_eq!((o.status, o.handler().cloned(), o.params), *expected);
            }
        }
    }

    #[test]
    fn test_registration_order_does_not_matter() {
        let routes = [
            ("GET", "/src/*filepath"),
            ("GET", "/search/"),
            ("GET", "/search/:query"),
            ("GET", "/cmd/:tool/"),
            ("GET", "/cmd/:tool/:sub"),
            ("GET", "/user/new"),
            ("GET", "/user/:id"),
        ];
        let mut reversed = routes;
        reversed.reverse();

        let a = engine_with(&routes);
        let b = engine_with(&reversed);

        let paths = [
            "/src/a/b",
            "/search/",
            "/search/go",
            "/search/go/",
            "/cmd/vet",
            "/cmd/vet/",
            "/cmd/vet/x",
            "/user/new",
            "/user/newer",
            "/SRC/A",
            "/nothing",
        ];
        for path in paths {
            let x = a.resolve("GET", path);
            let y = b.resolve("GET", path);
            assert_eq!(x.status, y.status, "{}", path);
            assert_eq!(x.handler(), y.handler(), "{}", path);
            assert_eq!(x.location(), y.location(), "{}", path);
            assert_eq!(x.params, y.params, "{}", path);
        }
    }

    #[test]
    fn test_round_trip_with_route_patterns() {
        let patterns = [
            "/",
            "/api/users",
            "/api/user/:id",
            "/api/user/:id/posts/:post",
            "/user_:name/about",
            "/files/:bucket/*key",
        ];
        let mut builder = Engine::builder();
        for pattern in patterns {
            builder.handle("GET", pattern, pattern).unwrap();
        }
        let engine = builder.build();

        let values = ["alpha", "b2", "c-3"];
        for pattern in patterns {
            let route = RoutePattern::new("GET", pattern).unwrap();
            let url = route.url(&values);

            let outcome = engine.resolve("GET", &url);
            assert_eq!(outcome.handler(), Some(&pattern), "{}", url);
            assert_eq!(Some(outcome.params.clone()), route.captures(&url), "{}", url);

            // reverse routing from the captured params gives the same URL
            assert_eq!(route.url_from(&outcome.params).unwrap(), url);
        }
    }

    #[test]
    fn test_concurrent_resolution() {
        let mut builder = Engine::builder();
        for i in 0..100 {
            builder
                .handle("GET", &format!("/api/v{}/users/:id", i), i)
                .unwrap();
        }
        let engine = Arc::new(builder.build());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for i in 0..100 {
                        let id = format!("{}-{}", t, i);
                        let outcome = engine.resolve("GET", &format!("/api/v{}/users/{}", i, id));
                        assert_eq!(outcome.handler(), Some(&i));
                        assert_eq!(outcome.param("id"), id);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine<String>>();
        assert_send_sync::<Engine<Handler>>();
        assert_send_sync::<Tree<String>>();
    }
}

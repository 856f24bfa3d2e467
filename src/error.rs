//! Route configuration errors

use thiserror::Error;

/// Error raised while registering a route.
///
/// Every variant is a setup mistake. Registration stops at the first one;
/// routes registered before the failing call keep resolving as before.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The path does not start with `/`
    #[error("path must begin with '/', got '{path}'")]
    InvalidPath { path: String },

    /// A handler is already registered for this exact path
    #[error("a handler is already registered for path '{path}'")]
    Duplicate { path: String },

    /// Two different wildcards at the same position
    #[error("wildcard segment '{segment}' in path '{path}' conflicts with existing wildcard '{existing}'")]
    WildcardConflict {
        path: String,
        segment: String,
        existing: String,
    },

    /// A catch-all and a `/`-led static route would share one segment root
    #[error("catch-all in path '{path}' conflicts with existing routes for the same segment root")]
    CatchAllConflict { path: String },

    /// `:` or `*` without a name
    #[error("wildcards must be named with a non-empty name in path '{path}'")]
    UnnamedWildcard { path: String },

    /// More than one wildcard inside a single segment, e.g. `/:a:b`
    #[error("only one wildcard per path segment is allowed in path '{path}'")]
    MultipleWildcards { path: String },

    /// `*name` followed by more path
    #[error("catch-all routes are only allowed at the end of the path in '{path}'")]
    CatchAllNotLast { path: String },

    /// `*name` not preceded by `/`
    #[error("no '/' before catch-all in path '{path}'")]
    MissingSlashBeforeCatchAll { path: String },
}

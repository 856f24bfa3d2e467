//! Route metadata: method sets, route names and reverse URLs

use crate::error::RouteError;
use crate::params::Params;
use anyhow::{Context, Result};
use bitflags::bitflags;
use regex::Regex;

bitflags! {
    /// HTTP methods represented as bit flags, for registering one handler
    /// under several methods at once
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct HttpMethod: u16 {
        const GET     = 1 << 0;
        const POST    = 1 << 1;
        const PUT     = 1 << 2;
        const DELETE  = 1 << 3;
        const PATCH   = 1 << 4;
        const HEAD    = 1 << 5;
        const OPTIONS = 1 << 6;
        const CONNECT = 1 << 7;
        const TRACE   = 1 << 8;
    }
}

impl HttpMethod {
    /// Parse a method token. Tokens are case-sensitive, `get` is not `GET`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            "CONNECT" => Some(HttpMethod::CONNECT),
            "TRACE" => Some(HttpMethod::TRACE),
            _ => None,
        }
    }

    /// Parse several method tokens, unknown ones are skipped
    pub fn from_slice(methods: &[&str]) -> Self {
        let mut result = HttpMethod::empty();
        for method in methods {
            if let Some(m) = Self::from_str(method) {
                result |= m;
            }
        }
        result
    }

    /// Method tokens of every flag in the set
    pub fn tokens(&self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Param,
    CatchAll,
}

/// A registered path pattern together with its method.
///
/// Gives a route a stable name, builds concrete URLs from parameter values
/// and carries a regex matcher that captures the same values the tree does.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    method: String,
    pattern: String,
    regex: Regex,
    names: Vec<(String, Segment)>,
}

impl RoutePattern {
    pub fn new(method: &str, pattern: &str) -> Result<Self> {
        if !pattern.starts_with('/') {
            return Err(RouteError::InvalidPath {
                path: pattern.to_string(),
            })
            .with_context(|| format!("Invalid route pattern for {}", method));
        }

        let (regex, names) = generate_pattern(pattern)?;

        Ok(Self {
            method: method.to_string(),
            pattern: pattern.to_string(),
            regex,
            names,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Names of the wildcards, left to right
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|(name, _)| name.as_str())
    }

    /// Route name derived from the pattern and method.
    ///
    /// Segments are joined with `\`, parameter segments become `{p}`, the
    /// catch-all becomes `{s}` and the lower-cased method is appended, so
    /// `GET /one/:route` is named `\one\{p}\get`.
    pub fn name(&self) -> String {
        let mut parts: Vec<&str> = self
            .pattern
            .split('/')
            .map(|part| {
                if part.contains('*') {
                    "{s}"
                } else if part.contains(':') {
                    "{p}"
                } else {
                    part
                }
            })
            .collect();

        let method = self.method.to_lowercase();
        parts.push(&method);
        parts.join("\\")
    }

    /// Build a concrete path from positional values.
    ///
    /// Parameters take one value each, missing ones are left empty. A
    /// catch-all absorbs every remaining value, joined with `/`.
    pub fn url(&self, values: &[&str]) -> String {
        let mut values = values.iter();
        let mut url = String::with_capacity(self.pattern.len());

        for (i, part) in self.pattern.split('/').enumerate() {
            if i > 0 {
                url.push('/');
            }
            match wildcard_start(part) {
                Some((start, Segment::Param)) => {
                    url.push_str(&part[..start]);
                    url.push_str(values.next().copied().unwrap_or_default());
                }
                Some((start, Segment::CatchAll)) => {
                    url.push_str(&part[..start]);
                    let rest: Vec<&str> = values.by_ref().copied().collect();
                    url.push_str(&rest.join("/"));
                }
                None => url.push_str(part),
            }
        }

        url
    }

    /// Build a concrete path from named values, every wildcard must be
    /// present in `params`
    pub fn url_from(&self, params: &Params) -> Result<String> {
        let mut values = Vec::with_capacity(self.names.len());
        for (name, _) in &self.names {
            let value = params
                .get(name)
                .with_context(|| format!("Missing value for '{}' in route {}", name, self.pattern))?;
            values.push(value);
        }
        Ok(self.url(&values))
    }

    /// Match `path` against the pattern with the compiled regex
    pub fn captures(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::with_capacity(self.names.len());

        for (i, (name, kind)) in self.names.iter().enumerate() {
            let value = caps.get(i + 1).map_or("", |m| m.as_str());
            params.push(name.as_str(), value);
            if *kind == Segment::CatchAll {
                break;
            }
        }

        Some(params)
    }
}

fn wildcard_start(part: &str) -> Option<(usize, Segment)> {
    part.find([':', '*']).map(|start| {
        let kind = if part.as_bytes()[start] == b'*' {
            Segment::CatchAll
        } else {
            Segment::Param
        };
        (start, kind)
    })
}

fn generate_pattern(path: &str) -> Result<(Regex, Vec<(String, Segment)>)> {
    let mut names = Vec::new();
    let mut pattern_parts = Vec::new();

    for part in path.split('/') {
        match wildcard_start(part) {
            Some((start, kind)) => {
                let name = &part[start + 1..];
                if name.is_empty() {
                    return Err(RouteError::UnnamedWildcard {
                        path: path.to_string(),
                    })
                    .context("Failed to build route pattern");
                }
                names.push((name.to_string(), kind));

                let capture = match kind {
                    Segment::Param => r"([^/]+)",
                    Segment::CatchAll => r"(.*)",
                };
                pattern_parts.push(format!("{}{}", regex::escape(&part[..start]), capture));
            }
            None => pattern_parts.push(regex::escape(part)),
        }
    }

    let pattern_str = format!("^{}$", pattern_parts.join("/"));
    let pattern = Regex::new(&pattern_str)
        .with_context(|| format!("Failed to compile regex pattern for path: {}", path))?;

    Ok((pattern, names))
}

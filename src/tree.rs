//! Radix tree holding the routes of one HTTP method
//!
//! Each node stores a path fragment. Static children are indexed by their
//! first byte in `indices`, kept in descending priority order so that hot
//! branches are scanned first. A node may additionally own one wildcard
//! child (a `:name` parameter or a trailing `/*name` catch-all), which is
//! always stored at `children[0]` and flagged by `wild_child`.
//!
//! Lookups try the static child first and fall back to the wildcard child,
//! so `/user/new` and `/user/:id` can live side by side.

use crate::error::RouteError;
use crate::params::Params;
use std::cmp::max;
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Static,
    /// `:name`, captures one segment
    Param,
    /// `/*name`, captures the rest of the path
    CatchAll,
}

#[derive(Debug, Clone)]
struct Node<T> {
    prefix: Vec<u8>,
    kind: NodeKind,
    wild_child: bool,
    indices: Vec<u8>,
    children: Vec<Node<T>>,
    value: Option<T>,
    priority: u32,
    max_params: usize,
}

/// Result of [`Tree::get_value`]
#[derive(Debug, Clone)]
pub struct Lookup<'a, T> {
    /// The handler registered for the path, if any
    pub value: Option<&'a T>,
    /// Captured wildcard values, empty when nothing matched
    pub params: Params,
    /// Toggling one trailing slash on the path would hit a handler
    pub tsr: bool,
}

/// The route set of a single HTTP method.
///
/// Routes are only ever added. Once registration is over the tree is
/// read-only and can be shared between threads.
#[derive(Debug, Clone)]
pub struct Tree<T> {
    root: Node<T>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Self {
            root: Node::new(NodeKind::Static),
        }
    }

    /// True when no route has been registered yet
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Register `value` for the path pattern `path`.
    ///
    /// Patterns are literal bytes with two kinds of wildcards:
    /// - `:name` matches a single, non-empty segment
    /// - `/*name` at the very end matches everything after the slash
    ///
    /// Errors on malformed wildcards, on a second handler for the same
    /// pattern and on wildcards that would clash with existing routes. A
    /// failed call never removes or shadows a route registered earlier.
    /// Malformed patterns are rejected before the tree is touched; a clash
    /// found mid-walk may leave an edge split and raised priorities on the
    /// nodes already passed. Those only affect child order, never a result.
    pub fn add_route(&mut self, path: &str, value: T) -> Result<(), RouteError> {
        validate(path)?;
        let full = path.as_bytes();

        if self.root.is_empty() {
            self.root.priority = 1;
            self.root.max_params = count_params(full);
            self.root.insert_child(full, value);
            return Ok(());
        }

        let mut current = &mut self.root;
        current.priority += 1;
        let mut rest = full;

        loop {
            current.max_params = max(current.max_params, count_params(rest));

            let common = longest_common_prefix(rest, &current.prefix);
            if common < current.prefix.len() {
                current.split(common);
            }

            // the path ends exactly at this node
            if common == rest.len() {
                if current.value.is_some() {
                    return Err(RouteError::Duplicate { path: path.into() });
                }
                current.value = Some(value);
                return Ok(());
            }

            rest = &rest[common..];

            // trailing catch-all hanging off this node
            if rest.starts_with(b"/*") {
                if current.wild_child {
                    let wild = &current.children[0];
                    if wild.kind == NodeKind::CatchAll && wild.prefix == rest {
                        return Err(RouteError::Duplicate { path: path.into() });
                    }
                    return Err(RouteError::WildcardConflict {
                        path: path.into(),
                        segment: lossy(rest),
                        existing: lossy(&wild.prefix),
                    });
                }
                if current.indices.contains(&b'/') {
                    return Err(RouteError::CatchAllConflict { path: path.into() });
                }
                current.attach_catch_all(rest, value);
                return Ok(());
            }

            match rest[0] {
                // the '/' in front of the catch-all is already part of this
                // node, which serves other routes
                b'*' => return Err(RouteError::CatchAllConflict { path: path.into() }),
                b':' => {
                    let segment = &rest[..segment_end(rest)];
                    if !current.wild_child {
                        current.attach_param(rest, value);
                        return Ok(());
                    }

                    // only the very same parameter may be shared, `:id` and
                    // `:identifier` at one position are ambiguous
                    let wild = &current.children[0];
                    if wild.kind != NodeKind::Param || wild.prefix != segment {
                        return Err(RouteError::WildcardConflict {
                            path: path.into(),
                            segment: lossy(segment),
                            existing: lossy(&wild.prefix),
                        });
                    }

                    current = &mut current.children[0];
                    current.priority += 1;
                }
                next => {
                    if next == b'/' && current.has_catch_all() {
                        return Err(RouteError::CatchAllConflict { path: path.into() });
                    }

                    if let Some(i) = current.indices.iter().position(|&c| c == next) {
                        let i = current.bump_child_priority(i);
                        let idx = current.static_slot(i);
                        current = &mut current.children[idx];
                        continue;
                    }

                    current.indices.push(next);
                    current.children.push(Node {
                        max_params: count_params(rest),
                        ..Node::new(NodeKind::Static)
                    });
                    let i = current.bump_child_priority(current.indices.len() - 1);
                    let idx = current.static_slot(i);
                    current.children[idx].insert_child(rest, value);
                    return Ok(());
                }
            }
        }
    }

    /// Resolve a concrete request path.
    ///
    /// On a miss `value` is `None`, `params` is empty and `tsr` tells
    /// whether adding or removing one trailing slash would have matched.
    pub fn get_value(&self, path: &str) -> Lookup<'_, T> {
        let mut params = Params::new();
        let mut tsr = false;

        match self.root.find(path.as_bytes(), &mut params, &mut tsr) {
            Some(value) => Lookup {
                value: Some(value),
                params,
                tsr: false,
            },
            None => {
                params.clear();
                Lookup {
                    value: None,
                    params,
                    tsr,
                }
            }
        }
    }

    /// Case-insensitive variant of [`get_value`](Self::get_value) that
    /// returns the path with the registered casing.
    ///
    /// Only ASCII letters are folded. Captured wildcard values keep the
    /// casing of the request. With `fix_trailing_slash` a single missing or
    /// superfluous trailing slash is corrected as well.
    pub fn find_case_insensitive_path(&self, path: &str, fix_trailing_slash: bool) -> Option<String> {
        let mut fixed = Vec::with_capacity(path.len() + 1);
        if self.root.find_ci(path.as_bytes(), &mut fixed, fix_trailing_slash) {
            String::from_utf8(fixed).ok()
        } else {
            None
        }
    }
}

impl<T> Node<T> {
    fn new(kind: NodeKind) -> Self {
        Self {
            prefix: Vec::new(),
            kind,
            wild_child: false,
            indices: Vec::new(),
            children: Vec::new(),
            value: None,
            priority: 0,
            max_params: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.children.is_empty() && self.value.is_none()
    }

    fn has_catch_all(&self) -> bool {
        self.wild_child && self.children[0].kind == NodeKind::CatchAll
    }

    /// Position in `children` of the static child at `indices[i]`
    fn static_slot(&self, i: usize) -> usize {
        i + usize::from(self.wild_child)
    }

    fn static_child(&self, c: u8) -> Option<&Node<T>> {
        self.indices
            .iter()
            .position(|&idx| idx == c)
            .map(|i| &self.children[self.static_slot(i)])
    }

    // Increments the priority of the static child at `indices[i]` and moves
    // it left past every neighbour with a lower priority.
    //
    // Returns the new index of the child.
    fn bump_child_priority(&mut self, i: usize) -> usize {
        let offset = usize::from(self.wild_child);
        self.children[offset + i].priority += 1;
        let priority = self.children[offset + i].priority;

        let mut pos = i;
        while pos > 0 && self.children[offset + pos - 1].priority < priority {
            self.children.swap(offset + pos - 1, offset + pos);
            self.indices.swap(pos - 1, pos);
            pos -= 1;
        }

        pos
    }

    // Keeps `prefix[..at]` here and moves everything else into a new child.
    fn split(&mut self, at: usize) {
        let suffix = self.prefix.split_off(at);
        let children = mem::take(&mut self.children);
        let max_params = children.iter().map(|c| c.max_params).max().unwrap_or(0);

        let child = Node {
            indices: mem::take(&mut self.indices),
            wild_child: mem::replace(&mut self.wild_child, false),
            value: self.value.take(),
            priority: self.priority.saturating_sub(1),
            children,
            max_params,
            prefix: suffix,
            kind: NodeKind::Static,
        };

        self.indices = vec![child.prefix[0]];
        self.children = vec![child];
    }

    // Fills a fresh static node with `path`, creating the wildcard chain
    // below it as needed.
    fn insert_child(&mut self, path: &[u8], value: T) {
        match find_wildcard(path) {
            None => {
                self.prefix = path.to_vec();
                self.value = Some(value);
            }
            Some((start, b':')) => {
                self.prefix = path[..start].to_vec();
                self.attach_param(&path[start..], value);
            }
            Some((start, _)) => {
                // the catch-all owns the '/' in front of it
                let slash = start.saturating_sub(1);
                self.prefix = path[..slash].to_vec();
                self.attach_catch_all(&path[slash..], value);
            }
        }
    }

    // `path` starts with ':'
    fn attach_param(&mut self, path: &[u8], value: T) {
        let end = segment_end(path);
        let mut child = Node {
            prefix: path[..end].to_vec(),
            priority: 1,
            max_params: count_params(path),
            ..Node::new(NodeKind::Param)
        };

        let rest = &path[end..];
        if rest.starts_with(b"/*") {
            child.attach_catch_all(rest, value);
        } else if !rest.is_empty() {
            let mut next = Node {
                priority: 1,
                max_params: count_params(rest),
                ..Node::new(NodeKind::Static)
            };
            next.insert_child(rest, value);
            child.indices.push(b'/');
            child.children.push(next);
        } else {
            child.value = Some(value);
        }

        self.children.insert(0, child);
        self.wild_child = true;
    }

    // `path` is the final `/*name` segment
    fn attach_catch_all(&mut self, path: &[u8], value: T) {
        let child = Node {
            prefix: path.to_vec(),
            value: Some(value),
            priority: 1,
            max_params: 1,
            ..Node::new(NodeKind::CatchAll)
        };

        self.children.insert(0, child);
        self.wild_child = true;
    }

    fn find<'n>(&'n self, path: &[u8], params: &mut Params, tsr: &mut bool) -> Option<&'n T> {
        match self.kind {
            NodeKind::Static => {
                let n = self.prefix.len();
                if path.len() > n && path.starts_with(&self.prefix) {
                    self.find_below(&path[n..], params, tsr)
                } else if path == self.prefix.as_slice() {
                    self.value_or_tsr(path.ends_with(b"/"), tsr)
                } else {
                    // the path lacks only the trailing slash of this leaf
                    if self.value.is_some()
                        && !path.ends_with(b"/")
                        && n == path.len() + 1
                        && self.prefix[n - 1] == b'/'
                        && self.prefix.starts_with(path)
                    {
                        *tsr = true;
                    }
                    None
                }
            }
            NodeKind::Param => {
                let end = segment_end(path);
                if end == 0 {
                    return None;
                }

                if params.is_empty() {
                    params.reserve(self.max_params);
                }
                params.push(lossy(&self.prefix[1..]), lossy(&path[..end]));

                if end < path.len() {
                    self.find_below(&path[end..], params, tsr)
                } else {
                    // a segment value never ends in '/'
                    self.value_or_tsr(false, tsr)
                }
            }
            NodeKind::CatchAll => {
                if path.first() != Some(&b'/') {
                    return None;
                }

                if params.is_empty() {
                    params.reserve(self.max_params);
                }
                params.push(lossy(&self.prefix[2..]), lossy(&path[1..]));
                self.value.as_ref()
            }
        }
    }

    // `rest` is the non-empty remainder after this node's own fragment
    fn find_below<'n>(&'n self, rest: &[u8], params: &mut Params, tsr: &mut bool) -> Option<&'n T> {
        if let Some(child) = self.static_child(rest[0]) {
            let mark = params.len();
            if let Some(value) = child.find(rest, params, tsr) {
                return Some(value);
            }
            params.truncate(mark);
        }

        if self.wild_child {
            let mark = params.len();
            if let Some(value) = self.children[0].find(rest, params, tsr) {
                return Some(value);
            }
            params.truncate(mark);
        }

        // only a superfluous trailing slash is left
        if rest == b"/" && self.value.is_some() {
            *tsr = true;
        }
        None
    }

    // Both recommendations below append a slash, which a path that already
    // ends in one cannot take.
    fn value_or_tsr(&self, trailing_slash: bool, tsr: &mut bool) -> Option<&T> {
        if self.value.is_some() {
            return self.value.as_ref();
        }
        if trailing_slash {
            return None;
        }

        if let Some(child) = self.static_child(b'/') {
            if child.prefix == b"/" && child.value.is_some() {
                *tsr = true;
            }
        }
        if self.has_catch_all() {
            *tsr = true;
        }
        None
    }

    fn find_ci(&self, path: &[u8], fixed: &mut Vec<u8>, fix_trailing_slash: bool) -> bool {
        match self.kind {
            NodeKind::Static => {
                let n = self.prefix.len();
                if path.len() >= n && path[..n].eq_ignore_ascii_case(&self.prefix) {
                    fixed.extend_from_slice(&self.prefix);
                    let rest = &path[n..];
                    if rest.is_empty() {
                        self.ci_leaf(fixed, fix_trailing_slash)
                    } else {
                        self.ci_below(rest, fixed, fix_trailing_slash)
                    }
                } else if fix_trailing_slash
                    && self.value.is_some()
                    && n == path.len() + 1
                    && self.prefix[n - 1] == b'/'
                    && path.eq_ignore_ascii_case(&self.prefix[..n - 1])
                {
                    fixed.extend_from_slice(&self.prefix);
                    true
                } else {
                    false
                }
            }
            NodeKind::Param => {
                let end = segment_end(path);
                if end == 0 {
                    return false;
                }
                fixed.extend_from_slice(&path[..end]);

                let rest = &path[end..];
                if rest.is_empty() {
                    self.ci_leaf(fixed, fix_trailing_slash)
                } else {
                    self.ci_below(rest, fixed, fix_trailing_slash)
                }
            }
            NodeKind::CatchAll => {
                if path.first() != Some(&b'/') {
                    return false;
                }
                fixed.extend_from_slice(path);
                true
            }
        }
    }

    fn ci_leaf(&self, fixed: &mut Vec<u8>, fix_trailing_slash: bool) -> bool {
        if self.value.is_some() {
            return true;
        }
        if !fix_trailing_slash {
            return false;
        }

        let slash_leaf = self
            .static_child(b'/')
            .is_some_and(|child| child.prefix == b"/" && child.value.is_some());
        if slash_leaf || self.has_catch_all() {
            fixed.push(b'/');
            return true;
        }
        false
    }

    fn ci_below(&self, rest: &[u8], fixed: &mut Vec<u8>, fix_trailing_slash: bool) -> bool {
        let mark = fixed.len();
        let first = rest[0].to_ascii_lowercase();

        // both 'a' and 'A' may be registered, every candidate has to be tried
        for (i, &c) in self.indices.iter().enumerate() {
            if c.to_ascii_lowercase() != first {
                continue;
            }
            if self.children[self.static_slot(i)].find_ci(rest, fixed, fix_trailing_slash) {
                return true;
            }
            fixed.truncate(mark);
        }

        if self.wild_child {
            if self.children[0].find_ci(rest, fixed, fix_trailing_slash) {
                return true;
            }
            fixed.truncate(mark);
        }

        fix_trailing_slash && rest == b"/" && self.value.is_some()
    }
}

fn longest_common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn segment_end(path: &[u8]) -> usize {
    path.iter().position(|&c| c == b'/').unwrap_or(path.len())
}

fn count_params(path: &[u8]) -> usize {
    path.iter().filter(|&&c| c == b':' || c == b'*').count()
}

fn find_wildcard(path: &[u8]) -> Option<(usize, u8)> {
    path.iter()
        .position(|&c| c == b':' || c == b'*')
        .map(|i| (i, path[i]))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// Checks every wildcard of `path` before the tree is touched.
fn validate(path: &str) -> Result<(), RouteError> {
    let bytes = path.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c != b':' && c != b'*' {
            i += 1;
            continue;
        }

        let end = i + 1 + segment_end(&bytes[i + 1..]);
        let name = &bytes[i + 1..end];

        if name.is_empty() {
            return Err(RouteError::UnnamedWildcard { path: path.into() });
        }
        if name.iter().any(|&c| c == b':' || c == b'*') {
            return Err(RouteError::MultipleWildcards { path: path.into() });
        }
        if c == b'*' {
            if end != bytes.len() {
                return Err(RouteError::CatchAllNotLast { path: path.into() });
            }
            if i == 0 || bytes[i - 1] != b'/' {
                return Err(RouteError::MissingSlashBeforeCatchAll { path: path.into() });
            }
        }

        i = end;
    }

    Ok(())
}

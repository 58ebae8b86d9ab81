//! Path router: route table, specificity matching and (in [`browser`]) history integration.
//!
//! Matching is a pure function of `(path, table)`:
//! 1. a pattern equal to the path wins outright with no params;
//! 2. otherwise candidates are tried by specificity: parameterized before literal, deeper
//!    parameterized before shallower, `*` and `/` last;
//! 3. otherwise the wildcard route, then the root route.

pub mod browser;
pub mod links;

pub use browser::PathRouter;

use std::cmp::Reverse;
use std::collections::BTreeMap;

pub type RouteParams = BTreeMap<String, String>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub params: RouteParams,
}

/// What the UI needs to know about the committed location.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CurrentRoute {
    pub path: String,
    /// Pattern that matched; empty when nothing (not even a fallback) is registered.
    pub pattern: String,
    pub params: RouteParams,
}

pub struct Resolved<'a, H> {
    pub pattern: &'a str,
    pub handler: &'a H,
    pub params: RouteParams,
    /// Reached through the wildcard/root fallback rather than a real match.
    pub fallback: bool,
}

/// Pattern -> handler, in registration order.
pub struct RouteTable<H> {
    routes: Vec<(String, H)>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> RouteTable<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, pattern: &str, handler: H) -> Self {
        self.insert(pattern, handler);
        self
    }

    /// Register a pattern. Registering the same pattern again replaces its handler but keeps its
    /// original position.
    pub fn insert(&mut self, pattern: &str, handler: H) {
        let pattern = normalize_pattern(pattern);
        match self.routes.iter_mut().find(|(p, _)| *p == pattern) {
            Some(slot) => slot.1 = handler,
            None => self.routes.push((pattern, handler)),
        }
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn resolve(&self, path: &str) -> Option<Resolved<'_, H>> {
        let path = normalize_path(path);

        if let Some((pattern, handler)) = self
            .routes
            .iter()
            .find(|(p, _)| !is_wildcard(p) && *p == path)
        {
            return Some(Resolved {
                pattern,
                handler,
                params: RouteParams::new(),
                fallback: false,
            });
        }

        let mut candidates: Vec<&(String, H)> =
            self.routes.iter().filter(|(p, _)| *p != path).collect();
        candidates.sort_by_key(|(p, _)| specificity(p));

        for (pattern, handler) in candidates {
            if is_wildcard(pattern) {
                continue;
            }
            let m = match_pattern(pattern, &path);
            if m.matched {
                return Some(Resolved {
                    pattern,
                    handler,
                    params: m.params,
                    fallback: false,
                });
            }
        }

        self.routes
            .iter()
            .find(|(p, _)| is_wildcard(p))
            .or_else(|| self.routes.iter().find(|(p, _)| p == "/"))
            .map(|(pattern, handler)| Resolved {
                pattern,
                handler,
                params: RouteParams::new(),
                fallback: true,
            })
    }

    pub fn current_for(&self, path: &str) -> CurrentRoute {
        let path = normalize_path(path);
        match self.resolve(&path) {
            Some(r) => CurrentRoute {
                pattern: r.pattern.to_string(),
                params: r.params,
                path,
            },
            None => CurrentRoute {
                path,
                ..Default::default()
            },
        }
    }
}

/// Sort key: lower sorts first.
fn specificity(pattern: &str) -> (u8, Reverse<usize>) {
    if is_wildcard(pattern) || pattern == "/" {
        return (2, Reverse(0));
    }
    if segments(pattern).any(|s| s.starts_with(':')) {
        (0, Reverse(segments(pattern).count()))
    } else {
        (1, Reverse(0))
    }
}

fn is_wildcard(pattern: &str) -> bool {
    pattern == "*" || pattern == "/*"
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Segment-wise match of one pattern against a normalized path.
pub fn match_pattern(pattern: &str, path: &str) -> MatchResult {
    let pat: Vec<&str> = segments(pattern).collect();
    let got: Vec<&str> = segments(path).collect();
    if pat.len() != got.len() {
        return MatchResult::default();
    }

    let mut params = RouteParams::new();
    for (p, g) in pat.iter().zip(got.iter()) {
        if let Some(name) = p.strip_prefix(':') {
            params.insert(name.to_string(), decode_segment(g));
        } else if p != g {
            return MatchResult::default();
        }
    }

    MatchResult {
        matched: true,
        params,
    }
}

fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Drop query and fragment, force a leading `/`, drop a trailing `/` (except for the root).
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or("").trim();
    let mut out = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        out.push('/');
    }
    out.push_str(path);
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

fn normalize_pattern(pattern: &str) -> String {
    let pattern = pattern.trim();
    if is_wildcard(pattern) {
        return pattern.to_string();
    }
    normalize_path(pattern)
}

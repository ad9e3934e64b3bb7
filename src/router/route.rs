//! Registered routes and the groups captured when one matches.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::parser::{HttpRequest, Method};
use crate::router::reply::{HandlerError, Reply};

/// Type-erased request handler stored in a [`Route`].
pub type HandlerFn = Arc<dyn Fn(&HttpRequest, &Params) -> Result<Reply, HandlerError> + Send + Sync>;

/// Groups captured by a regex route, in left-to-right order.
///
/// Named groups can be read by name as well as by position. A group that did
/// not take part in the match reads as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: Vec<String>,
    names: Vec<Option<String>>,
}

impl Params {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The group at `index`, counting from zero and excluding the whole match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    /// The named group `name`.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .and_then(|index| self.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.values
    }
}

/// A registered (method set, path pattern, handler) triple.
#[derive(Clone)]
pub struct Route {
    methods: Vec<Method>,
    pattern: String,
    regex: Option<Regex>,
    handler: HandlerFn,
}

impl Route {
    /// Build a route. The pattern is trimmed and compiled as a
    /// case-insensitive regex anchored at both ends; a pattern that does not
    /// compile only ever matches literally.
    pub(crate) fn new(methods: Vec<Method>, pattern: &str, handler: HandlerFn) -> Self {
        let pattern = pattern.trim().to_string();
        let regex = match RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()
        {
            Ok(regex) => Some(regex),
            Err(e) => {
                log::debug!("Pattern {pattern:?} is not a valid regex, matching literally: {e}");
                None
            }
        };

        Self {
            methods,
            pattern,
            regex,
            handler,
        }
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Match `path` against this route's pattern.
    ///
    /// Exact equality wins without capturing anything; otherwise the regex
    /// decides and its groups are returned.
    pub fn captures(&self, path: &str) -> Option<Params> {
        if path == self.pattern {
            return Some(Params::default());
        }

        let regex = self.regex.as_ref()?;
        let captures = regex.captures(path)?;

        let values = captures
            .iter()
            .skip(1)
            .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
            .collect();
        let names = regex
            .capture_names()
            .skip(1)
            .map(|name| name.map(str::to_string))
            .collect();

        Some(Params { values, names })
    }

    pub(crate) fn call(&self, request: &HttpRequest, params: &Params) -> Result<Reply, HandlerError> {
        (self.handler)(request, params)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful route lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub params: Params,
}

impl RouteMatch<'_> {
    pub fn pattern(&self) -> &str {
        self.route.pattern()
    }

    pub(crate) fn call(&self, request: &HttpRequest) -> Result<Reply, HandlerError> {
        self.route.call(request, &self.params)
    }
}

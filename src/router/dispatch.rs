//! The route table and request dispatch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, warn};

use crate::parser::{HttpRequest, Method};
use crate::router::reply::{HandlerError, Reply};
use crate::router::route::{Params, Route, RouteMatch};
use crate::server::{Error, HttpResponse, StatusCode};

/// Server name reported when an app does not choose its own.
pub const DEFAULT_SERVER_NAME: &str = "AppHttpServerMock";

/// Header naming the server implementation, set on every response.
pub const SERVER_HEADER: &str = "X-Server";

/// One or more HTTP verbs, as accepted by route registration.
pub trait IntoMethods {
    fn into_methods(self) -> Result<Vec<Method>, Error>;
}

fn normalize(name: &str) -> Result<Method, Error> {
    Method::normalized(name).map_err(|_| Error::Config(format!("{name:?} is not a valid HTTP method")))
}

impl IntoMethods for &str {
    fn into_methods(self) -> Result<Vec<Method>, Error> {
        Ok(vec![normalize(self)?])
    }
}

impl IntoMethods for &[&str] {
    fn into_methods(self) -> Result<Vec<Method>, Error> {
        self.iter().map(|name| normalize(name)).collect()
    }
}

impl<const N: usize> IntoMethods for [&str; N] {
    fn into_methods(self) -> Result<Vec<Method>, Error> {
        self.as_slice().into_methods()
    }
}

impl IntoMethods for Method {
    fn into_methods(self) -> Result<Vec<Method>, Error> {
        Ok(vec![self])
    }
}

impl IntoMethods for Vec<Method> {
    fn into_methods(self) -> Result<Vec<Method>, Error> {
        Ok(self)
    }
}

impl<const N: usize> IntoMethods for [Method; N] {
    fn into_methods(self) -> Result<Vec<Method>, Error> {
        Ok(self.into())
    }
}

/// Ordered route table plus the set of methods the server accepts.
///
/// Routes are tried in registration order and the first one whose method set
/// and pattern both match handles the request. The supported method set only
/// ever grows: it starts as `GET` and `HEAD` and absorbs every method a route
/// is registered for.
#[derive(Debug, Clone)]
pub struct Router {
    server_name: String,
    supported_methods: Vec<Method>,
    routes: Vec<Route>,
    locked: bool,
}

impl Router {
    /// Create an empty router that identifies itself as `server_name`.
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            supported_methods: vec![Method::GET, Method::HEAD],
            routes: Vec::new(),
            locked: false,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn supported_methods(&self) -> &[Method] {
        &self.supported_methods
    }

    pub fn supports(&self, method: &Method) -> bool {
        self.supported_methods.contains(method)
    }

    /// Accept `methods` even if no route handles them.
    ///
    /// Requests using them then get a `404` instead of a `405`.
    pub fn support_methods(&mut self, methods: impl IntoMethods) -> Result<(), Error> {
        let methods = methods.into_methods()?;
        self.merge_supported(&methods);
        Ok(())
    }

    fn merge_supported(&mut self, methods: &[Method]) {
        for method in methods {
            if !self.supported_methods.contains(method) {
                self.supported_methods.push(method.clone());
            }
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Register `handler` for `methods` on paths matching `pattern`.
    ///
    /// `pattern` is either a literal path or a regular expression; regex
    /// groups are handed to the handler in order. Fails with
    /// [`Error::Config`] once the router is locked for serving, leaving the
    /// table untouched.
    pub fn register_request_handler<M, F, R>(&mut self, methods: M, pattern: &str, handler: F) -> Result<(), Error>
    where
        M: IntoMethods,
        F: Fn(&HttpRequest, &Params) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        if self.locked {
            return Err(Error::Config(
                "Handlers cannot be registered while server is already running".to_string(),
            ));
        }

        let mut methods = methods.into_methods()?;
        if methods.is_empty() {
            return Err(Error::Config(format!("No HTTP method given for pattern {pattern:?}")));
        }
        let mut seen = Vec::with_capacity(methods.len());
        methods.retain(|m| {
            let fresh = !seen.contains(m);
            if fresh {
                seen.push(m.clone());
            }
            fresh
        });

        self.merge_supported(&methods);

        let route = Route::new(
            methods,
            pattern,
            Arc::new(move |request: &HttpRequest, params: &Params| -> Result<Reply, HandlerError> {
                handler(request, params).map(Into::into)
            }),
        );
        debug!("Registered route {:?} {}", route.methods(), route.pattern());
        self.routes.push(route);

        Ok(())
    }

    /// Refuse further registrations.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Allow registrations again.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Find the first route registered for `method` whose pattern matches `path`.
    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.accepts(method))
            .find_map(|route| route.captures(path).map(|params| RouteMatch { route, params }))
    }

    /// Produce the response for `request`.
    ///
    /// Never fails: misses become `405`/`404`, handler faults and unusable
    /// handler results become `500`. Responses to `HEAD` lose their body, and
    /// every response carries the [`SERVER_HEADER`].
    pub fn dispatch(&self, request: &HttpRequest) -> HttpResponse {
        let mut response = self.route_request(request);

        if request.method == Method::HEAD {
            response.strip_body();
        }
        response.set_header(SERVER_HEADER, self.server_name.as_str());

        response
    }

    fn route_request(&self, request: &HttpRequest) -> HttpResponse {
        let method = &request.method;
        let path = request.path_info();

        if !self.supports(method) {
            debug!("Rejecting unsupported method {method} for {path}");
            return HttpResponse::plain_text(
                StatusCode::MethodNotAllowed,
                format!("This server does not support a {method} request"),
            );
        }

        // HEAD is answered like GET unless a route claims HEAD explicitly.
        let matched = self.match_route(method, path).or_else(|| {
            if *method == Method::HEAD {
                self.match_route(&Method::GET, path)
            } else {
                None
            }
        });

        let Some(matched) = matched else {
            debug!("No route for {method} {path}");
            return HttpResponse::plain_text(
                StatusCode::NotFound,
                format!("Path \"{path}\" was not found on this server"),
            );
        };

        let reply = match catch_unwind(AssertUnwindSafe(|| matched.call(request))) {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Self::handler_fault(method, matched.pattern(), e),
            Err(payload) => return Self::handler_fault(method, matched.pattern(), HandlerError::from_panic(payload)),
        };

        let returned = match &reply {
            Reply::Invalid(type_name) => *type_name,
            _ => "a value",
        };

        match reply.into_response() {
            Some(response) => response,
            None => {
                error!("Handler for {method} {pattern} returned {returned}", pattern = matched.pattern());
                HttpResponse::plain_text(
                    StatusCode::InternalServerError,
                    format!(
                        "Request handler for \"{method} {pattern}\" returned a value that cannot be transformed into response",
                        pattern = matched.pattern()
                    ),
                )
            }
        }
    }

    fn handler_fault(method: &Method, pattern: &str, e: HandlerError) -> HttpResponse {
        warn!("Handler for {method} {pattern} failed: {e}");
        HttpResponse::plain_text(
            StatusCode::InternalServerError,
            format!("Internal server error - exception {}: {}", e.kind(), e.message()),
        )
    }
}

//! The hook a test implements to describe its mock server.

use std::any::type_name;

use crate::parser::Method;
use crate::router::{Router, DEFAULT_SERVER_NAME};
use crate::server::Error;

/// A mock server definition.
///
/// The route table is built from scratch by
/// [`register_request_handlers`](MockApp::register_request_handlers) in the
/// test process and again inside the child process, so everything the
/// handlers need must be reachable from that function.
///
/// ```
/// use mockhttp_rs::{Error, MockApp, Router};
///
/// struct Greeter;
///
/// impl MockApp for Greeter {
///     const SERVER_NAME: &'static str = "Greeter";
///
///     fn register_request_handlers(router: &mut Router) -> Result<(), Error> {
///         router.register_request_handler("GET", "/hello/(\\w+)", |_req, params| {
///             Ok(format!("Hello, {}!", params.get(0).unwrap_or("stranger")))
///         })
///     }
/// }
/// ```
pub trait MockApp: 'static {
    /// Value of the identification header on every response.
    const SERVER_NAME: &'static str = DEFAULT_SERVER_NAME;

    /// Register every route of this server.
    fn register_request_handlers(router: &mut Router) -> Result<(), Error>;

    /// Name used to find this app again inside the child process.
    fn app_id() -> &'static str {
        type_name::<Self>()
    }

    /// Build a fresh route table accepting `supported_methods` on top of the defaults.
    fn build_router(supported_methods: &[Method]) -> Result<Router, Error> {
        let mut router = Router::new(Self::SERVER_NAME);
        router.support_methods(supported_methods.to_vec())?;
        Self::register_request_handlers(&mut router)?;
        Ok(router)
    }
}

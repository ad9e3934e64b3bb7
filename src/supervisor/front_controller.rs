//! Entry point of the child process.

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use log::{info, warn};

use crate::parser::Method;
use crate::router::Router;
use crate::server::{Error, HttpServer, ServerConfig};
use crate::supervisor::app::MockApp;
use crate::supervisor::bootstrap::BootstrapManifest;
use crate::supervisor::config::BOOTSTRAP_ENV;

type BuildRouter = fn(&[Method]) -> Result<Router, Error>;

/// Apps the running executable can serve when spawned again.
static MOUNTED: OnceLock<Vec<&'static str>> = OnceLock::new();

/// Whether this process was spawned by a [`MockServer`](crate::MockServer).
pub fn is_front_controller() -> bool {
    env::var_os(BOOTSTRAP_ENV).is_some()
}

/// Whether the running executable mounted `app_id` and may be spawned to serve it.
pub(crate) fn serves_app(app_id: &str) -> bool {
    MOUNTED.get().is_some_and(|apps| apps.iter().any(|mounted| *mounted == app_id))
}

/// Serves one of the mounted apps, as named by the bootstrap artifact.
///
/// An executable that spawns itself as the server must hand control to it
/// first thing in `main`:
///
/// ```no_run
/// # use mockhttp_rs::{Error, MockApp, Router};
/// # struct MyApp;
/// # impl MockApp for MyApp {
/// #     fn register_request_handlers(_router: &mut Router) -> Result<(), Error> { Ok(()) }
/// # }
/// use mockhttp_rs::FrontController;
///
/// fn main() -> Result<(), Error> {
///     if FrontController::new().mount::<MyApp>().run_if_spawned()? {
///         return Ok(());
///     }
///     // ... the tests themselves
///     Ok(())
/// }
/// ```
///
/// Test binaries built with the default libtest harness never reach such a
/// `main`; they need a dedicated front controller binary instead (see
/// [`MockServerConfig::entry_name`](crate::MockServerConfig::entry_name)).
#[derive(Default)]
pub struct FrontController {
    apps: Vec<(&'static str, BuildRouter)>,
}

impl FrontController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make app `A` available to serve.
    pub fn mount<A: MockApp>(mut self) -> Self {
        self.apps.push((A::app_id(), A::build_router));
        self
    }

    /// Serve if this process was spawned by a supervisor, returning `true`
    /// once serving ends.
    ///
    /// Otherwise returns `false` and records that the running executable can
    /// serve the mounted apps, which lets a [`MockServer`](crate::MockServer)
    /// spawn it without further configuration.
    pub fn run_if_spawned(self) -> Result<bool, Error> {
        if is_front_controller() {
            self.run()?;
            return Ok(true);
        }

        let apps = self.apps.iter().map(|(app_id, _)| *app_id).collect();
        if MOUNTED.set(apps).is_err() {
            warn!("Front controller apps were already recorded; keeping the first set");
        }
        Ok(false)
    }

    /// Read the bootstrap artifact and serve until killed.
    ///
    /// Fails with [`Error::NotFrontController`] when the process was not
    /// spawned by a supervisor.
    pub fn run(self) -> Result<(), Error> {
        let path = env::var_os(BOOTSTRAP_ENV)
            .map(PathBuf::from)
            .ok_or(Error::NotFrontController)?;
        let manifest = BootstrapManifest::read_from(&path)?;
        let router = self.build_router(&manifest)?;

        info!("Front controller serving {app} on {addr}", app = manifest.app, addr = manifest.addr);

        let config = ServerConfig {
            addr: manifest.addr,
            ..ServerConfig::default()
        };
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(HttpServer::new(config, router).start())
    }

    pub fn build_router(&self, manifest: &BootstrapManifest) -> Result<Router, Error> {
        let methods = manifest
            .supported_methods
            .iter()
            .map(|name| Method::normalized(name))
            .collect::<Result<Vec<_>, _>>()?;

        let (_, build) = self
            .apps
            .iter()
            .find(|(app_id, _)| *app_id == manifest.app)
            .ok_or_else(|| Error::Config(format!("No mock app {} is mounted in this front controller", manifest.app)))?;

        build(&methods)
    }
}

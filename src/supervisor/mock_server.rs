//! Lifecycle of the out-of-process mock server.

use std::fs;
use std::io;
use std::marker::PhantomData;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};
use rand::Rng;

use crate::parser::{HttpRequest, Method};
use crate::router::{HandlerError, IntoMethods, Params, Reply, Router};
use crate::server::{Error, HttpResponse};
use crate::supervisor::app::MockApp;
use crate::supervisor::bootstrap::{artifact_path, BootstrapManifest};
use crate::supervisor::config::{MockServerConfig, Readiness, BOOTSTRAP_ENV, PORT_RANGE};
use crate::supervisor::entry::resolve_entry;
use crate::supervisor::front_controller::is_front_controller;

/// Resources held while a child process is (or may be) serving.
#[derive(Debug, Default)]
struct ServerProcess {
    bootstrap_path: Option<PathBuf>,
    child: Option<Child>,
}

/// A mock server for app `A`, served by a child process on `127.0.0.1`.
///
/// The child is killed and the bootstrap artifact removed by
/// [`stop`](MockServer::stop), by the next [`start`](MockServer::start), and
/// when the `MockServer` is dropped, so a test that panics or returns early
/// leaves nothing behind.
///
/// The child builds its routes from [`MockApp::register_request_handlers`]
/// alone. Routes added later with
/// [`register_request_handler`](MockServer::register_request_handler) are only
/// seen by [`handle_request`](MockServer::handle_request).
pub struct MockServer<A: MockApp> {
    config: MockServerConfig,
    port: u16,
    router: Router,
    process: ServerProcess,
    _app: PhantomData<fn() -> A>,
}

impl<A: MockApp> MockServer<A> {
    /// Create a server configured from the environment (see
    /// [`MockServerConfig::from_env`]). Nothing is spawned yet.
    pub fn new() -> Result<Self, Error> {
        Self::with_config(MockServerConfig::from_env()?)
    }

    pub fn with_config(config: MockServerConfig) -> Result<Self, Error> {
        let port = config
            .port
            .unwrap_or_else(|| rand::thread_rng().gen_range(PORT_RANGE));
        let router = A::build_router(&config.supported_methods)?;

        Ok(Self {
            config,
            port,
            router,
            process: ServerProcess::default(),
            _app: PhantomData,
        })
    }

    /// Create a server and start it.
    pub fn started() -> Result<Self, Error> {
        let mut server = Self::new()?;
        server.start()?;
        Ok(server)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }

    /// `http://127.0.0.1:<port>`, whether or not the server is running.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// `base_url` joined with `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &MockServerConfig {
        &self.config
    }

    /// Path of the current bootstrap artifact, if one exists.
    pub fn bootstrap_path(&self) -> Option<&Path> {
        self.process.bootstrap_path.as_deref()
    }

    /// Add a route to the in-process route table.
    ///
    /// Fails with [`Error::Config`] while the server is running.
    pub fn register_request_handler<M, F, R>(&mut self, methods: M, pattern: &str, handler: F) -> Result<(), Error>
    where
        M: IntoMethods,
        F: Fn(&HttpRequest, &Params) -> Result<R, HandlerError> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        self.router.register_request_handler(methods, pattern, handler)
    }

    /// Dispatch `request` in this process, without going through the child.
    pub fn handle_request(&self, request: &HttpRequest) -> HttpResponse {
        self.router.dispatch(request)
    }

    /// Spawn the child process serving this app.
    ///
    /// Any previous child is stopped first. Returns once the configured
    /// [`Readiness`] check passes. Fails with [`Error::Config`] inside a
    /// front controller, so a child never spawns children of its own.
    pub fn start(&mut self) -> Result<(), Error> {
        if is_front_controller() {
            return Err(Error::Config(format!(
                "Cannot start {name} from inside a front controller",
                name = A::SERVER_NAME
            )));
        }

        self.stop();

        let entry = resolve_entry(&self.config, A::app_id())?;
        let addr = self.addr();

        if let Err(e) = TcpListener::bind(addr) {
            return Err(Error::Startup(format!("{addr} is not available: {e}")));
        }

        let path = artifact_path(&self.config.scratch_dir);
        let manifest = BootstrapManifest {
            app: A::app_id().to_string(),
            addr,
            supported_methods: self.config.supported_methods.iter().map(Method::to_string).collect(),
        };
        manifest.write_to(&path)?;
        self.process.bootstrap_path = Some(path.clone());

        info!("Starting {name} on {addr} using {entry}", name = A::SERVER_NAME, entry = entry.display());
        let child = Command::new(&entry)
            .env(BOOTSTRAP_ENV, &path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                self.stop();
                return Err(Error::IoError(e));
            }
        };
        debug!("Server process {pid} spawned", pid = child.id());
        self.process.child = Some(child);
        self.router.lock();

        if let Err(e) = self.wait_until_ready(addr) {
            self.stop();
            return Err(e);
        }

        Ok(())
    }

    fn wait_until_ready(&mut self, addr: SocketAddr) -> Result<(), Error> {
        match self.config.readiness {
            Readiness::GracePeriod(period) => {
                thread::sleep(period);
                Ok(())
            }
            Readiness::Probe { timeout, interval } => {
                let deadline = Instant::now() + timeout;
                loop {
                    if let Some(status) = self.exit_status()? {
                        return Err(Error::Startup(format!("server process exited early with {status}")));
                    }

                    if TcpStream::connect_timeout(&addr, interval).is_ok() {
                        // Someone else may own the port while the child fails to bind.
                        if let Some(status) = self.exit_status()? {
                            return Err(Error::Startup(format!("server process exited early with {status}")));
                        }
                        debug!("Server is accepting connections on {addr}");
                        return Ok(());
                    }

                    if Instant::now() >= deadline {
                        return Err(Error::Startup(format!("nothing is listening on {addr} after {timeout:?}")));
                    }
                    thread::sleep(interval);
                }
            }
        }
    }

    fn exit_status(&mut self) -> Result<Option<ExitStatus>, Error> {
        match self.process.child.as_mut() {
            Some(child) => Ok(child.try_wait()?),
            None => Ok(None),
        }
    }

    /// Whether the child process exists and has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.process.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kill the child process and delete the bootstrap artifact.
    ///
    /// Safe to call at any time; does nothing when nothing is left to clean up.
    pub fn stop(&mut self) {
        if let Some(path) = self.process.bootstrap_path.take() {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed bootstrap artifact {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove bootstrap artifact {}: {e}", path.display()),
            }
        }

        if let Some(mut child) = self.process.child.take() {
            let pid = child.id();
            match child.try_wait() {
                Ok(Some(status)) => debug!("Server process {pid} had already exited with {status}"),
                _ => {
                    if let Err(e) = child.kill() {
                        warn!("Could not kill server process {pid}: {e}");
                    }
                    // Reap it so the port is released before a restart.
                    match child.wait() {
                        Ok(status) => info!("Stopped {name} (pid {pid}, {status})", name = A::SERVER_NAME),
                        Err(e) => warn!("Could not reap server process {pid}: {e}"),
                    }
                }
            }
        }

        self.router.unlock();
    }
}

impl<A: MockApp> Drop for MockServer<A> {
    fn drop(&mut self) {
        self.stop();
    }
}

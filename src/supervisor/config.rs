//! Supervisor configuration.

use std::env;
use std::ffi::OsString;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use crate::parser::Method;
use crate::server::Error;

/// Explicit path of the executable that runs the front controller.
pub const ENTRY_ENV: &str = "MOCKHTTP_ENTRY";

/// Port override for servers that do not set one in code.
pub const PORT_ENV: &str = "MOCKHTTP_PORT";

/// Set on the child process; names the bootstrap artifact to serve from.
pub const BOOTSTRAP_ENV: &str = "MOCKHTTP_BOOTSTRAP";

/// Ports picked from when none is configured.
pub const PORT_RANGE: RangeInclusive<u16> = 63200..=63500;

/// How `start` decides the child process is ready for requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Sleep for a fixed time and hope the child is listening by then.
    ///
    /// Requests sent right after `start` may still be refused under load.
    GracePeriod(Duration),
    /// Retry a TCP connect every `interval` until it succeeds or `timeout`
    /// passes. A child that has exited by the time a connect succeeds, or
    /// before, fails `start`.
    Probe { timeout: Duration, interval: Duration },
}

impl Default for Readiness {
    fn default() -> Self {
        Readiness::Probe {
            timeout: Duration::from_secs(5),
            interval: Duration::from_millis(10),
        }
    }
}

/// Configuration of a [`MockServer`](crate::MockServer).
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Port to bind on `127.0.0.1`; random within [`PORT_RANGE`] if unset.
    pub port: Option<u16>,
    /// Methods accepted on top of `GET`, `HEAD` and those the routes use.
    pub supported_methods: Vec<Method>,
    /// Executable that runs the front controller. Takes precedence over every
    /// other candidate.
    pub entry: Option<PathBuf>,
    /// File name of a dedicated front controller binary to look for next to
    /// the running executable and under `./target`. When unset the running
    /// executable itself is used, provided it mounted the app with
    /// [`FrontController::run_if_spawned`](crate::FrontController::run_if_spawned).
    pub entry_name: Option<String>,
    /// Where bootstrap artifacts are written.
    pub scratch_dir: PathBuf,
    pub readiness: Readiness,
}

impl MockServerConfig {
    /// Default configuration with [`PORT_ENV`] and [`ENTRY_ENV`] applied.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|name| env::var_os(name))
    }

    pub(crate) fn from_vars(var: impl Fn(&str) -> Option<OsString>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(raw) = var(PORT_ENV) {
            let raw = raw.to_string_lossy();
            let port = raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("{PORT_ENV}={raw:?} is not a valid port")))?;
            config.port = Some(port);
        }

        if let Some(entry) = var(ENTRY_ENV) {
            config.entry = Some(PathBuf::from(entry));
        }

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: None,
            supported_methods: Vec::new(),
            entry: None,
            entry_name: None,
            scratch_dir: env::temp_dir(),
            readiness: Readiness::default(),
        }
    }
}

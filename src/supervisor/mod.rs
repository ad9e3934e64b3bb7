//! Out-of-process server lifecycle.
//!
//! A [`MockServer`] writes a small bootstrap artifact to the scratch
//! directory, spawns an executable with `MOCKHTTP_BOOTSTRAP` pointing at it,
//! and kills that child again on [`stop`](MockServer::stop) or drop. Inside
//! the child, a [`FrontController`] reads the artifact, rebuilds the same
//! [`MockApp`] and serves it on `127.0.0.1:<port>`.
//!
//! Parent and child share nothing but the artifact and the TCP port.

mod app;
mod bootstrap;
mod config;
mod entry;
mod front_controller;
mod mock_server;

pub use app::MockApp;
pub use bootstrap::{artifact_path, BootstrapManifest};
pub use config::{MockServerConfig, Readiness, BOOTSTRAP_ENV, ENTRY_ENV, PORT_ENV, PORT_RANGE};
pub use entry::{entry_candidates, resolve_entry};
pub use front_controller::{is_front_controller, FrontController};
pub use mock_server::MockServer;

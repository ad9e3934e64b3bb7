//! The bootstrap artifact handed from the supervisor to its child.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::server::Error;

static ARTIFACT_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Everything the child needs to rebuild and serve the same mock server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapManifest {
    /// [`MockApp::app_id`](crate::MockApp::app_id) of the app to serve.
    pub app: String,
    /// Address to bind.
    pub addr: SocketAddr,
    /// Extra methods to accept, as configured on the supervisor.
    pub supported_methods: Vec<String>,
}

impl BootstrapManifest {
    pub fn write_to(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, Error> {
        let json = fs::read(path)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

/// A path in `scratch_dir` no other server in this or another process uses.
pub fn artifact_path(scratch_dir: &Path) -> PathBuf {
    let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
    scratch_dir.join(format!("app-server-mock-{}-{seq}.json", process::id()))
}

//! Locating the executable that runs the front controller.

use std::env;
use std::env::consts::EXE_SUFFIX;
use std::path::PathBuf;

use crate::server::Error;
use crate::supervisor::config::{MockServerConfig, ENTRY_ENV};
use crate::supervisor::front_controller::serves_app;

/// Candidate executables for serving `app_id`, in the order they are tried:
///
/// 1. `config.entry`
/// 2. the `MOCKHTTP_ENTRY` environment variable
/// 3. with `config.entry_name` set, that binary next to the running
///    executable or one directory up (test binaries live in
///    `target/<profile>/deps`), then `./target/debug/<name>` and
///    `./target/release/<name>`
/// 4. without it, the running executable, but only once it mounted `app_id`
///    through [`FrontController::run_if_spawned`](crate::FrontController::run_if_spawned)
pub fn entry_candidates(config: &MockServerConfig, app_id: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(entry) = &config.entry {
        candidates.push(entry.clone());
    }
    if let Some(entry) = env::var_os(ENTRY_ENV) {
        candidates.push(PathBuf::from(entry));
    }

    let current_exe = env::current_exe().ok();
    match &config.entry_name {
        None => {
            if serves_app(app_id) {
                candidates.extend(current_exe);
            }
        }
        Some(name) => {
            let file_name = format!("{name}{EXE_SUFFIX}");
            if let Some(dir) = current_exe.as_deref().and_then(|exe| exe.parent()) {
                candidates.push(dir.join(&file_name));
                if let Some(parent) = dir.parent() {
                    candidates.push(parent.join(&file_name));
                }
            }
            if let Ok(cwd) = env::current_dir() {
                for profile in ["debug", "release"] {
                    candidates.push(cwd.join("target").join(profile).join(&file_name));
                }
            }
        }
    }

    candidates
}

/// The first candidate that exists as a file.
///
/// Fails with [`Error::Config`] when nothing names an executable at all, and
/// with [`Error::EntryNotFound`] when none of the named ones exist.
pub fn resolve_entry(config: &MockServerConfig, app_id: &str) -> Result<PathBuf, Error> {
    let candidates = entry_candidates(config, app_id);
    if candidates.is_empty() {
        return Err(Error::Config(format!(
            "No executable serves {app_id}: mount it with FrontController::run_if_spawned in main, \
             or set MockServerConfig::entry, MockServerConfig::entry_name or {ENTRY_ENV}"
        )));
    }

    match candidates.iter().find(|path| path.is_file()) {
        Some(path) => Ok(path.clone()),
        None => Err(Error::EntryNotFound(candidates)),
    }
}

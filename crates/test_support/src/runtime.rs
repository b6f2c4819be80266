//! Container runtime discovery for testcontainers.
//!
//! testcontainers speaks the Docker API. Docker's socket is used when it
//! answers; otherwise a Podman socket is looked up and exported as
//! `DOCKER_HOST`. Discovery runs once per test binary.

use anyhow::{Result, bail};
use std::{
    env, fs,
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
    sync::OnceLock,
    thread,
    time::{Duration, Instant},
};

const SOCKET_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Ensure a container runtime socket is reachable.
///
/// Integration tests call this first and skip themselves on `Err`.
///
/// # Errors
/// Returns an error describing every location that was tried.
pub fn ensure_container_runtime() -> Result<()> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();
    match INIT.get_or_init(discover) {
        Ok(()) => Ok(()),
        Err(message) => bail!("{message}"),
    }
}

fn discover() -> Result<(), String> {
    if let Ok(docker_host) = env::var("DOCKER_HOST") {
        return match socket_path(&docker_host) {
            Some(path) if !wait_for_socket(&path, SOCKET_WAIT_TIMEOUT) => Err(format!(
                "`DOCKER_HOST` points to `{docker_host}`, but nothing is listening there"
            )),
            _ => Ok(()),
        };
    }

    if wait_for_socket(Path::new(DOCKER_SOCKET), SOCKET_WAIT_TIMEOUT) {
        return Ok(());
    }

    let candidates = podman_candidates();
    if let Some(path) = candidates
        .iter()
        .find(|path| wait_for_socket(path, SOCKET_WAIT_TIMEOUT))
    {
        export_docker_host(path);
        return Ok(());
    }

    let tried: Vec<String> = std::iter::once(PathBuf::from(DOCKER_SOCKET))
        .chain(candidates)
        .map(|path| path.display().to_string())
        .collect();
    Err(format!(
        "no container runtime socket is reachable (tried {}); start Docker or `podman.socket`, or set `DOCKER_HOST`",
        tried.join(", ")
    ))
}

/// Filesystem path behind a `DOCKER_HOST` value, if it names a unix socket.
fn socket_path(docker_host: &str) -> Option<PathBuf> {
    if let Some(path) = docker_host.strip_prefix("unix://") {
        return Some(PathBuf::from(path));
    }
    docker_host.starts_with('/').then(|| PathBuf::from(docker_host))
}

fn podman_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        candidates.push(PathBuf::from(runtime_dir).join("podman/podman.sock"));
    }
    if let Some(uid) = current_uid() {
        candidates.push(PathBuf::from(format!("/run/user/{uid}/podman/podman.sock")));
    }
    candidates.push(PathBuf::from("/run/podman/podman.sock"));
    candidates.dedup();
    candidates
}

fn wait_for_socket(path: &Path, timeout: Duration) -> bool {
    if !path.exists() {
        return false;
    }
    let start = Instant::now();
    while start.elapsed() < timeout {
        if UnixStream::connect(path).is_ok() {
            return true;
        }
        thread::sleep(Duration::from_millis(200));
    }
    false
}

fn export_docker_host(path: &Path) {
    // SAFETY: runs once, inside the OnceLock initializer, before any container starts.
    unsafe {
        env::set_var("DOCKER_HOST", format!("unix://{}", path.display()));
    }
}

fn current_uid() -> Option<u32> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};

use super::transport::Transport;
use crate::core::poller::PollOptions;

pub const DEFAULT_PORT: u16 = 54321;

/// Returned by [`start_server`]; pass it to [`stop_server`] when done.
#[derive(Debug)]
pub struct ServerHandle {
    child: Child,
    jar: PathBuf,
    pub port: u16,
}

impl ServerHandle {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }
}

/// Checks that a Java runtime is on the PATH.
pub async fn check_java() -> Result<String> {
    let output = Command::new("java")
        .arg("-version")
        .output()
        .await
        .context("Failed to run 'java -version'; is Java installed?")?;
    if !output.status.success() {
        anyhow::bail!("'java -version' exited with {}", output.status);
    }
    // The JVM prints its version banner on stderr.
    let banner = String::from_utf8_lossy(&output.stderr);
    let version = banner.lines().next().unwrap_or_default().to_string();
    info!("Found Java: {}", version);
    Ok(version)
}

pub async fn start_server(jar: &Path, port: u16) -> Result<ServerHandle> {
    if !jar.is_file() {
        anyhow::bail!("Server jar not found: {:?}", jar);
    }
    let child = Command::new("java")
        .arg("-jar")
        .arg(jar)
        .arg("-port")
        .arg(port.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start server from {:?}", jar))?;
    info!("Started server from {:?} on port {} (pid {:?})", jar, port, child.id());
    Ok(ServerHandle { child, jar: jar.to_path_buf(), port })
}

/// Waits until the server answers `GET Cloud`.
pub async fn wait_until_ready<T: Transport + ?Sized>(transport: &T, options: &PollOptions) -> Result<()> {
    let started = Instant::now();
    loop {
        match options.race(started, transport.get("Cloud")).await? {
            Ok(_) => {
                info!("Server ready after {:?}", started.elapsed());
                return Ok(());
            }
            Err(e) => debug!("Server not ready yet: {:#}", e),
        }
        options.race(started, sleep(options.interval)).await?;
    }
}

pub async fn stop_server(mut handle: ServerHandle) -> Result<()> {
    let pid = handle.pid();
    if let Err(e) = handle.child.start_kill() {
        warn!("Server process {:?} already gone: {}", pid, e);
    }
    let status = handle
        .child
        .wait()
        .await
        .context("Failed to wait for server process to exit")?;
    info!("Server {:?} (pid {:?}) exited with {}", handle.jar, pid, status);
    Ok(())
}

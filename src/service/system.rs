//! Host facts shown on the status page.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpStream;

use crate::service::command::run_shell;

/// DSM version file on Synology hosts.
pub const DSM_VERSION_FILE: &str = "/etc.defaults/VERSION";

const UNKNOWN: &str = "unknown";

/// DSM product version, or "unknown" off Synology.
pub async fn dsm_version(path: &Path) -> String {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => parse_product_version(&contents).unwrap_or_else(|| UNKNOWN.to_string()),
        Err(_) => UNKNOWN.to_string(),
    }
}

/// Installed docker version, or "unknown" if the CLI is unavailable.
pub async fn docker_version(timeout: Duration) -> String {
    let out = run_shell("docker --version", timeout).await;
    if !out.success {
        return UNKNOWN.to_string();
    }
    parse_docker_version(&out.stdout).unwrap_or_else(|| UNKNOWN.to_string())
}

/// Whether anything accepts connections on the manager's port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortStatus {
    pub port: Option<u16>,
    pub listening: bool,
}

/// Check the port of `bind_address` with a loopback connect.
pub async fn port_status(bind_address: &str, timeout: Duration) -> PortStatus {
    let Some(port) = bind_port(bind_address) else {
        return PortStatus {
            port: None,
            listening: false,
        };
    };
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listening = matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    );
    PortStatus {
        port: Some(port),
        listening,
    }
}

fn bind_port(bind_address: &str) -> Option<u16> {
    if let Ok(addr) = bind_address.parse::<SocketAddr>() {
        return Some(addr.port());
    }
    bind_address.rsplit_once(':')?.1.parse().ok()
}

/// True when the process runs as root. Owner of `/proc/self` is the effective uid.
#[cfg(unix)]
pub fn is_root() -> bool {
    use std::os::unix::fs::MetadataExt;

    std::fs::metadata("/proc/self")
        .map(|meta| meta.uid() == 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

fn parse_product_version(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let value = line.trim().strip_prefix("productversion=")?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn parse_docker_version(output: &str) -> Option<String> {
    let rest = output.split("version").nth(1)?.trim_start();
    let version: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    (!version.is_empty()).then_some(version)
}

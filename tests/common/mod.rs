//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dockerd_config_manager::config::ManagerConfig;
use dockerd_config_manager::daemon::storage::{Entry, FileStat};
use dockerd_config_manager::daemon::{
    ConfigEngine, EngineSettings, LocalFs, RetentionPolicy, Storage,
};
use dockerd_config_manager::http::HttpServer;
use dockerd_config_manager::lifecycle::Shutdown;
use dockerd_config_manager::service::RestartCoordinator;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const SEED: &str = r#"{
  "data-root": "/volume1/@docker",
  "log-driver": "db",
  "registry-mirrors": ["https://mirror.example.com"],
  "proxies": {
    "http-proxy": "http://10.0.0.1:3128"
  },
  "storage-driver": "btrfs",
  "experimental-x": {"keep": [1, 2, 3]}
}
"#;

/// A temp directory with a seeded `dockerd.json` and an empty backup dir.
pub struct Workspace {
    pub dir: TempDir,
    pub config_path: PathBuf,
    pub backup_dir: PathBuf,
}

impl Workspace {
    pub fn new(seed: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("dockerd.json");
        let backup_dir = dir.path().join("backups");
        std::fs::write(&config_path, seed).unwrap();
        Self {
            dir,
            config_path,
            backup_dir,
        }
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            config_path: self.config_path.clone(),
            backup_dir: self.backup_dir.clone(),
            retention: RetentionPolicy::default(),
        }
    }

    pub fn engine(&self) -> ConfigEngine {
        ConfigEngine::new(self.settings())
    }

    pub fn live_bytes(&self) -> Vec<u8> {
        std::fs::read(&self.config_path).unwrap()
    }

    pub fn backup_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(&self.backup_dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    /// Manager settings pointing at this workspace, with harmless commands.
    pub fn manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.paths.daemon_config = self.config_path.clone();
        config.paths.backup_dir = self.backup_dir.clone();
        config.service.status_cmd = "echo running".into();
        config.service.restart_cmd = "echo restarting".into();
        config.service.restart_cmd_fallback = "echo fallback".into();
        config.service.journal_unit = None;
        config.service.daemon_reload = false;
        config.service.command_timeout_secs = 5;
        config.service.settle_ms = 0;
        config.service.poll_interval_ms = 20;
        config.service.restart_deadline_secs = 2;
        config
    }
}

/// [`LocalFs`] that can be told to fail writes to the live file or to the
/// backup directory.
pub struct FaultyStorage {
    inner: LocalFs,
    live: PathBuf,
    backup_dir: PathBuf,
    pub fail_live: AtomicBool,
    pub fail_backups: AtomicBool,
}

impl FaultyStorage {
    pub fn new(workspace: &Workspace) -> Arc<Self> {
        Arc::new(Self {
            inner: LocalFs,
            live: workspace.config_path.clone(),
            backup_dir: workspace.backup_dir.clone(),
            fail_live: AtomicBool::new(false),
            fail_backups: AtomicBool::new(false),
        })
    }

    fn injected(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("injected failure writing {}", path.display()),
        )
    }
}

impl Storage for FaultyStorage {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if self.fail_live.load(Ordering::SeqCst) && path == self.live {
            return Err(Self::injected(path));
        }
        if self.fail_backups.load(Ordering::SeqCst) && path.starts_with(&self.backup_dir) {
            return Err(Self::injected(path));
        }
        self.inner.write_atomic(path, contents)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<Entry>> {
        self.inner.list(dir)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.inner.remove(path)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        self.inner.stat(path)
    }

    fn ensure_dir(&self, dir: &Path) -> io::Result<()> {
        self.inner.ensure_dir(dir)
    }
}

/// Start the HTTP server on an ephemeral port.
pub async fn start_server(config: ManagerConfig) -> (SocketAddr, Arc<Shutdown>) {
    let engine = Arc::new(ConfigEngine::new(config.engine_settings()));
    engine.backups().init().unwrap();
    let restart = Arc::new(RestartCoordinator::new(config.service.clone()));
    let shutdown = Arc::new(Shutdown::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(Arc::new(config), engine, restart, Arc::clone(&shutdown));
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    (addr, shutdown)
}

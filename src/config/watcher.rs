//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself so that
//! editors which save by writing a temporary file and renaming it over the
//! original keep triggering reloads. A single save produces several events;
//! they are collapsed into one reload once the file has been quiet for
//! [`DEBOUNCE`].

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::PortalConfig;

/// Quiet period after the last change before the file is reloaded.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<PortalConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<PortalConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file.
    ///
    /// The returned handle must be kept alive for as long as updates are
    /// wanted; dropping it also stops the reload thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name = self.path.file_name().map(OsString::from).ok_or_else(|| {
            notify::Error::generic("configuration path has no file name")
                .add_path(self.path.clone())
        })?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (change_tx, change_rx) = std_mpsc::channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if ours {
                        // Fails only once the reload thread has stopped.
                        let _ = change_tx.send(());
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let path = self.path.clone();
        let update_tx = self.update_tx;
        thread::Builder::new()
            .name("config-reload".into())
            .spawn(move || reload_loop(&path, change_rx, update_tx))
            .map_err(|e| notify::Error::io(e).add_path(self.path.clone()))?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Reload once per burst of change events until the watcher goes away.
fn reload_loop(
    path: &Path,
    changes: std_mpsc::Receiver<()>,
    updates: mpsc::UnboundedSender<PortalConfig>,
) {
    while changes.recv().is_ok() {
        loop {
            match changes.recv_timeout(DEBOUNCE) {
                Ok(()) => continue,
                Err(std_mpsc::RecvTimeoutError::Timeout) => break,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return,
            }
        }

        tracing::info!(path = ?path, "Config file change detected, reloading");
        match load_config(path) {
            Ok(new_config) => {
                if updates.send(new_config).is_err() {
                    tracing::warn!(path = ?path, "Config update receiver dropped, stopping reloads");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = ?path,
                    error = %e,
                    "Failed to reload config, keeping current configuration"
                );
            }
        }
    }
    tracing::debug!(path = ?path, "Config watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    use tokio::time::timeout;

    fn config_text(secret: &str, heading: &str) -> String {
        format!(
            "[auth]\njwt_secret = \"{secret}\"\n\n[rate_limit.api]\nmax_requests = {}\nwindow_secs = 60\n\n[landing]\nheading = \"{heading}\"\n",
            // An empty secret also gets an invalid limit, so the file stays
            // rejected even when JWT_SECRET is set in the environment.
            if secret.is_empty() { 0 } else { 100 }
        )
    }

    fn scratch_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir()
            .join(format!("hjm-portal-watch-{}-{nanos}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn only_valid_rewrites_are_delivered() {
        let dir = scratch_dir();
        let path = dir.join("portal.toml");
        fs::write(&path, config_text("watch-secret", "Uno")).unwrap();

        let (watcher, mut updates) = ConfigWatcher::new(&path);
        let _handle = watcher.run().unwrap();

        // Unrelated files in the same directory are ignored.
        fs::write(dir.join("notes.txt"), "hola").unwrap();

        fs::write(&path, config_text("watch-secret", "Dos")).unwrap();
        let config = timeout(Duration::from_secs(5), updates.recv())
            .await
            .expect("valid rewrite was not delivered")
            .unwrap();
        assert_eq!(config.landing.heading, "Dos");

        // One save, one reload.
        tokio::time::sleep(DEBOUNCE * 3).await;
        assert!(updates.try_recv().is_err());

        fs::write(&path, config_text("", "Tres")).unwrap();
        assert!(
            timeout(Duration::from_secs(1), updates.recv()).await.is_err(),
            "invalid configuration must not be delivered"
        );

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        let (watcher, _updates) = ConfigWatcher::new(Path::new("/"));
        assert!(watcher.run().is_err());
    }
}

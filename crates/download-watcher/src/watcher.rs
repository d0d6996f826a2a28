//! Periodic driver of the watcher service.
//!
//! Passes run on the blocking thread pool. Scheduled ticks that fall due
//! while a pass is still running are skipped, not queued.

use anyhow::{Context, Result};
use shared::PassReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::service::WatcherService;

/// Control messages for a running watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherSignal {
    /// Run a pass now
    Check { deep: bool },
    /// Rebuild the index, then run a deep pass
    Reload,
    Stop,
}

pub struct Watcher {
    service: Arc<WatcherService>,
    interval: Duration,
}

/// Handle to a spawned watcher task
pub struct WatcherHandle {
    signals: mpsc::Sender<WatcherSignal>,
    task: JoinHandle<()>,
}

impl Watcher {
    pub fn new(service: Arc<WatcherService>, interval: Duration) -> Self {
        Self {
            service,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Start the loop; the first pass runs immediately
    pub fn spawn(self) -> WatcherHandle {
        let (signals, receiver) = mpsc::channel(16);
        let task = tokio::spawn(self.run(receiver));
        WatcherHandle { signals, task }
    }

    async fn run(self, mut signals: mpsc::Receiver<WatcherSignal>) {
        info!(
            interval_seconds = self.interval.as_secs(),
            "Download watcher started"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_pass(false).await;
                }
                signal = signals.recv() => match signal {
                    Some(WatcherSignal::Check { deep }) => {
                        self.run_pass(deep).await;
                    }
                    Some(WatcherSignal::Reload) => {
                        self.rebuild().await;
                        self.run_pass(true).await;
                    }
                    Some(WatcherSignal::Stop) | None => break,
                },
            }
        }

        info!("Download watcher stopped");
    }

    async fn run_pass(&self, deep: bool) -> Option<PassReport> {
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || service.trigger_pass(deep)).await {
            Ok(Ok(report)) => {
                debug!(deep, handled = report.handled(), "Pass complete");
                Some(report)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Relocation pass failed");
                None
            }
            Err(e) => {
                error!(error = %e, "Relocation pass panicked");
                None
            }
        }
    }

    async fn rebuild(&self) {
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || service.rebuild_index()).await {
            Ok(Ok(names)) => debug!(names, "Index reloaded"),
            Ok(Err(e)) => error!(error = %e, "Failed to rebuild the directory index"),
            Err(e) => error!(error = %e, "Index rebuild panicked"),
        }
    }
}

impl WatcherHandle {
    pub async fn send(&self, signal: WatcherSignal) -> Result<()> {
        self.signals
            .send(signal)
            .await
            .context("Download watcher is not running")
    }

    pub async fn check(&self, deep: bool) -> Result<()> {
        self.send(WatcherSignal::Check { deep }).await
    }

    pub async fn reload(&self) -> Result<()> {
        self.send(WatcherSignal::Reload).await
    }

    /// Ask the loop to stop and wait for the running pass to finish
    pub async fn stop(self) -> Result<()> {
        // The loop may already be gone
        let _ = self.signals.send(WatcherSignal::Stop).await;
        self.task.await.context("Download watcher task failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aliases::AliasStore;
    use crate::notify::MemoryNotifier;
    use crate::relocation::RelocationSettings;
    use shared::LibraryPaths;
    use std::path::Path;
    use tempfile::TempDir;

    fn service(root: &Path) -> Result<Arc<WatcherService>> {
        let paths = LibraryPaths::from_share_root(root);
        std::fs::create_dir_all(paths.anime_dir().join("Naruto"))?;
        std::fs::create_dir_all(paths.series_dir())?;
        std::fs::create_dir_all(paths.download_dir())?;
        Ok(Arc::new(WatcherService::new(
            paths,
            RelocationSettings::default(),
            AliasStore::new(root.join("mappings.toml")),
            Arc::new(MemoryNotifier::new()),
        )?))
    }

    async fn wait_for(path: &Path) -> bool {
        for _ in 0..100 {
            if path.exists() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_initial_pass_runs_on_start() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let service = service(temp_dir.path())?;
        let downloads = service.paths().download_dir().to_path_buf();
        std::fs::write(downloads.join("naruto s01e01.mkv"), b"x")?;

        let handle = Watcher::new(Arc::clone(&service), Duration::from_secs(3600)).spawn();

        let target = service
            .paths()
            .anime_dir()
            .join("Naruto/Staffel 01/Naruto - s01e01.mkv");
        assert!(wait_for(&target).await);
        handle.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_check_signal_runs_a_pass() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let service = service(temp_dir.path())?;
        let handle = Watcher::new(Arc::clone(&service), Duration::from_secs(3600)).spawn();

        let downloads = service.paths().download_dir().to_path_buf();
        std::fs::write(downloads.join("naruto s01e02.mkv"), b"x")?;
        handle.check(false).await?;

        let target = service
            .paths()
            .anime_dir()
            .join("Naruto/Staffel 01/Naruto - s01e02.mkv");
        assert!(wait_for(&target).await);
        handle.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_folder_and_quarantined_files() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let service = service(temp_dir.path())?;
        let downloads = service.paths().download_dir().to_path_buf();
        std::fs::write(downloads.join("~dark s01e01.mkv"), b"x")?;

        let handle = Watcher::new(Arc::clone(&service), Duration::from_secs(3600)).spawn();
        std::fs::create_dir_all(service.paths().series_dir().join("Dark"))?;
        handle.reload().await?;

        let target = service
            .paths()
            .series_dir()
            .join("Dark/Staffel 01/Dark - s01e01.mkv");
        assert!(wait_for(&target).await);
        handle.stop().await?;
        Ok(())
    }
}

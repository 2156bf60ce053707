//! Coarse status text for things living outside the terminal, like a bar
//! widget reading a file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::FixedOffset;
use log::{debug, warn};
use tokio::sync::watch;

use crate::time::{format_elapsed, ElapsedFormat};

/// Receives the status text every time it changes
pub trait StatusSink: Send + 'static {
    fn publish(&mut self, text: &str) -> Result<()>;

    /// Remove whatever was published. Called once publishing stops.
    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keeps the latest status text in a file
#[derive(Debug)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatusSink for StatusFile {
    fn publish(&mut self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| "Status file path does not have a usable parent directory")?;
        }

        std::fs::write(&self.path, text)
            .with_context(|| format!("Unable to write status file {}", self.path.display()))
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            debug!("Deleting status file {}", self.path.display());
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Unable to delete status file {}", self.path.display()))?;
        }

        Ok(())
    }
}

struct Publisher<S: StatusSink> {
    sink: S,
    last: Option<String>,
}

impl<S: StatusSink> Publisher<S> {
    fn offer(&mut self, text: String) {
        if self.last.as_deref() == Some(text.as_str()) {
            return;
        }

        if let Err(e) = self.sink.publish(&text) {
            warn!("Failed to publish status: {:#}", e);
        }

        self.last = Some(text);
    }
}

impl<S: StatusSink> Drop for Publisher<S> {
    fn drop(&mut self) {
        if let Err(e) = self.sink.clear() {
            warn!("Failed to clear status: {:#}", e);
        }
    }
}

/// Format every elapsed value and hand it to `sink` when the text changes.
///
/// Runs until the stopwatch goes away or the future is dropped; either way
/// the sink is cleared at the end.
pub async fn publish_status<S: StatusSink>(
    mut elapsed_rx: watch::Receiver<u64>,
    format: ElapsedFormat,
    offset: FixedOffset,
    sink: S,
) {
    let mut publisher = Publisher { sink, last: None };

    loop {
        let millis = *elapsed_rx.borrow_and_update();
        publisher.offer(format_elapsed(millis, &format, offset));

        if elapsed_rx.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use chrono::FixedOffset;
    use tokio::sync::watch;

    use super::{publish_status, StatusFile, StatusSink};
    use crate::time::ElapsedFormat;

    /// Sink remembering everything it was given
    #[derive(Clone, Default)]
    pub(crate) struct Recorder {
        pub(crate) texts: Arc<Mutex<Vec<String>>>,
        pub(crate) cleared: Arc<Mutex<bool>>,
    }

    impl Recorder {
        pub(crate) fn texts(&self) -> Vec<String> {
            self.texts.lock().unwrap().clone()
        }

        pub(crate) fn was_cleared(&self) -> bool {
            *self.cleared.lock().unwrap()
        }
    }

    impl StatusSink for Recorder {
        fn publish(&mut self, text: &str) -> Result<()> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn clear(&mut self) -> Result<()> {
            *self.cleared.lock().unwrap() = true;
            Ok(())
        }
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn publishes_only_when_the_text_changes() {
        let (tx, rx) = watch::channel(0u64);
        let recorder = Recorder::default();
        let utc = FixedOffset::east_opt(0).unwrap();
        let task = tokio::spawn(publish_status(rx, ElapsedFormat::Seconds, utc, recorder.clone()));
        settle().await;

        for ms in [10, 250, 999, 1000, 1500, 2001] {
            tx.send(ms).unwrap();
            settle().await;
        }

        assert_eq!(recorder.texts(), vec!["00:00:00", "00:00:01", "00:00:02"]);

        drop(tx);
        task.await.unwrap();
        assert!(recorder.was_cleared());
    }

    #[tokio::test]
    async fn cancelling_clears_the_sink() {
        let (_tx, rx) = watch::channel(0u64);
        let recorder = Recorder::default();
        let utc = FixedOffset::east_opt(0).unwrap();
        let task = tokio::spawn(publish_status(rx, ElapsedFormat::Full, utc, recorder.clone()));
        settle().await;

        task.abort();
        let _ = task.await;

        assert_eq!(recorder.texts(), vec!["00:00:00:00"]);
        assert!(recorder.was_cleared());
    }

    #[test]
    fn status_file_is_written_and_removed() {
        let dir = std::env::temp_dir().join(format!("clocky-status-{}", std::process::id()));
        let mut file = StatusFile::new(&dir.join("status"));

        file.publish("00:01:02").unwrap();
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "00:01:02");

        file.clear().unwrap();
        assert!(!file.path().exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use log::info;

/// Executables run when the stopwatch changes state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    StopwatchStart,
    StopwatchPause,
    StopwatchReset,
}

impl Hook {
    pub fn file_name(&self) -> &'static str {
        match *self {
            Self::StopwatchStart => "stopwatch-start",
            Self::StopwatchPause => "stopwatch-pause",
            Self::StopwatchReset => "stopwatch-reset",
        }
    }

    pub fn path(&self, hooks_directory: &Path) -> PathBuf {
        hooks_directory.join(self.file_name())
    }

    /// Run the hook if an executable for it exists in `hooks_directory`,
    /// and wait for it to exit
    pub async fn run(&self, hooks_directory: &Path) -> Result<()> {
        let hook_path = self.path(hooks_directory);

        if hook_path.exists() {
            info!(
                "Executing hook at {}",
                hook_path.display().to_string().cyan()
            );

            tokio::process::Command::new(&hook_path)
                .output()
                .await
                .with_context(|| format!("Failed to execute hook {}", hook_path.display()))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::path::Path;

    use super::Hook;

    #[test]
    fn hook_file_names() {
        let dir = Path::new("/etc/clocky/hooks");

        assert_eq!(
            Hook::StopwatchStart.path(dir),
            Path::new("/etc/clocky/hooks/stopwatch-start")
        );
        assert_eq!(Hook::StopwatchPause.file_name(), "stopwatch-pause");
        assert_eq!(Hook::StopwatchReset.file_name(), "stopwatch-reset");
    }

    #[tokio::test]
    async fn missing_hook_is_skipped() {
        let dir = std::env::temp_dir().join("clocky-no-hooks-here");

        assert!(Hook::StopwatchStart.run(&dir).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn existing_hook_is_executed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("clocky-hooks-{}", std::process::id()));
        let marker = dir.join("ran");
        std::fs::create_dir_all(&dir).unwrap();

        let hook_path = Hook::StopwatchPause.path(&dir);
        std::fs::write(&hook_path, format!("#!/bin/sh\ntouch '{}'\n", marker.display())).unwrap();
        std::fs::set_permissions(&hook_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        Hook::StopwatchPause.run(&dir).await.unwrap();

        assert!(marker.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}

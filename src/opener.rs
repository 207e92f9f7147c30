use std::{path::Path, process::Command};

use tracing::info;

use crate::error::{Error, Result};

/// Opens a file with whatever the host considers its default application.
pub trait FileOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<()>;
}

/// Uses `open` on macOS, `start` on Windows and `xdg-open` elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl FileOpener for SystemOpener {
    fn open(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::NotFound {
                kind: "file",
                name: path.display().to_string(),
            });
        }

        let status = open_command(path).status()?;
        if !status.success() {
            return Err(Error::Io(std::io::Error::other(format!(
                "opener exited with {status} for {}",
                path.display()
            ))));
        }

        info!(path = %path.display(), "opened file");
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn open_command(path: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(path);
    cmd
}

#[cfg(target_os = "windows")]
fn open_command(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", ""]).arg(path);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn open_command(path: &Path) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(path);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = SystemOpener.open(&tmp.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "file", .. }));
    }

    #[test]
    fn command_targets_the_file() {
        let cmd = open_command(Path::new("/docs/report.pdf"));
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args.last().unwrap().to_str(), Some("/docs/report.pdf"));
    }
}

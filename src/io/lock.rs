use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Name of the lock file inside `.ordo/`
pub const LOCK_FILE: &str = ".lock";

/// Exclusive advisory lock on a store directory, held for the duration of
/// one command.
///
/// Uses flock on Unix. The holder writes its pid into the lock file so a
/// waiting process can say who it is waiting for. The file is emptied on
/// release but never deleted, so every process locks the same inode.
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store is busy: {} holds {path}", holder_text(.holder))]
    Timeout { path: PathBuf, holder: Option<u32> },
}

fn holder_text(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!("ordo process {}", pid),
        None => "another ordo process".to_string(),
    }
}

impl StoreLock {
    /// Lock `store_dir`, retrying for up to `timeout`.
    pub fn acquire(store_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = store_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LockError::CreateError {
                path: path.clone(),
                source: e,
            })?;

        let start = Instant::now();
        let mut logged = false;
        while try_lock(&file).is_err() {
            if start.elapsed() >= timeout {
                return Err(LockError::Timeout {
                    holder: holder_pid(store_dir),
                    path,
                });
            }
            if !logged {
                tracing::debug!(path = %path.display(), "waiting for store lock");
                logged = true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let mut lock = StoreLock { file, path };
        if let Err(e) = lock.record_holder() {
            tracing::debug!(error = %e, "could not record lock holder");
        }
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record_holder(&mut self) -> std::io::Result<()> {
        self.file.set_len(0)?;
        write!(self.file, "{}", std::process::id())?;
        self.file.flush()
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // flock is released when the file closes
        let _ = self.file.set_len(0);
    }
}

/// Pid recorded by the current (or last) holder of the store lock
pub fn holder_pid(store_dir: &Path) -> Option<u32> {
    fs::read_to_string(store_dir.join(LOCK_FILE))
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    Ok(())
}

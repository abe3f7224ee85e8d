//! Cross-process session lock.
//!
//! The PDU menu is a single-user, stateful session: two keystroke streams
//! interleaved against it corrupt both operations. Every controller
//! invocation therefore holds an exclusive advisory lock on a file for the
//! whole lifetime of its terminal session.
//!
//! The lock is an OS-level `flock`-style lock (via `fs2`), so it serializes
//! independently launched processes, not just tasks in one process. The
//! kernel drops the lock when the holder exits, which makes a crashed
//! holder's lock immediately breakable. The file itself is never removed;
//! it only carries the holder's PID for diagnostics.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use log::{debug, info, warn};

use crate::error::{LockError, Result};

/// Default lock path shared by every invocation on a host.
pub const DEFAULT_LOCK_PATH: &str = "/tmp/apc.lock";

/// Default number of acquisition attempts.
pub const DEFAULT_LOCK_ATTEMPTS: u32 = 60;

/// Where the lock lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    /// Path of the lock file.
    pub path: PathBuf,

    /// How many times to try before giving up.
    pub attempts: u32,

    /// Pause between attempts.
    pub interval: Duration,
}

impl LockConfig {
    /// Lock config for `path` with the default retry policy.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the number of attempts.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the pause between attempts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOCK_PATH),
            attempts: DEFAULT_LOCK_ATTEMPTS,
            interval: Duration::from_secs(1),
        }
    }
}

/// Entry point for acquiring the session lock.
pub struct SessionLock;

impl SessionLock {
    /// Acquire the lock described by `config`, polling until it is free.
    ///
    /// Fails with [`LockError::Timeout`] once `config.attempts` tries have
    /// all found the lock held.
    pub async fn acquire(config: &LockConfig) -> Result<LockGuard> {
        Self::acquire_with(config, Self::try_acquire).await
    }

    async fn acquire_with<F>(config: &LockConfig, mut try_once: F) -> Result<LockGuard>
    where
        F: FnMut(&Path) -> Result<Option<LockGuard>>,
    {
        info!("Acquiring lock {}", config.path.display());

        let mut failures = 0;
        loop {
            if let Some(guard) = try_once(&config.path)? {
                debug!("lock {} acquired", config.path.display());
                return Ok(guard);
            }

            tokio::time::sleep(config.interval).await;
            failures += 1;
            if failures >= config.attempts {
                return Err(LockError::Timeout {
                    path: config.path.clone(),
                    attempts: config.attempts,
                }
                .into());
            }
            debug!(
                "lock {} busy, attempt {}/{}",
                config.path.display(),
                failures,
                config.attempts
            );
        }
    }

    /// Make a single, non-blocking attempt at the lock.
    ///
    /// Returns `Ok(None)` if another holder has it.
    pub fn try_acquire(path: &Path) -> Result<Option<LockGuard>> {
        let io_err = |source: io::Error| LockError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
                || e.kind() == io::ErrorKind::WouldBlock
            {
                return Ok(None);
            }
            return Err(io_err(e).into());
        }

        // PID is informational only
        let mut writer = &file;
        if let Err(e) = file
            .set_len(0)
            .and_then(|_| write!(writer, "{}", std::process::id()))
        {
            debug!("could not record pid in {}: {}", path.display(), e);
        }

        Ok(Some(LockGuard {
            file: Some(file),
            path: path.to_path_buf(),
        }))
    }
}

/// Proof of holding the session lock. Releases it on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: Option<File>,
    path: PathBuf,
}

impl LockGuard {
    /// Path of the held lock.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lock is still held by this guard.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock. Calling this more than once is a no-op.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                warn!("failed to unlock {}: {}", self.path.display(), e);
            }
            debug!("lock {} released", self.path.display());
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn fast_config(path: &Path, attempts: u32) -> LockConfig {
        LockConfig::new(path)
            .with_attempts(attempts)
            .with_interval(Duration::from_millis(10))
    }

    #[test]
    fn test_default_config() {
        let config = LockConfig::default();
        assert_eq!(config.path, PathBuf::from("/tmp/apc.lock"));
        assert_eq!(config.attempts, 60);
        assert_eq!(config.interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apc.lock");

        let mut guard = SessionLock::acquire(&fast_config(&path, 3)).await.unwrap();
        assert!(guard.is_held());
        assert_eq!(guard.path(), path);

        let pid = std::fs::read_to_string(&path).unwrap();
        assert_eq!(pid, std::process::id().to_string());

        guard.release();
        assert!(!guard.is_held());
        // Second release is harmless
        guard.release();
    }

    #[tokio::test]
    async fn test_contended_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apc.lock");

        let _holder = SessionLock::acquire(&fast_config(&path, 1)).await.unwrap();

        let err = SessionLock::acquire(&fast_config(&path, 3))
            .await
            .unwrap_err();
        match err {
            Error::Lock(LockError::Timeout { path: p, attempts }) => {
                assert_eq!(p, path);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected lock timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_waits_a_minute() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apc.lock");
        let _holder = SessionLock::try_acquire(&path).unwrap().unwrap();

        let start = tokio::time::Instant::now();
        let err = SessionLock::acquire(&LockConfig::new(&path)).await.unwrap_err();

        assert!(matches!(err, Error::Lock(LockError::Timeout { attempts: 60, .. })));
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_attempt_tries_the_lock_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apc.lock");
        let _holder = SessionLock::try_acquire(&path).unwrap().unwrap();

        let config = LockConfig::new(&path).with_attempts(5);
        let mut tries = Vec::new();
        let start = tokio::time::Instant::now();
        let err = SessionLock::acquire_with(&config, |p| {
            tries.push(start.elapsed());
            SessionLock::try_acquire(p)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Lock(LockError::Timeout { attempts: 5, .. })));
        let expected: Vec<_> = (0..5).map(Duration::from_secs).collect();
        assert_eq!(tries, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_attempt_can_still_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apc.lock");
        let mut holder = Some(SessionLock::try_acquire(&path).unwrap().unwrap());

        let config = LockConfig::new(&path).with_attempts(3);
        let mut tries = 0;
        let guard = SessionLock::acquire_with(&config, |p| {
            tries += 1;
            if tries == 3 {
                holder.take();
            }
            SessionLock::try_acquire(p)
        })
        .await
        .unwrap();

        assert!(guard.is_held());
        assert_eq!(tries, 3);
    }

    #[tokio::test]
    async fn test_released_lock_is_immediately_available() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apc.lock");

        let mut first = SessionLock::acquire(&fast_config(&path, 1)).await.unwrap();
        assert!(SessionLock::try_acquire(&path).unwrap().is_none());

        first.release();
        let second = SessionLock::try_acquire(&path).unwrap();
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn test_drop_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apc.lock");

        {
            let _guard = SessionLock::acquire(&fast_config(&path, 1)).await.unwrap();
        }
        assert!(SessionLock::try_acquire(&path).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_waiter_acquires_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apc.lock");

        let holder = SessionLock::acquire(&fast_config(&path, 1)).await.unwrap();
        let waiter_config = fast_config(&path, 50);
        let waiter = tokio::spawn(async move { SessionLock::acquire(&waiter_config).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(holder);

        let guard = waiter.await.unwrap().unwrap();
        assert!(guard.is_held());
    }

    #[test]
    fn test_unopenable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("apc.lock");

        match SessionLock::try_acquire(&path) {
            Err(Error::Lock(LockError::Io { path: p, .. })) => assert_eq!(p, path),
            other => panic!("expected io error, got {other:?}"),
        }
    }
}

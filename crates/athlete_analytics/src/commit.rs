//! Crash-safe publication of a run's outputs.
//!
//! Outputs are staged next to their targets and only renamed into place once
//! every table has been written. Targets that already exist are moved aside
//! first so a failed commit (including a failed state save after the rename)
//! can put the previous generation back.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::columnar::{Table, write_table};
use crate::{EtlError, Result};

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_dir(path: &Path) -> Result<()> {
    let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| EtlError::io(dir, e))
}

#[cfg(not(unix))]
fn sync_dir(_path: &Path) -> Result<()> {
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(EtlError::io(path, e)),
    }
}

/// Replace `path` with `bytes` via a synced temporary file and a rename.
///
/// Once the rename has happened the new contents are in place; a failure to
/// sync the directory afterwards is logged, not returned.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    write_atomic_with(path, bytes, sync_dir)
}

fn write_atomic_with<S>(path: &Path, bytes: &[u8], sync: S) -> Result<()>
where
    S: Fn(&Path) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
    }
    let tmp = sibling(path, "tmp");
    let written = File::create(&tmp)
        .and_then(|mut f| {
            f.write_all(bytes)?;
            f.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(EtlError::io(path, e));
    }
    if let Err(e) = sync(path) {
        tracing::warn!(path = %path.display(), error = %e, "directory sync after rename failed");
    }
    Ok(())
}

#[derive(Debug)]
struct Staged {
    target: PathBuf,
    staging: PathBuf,
}

/// Tables written to staging files, not yet visible at their targets.
///
/// Dropping an unfinalized set removes the staging files.
#[derive(Debug, Default)]
pub struct OutputSet {
    staged: Vec<Staged>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `rows` to `<target>.tmp`.
    pub fn stage<T: Table>(&mut self, target: impl Into<PathBuf>, rows: &[T]) -> Result<()> {
        let target = target.into();
        let staging = sibling(&target, "tmp");
        // registered first so a partial file is cleaned up on failure
        self.staged.push(Staged {
            target,
            staging: staging.clone(),
        });
        write_table(&staging, rows)?;
        tracing::debug!(path = %staging.display(), rows = rows.len(), "staged output");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Rename every staged file into place, keeping the replaced files as
    /// `<target>.bak`. On error nothing has changed at any target.
    pub fn finalize(self) -> Result<Published> {
        self.finalize_with(sync_dir)
    }

    fn finalize_with<S>(mut self, sync: S) -> Result<Published>
    where
        S: Fn(&Path) -> Result<()>,
    {
        let mut published = Published::default();
        let mut pending = std::mem::take(&mut self.staged).into_iter();
        while let Some(staged) = pending.next() {
            if let Err(e) = published.swap_in(&staged) {
                let _ = fs::remove_file(&staged.staging);
                for rest in pending.by_ref() {
                    let _ = fs::remove_file(&rest.staging);
                }
                if let Err(rollback) = published.rollback() {
                    tracing::error!(error = %rollback, "rollback after failed finalize did not complete");
                }
                return Err(e);
            }
        }
        let synced = published.replaced.iter().try_for_each(|r| sync(&r.target));
        if let Err(e) = synced {
            if let Err(rollback) = published.rollback() {
                tracing::error!(error = %rollback, "rollback after failed sync did not complete");
            }
            return Err(e);
        }
        Ok(published)
    }
}

impl Drop for OutputSet {
    fn drop(&mut self) {
        for staged in &self.staged {
            let _ = fs::remove_file(&staged.staging);
        }
    }
}

#[derive(Debug)]
struct Replaced {
    target: PathBuf,
    backup: Option<PathBuf>,
}

/// Outputs now visible at their targets. Either [`Published::complete`] to
/// drop the previous generation or [`Published::rollback`] to restore it.
#[derive(Debug, Default)]
pub struct Published {
    replaced: Vec<Replaced>,
}

impl Published {
    fn swap_in(&mut self, staged: &Staged) -> Result<()> {
        let backup = sibling(&staged.target, "bak");
        let had_previous = match fs::rename(&staged.target, &backup) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(EtlError::io(&staged.target, e)),
        };
        if let Err(e) = fs::rename(&staged.staging, &staged.target) {
            if had_previous {
                let _ = fs::rename(&backup, &staged.target);
            }
            return Err(EtlError::io(&staged.target, e));
        }
        self.replaced.push(Replaced {
            target: staged.target.clone(),
            backup: had_previous.then_some(backup),
        });
        Ok(())
    }

    /// Put the previous generation back. Targets that did not exist before
    /// are removed.
    pub fn rollback(mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(replaced) = self.replaced.pop() {
            let restored = match &replaced.backup {
                Some(backup) => {
                    fs::rename(backup, &replaced.target).map_err(|e| EtlError::io(backup, e))
                }
                None => remove_if_exists(&replaced.target),
            };
            if let Err(e) = restored {
                tracing::error!(path = %replaced.target.display(), error = %e, "rollback failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Discard the backups of the previous generation.
    pub fn complete(self) -> Result<()> {
        for replaced in &self.replaced {
            if let Some(backup) = &replaced.backup {
                remove_if_exists(backup)?;
            }
        }
        Ok(())
    }
}

/// Exclusive advisory lock held for the duration of a run.
#[derive(Debug)]
pub struct JobLock {
    file: File,
    path: PathBuf,
}

impl JobLock {
    /// Take the lock without waiting; a lock held elsewhere is
    /// [`EtlError::Locked`].
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| EtlError::io(&path, e))?;
        match file.try_lock() {
            Ok(()) => Ok(Self { file, path }),
            Err(TryLockError::WouldBlock) => Err(EtlError::Locked(path)),
            Err(TryLockError::Error(e)) => Err(EtlError::io(&path, e)),
        }
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release job lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columnar::read_table;
    use crate::records::AthleteMetric;
    use crate::utils::parse_timestamp;
    use tempfile::tempdir;

    fn metric(athlete: &str, load: f64) -> AthleteMetric {
        AthleteMetric {
            athlete_id: athlete.into(),
            rpe_avg: Some(6.5),
            training_load_7d: load,
            hrv_trend: None,
            generated_at: parse_timestamp("2023-01-03T00:00:00Z").unwrap(),
        }
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn sibling_appends_suffix() {
        assert_eq!(
            sibling(Path::new("/x/state.json"), "tmp"),
            Path::new("/x/state.json.tmp")
        );
    }

    #[test]
    fn staged_files_are_invisible_until_finalized() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("metrics.parquet");
        let mut outputs = OutputSet::new();
        outputs.stage(&target, &[metric("a1", 480.0)]).expect("stage");
        assert!(!target.exists());
        assert_eq!(names(dir.path()), ["metrics.parquet.tmp"]);

        outputs.finalize().expect("finalize").complete().expect("complete");
        assert_eq!(names(dir.path()), ["metrics.parquet"]);
        let rows: Vec<AthleteMetric> = read_table(&target).expect("read");
        assert_eq!(rows, vec![metric("a1", 480.0)]);
    }

    #[test]
    fn rollback_restores_previous_generation() {
        let dir = tempdir().expect("tempdir");
        let existing = dir.path().join("a.parquet");
        let fresh = dir.path().join("b.parquet");
        write_table(&existing, &[metric("old", 1.0)]).expect("seed");

        let mut outputs = OutputSet::new();
        outputs.stage(&existing, &[metric("new", 2.0)]).expect("stage a");
        outputs.stage(&fresh, &[metric("new", 3.0)]).expect("stage b");
        let published = outputs.finalize().expect("finalize");
        assert_eq!(names(dir.path()), ["a.parquet", "a.parquet.bak", "b.parquet"]);

        published.rollback().expect("rollback");
        assert_eq!(names(dir.path()), ["a.parquet"]);
        let rows: Vec<AthleteMetric> = read_table(&existing).expect("read");
        assert_eq!(rows[0].athlete_id, "old");
    }

    #[test]
    fn dropping_unfinalized_set_removes_staging() {
        let dir = tempdir().expect("tempdir");
        {
            let mut outputs = OutputSet::new();
            outputs
                .stage(dir.path().join("m.parquet"), &[metric("a1", 1.0)])
                .expect("stage");
            assert_eq!(outputs.len(), 1);
        }
        assert!(names(dir.path()).is_empty());
    }

    #[test]
    fn failed_finalize_leaves_targets_untouched() {
        let dir = tempdir().expect("tempdir");
        let good = dir.path().join("good.parquet");
        write_table(&good, &[metric("old", 1.0)]).expect("seed");
        let blocked = dir.path().join("blocked.parquet");
        write_table(&blocked, &[metric("old", 1.0)]).expect("seed");
        // an occupied backup slot stops the second swap
        fs::create_dir_all(dir.path().join("blocked.parquet.bak").join("x")).unwrap();

        let mut outputs = OutputSet::new();
        outputs.stage(&good, &[metric("new", 2.0)]).expect("stage good");
        outputs.stage(&blocked, &[metric("new", 3.0)]).expect("stage blocked");

        assert!(outputs.finalize().is_err());
        let rows: Vec<AthleteMetric> = read_table(&good).expect("read");
        assert_eq!(rows[0].athlete_id, "old");
        assert!(!dir.path().join("good.parquet.bak").exists());
        assert!(!dir.path().join("good.parquet.tmp").exists());
        assert!(!dir.path().join("blocked.parquet.tmp").exists());
        let rows: Vec<AthleteMetric> = read_table(&blocked).expect("read");
        assert_eq!(rows[0].athlete_id, "old");
    }

    fn failing_sync(path: &Path) -> Result<()> {
        Err(EtlError::io(path, std::io::Error::other("sync failed")))
    }

    #[test]
    fn failed_directory_sync_rolls_finalize_back() {
        let dir = tempdir().expect("tempdir");
        let existing = dir.path().join("a.parquet");
        write_table(&existing, &[metric("old", 1.0)]).expect("seed");

        let mut outputs = OutputSet::new();
        outputs.stage(&existing, &[metric("new", 2.0)]).expect("stage a");
        outputs
            .stage(dir.path().join("b.parquet"), &[metric("new", 3.0)])
            .expect("stage b");

        assert!(matches!(outputs.finalize_with(failing_sync), Err(EtlError::Io { .. })));
        assert_eq!(names(dir.path()), ["a.parquet"]);
        let rows: Vec<AthleteMetric> = read_table(&existing).expect("read");
        assert_eq!(rows[0].athlete_id, "old");
    }

    #[test]
    fn write_atomic_keeps_renamed_file_when_directory_sync_fails() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        write_atomic(&path, b"{}").expect("seed");
        write_atomic_with(&path, b"{\"workouts\":null}", failing_sync).expect("renamed");
        assert_eq!(fs::read(&path).unwrap(), b"{\"workouts\":null}");
        assert_eq!(names(dir.path()), ["state.json"]);
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");
        write_atomic(&path, b"{}").expect("first");
        write_atomic(&path, b"{\"workouts\":null}").expect("second");
        assert_eq!(fs::read(&path).unwrap(), b"{\"workouts\":null}");
        assert_eq!(names(&dir.path().join("nested")), ["state.json"]);
    }

    #[test]
    fn second_lock_is_refused_until_first_is_dropped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(".athlete_analytics.lock");
        let first = JobLock::acquire(&path).expect("first lock");
        assert!(matches!(JobLock::acquire(&path), Err(EtlError::Locked(p)) if p == path));
        drop(first);
        JobLock::acquire(&path).expect("lock after release");
    }
}

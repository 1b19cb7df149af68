use crate::domain::{DateRange, FileMetadata, FileWarning};
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};
use walkdir::WalkDir;

pub const LOG_FILE_SUFFIX: &str = ".log";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("session log directory does not exist: {0}")]
    DirMissing(String),

    #[error("failed to read session log directory {path}: {message}")]
    ReadDir { path: String, message: String },
}

#[derive(Clone, Debug)]
pub struct ScanOutput {
    pub files: Vec<FileMetadata>,
    /// Entries that could not be inspected and were left out of `files`.
    pub warnings: Vec<FileWarning>,
}

/// Converts a filesystem timestamp to naive local time using the offset in
/// force at that instant, so windows across a DST change still line up.
/// Falls back to UTC where the platform cannot report the offset safely.
pub fn to_local_datetime(value: SystemTime) -> PrimitiveDateTime {
    let instant = OffsetDateTime::from(value);
    let offset = UtcOffset::local_offset_at(instant).unwrap_or(UtcOffset::UTC);
    let local = instant.to_offset(offset);
    PrimitiveDateTime::new(local.date(), local.time())
}

/// Lists the `.log` files directly inside `dir` that satisfy `keep`, sorted by path.
///
/// Symlinks are followed. Entries whose metadata cannot be read, including
/// dangling links, are skipped and reported in `warnings`.
pub fn list_log_files(
    dir: &Path,
    keep: impl Fn(&FileMetadata) -> bool,
) -> Result<ScanOutput, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::DirMissing(dir.display().to_string()));
    }

    let mut warnings: Vec<FileWarning> = Vec::new();
    let mut files: Vec<FileMetadata> = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => {
                return Err(ScanError::ReadDir {
                    path: dir.display().to_string(),
                    message: error.to_string(),
                });
            }
            Err(error) => {
                let path = error.path().unwrap_or(dir).to_path_buf();
                if !is_log_name(&path) {
                    tracing::trace!(path = %path.display(), %error, "ignoring unreadable non-log entry");
                    continue;
                }
                tracing::warn!(path = %path.display(), %error, "skipping unreadable directory entry");
                warnings.push(FileWarning {
                    path,
                    message: error.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if !is_log_name(entry.path()) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(error) => {
                tracing::warn!(path = %entry.path().display(), %error, "skipping log file without metadata");
                warnings.push(FileWarning {
                    path: entry.into_path(),
                    message: error.to_string(),
                });
                continue;
            }
        };
        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(error) => {
                tracing::warn!(path = %entry.path().display(), %error, "skipping log file without mtime");
                warnings.push(FileWarning {
                    path: entry.into_path(),
                    message: error.to_string(),
                });
                continue;
            }
        };
        let created = metadata.created().unwrap_or(modified);

        let file = FileMetadata {
            path: entry.into_path(),
            size_bytes: metadata.len(),
            modified: to_local_datetime(modified),
            created: to_local_datetime(created),
        };
        if keep(&file) {
            files.push(file);
        } else {
            tracing::trace!(path = %file.path.display(), "log file filtered out");
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    warnings.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(
        dir = %dir.display(),
        selected = files.len(),
        skipped = warnings.len(),
        "scanned session log directory"
    );

    Ok(ScanOutput { files, warnings })
}

fn is_log_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(LOG_FILE_SUFFIX))
}

pub fn list_all_log_files(dir: &Path) -> Result<ScanOutput, ScanError> {
    list_log_files(dir, |_| true)
}

/// Files touched inside the closed `[start, end]` range, by mtime or ctime.
pub fn find_logs_by_threshold(
    dir: &Path,
    start: PrimitiveDateTime,
    end: PrimitiveDateTime,
) -> Result<ScanOutput, ScanError> {
    let within = |value: PrimitiveDateTime| start <= value && value <= end;
    list_log_files(dir, |file| within(file.modified) || within(file.created))
}

/// Files whose mtime or ctime calendar day lies in `range`, bounds inclusive.
pub fn find_logs_by_date_range(dir: &Path, range: &DateRange) -> Result<ScanOutput, ScanError> {
    list_log_files(dir, |file| {
        range.contains(file.modified.date()) || range.contains(file.created.date())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;
    use time::Duration;

    fn now_local() -> PrimitiveDateTime {
        to_local_datetime(SystemTime::now())
    }

    fn names(output: &ScanOutput) -> Vec<String> {
        output
            .files
            .iter()
            .filter_map(|file| file.path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn lists_only_log_suffix_sorted_by_path() {
        let dir = tempdir().expect("tempdir");
        for name in ["b.log", "a.log", "c.LOG", "notes.txt", "d.log.bak"] {
            fs::write(dir.path().join(name), "x").expect("write");
        }
        fs::create_dir(dir.path().join("nested.log")).expect("mkdir");
        fs::write(dir.path().join("nested.log").join("inner.log"), "x").expect("write");

        let output = list_all_log_files(dir.path()).expect("scan");
        assert_eq!(names(&output), vec!["a.log", "b.log"]);
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn repeated_scans_are_stable() {
        let dir = tempdir().expect("tempdir");
        for name in ["z.log", "m.log", "a.log", "k.log"] {
            fs::write(dir.path().join(name), "x").expect("write");
        }

        let first = list_all_log_files(dir.path()).expect("scan");
        let second = list_all_log_files(dir.path()).expect("scan");
        let first_paths: Vec<PathBuf> = first.files.iter().map(|f| f.path.clone()).collect();
        let second_paths: Vec<PathBuf> = second.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(first_paths, second_paths);
        assert_eq!(names(&first), vec!["a.log", "k.log", "m.log", "z.log"]);
    }

    #[test]
    fn reports_sizes() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.log"), "hello").expect("write");

        let output = list_all_log_files(dir.path()).expect("scan");
        assert_eq!(output.files[0].size_bytes, 5);
    }

    #[test]
    fn missing_dir_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let missing = dir.path().join("missing");
        assert!(matches!(
            list_all_log_files(&missing),
            Err(ScanError::DirMissing(_))
        ));
    }

    #[test]
    fn threshold_selects_recently_touched_files() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.log"), "x").expect("write");
        let now = now_local();

        let around_now =
            find_logs_by_threshold(dir.path(), now - Duration::hours(1), now + Duration::hours(1))
                .expect("scan");
        assert_eq!(names(&around_now), vec!["a.log"]);

        let long_ago = find_logs_by_threshold(
            dir.path(),
            now - Duration::days(30),
            now - Duration::days(29),
        )
        .expect("scan");
        assert!(long_ago.files.is_empty());
    }

    #[test]
    fn date_range_bounds_are_inclusive_and_optional() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.log"), "x").expect("write");
        let today = now_local().date();

        let cases = [
            (DateRange::default(), true),
            (DateRange { start: Some(today), end: Some(today) }, true),
            (DateRange { start: Some(today), end: None }, true),
            (DateRange { start: None, end: Some(today) }, true),
            (DateRange { start: today.next_day(), end: None }, false),
            (DateRange { start: None, end: today.previous_day() }, false),
            (DateRange { start: today.next_day(), end: today.previous_day() }, false),
        ];
        for (range, expected) in cases {
            let output = find_logs_by_date_range(dir.path(), &range).expect("scan");
            assert_eq!(!output.files.is_empty(), expected, "{range:?}");
        }
    }

    fn set_mtime(path: &Path, at: OffsetDateTime) {
        let file = fs::File::options().write(true).open(path).expect("open");
        file.set_modified(SystemTime::from(at)).expect("set mtime");
    }

    #[test]
    fn local_time_uses_the_offset_of_each_instant() {
        // Mid-winter and mid-summer fall on different sides of any DST change.
        for instant in [
            time::macros::datetime!(2025-01-15 18:30 UTC),
            time::macros::datetime!(2025-07-15 18:30 UTC),
        ] {
            let offset = UtcOffset::local_offset_at(instant).unwrap_or(UtcOffset::UTC);
            let expected = instant.to_offset(offset);
            assert_eq!(
                to_local_datetime(SystemTime::from(instant)),
                PrimitiveDateTime::new(expected.date(), expected.time())
            );
        }
    }

    #[test]
    fn threshold_matches_files_touched_in_another_season() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("a.log");
        fs::write(&path, "x").expect("write");
        let touched = time::macros::datetime!(2025-01-15 18:30 UTC);
        set_mtime(&path, touched);

        let local = to_local_datetime(SystemTime::from(touched));
        let found = find_logs_by_threshold(
            dir.path(),
            local - Duration::minutes(30),
            local + Duration::minutes(30),
        )
        .expect("scan");
        assert_eq!(names(&found), vec!["a.log"]);
        assert_eq!(found.files[0].modified, local);
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlinked_logs() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("target.txt");
        fs::write(&target, "hello").expect("write");
        std::os::unix::fs::symlink(&target, dir.path().join("linked.log")).expect("symlink");

        let output = list_all_log_files(dir.path()).expect("scan");
        assert_eq!(names(&output), vec!["linked.log"]);
        assert_eq!(output.files[0].size_bytes, 5);
        assert!(output.warnings.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_entries_are_reported_and_the_scan_continues() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.log"), "x").expect("write");
        fs::write(dir.path().join("c.log"), "x").expect("write");
        let dangling = dir.path().join("b.log");
        std::os::unix::fs::symlink(dir.path().join("gone"), &dangling).expect("symlink");
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("d.txt"))
            .expect("symlink");

        let output = list_all_log_files(dir.path()).expect("scan");
        assert_eq!(names(&output), vec!["a.log", "c.log"]);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].path, dangling);
        assert!(!output.warnings[0].message.is_empty());
    }
}

use dirs::{data_dir, home_dir};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Removal that the operator can undo.
pub trait RecoverableDelete {
    fn remove(&self, path: &Path) -> Result<PathBuf, TrashError>;
}

#[derive(Debug, Error)]
pub enum ResolveTrashDirError {
    #[error("home directory not found")]
    HomeDirNotFound,
}

#[derive(Debug, Error)]
pub enum TrashError {
    #[error("not a file name: {0}")]
    NoFileName(String),

    #[error("failed to prepare trash directory {path}: {source}")]
    Prepare {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to move {path} to trash: {source}")]
    Move {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to record trash info for {path}: {source}")]
    Info {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrashLayout {
    /// `files/` + `info/*.trashinfo`, as desktop trash cans on Linux expect.
    Freedesktop,
    /// Files dropped directly in the directory (macOS `~/.Trash`).
    Flat,
}

#[derive(Clone, Debug)]
pub struct TrashDir {
    root: PathBuf,
    layout: TrashLayout,
}

pub fn resolve_trash_dir() -> Result<TrashDir, ResolveTrashDirError> {
    if let Some(override_dir) = std::env::var_os("TERMLOGS_TRASH_DIR") {
        return Ok(TrashDir::new(
            PathBuf::from(override_dir),
            TrashLayout::Freedesktop,
        ));
    }

    if cfg!(target_os = "macos") {
        let Some(home) = home_dir() else {
            return Err(ResolveTrashDirError::HomeDirNotFound);
        };
        return Ok(TrashDir::new(home.join(".Trash"), TrashLayout::Flat));
    }

    let Some(data) = data_dir() else {
        return Err(ResolveTrashDirError::HomeDirNotFound);
    };
    Ok(TrashDir::new(data.join("Trash"), TrashLayout::Freedesktop))
}

impl TrashDir {
    pub fn new(root: PathBuf, layout: TrashLayout) -> Self {
        Self { root, layout }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files_dir(&self) -> PathBuf {
        match self.layout {
            TrashLayout::Freedesktop => self.root.join("files"),
            TrashLayout::Flat => self.root.clone(),
        }
    }

    fn info_dir(&self) -> Option<PathBuf> {
        match self.layout {
            TrashLayout::Freedesktop => Some(self.root.join("info")),
            TrashLayout::Flat => None,
        }
    }

    fn prepare(&self) -> Result<(PathBuf, Option<PathBuf>), TrashError> {
        let files_dir = self.files_dir();
        let info_dir = self.info_dir();
        for dir in std::iter::once(&files_dir).chain(info_dir.as_ref()) {
            fs::create_dir_all(dir).map_err(|source| TrashError::Prepare {
                path: dir.display().to_string(),
                source,
            })?;
        }
        Ok((files_dir, info_dir))
    }

    /// The `$topdir/.Trash-$uid` can for files living on another filesystem.
    #[cfg(unix)]
    fn mount_trash_for(&self, path: &Path) -> Option<TrashDir> {
        use std::os::unix::fs::MetadataExt;

        if self.layout != TrashLayout::Freedesktop {
            return None;
        }
        // SAFETY: getuid has no preconditions and cannot fail.
        let uid = unsafe { libc::getuid() };
        let device_of = |path: &Path| fs::metadata(path).ok().map(|metadata| metadata.dev());
        let root = mount_trash_root(path, &self.root, uid, device_of)?;
        Some(TrashDir::new(root, TrashLayout::Freedesktop))
    }

    #[cfg(not(unix))]
    fn mount_trash_for(&self, _path: &Path) -> Option<TrashDir> {
        None
    }
}

impl RecoverableDelete for TrashDir {
    fn remove(&self, path: &Path) -> Result<PathBuf, TrashError> {
        let absolute = absolute_path(path)?;

        let (files_dir, info_dir) = match self.mount_trash_for(&absolute) {
            Some(mount) => match mount.prepare() {
                Ok(dirs) => dirs,
                Err(error) => {
                    tracing::debug!(%error, "mount trash unavailable, using home trash");
                    self.prepare()?
                }
            },
            None => self.prepare()?,
        };
        let name = free_name(&files_dir, info_dir.as_deref(), &absolute)?;
        let target = files_dir.join(&name);

        let info_path = info_dir.map(|dir| dir.join(format!("{name}.trashinfo")));
        if let Some(info_path) = &info_path {
            let record = trash_info_record(&absolute, now_local());
            fs::write(info_path, record).map_err(|source| TrashError::Info {
                path: path.display().to_string(),
                source,
            })?;
        }

        if let Err(source) = move_file(&absolute, &target) {
            if let Some(info_path) = &info_path {
                let _ = fs::remove_file(info_path);
            }
            return Err(TrashError::Move {
                path: path.display().to_string(),
                source,
            });
        }

        tracing::info!(from = %absolute.display(), to = %target.display(), "moved to trash");
        Ok(target)
    }
}

/// Absolute path with the parent resolved but the final component kept,
/// so a symlinked log is trashed as the link itself.
fn absolute_path(path: &Path) -> Result<PathBuf, TrashError> {
    let move_error = |source: io::Error| TrashError::Move {
        path: path.display().to_string(),
        source,
    };
    let Some(name) = path.file_name() else {
        return Err(TrashError::NoFileName(path.display().to_string()));
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let absolute = fs::canonicalize(parent).map_err(move_error)?.join(name);
    fs::symlink_metadata(&absolute).map_err(move_error)?;
    Ok(absolute)
}

/// Walks up from `path` to the top of its filesystem when that differs
/// from the one holding `home_trash`.
#[cfg_attr(not(unix), allow(dead_code))]
fn mount_trash_root(
    path: &Path,
    home_trash: &Path,
    uid: u32,
    device_of: impl Fn(&Path) -> Option<u64>,
) -> Option<PathBuf> {
    let home_device = home_trash.ancestors().find_map(&device_of)?;
    let mut topdir = path.parent()?;
    let device = device_of(topdir)?;
    if device == home_device {
        return None;
    }
    while let Some(parent) = topdir.parent() {
        if device_of(parent) != Some(device) {
            break;
        }
        topdir = parent;
    }
    Some(topdir.join(format!(".Trash-{uid}")))
}

fn free_name(
    files_dir: &Path,
    info_dir: Option<&Path>,
    path: &Path,
) -> Result<String, TrashError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| TrashError::NoFileName(path.display().to_string()))?;
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let taken = |candidate: &str| {
        files_dir.join(candidate).exists()
            || info_dir.is_some_and(|info| info.join(format!("{candidate}.trashinfo")).exists())
    };

    let mut candidate = name.to_string();
    let mut counter = 1u32;
    while taken(&candidate) {
        candidate = match ext {
            Some(ext) => format!("{stem}.{counter}.{ext}"),
            None => format!("{stem}.{counter}"),
        };
        counter += 1;
    }
    Ok(candidate)
}

fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(error) => Err(error),
    }
}

fn now_local() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    PrimitiveDateTime::new(now.date(), now.time())
}

fn trash_info_record(original: &Path, deleted_at: PrimitiveDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let deleted_at = deleted_at
        .format(&format)
        .unwrap_or_else(|_| deleted_at.to_string());
    format!(
        "[Trash Info]\nPath={}\nDeletionDate={deleted_at}\n",
        percent_encode_path(&original.to_string_lossy())
    )
}

fn percent_encode_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || b"/-_.~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

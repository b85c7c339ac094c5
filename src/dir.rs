//! Whole-directory helpers: zip a directory tree, or extract every entry under a directory.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::archive::{OpenMode, ZipArchive};
use crate::file::ZipFile;
use crate::result::{ZipError, ZipResult};
use crate::store::ZipStore;
use crate::write::{FileOptions, NewFileInfo};

/// Add the contents of `root` to `archive`, with names relative to `root` and `/` separators.
///
/// Directories get their own entries with a trailing `/`. Without `recursive`, only the
/// immediate children of `root` are added and subdirectories are skipped entirely. Entries are
/// added in file-name order. Returns the number of entries added.
pub fn add_dir<S: ZipStore>(
    archive: &mut ZipArchive<S>,
    root: impl AsRef<Path>,
    recursive: bool,
    options: FileOptions,
) -> ZipResult<usize> {
    let root = root.as_ref();
    let mut walk = WalkDir::new(root).min_depth(1).sort_by_file_name();
    if !recursive {
        walk = walk.max_depth(1);
    }
    let mut file = ZipFile::new(archive);
    let mut added = 0;
    for entry in walk {
        let entry = entry.map_err(std::io::Error::from)?;
        let is_dir = entry.file_type().is_dir();
        if is_dir && !recursive {
            continue;
        }
        let Some(mut name) = entry_name(root, entry.path()) else {
            log::warn!("skipping {}: name is not valid unicode", entry.path().display());
            continue;
        };
        if is_dir {
            name.push('/');
        }
        file.open_write(NewFileInfo::from_path(name, entry.path())?, None, options)?;
        if entry.file_type().is_file() {
            std::io::copy(&mut File::open(entry.path())?, &mut file)?;
        }
        file.close()?;
        added += 1;
    }
    log::debug!("added {added} entries from {}", root.display());
    Ok(added)
}

/// Create the zip file `zip_path` holding the contents of `dir`. See [`add_dir`].
pub fn compress_dir(
    zip_path: impl AsRef<Path>,
    dir: impl AsRef<Path>,
    recursive: bool,
) -> ZipResult<usize> {
    let store = File::create(zip_path)?;
    let mut archive = ZipArchive::open(store, OpenMode::Create)?;
    let added = add_dir(&mut archive, dir, recursive, FileOptions::default())?;
    archive.close()?;
    Ok(added)
}

/// Extract every entry of `archive` under `target`, overwriting existing files.
///
/// Entry names that are absolute or climb out of `target` fail with
/// [`ZipError::InvalidArchive`]. Unix permissions are applied once all files are written.
/// Returns the paths created, in central directory order.
pub fn extract_all<S: ZipStore>(
    archive: &mut ZipArchive<S>,
    target: impl AsRef<Path>,
    password: Option<&[u8]>,
) -> ZipResult<Vec<PathBuf>> {
    let target = target.as_ref();
    let mut extracted = Vec::new();
    #[cfg(unix)]
    let mut modes = Vec::new();

    let mut more = archive.go_to_first_file();
    while more {
        let Some(info) = archive.current_file_info() else {
            break;
        };
        let relative = enclosed_path(&info.name).ok_or_else(|| {
            ZipError::InvalidArchive(format!("unsafe entry name {:?}", info.name).into())
        })?;
        let path = target.join(relative);
        if info.is_dir() {
            fs::create_dir_all(&path)?;
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)?;
            let mut file = ZipFile::new(archive);
            file.open_read(password)?;
            std::io::copy(&mut file, &mut out)?;
            file.close()?;
            #[cfg(unix)]
            if let Some(mode) = info.unix_mode() {
                modes.push((path.clone(), mode));
            }
        }
        extracted.push(path);
        more = archive.go_to_next_file();
    }

    #[cfg(unix)]
    for (path, mode) in modes {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(mode & 0o7777))?;
    }
    Ok(extracted)
}

/// Extract the zip file `zip_path` under `dir`. See [`extract_all`].
pub fn extract_dir(
    zip_path: impl AsRef<Path>,
    dir: impl AsRef<Path>,
) -> ZipResult<Vec<PathBuf>> {
    let mut archive = ZipArchive::open(File::open(zip_path)?, OpenMode::Unzip)?;
    extract_all(&mut archive, dir, None)
}

fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Relative path of an entry name, or `None` if it is absolute or leaves its root.
fn enclosed_path(name: &str) -> Option<PathBuf> {
    if name.contains('\0') {
        return None;
    }
    let name = name.replace('\\', "/");
    let mut parts: Vec<&OsStr> = Vec::new();
    for component in Path::new(&name).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return None,
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.iter().collect())
}

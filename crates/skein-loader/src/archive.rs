//! Plugin archive scanning and entry decoding.
//!
//! Archives are plain or gzip-compressed tarballs sitting directly inside a
//! mount directory.  Scanning only indexes entry paths; entry bytes are
//! streamed out of the archive on demand.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ArchiveError, ArchiveResult};

// =============================================================================
// ArchiveFormat
// =============================================================================

/// Container format of a mounted archive, derived from its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `*.tar`
    Tar,
    /// `*.tar.gz` or `*.tgz`
    #[cfg(feature = "gzip")]
    TarGz,
}

impl ArchiveFormat {
    /// Detects the format from the file name, `None` for anything else.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".tar") {
            return Some(Self::Tar);
        }
        #[cfg(feature = "gzip")]
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            return Some(Self::TarGz);
        }
        None
    }

    fn open(self, path: &Path) -> ArchiveResult<Box<dyn Read>> {
        let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
        let reader = BufReader::new(file);
        Ok(match self {
            Self::Tar => Box::new(reader),
            #[cfg(feature = "gzip")]
            Self::TarGz => Box::new(flate2::read::GzDecoder::new(reader)),
        })
    }
}

// =============================================================================
// ArchiveHandle
// =============================================================================

/// A scanned archive: its location plus the set of regular-file entries.
#[derive(Debug, Clone)]
pub struct ArchiveHandle {
    path: PathBuf,
    format: ArchiveFormat,
    entries: HashSet<String>,
}

impl ArchiveHandle {
    /// Opens `path` and indexes every regular-file entry.
    pub fn open(path: impl Into<PathBuf>) -> ArchiveResult<Self> {
        let path = path.into();
        let format =
            ArchiveFormat::detect(&path).ok_or_else(|| ArchiveError::Unsupported(path.clone()))?;

        let mut archive = tar::Archive::new(format.open(&path)?);
        let mut entries = HashSet::new();
        for entry in archive.entries().map_err(|e| ArchiveError::io(&path, e))? {
            let entry = entry.map_err(|e| ArchiveError::io(&path, e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = entry.path().map_err(|e| ArchiveError::io(&path, e))?;
            entries.insert(normalize_entry(&name));
        }

        debug!(archive = %path.display(), entries = entries.len(), "Indexed archive");
        Ok(Self {
            path,
            format,
            entries,
        })
    }

    /// Path of the archive on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Returns `true` if the archive holds a regular file at `entry`.
    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Streams `entry` out of the archive.
    pub fn read(&self, entry: &str) -> ArchiveResult<Vec<u8>> {
        read_entry_as(&self.path, self.format, entry)
    }
}

/// Streams `entry` out of the archive at `archive`.
pub fn read_entry(archive: &Path, entry: &str) -> ArchiveResult<Vec<u8>> {
    let format = ArchiveFormat::detect(archive)
        .ok_or_else(|| ArchiveError::Unsupported(archive.to_path_buf()))?;
    read_entry_as(archive, format, entry)
}

fn read_entry_as(path: &Path, format: ArchiveFormat, wanted: &str) -> ArchiveResult<Vec<u8>> {
    let mut archive = tar::Archive::new(format.open(path)?);
    for entry in archive.entries().map_err(|e| ArchiveError::io(path, e))? {
        let mut entry = entry.map_err(|e| ArchiveError::io(path, e))?;
        let name = entry.path().map_err(|e| ArchiveError::io(path, e))?;
        if normalize_entry(&name) != wanted {
            continue;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| ArchiveError::io(path, e))?;
        return Ok(bytes);
    }
    Err(ArchiveError::EntryNotFound {
        archive: path.to_path_buf(),
        entry: wanted.to_string(),
    })
}

fn normalize_entry(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    raw.trim_start_matches("./").to_string()
}

// =============================================================================
// Mount scanning
// =============================================================================

/// Lists the archives sitting directly inside `mount`, sorted by file name.
///
/// A missing mount directory yields an empty list.
pub fn list_archives(mount: &Path) -> Vec<PathBuf> {
    let dir = match fs::read_dir(mount) {
        Ok(dir) => dir,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(mount = %mount.display(), error = %e, "Cannot list plugin mount");
            return Vec::new();
        }
    };

    let mut archives: Vec<PathBuf> = dir
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && ArchiveFormat::detect(path).is_some())
        .collect();
    archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    archives
}

/// Scans every mount in order and opens each archive found.
///
/// Archives that fail to open are logged and skipped.
pub fn scan_mounts(mounts: &[PathBuf]) -> Vec<ArchiveHandle> {
    let mut handles = Vec::new();
    for mount in mounts {
        for path in list_archives(mount) {
            match ArchiveHandle::open(&path) {
                Ok(handle) => handles.push(handle),
                Err(e) => warn!(archive = %path.display(), error = %e, "Skipping unreadable archive"),
            }
        }
    }
    handles
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs::File;
    use std::path::{Path, PathBuf};

    /// Writes a tarball named `file_name` into `dir` holding `entries`.
    pub fn write_archive(dir: &Path, file_name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(file_name);
        let file = File::create(&path).unwrap();

        #[cfg(feature = "gzip")]
        if file_name.ends_with(".gz") || file_name.ends_with(".tgz") {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            append_all(&mut builder, entries);
            builder.into_inner().unwrap().finish().unwrap();
            return path;
        }

        let mut builder = tar::Builder::new(file);
        append_all(&mut builder, entries);
        builder.finish().unwrap();
        path
    }

    fn append_all<W: std::io::Write>(builder: &mut tar::Builder<W>, entries: &[(&str, &[u8])]) {
        for (name, bytes) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder.append_data(&mut header, name, *bytes).unwrap();
        }
    }
}

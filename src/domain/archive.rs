//! Archive entry model.
//!
//! Entries are keyed by a normalized forward-slash path. Directories are kept
//! as explicit entries so a repacked archive carries them in sorted order.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::constants::{META_INF_DIR, SIGNATURE_BLOCK_EXTENSIONS, SIGNATURE_FILE_EXTENSION};
use crate::domain::manifest::has_line_control;
use crate::infra::error::{SigningError, SigningResult};

/// One archive entry, owned by the working tree for the duration of an operation.
#[derive(Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub contents: Vec<u8>,
    pub is_dir: bool,
    /// Timestamp recorded in the source archive, if any.
    pub modified: Option<zip::DateTime>,
}

impl ArchiveEntry {
    pub fn file(path: &str, contents: Vec<u8>) -> SigningResult<Self> {
        Ok(Self {
            path: normalize_entry_path(path)?,
            contents,
            is_dir: false,
            modified: None,
        })
    }

    pub fn directory(path: &str) -> SigningResult<Self> {
        Ok(Self {
            path: normalize_entry_path(path)?,
            contents: Vec::new(),
            is_dir: true,
            modified: None,
        })
    }

    #[must_use]
    pub fn with_modified(mut self, modified: Option<zip::DateTime>) -> Self {
        self.modified = modified;
        self
    }

    /// Name as written to the container (directories end with `/`).
    #[must_use]
    pub fn archive_name(&self) -> String {
        if self.is_dir {
            format!("{}/", self.path)
        } else {
            self.path.clone()
        }
    }

    #[must_use]
    pub fn is_metadata(&self) -> bool {
        is_metadata_path(&self.path)
    }
}

impl fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveEntry")
            .field("path", &self.path)
            .field("len", &self.contents.len())
            .field("is_dir", &self.is_dir)
            .finish()
    }
}

/// Normalize an entry name: forward slashes, no leading `/` or `./`, no empty
/// or `.` components, no trailing slash. Parent references are rejected, and
/// so are CR, LF and NUL since names are written into manifest headers.
pub fn normalize_entry_path(raw: &str) -> SigningResult<String> {
    if has_line_control(raw) {
        return Err(SigningError::MalformedArchive(format!(
            "Entry name contains a line break or NUL: {raw:?}"
        )));
    }
    let unified = raw.replace('\\', "/");
    let mut parts = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                return Err(SigningError::MalformedArchive(format!(
                    "Entry path escapes the archive root: {raw}"
                )));
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Err(SigningError::MalformedArchive(format!(
            "Entry path is empty: {raw:?}"
        )));
    }
    Ok(parts.join("/"))
}

/// True when the first path component is the metadata directory (ASCII case-insensitive).
#[must_use]
pub fn is_metadata_path(path: &str) -> bool {
    path.split('/')
        .next()
        .is_some_and(|first| first.eq_ignore_ascii_case(META_INF_DIR))
}

/// Direct child file name of the metadata directory, if `path` is one.
fn metadata_file_name(path: &str) -> Option<&str> {
    let (dir, name) = path.split_once('/')?;
    if dir.eq_ignore_ascii_case(META_INF_DIR) && !name.is_empty() && !name.contains('/') {
        Some(name)
    } else {
        None
    }
}

/// Signer alias when `path` is `META-INF/<alias>.SF`.
#[must_use]
pub fn signature_file_alias(path: &str) -> Option<&str> {
    let name = metadata_file_name(path)?;
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && ext.eq_ignore_ascii_case(SIGNATURE_FILE_EXTENSION)).then_some(stem)
}

/// True for `META-INF/<alias>.SF` and `META-INF/<alias>.<block ext>` entries.
#[must_use]
pub fn is_signature_related(path: &str) -> bool {
    let Some(name) = metadata_file_name(path) else {
        return false;
    };
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    ext.eq_ignore_ascii_case(SIGNATURE_FILE_EXTENSION)
        || SIGNATURE_BLOCK_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
}

/// All entries of one archive, sorted by normalized path.
#[derive(Debug, Clone, Default)]
pub struct ArchiveContents {
    entries: BTreeMap<String, ArchiveEntry>,
}

impl ArchiveContents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. A second entry with the same normalized path is a malformed archive.
    pub fn insert(&mut self, entry: ArchiveEntry) -> SigningResult<()> {
        if let Some(existing) = self.entries.get(&entry.path) {
            // Explicit directory entries may repeat implied ones
            if existing.is_dir && entry.is_dir {
                return Ok(());
            }
            return Err(SigningError::MalformedArchive(format!(
                "Duplicate entry: {}",
                entry.path
            )));
        }
        self.entries.insert(entry.path.clone(), entry);
        Ok(())
    }

    /// Insert or overwrite a generated file entry.
    pub fn put(&mut self, entry: ArchiveEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn remove(&mut self, path: &str) -> Option<ArchiveEntry> {
        self.entries.remove(path)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries.get(path)
    }

    /// Look up a direct child of the metadata directory, ignoring ASCII case.
    #[must_use]
    pub fn find_metadata_file(&self, file_name: &str) -> Option<&ArchiveEntry> {
        let exact = format!("{META_INF_DIR}/{file_name}");
        if let Some(entry) = self.entries.get(&exact) {
            return Some(entry);
        }
        self.entries.values().find(|entry| {
            !entry.is_dir
                && metadata_file_name(&entry.path)
                    .is_some_and(|name| name.eq_ignore_ascii_case(file_name))
        })
    }

    /// Every entry in sorted path order.
    pub fn iter(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries.values()
    }

    /// Non-directory entries outside the metadata directory, in sorted order.
    pub fn content_files(&self) -> impl Iterator<Item = &ArchiveEntry> {
        self.entries
            .values()
            .filter(|entry| !entry.is_dir && !entry.is_metadata())
    }

    /// Signer aliases found as `META-INF/<alias>.SF`, in sorted order.
    #[must_use]
    pub fn signer_aliases(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|entry| !entry.is_dir)
            .filter_map(|entry| signature_file_alias(&entry.path).map(str::to_string))
            .collect()
    }

    /// Reject paths that differ only in ASCII case, at any depth.
    ///
    /// Such entries would share one file or directory on a case-insensitive
    /// filesystem, and the working tree would silently lose one of them.
    pub fn check_case_collisions(&self) -> SigningResult<()> {
        let mut seen: BTreeMap<String, &str> = BTreeMap::new();
        for path in self.entries.keys() {
            let prefixes = path
                .match_indices('/')
                .map(|(at, _)| &path[..at])
                .chain(std::iter::once(path.as_str()));
            for prefix in prefixes {
                let folded = prefix.to_ascii_lowercase();
                match seen.get(&folded) {
                    Some(existing) if *existing != prefix => {
                        return Err(SigningError::MalformedArchive(format!(
                            "Entries differ only in letter case: {existing} and {prefix}"
                        )));
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(folded, prefix);
                    }
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

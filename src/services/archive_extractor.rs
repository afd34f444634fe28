//! Archive extraction to a scratch working tree and deterministic repacking.
//!
//! The working tree lives in a uniquely named temporary directory that is
//! removed when the tree is closed or dropped, whichever happens first.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::domain::archive::{is_metadata_path, normalize_entry_path, ArchiveContents, ArchiveEntry};
use crate::domain::constants::{MANIFEST_PATH, META_INF_DIR};
use crate::infra::error::{SigningError, SigningResult};

const FILE_PERMISSIONS: u32 = 0o644;
const DIR_PERMISSIONS: u32 = 0o755;
const WORK_DIR_PREFIX: &str = "sm2-jar-signer-";

/// Extracted archive on disk, scoped to one operation.
pub struct WorkingTree {
    dir: TempDir,
    /// Timestamps recorded from the source archive, by normalized path.
    timestamps: BTreeMap<String, DateTime>,
}

impl WorkingTree {
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn disk_path(&self, path: &str) -> PathBuf {
        path.split('/')
            .fold(self.dir.path().to_path_buf(), |acc, part| acc.join(part))
    }

    pub fn read_file(&self, path: &str) -> SigningResult<Vec<u8>> {
        fs::read(self.disk_path(path))
            .map_err(|e| SigningError::IoError(format!("Failed to read entry {path}: {e}")))
    }

    /// Write a generated entry, creating parent directories.
    pub fn write_file(&mut self, path: &str, contents: &[u8]) -> SigningResult<()> {
        let path = normalize_entry_path(path)?;
        let target = self.disk_path(&path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, contents)
            .map_err(|e| SigningError::IoError(format!("Failed to write entry {path}: {e}")))?;
        self.timestamps.remove(&path);
        Ok(())
    }

    pub fn remove_file(&mut self, path: &str) -> SigningResult<()> {
        fs::remove_file(self.disk_path(path))
            .map_err(|e| SigningError::IoError(format!("Failed to remove entry {path}: {e}")))?;
        self.timestamps.remove(path);
        Ok(())
    }

    /// Every entry currently on disk, keyed and sorted by normalized archive path.
    pub fn entries(&self) -> SigningResult<BTreeMap<String, bool>> {
        let mut entries = BTreeMap::new();
        for item in WalkDir::new(self.root()).min_depth(1) {
            let item = item?;
            let relative = item.path().strip_prefix(self.root()).map_err(|e| {
                SigningError::IoError(format!("Entry outside working tree: {e}"))
            })?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.insert(name, item.file_type().is_dir());
        }
        Ok(entries)
    }

    /// Non-metadata files in sorted order.
    pub fn content_files(&self) -> SigningResult<Vec<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|(path, is_dir)| !is_dir && !is_metadata_path(path))
            .map(|(path, _)| path)
            .collect())
    }

    /// Path of an existing entry directly under the metadata directory, ignoring case.
    pub fn find_metadata_file(&self, file_name: &str) -> SigningResult<Option<String>> {
        Ok(self.entries()?.into_iter().find_map(|(path, is_dir)| {
            let (dir, name) = path.split_once('/')?;
            (!is_dir
                && dir.eq_ignore_ascii_case(META_INF_DIR)
                && name.eq_ignore_ascii_case(file_name))
            .then_some(path)
        }))
    }

    /// Remove the scratch directory now, reporting failures.
    pub fn close(self) -> SigningResult<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| {
            SigningError::IoError(format!(
                "Failed to remove working directory {}: {e}",
                path.display()
            ))
        })?;
        log::debug!("Removed working directory {}", path.display());
        Ok(())
    }
}

impl std::fmt::Debug for WorkingTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WorkingTree({})", self.dir.path().display())
    }
}

/// Reads archives into working trees or memory and writes them back.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Materialize every entry of `archive` under a fresh scratch directory.
    pub fn extract(&self, archive: &Path) -> SigningResult<WorkingTree> {
        let contents = self.read(archive)?;
        contents.check_case_collisions()?;
        let dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir()
            .map_err(|e| SigningError::IoError(format!("Failed to create working directory: {e}")))?;
        log::debug!("Extracting {} into {}", archive.display(), dir.path().display());

        let mut tree = WorkingTree {
            dir,
            timestamps: BTreeMap::new(),
        };
        for entry in contents.iter() {
            let target = tree.disk_path(&entry.path);
            if entry.is_dir {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&target, &entry.contents).map_err(|e| {
                    SigningError::IoError(format!("Failed to extract {}: {e}", entry.path))
                })?;
            }
            if let Some(modified) = entry.modified {
                tree.timestamps.insert(entry.path.clone(), modified);
            }
        }
        log::info!("Extracted {} entries from {}", contents.len(), archive.display());
        Ok(tree)
    }

    /// Read all entries of the archive at `archive` into memory.
    pub fn read(&self, archive: &Path) -> SigningResult<ArchiveContents> {
        let file = fs::File::open(archive).map_err(|e| {
            SigningError::IoError(format!("Failed to open {}: {e}", archive.display()))
        })?;
        self.read_from(file)
    }

    /// Read all entries from an in-memory archive.
    pub fn read_bytes(&self, bytes: &[u8]) -> SigningResult<ArchiveContents> {
        self.read_from(Cursor::new(bytes))
    }

    fn read_from<R: Read + Seek>(&self, reader: R) -> SigningResult<ArchiveContents> {
        let mut zip = ZipArchive::new(reader)?;
        let mut contents = ArchiveContents::new();
        for index in 0..zip.len() {
            let mut file = zip.by_index(index)?;
            let name = file.name().to_string();
            let modified = file.last_modified();
            let entry = if file.is_dir() {
                ArchiveEntry::directory(&name)?
            } else {
                let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
                file.read_to_end(&mut data).map_err(|e| {
                    SigningError::MalformedArchive(format!("Failed to read entry {name}: {e}"))
                })?;
                ArchiveEntry::file(&name, data)?
            };
            contents.insert(entry.with_modified(modified))?;
        }
        Ok(contents)
    }

    /// Write the working tree as an archive: manifest first, then every other
    /// entry (directories included) in lexicographic path order.
    pub fn repack(&self, tree: &WorkingTree) -> SigningResult<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let entries = tree.entries()?;
        let manifest = entries
            .keys()
            .find(|path| path.eq_ignore_ascii_case(MANIFEST_PATH))
            .cloned();

        if let Some(manifest) = &manifest {
            let data = tree.read_file(manifest)?;
            self.write_entry(&mut writer, manifest, &data, entry_time(tree, manifest))?;
        }
        for (path, is_dir) in &entries {
            if Some(path) == manifest.as_ref() {
                continue;
            }
            let time = entry_time(tree, path);
            if *is_dir {
                let options = SimpleFileOptions::default()
                    .last_modified_time(time)
                    .unix_permissions(DIR_PERMISSIONS);
                writer.add_directory(format!("{path}/"), options)?;
            } else {
                let data = tree.read_file(path)?;
                self.write_entry(&mut writer, path, &data, time)?;
            }
        }

        let bytes = writer.finish()?.into_inner();
        log::debug!("Repacked {} entries into {} bytes", entries.len(), bytes.len());
        Ok(bytes)
    }

    fn write_entry<W: Write + Seek>(
        &self,
        writer: &mut ZipWriter<W>,
        path: &str,
        data: &[u8],
        time: DateTime,
    ) -> SigningResult<()> {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(time)
            .unix_permissions(FILE_PERMISSIONS);
        writer.start_file(path, options)?;
        writer
            .write_all(data)
            .map_err(|e| SigningError::IoError(format!("Failed to write entry {path}: {e}")))?;
        Ok(())
    }
}

/// Source timestamp when known, otherwise the fixed DOS epoch.
fn entry_time(tree: &WorkingTree, path: &str) -> DateTime {
    tree.timestamps.get(path).copied().unwrap_or_default()
}

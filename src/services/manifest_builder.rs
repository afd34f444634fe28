//! Per-entry digest computation merged into the archive manifest.

use crate::domain::archive::is_metadata_path;
use crate::domain::constants::{CREATED_BY_KEY, MANIFEST_FILE_NAME};
use crate::domain::crypto::DigestAlgorithm;
use crate::domain::manifest::Manifest;
use crate::infra::error::SigningResult;
use crate::services::archive_extractor::WorkingTree;

/// Finalized manifest and its serialized form.
#[derive(Debug, Clone)]
pub struct DigestedManifest {
    pub manifest: Manifest,
    /// Exact bytes to write and to digest into the signature file.
    pub bytes: Vec<u8>,
    pub digested: usize,
}

/// Computes content digests and merges them into a manifest.
#[derive(Debug, Clone, Copy)]
pub struct DigestManifestBuilder {
    algorithm: DigestAlgorithm,
}

impl DigestManifestBuilder {
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self { algorithm }
    }

    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Parse the archive's manifest, or start a new one tagged with `created_by`.
    ///
    /// Sections naming metadata paths are dropped either way.
    pub fn load_or_create(&self, existing: Option<&[u8]>, created_by: &str) -> SigningResult<Manifest> {
        let mut manifest = match existing {
            Some(bytes) => {
                let manifest = Manifest::parse(bytes)?;
                log::debug!(
                    "Loaded existing manifest with {} entry section(s)",
                    manifest.entry_count()
                );
                manifest
            }
            None => {
                log::debug!("No manifest in archive, creating one");
                let mut manifest = Manifest::new();
                manifest.main_attributes_mut().set(CREATED_BY_KEY, created_by);
                manifest
            }
        };

        let stale: Vec<String> = manifest
            .entries()
            .filter(|(path, _)| is_metadata_path(path))
            .map(|(path, _)| path.to_string())
            .collect();
        for path in stale {
            log::debug!("Dropping manifest section for metadata path {path}");
            manifest.remove_entry(&path);
        }
        Ok(manifest)
    }

    /// Set the digest attribute for one entry, keeping its other attributes.
    ///
    /// Returns `false` without touching the manifest for metadata paths.
    pub fn add_entry(&self, manifest: &mut Manifest, path: &str, contents: &[u8]) -> bool {
        if is_metadata_path(path) {
            return false;
        }
        let digest = self.algorithm.digest(contents);
        manifest
            .entry_mut(path)
            .set(&self.algorithm.entry_attribute(), digest.to_base64());
        true
    }

    /// Digest every content file of `tree` in sorted path order.
    pub fn build(&self, tree: &WorkingTree, created_by: &str) -> SigningResult<DigestedManifest> {
        let existing = match tree.find_metadata_file(MANIFEST_FILE_NAME)? {
            Some(path) => Some(tree.read_file(&path)?),
            None => None,
        };
        let mut manifest = self.load_or_create(existing.as_deref(), created_by)?;

        let mut digested = 0;
        // content_files() is sorted
        for path in tree.content_files()? {
            let contents = tree.read_file(&path)?;
            if self.add_entry(&mut manifest, &path, &contents) {
                log::debug!("Digested {path} ({} bytes)", contents.len());
                digested += 1;
            }
        }

        let bytes = manifest.to_bytes()?;
        log::info!(
            "Computed {} digests for {digested} entries",
            self.algorithm.jar_name()
        );
        Ok(DigestedManifest {
            manifest,
            bytes,
            digested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manifest_carries_version_and_creator() {
        let builder = DigestManifestBuilder::new(DigestAlgorithm::Sm3);
        let manifest = builder.load_or_create(None, "test-tool").unwrap();
        let text = String::from_utf8(manifest.to_bytes().unwrap()).unwrap();
        assert_eq!(text, "Manifest-Version: 1.0\r\nCreated-By: test-tool\r\n\r\n");
    }

    #[test]
    fn existing_attributes_are_merged_not_replaced() {
        let existing = b"Manifest-Version: 1.0\r\nMain-Class: app.Main\r\n\r\n\
Name: a.txt\r\nX-Custom: keep\r\n\r\n\
Name: META-INF/old.SF\r\nSM3-Digest: stale\r\n\r\n";
        let builder = DigestManifestBuilder::new(DigestAlgorithm::Sm3);
        let mut manifest = builder.load_or_create(Some(&existing[..]), "ignored").unwrap();
        assert!(builder.add_entry(&mut manifest, "a.txt", b"hello"));

        assert_eq!(manifest.main_attributes().get("Main-Class"), Some("app.Main"));
        assert_eq!(manifest.main_attributes().get(CREATED_BY_KEY), None);
        let entry = manifest.entry("a.txt").unwrap();
        assert_eq!(entry.get("X-Custom"), Some("keep"));
        assert_eq!(
            entry.get("SM3-Digest"),
            Some(DigestAlgorithm::Sm3.digest(b"hello").to_base64().as_str())
        );
        assert!(manifest.entry("META-INF/old.SF").is_none());
    }

    #[test]
    fn metadata_paths_are_never_digested() {
        let builder = DigestManifestBuilder::new(DigestAlgorithm::Sm3);
        let mut manifest = Manifest::new();
        assert!(!builder.add_entry(&mut manifest, "META-INF/MANIFEST.MF", b"x"));
        assert!(!builder.add_entry(&mut manifest, "meta-inf/services/x", b"x"));
        assert_eq!(manifest.entry_count(), 0);
    }

    #[test]
    fn serialization_is_independent_of_visit_order() {
        let builder = DigestManifestBuilder::new(DigestAlgorithm::Sha256);
        let mut forward = Manifest::new();
        let mut backward = Manifest::new();
        let files = [("a.txt", b"1"), ("b/c.txt", b"2"), ("z.txt", b"3")];
        for (path, data) in files {
            builder.add_entry(&mut forward, path, data);
        }
        for (path, data) in files.iter().rev() {
            builder.add_entry(&mut backward, path, *data);
        }
        assert_eq!(forward.to_bytes().unwrap(), backward.to_bytes().unwrap());
        assert!(forward.entry("a.txt").unwrap().get("SHA-256-Digest").is_some());
    }
}

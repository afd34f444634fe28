//! Shared integration-test fixtures: key material, certificates and JAR files.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use der::EncodePem;
use sm2::pkcs8::{EncodePrivateKey, LineEnding};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use sm2_jar_signer as signer_lib;
use sm2_jar_signer::{CertificateChain, KeyReference};

pub mod pki;

pub use pki::{CertBuilder, TestKey, TestPki};

/// Write a JAR with `entries` in the given order; names ending in `/` are directories.
pub fn write_jar(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, build_zip(entries.iter().map(|(n, d)| (n.to_string(), d.to_vec())))).unwrap();
    path
}

fn build_zip(entries: impl IntoIterator<Item = (String, Vec<u8>)>) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        if name.ends_with('/') {
            writer.add_directory(name, SimpleFileOptions::default()).unwrap();
        } else {
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(&data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Entry names in archive order, directories included.
pub fn entry_names(path: &Path) -> Vec<String> {
    let mut zip = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

/// File entries keyed by name.
pub fn read_jar(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut zip = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..zip.len() {
        let mut file = zip.by_index(i).unwrap();
        if file.is_dir() {
            continue;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        entries.insert(file.name().to_string(), data);
    }
    entries
}

/// Rewrite the JAR at `path`, keeping entry order; `edit` returns replacement bytes.
pub fn rewrite_jar(path: &Path, mut edit: impl FnMut(&str, &[u8]) -> Option<Vec<u8>>) {
    let names = entry_names(path);
    let contents = read_jar(path);
    let rewritten: Vec<(String, Vec<u8>)> = names
        .into_iter()
        .map(|name| {
            let data = contents.get(&name).cloned().unwrap_or_default();
            let data = if name.ends_with('/') {
                data
            } else {
                edit(&name, &data).unwrap_or(data)
            };
            (name, data)
        })
        .collect();
    fs::write(path, build_zip(rewritten)).unwrap();
}

/// Replace one entry's bytes.
pub fn replace_entry(path: &Path, entry: &str, data: Vec<u8>) {
    let mut data = Some(data);
    rewrite_jar(path, |name, _| if name == entry { data.take() } else { None });
}

/// Flip the last bit of one byte of `entry` at `index` (negative counts from the end).
pub fn flip_byte(path: &Path, entry: &str, index: isize) {
    rewrite_jar(path, |name, data| {
        (name == entry).then(|| {
            let mut data = data.to_vec();
            let at = if index < 0 {
                data.len() - index.unsigned_abs()
            } else {
                index.unsigned_abs()
            };
            data[at] ^= 0x01;
            data
        })
    });
}

/// Write `key` as PKCS#8 PEM and `chain` as concatenated certificate PEM.
pub fn write_credentials(dir: &Path, key: &TestKey, chain: &CertificateChain) -> KeyReference {
    let key_path = dir.join("signer.key");
    let chain_path = dir.join("chain.pem");
    let key_pem = key.secret.to_pkcs8_pem(LineEnding::LF).unwrap();
    fs::write(&key_path, key_pem.as_bytes()).unwrap();
    let chain_pem: String = chain
        .certificates()
        .iter()
        .map(|cert| cert.parsed().to_pem(LineEnding::LF).unwrap())
        .collect();
    fs::write(&chain_path, chain_pem).unwrap();
    KeyReference::new(key_path, chain_path).unwrap()
}

/// Self-signed single-certificate credentials.
pub fn self_signed(subject: &str) -> (TestKey, CertificateChain) {
    let key = TestKey::generate();
    let cert = CertBuilder::new(subject).self_signed(&key);
    (key, CertificateChain::single(cert))
}

//! End-to-end signing and verification of JAR files on disk.

mod common;

use std::fs;

use common::{entry_names, flip_byte, read_jar, replace_entry, self_signed, write_credentials, write_jar};
use sm2_jar_signer::domain::manifest::Manifest;
use sm2_jar_signer::domain::signature_file::SignatureFile;
use sm2_jar_signer::{
    check_archive_on_startup, sign_archive, verify_archive, DigestAlgorithm, SignOptions,
    SignerAlias, SigningError, Sm2Verifier, VerifyEngine, VerifyFailure,
};

fn sign_in_place(path: &std::path::Path, alias: &str) -> sm2_jar_signer::SignOutcome {
    let (key, chain) = self_signed("CN=Workflow Signer,O=Example");
    let dir = path.parent().unwrap();
    let key_ref = write_credentials(dir, &key, &chain);
    let options = SignOptions {
        alias: SignerAlias::new(alias).unwrap(),
        ..SignOptions::default()
    };
    sign_archive(path, &key_ref, None, &options).unwrap()
}

#[test]
fn two_file_archive_signs_and_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(dir.path(), "app.jar", &[("a.txt", b"hello"), ("b.txt", b"world")]);

    let outcome = sign_in_place(&jar, "release");
    assert_eq!(outcome.output, jar);
    assert_eq!(outcome.digested_entries, 2);
    assert_eq!(outcome.signature_file_path, "META-INF/release.SF");
    assert_eq!(outcome.block_path, "META-INF/release.SM2");

    let entries = read_jar(&jar);
    let manifest = Manifest::parse(&entries["META-INF/MANIFEST.MF"]).unwrap();
    assert_eq!(manifest.entries().count(), 2);
    let attribute = DigestAlgorithm::Sm3.entry_attribute();
    assert_eq!(
        manifest.entry("a.txt").unwrap().get(&attribute).unwrap(),
        DigestAlgorithm::Sm3.digest(b"hello").to_base64()
    );

    let sf = SignatureFile::parse(&entries["META-INF/release.SF"]).unwrap();
    let (algorithm, digest) = sf.manifest_digest().unwrap();
    assert_eq!(algorithm, DigestAlgorithm::Sm3);
    assert_eq!(
        digest,
        DigestAlgorithm::Sm3
            .digest(&entries["META-INF/MANIFEST.MF"])
            .to_base64()
    );

    let result = verify_archive(&jar).unwrap();
    assert!(result.valid, "{result}");
    assert_eq!(result.total_files, 2);
    assert_eq!(result.files_with_digest, 2);
    assert_eq!(result.verified_files, 2);
    assert_eq!(result.signer().unwrap().alias, "release");
}

#[test]
fn manifest_is_the_first_entry() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "app.jar",
        &[("z.txt", b"z"), ("lib/", b""), ("lib/util.class", b"\xca\xfe\xba\xbe")],
    );
    sign_in_place(&jar, "release");

    let names = entry_names(&jar);
    assert_eq!(names[0], "META-INF/MANIFEST.MF");
    assert!(names.contains(&"lib/".to_string()));
    assert!(names.contains(&"META-INF/release.SF".to_string()));
    assert!(names.contains(&"META-INF/release.SM2".to_string()));
}

#[test]
fn every_tampered_entry_is_named() {
    let dir = tempfile::tempdir().unwrap();
    let files: [(&str, &[u8]); 3] = [
        ("a.txt", b"alpha"),
        ("b/c.txt", b"gamma"),
        ("d.bin", &[0u8, 1, 2, 3]),
    ];
    let signed = write_jar(dir.path(), "signed.jar", &files);
    sign_in_place(&signed, "release");
    let pristine = fs::read(&signed).unwrap();

    for (path, _) in files {
        let tampered = dir.path().join("tampered.jar");
        fs::write(&tampered, &pristine).unwrap();
        flip_byte(&tampered, path, 0);

        let result = verify_archive(&tampered).unwrap();
        assert!(!result.valid);
        assert!(
            result
                .hard_failures
                .contains(&VerifyFailure::DigestMismatch { path: path.to_string() }),
            "{path}: {:?}",
            result.hard_failures
        );
    }
}

#[test]
fn altered_signature_is_a_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(dir.path(), "app.jar", &[("a.txt", b"hello")]);
    sign_in_place(&jar, "release");

    flip_byte(&jar, "META-INF/release.SM2", -1);

    let result = verify_archive(&jar).unwrap();
    assert!(!result.valid);
    assert_eq!(
        result.hard_failures,
        vec![VerifyFailure::SignatureMismatch {
            alias: "release".to_string()
        }]
    );
}

#[test]
fn altered_manifest_is_a_digest_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(dir.path(), "app.jar", &[("a.txt", b"hello")]);
    sign_in_place(&jar, "release");

    let mut manifest = read_jar(&jar)["META-INF/MANIFEST.MF"].clone();
    manifest.extend_from_slice(b"Name: injected.txt\r\nSM3-Digest: AAAA\r\n\r\n");
    replace_entry(&jar, "META-INF/MANIFEST.MF", manifest);

    let result = verify_archive(&jar).unwrap();
    assert!(!result.valid);
    assert!(result.hard_failures.contains(&VerifyFailure::ManifestDigestMismatch {
        alias: "release".to_string()
    }));
}

#[test]
fn resigning_keeps_entries_stable_and_replaces_old_signers() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(dir.path(), "app.jar", &[("a.txt", b"hello"), ("b.txt", b"world")]);
    sign_in_place(&jar, "first");
    let first = read_jar(&jar);

    let outcome = sign_in_place(&jar, "second");
    let second = read_jar(&jar);

    assert!(outcome.stripped.contains(&"META-INF/first.SF".to_string()));
    assert!(outcome.stripped.contains(&"META-INF/first.SM2".to_string()));
    assert!(!second.contains_key("META-INF/first.SF"));
    assert!(!second.contains_key("META-INF/first.SM2"));
    assert_eq!(first["META-INF/MANIFEST.MF"], second["META-INF/MANIFEST.MF"]);
    assert_eq!(first["a.txt"], second["a.txt"]);
    assert_eq!(first["b.txt"], second["b.txt"]);

    let result = verify_archive(&jar).unwrap();
    assert!(result.valid, "{result}");
    assert_eq!(result.signers.len(), 1);
    assert_eq!(result.signers[0].alias, "second");
}

#[test]
fn existing_main_attributes_survive_signing() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = b"Manifest-Version: 1.0\r\nMain-Class: com.example.App\r\n\r\n";
    let jar = write_jar(
        dir.path(),
        "app.jar",
        &[("META-INF/MANIFEST.MF", manifest), ("App.class", b"\xca\xfe")],
    );
    sign_in_place(&jar, "release");

    let manifest = Manifest::parse(&read_jar(&jar)["META-INF/MANIFEST.MF"]).unwrap();
    assert_eq!(manifest.main_attributes().get("Main-Class"), Some("com.example.App"));
    assert!(manifest.entry("App.class").is_some());
    assert!(verify_archive(&jar).unwrap().valid);
}

#[test]
fn separate_output_leaves_input_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(dir.path(), "app.jar", &[("a.txt", b"hello")]);
    let before = fs::read(&jar).unwrap();
    let output = dir.path().join("app-signed.jar");

    let (key, chain) = self_signed("CN=Workflow Signer,O=Example");
    let key_ref = write_credentials(dir.path(), &key, &chain);
    let options = SignOptions {
        output: Some(output.clone()),
        ..SignOptions::default()
    };
    let outcome = sign_archive(&jar, &key_ref, None, &options).unwrap();

    assert_eq!(outcome.output, output);
    assert_eq!(fs::read(&jar).unwrap(), before);
    assert!(verify_archive(&output).unwrap().valid);
    assert!(!verify_archive(&jar).unwrap().valid);
}

#[test]
fn sha256_entry_digests_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(dir.path(), "app.jar", &[("a.txt", b"hello")]);
    let (key, chain) = self_signed("CN=Workflow Signer,O=Example");
    let key_ref = write_credentials(dir.path(), &key, &chain);
    let options = SignOptions {
        digest_algorithm: DigestAlgorithm::Sha256,
        ..SignOptions::default()
    };
    sign_archive(&jar, &key_ref, None, &options).unwrap();

    let manifest = Manifest::parse(&read_jar(&jar)["META-INF/MANIFEST.MF"]).unwrap();
    assert!(manifest
        .entry("a.txt")
        .unwrap()
        .get(&DigestAlgorithm::Sha256.entry_attribute())
        .is_some());

    let sha256 = VerifyEngine::new(DigestAlgorithm::Sha256, std::sync::Arc::new(Sm2Verifier::new()));
    let result = sha256.verify_file(&jar).unwrap();
    assert!(result.valid, "{result}");
    assert_eq!(result.verified_files, 1);

    // The default engine falls back to the algorithm the signer declared
    let result = verify_archive(&jar).unwrap();
    assert!(result.valid, "{result}");
    assert_eq!(result.verified_files, 1);
    assert_eq!(
        result.signer().unwrap().digest_algorithm,
        DigestAlgorithm::Sha256
    );

    flip_byte(&jar, "a.txt", 0);
    let result = verify_archive(&jar).unwrap();
    assert!(!result.valid);
    assert!(result.hard_failures.contains(&VerifyFailure::DigestMismatch {
        path: "a.txt".to_string()
    }));
}

#[test]
fn unsigned_archive_reports_not_signed() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(
        dir.path(),
        "plain.jar",
        &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n\r\n"), ("a.txt", b"x")],
    );
    let result = verify_archive(&jar).unwrap();
    assert!(!result.valid);
    assert_eq!(result.hard_failures, vec![VerifyFailure::NotSigned]);
}

#[test]
fn missing_archive_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = verify_archive(dir.path().join("absent.jar")).unwrap_err();
    assert!(matches!(err, SigningError::InputMissing(_)));
}

#[test]
fn startup_check_rejects_tampered_archive_in_strict_mode() {
    let dir = tempfile::tempdir().unwrap();
    let jar = write_jar(dir.path(), "app.jar", &[("a.txt", b"hello")]);
    sign_in_place(&jar, "release");

    let result = check_archive_on_startup(&jar, true).unwrap();
    assert!(result.valid);

    flip_byte(&jar, "a.txt", 0);
    let lenient = check_archive_on_startup(&jar, false).unwrap();
    assert!(!lenient.valid);
    let err = check_archive_on_startup(&jar, true).unwrap_err();
    assert!(matches!(err, SigningError::VerificationFailed(_)));
}

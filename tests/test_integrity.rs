//! Integration tests for package integrity protection.
//!
//! Covers:
//! - Protecting a package and verifying it from a file on disk
//! - Smuggled, removed and edited files after protection
//! - Protection after signing, with both checks passing together

use ofd_oxide::container::{ContainerPath, Workspace};
use ofd_oxide::integrity::{IntegrityVerifier, OfdIntegrity};
use ofd_oxide::signatures::{EnvelopedSignContainer, OfdSigner, OfdValidator, SigningCredentials};
use ofd_oxide::xml::entries::{DocEntries, ENTRIES_LOC};
use ofd_oxide::{Error, ErrorCategory};
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn create_test_package() -> Vec<u8> {
    let ws = Workspace::new("ofd-it-").unwrap();
    ws.write(
        &ContainerPath::new("/OFD.xml"),
        br#"<ofd:OFD xmlns:ofd="http://www.ofdspec.org/2016"><ofd:DocBody><ofd:DocRoot>Doc_0/Document.xml</ofd:DocRoot></ofd:DocBody></ofd:OFD>"#,
    )
    .unwrap();
    ws.write(&ContainerPath::new("/Doc_0/Document.xml"), b"<ofd:Document/>").unwrap();
    ws.write(&ContainerPath::new("/Doc_0/Pages/Page_0/Content.xml"), b"<ofd:Page/>").unwrap();
    ws.write(&ContainerPath::new("/Doc_0/Res/image.png"), &[0x89, b'P', b'N', b'G', 0, 0, 0, 0x0d]).unwrap();
    ws.repack().unwrap()
}

fn edit(package: &[u8], change: impl FnOnce(&Workspace)) -> Vec<u8> {
    let ws = Workspace::extract(package, "ofd-it-").unwrap();
    change(&ws);
    ws.repack().unwrap()
}

fn protect(package: &[u8], creds: &SigningCredentials) -> Vec<u8> {
    OfdIntegrity::from_bytes(package).unwrap().protect(creds).unwrap()
}

#[test]
fn test_protect_file_round_trip() {
    init_logging();
    let dir = tempdir().unwrap();
    let plain = dir.path().join("plain.ofd");
    let protected = dir.path().join("protected.ofd");
    std::fs::write(&plain, create_test_package()).unwrap();

    let creds = SigningCredentials::self_signed("CN=Producer").unwrap();
    OfdIntegrity::open(&plain).unwrap().protect_to(&protected, &creds).unwrap();

    let mut verifier = IntegrityVerifier::open(&protected).unwrap();
    verifier.set_verifying_key(creds.verifying_key());
    let entries = verifier.verify().unwrap();
    assert_eq!(entries.files.len(), 4);
    assert_eq!(entries.signed_value_loc.as_str(), "/signedvalue.dat");
    assert!(entries.files.iter().all(|f| f.check_value.is_some()));
}

#[test]
fn test_tampering_is_detected() {
    let creds = SigningCredentials::self_signed("CN=Producer").unwrap();
    let protected = protect(&create_test_package(), &creds);

    let cases: Vec<(&str, Vec<u8>)> = vec![
        (
            "smuggled",
            edit(&protected, |ws| {
                ws.write(&ContainerPath::new("/Doc_0/Pages/Page_1/Content.xml"), b"<ofd:Page/>").unwrap();
            }),
        ),
        (
            "removed",
            edit(&protected, |ws| ws.delete(&ContainerPath::new("/Doc_0/Res/image.png")).unwrap()),
        ),
        (
            "edited",
            edit(&protected, |ws| {
                ws.write(&ContainerPath::new("/Doc_0/Document.xml"), b"<ofd:Document>!</ofd:Document>").unwrap();
            }),
        ),
    ];
    for (name, package) in cases {
        let err = IntegrityVerifier::from_bytes(&package).unwrap().verify().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Tampered, "{}: {}", name, err);
    }
}

#[test]
fn test_forged_manifest() {
    let creds = SigningCredentials::self_signed("CN=Producer").unwrap();
    let protected = protect(&create_test_package(), &creds);
    let forged = edit(&protected, |ws| {
        let loc = ContainerPath::new(ENTRIES_LOC);
        let mut entries = DocEntries::parse(&ws.read(&loc).unwrap()).unwrap();
        entries.creator_name = Some("someone else".to_string());
        ws.write(&loc, entries.to_xml().as_bytes()).unwrap();
    });
    let err = IntegrityVerifier::from_bytes(&forged).unwrap().verify().unwrap_err();
    assert!(matches!(err, Error::InvalidSignedValue(_)));
}

#[test]
fn test_unprotected_package() {
    let err = IntegrityVerifier::from_bytes(&create_test_package()).unwrap().verify().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotSigned);
}

#[test]
fn test_signed_then_protected() {
    let signer_id = SigningCredentials::self_signed("CN=Signer").unwrap();
    let mut signer =
        OfdSigner::from_bytes(&create_test_package(), Box::new(EnvelopedSignContainer::new(signer_id))).unwrap();
    signer.execute().unwrap();
    let signed = signer.commit_to_bytes().unwrap();

    let producer = SigningCredentials::self_signed("CN=Producer").unwrap();
    let protected = protect(&signed, &producer);

    let entries = IntegrityVerifier::from_bytes(&protected).unwrap().verify().unwrap();
    assert!(entries
        .files
        .iter()
        .any(|f| f.loc.as_str() == "/Doc_0/Signs/Sign_0/SignedValue.dat"));
    assert_eq!(OfdValidator::from_bytes(&protected).unwrap().exe_validate().unwrap().len(), 1);
}

//! Integration tests for electronic seal signatures.
//!
//! Tests seal handling including:
//! - Signing with v1 and v4 seals and validating through the default dispatcher
//! - Seal binding between `Seal.esl` and the seal inside the signature value
//! - Signature values moved between documents
//! - Seal structure encoding, whole values of either version

use der::asn1::{ObjectIdentifier, OctetString, PrintableString};
use ofd_oxide::container::{ContainerPath, Workspace};
use ofd_oxide::ses::common::{CertDigestObj, ExtData};
use ofd_oxide::ses::v4::CertList;
use ofd_oxide::ses::{self, SealBuilder, SealSchema, SealVersion, SignatureSchema, TimeStampHook};
use ofd_oxide::signatures::{
    OfdSigner, OfdValidator, SesV1Container, SesV4Container, SesValidateContainer, SignMode,
    SigningCredentials,
};
use ofd_oxide::{Error, ErrorCategory};
use proptest::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn create_test_package(page_text: &str) -> Vec<u8> {
    let ws = Workspace::new("ofd-it-").unwrap();
    ws.write(
        &ContainerPath::new("/OFD.xml"),
        br#"<ofd:OFD xmlns:ofd="http://www.ofdspec.org/2016"><ofd:DocBody><ofd:DocRoot>Doc_0/Document.xml</ofd:DocRoot></ofd:DocBody></ofd:OFD>"#,
    )
    .unwrap();
    ws.write(&ContainerPath::new("/Doc_0/Document.xml"), b"<ofd:Document/>").unwrap();
    ws.write(
        &ContainerPath::new("/Doc_0/Pages/Page_0/Content.xml"),
        format!("<ofd:Page><ofd:TextObject>{}</ofd:TextObject></ofd:Page>", page_text).as_bytes(),
    )
    .unwrap();
    ws.repack().unwrap()
}

fn make_seal(version: SealVersion, es_id: &str) -> SealSchema {
    let maker = SigningCredentials::self_signed("CN=Seal Maker").unwrap();
    SealBuilder::new(version, es_id, "Contract seal")
        .with_picture("png", b"\x89PNG\r\n\x1a\n".to_vec(), 40, 40)
        .build(&maker)
        .unwrap()
}

fn seal_sign(package: &[u8], version: SealVersion, seal: SealSchema) -> Vec<u8> {
    let creds = SigningCredentials::self_signed("CN=Signer").unwrap();
    let mut signer = match version {
        SealVersion::V1 => OfdSigner::from_bytes(package, Box::new(SesV1Container::new(creds, seal).unwrap())),
        SealVersion::V4 => OfdSigner::from_bytes(package, Box::new(SesV4Container::new(creds, seal).unwrap())),
    }
    .unwrap();
    signer.set_sign_mode(SignMode::ContinueSign);
    signer.execute().unwrap();
    signer.commit_to_bytes().unwrap()
}

fn read(package: &[u8], path: &str) -> Vec<u8> {
    Workspace::extract(package, "ofd-it-")
        .unwrap()
        .read(&ContainerPath::new(path))
        .unwrap()
}

fn rewrite(package: &[u8], path: &str, data: &[u8]) -> Vec<u8> {
    let ws = Workspace::extract(package, "ofd-it-").unwrap();
    ws.write(&ContainerPath::new(path), data).unwrap();
    ws.repack().unwrap()
}

mod seal_signing_tests {
    use super::*;

    #[test]
    fn test_v4_seal_sign_and_validate() {
        init_logging();
        let seal = make_seal(SealVersion::V4, "es-0004");
        let signed = seal_sign(&create_test_package("hello"), SealVersion::V4, seal.clone());

        let report = OfdValidator::from_bytes(&signed).unwrap().exe_validate().unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.signatures[0].kind, "Seal");
        assert_eq!(report.signatures[0].seal_version, Some(4));

        let stored = SealSchema::from_der(&read(&signed, "/Doc_0/Signs/Sign_0/Seal.esl")).unwrap();
        assert_eq!(stored, seal);

        let value = read(&signed, "/Doc_0/Signs/Sign_0/SignedValue.dat");
        assert_eq!(ses::detect_signature(&value).unwrap(), SealVersion::V4);
        let signature = SignatureSchema::from_der(&value).unwrap();
        assert_eq!(signature.property_info(), "/Doc_0/Signs/Sign_0/Signature.xml");
        assert_eq!(signature.seal().es_id(), "es-0004");
    }

    #[test]
    fn test_v1_seal_sign_and_validate() {
        let seal = make_seal(SealVersion::V1, "es-0001");
        let signed = seal_sign(&create_test_package("hello"), SealVersion::V1, seal);

        let report = OfdValidator::from_bytes(&signed).unwrap().exe_validate().unwrap();
        assert_eq!(report.signatures[0].seal_version, Some(1));

        let value = read(&signed, "/Doc_0/Signs/Sign_0/SignedValue.dat");
        assert_eq!(ses::detect_signature(&value).unwrap(), SealVersion::V1);
    }

    #[test]
    fn test_mixed_versions_in_one_chain() {
        let first = seal_sign(&create_test_package("hello"), SealVersion::V1, make_seal(SealVersion::V1, "a"));
        let second = seal_sign(&first, SealVersion::V4, make_seal(SealVersion::V4, "b"));

        let report = OfdValidator::from_bytes(&second).unwrap().exe_validate().unwrap();
        let versions: Vec<_> = report.signatures.iter().map(|s| s.seal_version).collect();
        assert_eq!(versions, [Some(1), Some(4)]);
        assert_eq!(report.signatures[1].relative_to.as_deref(), Some("1"));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let creds = SigningCredentials::self_signed("CN=Signer").unwrap();
        let result = SesV4Container::new(creds, make_seal(SealVersion::V1, "es-0001"));
        assert!(result.is_err());
    }
}

mod seal_binding_tests {
    use super::*;

    #[test]
    fn test_replaced_seal_file() {
        let signed = seal_sign(&create_test_package("hello"), SealVersion::V4, make_seal(SealVersion::V4, "es-1"));
        let other = make_seal(SealVersion::V4, "es-2").to_der().unwrap();
        let swapped = rewrite(&signed, "/Doc_0/Signs/Sign_0/Seal.esl", &other);

        let err = OfdValidator::from_bytes(&swapped).unwrap().exe_validate().unwrap_err();
        assert!(matches!(err, Error::SealMismatch(_)));
        assert_ne!(err.category(), ErrorCategory::NotSigned);
    }

    #[test]
    fn test_corrupt_seal_file() {
        let signed = seal_sign(&create_test_package("hello"), SealVersion::V4, make_seal(SealVersion::V4, "es-1"));
        let corrupt = rewrite(&signed, "/Doc_0/Signs/Sign_0/Seal.esl", b"\x30\x03\x02\x01\x01");

        let result = OfdValidator::from_bytes(&corrupt).unwrap().exe_validate();
        assert!(result.is_err());
        assert!(!matches!(result, Err(Error::DocNotSigned)));
    }

    #[test]
    fn test_signed_value_from_other_document() {
        let seal = make_seal(SealVersion::V4, "es-1");
        let signed = seal_sign(&create_test_package("hello"), SealVersion::V4, seal.clone());
        let foreign = seal_sign(&create_test_package("goodbye"), SealVersion::V4, seal);

        let value = read(&foreign, "/Doc_0/Signs/Sign_0/SignedValue.dat");
        let substituted = rewrite(&signed, "/Doc_0/Signs/Sign_0/SignedValue.dat", &value);

        let result = OfdValidator::from_bytes(&substituted).unwrap().exe_validate();
        assert!(matches!(result, Err(Error::InvalidSignedValue(_))));
    }

    #[test]
    fn test_skip_maker_check() {
        let signed = seal_sign(&create_test_package("hello"), SealVersion::V4, make_seal(SealVersion::V4, "es-1"));
        let mut validator = OfdValidator::from_bytes(&signed).unwrap();
        validator.set_validate_container(Box::new(SesValidateContainer::without_seal_check()));
        assert_eq!(validator.exe_validate().unwrap().len(), 1);
    }
}

mod seal_structure_tests {
    use super::*;

    #[test]
    fn test_detect_rejects_other_sequences() {
        assert!(ses::detect_seal(b"\x30\x03\x02\x01\x01").is_err());
        assert!(ses::detect_seal(b"not der").is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_seal_survives_reencoding(
            es_id in "[A-Za-z0-9-]{1,24}",
            name in "[A-Za-z ]{1,24}",
            v4 in any::<bool>(),
        ) {
            let version = if v4 { SealVersion::V4 } else { SealVersion::V1 };
            let maker = SigningCredentials::self_signed("CN=Seal Maker").unwrap();
            let seal = SealBuilder::new(version, es_id.as_str(), name.as_str()).build(&maker).unwrap();

            let der = seal.to_der().unwrap();
            prop_assert_eq!(ses::detect_seal(&der).unwrap(), version);
            let decoded = SealSchema::from_der(&der).unwrap();
            prop_assert_eq!(decoded.es_id(), es_id.as_str());
            prop_assert_eq!(decoded.name(), name.as_str());
            prop_assert!(ses::verify_seal(&decoded).is_ok());
        }

        #[test]
        fn prop_full_seal_and_signature_round_trip(
            v4 in any::<bool>(),
            holder_certs in 0usize..3,
            digests in any::<bool>(),
            exts in prop::collection::vec((1u32..10_000, any::<bool>(), prop::collection::vec(any::<u8>(), 0..24)), 0..3),
            picture in prop::option::of(prop::collection::vec(any::<u8>(), 0..48)),
            time_stamp in prop::option::of(prop::collection::vec(any::<u8>(), 1..16)),
        ) {
            let version = if v4 { SealVersion::V4 } else { SealVersion::V1 };
            let maker = SigningCredentials::self_signed("CN=Seal Maker").unwrap();
            let holder = SigningCredentials::self_signed("CN=Holder").unwrap();

            let mut builder = SealBuilder::new(version, "es-prop", "Seal");
            if let Some(tail) = picture {
                let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
                png.extend(tail);
                builder = builder.with_picture("png", png, 42, 42);
            }
            for _ in 0..holder_certs {
                builder = builder.with_holder_cert(holder.certificate.clone());
            }
            for (arc, critical, value) in exts {
                builder = builder.with_ext_data(ExtData {
                    extn_id: ObjectIdentifier::new(&format!("1.2.156.10197.6.{}", arc)).unwrap(),
                    critical,
                    extn_value: OctetString::new(value).unwrap(),
                });
            }
            let mut seal = builder.build(&maker).unwrap();
            if let (true, SealSchema::V4(s)) = (digests, &mut seal) {
                s.e_seal_info.property.cert_list = CertList::Digests(
                    (0..holder_certs)
                        .map(|n| CertDigestObj {
                            kind: PrintableString::new("sha256").unwrap(),
                            value: OctetString::new(vec![n as u8; 32]).unwrap(),
                        })
                        .collect(),
                );
            }
            prop_assert_eq!(SealSchema::from_der(&seal.to_der().unwrap()).unwrap(), seal.clone());

            let signer = SigningCredentials::self_signed("CN=Signer").unwrap();
            let hook: Option<TimeStampHook> = time_stamp.map(|token| -> TimeStampHook {
                Box::new(move |_: &[u8]| Ok(Some(token.clone())))
            });
            let content = b"<ofd:Signature/>";
            let signature =
                ses::sign_content(&seal, &signer, content, "/Doc_0/Signs/Sign_0/Signature.xml", hook.as_ref())
                    .unwrap();
            let decoded = SignatureSchema::from_der(&signature.to_der().unwrap()).unwrap();
            prop_assert_eq!(&decoded, &signature);
            prop_assert_eq!(decoded.seal(), seal);
            prop_assert_eq!(decoded.time_stamp().is_some(), v4 && hook.is_some());
            prop_assert!(decoded.verify(content).is_ok());
        }
    }
}

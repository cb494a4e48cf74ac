//! OFD digital signatures and electronic seals.
//!
//! Signing adds one record to the document's signature list:
//!
//! ```text
//! /Doc_0/Signs/Signatures.xml          list of records, MaxSignId
//! /Doc_0/Signs/Sign_0/Signature.xml    protected files and their digests
//! /Doc_0/Signs/Sign_0/SignedValue.dat  signature over Signature.xml
//! /Doc_0/Signs/Sign_0/Seal.esl         electronic seal, for seal signatures
//! ```
//!
//! ## Signature values
//!
//! The [`ExtendSignatureContainer`] given to [`OfdSigner`] decides the value
//! format:
//!
//! - [`DigitalSignContainer`]: bare ECDSA or RSA value
//! - [`EnvelopedSignContainer`]: CMS signed-data with the signer certificate
//! - [`SesV1Container`], [`SesV4Container`]: `SES_Signature` embedding a seal
//!
//! [`OfdValidator`] checks them through the matching [`ValidateContainer`].
//!
//! ## Example
//!
//! ```no_run
//! use ofd_oxide::ses::{SealBuilder, SealVersion};
//! use ofd_oxide::signatures::{OfdSigner, OfdValidator, SesV4Container, SigningCredentials};
//!
//! let maker = SigningCredentials::self_signed("CN=Seal Maker")?;
//! let seal = SealBuilder::new(SealVersion::V4, "es-001", "Contract seal").build(&maker)?;
//!
//! let signer_id = SigningCredentials::self_signed("CN=Signer")?;
//! let container = SesV4Container::new(signer_id, seal)?;
//! let mut signer = OfdSigner::open("contract.ofd", Box::new(container))?;
//! signer.execute()?;
//! signer.commit_to("contract-sealed.ofd")?;
//!
//! OfdValidator::open("contract-sealed.ofd")?.exe_validate()?;
//! # Ok::<(), ofd_oxide::Error>(())
//! ```

mod cleaner;
pub mod container;
pub mod envelope;
mod scheme;
pub mod sign_id;
mod signer;
pub mod stamp;
pub(crate) mod types;
pub mod validate;
mod verifier;

pub use cleaner::SignCleaner;
pub use container::{
    DigitalSignContainer, EnvelopedSignContainer, ExtendSignatureContainer, SesV1Container,
    SesV4Container,
};
pub use scheme::SignatureScheme;
pub use sign_id::{NumberFormatSignId, SignIdFormat, SignIdProvider, StandFormatSignId};
pub use signer::{OfdSigner, SignerState};
pub use stamp::{
    CuttingRatio, CuttingRideStampPos, NormalStampPos, PageRef, RidingStampPos, Side, StampAppearance,
};
pub use types::{SignMode, SignType, SigningCredentials};
pub use validate::{
    AutoValidateContainer, DigitalValidateContainer, EnvelopedValidateContainer,
    SesValidateContainer, ValidateContainer,
};
pub use verifier::{OfdValidator, SignatureOutcome, ValidationReport};

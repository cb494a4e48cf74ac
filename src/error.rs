//! Error types for the OFD trust library.
//!
//! Every failure surfaced by signing, verification and encryption is an
//! [`Error`]. Callers that only need the coarse outcome ("not signed",
//! "tampered", "signature invalid", "malformed") can use [`Error::category`].

/// Result type alias for OFD trust operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The document carries no signatures at all
    NotSigned,
    /// A protected file no longer matches its recorded digest
    Tampered,
    /// A signature, seal or seal binding failed cryptographic verification
    InvalidSignature,
    /// Input could not be parsed or violates a structural rule
    Malformed,
    /// Filesystem or package I/O failed
    Io,
    /// The API was used incorrectly or asked for something unsupported
    Usage,
}

/// Error types that can occur while signing, validating or encrypting OFD packages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The document has no signature list
    #[error("Document is not signed")]
    DocNotSigned,

    /// A referenced file does not match its recorded digest
    #[error("File integrity check failed for {path}: expected {}, actual {}", hex::encode(.expected), hex::encode(.actual))]
    FileIntegrity {
        /// Container path of the offending file
        path: String,
        /// Digest recorded in the signature
        expected: Vec<u8>,
        /// Digest computed from the current file
        actual: Vec<u8>,
    },

    /// The package holds files the integrity manifest does not list, or lacks listed ones
    #[error("Package contents differ from the integrity manifest: {0}")]
    EntriesMismatch(String),

    /// Signature value failed verification
    #[error("Invalid signed value: {0}")]
    InvalidSignedValue(String),

    /// The seal file does not match the seal inside the signature value
    #[error("Seal mismatch: {0}")]
    SealMismatch(String),

    /// The electronic seal itself is invalid (maker signature, validity window)
    #[error("Invalid electronic seal: {0}")]
    SesInvalid(String),

    /// Seal structure arity matches neither v1 nor v4
    #[error("Unknown seal version: outer sequence has {arity} elements")]
    UnknownSealVersion {
        /// Number of top-level elements found, 0 when the input is not a SEQUENCE
        arity: usize,
    },

    /// ASN.1 DER encoding or decoding error
    #[error("ASN.1 error: {0}")]
    Asn1(#[from] der::Error),

    /// XML part could not be parsed
    #[error("XML error: {0}")]
    Xml(String),

    /// Package structure violates an OFD rule
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// The document refuses further signatures
    #[error("Signing terminated: {0}")]
    SignatureTerminated(String),

    /// Algorithm identifier is recognized but not implemented
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key handling or primitive failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Ciphertext could not be decrypted
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// No recipient entry matches the supplied credential
    #[error("No matching recipient: {0}")]
    NoMatchingRecipient(String),

    /// More than one recipient entry matches the supplied credential
    #[error("Ambiguous recipient: {0}")]
    AmbiguousRecipient(String),

    /// Operation called in the wrong state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// ZIP package error
    #[error("Package error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::DocNotSigned => ErrorCategory::NotSigned,
            Error::FileIntegrity { .. } | Error::EntriesMismatch(_) => ErrorCategory::Tampered,
            Error::InvalidSignedValue(_) | Error::SealMismatch(_) | Error::SesInvalid(_) => {
                ErrorCategory::InvalidSignature
            },
            Error::UnknownSealVersion { .. }
            | Error::Asn1(_)
            | Error::Xml(_)
            | Error::InvalidStructure(_)
            | Error::DecryptionFailed(_) => ErrorCategory::Malformed,
            Error::Zip(_) | Error::Io(_) => ErrorCategory::Io,
            Error::SignatureTerminated(_)
            | Error::UnsupportedAlgorithm(_)
            | Error::Crypto(_)
            | Error::NoMatchingRecipient(_)
            | Error::AmbiguousRecipient(_)
            | Error::InvalidState(_)
            | Error::InvalidArgument(_) => ErrorCategory::Usage,
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Xml(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Xml(format!("invalid base64 content: {}", e))
    }
}

impl From<signature::Error> for Error {
    fn from(e: signature::Error) -> Self {
        Error::Crypto(e.to_string())
    }
}

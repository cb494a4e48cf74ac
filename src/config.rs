//! Configuration shared by the signer and the encryptor.

use crate::digest::DigestAlgorithm;
use crate::signatures::sign_id::SignIdFormat;

/// Component description written into `Provider` elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Name of the signing/encrypting component
    pub name: String,
    /// Component vendor
    pub company: Option<String>,
    /// Component version
    pub version: Option<String>,
}

impl ProviderInfo {
    /// Create a provider description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            company: None,
            version: None,
        }
    }

    /// Set the vendor.
    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl Default for ProviderInfo {
    fn default() -> Self {
        Self::new(crate::NAME).with_version(crate::VERSION)
    }
}

/// Trust operation configuration.
#[derive(Debug, Clone)]
pub struct TrustConfig {
    /// Provider written into Signature.xml and Encryptions.xml.
    pub provider: ProviderInfo,

    /// Digest algorithm used for References when the container does not impose one.
    pub digest_algorithm: DigestAlgorithm,

    /// Signature ID format for new signature records.
    pub sign_id_format: SignIdFormat,

    /// Prefix for scratch workspace directories.
    pub temp_prefix: String,

    /// chrono format string for SignatureDateTime and EncryptDate.
    pub date_format: String,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            provider: ProviderInfo::default(),
            digest_algorithm: DigestAlgorithm::Sha256,
            sign_id_format: SignIdFormat::Number { zero_prefix: false },
            temp_prefix: "ofd-tmp-".to_string(),
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }

    /// Set the provider description.
    pub fn with_provider(mut self, provider: ProviderInfo) -> Self {
        self.provider = provider;
        self
    }

    /// Set the default digest algorithm.
    pub fn with_digest_algorithm(mut self, alg: DigestAlgorithm) -> Self {
        self.digest_algorithm = alg;
        self
    }

    /// Set the signature ID format.
    pub fn with_sign_id_format(mut self, format: SignIdFormat) -> Self {
        self.sign_id_format = format;
        self
    }

    /// Set the scratch directory prefix.
    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    /// Set the timestamp format.
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Current local time rendered with [`TrustConfig::date_format`].
    pub fn now_string(&self) -> String {
        chrono::Local::now().format(&self.date_format).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrustConfig::default();
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha256);
        assert_eq!(config.provider.name, crate::NAME);
        assert_eq!(config.temp_prefix, "ofd-tmp-");
    }

    #[test]
    fn test_config_builder() {
        let config = TrustConfig::new()
            .with_provider(ProviderInfo::new("acme").with_company("Acme Ltd"))
            .with_digest_algorithm(DigestAlgorithm::Sha512)
            .with_sign_id_format(SignIdFormat::Stand)
            .with_temp_prefix("scratch-");
        assert_eq!(config.provider.company.as_deref(), Some("Acme Ltd"));
        assert_eq!(config.digest_algorithm, DigestAlgorithm::Sha512);
        assert_eq!(config.sign_id_format, SignIdFormat::Stand);
        assert_eq!(config.temp_prefix, "scratch-");
    }

    #[test]
    fn test_now_string_uses_format() {
        let config = TrustConfig::new().with_date_format("%Y");
        assert_eq!(config.now_string().len(), 4);
    }
}

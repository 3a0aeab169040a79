//! SHA-256 version gate for source documents.
//!
//! Every document edition the pipeline understands is registered with the
//! digest of its exact bytes. A document is only ingested when its computed
//! digest equals the registered one; anything else is a hard failure.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::IngestError;

const SHA256_PREFIX: &str = "sha256:";

/// Lower-case SHA-256 digest, rendered as `sha256:<hex>`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest of `bytes`.
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Accepts `sha256:<hex>` or a bare 64-digit hex digest, in either case.
    ///
    /// # Errors
    /// Returns [`IngestError::InvalidConfig`] when the text is not a SHA-256 digest.
    pub fn parse(text: &str) -> Result<Self, IngestError> {
        let trimmed = text.trim();
        let digest = match trimmed.get(..SHA256_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(SHA256_PREFIX) => {
                &trimmed[SHA256_PREFIX.len()..]
            }
            _ => trimmed,
        };
        let decoded = hex::decode(digest).map_err(|err| {
            IngestError::InvalidConfig(format!("fingerprint `{text}` is not hex: {err}"))
        })?;
        if decoded.len() != 32 {
            return Err(IngestError::InvalidConfig(format!(
                "fingerprint `{text}` MUST be a 32-byte SHA-256 digest, got {} bytes",
                decoded.len()
            )));
        }
        Ok(Self(digest.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn hex_digest(&self) -> &str {
        &self.0
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{SHA256_PREFIX}{}", self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = IngestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.to_string()
    }
}

/// Document name plus edition, e.g. `ITU Radio Regulations Article 5 (2020)`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DocumentIdentity {
    pub name: String,
    pub edition: String,
}

impl DocumentIdentity {
    #[must_use]
    pub fn new(name: impl Into<String>, edition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            edition: edition.into(),
        }
    }
}

impl Display for DocumentIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.edition)
    }
}

/// One registry entry as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RegisteredDocument {
    pub document: String,
    pub edition: String,
    pub fingerprint: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RegisteredDocument {
    #[must_use]
    pub fn identity(&self) -> DocumentIdentity {
        DocumentIdentity::new(self.document.clone(), self.edition.clone())
    }
}

/// Known-good fingerprints keyed by document identity.
#[derive(Debug, Clone, Default)]
pub struct FingerprintRegistry {
    documents: BTreeMap<DocumentIdentity, RegisteredDocument>,
}

impl FingerprintRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns [`IngestError::InvalidConfig`] for blank names or duplicate identities.
    pub fn from_documents<I>(documents: I) -> Result<Self, IngestError>
    where
        I: IntoIterator<Item = RegisteredDocument>,
    {
        let mut registry = Self::new();
        for document in documents {
            registry.register(document)?;
        }
        Ok(registry)
    }

    /// Parse a JSON array of `{document, edition, fingerprint}` entries.
    ///
    /// # Errors
    /// Returns [`IngestError::InvalidConfig`] for malformed JSON or entries.
    pub fn from_json_str(text: &str) -> Result<Self, IngestError> {
        let documents: Vec<RegisteredDocument> = serde_json::from_str(text).map_err(|err| {
            IngestError::InvalidConfig(format!("fingerprint registry JSON: {err}"))
        })?;
        Self::from_documents(documents)
    }

    /// YAML counterpart of [`FingerprintRegistry::from_json_str`].
    ///
    /// # Errors
    /// Returns [`IngestError::InvalidConfig`] for malformed YAML or entries.
    pub fn from_yaml_str(text: &str) -> Result<Self, IngestError> {
        let documents: Vec<RegisteredDocument> = serde_yaml::from_str(text).map_err(|err| {
            IngestError::InvalidConfig(format!("fingerprint registry YAML: {err}"))
        })?;
        Self::from_documents(documents)
    }

    /// # Errors
    /// Returns [`IngestError::InvalidConfig`] for blank names or duplicate identities.
    pub fn register(&mut self, document: RegisteredDocument) -> Result<(), IngestError> {
        if document.document.trim().is_empty() || document.edition.trim().is_empty() {
            return Err(IngestError::InvalidConfig(
                "registered documents MUST name a document and an edition".to_string(),
            ));
        }
        let identity = document.identity();
        if self.documents.contains_key(&identity) {
            return Err(IngestError::InvalidConfig(format!("{identity} registered twice")));
        }
        self.documents.insert(identity, document);
        Ok(())
    }

    /// # Errors
    /// See [`FingerprintRegistry::register`].
    pub fn with_document(
        mut self,
        name: impl Into<String>,
        edition: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Result<Self, IngestError> {
        self.register(RegisteredDocument {
            document: name.into(),
            edition: edition.into(),
            fingerprint,
            description: None,
        })?;
        Ok(self)
    }

    #[must_use]
    pub fn expected(&self, identity: &DocumentIdentity) -> Option<&Fingerprint> {
        self.documents.get(identity).map(|document| &document.fingerprint)
    }

    #[must_use]
    pub fn is_registered(&self, identity: &DocumentIdentity) -> bool {
        self.documents.contains_key(identity)
    }

    pub fn documents(&self) -> impl Iterator<Item = &RegisteredDocument> + '_ {
        self.documents.values()
    }

    /// Fingerprint `bytes` and compare with the registered digest for `identity`.
    ///
    /// # Errors
    /// Returns [`IngestError::UnknownDocument`] when `identity` is not
    /// registered and [`IngestError::VersionMismatch`] when the digests differ.
    pub fn verify(
        &self,
        identity: &DocumentIdentity,
        bytes: &[u8],
    ) -> Result<Fingerprint, IngestError> {
        let Some(expected) = self.expected(identity) else {
            return Err(IngestError::UnknownDocument(identity.clone()));
        };
        let observed = Fingerprint::of(bytes);
        if &observed == expected {
            Ok(observed)
        } else {
            Err(IngestError::VersionMismatch {
                identity: identity.clone(),
                expected: expected.clone(),
                observed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_CONTENT_SHA256: &str =
        "6ae8a75555209fd6c44157c0aed8016e763ff435a19cf186f76863140143ff72";

    fn fingerprint(text: &str) -> Fingerprint {
        match Fingerprint::parse(text) {
            Ok(fingerprint) => fingerprint,
            Err(err) => panic!("fixture fingerprint should parse: {err}"),
        }
    }

    #[test]
    fn digest_matches_known_sha256() {
        let digest = Fingerprint::of(b"test content");
        assert_eq!(digest.hex_digest(), TEST_CONTENT_SHA256);
        assert_eq!(digest.to_string(), format!("sha256:{TEST_CONTENT_SHA256}"));
    }

    #[test]
    fn parse_is_case_insensitive_and_prefix_optional() {
        let upper = fingerprint(&format!("SHA256:{}", TEST_CONTENT_SHA256.to_uppercase()));
        assert!(upper.hex_digest().starts_with("6ae8"));
        let bare = fingerprint(&TEST_CONTENT_SHA256.to_uppercase());
        assert_eq!(bare, Fingerprint::of(b"test content"));
        assert!(Fingerprint::parse("sha256:abc123").is_err());
        assert!(Fingerprint::parse("sha256:zz").is_err());
    }

    #[test]
    fn verify_accepts_registered_bytes_only() {
        let identity = DocumentIdentity::new("Fixture Table", "2024");
        let registry = match FingerprintRegistry::new().with_document(
            "Fixture Table",
            "2024",
            Fingerprint::of(b"test content"),
        ) {
            Ok(registry) => registry,
            Err(err) => panic!("fixture registry should build: {err}"),
        };

        assert_eq!(
            registry.verify(&identity, b"test content"),
            Ok(Fingerprint::of(b"test content"))
        );
        match registry.verify(&identity, b"test content!") {
            Err(IngestError::VersionMismatch { expected, observed, .. }) => {
                assert_eq!(expected, Fingerprint::of(b"test content"));
                assert_eq!(observed, Fingerprint::of(b"test content!"));
            }
            other => panic!("expected VersionMismatch, got {other:?}"),
        }

        let unknown = DocumentIdentity::new("Fixture Table", "2025");
        assert_eq!(
            registry.verify(&unknown, b"test content"),
            Err(IngestError::UnknownDocument(unknown.clone()))
        );
    }

    #[test]
    fn registry_loads_json_and_yaml() {
        let json = format!(
            r#"[{{
                "document": "Fixture Table",
                "edition": "2024",
                "fingerprint": "sha256:{TEST_CONTENT_SHA256}"
            }}]"#
        );
        let yaml = format!(
            "- document: Fixture Table\n  edition: \"2024\"\n  \
             fingerprint: sha256:{TEST_CONTENT_SHA256}\n  description: test fixture\n"
        );
        let identity = DocumentIdentity::new("Fixture Table", "2024");
        let loaded =
            [FingerprintRegistry::from_json_str(&json), FingerprintRegistry::from_yaml_str(&yaml)];
        for loaded in loaded {
            match loaded {
                Ok(registry) => assert!(registry.is_registered(&identity)),
                Err(err) => panic!("registry should load: {err}"),
            }
        }
    }

    #[test]
    fn registry_rejects_duplicates_and_bad_digests() {
        let entry = format!(
            r#"{{
                "document": "Fixture Table",
                "edition": "2024",
                "fingerprint": "sha256:{TEST_CONTENT_SHA256}"
            }}"#
        );
        let duplicated = format!("[{entry}, {entry}]");
        assert!(matches!(
            FingerprintRegistry::from_json_str(&duplicated),
            Err(IngestError::InvalidConfig(message)) if message.contains("registered twice")
        ));
        let malformed =
            r#"[{"document": "Fixture Table", "edition": "2024", "fingerprint": "md5:abc"}]"#;
        assert!(matches!(
            FingerprintRegistry::from_json_str(malformed),
            Err(IngestError::InvalidConfig(_))
        ));
    }
}

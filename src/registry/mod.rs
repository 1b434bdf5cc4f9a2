use jiff::Timestamp;
use std::collections::{BTreeMap, BTreeSet};

pub mod npm;

pub use npm::NpmRegistry;

/// Per-version signals used by the security validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionFlags {
    /// Deprecation message published for this version, if any.
    pub deprecated: Option<String>,
    /// Lifecycle scripts that run on install (`preinstall`, `install`, `postinstall`).
    pub install_scripts: Vec<String>,
}

impl VersionFlags {
    pub fn is_flagged(&self) -> bool {
        self.deprecated.is_some() || !self.install_scripts.is_empty()
    }
}

/// Everything the registry knows about the published versions of one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMetadata {
    pub versions: BTreeSet<String>,
    pub published_at: BTreeMap<String, Timestamp>,
    pub flags: BTreeMap<String, VersionFlags>,
}

/// Result of a registry lookup.
///
/// `Unavailable` covers every transport, status and parse failure. Callers
/// fail open on it: the run continues with the externally suggested version
/// instead of blocking on a flaky registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLookup {
    Available(VersionMetadata),
    Unavailable,
}

impl MetadataLookup {
    pub fn as_available(&self) -> Option<&VersionMetadata> {
        match self {
            MetadataLookup::Available(metadata) => Some(metadata),
            MetadataLookup::Unavailable => None,
        }
    }
}

pub trait RegistryClient: Send + Sync {
    /// Fetches version metadata for `package`. Never fails; see [`MetadataLookup`].
    fn fetch_version_metadata(&self, package: &str) -> MetadataLookup;
}

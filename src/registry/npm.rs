use crate::error::{Result, SafeUpdateError};
use crate::registry::{MetadataLookup, RegistryClient, VersionFlags, VersionMetadata};
use jiff::Timestamp;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
const MAX_METADATA_BYTES: usize = 64 * 1024 * 1024;
const INSTALL_SCRIPTS: &[&str] = &["preinstall", "install", "postinstall"];

/// Client for an npm-compatible registry.
pub struct NpmRegistry {
    client: Client,
    base_url: String,
}

impl NpmRegistry {
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::validate_registry_url(base_url)?;
        Ok(Self {
            client: Self::build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn metadata_url(&self, package: &str) -> String {
        format!("{}/{}", self.base_url, encode_package_name(package))
    }

    fn fetch_metadata(&self, package: &str) -> Result<VersionMetadata> {
        let url = self.metadata_url(package);
        debug!(%url, "fetching package metadata");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| SafeUpdateError::Registry(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(SafeUpdateError::Registry(format!(
                "HTTP {} for {url}",
                response.status()
            )));
        }

        if response
            .content_length()
            .is_some_and(|len| len as usize > MAX_METADATA_BYTES)
        {
            return Err(SafeUpdateError::Registry(format!(
                "metadata for '{package}' exceeds the size limit"
            )));
        }

        let text = response
            .text()
            .map_err(|e| SafeUpdateError::Registry(format!("{url}: {e}")))?;

        if text.len() > MAX_METADATA_BYTES {
            return Err(SafeUpdateError::Registry(format!(
                "metadata for '{package}' exceeds the size limit"
            )));
        }

        parse_packument(&text)
    }

    fn build_client() -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("safe-update/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SafeUpdateError::Registry(format!("Failed to build HTTP client: {e}")))
    }

    fn validate_registry_url(url: &str) -> Result<()> {
        let parsed = Url::parse(url)
            .map_err(|_| SafeUpdateError::ProjectValidation(format!("Invalid registry URL: {url}")))?;

        match parsed.scheme() {
            "https" | "http" => Ok(()),
            scheme => Err(SafeUpdateError::ProjectValidation(format!(
                "Unsupported registry scheme: {scheme}"
            ))),
        }
    }
}

impl RegistryClient for NpmRegistry {
    fn fetch_version_metadata(&self, package: &str) -> MetadataLookup {
        match self.fetch_metadata(package) {
            Ok(metadata) => {
                debug!(
                    package,
                    versions = metadata.versions.len(),
                    "registry metadata loaded"
                );
                MetadataLookup::Available(metadata)
            }
            Err(err) => {
                warn!(package, error = %err, "registry unavailable, falling back to suggested version");
                MetadataLookup::Unavailable
            }
        }
    }
}

/// URL-encodes a package name for the registry path, keeping a leading scope `@`.
///
/// `@scope/pkg` becomes `@scope%2Fpkg`.
pub fn encode_package_name(package: &str) -> String {
    match package.strip_prefix('@') {
        Some(rest) => format!("@{}", encode_component(rest)),
        None => encode_component(package),
    }
}

fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(default)]
    versions: BTreeMap<String, Value>,
    #[serde(default)]
    time: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct PackumentVersion {
    #[serde(default)]
    deprecated: Option<Value>,
    #[serde(default)]
    scripts: Option<Value>,
}

impl PackumentVersion {
    /// Reads the fields the gate cares about. Entries that are not objects,
    /// or whose fields have unexpected shapes, yield no flags.
    fn from_entry(entry: &Value) -> Self {
        PackumentVersion::deserialize(entry).unwrap_or_default()
    }

    fn flags(&self) -> VersionFlags {
        let deprecated = match &self.deprecated {
            Some(Value::String(message)) if !message.trim().is_empty() => Some(message.clone()),
            Some(Value::Bool(true)) => Some(String::from("deprecated")),
            _ => None,
        };

        let scripts = self.scripts.as_ref().and_then(Value::as_object);
        let install_scripts = INSTALL_SCRIPTS
            .iter()
            .filter(|name| scripts.is_some_and(|scripts| scripts.contains_key(**name)))
            .map(|name| name.to_string())
            .collect();

        VersionFlags {
            deprecated,
            install_scripts,
        }
    }
}

/// Parses a full registry document into [`VersionMetadata`].
///
/// `created`/`modified` and unparsable timestamps are dropped, so a version
/// without a usable publish time simply has no `published_at` entry.
pub fn parse_packument(text: &str) -> Result<VersionMetadata> {
    let packument: Packument = serde_json::from_str(text)?;

    let published_at = packument
        .time
        .iter()
        .filter(|(key, _)| key.as_str() != "created" && key.as_str() != "modified")
        .filter_map(|(version, value)| {
            let timestamp = value.as_str()?.parse::<Timestamp>().ok()?;
            Some((version.clone(), timestamp))
        })
        .collect();

    let flags = packument
        .versions
        .iter()
        .map(|(version, entry)| (version.clone(), PackumentVersion::from_entry(entry).flags()))
        .filter(|(_, flags)| flags.is_flagged())
        .collect();

    Ok(VersionMetadata {
        versions: packument.versions.into_keys().collect(),
        published_at,
        flags,
    })
}

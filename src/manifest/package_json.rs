use crate::error::{Result, SafeUpdateError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Read-only snapshot of a `package.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    /// Corepack `packageManager` field, e.g. `pnpm@9.1.0`.
    #[serde(default)]
    pub package_manager: Option<String>,
}

impl Manifest {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SafeUpdateError::ManifestParsing(format!("Failed to read {}: {e}", path.display()))
        })?;
        content.parse()
    }

    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    pub fn script(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).map(String::as_str)
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.dependencies.contains_key(name) || self.dev_dependencies.contains_key(name)
    }

    /// Declared range for `name`, runtime dependencies taking precedence.
    pub fn get_package_version(&self, name: &str) -> Option<&str> {
        self.dependencies
            .get(name)
            .or_else(|| self.dev_dependencies.get(name))
            .map(String::as_str)
    }

    pub fn is_dev_dependency(&self, name: &str) -> bool {
        !self.dependencies.contains_key(name) && self.dev_dependencies.contains_key(name)
    }

    /// Every declared dependency as `(name, range, is_dev)`, runtime first.
    pub fn all_dependencies(&self) -> impl Iterator<Item = (&str, &str, bool)> {
        let runtime = self
            .dependencies
            .iter()
            .map(|(name, range)| (name.as_str(), range.as_str(), false));
        let dev = self
            .dev_dependencies
            .iter()
            .filter(|(name, _)| !self.dependencies.contains_key(*name))
            .map(|(name, range)| (name.as_str(), range.as_str(), true));
        runtime.chain(dev)
    }
}

impl FromStr for Manifest {
    type Err = SafeUpdateError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| {
            SafeUpdateError::ManifestParsing(format!("Failed to parse package.json: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "web-app",
        "packageManager": "pnpm@9.1.0",
        "scripts": { "build": "vite build", "lint": "eslint ." },
        "dependencies": { "react": "^18.2.0", "lodash": "^4.17.0" },
        "devDependencies": { "vitest": "~1.6.0", "lodash": "^4.0.0" }
    }"#;

    #[test]
    fn parses_sections() {
        let manifest: Manifest = SAMPLE.parse().unwrap();
        assert_eq!(manifest.name.as_deref(), Some("web-app"));
        assert_eq!(manifest.package_manager.as_deref(), Some("pnpm@9.1.0"));
        assert!(manifest.has_script("build"));
        assert!(!manifest.has_script("test"));
        assert_eq!(manifest.script("lint"), Some("eslint ."));
    }

    #[test]
    fn looks_up_packages_across_sections() {
        let manifest: Manifest = SAMPLE.parse().unwrap();
        assert!(manifest.has_package("vitest"));
        assert!(!manifest.has_package("vue"));
        assert_eq!(manifest.get_package_version("lodash"), Some("^4.17.0"));
        assert_eq!(manifest.get_package_version("vitest"), Some("~1.6.0"));
        assert!(manifest.is_dev_dependency("vitest"));
        assert!(!manifest.is_dev_dependency("lodash"));
    }

    #[test]
    fn lists_each_dependency_once() {
        let manifest: Manifest = SAMPLE.parse().unwrap();
        let all: Vec<_> = manifest.all_dependencies().collect();
        assert_eq!(
            all,
            vec![
                ("lodash", "^4.17.0", false),
                ("react", "^18.2.0", false),
                ("vitest", "~1.6.0", true),
            ]
        );
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let manifest: Manifest = r#"{ "name": "bare" }"#.parse().unwrap();
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.scripts.is_empty());
    }

    #[test]
    fn invalid_json_is_a_manifest_error() {
        let err = "{ not json".parse::<Manifest>().unwrap_err();
        assert!(matches!(err, SafeUpdateError::ManifestParsing(_)));
    }
}

use crate::agents::toolchain::program_name;
use crate::error::{Result, SafeUpdateError};
use crate::manifest::Manifest;
use crate::utils::glob::PatternMatcher;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Reports which declared dependencies have a newer version available.
///
/// Returns `package name -> suggested version`; an empty map means nothing to do.
pub trait UpdateSource {
    fn discover(&self, manifest: &Manifest) -> Result<BTreeMap<String, String>>;
}

/// Discovery backed by `npm-check-updates`, run through `npx`.
pub struct NpmCheckUpdates {
    project_path: PathBuf,
    filter: Option<PatternMatcher>,
}

impl NpmCheckUpdates {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
            filter: None,
        }
    }

    /// Restricts discovery to package names matching `pattern`.
    pub fn with_filter(mut self, pattern: Option<&str>) -> Result<Self> {
        self.filter = pattern.map(PatternMatcher::new).transpose()?;
        Ok(self)
    }

    fn run_ncu(&self) -> Result<String> {
        let npx = program_name("npx");
        let args = ["--yes", "npm-check-updates", "--jsonUpgraded"];
        debug!(program = %npx, ?args, "running update discovery");

        let output = Command::new(&npx)
            .current_dir(&self.project_path)
            .args(args)
            .output()
            .map_err(|e| {
                SafeUpdateError::CommandExecution(format!("Failed to execute {npx}: {e}"))
            })?;

        if !output.status.success() {
            return Err(SafeUpdateError::CommandExecution(format!(
                "npm-check-updates failed with exit code {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn keep(&self, name: &str, manifest: &Manifest) -> bool {
        manifest.has_package(name) && self.filter.as_ref().is_none_or(|f| f.matches(name))
    }
}

impl UpdateSource for NpmCheckUpdates {
    fn discover(&self, manifest: &Manifest) -> Result<BTreeMap<String, String>> {
        let upgrades = parse_upgrades(&self.run_ncu()?)?;
        Ok(upgrades
            .into_iter()
            .filter(|(name, _)| self.keep(name, manifest))
            .collect())
    }
}

/// Parses the `--jsonUpgraded` object, ignoring any banner printed before it.
pub fn parse_upgrades(stdout: &str) -> Result<BTreeMap<String, String>> {
    let start = stdout.find('{').ok_or_else(|| {
        SafeUpdateError::CommandExecution("npm-check-updates produced no JSON output".to_string())
    })?;

    let document: BTreeMap<String, Value> = serde_json::from_str(stdout[start..].trim_end())?;
    Ok(document
        .into_iter()
        .filter_map(|(name, version)| Some((name, version.as_str()?.to_string())))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upgrade_map() {
        let upgrades = parse_upgrades(r#"{ "lodash": "^5.0.0", "@types/node": "^22.1.0" }"#).unwrap();
        assert_eq!(upgrades["lodash"], "^5.0.0");
        assert_eq!(upgrades["@types/node"], "^22.1.0");
    }

    #[test]
    fn skips_banner_and_non_string_values() {
        let stdout = "Checking package.json\n{ \"react\": \"^19.0.0\", \"weird\": 3 }\n";
        let upgrades = parse_upgrades(stdout).unwrap();
        assert_eq!(upgrades.len(), 1);
        assert_eq!(upgrades["react"], "^19.0.0");
    }

    #[test]
    fn empty_object_means_no_updates() {
        assert!(parse_upgrades("{}").unwrap().is_empty());
    }

    #[test]
    fn missing_json_is_an_error() {
        assert!(parse_upgrades("npm ERR! network").is_err());
    }

    #[test]
    fn filter_and_manifest_restrict_candidates() {
        let manifest: Manifest =
            r#"{ "dependencies": { "eslint": "^8.0.0", "react": "^18.0.0" } }"#
                .parse()
                .unwrap();
        let source = NpmCheckUpdates::new(".").with_filter(Some("lint")).unwrap();
        assert!(source.keep("eslint", &manifest));
        assert!(!source.keep("react", &manifest));
        assert!(!source.keep("eslint-plugin-x", &manifest));
    }
}

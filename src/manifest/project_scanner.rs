use crate::error::{Result, SafeUpdateError};
use crate::manifest::Manifest;
use crate::utils::path_validator::PathValidator;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    pub fn program(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    /// Arguments that add packages at an explicit version to the manifest.
    pub fn add_args(self, dev: bool) -> Vec<&'static str> {
        let mut args = match self {
            PackageManager::Npm => vec!["install"],
            _ => vec!["add"],
        };
        if dev {
            args.push(match self {
                PackageManager::Npm | PackageManager::Pnpm => "--save-dev",
                PackageManager::Yarn | PackageManager::Bun => "--dev",
            });
        }
        args
    }

    pub fn install_args(self) -> Vec<&'static str> {
        vec!["install"]
    }

    pub fn run_args(self, script: &str) -> Vec<&str> {
        vec!["run", script]
    }

    fn lockfiles(self) -> &'static [&'static str] {
        match self {
            PackageManager::Npm => &["package-lock.json", "npm-shrinkwrap.json"],
            PackageManager::Pnpm => &["pnpm-lock.yaml"],
            PackageManager::Yarn => &["yarn.lock"],
            PackageManager::Bun => &["bun.lockb", "bun.lock"],
        }
    }

    fn from_corepack_field(field: &str) -> Option<Self> {
        let name = field.split('@').next()?.trim();
        match name {
            "npm" => Some(PackageManager::Npm),
            "pnpm" => Some(PackageManager::Pnpm),
            "yarn" => Some(PackageManager::Yarn),
            "bun" => Some(PackageManager::Bun),
            _ => None,
        }
    }

    /// Detects the package manager from the manifest's `packageManager` field,
    /// then from lockfiles present in `project_path`. Defaults to npm.
    pub fn detect(project_path: &Path, manifest: &Manifest) -> Self {
        if let Some(pm) = manifest
            .package_manager
            .as_deref()
            .and_then(Self::from_corepack_field)
        {
            return pm;
        }

        [
            PackageManager::Pnpm,
            PackageManager::Yarn,
            PackageManager::Bun,
            PackageManager::Npm,
        ]
        .into_iter()
        .find(|pm| pm.lockfiles().iter().any(|f| project_path.join(f).exists()))
        .unwrap_or(PackageManager::Npm)
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// ProjectScanner validates the project structure and loads the manifest.
pub struct ProjectScanner {
    project_path: PathBuf,
}

impl ProjectScanner {
    pub fn new<P: AsRef<Path>>(project_path: P) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
        }
    }

    pub fn validate(&self) -> Result<ProjectInfo> {
        let project_path = PathValidator::validate_project_path(&self.project_path)?;

        let manifest_path = project_path.join("package.json");
        if !manifest_path.is_file() {
            return Err(SafeUpdateError::ProjectValidation(
                "package.json not found".to_string(),
            ));
        }

        let manifest = Manifest::load(&manifest_path)?;
        let package_manager = PackageManager::detect(&project_path, &manifest);

        Ok(ProjectInfo {
            project_path,
            manifest_path,
            manifest,
            package_manager,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub project_path: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
    pub package_manager: PackageManager,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, body: &str) {
        fs::write(dir.join("package.json"), body).unwrap();
    }

    #[test]
    fn requires_package_json() {
        let dir = tempdir().unwrap();
        let err = ProjectScanner::new(dir.path()).validate().unwrap_err();
        assert!(matches!(err, SafeUpdateError::ProjectValidation(_)));
    }

    #[test]
    fn loads_manifest_and_defaults_to_npm() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), r#"{ "dependencies": { "lodash": "^4.17.0" } }"#);
        let info = ProjectScanner::new(dir.path()).validate().unwrap();
        assert_eq!(info.package_manager, PackageManager::Npm);
        assert!(info.manifest.has_package("lodash"));
        assert!(info.manifest_path.ends_with("package.json"));
    }

    #[test]
    fn detects_package_manager_from_lockfile() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), "{}");
        fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        let info = ProjectScanner::new(dir.path()).validate().unwrap();
        assert_eq!(info.package_manager, PackageManager::Pnpm);
    }

    #[test]
    fn corepack_field_wins_over_lockfile() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), r#"{ "packageManager": "yarn@4.1.0" }"#);
        fs::write(dir.path().join("package-lock.json"), "{}").unwrap();
        let info = ProjectScanner::new(dir.path()).validate().unwrap();
        assert_eq!(info.package_manager, PackageManager::Yarn);
    }

    #[test]
    fn dev_flag_follows_package_manager_conventions() {
        assert_eq!(PackageManager::Npm.add_args(true), vec!["install", "--save-dev"]);
        assert_eq!(PackageManager::Yarn.add_args(true), vec!["add", "--dev"]);
        assert_eq!(PackageManager::Pnpm.add_args(false), vec!["add"]);
    }
}

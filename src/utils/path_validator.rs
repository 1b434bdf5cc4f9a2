use crate::error::{Result, SafeUpdateError};
use std::path::{Path, PathBuf};

/// Path checks applied before any command runs inside the project directory.
pub struct PathValidator;

impl PathValidator {
    /// Validates and canonicalises an incoming project path.
    pub fn validate_project_path(path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();

        let canonical = path.canonicalize().map_err(|e| {
            SafeUpdateError::ProjectValidation(format!("Invalid path '{}': {e}", path.display()))
        })?;

        if !canonical.is_dir() {
            return Err(SafeUpdateError::ProjectValidation(format!(
                "Path '{}' is not a directory",
                canonical.display()
            )));
        }

        const FORBIDDEN: &[&str] = &["/etc", "/sys", "/proc", "/dev", "/boot"];

        for forbidden in FORBIDDEN {
            let forbidden_path = Path::new(forbidden);

            if path.starts_with(forbidden_path) || canonical.starts_with(forbidden_path) {
                return Err(SafeUpdateError::ProjectValidation(format!(
                    "Access to system directory '{}' is not allowed",
                    forbidden
                )));
            }

            if let Ok(canonical_forbidden) = forbidden_path.canonicalize() {
                if canonical.starts_with(&canonical_forbidden) {
                    return Err(SafeUpdateError::ProjectValidation(format!(
                        "Access to system directory '{}' is not allowed",
                        forbidden
                    )));
                }
            }
        }

        Ok(canonical)
    }

    /// Ensures `target` resolves to a location strictly inside `base_dir`.
    ///
    /// Used before deleting `node_modules`, so `target` may not exist yet; in that
    /// case its parent is checked instead.
    pub fn validate_inside(target: impl AsRef<Path>, base_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let target = target.as_ref();
        let base_dir = base_dir.as_ref();

        let canonical_base = base_dir.canonicalize().map_err(|e| {
            SafeUpdateError::ProjectValidation(format!(
                "Invalid base directory '{}': {e}",
                base_dir.display()
            ))
        })?;

        let canonical_target = match target.canonicalize() {
            Ok(path) => path,
            Err(_) => {
                let parent = target.parent().unwrap_or(target).canonicalize().map_err(|e| {
                    SafeUpdateError::ProjectValidation(format!(
                        "Invalid path '{}': {e}",
                        target.display()
                    ))
                })?;
                match target.file_name() {
                    Some(name) => parent.join(name),
                    None => parent,
                }
            }
        };

        if canonical_target == canonical_base || !canonical_target.starts_with(&canonical_base) {
            return Err(SafeUpdateError::ProjectValidation(
                "Path is outside the project directory".to_string(),
            ));
        }

        Ok(canonical_target)
    }
}

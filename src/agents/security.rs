use crate::agents::interaction::Prompter;
use crate::error::Result;
use crate::registry::{RegistryClient, VersionFlags};
use crate::selection::SelectionItem;
use colored::Colorize;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{debug, warn};

/// Confirms which selected packages may be installed.
///
/// Returns the approved subset in selection order. Aborted prompts raise
/// [`crate::error::SafeUpdateError::UserCancelled`].
pub trait SecurityScanner {
    fn confirm(&mut self, items: &[SelectionItem]) -> Result<Vec<SelectionItem>>;
}

/// Inspects registry metadata for deprecations and install-time scripts.
///
/// Unflagged packages pass straight through. Flagged packages need an explicit
/// "yes" from the operator; without a prompter they are declined.
pub struct RegistrySecurityScanner<R, W> {
    registry: Arc<dyn RegistryClient>,
    approval: Approval<R, W>,
}

enum Approval<R, W> {
    Prompt(Prompter<R, W>),
    /// Declines every flagged package, noting each one on the writer.
    Decline(W),
}

impl<R: BufRead, W: Write> RegistrySecurityScanner<R, W> {
    pub fn interactive(registry: Arc<dyn RegistryClient>, prompter: Prompter<R, W>) -> Self {
        Self {
            registry,
            approval: Approval::Prompt(prompter),
        }
    }

    pub fn unattended(registry: Arc<dyn RegistryClient>, notices: W) -> Self {
        Self {
            registry,
            approval: Approval::Decline(notices),
        }
    }

    fn flags_for(&self, item: &SelectionItem) -> Option<VersionFlags> {
        let lookup = self.registry.fetch_version_metadata(&item.name);
        let Some(metadata) = lookup.as_available() else {
            warn!(package = %item.name, "registry unavailable during validation, keeping package");
            return None;
        };
        metadata
            .flags
            .get(&item.version)
            .cloned()
            .filter(VersionFlags::is_flagged)
    }

    fn approve(&mut self, item: &SelectionItem, flags: &VersionFlags) -> Result<bool> {
        let headline = format!("⚠ {}@{}", item.name, item.version);
        let mut findings = Vec::new();
        if let Some(message) = &flags.deprecated {
            findings.push(format!("deprecated: {message}"));
        }
        if !flags.install_scripts.is_empty() {
            findings.push(format!(
                "runs install scripts: {}",
                flags.install_scripts.join(", ")
            ));
        }

        let prompter = match &mut self.approval {
            Approval::Prompt(prompter) => prompter,
            Approval::Decline(notices) => {
                writeln!(
                    notices,
                    "   {} {} ({})",
                    headline.yellow(),
                    "declined".red(),
                    findings.join("; ")
                )?;
                return Ok(false);
            }
        };

        prompter.say(format!("\n{}", headline.yellow().bold()))?;
        for finding in &findings {
            prompter.say(format!("   • {finding}"))?;
        }
        prompter.confirm("Install this package anyway? [y/N/q]: ")
    }
}

impl<R: BufRead, W: Write> SecurityScanner for RegistrySecurityScanner<R, W> {
    fn confirm(&mut self, items: &[SelectionItem]) -> Result<Vec<SelectionItem>> {
        let mut confirmed = Vec::with_capacity(items.len());

        for item in items {
            let approved = match self.flags_for(item) {
                Some(flags) => self.approve(item, &flags)?,
                None => true,
            };
            debug!(package = %item.name, version = %item.version, approved, "security validation");
            if approved {
                confirmed.push(item.clone());
            }
        }

        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SafeUpdateError;
    use crate::registry::{MetadataLookup, VersionMetadata};
    use std::collections::HashMap;
    use std::io::Cursor;

    struct FixedRegistry(HashMap<String, MetadataLookup>);

    impl RegistryClient for FixedRegistry {
        fn fetch_version_metadata(&self, package: &str) -> MetadataLookup {
            self.0
                .get(package)
                .cloned()
                .unwrap_or(MetadataLookup::Unavailable)
        }
    }

    fn registry() -> Arc<dyn RegistryClient> {
        let mut flagged = VersionMetadata::default();
        flagged.versions.insert("2.0.0".to_string());
        flagged.flags.insert(
            "2.0.0".to_string(),
            VersionFlags {
                deprecated: None,
                install_scripts: vec!["postinstall".to_string()],
            },
        );

        let mut clean = VersionMetadata::default();
        clean.versions.insert("1.1.0".to_string());

        Arc::new(FixedRegistry(HashMap::from([
            ("native-addon".to_string(), MetadataLookup::Available(flagged)),
            ("pure-js".to_string(), MetadataLookup::Available(clean)),
        ])))
    }

    fn items() -> Vec<SelectionItem> {
        vec![
            SelectionItem::new("pure-js", "1.1.0"),
            SelectionItem::new("native-addon", "2.0.0"),
            SelectionItem::new("offline-pkg", "3.0.0"),
        ]
    }

    fn scanner(input: &str) -> RegistrySecurityScanner<Cursor<Vec<u8>>, Vec<u8>> {
        RegistrySecurityScanner::interactive(
            registry(),
            Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new()),
        )
    }

    #[test]
    fn unflagged_and_unreachable_packages_pass() {
        let confirmed = scanner("n\n").confirm(&items()).unwrap();
        assert_eq!(
            confirmed,
            vec![
                SelectionItem::new("pure-js", "1.1.0"),
                SelectionItem::new("offline-pkg", "3.0.0"),
            ]
        );
    }

    #[test]
    fn flagged_package_needs_explicit_yes() {
        let confirmed = scanner("y\n").confirm(&items()).unwrap();
        assert_eq!(confirmed.len(), 3);
        assert_eq!(confirmed[1], SelectionItem::new("native-addon", "2.0.0"));
    }

    #[test]
    fn quitting_cancels() {
        let err = scanner("q\n").confirm(&items()).unwrap_err();
        assert!(matches!(err, SafeUpdateError::UserCancelled));
    }

    #[test]
    fn unattended_scanner_declines_flagged_packages() {
        let mut scanner: RegistrySecurityScanner<Cursor<Vec<u8>>, Vec<u8>> =
            RegistrySecurityScanner::unattended(registry(), Vec::new());
        let confirmed = scanner.confirm(&items()).unwrap();
        assert!(confirmed.iter().all(|item| item.name != "native-addon"));
        assert_eq!(confirmed.len(), 2);

        let Approval::Decline(notices) = scanner.approval else {
            panic!("unattended scanner must not prompt");
        };
        let notices = String::from_utf8(notices).unwrap();
        assert!(notices.contains("native-addon@2.0.0"));
        assert!(notices.contains("declined"));
        assert!(notices.contains("runs install scripts: postinstall"));
        assert!(!notices.contains("pure-js"));
    }
}

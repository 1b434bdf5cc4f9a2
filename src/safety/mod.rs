//! Age-gated version selection.
//!
//! A candidate update is only offered at a version that has been public for
//! at least the safety buffer. The cutoff is computed once per run and shared
//! by every decision so two checks of the same package always agree.

pub mod filter;

pub use filter::{SafetyFilter, compute_cutoff, select_safe_version};

use crate::manifest::Manifest;
use crate::version::clean_version;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// An available update reported by update discovery, joined with the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCandidate {
    pub name: String,
    /// Declared range from the manifest, e.g. `^4.17.0`.
    pub installed_range: String,
    pub suggested_version: String,
}

impl UpdateCandidate {
    pub fn new(
        name: impl Into<String>,
        installed_range: impl Into<String>,
        suggested_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            installed_range: installed_range.into(),
            suggested_version: suggested_version.into(),
        }
    }
}

/// Joins discovered `name -> suggested` pairs with the declared ranges.
///
/// Suggestions for packages the manifest does not declare are dropped and
/// suggested versions lose any range operator.
pub fn join_with_manifest(
    manifest: &Manifest,
    suggestions: BTreeMap<String, String>,
) -> Vec<UpdateCandidate> {
    suggestions
        .into_iter()
        .filter_map(|(name, suggested)| match manifest.get_package_version(&name) {
            Some(installed) => Some(UpdateCandidate::new(
                name.as_str(),
                installed,
                clean_version(&suggested),
            )),
            None => {
                debug!(package = %name, "ignoring suggestion for undeclared package");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyReason {
    Safe,
    TooNew,
    RegistryUnreachable,
    MatchesInstalled,
}

impl fmt::Display for SafetyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SafetyReason::Safe => "safe",
            SafetyReason::TooNew => "too-new",
            SafetyReason::RegistryUnreachable => "registry-unreachable",
            SafetyReason::MatchesInstalled => "matches-installed",
        };
        f.write_str(label)
    }
}

/// Outcome of the safety filter for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyDecision {
    pub name: String,
    /// Declared range the candidate was evaluated against.
    pub current: String,
    pub chosen_version: Option<String>,
    pub reason: SafetyReason,
}

impl SafetyDecision {
    pub(crate) fn new(
        candidate: &UpdateCandidate,
        chosen_version: Option<String>,
        reason: SafetyReason,
    ) -> Self {
        Self {
            name: candidate.name.clone(),
            current: candidate.installed_range.clone(),
            chosen_version,
            reason,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.chosen_version.is_some()
    }
}

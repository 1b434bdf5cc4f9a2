use crate::error::{Result, SafeUpdateError};
use crate::registry::{MetadataLookup, RegistryClient};
use crate::safety::{SafetyDecision, SafetyReason, UpdateCandidate};
use crate::utils::progress;
use crate::version::{clean_version, is_stable_release, parse_stable};
use jiff::{SignedDuration, Timestamp};
use tracing::debug;

/// Returns `now - buffer_days`. Call once per run.
pub fn compute_cutoff(now: Timestamp, buffer_days: u32) -> Result<Timestamp> {
    let buffer = SignedDuration::from_hours(i64::from(buffer_days) * 24);
    now.checked_sub(buffer).map_err(|e| {
        SafeUpdateError::ProjectValidation(format!(
            "Safety buffer of {buffer_days} days is out of range: {e}"
        ))
    })
}

/// Picks the newest stable version of `candidate` published at or before `cutoff`.
///
/// Versions older than the installed one are never offered. If the registry
/// could not be consulted the suggested version is trusted as-is.
pub fn select_safe_version(
    candidate: &UpdateCandidate,
    lookup: &MetadataLookup,
    cutoff: Timestamp,
) -> SafetyDecision {
    let metadata = match lookup {
        MetadataLookup::Available(metadata) => metadata,
        MetadataLookup::Unavailable => {
            return SafetyDecision::new(
                candidate,
                Some(candidate.suggested_version.clone()),
                SafetyReason::RegistryUnreachable,
            );
        }
    };

    let installed = parse_stable(&candidate.installed_range);

    let newest = metadata
        .versions
        .iter()
        .filter(|version| is_stable_release(version))
        .filter_map(|version| {
            let published = *metadata.published_at.get(version)?;
            let parsed = semver::Version::parse(version).ok()?;
            Some((version, published, parsed))
        })
        .filter(|(_, published, _)| *published <= cutoff)
        .filter(|(_, _, parsed)| installed.as_ref().is_none_or(|current| parsed >= current))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.2.cmp(&b.2)));

    let Some((version, _, _)) = newest else {
        return SafetyDecision::new(candidate, None, SafetyReason::TooNew);
    };

    if version.as_str() == clean_version(&candidate.installed_range) {
        return SafetyDecision::new(candidate, None, SafetyReason::MatchesInstalled);
    }

    SafetyDecision::new(candidate, Some(version.clone()), SafetyReason::Safe)
}

/// Runs the safety check for a batch of candidates, one registry lookup at a time.
pub struct SafetyFilter<'a> {
    registry: &'a dyn RegistryClient,
    cutoff: Timestamp,
    show_progress: bool,
}

impl<'a> SafetyFilter<'a> {
    pub fn new(registry: &'a dyn RegistryClient, cutoff: Timestamp) -> Self {
        Self {
            registry,
            cutoff,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Evaluates candidates sequentially and in order.
    ///
    /// Lookups are never issued concurrently so the registry sees at most one
    /// request in flight from this run.
    pub fn evaluate(&self, candidates: &[UpdateCandidate]) -> Vec<SafetyDecision> {
        let pb = progress::bar(candidates.len(), self.show_progress);
        let mut decisions = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            pb.set_message(format!("Checking {}", candidate.name));

            let lookup = self.registry.fetch_version_metadata(&candidate.name);
            let decision = select_safe_version(candidate, &lookup, self.cutoff);
            debug!(
                package = %decision.name,
                reason = %decision.reason,
                chosen = decision.chosen_version.as_deref().unwrap_or("-"),
                "safety decision"
            );
            decisions.push(decision);

            pb.inc(1);
        }
        pb.finish_and_clear();

        decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::VersionMetadata;
    use std::collections::HashMap;

    fn now() -> Timestamp {
        "2024-06-15T12:00:00Z".parse().unwrap()
    }

    fn days_ago(days: i64) -> Timestamp {
        now()
            .checked_sub(SignedDuration::from_hours(days * 24))
            .unwrap()
    }

    fn metadata(entries: &[(&str, Timestamp)]) -> MetadataLookup {
        let mut metadata = VersionMetadata::default();
        for (version, published) in entries {
            metadata.versions.insert(version.to_string());
            metadata.published_at.insert(version.to_string(), *published);
        }
        MetadataLookup::Available(metadata)
    }

    fn lodash() -> UpdateCandidate {
        UpdateCandidate::new("lodash", "^4.17.0", "5.0.0")
    }

    #[test]
    fn cutoff_subtracts_whole_days() {
        let cutoff = compute_cutoff(now(), 7).unwrap();
        assert_eq!(cutoff, days_ago(7));
        assert_eq!(compute_cutoff(now(), 0).unwrap(), now());
    }

    #[test]
    fn only_recent_release_is_too_new() {
        let lookup = metadata(&[("5.0.0", days_ago(1))]);
        let decision = select_safe_version(&lodash(), &lookup, days_ago(7));
        assert_eq!(decision.chosen_version, None);
        assert_eq!(decision.reason, SafetyReason::TooNew);
    }

    #[test]
    fn older_release_is_chosen_when_latest_is_too_new() {
        let lookup = metadata(&[("5.0.0", days_ago(1)), ("4.19.0", days_ago(20))]);
        let decision = select_safe_version(&lodash(), &lookup, days_ago(7));
        assert_eq!(decision.chosen_version.as_deref(), Some("4.19.0"));
        assert_eq!(decision.reason, SafetyReason::Safe);
        assert_eq!(decision.current, "^4.17.0");
    }

    #[test]
    fn unreachable_registry_trusts_suggested_version() {
        let decision = select_safe_version(&lodash(), &MetadataLookup::Unavailable, days_ago(7));
        assert_eq!(decision.chosen_version.as_deref(), Some("5.0.0"));
        assert_eq!(decision.reason, SafetyReason::RegistryUnreachable);
    }

    #[test]
    fn matching_installed_version_is_a_no_op() {
        let lookup = metadata(&[("4.17.0", days_ago(400)), ("5.0.0", days_ago(2))]);
        let decision = select_safe_version(&lodash(), &lookup, days_ago(7));
        assert_eq!(decision.chosen_version, None);
        assert_eq!(decision.reason, SafetyReason::MatchesInstalled);
    }

    #[test]
    fn prefers_latest_publish_time_over_highest_version() {
        let candidate = UpdateCandidate::new("react", "^17.0.0", "19.0.0");
        let lookup = metadata(&[
            ("18.2.0", days_ago(300)),
            ("17.0.3", days_ago(30)),
            ("19.0.0", days_ago(3)),
        ]);
        let decision = select_safe_version(&candidate, &lookup, days_ago(7));
        assert_eq!(decision.chosen_version.as_deref(), Some("17.0.3"));
    }

    #[test]
    fn publish_time_ties_break_on_version() {
        let candidate = UpdateCandidate::new("pkg", "1.0.0", "2.0.0");
        let same_time = days_ago(10);
        let lookup = metadata(&[("1.1.0", same_time), ("1.2.0", same_time)]);
        let decision = select_safe_version(&candidate, &lookup, days_ago(7));
        assert_eq!(decision.chosen_version.as_deref(), Some("1.2.0"));
    }

    #[test]
    fn never_offers_a_downgrade() {
        let candidate = UpdateCandidate::new("pkg", "^2.1.0", "3.0.0");
        let lookup = metadata(&[("2.0.5", days_ago(20)), ("3.0.0", days_ago(1))]);
        let decision = select_safe_version(&candidate, &lookup, days_ago(7));
        assert_eq!(decision.reason, SafetyReason::TooNew);
    }

    #[test]
    fn versions_without_publish_time_are_ignored() {
        let mut inner = VersionMetadata::default();
        inner.versions.insert("4.18.0".to_string());
        let decision =
            select_safe_version(&lodash(), &MetadataLookup::Available(inner), days_ago(7));
        assert_eq!(decision.reason, SafetyReason::TooNew);
    }

    #[test]
    fn chosen_version_is_never_after_cutoff_or_prerelease() {
        let cutoff = days_ago(7);
        let published = [
            ("4.18.0", days_ago(40)),
            ("4.18.1-rc.1", days_ago(12)),
            ("4.19.0", days_ago(8)),
            ("4.19.1", days_ago(7)),
            ("4.20.0-beta", days_ago(9)),
            ("4.20.0", days_ago(6)),
            ("5.0.0+build.1", days_ago(30)),
            ("5.0.0", days_ago(0)),
        ];

        for take in 1..=published.len() {
            let lookup = metadata(&published[..take]);
            let decision = select_safe_version(&lodash(), &lookup, cutoff);
            if let Some(chosen) = decision.chosen_version {
                assert!(!chosen.contains('-'), "prerelease {chosen} chosen");
                assert!(!chosen.contains('+'), "build metadata {chosen} chosen");
                let time = published.iter().find(|(v, _)| *v == chosen).unwrap().1;
                assert!(time <= cutoff, "{chosen} published after cutoff");
            }
        }
    }

    #[test]
    fn publication_exactly_at_cutoff_is_allowed() {
        let lookup = metadata(&[("4.19.1", days_ago(7))]);
        let decision = select_safe_version(&lodash(), &lookup, days_ago(7));
        assert_eq!(decision.chosen_version.as_deref(), Some("4.19.1"));
    }

    struct FixedRegistry(HashMap<String, MetadataLookup>);

    impl RegistryClient for FixedRegistry {
        fn fetch_version_metadata(&self, package: &str) -> MetadataLookup {
            self.0
                .get(package)
                .cloned()
                .unwrap_or(MetadataLookup::Unavailable)
        }
    }

    #[test]
    fn filter_preserves_candidate_order() {
        let registry = FixedRegistry(HashMap::from([
            ("a".to_string(), metadata(&[("1.1.0", days_ago(30))])),
            ("b".to_string(), metadata(&[("2.0.0", days_ago(1))])),
        ]));
        let candidates = vec![
            UpdateCandidate::new("c", "1.0.0", "1.0.1"),
            UpdateCandidate::new("a", "1.0.0", "1.1.0"),
            UpdateCandidate::new("b", "1.0.0", "2.0.0"),
        ];

        let decisions = SafetyFilter::new(&registry, days_ago(7))
            .with_progress(false)
            .evaluate(&candidates);

        let summary: Vec<_> = decisions
            .iter()
            .map(|d| (d.name.as_str(), d.reason))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("c", SafetyReason::RegistryUnreachable),
                ("a", SafetyReason::Safe),
                ("b", SafetyReason::TooNew),
            ]
        );
    }
}

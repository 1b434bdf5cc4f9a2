use crate::safety::SafetyDecision;
use crate::version::{VersionBump, classify_bump};
use serde::Serialize;

/// One update ready to be offered to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateEntry {
    pub name: String,
    pub current_version: String,
    pub new_version: String,
}

impl UpdateEntry {
    pub fn bump(&self) -> VersionBump {
        classify_bump(&self.current_version, &self.new_version)
    }
}

/// Updates partitioned by bump severity, each list in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupedUpdates {
    pub major: Vec<UpdateEntry>,
    pub minor: Vec<UpdateEntry>,
    pub patch: Vec<UpdateEntry>,
}

impl GroupedUpdates {
    pub fn group(&self, bump: VersionBump) -> &[UpdateEntry] {
        match bump {
            VersionBump::Major => &self.major,
            VersionBump::Minor => &self.minor,
            VersionBump::Patch => &self.patch,
        }
    }

    fn group_mut(&mut self, bump: VersionBump) -> &mut Vec<UpdateEntry> {
        match bump {
            VersionBump::Major => &mut self.major,
            VersionBump::Minor => &mut self.minor,
            VersionBump::Patch => &mut self.patch,
        }
    }

    pub fn push(&mut self, entry: UpdateEntry) {
        let bump = entry.bump();
        self.group_mut(bump).push(entry);
    }

    pub fn len(&self) -> usize {
        self.major.len() + self.minor.len() + self.patch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries in display order: patch, then minor, then major.
    pub fn iter(&self) -> impl Iterator<Item = (VersionBump, &UpdateEntry)> {
        VersionBump::DISPLAY_ORDER
            .into_iter()
            .flat_map(move |bump| self.group(bump).iter().map(move |entry| (bump, entry)))
    }
}

impl FromIterator<UpdateEntry> for GroupedUpdates {
    fn from_iter<I: IntoIterator<Item = UpdateEntry>>(iter: I) -> Self {
        let mut grouped = GroupedUpdates::default();
        for entry in iter {
            grouped.push(entry);
        }
        grouped
    }
}

/// Groups every decision that carries a chosen version by bump severity.
pub fn group_by_bump(decisions: &[SafetyDecision]) -> GroupedUpdates {
    decisions
        .iter()
        .filter_map(|decision| {
            let new_version = decision.chosen_version.as_ref()?;
            Some(UpdateEntry {
                name: decision.name.clone(),
                current_version: decision.current.clone(),
                new_version: new_version.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SafetyReason;

    fn decision(name: &str, current: &str, chosen: Option<&str>, reason: SafetyReason) -> SafetyDecision {
        SafetyDecision {
            name: name.to_string(),
            current: current.to_string(),
            chosen_version: chosen.map(str::to_string),
            reason,
        }
    }

    fn sample() -> Vec<SafetyDecision> {
        vec![
            decision("lodash", "^4.17.0", Some("4.19.0"), SafetyReason::Safe),
            decision("react", "^17.0.2", Some("18.2.0"), SafetyReason::Safe),
            decision("chalk", "~5.3.0", Some("5.3.1"), SafetyReason::Safe),
            decision("vite", "^5.0.0", None, SafetyReason::TooNew),
            decision("zod", "3.22.0", Some("3.23.0"), SafetyReason::Safe),
            decision("left-pad", "1.3.0", None, SafetyReason::MatchesInstalled),
            decision("axios", "^1.6.0", Some("1.6.8"), SafetyReason::RegistryUnreachable),
        ]
    }

    fn names(entries: &[UpdateEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn partitions_by_severity_preserving_order() {
        let grouped = group_by_bump(&sample());
        assert_eq!(names(&grouped.major), vec!["react"]);
        assert_eq!(names(&grouped.minor), vec!["lodash", "zod"]);
        assert_eq!(names(&grouped.patch), vec!["chalk", "axios"]);
    }

    #[test]
    fn group_sizes_match_eligible_decisions() {
        let decisions = sample();
        let grouped = group_by_bump(&decisions);
        let eligible = decisions.iter().filter(|d| d.is_eligible()).count();
        assert_eq!(grouped.len(), eligible);
        assert_eq!(
            grouped.major.len() + grouped.minor.len() + grouped.patch.len(),
            eligible
        );
    }

    #[test]
    fn excluded_decisions_never_appear() {
        let grouped = group_by_bump(&sample());
        assert!(grouped.iter().all(|(_, e)| e.name != "vite" && e.name != "left-pad"));
    }

    #[test]
    fn regrouping_flattened_output_is_idempotent() {
        let grouped = group_by_bump(&sample());
        let flattened: Vec<UpdateEntry> = grouped
            .patch
            .iter()
            .chain(&grouped.minor)
            .chain(&grouped.major)
            .cloned()
            .collect();

        let regrouped: GroupedUpdates = flattened.into_iter().collect();
        assert_eq!(regrouped, grouped);
    }

    #[test]
    fn iterates_in_display_order() {
        let grouped = group_by_bump(&sample());
        let bumps: Vec<VersionBump> = grouped.iter().map(|(bump, _)| bump).collect();
        let mut sorted = bumps.clone();
        sorted.sort();
        assert_eq!(bumps, sorted);
    }

    #[test]
    fn empty_input_yields_empty_groups() {
        let grouped = group_by_bump(&[]);
        assert!(grouped.is_empty());
    }
}

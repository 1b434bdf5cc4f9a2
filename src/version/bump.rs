use serde::Serialize;
use std::fmt;

/// Range operators that may prefix a declared dependency version.
const RANGE_OPERATORS: &[&str] = &[">=", "<=", "^", "~", ">", "<", "=", "v"];

/// Severity of a version change.
///
/// Variant order gives `Major > Minor > Patch`, which is only used to order
/// groups for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    Patch,
    Minor,
    Major,
}

impl VersionBump {
    /// Order in which groups are presented to the operator: least risky first.
    pub const DISPLAY_ORDER: [VersionBump; 3] =
        [VersionBump::Patch, VersionBump::Minor, VersionBump::Major];

    pub fn heading(self) -> &'static str {
        match self {
            VersionBump::Patch => "Patch updates",
            VersionBump::Minor => "Minor updates",
            VersionBump::Major => "Major updates",
        }
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VersionBump::Patch => "patch",
            VersionBump::Minor => "minor",
            VersionBump::Major => "major",
        };
        f.write_str(label)
    }
}

/// Strips range operators (`^`, `~`, `>=`, ...) and surrounding whitespace.
pub fn clean_version(raw: &str) -> &str {
    let mut rest = raw.trim();
    while let Some(next) = RANGE_OPERATORS.iter().find_map(|op| rest.strip_prefix(op)) {
        rest = next.trim_start();
    }
    rest
}

/// Returns the range operator prefix of a declared version (`"^"` for `"^1.2.3"`).
pub fn range_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    let cleaned = clean_version(trimmed);
    &trimmed[..trimmed.len() - cleaned.len()]
}

/// True for an exact `major.minor.patch` release with no prerelease or build suffix.
pub fn is_stable_release(version: &str) -> bool {
    parse_exact(version).is_some()
}

/// Parses a version after stripping range operators, accepting stable releases only.
pub fn parse_stable(raw: &str) -> Option<semver::Version> {
    parse_exact(clean_version(raw))
}

fn parse_exact(version: &str) -> Option<semver::Version> {
    let parsed = semver::Version::parse(version).ok()?;
    (parsed.pre.is_empty() && parsed.build.is_empty()).then_some(parsed)
}

/// Classifies the change from `installed` to `candidate`.
///
/// Unparsable input and equal versions both fall back to `Patch`. Callers must
/// treat that as a grouping default, not as a verified low-risk change.
pub fn classify_bump(installed: &str, candidate: &str) -> VersionBump {
    match (parse_stable(installed), parse_stable(candidate)) {
        (Some(current), Some(next)) if current.major != next.major => VersionBump::Major,
        (Some(current), Some(next)) if current.minor != next.minor => VersionBump::Minor,
        _ => VersionBump::Patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_range_operators() {
        assert_eq!(clean_version("^4.17.0"), "4.17.0");
        assert_eq!(clean_version("~1.2.3"), "1.2.3");
        assert_eq!(clean_version(">= 2.0.0"), "2.0.0");
        assert_eq!(clean_version("v3.1.0"), "3.1.0");
        assert_eq!(clean_version("1.0.0"), "1.0.0");
    }

    #[test]
    fn extracts_range_prefix() {
        assert_eq!(range_prefix("^4.17.0"), "^");
        assert_eq!(range_prefix("~1.2.3"), "~");
        assert_eq!(range_prefix("1.2.3"), "");
        assert_eq!(range_prefix(">=1.2.3"), ">=");
    }

    #[test]
    fn stable_release_detection() {
        assert!(is_stable_release("1.0.0"));
        assert!(!is_stable_release("1.0.0-beta.1"));
        assert!(!is_stable_release("1.0.0+build.5"));
        assert!(!is_stable_release("1.0"));
        assert!(!is_stable_release("^1.0.0"));
    }

    #[test]
    fn classifies_by_first_differing_component() {
        for (a, b, c) in [(0u64, 0u64, 0u64), (1, 2, 3), (4, 17, 21), (10, 0, 9)] {
            let base = format!("{a}.{b}.{c}");
            assert_eq!(
                classify_bump(&base, &format!("{}.{b}.{c}", a + 1)),
                VersionBump::Major
            );
            assert_eq!(
                classify_bump(&base, &format!("{a}.{}.{c}", b + 1)),
                VersionBump::Minor
            );
            assert_eq!(
                classify_bump(&base, &format!("{a}.{b}.{}", c + 1)),
                VersionBump::Patch
            );
            assert_eq!(
                classify_bump(&base, &format!("{}.{}.{}", a + 1, b + 3, c + 7)),
                VersionBump::Major
            );
        }
    }

    #[test]
    fn classification_ignores_range_prefix() {
        assert_eq!(classify_bump("^4.17.0", "4.19.0"), VersionBump::Minor);
        assert_eq!(classify_bump("~4.17.0", "5.0.0"), VersionBump::Major);
    }

    #[test]
    fn unparsable_or_equal_falls_back_to_patch() {
        assert_eq!(classify_bump("latest", "5.0.0"), VersionBump::Patch);
        assert_eq!(classify_bump("1.0.0", "2.0.0+build"), VersionBump::Patch);
        assert_eq!(classify_bump("1.0.0", "2.0.0-rc.1"), VersionBump::Patch);
        assert_eq!(classify_bump("^2.0.0", "2.0.0"), VersionBump::Patch);
    }

    #[test]
    fn display_ordering_ranks_major_highest() {
        assert!(VersionBump::Major > VersionBump::Minor);
        assert!(VersionBump::Minor > VersionBump::Patch);
    }
}

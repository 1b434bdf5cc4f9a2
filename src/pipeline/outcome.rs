use crate::manifest::Manifest;
use serde::{Serialize, Serializer};
use std::fmt;

/// Result of an apply or verify operation.
///
/// `Skipped` means "not attempted" and is never a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn is_failed(self) -> bool {
        self == Outcome::Failed
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// The pipeline's steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    CheckUpdates,
    SafetyBuffer,
    Organize,
    Select,
    SecurityValidation,
    Install,
    Reinstall,
    QualityChecks,
    BuildVerification,
}

impl StepName {
    pub const ALL: [StepName; 9] = [
        StepName::CheckUpdates,
        StepName::SafetyBuffer,
        StepName::Organize,
        StepName::Select,
        StepName::SecurityValidation,
        StepName::Install,
        StepName::Reinstall,
        StepName::QualityChecks,
        StepName::BuildVerification,
    ];

    /// 1-based position used in console headings.
    pub fn position(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            StepName::CheckUpdates => "Checking for available updates",
            StepName::SafetyBuffer => "Applying safety buffer",
            StepName::Organize => "Organizing updates by risk",
            StepName::Select => "Selecting updates",
            StepName::SecurityValidation => "Validating selected packages",
            StepName::Install => "Installing updates",
            StepName::Reinstall => "Reinstalling dependencies",
            StepName::QualityChecks => "Running quality checks",
            StepName::BuildVerification => "Verifying build",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepName::CheckUpdates => "check_updates",
            StepName::SafetyBuffer => "safety_buffer",
            StepName::Organize => "organize",
            StepName::Select => "select",
            StepName::SecurityValidation => "security_validation",
            StepName::Install => "install",
            StepName::Reinstall => "reinstall",
            StepName::QualityChecks => "quality_checks",
            StepName::BuildVerification => "build_verification",
        };
        f.write_str(label)
    }
}

/// Normal, non-error reasons for stopping before the last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyExitReason {
    NoUpdatesAvailable,
    AllFilteredBySafetyBuffer,
    NothingSelected,
    NoPackagesConfirmed,
}

impl EarlyExitReason {
    pub fn describe(self) -> &'static str {
        match self {
            EarlyExitReason::NoUpdatesAvailable => "All dependencies are up to date",
            EarlyExitReason::AllFilteredBySafetyBuffer => {
                "Every available update is newer than the safety buffer"
            }
            EarlyExitReason::NothingSelected => "No updates were selected",
            EarlyExitReason::NoPackagesConfirmed => "No packages were confirmed for installation",
        }
    }
}

impl fmt::Display for EarlyExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            EarlyExitReason::NoUpdatesAvailable => "no_updates_available",
            EarlyExitReason::AllFilteredBySafetyBuffer => "all_filtered_by_safety_buffer",
            EarlyExitReason::NothingSelected => "nothing_selected",
            EarlyExitReason::NoPackagesConfirmed => "no_packages_confirmed",
        };
        f.write_str(code)
    }
}

/// What a step hands back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    /// Proceed, passing `T` to the next step.
    Continue(T),
    /// Stop normally.
    Exit(EarlyExitReason),
    /// Stop because the named step's apply operation failed.
    Abort(StepName),
}

/// Verification checks recorded in [`RunStatistics::checks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Reinstall,
    Lint,
    Typecheck,
    Test,
    Build,
}

impl CheckKind {
    pub const QUALITY: [CheckKind; 3] = [CheckKind::Lint, CheckKind::Typecheck, CheckKind::Test];

    /// Script names tried in order when looking this check up in the manifest.
    pub fn script_names(self) -> &'static [&'static str] {
        match self {
            CheckKind::Reinstall => &[],
            CheckKind::Lint => &["lint"],
            CheckKind::Typecheck => &["typecheck", "type-check", "check-types"],
            CheckKind::Test => &["test"],
            CheckKind::Build => &["build"],
        }
    }

    /// First declared script for this check, ignoring npm's placeholder test script.
    pub fn resolve_script(self, manifest: &Manifest) -> Option<&'static str> {
        self.script_names().iter().copied().find(|name| {
            manifest.has_script(name)
                && !manifest
                    .script(name)
                    .is_some_and(|body| body.contains("no test specified"))
        })
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckKind::Reinstall => "reinstall",
            CheckKind::Lint => "lint",
            CheckKind::Typecheck => "typecheck",
            CheckKind::Test => "test",
            CheckKind::Build => "build",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckRecord {
    pub check: CheckKind,
    pub outcome: Outcome,
}

/// Counters owned by the orchestrator, each written once by the step that owns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub candidates_found: usize,
    pub candidates_after_filter: usize,
    pub selected: usize,
    pub installed: usize,
    /// Selected packages that were not installed (declined during validation).
    pub skipped: usize,
    pub duration_ms: u64,
    pub checks: Vec<CheckRecord>,
}

impl RunStatistics {
    pub fn outcome_of(&self, check: CheckKind) -> Option<Outcome> {
        self.checks
            .iter()
            .find(|record| record.check == check)
            .map(|record| record.outcome)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = CheckKind> + '_ {
        self.checks
            .iter()
            .filter(|record| record.outcome.is_failed())
            .map(|record| record.check)
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    Completed,
    EarlyExit(EarlyExitReason),
    Failed(StepName),
    UserCancelled,
}

impl fmt::Display for RunReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunReason::Completed => f.write_str("completed"),
            RunReason::EarlyExit(reason) => write!(f, "{reason}"),
            RunReason::Failed(step) => write!(f, "{step}_failed"),
            RunReason::UserCancelled => f.write_str("user_cancelled"),
        }
    }
}

impl Serialize for RunReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CANCELLED: i32 = 130;

/// The single output of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    pub success: bool,
    pub exit_code: i32,
    pub reason: RunReason,
    pub stats: RunStatistics,
}

impl RunResult {
    pub fn new(reason: RunReason, stats: RunStatistics) -> Self {
        let (success, exit_code) = match reason {
            RunReason::Completed | RunReason::EarlyExit(_) => (true, EXIT_OK),
            RunReason::Failed(_) => (false, EXIT_FAILURE),
            RunReason::UserCancelled => (false, EXIT_CANCELLED),
        };
        Self {
            success,
            exit_code,
            reason,
            stats,
        }
    }
}

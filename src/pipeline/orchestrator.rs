use crate::agents::{InstallRequest, Picker, SecurityScanner, Toolchain, UpdateSource};
use crate::error::{Result, SafeUpdateError};
use crate::pipeline::{
    CheckKind, CheckRecord, EarlyExitReason, Outcome, RunContext, RunReason, RunResult,
    RunStatistics, StepName, StepOutcome,
};
use crate::registry::RegistryClient;
use crate::safety::{
    SafetyDecision, SafetyFilter, SafetyReason, UpdateCandidate, join_with_manifest,
};
use crate::selection::{Choice, SelectionItem, build_choices};
use crate::version::{GroupedUpdates, VersionBump, clean_version, group_by_bump, range_prefix};
use colored::Colorize;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Unwraps a step's [`StepOutcome`], returning from `run_steps` on exit or abort.
macro_rules! proceed {
    ($step:expr) => {
        match $step? {
            StepOutcome::Continue(value) => value,
            StepOutcome::Exit(reason) => return Ok(RunReason::EarlyExit(reason)),
            StepOutcome::Abort(step) => return Ok(RunReason::Failed(step)),
        }
    };
}

/// Everything outside the process the pipeline talks to.
pub struct Collaborators {
    pub discovery: Box<dyn UpdateSource>,
    pub registry: Arc<dyn RegistryClient>,
    pub picker: Box<dyn Picker>,
    pub security: Box<dyn SecurityScanner>,
    pub toolchain: Box<dyn Toolchain>,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Remove `node_modules` and reinstall after applying updates.
    pub reinstall: bool,
    /// Run lint, typecheck, test and build scripts after applying updates.
    pub verify: bool,
    pub show_progress: bool,
    /// Suppress step headings, e.g. when the result is printed as JSON.
    pub quiet: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            reinstall: true,
            verify: true,
            show_progress: true,
            quiet: false,
        }
    }
}

pub struct Pipeline {
    context: RunContext,
    collaborators: Collaborators,
    options: PipelineOptions,
    stats: RunStatistics,
}

impl Pipeline {
    pub fn new(context: RunContext, collaborators: Collaborators, options: PipelineOptions) -> Self {
        Self {
            context,
            collaborators,
            options,
            stats: RunStatistics::default(),
        }
    }

    /// Runs every step in order and reports how the run ended.
    ///
    /// Cancellation by the operator becomes a `user_cancelled` result here and
    /// nowhere else. Any other error is returned to the caller.
    pub fn run(mut self) -> Result<RunResult> {
        let reason = match self.run_steps() {
            Ok(reason) => reason,
            Err(SafeUpdateError::UserCancelled) => {
                info!("run cancelled by the operator");
                RunReason::UserCancelled
            }
            Err(err) => return Err(err),
        };

        self.stats.duration_ms = self.context.elapsed_ms();
        info!(%reason, duration_ms = self.stats.duration_ms, "pipeline finished");
        Ok(RunResult::new(reason, self.stats))
    }

    fn run_steps(&mut self) -> Result<RunReason> {
        let candidates = proceed!(self.check_updates());
        let decisions = proceed!(self.safety_buffer(&candidates));
        let grouped = proceed!(self.organize(&decisions));
        let selected = proceed!(self.select(&grouped));
        let confirmed = proceed!(self.security_validation(selected));
        proceed!(self.install(&confirmed));
        proceed!(self.reinstall());
        proceed!(self.quality_checks());
        proceed!(self.build_verification());
        Ok(RunReason::Completed)
    }

    fn check_updates(&mut self) -> Result<StepOutcome<Vec<UpdateCandidate>>> {
        self.announce(StepName::CheckUpdates);
        let suggestions = self
            .collaborators
            .discovery
            .discover(&self.context.manifest)?;
        let candidates = join_with_manifest(&self.context.manifest, suggestions);

        self.stats.candidates_found = candidates.len();
        if candidates.is_empty() {
            return Ok(StepOutcome::Exit(EarlyExitReason::NoUpdatesAvailable));
        }

        self.say(format!("   Found {} available update(s)", candidates.len()));
        Ok(StepOutcome::Continue(candidates))
    }

    fn safety_buffer(
        &mut self,
        candidates: &[UpdateCandidate],
    ) -> Result<StepOutcome<Vec<SafetyDecision>>> {
        self.announce(StepName::SafetyBuffer);
        self.say(format!(
            "   Only versions published before {} ({} day buffer)",
            self.context.cutoff.strftime("%Y-%m-%d %H:%M UTC"),
            self.context.buffer_days
        ));

        let decisions = SafetyFilter::new(self.collaborators.registry.as_ref(), self.context.cutoff)
            .with_progress(self.options.show_progress && !self.options.quiet)
            .evaluate(candidates);

        for decision in &decisions {
            match (decision.reason, decision.chosen_version.as_deref()) {
                (SafetyReason::RegistryUnreachable, Some(version)) => self.say(format!(
                    "   {}",
                    format!("⚠ {}: registry unreachable, keeping suggested {version}", decision.name)
                        .yellow()
                )),
                (SafetyReason::TooNew, _) => self.say(format!(
                    "   {}",
                    format!("• {}: no release old enough", decision.name).dimmed()
                )),
                (SafetyReason::MatchesInstalled, _) => self.say(format!(
                    "   {}",
                    format!("• {}: newest safe release is already installed", decision.name)
                        .dimmed()
                )),
                _ => {}
            }
        }

        let eligible = decisions.iter().filter(|d| d.is_eligible()).count();
        self.stats.candidates_after_filter = eligible;
        if eligible == 0 {
            return Ok(StepOutcome::Exit(EarlyExitReason::AllFilteredBySafetyBuffer));
        }

        self.say(format!(
            "{}",
            format!("✓ {eligible} of {} update(s) passed the safety buffer", decisions.len())
                .green()
        ));
        Ok(StepOutcome::Continue(decisions))
    }

    fn organize(&mut self, decisions: &[SafetyDecision]) -> Result<StepOutcome<GroupedUpdates>> {
        self.announce(StepName::Organize);
        let grouped = group_by_bump(decisions);
        for (bump, entry) in grouped.iter() {
            debug!(package = %entry.name, %bump, from = %entry.current_version, to = %entry.new_version, "grouped update");
        }

        for bump in VersionBump::DISPLAY_ORDER {
            let count = grouped.group(bump).len();
            if count > 0 {
                self.say(format!("   • {}: {count}", bump.heading()));
            }
        }

        Ok(StepOutcome::Continue(grouped))
    }

    fn select(&mut self, grouped: &GroupedUpdates) -> Result<StepOutcome<Vec<SelectionItem>>> {
        self.announce(StepName::Select);
        let choices = build_choices(grouped);
        let picked = self.collaborators.picker.pick(&choices)?;

        let offered: Vec<&SelectionItem> = choices.iter().filter_map(Choice::item).collect();
        let mut selected: Vec<SelectionItem> = Vec::with_capacity(picked.len());
        for item in picked {
            if !offered.contains(&&item) {
                warn!(package = %item.name, version = %item.version, "ignoring selection that was not offered");
                continue;
            }
            if !selected.contains(&item) {
                selected.push(item);
            }
        }

        self.stats.selected = selected.len();
        if selected.is_empty() {
            return Ok(StepOutcome::Exit(EarlyExitReason::NothingSelected));
        }

        self.say(format!("   {} update(s) selected", selected.len()));
        Ok(StepOutcome::Continue(selected))
    }

    fn security_validation(
        &mut self,
        selected: Vec<SelectionItem>,
    ) -> Result<StepOutcome<Vec<SelectionItem>>> {
        self.announce(StepName::SecurityValidation);
        let approved = self.collaborators.security.confirm(&selected)?;

        let confirmed: Vec<SelectionItem> = selected
            .iter()
            .filter(|item| approved.contains(item))
            .cloned()
            .collect();
        self.stats.skipped = selected.len() - confirmed.len();

        if confirmed.is_empty() {
            return Ok(StepOutcome::Exit(EarlyExitReason::NoPackagesConfirmed));
        }

        self.say(format!(
            "{}",
            format!("✓ {} package(s) confirmed", confirmed.len()).green()
        ));
        Ok(StepOutcome::Continue(confirmed))
    }

    fn install(&mut self, confirmed: &[SelectionItem]) -> Result<StepOutcome<()>> {
        self.announce(StepName::Install);
        let requests: Vec<InstallRequest> = confirmed
            .iter()
            .map(|item| self.install_request(item))
            .collect();

        let report = self.collaborators.toolchain.install(&requests)?;
        self.stats.installed = report.installed.len();

        match report.outcome() {
            Outcome::Succeeded => {
                self.say(format!(
                    "{}",
                    format!("✓ Installed {} package(s)", report.installed.len()).green()
                ));
                Ok(StepOutcome::Continue(()))
            }
            Outcome::Skipped => {
                self.stats.skipped += requests.len();
                self.say(format!("   {}", "Nothing was installed".dimmed()));
                Ok(StepOutcome::Continue(()))
            }
            Outcome::Failed => {
                let packages: Vec<String> =
                    report.failed.iter().map(InstallRequest::package_arg).collect();
                warn!(failed = ?packages, installed = report.installed.len(), "install failed");
                self.say(format!(
                    "{}",
                    format!("✗ Failed to install {}", packages.join(" ")).red()
                ));
                if !report.installed.is_empty() {
                    let applied: Vec<&str> =
                        report.installed.iter().map(|r| r.name.as_str()).collect();
                    self.say(format!(
                        "   {}",
                        format!("Already applied: {}", applied.join(", ")).yellow()
                    ));
                }
                Ok(StepOutcome::Abort(StepName::Install))
            }
        }
    }

    /// Keeps the range operator declared in the manifest, e.g. `^4.17.0` -> `^4.19.0`.
    fn install_request(&self, item: &SelectionItem) -> InstallRequest {
        let manifest = &self.context.manifest;
        let declared = manifest.get_package_version(&item.name).unwrap_or_default();
        InstallRequest {
            name: item.name.clone(),
            spec: format!("{}{}", range_prefix(declared), clean_version(&item.version)),
            dev: manifest.is_dev_dependency(&item.name),
        }
    }

    fn reinstall(&mut self) -> Result<StepOutcome<()>> {
        self.announce(StepName::Reinstall);
        let outcome = if self.options.reinstall {
            self.collaborators.toolchain.reinstall()?
        } else {
            Outcome::Skipped
        };
        self.record(CheckKind::Reinstall, outcome);
        Ok(StepOutcome::Continue(()))
    }

    fn quality_checks(&mut self) -> Result<StepOutcome<()>> {
        self.announce(StepName::QualityChecks);
        for check in CheckKind::QUALITY {
            let outcome = self.run_check(check)?;
            self.record(check, outcome);
        }
        Ok(StepOutcome::Continue(()))
    }

    fn build_verification(&mut self) -> Result<StepOutcome<()>> {
        self.announce(StepName::BuildVerification);
        let outcome = self.run_check(CheckKind::Build)?;
        self.record(CheckKind::Build, outcome);
        Ok(StepOutcome::Continue(()))
    }

    fn run_check(&self, check: CheckKind) -> Result<Outcome> {
        if !self.options.verify {
            return Ok(Outcome::Skipped);
        }
        match check.resolve_script(&self.context.manifest) {
            Some(script) => self.collaborators.toolchain.run_script(script),
            None => {
                debug!(%check, "no script declared");
                Ok(Outcome::Skipped)
            }
        }
    }

    /// Failures here are reported but never fail the run.
    fn record(&mut self, check: CheckKind, outcome: Outcome) {
        let line = match outcome {
            Outcome::Succeeded => format!("✓ {check} passed").green(),
            Outcome::Failed => format!("✗ {check} failed").red(),
            Outcome::Skipped => format!("- {check} skipped").dimmed(),
        };
        self.say(format!("   {line}"));
        if outcome.is_failed() {
            warn!(%check, "verification failed after applying updates");
        }
        self.stats.checks.push(CheckRecord { check, outcome });
    }

    fn announce(&self, step: StepName) {
        debug!(%step, "entering step");
        if !self.options.quiet {
            println!(
                "\n{}",
                format!("{}. {}...", step.position(), step.title()).yellow()
            );
        }
    }

    fn say(&self, line: impl Display) {
        if !self.options.quiet {
            println!("{line}");
        }
    }
}

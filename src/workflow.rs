use crate::agents::{
    NpmCheckUpdates, OutputTarget, PackageManagerToolchain, Picker, Prompter,
    RegistrySecurityScanner, SecurityScanner, SelectAllPicker, TerminalPicker, UpdateSource,
};
use crate::config::RunConfig;
use crate::error::Result;
use crate::manifest::{ProjectInfo, ProjectScanner};
use crate::pipeline::{
    CheckKind, Collaborators, EXIT_OK, Outcome, Pipeline, RunContext, RunReason, RunResult,
};
use crate::registry::{NpmRegistry, RegistryClient};
use crate::safety::{SafetyDecision, SafetyFilter, join_with_manifest};
use crate::version::{GroupedUpdates, VersionBump, group_by_bump};
use colored::Colorize;
use serde::Serialize;
use std::io::{self, BufReader, Stdin, Write};
use std::sync::Arc;

/// Execute the update workflow. Returns the process exit code.
pub fn execute_update(config: &RunConfig) -> Result<i32> {
    if !config.json {
        println!("{}", "Starting safe dependency update...".cyan().bold());
    }

    let project_info = validate_project(config)?;
    let registry: Arc<dyn RegistryClient> = Arc::new(connect_registry(config)?);

    let discovery: Box<dyn UpdateSource> = Box::new(
        NpmCheckUpdates::new(&project_info.project_path).with_filter(config.filter.as_deref())?,
    );
    // JSON runs keep stdout for the report; prompts and tool output go to stderr.
    let (picker, security) = match config.tool_output() {
        OutputTarget::Stdout => operator_collaborators(config, &registry, io::stdout),
        OutputTarget::Stderr => operator_collaborators(config, &registry, io::stderr),
    };
    let toolchain = Box::new(
        PackageManagerToolchain::new(&project_info.project_path, project_info.package_manager)
            .with_output(config.tool_output()),
    );

    let context = RunContext::new(project_info.manifest, config.buffer_days)?;
    let collaborators = Collaborators {
        discovery,
        registry,
        picker,
        security,
        toolchain,
    };

    let result = Pipeline::new(context, collaborators, config.pipeline_options()).run()?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_run_summary(&result);
    }

    Ok(result.exit_code)
}

/// Picker and security scanner, writing everything they print to `output()`.
fn operator_collaborators<W: Write + 'static>(
    config: &RunConfig,
    registry: &Arc<dyn RegistryClient>,
    output: fn() -> W,
) -> (Box<dyn Picker>, Box<dyn SecurityScanner>) {
    if config.assume_yes {
        (
            Box::new(SelectAllPicker),
            Box::new(RegistrySecurityScanner::<BufReader<Stdin>, W>::unattended(
                Arc::clone(registry),
                output(),
            )),
        )
    } else {
        (
            Box::new(TerminalPicker::new(Prompter::stdin(output()))),
            Box::new(RegistrySecurityScanner::interactive(
                Arc::clone(registry),
                Prompter::stdin(output()),
            )),
        )
    }
}

fn validate_project(config: &RunConfig) -> Result<ProjectInfo> {
    let project_info = ProjectScanner::new(&config.project_path).validate()?;
    if !config.json {
        println!("{}", "✓ Project structure is valid".green());
        println!(
            "   • {} ({}, {})",
            project_info.manifest.name.as_deref().unwrap_or("unnamed project").bright_cyan(),
            project_info.manifest_path.display().to_string().dimmed(),
            project_info.package_manager
        );
    }
    Ok(project_info)
}

fn connect_registry(config: &RunConfig) -> Result<NpmRegistry> {
    let registry = NpmRegistry::with_base_url(&config.registry_url)?;
    if !config.json {
        println!("   • registry {}", registry.base_url().dimmed());
    }
    Ok(registry)
}

fn print_run_summary(result: &RunResult) {
    let stats = &result.stats;

    match result.reason {
        RunReason::Completed => {}
        RunReason::EarlyExit(reason) => {
            println!("\n{}", format!("✨ {}", reason.describe()).green().bold());
            return;
        }
        RunReason::Failed(step) => {
            println!(
                "\n{}",
                format!("✗ Update failed during step {}: {}", step.position(), step.title())
                    .red()
                    .bold()
            );
            return;
        }
        RunReason::UserCancelled => {
            println!("\n{}", "Update cancelled by user.".yellow());
            return;
        }
    }

    println!("\n{}", "📦 Update Summary:".cyan().bold());
    println!("  • Available updates: {}", stats.candidates_found);
    println!("  • Passed safety buffer: {}", stats.candidates_after_filter);
    println!("  • Selected: {}", stats.selected);
    println!("  • Installed: {}", stats.installed.to_string().green().bold());
    if stats.skipped > 0 {
        println!("  • Skipped: {}", stats.skipped.to_string().yellow());
    }

    println!("\n{}:", "Verification".cyan().bold());
    for record in &stats.checks {
        let outcome = match record.outcome {
            Outcome::Succeeded => "passed".green(),
            Outcome::Failed => "failed".red().bold(),
            Outcome::Skipped => "skipped".dimmed(),
        };
        println!("  • {:<10} {}", record.check.to_string(), outcome);
    }
    if stats.outcome_of(CheckKind::Reinstall) == Some(Outcome::Failed) {
        println!(
            "{}",
            "   node_modules may be incomplete; run a clean install before using the project."
                .yellow()
        );
    }

    let failed: Vec<CheckKind> = stats.failed_checks().collect();
    if failed.is_empty() {
        println!(
            "\n{}",
            "✨ Update process completed successfully!".green().bold()
        );
    } else {
        let names: Vec<String> = failed.iter().map(ToString::to_string).collect();
        println!(
            "\n{}",
            format!(
                "⚠ Updates were installed but {} failed. Review the output above.",
                names.join(", ")
            )
            .yellow()
            .bold()
        );
    }
    println!("{}", format!("   Finished in {} ms", stats.duration_ms).dimmed());
}

/// Dry-run report for `check --json`.
#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    buffer_days: u32,
    cutoff: String,
    decisions: &'a [SafetyDecision],
    updates: &'a GroupedUpdates,
}

/// Execute the check workflow (dry-run): discover, apply the safety buffer and group.
pub fn execute_check(config: &RunConfig) -> Result<i32> {
    if !config.json {
        println!(
            "{}",
            format!(
                "Checking for updates at least {} day(s) old...",
                config.buffer_days
            )
            .cyan()
            .bold()
        );
    }

    let project_info = validate_project(config)?;
    let registry = connect_registry(config)?;
    let context = RunContext::new(project_info.manifest, config.buffer_days)?;

    if !config.json {
        println!("\n{}", "1. Checking for available updates...".yellow());
    }
    let suggestions = NpmCheckUpdates::new(&project_info.project_path)
        .with_filter(config.filter.as_deref())?
        .discover(&context.manifest)?;
    let candidates = join_with_manifest(&context.manifest, suggestions);

    if !config.json {
        println!("\n{}", "2. Applying safety buffer...".yellow());
    }
    let decisions = SafetyFilter::new(&registry, context.cutoff)
        .with_progress(!config.json)
        .evaluate(&candidates);
    let grouped = group_by_bump(&decisions);

    if config.json {
        let report = CheckReport {
            buffer_days: context.buffer_days,
            cutoff: context.cutoff.to_string(),
            decisions: &decisions,
            updates: &grouped,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", "✓ Check completed".green());
        print_available_updates(&decisions, &grouped);
    }

    Ok(EXIT_OK)
}

fn print_available_updates(decisions: &[SafetyDecision], grouped: &GroupedUpdates) {
    let held_back: Vec<&SafetyDecision> = decisions.iter().filter(|d| !d.is_eligible()).collect();

    if grouped.is_empty() {
        println!("\n{}", "✨ No updates have aged past the safety buffer".green().bold());
    } else {
        println!("\n{}", "📦 Available Updates:".cyan().bold());
        println!(
            "{}",
            format!("Found {} safe update(s)", grouped.len()).yellow()
        );

        for bump in VersionBump::DISPLAY_ORDER {
            let entries = grouped.group(bump);
            if entries.is_empty() {
                continue;
            }
            println!("\n{}:", bump.heading().cyan().bold());
            for entry in entries {
                let new_version = match bump {
                    VersionBump::Major => entry.new_version.red().bold(),
                    VersionBump::Minor => entry.new_version.yellow().bold(),
                    VersionBump::Patch => entry.new_version.green().bold(),
                };
                println!(
                    "  • {} {} → {}",
                    entry.name.white().bold(),
                    entry.current_version.dimmed(),
                    new_version
                );
            }
        }
    }

    if !held_back.is_empty() {
        println!("\n{}:", "Held back".cyan().bold());
        for decision in held_back {
            println!(
                "  • {} {} ({})",
                decision.name.white(),
                decision.current.dimmed(),
                decision.reason.to_string().dimmed()
            );
        }
    }

    if !grouped.is_empty() {
        println!("\n{}", "To review and apply these updates, run:".dimmed());
        println!("  {}", "safe-update update".cyan());
    }
}

/// Execute the list workflow - display all declared dependencies
pub fn execute_list(config: &RunConfig) -> Result<i32> {
    println!("{}", "Listing dependencies in package.json...".cyan().bold());

    let project_info = validate_project(config)?;
    let manifest = &project_info.manifest;

    println!("\n{}", "📦 Dependencies:".cyan().bold());

    let (runtime, dev): (Vec<_>, Vec<_>) =
        manifest.all_dependencies().partition(|(_, _, is_dev)| !is_dev);

    for (title, entries) in [("Dependencies", runtime), ("Dev dependencies", dev)] {
        if entries.is_empty() {
            continue;
        }
        println!("\n{}", format!("{title}:").yellow().bold());
        for (name, range, _) in entries {
            println!("  • {} {}", name.white().bold(), range.dimmed());
        }
    }

    let scripts: Vec<&str> = CheckKind::QUALITY
        .into_iter()
        .chain([CheckKind::Build])
        .filter_map(|check| check.resolve_script(manifest))
        .collect();
    if !scripts.is_empty() {
        println!(
            "\n{} {}",
            "Verification scripts:".yellow().bold(),
            scripts.join(", ")
        );
    }

    Ok(EXIT_OK)
}

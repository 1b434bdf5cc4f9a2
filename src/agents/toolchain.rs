use crate::error::{Result, SafeUpdateError};
use crate::manifest::PackageManager;
use crate::pipeline::Outcome;
use crate::utils::path_validator::PathValidator;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// A package to install at an exact spec, e.g. `lodash@^4.19.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub name: String,
    /// Version spec written to the manifest, keeping the original range operator.
    pub spec: String,
    pub dev: bool,
}

impl InstallRequest {
    pub fn package_arg(&self) -> String {
        format!("{}@{}", self.name, self.spec)
    }
}

/// What an install call applied. Dependency groups are installed one command
/// at a time, so a failure can leave earlier groups applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub installed: Vec<InstallRequest>,
    /// Requests of the group whose command failed. Later groups are not attempted.
    pub failed: Vec<InstallRequest>,
}

impl InstallReport {
    pub fn outcome(&self) -> Outcome {
        if !self.failed.is_empty() {
            Outcome::Failed
        } else if self.installed.is_empty() {
            Outcome::Skipped
        } else {
            Outcome::Succeeded
        }
    }
}

/// Where package-manager output goes. `Stderr` keeps stdout clean for JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputTarget {
    #[default]
    Stdout,
    Stderr,
}

impl OutputTarget {
    fn echo(self, line: &str) {
        match self {
            OutputTarget::Stdout => println!("{}", line.dimmed()),
            OutputTarget::Stderr => eprintln!("{}", line.dimmed()),
        }
    }

    fn child_stdout(self) -> Stdio {
        match self {
            OutputTarget::Stdout => Stdio::inherit(),
            OutputTarget::Stderr => Stdio::from(std::io::stderr()),
        }
    }
}

/// Apply and verify operations run against the project.
///
/// A non-zero exit is `Outcome::Failed`; `Err` is reserved for not being able
/// to run the tool at all.
pub trait Toolchain {
    fn install(&self, requests: &[InstallRequest]) -> Result<InstallReport>;
    fn reinstall(&self) -> Result<Outcome>;
    fn run_script(&self, script: &str) -> Result<Outcome>;
}

/// Appends `.cmd` to Node shims on Windows.
pub fn program_name(base: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{base}.cmd")
    } else {
        base.to_string()
    }
}

/// PackageManagerToolchain drives npm, pnpm, yarn or bun inside the project.
pub struct PackageManagerToolchain {
    project_path: PathBuf,
    package_manager: PackageManager,
    program: String,
    output: OutputTarget,
}

impl PackageManagerToolchain {
    pub fn new<P: AsRef<Path>>(project_path: P, package_manager: PackageManager) -> Self {
        Self {
            project_path: project_path.as_ref().to_path_buf(),
            package_manager,
            program: program_name(package_manager.program()),
            output: OutputTarget::default(),
        }
    }

    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    /// Runs the package manager so its output streams live.
    fn execute(&self, args: &[&str]) -> Result<Outcome> {
        let program = &self.program;
        self.output.echo(&format!("   $ {} {}", program, args.join(" ")));
        debug!(%program, ?args, cwd = %self.project_path.display(), "spawning command");

        let status = Command::new(program)
            .current_dir(&self.project_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(self.output.child_stdout())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| {
                SafeUpdateError::CommandExecution(format!("Failed to spawn {program}: {e}"))
            })?;

        if status.success() {
            Ok(Outcome::Succeeded)
        } else {
            info!(
                %program,
                exit_code = status.code().unwrap_or(-1),
                "command exited unsuccessfully"
            );
            Ok(Outcome::Failed)
        }
    }
}

impl Toolchain for PackageManagerToolchain {
    fn install(&self, requests: &[InstallRequest]) -> Result<InstallReport> {
        let mut report = InstallReport::default();

        for dev in [false, true] {
            let group: Vec<InstallRequest> =
                requests.iter().filter(|r| r.dev == dev).cloned().collect();
            if group.is_empty() {
                continue;
            }

            let packages: Vec<String> = group.iter().map(InstallRequest::package_arg).collect();
            let mut args: Vec<&str> = self.package_manager.add_args(dev);
            args.extend(packages.iter().map(String::as_str));
            if self.execute(&args)?.is_failed() {
                report.failed = group;
                break;
            }
            report.installed.extend(group);
        }

        Ok(report)
    }

    fn reinstall(&self) -> Result<Outcome> {
        let node_modules = self.project_path.join("node_modules");
        if node_modules.exists() {
            let target = PathValidator::validate_inside(&node_modules, &self.project_path)?;
            debug!(path = %target.display(), "removing node_modules");
            std::fs::remove_dir_all(&target)?;
        }
        self.execute(&self.package_manager.install_args())
    }

    fn run_script(&self, script: &str) -> Result<Outcome> {
        self.execute(&self.package_manager.run_args(script))
    }
}

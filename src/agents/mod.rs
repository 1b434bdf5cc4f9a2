//! External collaborators driven by the pipeline.
//!
//! Each collaborator sits behind a trait so the orchestrator can be exercised
//! with in-memory fakes.

pub mod discovery;
pub mod interaction;
pub mod security;
pub mod toolchain;

pub use discovery::{NpmCheckUpdates, UpdateSource};
pub use interaction::{Picker, Prompter, SelectAllPicker, TerminalPicker};
pub use security::{RegistrySecurityScanner, SecurityScanner};
pub use toolchain::{
    InstallReport, InstallRequest, OutputTarget, PackageManagerToolchain, Toolchain,
};

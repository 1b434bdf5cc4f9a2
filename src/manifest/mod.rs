pub mod package_json;
pub mod project_scanner;

pub use package_json::Manifest;
pub use project_scanner::{PackageManager, ProjectInfo, ProjectScanner};

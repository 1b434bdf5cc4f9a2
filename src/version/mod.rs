pub mod bump;
pub mod grouping;

pub use bump::{
    VersionBump, classify_bump, clean_version, is_stable_release, parse_stable, range_prefix,
};
pub use grouping::{GroupedUpdates, UpdateEntry, group_by_bump};

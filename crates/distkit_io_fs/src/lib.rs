//! `distkit_io_fs` v1:
//! Rust-side filtered tree mirror for distribution packaging.
//!
//! Modules:
//! - `mirror`  : traversal planning and copy orchestration
//! - `promote` : default-variant promotion to an alias directory
//! - `spec`    : enums/options/errors
//! - `report`  : run-time report model
//! - `util`    : pattern matching and path helpers

pub mod mirror;
pub mod promote;
pub mod report;
pub mod spec;
mod util;

pub use mirror::{FilenamePredicate, mirror_tree, mirror_tree_with};
pub use promote::promote_files;
pub use report::{ReportMirror, ReportMirrorBuilder};
pub use spec::{
    EnumMirrorErrorPolicy, EnumMirrorOperation, EnumMirrorPatternMode, EnumMirrorSymlinkStrategy,
    MirrorTreeError, SpecMirrorError, SpecMirrorOptions, SpecPromoteOptions,
};
pub use util::rewrite_prefix;

//! Mirror option models and top-level error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Symlink handling policy while walking the source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMirrorSymlinkStrategy {
    /// Follow the link; directory links are checked against their ancestors.
    Dereference,
    /// Ignore symlink entries and record a warning.
    SkipSymlinks,
    /// Fail with [`MirrorTreeError::SymlinkRejected`].
    Error,
}

/// Pattern matching mode for include/exclude lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMirrorPatternMode {
    /// Filename suffix. `"h"` and `".h"` both match `foo.h`.
    Extension,
    /// Shell-like wildcards (`*`, `?`, character classes).
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Exact basename match.
    Literal,
}

/// What to do when one entry fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMirrorErrorPolicy {
    /// Return the first error and stop.
    Abort,
    /// Record the error in the report and keep going.
    Collect,
}

/// Filesystem operation being attempted when an entry failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMirrorOperation {
    /// Listing the entries of a source directory.
    ListDirectory,
    /// Reading entry type or metadata.
    InspectEntry,
    /// Creating a destination directory.
    CreateDirectory,
    /// Copying one file.
    CopyFile,
}

impl EnumMirrorOperation {
    /// Short verb used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListDirectory => "list",
            Self::InspectEntry => "inspect",
            Self::CreateDirectory => "create",
            Self::CopyFile => "copy",
        }
    }

    fn is_destination_side(&self) -> bool {
        matches!(self, Self::CreateDirectory | Self::CopyFile)
    }
}

impl fmt::Display for EnumMirrorOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for `mirror_tree`.
#[derive(Debug, Clone)]
pub struct SpecMirrorOptions {
    /// Include patterns applied to file basename. `None` includes every file.
    pub patterns_include_files: Option<Vec<String>>,
    /// Exclude patterns applied to file basename.
    pub patterns_exclude_files: Option<Vec<String>>,
    /// Exclude patterns applied to directory basename; matching subtrees are pruned.
    pub patterns_exclude_dirs: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumMirrorPatternMode,
    /// Symlink handling behavior.
    pub rule_symlink: EnumMirrorSymlinkStrategy,
    /// Per-entry failure behavior.
    pub rule_error: EnumMirrorErrorPolicy,
    /// Maximum worker threads for the file-copy stage. `None` picks a CPU-bounded value.
    pub num_workers_max: Option<usize>,
    /// Also create destination directories that receive no file.
    pub if_keep_empty_dirs: bool,
    /// Copy permissions, timestamps and extended attributes along with bytes.
    pub if_preserve_metadata: bool,
    /// Do not mutate filesystem; record what would happen.
    pub if_dry_run: bool,
}

impl Default for SpecMirrorOptions {
    fn default() -> Self {
        Self {
            patterns_include_files: None,
            patterns_exclude_files: None,
            patterns_exclude_dirs: None,
            rule_pattern: EnumMirrorPatternMode::Extension,
            rule_symlink: EnumMirrorSymlinkStrategy::Dereference,
            rule_error: EnumMirrorErrorPolicy::Abort,
            num_workers_max: Some(1),
            if_keep_empty_dirs: false,
            if_preserve_metadata: false,
            if_dry_run: false,
        }
    }
}

impl SpecMirrorOptions {
    /// Options selecting files by one extension, e.g. `"h"` or `".dll"`.
    pub fn with_extension(extension: &str) -> Self {
        Self {
            patterns_include_files: Some(vec![extension.to_string()]),
            rule_pattern: EnumMirrorPatternMode::Extension,
            ..Self::default()
        }
    }
}

/// Input options for `promote_files`.
#[derive(Debug, Clone)]
pub struct SpecPromoteOptions {
    /// Include patterns applied to file basename. `None` promotes every file.
    pub patterns_include_files: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumMirrorPatternMode,
    /// Copy permissions, timestamps and extended attributes along with bytes.
    pub if_preserve_metadata: bool,
    /// Do not mutate filesystem; record what would happen.
    pub if_dry_run: bool,
}

impl Default for SpecPromoteOptions {
    fn default() -> Self {
        Self {
            patterns_include_files: None,
            rule_pattern: EnumMirrorPatternMode::Extension,
            if_preserve_metadata: false,
            if_dry_run: false,
        }
    }
}

/// One collected failure item with path, operation and error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMirrorError {
    /// Failed source or destination path.
    pub path: PathBuf,
    /// Operation that failed.
    pub operation: EnumMirrorOperation,
    /// User-facing error text.
    pub exception: String,
}

impl fmt::Display for SpecMirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed for {}: {}",
            self.operation,
            self.path.display(),
            self.exception
        )
    }
}

/// Errors returned by `mirror_tree` and `promote_files`.
#[derive(Debug)]
pub enum MirrorTreeError {
    /// Invalid include/exclude pattern.
    InvalidPattern(String),
    /// Source path does not exist or is not a directory.
    SourceNotFound(PathBuf),
    /// Source and destination overlap (`src` contains `dst` or vice versa).
    SourceDestinationOverlap {
        /// Normalized source directory.
        source: PathBuf,
        /// Normalized destination directory.
        destination: PathBuf,
    },
    /// A walked directory does not start with the source root.
    PrefixMismatch {
        /// Offending directory.
        path: PathBuf,
        /// Expected leading path.
        prefix: PathBuf,
    },
    /// Listing, reading or writing was refused by the OS.
    PermissionDenied {
        /// Offending path.
        path: PathBuf,
        /// Operation being attempted.
        operation: EnumMirrorOperation,
        /// Underlying IO error text.
        message: String,
    },
    /// A destination directory or file could not be created.
    DestinationWriteError {
        /// Offending destination path.
        path: PathBuf,
        /// Operation being attempted.
        operation: EnumMirrorOperation,
        /// Underlying IO error text.
        message: String,
    },
    /// Any other failure reading the source tree.
    SourceReadError {
        /// Offending source path.
        path: PathBuf,
        /// Operation being attempted.
        operation: EnumMirrorOperation,
        /// Underlying IO error text.
        message: String,
    },
    /// A followed directory symlink resolves to one of its own ancestors.
    CyclicTraversal {
        /// Symlink path that closes the loop.
        path: PathBuf,
        /// Ancestor directory it resolves to.
        ancestor: PathBuf,
    },
    /// Symlink met while `rule_symlink` is `Error`.
    SymlinkRejected(PathBuf),
    /// The caller-supplied filename predicate failed.
    PredicateFailed {
        /// File the predicate was asked about.
        path: PathBuf,
        /// Failure text reported by the predicate.
        message: String,
    },
}

impl MirrorTreeError {
    /// Classify an IO error raised while running `operation` on `path`.
    pub fn from_io(
        path: impl Into<PathBuf>,
        operation: EnumMirrorOperation,
        exception: &io::Error,
    ) -> Self {
        let path = path.into();
        let message = exception.to_string();
        if exception.kind() == io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied {
                path,
                operation,
                message,
            };
        }
        if operation.is_destination_side() {
            return Self::DestinationWriteError {
                path,
                operation,
                message,
            };
        }
        Self::SourceReadError {
            path,
            operation,
            message,
        }
    }

    /// Path the error is about, when it has one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::InvalidPattern(_) => None,
            Self::SourceNotFound(path) | Self::SymlinkRejected(path) => Some(path),
            Self::SourceDestinationOverlap { source, .. } => Some(source),
            Self::PrefixMismatch { path, .. }
            | Self::PermissionDenied { path, .. }
            | Self::DestinationWriteError { path, .. }
            | Self::SourceReadError { path, .. }
            | Self::CyclicTraversal { path, .. }
            | Self::PredicateFailed { path, .. } => Some(path),
        }
    }

    /// Flatten into a report item, used by the `Collect` policy.
    pub(crate) fn into_spec_error(self) -> SpecMirrorError {
        let operation = match &self {
            Self::PermissionDenied { operation, .. }
            | Self::DestinationWriteError { operation, .. }
            | Self::SourceReadError { operation, .. } => *operation,
            _ => EnumMirrorOperation::InspectEntry,
        };
        let path = self.path().map(|p| p.to_path_buf()).unwrap_or_default();
        let exception = match &self {
            Self::PermissionDenied { message, .. }
            | Self::DestinationWriteError { message, .. }
            | Self::SourceReadError { message, .. } => message.clone(),
            _ => self.to_string(),
        };
        SpecMirrorError {
            path,
            operation,
            exception,
        }
    }
}

impl fmt::Display for MirrorTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPattern(msg) => write!(f, "{msg}"),
            Self::SourceNotFound(path) => {
                write!(f, "Source is not an existing directory: {}", path.display())
            }
            Self::SourceDestinationOverlap {
                source,
                destination,
            } => write!(
                f,
                "Source and destination directories overlap: {} <-> {}",
                source.display(),
                destination.display()
            ),
            Self::PrefixMismatch { path, prefix } => write!(
                f,
                "Path {} does not start with source root {}",
                path.display(),
                prefix.display()
            ),
            Self::PermissionDenied {
                path,
                operation,
                message,
            } => write!(
                f,
                "Permission denied ({operation}) {}: {message}",
                path.display()
            ),
            Self::DestinationWriteError {
                path,
                operation,
                message,
            } => write!(
                f,
                "Failed to write destination ({operation}) {}: {message}",
                path.display()
            ),
            Self::SourceReadError {
                path,
                operation,
                message,
            } => write!(
                f,
                "Failed to read source ({operation}) {}: {message}",
                path.display()
            ),
            Self::CyclicTraversal { path, ancestor } => write!(
                f,
                "Symlink loop detected: {} resolves to ancestor {}",
                path.display(),
                ancestor.display()
            ),
            Self::SymlinkRejected(path) => {
                write!(f, "Symlink rejected by policy: {}", path.display())
            }
            Self::PredicateFailed { path, message } => {
                write!(f, "Filename predicate failed for {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for MirrorTreeError {}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::Path;

    use super::{EnumMirrorOperation, MirrorTreeError};

    #[test]
    fn from_io_classifies_by_kind_and_side() {
        let err_denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let err_other = io::Error::from(io::ErrorKind::NotFound);

        assert!(matches!(
            MirrorTreeError::from_io("/a", EnumMirrorOperation::ListDirectory, &err_denied),
            MirrorTreeError::PermissionDenied { .. }
        ));
        assert!(matches!(
            MirrorTreeError::from_io("/a", EnumMirrorOperation::CopyFile, &err_denied),
            MirrorTreeError::PermissionDenied { .. }
        ));
        assert!(matches!(
            MirrorTreeError::from_io("/a", EnumMirrorOperation::CreateDirectory, &err_other),
            MirrorTreeError::DestinationWriteError { .. }
        ));
        assert!(matches!(
            MirrorTreeError::from_io("/a", EnumMirrorOperation::InspectEntry, &err_other),
            MirrorTreeError::SourceReadError { .. }
        ));
    }

    #[test]
    fn display_names_path_and_operation() {
        let err = MirrorTreeError::from_io(
            "/dst/include/a.h",
            EnumMirrorOperation::CopyFile,
            &io::Error::other("disk full"),
        );
        let txt = err.to_string();
        assert!(txt.contains("(copy)"));
        assert!(txt.contains("/dst/include/a.h"));
        assert!(txt.contains("disk full"));
        assert_eq!(err.path(), Some(Path::new("/dst/include/a.h")));
    }

    #[test]
    fn into_spec_error_keeps_operation() {
        let spec_error = MirrorTreeError::from_io(
            "/src/sub",
            EnumMirrorOperation::ListDirectory,
            &io::Error::from(io::ErrorKind::PermissionDenied),
        )
        .into_spec_error();
        assert_eq!(spec_error.operation, EnumMirrorOperation::ListDirectory);
        assert_eq!(spec_error.path, Path::new("/src/sub"));
        assert!(spec_error.to_string().starts_with("list failed for /src/sub"));
    }
}

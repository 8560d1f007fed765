//! Mirror report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::spec::SpecMirrorError;

/// Aggregate counters and diagnostics for one `mirror_tree` / `promote_files` run.
#[derive(Debug, Default, Clone)]
pub struct ReportMirror {
    /// Files seen in the source tree.
    pub cnt_scanned: u64,
    /// Files that passed the inclusion predicate.
    pub cnt_matched: u64,
    /// Files that failed the inclusion predicate.
    pub cnt_filtered: u64,
    /// Files copied to the destination.
    pub cnt_copied: u64,
    /// Destination directories that did not exist before the run.
    pub cnt_dirs_created: u64,
    /// Entries skipped by symlink policy or dry-run.
    pub cnt_skipped: u64,
    /// Destination file paths selected by the walk, in plan order.
    pub paths_planned: Vec<PathBuf>,
    /// Non-fatal warnings collected during traversal/copy.
    pub warnings: Vec<String>,
    /// Per-entry failures (only populated under the `Collect` error policy).
    pub errors: Vec<SpecMirrorError>,
}

impl ReportMirror {
    /// Number of collected hard errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// `true` when no entry failed.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_scanned".to_string(), self.cnt_scanned);
        dict_counts.insert("cnt_matched".to_string(), self.cnt_matched);
        dict_counts.insert("cnt_filtered".to_string(), self.cnt_filtered);
        dict_counts.insert("cnt_copied".to_string(), self.cnt_copied);
        dict_counts.insert("cnt_dirs_created".to_string(), self.cnt_dirs_created);
        dict_counts.insert("cnt_skipped".to_string(), self.cnt_skipped);
        dict_counts.insert("cnt_errors".to_string(), self.error_count() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} scanned={} matched={} copied={} dirs={} skipped={} errors={} warnings={}",
            dict_counts["cnt_scanned"],
            dict_counts["cnt_matched"],
            dict_counts["cnt_copied"],
            dict_counts["cnt_dirs_created"],
            dict_counts["cnt_skipped"],
            dict_counts["cnt_errors"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[MIRROR]"))
    }
}

/// Mutable accumulator for mirror statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportMirrorBuilder {
    report: ReportMirror,
}

impl ReportMirrorBuilder {
    /// Record one source file and whether it passed the predicate.
    pub fn add_scanned(&mut self, b_matched: bool) {
        self.report.cnt_scanned += 1;
        if b_matched {
            self.report.cnt_matched += 1;
        } else {
            self.report.cnt_filtered += 1;
        }
    }

    /// Record one destination file selected for copying.
    pub fn add_planned(&mut self, path_file_dst: PathBuf) {
        self.report.paths_planned.push(path_file_dst);
    }

    /// Increment copied count by one.
    pub fn add_copied(&mut self) {
        self.report.cnt_copied += 1;
    }

    /// Record one newly created destination directory.
    pub fn add_dir_created(&mut self) {
        self.report.cnt_dirs_created += 1;
    }

    /// Increment skipped count by one.
    pub fn add_skipped(&mut self) {
        self.report.cnt_skipped += 1;
    }

    /// Add warning message; it is also emitted as a `warn` event.
    pub fn add_warning(&mut self, warning: String) {
        tracing::warn!("{warning}");
        self.report.warnings.push(warning);
    }

    /// Add one path-scoped error.
    pub fn add_error(&mut self, spec_error: SpecMirrorError) {
        tracing::error!("{spec_error}");
        self.report.errors.push(spec_error);
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportMirror {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{ReportMirror, ReportMirrorBuilder};
    use crate::spec::{EnumMirrorOperation, SpecMirrorError};

    #[test]
    fn report_to_dict_and_format_are_consistent() {
        let report = ReportMirror {
            cnt_scanned: 8,
            cnt_matched: 5,
            cnt_filtered: 3,
            cnt_copied: 4,
            cnt_dirs_created: 2,
            cnt_skipped: 1,
            warnings: vec!["w".to_string()],
            ..ReportMirror::default()
        };

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_scanned"], 8);
        assert_eq!(dict_counts["cnt_filtered"], 3);
        assert_eq!(dict_counts["cnt_errors"], 0);
        assert_eq!(dict_counts["cnt_warnings"], 1);

        let txt = report.format("[MIRROR]");
        assert_eq!(
            txt,
            "[MIRROR] scanned=8 matched=5 copied=4 dirs=2 skipped=1 errors=0 warnings=1"
        );
        assert_eq!(report.to_string(), txt);
        assert!(report.is_success());
    }

    #[test]
    fn builder_splits_matched_and_filtered() {
        let mut builder = ReportMirrorBuilder::default();
        builder.add_scanned(true);
        builder.add_scanned(false);
        builder.add_scanned(true);
        builder.add_planned(PathBuf::from("/dst/a.h"));
        builder.add_copied();
        builder.add_error(SpecMirrorError {
            path: PathBuf::from("/dst/b.h"),
            operation: EnumMirrorOperation::CopyFile,
            exception: "is a directory".to_string(),
        });

        let report = builder.build();
        assert_eq!(report.cnt_scanned, 3);
        assert_eq!(report.cnt_matched, 2);
        assert_eq!(report.cnt_filtered, 1);
        assert_eq!(report.paths_planned, vec![PathBuf::from("/dst/a.h")]);
        assert_eq!(report.cnt_copied, 1);
        assert_eq!(report.error_count(), 1);
        assert!(!report.is_success());
    }
}

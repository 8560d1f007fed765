use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use distkit_io_fs::{
    EnumMirrorErrorPolicy, EnumMirrorPatternMode, EnumMirrorSymlinkStrategy, FilenamePredicate,
    MirrorTreeError, ReportMirror, SpecMirrorError, SpecMirrorOptions, SpecPromoteOptions,
    mirror_tree, mirror_tree_with, promote_files, rewrite_prefix,
};
use pyo3::exceptions::{
    PyFileNotFoundError, PyOSError, PyPermissionError, PyRuntimeError, PyValueError,
};
use pyo3::prelude::*;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "distkit.fs.mirror_tree.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "SpecMirrorError")]
#[derive(Debug, Clone)]
struct PySpecMirrorError {
    #[pyo3(get)]
    path: String,
    #[pyo3(get)]
    operation: String,
    #[pyo3(get)]
    exception: String,
}

impl From<SpecMirrorError> for PySpecMirrorError {
    fn from(spec_error: SpecMirrorError) -> Self {
        Self {
            path: spec_error.path.to_string_lossy().to_string(),
            operation: spec_error.operation.as_str().to_string(),
            exception: spec_error.exception,
        }
    }
}

#[pymethods]
impl PySpecMirrorError {
    fn __str__(&self) -> String {
        format!(
            "{} failed for {}: {}",
            self.operation, self.path, self.exception
        )
    }
}

#[pyclass(name = "ReportMirror")]
#[derive(Debug, Clone)]
struct PyReportMirror {
    #[pyo3(get)]
    cnt_scanned: u64,
    #[pyo3(get)]
    cnt_matched: u64,
    #[pyo3(get)]
    cnt_filtered: u64,
    #[pyo3(get)]
    cnt_copied: u64,
    #[pyo3(get)]
    cnt_dirs_created: u64,
    #[pyo3(get)]
    cnt_skipped: u64,
    #[pyo3(get)]
    paths_planned: Vec<String>,
    #[pyo3(get)]
    warnings: Vec<String>,
    #[pyo3(get)]
    errors: Vec<PySpecMirrorError>,
    report: ReportMirror,
}

impl From<ReportMirror> for PyReportMirror {
    fn from(report_mirror: ReportMirror) -> Self {
        Self {
            cnt_scanned: report_mirror.cnt_scanned,
            cnt_matched: report_mirror.cnt_matched,
            cnt_filtered: report_mirror.cnt_filtered,
            cnt_copied: report_mirror.cnt_copied,
            cnt_dirs_created: report_mirror.cnt_dirs_created,
            cnt_skipped: report_mirror.cnt_skipped,
            paths_planned: report_mirror
                .paths_planned
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect(),
            warnings: report_mirror.warnings.clone(),
            errors: report_mirror
                .errors
                .iter()
                .cloned()
                .map(PySpecMirrorError::from)
                .collect(),
            report: report_mirror,
        }
    }
}

#[pymethods]
impl PyReportMirror {
    #[getter]
    fn error_count(&self) -> usize {
        self.report.error_count()
    }

    #[getter]
    fn warning_count(&self) -> usize {
        self.report.warning_count()
    }

    #[getter]
    fn is_success(&self) -> bool {
        self.report.is_success()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.report.to_dict()
    }

    #[pyo3(signature = (prefix = "[MIRROR]"))]
    fn format(&self, prefix: &str) -> String {
        self.report.format(prefix)
    }

    fn __str__(&self) -> String {
        self.report.to_string()
    }
}

fn parse_rule_pattern(value: &str) -> PyResult<EnumMirrorPatternMode> {
    match value {
        "extension" => Ok(EnumMirrorPatternMode::Extension),
        "glob" => Ok(EnumMirrorPatternMode::Glob),
        "regex" => Ok(EnumMirrorPatternMode::Regex),
        "literal" => Ok(EnumMirrorPatternMode::Literal),
        _ => Err(PyValueError::new_err(format!(
            "Invalid pattern strategy: `{value}`. Expected one of: ['extension', 'glob', 'regex', 'literal']"
        ))),
    }
}

fn parse_rule_symlink(value: &str) -> PyResult<EnumMirrorSymlinkStrategy> {
    match value {
        "dereference" => Ok(EnumMirrorSymlinkStrategy::Dereference),
        "skip_symlinks" => Ok(EnumMirrorSymlinkStrategy::SkipSymlinks),
        "error" => Ok(EnumMirrorSymlinkStrategy::Error),
        _ => Err(PyValueError::new_err(format!(
            "Invalid symlink strategy: `{value}`. Expected one of: ['dereference', 'skip_symlinks', 'error']"
        ))),
    }
}

fn parse_rule_error(value: &str) -> PyResult<EnumMirrorErrorPolicy> {
    match value {
        "abort" => Ok(EnumMirrorErrorPolicy::Abort),
        "collect" => Ok(EnumMirrorErrorPolicy::Collect),
        _ => Err(PyValueError::new_err(format!(
            "Invalid error policy: `{value}`. Expected one of: ['abort', 'collect']"
        ))),
    }
}

/// Python callable used as the mirror's filename predicate.
///
/// An exception from the callable fails the walk before anything is copied and
/// is kept so it can be re-raised unchanged.
struct PyFilenamePredicate {
    callable: PyObject,
    slot_err: Mutex<Option<PyErr>>,
}

impl FilenamePredicate for PyFilenamePredicate {
    fn is_included(&self, name_file: &str) -> Result<bool, MirrorTreeError> {
        Python::with_gil(|py| {
            let res_call = self
                .callable
                .bind(py)
                .call1((name_file,))
                .and_then(|v| v.is_truthy());
            res_call.map_err(|err| {
                let message = err.to_string();
                if let Ok(mut guard) = self.slot_err.lock() {
                    guard.get_or_insert(err);
                }
                MirrorTreeError::PredicateFailed {
                    path: PathBuf::from(name_file),
                    message,
                }
            })
        })
    }
}

fn map_mirror_tree_error(exception: MirrorTreeError) -> PyErr {
    let message = exception.to_string();
    match exception {
        MirrorTreeError::SourceNotFound(_) => PyFileNotFoundError::new_err(message),
        MirrorTreeError::PermissionDenied { .. } => PyPermissionError::new_err(message),
        MirrorTreeError::DestinationWriteError { .. }
        | MirrorTreeError::SourceReadError { .. }
        | MirrorTreeError::CyclicTraversal { .. }
        | MirrorTreeError::SymlinkRejected(_) => PyOSError::new_err(message),
        MirrorTreeError::InvalidPattern(_)
        | MirrorTreeError::SourceDestinationOverlap { .. }
        | MirrorTreeError::PrefixMismatch { .. } => PyValueError::new_err(message),
        MirrorTreeError::PredicateFailed { .. } => PyRuntimeError::new_err(message),
    }
}

#[pyfunction(name = "mirror_tree")]
#[pyo3(signature = (
    dir_source,
    dir_destination,
    patterns_include_files = None,
    patterns_exclude_files = None,
    patterns_exclude_dirs = None,
    predicate = None,
    rule_pattern = "extension",
    rule_symlink = "dereference",
    rule_error = "abort",
    num_workers_max = Some(1),
    if_keep_empty_dirs = false,
    if_preserve_metadata = false,
    if_dry_run = false
))]
#[allow(clippy::too_many_arguments)]
fn mirror_tree_py(
    py: Python<'_>,
    dir_source: String,
    dir_destination: String,
    patterns_include_files: Option<Vec<String>>,
    patterns_exclude_files: Option<Vec<String>>,
    patterns_exclude_dirs: Option<Vec<String>>,
    predicate: Option<PyObject>,
    rule_pattern: &str,
    rule_symlink: &str,
    rule_error: &str,
    num_workers_max: Option<usize>,
    if_keep_empty_dirs: bool,
    if_preserve_metadata: bool,
    if_dry_run: bool,
) -> PyResult<PyReportMirror> {
    let spec_mirror_options = SpecMirrorOptions {
        patterns_include_files,
        patterns_exclude_files,
        patterns_exclude_dirs,
        rule_pattern: parse_rule_pattern(rule_pattern)?,
        rule_symlink: parse_rule_symlink(rule_symlink)?,
        rule_error: parse_rule_error(rule_error)?,
        num_workers_max,
        if_keep_empty_dirs,
        if_preserve_metadata,
        if_dry_run,
    };

    let Some(callable) = predicate else {
        let report_mirror = py
            .allow_threads(|| mirror_tree(dir_source, dir_destination, spec_mirror_options))
            .map_err(map_mirror_tree_error)?;
        return Ok(PyReportMirror::from(report_mirror));
    };

    let spec_predicate = PyFilenamePredicate {
        callable,
        slot_err: Mutex::new(None),
    };
    let report_mirror = py.allow_threads(|| {
        mirror_tree_with(
            dir_source,
            dir_destination,
            &spec_predicate,
            spec_mirror_options,
        )
    });
    if let Some(err) = spec_predicate.slot_err.into_inner().ok().flatten() {
        return Err(err);
    }
    let report_mirror = report_mirror.map_err(map_mirror_tree_error)?;
    Ok(PyReportMirror::from(report_mirror))
}

#[pyfunction(name = "promote_files")]
#[pyo3(signature = (
    dir_variant,
    dir_alias,
    patterns_include_files = None,
    rule_pattern = "extension",
    if_preserve_metadata = false,
    if_dry_run = false
))]
fn promote_files_py(
    py: Python<'_>,
    dir_variant: String,
    dir_alias: String,
    patterns_include_files: Option<Vec<String>>,
    rule_pattern: &str,
    if_preserve_metadata: bool,
    if_dry_run: bool,
) -> PyResult<PyReportMirror> {
    let spec_promote_options = SpecPromoteOptions {
        patterns_include_files,
        rule_pattern: parse_rule_pattern(rule_pattern)?,
        if_preserve_metadata,
        if_dry_run,
    };
    let report_mirror = py
        .allow_threads(|| promote_files(dir_variant, dir_alias, spec_promote_options))
        .map_err(map_mirror_tree_error)?;
    Ok(PyReportMirror::from(report_mirror))
}

#[pyfunction(name = "rewrite_prefix")]
fn rewrite_prefix_py(
    path_dir: &str,
    path_dir_src_root: &str,
    path_dir_dst_root: &str,
) -> PyResult<String> {
    let path_dir_dst = rewrite_prefix(
        Path::new(path_dir),
        Path::new(path_dir_src_root),
        Path::new(path_dir_dst_root),
    )
    .map_err(map_mirror_tree_error)?;
    Ok(path_dir_dst.to_string_lossy().to_string())
}

#[pymodule]
fn _distkit_io_fs_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySpecMirrorError>()?;
    module.add_class::<PyReportMirror>()?;
    module.add_function(wrap_pyfunction!(mirror_tree_py, module)?)?;
    module.add_function(wrap_pyfunction!(promote_files_py, module)?)?;
    module.add_function(wrap_pyfunction!(rewrite_prefix_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}


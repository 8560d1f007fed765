use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{EnumMirrorPatternMode, MirrorTreeError};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypeMirrorPatternSeq {
    Suffix(Vec<String>),
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

impl TypeMirrorPatternSeq {
    fn is_matching(&self, value: &str) -> bool {
        match self {
            Self::Suffix(v) => v.iter().any(|p| value.ends_with(p.as_str())),
            Self::Literal(v) => v.iter().any(|p| value == p),
            Self::Glob(v) => v.iter().any(|p| p.is_match(value)),
            Self::Regex(v) => v.iter().any(|p| p.is_match(value)),
        }
    }
}

/// Compiled include/exclude patterns for one run.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecMirrorPatterns {
    pub(crate) patterns_include_files: Option<TypeMirrorPatternSeq>,
    pub(crate) patterns_exclude_files: Option<TypeMirrorPatternSeq>,
    pub(crate) patterns_exclude_dirs: Option<TypeMirrorPatternSeq>,
}

impl SpecMirrorPatterns {
    pub(crate) fn from_raw(
        patterns_include_files: Option<&[String]>,
        patterns_exclude_files: Option<&[String]>,
        patterns_exclude_dirs: Option<&[String]>,
        rule_pattern: EnumMirrorPatternMode,
    ) -> Result<Self, MirrorTreeError> {
        Ok(Self {
            patterns_include_files: _compile(patterns_include_files, rule_pattern)?,
            patterns_exclude_files: _compile(patterns_exclude_files, rule_pattern)?,
            patterns_exclude_dirs: _compile(patterns_exclude_dirs, rule_pattern)?,
        })
    }

    /// File passes when it hits an include pattern (or none are set) and no exclude pattern.
    pub(crate) fn is_file_included(&self, name_file: &str) -> bool {
        let b_included = self
            .patterns_include_files
            .as_ref()
            .is_none_or(|p| p.is_matching(name_file));
        b_included
            && !self
                .patterns_exclude_files
                .as_ref()
                .is_some_and(|p| p.is_matching(name_file))
    }

    pub(crate) fn is_dir_excluded(&self, name_dir: &str) -> bool {
        self.patterns_exclude_dirs
            .as_ref()
            .is_some_and(|p| p.is_matching(name_dir))
    }
}

fn _normalize_extension(pattern: &str) -> Result<String, MirrorTreeError> {
    let c_ext = pattern.trim_start_matches('.');
    if c_ext.is_empty() {
        return Err(MirrorTreeError::InvalidPattern(format!(
            "Invalid extension pattern: `{pattern}`"
        )));
    }
    Ok(format!(".{c_ext}"))
}

fn _compile(
    patterns: Option<&[String]>,
    rule_pattern: EnumMirrorPatternMode,
) -> Result<Option<TypeMirrorPatternSeq>, MirrorTreeError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumMirrorPatternMode::Extension => {
            let l_suffix = patterns
                .iter()
                .map(|p| _normalize_extension(p))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(TypeMirrorPatternSeq::Suffix(l_suffix)))
        }
        EnumMirrorPatternMode::Literal => {
            Ok(Some(TypeMirrorPatternSeq::Literal(patterns.to_vec())))
        }
        EnumMirrorPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| {
                        MirrorTreeError::InvalidPattern(format!(
                            "Invalid pattern in include/exclude: {e}"
                        ))
                    })?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypeMirrorPatternSeq::Glob(l_glob)))
        }
        EnumMirrorPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex = Regex::new(pattern).map_err(|e| {
                    MirrorTreeError::InvalidPattern(format!(
                        "Invalid pattern in include/exclude: {e}"
                    ))
                })?;
                l_regex.push(regex);
            }
            Ok(Some(TypeMirrorPatternSeq::Regex(l_regex)))
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    _absolutize_path(path)
}

fn _absolutize_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _normalize_path(dst);
    dst_resolved.starts_with(&src_resolved) || src_resolved.starts_with(&dst_resolved)
}

/// `true` when both paths resolve to the same filesystem location.
pub(crate) fn is_same_location(path_a: &Path, path_b: &Path) -> bool {
    _normalize_path(path_a) == _normalize_path(path_b)
}

/// Map a directory under the source root onto the destination root.
///
/// The match is component-wise, so `/data/src2` is not under `/data/src`.
/// The remainder must be made of plain names only; `..`, root or drive
/// components are refused instead of producing a path outside
/// `path_dir_dst_root`.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use distkit_io_fs::rewrite_prefix;
///
/// let path_dst = rewrite_prefix(
///     Path::new("source/NessEngine/renderable"),
///     Path::new("source"),
///     Path::new("last_build/include"),
/// )
/// .unwrap();
/// assert_eq!(path_dst, Path::new("last_build/include/NessEngine/renderable"));
///
/// assert!(rewrite_prefix(Path::new("sdl/include"), Path::new("source"), Path::new("out")).is_err());
/// ```
pub fn rewrite_prefix(
    path_dir: &Path,
    path_dir_src_root: &Path,
    path_dir_dst_root: &Path,
) -> Result<PathBuf, MirrorTreeError> {
    let err_mismatch = || MirrorTreeError::PrefixMismatch {
        path: path_dir.to_path_buf(),
        prefix: path_dir_src_root.to_path_buf(),
    };

    let path_rel = path_dir
        .strip_prefix(path_dir_src_root)
        .map_err(|_| err_mismatch())?;
    if !path_rel
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(err_mismatch());
    }
    Ok(path_dir_dst_root.join(path_rel))
}

/// Identity of a directory for loop detection.
#[cfg(unix)]
pub(crate) type TypeDirIdentity = (u64, u64);
#[cfg(not(unix))]
pub(crate) type TypeDirIdentity = PathBuf;

/// Identity of the directory `path` resolves to, following symlinks.
pub(crate) fn derive_dir_identity(path: &Path) -> io::Result<TypeDirIdentity> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let stat_dir = fs::metadata(path)?;
        Ok((stat_dir.dev(), stat_dir.ino()))
    }
    #[cfg(not(unix))]
    {
        fs::canonicalize(path)
    }
}

pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
    if_preserve_metadata: bool,
) -> Result<(), io::Error> {
    fs::copy(path_file_src, path_file_dst)?;
    if if_preserve_metadata {
        apply_metadata(path_file_src, path_file_dst)?;
    }
    Ok(())
}

fn apply_metadata(path_file_src: &Path, path_file_dst: &Path) -> Result<(), io::Error> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    fs::set_permissions(path_file_dst, stat_src.permissions())?;

    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    #[cfg(target_os = "linux")]
    copy_xattrs_linux(path_file_src, path_file_dst);
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let iter_xattr_names = match xattr::list(path_file_src) {
        Ok(v) => v,
        Err(_) => return,
    };

    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        if let Err(e) = xattr::set(path_file_dst, &name, &raw_value) {
            tracing::debug!(
                path = %path_file_dst.display(),
                "xattr {:?} not copied: {e}",
                name
            );
        }
    }
}

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

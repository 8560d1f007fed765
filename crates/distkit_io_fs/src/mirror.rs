//! Filtered tree mirror: traversal planning and copy orchestration.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::report::{ReportMirror, ReportMirrorBuilder};
use crate::spec::{
    EnumMirrorErrorPolicy, EnumMirrorOperation, EnumMirrorSymlinkStrategy, MirrorTreeError,
    SpecMirrorOptions,
};
use crate::util::{
    SpecMirrorPatterns, TypeDirIdentity, calculate_worker_limit, copy_file_with_metadata,
    derive_dir_identity, is_overlap, rewrite_prefix,
};

/// Decides from a file basename whether the file is mirrored.
///
/// Implemented for every `Fn(&str) -> bool`, so closures work directly.
/// Implement it by hand when the decision can fail; an `Err` ends the run
/// during planning, before anything is written, under either error policy.
///
/// ```no_run
/// use distkit_io_fs::{SpecMirrorOptions, mirror_tree_with};
///
/// let is_header = |name: &str| name.ends_with(".h") || name.ends_with(".hpp");
/// let report = mirror_tree_with("source", "last_build/include", &is_header, SpecMirrorOptions::default())?;
/// println!("{report}");
/// # Ok::<(), distkit_io_fs::MirrorTreeError>(())
/// ```
pub trait FilenamePredicate {
    /// Called exactly once per file met during the walk.
    fn is_included(&self, name_file: &str) -> Result<bool, MirrorTreeError>;
}

impl<F> FilenamePredicate for F
where
    F: Fn(&str) -> bool,
{
    fn is_included(&self, name_file: &str) -> Result<bool, MirrorTreeError> {
        Ok(self(name_file))
    }
}

#[derive(Debug, Clone)]
struct SpecDirEntry {
    path_dir_src_sub: PathBuf,
    name_dir: String,
}

#[derive(Debug, Clone)]
struct SpecFileEntry {
    path_file_src: PathBuf,
    file_name: OsString,
    name_file: String,
}

#[derive(Debug, Clone)]
struct SpecCopyTaskFile {
    path_file_src: PathBuf,
    path_file_dst: PathBuf,
}

struct SpecMirrorContext<'a, F: FilenamePredicate + ?Sized> {
    path_dir_src: PathBuf,
    path_dir_dst: PathBuf,
    /// Canonical destination root, when it already exists.
    path_dir_dst_resolved: Option<PathBuf>,
    spec_mirror_options: SpecMirrorOptions,
    spec_mirror_pats: SpecMirrorPatterns,
    predicate: &'a F,
    builder_report: ReportMirrorBuilder,
    l_ancestors: Vec<(TypeDirIdentity, PathBuf)>,
    set_dirs_target: BTreeSet<PathBuf>,
    l_tasks_file_copy: Vec<SpecCopyTaskFile>,
}

impl<F: FilenamePredicate + ?Sized> SpecMirrorContext<'_, F> {
    /// Apply the error policy: propagate under `Abort`, record under `Collect`.
    fn handle_error(&mut self, exception: MirrorTreeError) -> Result<(), MirrorTreeError> {
        match self.spec_mirror_options.rule_error {
            EnumMirrorErrorPolicy::Abort => Err(exception),
            EnumMirrorErrorPolicy::Collect => {
                self.builder_report.add_error(exception.into_spec_error());
                Ok(())
            }
        }
    }

    /// Plan `path_dir_target` and its missing ancestors below the destination root.
    fn insert_target_dir(&mut self, path_dir_target: &Path) {
        for path_ancestor in path_dir_target.ancestors() {
            if !path_ancestor.starts_with(&self.path_dir_dst)
                || !self.set_dirs_target.insert(path_ancestor.to_path_buf())
            {
                break;
            }
        }
    }
}

/// Mirror the files of `dir_source` selected by the option patterns into `dir_destination`.
///
/// See [`mirror_tree_with`] for the full contract.
pub fn mirror_tree<P, Q>(
    dir_source: P,
    dir_destination: Q,
    spec_mirror_options: SpecMirrorOptions,
) -> Result<ReportMirror, MirrorTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    mirror_tree_with(
        dir_source,
        dir_destination,
        &|_: &str| true,
        spec_mirror_options,
    )
}

/// Reproduce the directory hierarchy of `dir_source` under `dir_destination`,
/// copying only files whose basename satisfies `predicate` and the option
/// include/exclude patterns.
///
/// The run has two phases:
/// 1. A single-threaded planning walk. Every visited directory is mapped to the
///    destination with [`rewrite_prefix`]; listing failures, broken or rejected
///    symlinks and symlink loops surface here, before anything is written.
/// 2. Directory creation (only directories that receive a file, unless
///    `if_keep_empty_dirs`) followed by the file copies, serial or on a bounded
///    rayon pool. Existing destination files are overwritten; nothing else in
///    the destination is touched.
///
/// Under [`EnumMirrorErrorPolicy::Abort`] the first failure is returned. Under
/// [`EnumMirrorErrorPolicy::Collect`] per-entry failures are stored in the
/// returned report. Setup failures (`SourceNotFound`, `InvalidPattern`,
/// `SourceDestinationOverlap`, a destination root that is not a directory) are
/// always returned as errors.
///
/// Concurrent mirrors into overlapping destinations are not synchronized.
pub fn mirror_tree_with<P, Q, F>(
    dir_source: P,
    dir_destination: Q,
    predicate: &F,
    spec_mirror_options: SpecMirrorOptions,
) -> Result<ReportMirror, MirrorTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    F: FilenamePredicate + ?Sized,
{
    let path_dir_src = dir_source.as_ref().to_path_buf();
    let path_dir_dst = dir_destination.as_ref().to_path_buf();
    let _span = tracing::info_span!(
        "mirror_tree",
        src = %path_dir_src.display(),
        dst = %path_dir_dst.display()
    )
    .entered();

    if !path_dir_src.is_dir() {
        return Err(MirrorTreeError::SourceNotFound(path_dir_src));
    }
    if is_overlap(&path_dir_src, &path_dir_dst) {
        return Err(MirrorTreeError::SourceDestinationOverlap {
            source: path_dir_src,
            destination: path_dir_dst,
        });
    }
    if path_dir_dst.exists() && !path_dir_dst.is_dir() {
        return Err(MirrorTreeError::DestinationWriteError {
            path: path_dir_dst,
            operation: EnumMirrorOperation::CreateDirectory,
            message: "Destination exists and is not a directory".to_string(),
        });
    }

    let spec_mirror_pats = SpecMirrorPatterns::from_raw(
        spec_mirror_options.patterns_include_files.as_deref(),
        spec_mirror_options.patterns_exclude_files.as_deref(),
        spec_mirror_options.patterns_exclude_dirs.as_deref(),
        spec_mirror_options.rule_pattern,
    )?;

    let mut spec_mirror_ctx = SpecMirrorContext {
        path_dir_src: path_dir_src.clone(),
        path_dir_dst: path_dir_dst.clone(),
        path_dir_dst_resolved: fs::canonicalize(&path_dir_dst).ok(),
        spec_mirror_options,
        spec_mirror_pats,
        predicate,
        builder_report: ReportMirrorBuilder::default(),
        l_ancestors: Vec::new(),
        set_dirs_target: BTreeSet::from([path_dir_dst]),
        l_tasks_file_copy: Vec::new(),
    };

    if spec_mirror_ctx.spec_mirror_options.rule_symlink == EnumMirrorSymlinkStrategy::Dereference
    {
        let identity_root = derive_dir_identity(&path_dir_src).map_err(|e| {
            MirrorTreeError::from_io(&path_dir_src, EnumMirrorOperation::InspectEntry, &e)
        })?;
        spec_mirror_ctx
            .l_ancestors
            .push((identity_root, path_dir_src.clone()));
    }

    walk_directory(&path_dir_src, &mut spec_mirror_ctx)?;
    tracing::debug!(
        n_dirs = spec_mirror_ctx.set_dirs_target.len(),
        n_files = spec_mirror_ctx.l_tasks_file_copy.len(),
        "plan complete"
    );

    create_target_directories(&mut spec_mirror_ctx)?;
    flush_file_copy_tasks(&mut spec_mirror_ctx)?;

    let report = spec_mirror_ctx.builder_report.build();
    tracing::info!("{report}");
    Ok(report)
}

fn walk_directory<F: FilenamePredicate + ?Sized>(
    path_dir: &Path,
    spec_mirror_ctx: &mut SpecMirrorContext<'_, F>,
) -> Result<(), MirrorTreeError> {
    let path_dir_target = rewrite_prefix(
        path_dir,
        &spec_mirror_ctx.path_dir_src,
        &spec_mirror_ctx.path_dir_dst,
    )?;
    tracing::debug!(dir = %path_dir.display(), "walk");
    if spec_mirror_ctx.spec_mirror_options.if_keep_empty_dirs {
        spec_mirror_ctx.insert_target_dir(&path_dir_target);
    }

    let iter_entries = match fs::read_dir(path_dir) {
        Ok(iter) => iter,
        Err(e) => {
            return spec_mirror_ctx.handle_error(MirrorTreeError::from_io(
                path_dir,
                EnumMirrorOperation::ListDirectory,
                &e,
            ));
        }
    };

    let enum_rule_symlink = spec_mirror_ctx.spec_mirror_options.rule_symlink;
    let mut l_dirs: Vec<SpecDirEntry> = Vec::new();
    let mut l_files: Vec<SpecFileEntry> = Vec::new();

    for _entry_res in iter_entries {
        let entry = match _entry_res {
            Ok(v) => v,
            Err(e) => {
                spec_mirror_ctx.handle_error(MirrorTreeError::from_io(
                    path_dir,
                    EnumMirrorOperation::ListDirectory,
                    &e,
                ))?;
                continue;
            }
        };

        let path_entry = entry.path();
        let cfg_file_type = match entry.file_type() {
            Ok(v) => v,
            Err(e) => {
                spec_mirror_ctx.handle_error(MirrorTreeError::from_io(
                    &path_entry,
                    EnumMirrorOperation::InspectEntry,
                    &e,
                ))?;
                continue;
            }
        };

        let mut b_is_dir = cfg_file_type.is_dir();
        let mut b_is_file = cfg_file_type.is_file();
        if cfg_file_type.is_symlink() {
            match enum_rule_symlink {
                EnumMirrorSymlinkStrategy::SkipSymlinks => {
                    spec_mirror_ctx
                        .builder_report
                        .add_warning(format!("Symlink skipped: {}", path_entry.display()));
                    spec_mirror_ctx.builder_report.add_skipped();
                    continue;
                }
                EnumMirrorSymlinkStrategy::Error => {
                    spec_mirror_ctx
                        .handle_error(MirrorTreeError::SymlinkRejected(path_entry))?;
                    continue;
                }
                EnumMirrorSymlinkStrategy::Dereference => match fs::metadata(&path_entry) {
                    Ok(meta_target) => {
                        b_is_dir = meta_target.is_dir();
                        b_is_file = meta_target.is_file();
                    }
                    Err(e) => {
                        spec_mirror_ctx.handle_error(MirrorTreeError::from_io(
                            &path_entry,
                            EnumMirrorOperation::InspectEntry,
                            &e,
                        ))?;
                        continue;
                    }
                },
            }
        }

        let file_name = entry.file_name();
        let c_name = file_name.to_string_lossy().to_string();
        if b_is_dir {
            l_dirs.push(SpecDirEntry {
                path_dir_src_sub: path_entry,
                name_dir: c_name,
            });
        } else if b_is_file {
            l_files.push(SpecFileEntry {
                path_file_src: path_entry,
                file_name,
                name_file: c_name,
            });
        } else {
            spec_mirror_ctx
                .builder_report
                .add_warning(format!("Special file skipped: {}", path_entry.display()));
            spec_mirror_ctx.builder_report.add_skipped();
        }
    }

    l_dirs.sort_by(|a, b| a.name_dir.cmp(&b.name_dir));
    l_files.sort_by(|a, b| a.name_file.cmp(&b.name_file));

    for _file_entry in l_files {
        handle_file_entry(_file_entry, &path_dir_target, spec_mirror_ctx)?;
    }

    for _dir_entry in l_dirs {
        if spec_mirror_ctx
            .spec_mirror_pats
            .is_dir_excluded(&_dir_entry.name_dir)
        {
            tracing::debug!(dir = %_dir_entry.path_dir_src_sub.display(), "excluded");
            continue;
        }
        enter_directory(_dir_entry, spec_mirror_ctx)?;
    }

    Ok(())
}

fn enter_directory<F: FilenamePredicate + ?Sized>(
    spec_dir_entry: SpecDirEntry,
    spec_mirror_ctx: &mut SpecMirrorContext<'_, F>,
) -> Result<(), MirrorTreeError> {
    let path_dir_sub = spec_dir_entry.path_dir_src_sub;
    if spec_mirror_ctx.spec_mirror_options.rule_symlink != EnumMirrorSymlinkStrategy::Dereference
    {
        return walk_directory(&path_dir_sub, spec_mirror_ctx);
    }

    let identity_dir = match derive_dir_identity(&path_dir_sub) {
        Ok(v) => v,
        Err(e) => {
            return spec_mirror_ctx.handle_error(MirrorTreeError::from_io(
                &path_dir_sub,
                EnumMirrorOperation::InspectEntry,
                &e,
            ));
        }
    };
    let path_ancestor = spec_mirror_ctx
        .l_ancestors
        .iter()
        .find(|(identity, _)| *identity == identity_dir)
        .map(|(_, path)| path.clone());
    if let Some(ancestor) = path_ancestor {
        return spec_mirror_ctx.handle_error(MirrorTreeError::CyclicTraversal {
            path: path_dir_sub,
            ancestor,
        });
    }

    // A followed link must not lead back into the tree being written.
    let b_into_dst = spec_mirror_ctx
        .path_dir_dst_resolved
        .as_deref()
        .is_some_and(|path_dst| {
            fs::canonicalize(&path_dir_sub).is_ok_and(|path| path.starts_with(path_dst))
        });
    if b_into_dst {
        let destination = spec_mirror_ctx.path_dir_dst.clone();
        return spec_mirror_ctx.handle_error(MirrorTreeError::SourceDestinationOverlap {
            source: path_dir_sub,
            destination,
        });
    }

    spec_mirror_ctx
        .l_ancestors
        .push((identity_dir, path_dir_sub.clone()));
    let res_walk = walk_directory(&path_dir_sub, spec_mirror_ctx);
    spec_mirror_ctx.l_ancestors.pop();
    res_walk
}

fn handle_file_entry<F: FilenamePredicate + ?Sized>(
    spec_file_entry: SpecFileEntry,
    path_dir_target: &Path,
    spec_mirror_ctx: &mut SpecMirrorContext<'_, F>,
) -> Result<(), MirrorTreeError> {
    let b_matched = spec_mirror_ctx
        .predicate
        .is_included(&spec_file_entry.name_file)?
        && spec_mirror_ctx
            .spec_mirror_pats
            .is_file_included(&spec_file_entry.name_file);
    spec_mirror_ctx.builder_report.add_scanned(b_matched);
    if !b_matched {
        return Ok(());
    }

    let path_file_dst = path_dir_target.join(&spec_file_entry.file_name);
    spec_mirror_ctx.insert_target_dir(path_dir_target);
    spec_mirror_ctx
        .builder_report
        .add_planned(path_file_dst.clone());
    spec_mirror_ctx.l_tasks_file_copy.push(SpecCopyTaskFile {
        path_file_src: spec_file_entry.path_file_src,
        path_file_dst,
    });
    Ok(())
}

fn create_target_directories<F: FilenamePredicate + ?Sized>(
    spec_mirror_ctx: &mut SpecMirrorContext<'_, F>,
) -> Result<(), MirrorTreeError> {
    let set_dirs_target = std::mem::take(&mut spec_mirror_ctx.set_dirs_target);
    if spec_mirror_ctx.spec_mirror_options.if_dry_run {
        return Ok(());
    }

    // Parents sort before children, so each level is counted once.
    for path_dir_dst in set_dirs_target {
        if path_dir_dst.is_dir() {
            continue;
        }
        match fs::create_dir_all(&path_dir_dst) {
            Ok(()) => spec_mirror_ctx.builder_report.add_dir_created(),
            Err(e) => spec_mirror_ctx.handle_error(MirrorTreeError::from_io(
                &path_dir_dst,
                EnumMirrorOperation::CreateDirectory,
                &e,
            ))?,
        }
    }
    Ok(())
}

fn copy_task_file(
    spec_task: &SpecCopyTaskFile,
    if_preserve_metadata: bool,
) -> Result<(), MirrorTreeError> {
    if spec_task.path_file_dst.is_dir() {
        return Err(MirrorTreeError::DestinationWriteError {
            path: spec_task.path_file_dst.clone(),
            operation: EnumMirrorOperation::CopyFile,
            message: "Destination is a directory".to_string(),
        });
    }
    copy_file_with_metadata(
        &spec_task.path_file_src,
        &spec_task.path_file_dst,
        if_preserve_metadata,
    )
    .map_err(|e| {
        MirrorTreeError::from_io(&spec_task.path_file_dst, EnumMirrorOperation::CopyFile, &e)
    })?;
    tracing::debug!(
        src = %spec_task.path_file_src.display(),
        dst = %spec_task.path_file_dst.display(),
        "copied"
    );
    Ok(())
}

fn flush_file_copy_tasks<F: FilenamePredicate + ?Sized>(
    spec_mirror_ctx: &mut SpecMirrorContext<'_, F>,
) -> Result<(), MirrorTreeError> {
    let l_tasks_file_copy = std::mem::take(&mut spec_mirror_ctx.l_tasks_file_copy);
    if l_tasks_file_copy.is_empty() {
        return Ok(());
    }
    if spec_mirror_ctx.spec_mirror_options.if_dry_run {
        for _ in &l_tasks_file_copy {
            spec_mirror_ctx.builder_report.add_skipped();
        }
        return Ok(());
    }

    let if_preserve_metadata = spec_mirror_ctx.spec_mirror_options.if_preserve_metadata;
    let n_workers_max = calculate_worker_limit(spec_mirror_ctx.spec_mirror_options.num_workers_max);

    if n_workers_max > 1 {
        match ThreadPoolBuilder::new().num_threads(n_workers_max).build() {
            Ok(thread_pool) => {
                let l_results = thread_pool.install(|| {
                    l_tasks_file_copy
                        .par_iter()
                        .map(|spec_task| copy_task_file(spec_task, if_preserve_metadata))
                        .collect::<Vec<_>>()
                });
                for res_copy in l_results {
                    match res_copy {
                        Ok(()) => spec_mirror_ctx.builder_report.add_copied(),
                        Err(e) => spec_mirror_ctx.handle_error(e)?,
                    }
                }
                return Ok(());
            }
            Err(_) => {
                spec_mirror_ctx.builder_report.add_warning(format!(
                    "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial copy."
                ));
            }
        }
    }

    for spec_task in &l_tasks_file_copy {
        match copy_task_file(spec_task, if_preserve_metadata) {
            Ok(()) => spec_mirror_ctx.builder_report.add_copied(),
            Err(e) => spec_mirror_ctx.handle_error(e)?,
        }
    }
    Ok(())
}

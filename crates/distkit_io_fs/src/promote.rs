//! Default-variant promotion: copy one variant directory's files to an alias location.

use std::fs;
use std::path::Path;

use crate::report::{ReportMirror, ReportMirrorBuilder};
use crate::spec::{EnumMirrorOperation, MirrorTreeError, SpecPromoteOptions};
use crate::util::{SpecMirrorPatterns, copy_file_with_metadata, is_same_location};

/// Copy the regular files found directly inside `dir_variant` into `dir_alias`.
///
/// This is the "default version" step of a distribution layout: one of several
/// toolchain/platform variant directories is chosen and its binaries are made
/// available at a stable path. The copy is flat (subdirectories of the variant
/// are ignored), existing alias files with the same name are overwritten, and
/// everything else in `dir_alias` is left alone. The first failure aborts.
///
/// An alias that resolves to the variant directory itself, or an alias file
/// that resolves to its own source file, is a `SourceDestinationOverlap`
/// reported before anything is written.
///
/// ```no_run
/// use distkit_io_fs::{SpecPromoteOptions, promote_files};
///
/// let spec_promote_options = SpecPromoteOptions {
///     patterns_include_files: Some(vec!["dll".to_string(), "lib".to_string()]),
///     ..SpecPromoteOptions::default()
/// };
/// promote_files("last_build/lib/x86/vs2012", "last_build/lib", spec_promote_options)?;
/// # Ok::<(), distkit_io_fs::MirrorTreeError>(())
/// ```
pub fn promote_files<P, Q>(
    dir_variant: P,
    dir_alias: Q,
    spec_promote_options: SpecPromoteOptions,
) -> Result<ReportMirror, MirrorTreeError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path_dir_variant = dir_variant.as_ref();
    let path_dir_alias = dir_alias.as_ref();
    let _span = tracing::info_span!(
        "promote_files",
        variant = %path_dir_variant.display(),
        alias = %path_dir_alias.display()
    )
    .entered();

    if !path_dir_variant.is_dir() {
        return Err(MirrorTreeError::SourceNotFound(
            path_dir_variant.to_path_buf(),
        ));
    }
    if path_dir_alias.exists() && !path_dir_alias.is_dir() {
        return Err(MirrorTreeError::DestinationWriteError {
            path: path_dir_alias.to_path_buf(),
            operation: EnumMirrorOperation::CreateDirectory,
            message: "Destination exists and is not a directory".to_string(),
        });
    }

    if is_same_location(path_dir_variant, path_dir_alias) {
        return Err(MirrorTreeError::SourceDestinationOverlap {
            source: path_dir_variant.to_path_buf(),
            destination: path_dir_alias.to_path_buf(),
        });
    }

    let spec_promote_pats = SpecMirrorPatterns::from_raw(
        spec_promote_options.patterns_include_files.as_deref(),
        None,
        None,
        spec_promote_options.rule_pattern,
    )?;

    let mut l_entries = Vec::new();
    let iter_entries = fs::read_dir(path_dir_variant).map_err(|e| {
        MirrorTreeError::from_io(path_dir_variant, EnumMirrorOperation::ListDirectory, &e)
    })?;
    for _entry_res in iter_entries {
        let entry = _entry_res.map_err(|e| {
            MirrorTreeError::from_io(path_dir_variant, EnumMirrorOperation::ListDirectory, &e)
        })?;
        let path_entry = entry.path();
        let meta_entry = fs::metadata(&path_entry).map_err(|e| {
            MirrorTreeError::from_io(&path_entry, EnumMirrorOperation::InspectEntry, &e)
        })?;
        if meta_entry.is_file() {
            l_entries.push((entry.file_name(), path_entry));
        }
    }
    l_entries.sort();

    let mut builder_report = ReportMirrorBuilder::default();
    let mut l_tasks = Vec::new();
    for (file_name, path_file_src) in l_entries {
        let b_matched = spec_promote_pats.is_file_included(&file_name.to_string_lossy());
        builder_report.add_scanned(b_matched);
        if b_matched {
            let path_file_dst = path_dir_alias.join(&file_name);
            if path_file_dst.exists() && is_same_location(&path_file_src, &path_file_dst) {
                return Err(MirrorTreeError::SourceDestinationOverlap {
                    source: path_file_src,
                    destination: path_file_dst,
                });
            }
            builder_report.add_planned(path_file_dst.clone());
            l_tasks.push((path_file_src, path_file_dst));
        }
    }

    if spec_promote_options.if_dry_run {
        for _ in &l_tasks {
            builder_report.add_skipped();
        }
        return Ok(builder_report.build());
    }

    if !path_dir_alias.is_dir() {
        fs::create_dir_all(path_dir_alias).map_err(|e| {
            MirrorTreeError::from_io(path_dir_alias, EnumMirrorOperation::CreateDirectory, &e)
        })?;
        builder_report.add_dir_created();
    }

    for (path_file_src, path_file_dst) in l_tasks {
        if path_file_dst.is_dir() {
            return Err(MirrorTreeError::DestinationWriteError {
                path: path_file_dst,
                operation: EnumMirrorOperation::CopyFile,
                message: "Destination is a directory".to_string(),
            });
        }
        copy_file_with_metadata(
            &path_file_src,
            &path_file_dst,
            spec_promote_options.if_preserve_metadata,
        )
        .map_err(|e| MirrorTreeError::from_io(&path_file_dst, EnumMirrorOperation::CopyFile, &e))?;
        tracing::debug!(dst = %path_file_dst.display(), "promoted");
        builder_report.add_copied();
    }

    let report = builder_report.build();
    tracing::info!("{}", report.format("[PROMOTE]"));
    Ok(report)
}

use super::*;
use clap::CommandFactory;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_text(path: &Path, txt: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, txt).expect("write text");
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parses_mirror_args_into_options() {
    let cli = Cli::try_parse_from([
        "distkit",
        "mirror",
        "-i",
        "h,hpp",
        "-x",
        "generated.h",
        "--exclude-dir",
        ".git",
        "-m",
        "literal",
        "--symlinks",
        "skip",
        "--collect-errors",
        "-j",
        "4",
        "--keep-empty-dirs",
        "--dry-run",
        "-vv",
        "src",
        "include",
    ])
    .expect("parse cli");

    assert_eq!(cli.verbose, 2);
    let Command::Mirror(args) = cli.command else {
        panic!("expected mirror command");
    };
    assert_eq!(args.source, PathBuf::from("src"));
    assert_eq!(args.destination, PathBuf::from("include"));

    let opts = build_mirror_options(&args);
    assert_eq!(
        opts.patterns_include_files,
        Some(vec!["h".to_string(), "hpp".to_string()])
    );
    assert_eq!(
        opts.patterns_exclude_files,
        Some(vec!["generated.h".to_string()])
    );
    assert_eq!(opts.patterns_exclude_dirs, Some(vec![".git".to_string()]));
    assert_eq!(opts.rule_pattern, EnumMirrorPatternMode::Literal);
    assert_eq!(opts.rule_symlink, EnumMirrorSymlinkStrategy::SkipSymlinks);
    assert_eq!(opts.rule_error, EnumMirrorErrorPolicy::Collect);
    assert_eq!(opts.num_workers_max, Some(4));
    assert!(opts.if_keep_empty_dirs);
    assert!(opts.if_dry_run);
    assert!(!opts.if_preserve_metadata);
}

#[test]
fn mirror_defaults_are_serial_abort_dereference() {
    let cli = Cli::try_parse_from(["distkit", "mirror", "src", "dst"]).expect("parse cli");
    let Command::Mirror(args) = cli.command else {
        panic!("expected mirror command");
    };
    let opts = build_mirror_options(&args);
    assert_eq!(opts.patterns_include_files, None);
    assert_eq!(opts.rule_pattern, EnumMirrorPatternMode::Extension);
    assert_eq!(opts.rule_symlink, EnumMirrorSymlinkStrategy::Dereference);
    assert_eq!(opts.rule_error, EnumMirrorErrorPolicy::Abort);
    assert_eq!(opts.num_workers_max, Some(1));
}

#[test]
fn jobs_zero_means_auto() {
    let cli = Cli::try_parse_from(["distkit", "mirror", "-j", "0", "src", "dst"]).expect("parse");
    let Command::Mirror(args) = cli.command else {
        panic!("expected mirror command");
    };
    assert_eq!(build_mirror_options(&args).num_workers_max, None);
}

#[test]
fn unknown_pattern_mode_is_rejected() {
    let parse = Cli::try_parse_from(["distkit", "mirror", "-m", "fuzzy", "src", "dst"]);
    assert!(parse.is_err());
}

#[test]
fn promote_requires_two_paths() {
    let parse = Cli::try_parse_from(["distkit", "promote", "lib/x86/vs2012"]);
    assert!(parse.is_err());
}

#[test]
fn mirror_command_writes_summary_line() {
    let tmp = tempdir().expect("tempdir");
    let src = tmp.path().join("src");
    let dst = tmp.path().join("include");
    write_text(&src.join("a.h"), "a");
    write_text(&src.join("a.cpp"), "cpp");
    write_text(&src.join("sub/b.h"), "b");

    let cli = Cli::try_parse_from([
        OsStr::new("distkit"),
        OsStr::new("mirror"),
        OsStr::new("-i"),
        OsStr::new("h"),
        src.as_os_str(),
        dst.as_os_str(),
    ])
    .expect("parse cli");

    let mut out = Vec::new();
    run_command(cli.command, &mut out).expect("mirror");
    let txt = String::from_utf8(out).expect("utf8");
    assert_eq!(
        txt.trim(),
        "[MIRROR] scanned=3 matched=2 copied=2 dirs=2 skipped=0 errors=0 warnings=0"
    );
    assert!(dst.join("a.h").is_file());
    assert!(dst.join("sub/b.h").is_file());
    assert!(!dst.join("a.cpp").exists());
}

#[test]
fn dry_run_lists_planned_paths_without_writing() {
    let tmp = tempdir().expect("tempdir");
    let src = tmp.path().join("src");
    let dst = tmp.path().join("include");
    write_text(&src.join("a.h"), "a");

    let cli = Cli::try_parse_from([
        OsStr::new("distkit"),
        OsStr::new("mirror"),
        OsStr::new("--dry-run"),
        src.as_os_str(),
        dst.as_os_str(),
    ])
    .expect("parse cli");

    let mut out = Vec::new();
    run_command(cli.command, &mut out).expect("mirror");
    let txt = String::from_utf8(out).expect("utf8");
    let l_lines: Vec<&str> = txt.lines().collect();
    assert_eq!(l_lines.len(), 2);
    assert_eq!(PathBuf::from(l_lines[0]), dst.join("a.h"));
    assert!(l_lines[1].starts_with("[MIRROR] scanned=1 matched=1 copied=0"));
    assert!(!dst.exists());
}

#[test]
fn json_output_carries_counts_and_planned_paths() {
    let tmp = tempdir().expect("tempdir");
    let src = tmp.path().join("variant");
    let dst = tmp.path().join("alias");
    write_text(&src.join("x.dll"), "x");
    write_text(&src.join("x.pdb"), "pdb");

    let cli = Cli::try_parse_from([
        OsStr::new("distkit"),
        OsStr::new("promote"),
        OsStr::new("-i"),
        OsStr::new("dll"),
        OsStr::new("--json"),
        src.as_os_str(),
        dst.as_os_str(),
    ])
    .expect("parse cli");

    let mut out = Vec::new();
    run_command(cli.command, &mut out).expect("promote");
    let value: serde_json::Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(value["counts"]["cnt_scanned"], 2);
    assert_eq!(value["counts"]["cnt_copied"], 1);
    assert_eq!(value["planned"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["errors"].as_array().map(Vec::len), Some(0));
    assert!(dst.join("x.dll").is_file());
}

#[test]
fn missing_source_error_names_the_paths() {
    let tmp = tempdir().expect("tempdir");
    let src = tmp.path().join("missing");
    let dst = tmp.path().join("dst");

    let cli = Cli::try_parse_from([
        OsStr::new("distkit"),
        OsStr::new("mirror"),
        src.as_os_str(),
        dst.as_os_str(),
    ])
    .expect("parse cli");

    let mut out = Vec::new();
    let err = run_command(cli.command, &mut out).expect_err("must fail");
    let txt = format!("{err:#}");
    assert!(txt.contains("mirror"));
    assert!(txt.contains("missing"));
    assert!(out.is_empty());
}

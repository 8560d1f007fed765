use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

fn write_text(path: &Path, txt: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, txt).expect("write text");
}

fn distkit() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_distkit"));
    cmd.env_remove("DISTKIT_LOG");
    cmd
}

#[test]
fn mirror_headers_into_include_tree() {
    let tmp = tempdir().expect("tempdir");
    let src = tmp.path().join("src");
    let dst = tmp.path().join("include");
    write_text(&src.join("engine.h"), "#pragma once\n");
    write_text(&src.join("engine.cpp"), "int main() {}\n");
    write_text(&src.join("gfx/sprite.hpp"), "struct Sprite;\n");
    write_text(&src.join("tests/run.cpp"), "\n");

    let output = distkit()
        .args(["mirror", "-i", "h,hpp"])
        .arg(&src)
        .arg(&dst)
        .output()
        .expect("run distkit");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("[MIRROR] scanned=4 matched=2 copied=2"));

    assert_eq!(
        fs::read_to_string(dst.join("engine.h")).expect("read"),
        "#pragma once\n"
    );
    assert!(dst.join("gfx/sprite.hpp").is_file());
    assert!(!dst.join("tests").exists());
    assert!(!dst.join("engine.cpp").exists());
}

#[test]
fn missing_source_exits_non_zero_with_message() {
    let tmp = tempdir().expect("tempdir");
    let output = distkit()
        .arg("mirror")
        .arg(tmp.path().join("nope"))
        .arg(tmp.path().join("dst"))
        .output()
        .expect("run distkit");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: mirror"), "stderr: {stderr}");
    assert!(stderr.contains("nope"), "stderr: {stderr}");
    assert!(!tmp.path().join("dst").exists());
}

#[test]
fn overlapping_destination_is_rejected() {
    let tmp = tempdir().expect("tempdir");
    let src = tmp.path().join("src");
    write_text(&src.join("a.h"), "a");

    let output = distkit()
        .arg("mirror")
        .arg(&src)
        .arg(src.join("out"))
        .output()
        .expect("run distkit");

    assert_eq!(output.status.code(), Some(1));
    assert!(!src.join("out").exists());
}

#[test]
fn promote_json_report() {
    let tmp = tempdir().expect("tempdir");
    let variant = tmp.path().join("lib/x86/vs2012");
    let alias = tmp.path().join("lib");
    write_text(&variant.join("NessEngine.dll"), "dll");
    write_text(&variant.join("NessEngine.lib"), "lib");

    let output = distkit()
        .args(["promote", "--json", "-i", "dll,lib"])
        .arg(&variant)
        .arg(&alias)
        .output()
        .expect("run distkit");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["counts"]["cnt_copied"], 2);
    assert_eq!(value["dry_run"], false);
    assert!(alias.join("NessEngine.dll").is_file());
    assert!(alias.join("NessEngine.lib").is_file());
}

#[cfg(unix)]
#[test]
fn collected_errors_are_listed_and_fail_the_run() {
    let tmp = tempdir().expect("tempdir");
    let src = tmp.path().join("src");
    let dst = tmp.path().join("dst");
    write_text(&src.join("a.h"), "a");
    write_text(&src.join("real/b.h"), "b");
    std::os::unix::fs::symlink(src.join("real"), src.join("link")).expect("symlink");

    let output = distkit()
        .args(["mirror", "--symlinks", "error", "--collect-errors"])
        .arg(&src)
        .arg(&dst)
        .output()
        .expect("run distkit");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("link"), "stderr: {stderr}");
    assert!(stderr.contains("1 entries failed"), "stderr: {stderr}");
    assert!(dst.join("a.h").is_file());
    assert!(dst.join("real/b.h").is_file());
}

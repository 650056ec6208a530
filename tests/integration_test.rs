mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use common::*;

fn patcher_exe() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_hip-patcher"))
}

fn run(args: &[&str]) -> Output {
    Command::new(patcher_exe())
        .args(args)
        .output()
        .expect("Failed to run hip-patcher")
}

fn run_ok(args: &[&str]) -> String {
    let output = run(args);
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "hip-patcher {:?} failed:\nstdout: {}\nstderr: {}",
        args,
        stdout,
        stderr
    );
    stdout
}

fn s(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_end_to_end_install_and_uninstall() {
    let temp = tempfile::tempdir().unwrap();
    let old_dir = temp.path().join("old");
    let new_dir = temp.path().join("new");
    let target_dir = temp.path().join("target");
    let patch_file = temp.path().join("mod.patch");
    let uninstall_file = temp.path().join("uninstall.patch");

    let (level, level_modded) = level_pair();

    // Original game
    create_dir_tree(
        &old_dir,
        &[
            ("sb.ini", b"[Main]\nBoot=HB01"),
            ("hb/hb01.ini", b"Spawn=0"),
            ("movies/intro.bik", b"not tracked"),
        ],
    );
    write_archive(&old_dir.join("hb/hb01.hip"), &level);
    write_archive(&old_dir.join("boot.hip"), &level);

    // Modded game: one archive edited, one config edited, one config added
    create_dir_tree(
        &new_dir,
        &[
            ("sb.ini", b"[Main]\nBoot=HB02"),
            ("hb/hb01.ini", b"Spawn=0"),
            ("hb/hb02.ini", b"Spawn=3"),
            ("movies/intro.bik", b"also not tracked, and different"),
        ],
    );
    write_archive(&new_dir.join("hb/hb01.hip"), &level_modded);
    write_archive(&new_dir.join("boot.hip"), &level);

    copy_dir_recursive(&old_dir, &target_dir);
    let installed = collect_dir_tree(&target_dir);

    // Step 1: create
    let stdout = run_ok(&[
        "create",
        "--old",
        s(&old_dir),
        "--new",
        s(&new_dir),
        "--output",
        s(&patch_file),
    ]);
    assert!(stdout.contains("Patch created successfully!"));
    assert!(stdout.contains("Files added: 1"));
    assert!(stdout.contains("Files modified: 1"));
    assert!(stdout.contains("Archives modified: 1"));
    assert!(patch_file.exists());

    // Step 2: inspect
    let stdout = run_ok(&["inspect", "--patch", s(&patch_file), "--digests"]);
    assert!(stdout.contains("ADD hb/hb02.ini"));
    assert!(stdout.contains("MODIFY sb.ini"));
    assert!(stdout.contains("MODIFY hb/hb01.hip"));
    assert!(stdout.contains("DELETE b [00000002]"));
    assert!(stdout.contains("blake3"));
    assert!(!stdout.contains("intro.bik"));
    assert!(!stdout.contains("boot.hip"));

    // Step 3: apply, keeping an uninstall patch
    let stdout = run_ok(&[
        "apply",
        "--target",
        s(&target_dir),
        "--patch",
        s(&patch_file),
        "--uninstall",
        s(&uninstall_file),
    ]);
    assert!(stdout.contains("Patch applied successfully!"));
    assert!(uninstall_file.exists());

    assert_eq!(fs::read(target_dir.join("sb.ini")).unwrap(), b"[Main]\nBoot=HB02");
    assert_eq!(fs::read(target_dir.join("hb/hb02.ini")).unwrap(), b"Spawn=3");
    assert_eq!(
        fs::read(target_dir.join("hb/hb01.hip")).unwrap(),
        fs::read(new_dir.join("hb/hb01.hip")).unwrap()
    );
    assert_eq!(fs::read(target_dir.join("movies/intro.bik")).unwrap(), b"not tracked");

    let stdout = run_ok(&["inspect", "--patch", s(&uninstall_file)]);
    assert!(stdout.contains("Uninstall patch"));

    // Step 4: uninstall restores the original install byte for byte
    run_ok(&[
        "apply",
        "--target",
        s(&target_dir),
        "--patch",
        s(&uninstall_file),
    ]);
    assert_eq!(collect_dir_tree(&target_dir), installed);
}

#[test]
fn test_empty_to_full() {
    let temp = tempfile::tempdir().unwrap();
    let old_dir = temp.path().join("old");
    let new_dir = temp.path().join("new");
    let target_dir = temp.path().join("target");
    let patch_file = temp.path().join("full.patch");

    fs::create_dir_all(&old_dir).unwrap();
    fs::create_dir_all(&target_dir).unwrap();

    create_dir_tree(&new_dir, &[("sb.ini", b"[Main]"), ("sub/extra.ini", b"x=1")]);
    write_archive(&new_dir.join("sub/level.hop"), &level_pair().1);

    run_ok(&[
        "create",
        "--old",
        s(&old_dir),
        "--new",
        s(&new_dir),
        "--output",
        s(&patch_file),
    ]);
    run_ok(&["apply", "--target", s(&target_dir), "--patch", s(&patch_file)]);

    assert_eq!(collect_dir_tree(&target_dir), collect_dir_tree(&new_dir));
}

#[test]
fn test_config_file_sets_missing_asset_policy() {
    let temp = tempfile::tempdir().unwrap();
    let old_dir = temp.path().join("old");
    let new_dir = temp.path().join("new");
    let target_dir = temp.path().join("target");
    let patch_file = temp.path().join("mod.patch");
    let config_file = temp.path().join("patcher.toml");

    let (level, level_modded) = level_pair();
    write_archive(&old_dir.join("boot.hip"), &level);
    write_archive(&new_dir.join("boot.hip"), &level_modded);

    // The installed copy is missing asset 4, which the patch modifies.
    let drifted = archive(
        vec![record(1, "a", b"aaaa"), record(2, "b", b"bb")],
        vec![vec![1], vec![2]],
    );
    write_archive(&target_dir.join("boot.hip"), &drifted);

    fs::write(&config_file, "missing_asset = \"skip-op\"\n").unwrap();

    run_ok(&[
        "create",
        "--old",
        s(&old_dir),
        "--new",
        s(&new_dir),
        "--output",
        s(&patch_file),
    ]);
    run_ok(&[
        "--config",
        s(&config_file),
        "apply",
        "--target",
        s(&target_dir),
        "--patch",
        s(&patch_file),
    ]);

    // With skip-op the delete of asset 2 still goes through.
    let committed = read_archive(&target_dir.join("boot.hip"));
    let ids: Vec<u32> = committed.assets.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn test_bad_patch_fails_cleanly() {
    let temp = tempfile::tempdir().unwrap();
    let target_dir = temp.path().join("target");
    create_dir_tree(&target_dir, &[("sb.ini", b"[Main]")]);
    let patch_file = temp.path().join("bad.patch");
    fs::write(&patch_file, b"NOPE\x00").unwrap();

    let output = run(&["apply", "--target", s(&target_dir), "--patch", s(&patch_file)]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to apply patch"));
    assert_eq!(fs::read(target_dir.join("sb.ini")).unwrap(), b"[Main]");
}

#[test]
fn test_verbose_flag_logs_each_operation() {
    let temp = tempfile::tempdir().unwrap();
    let old_dir = temp.path().join("old");
    let new_dir = temp.path().join("new");
    let patch_file = temp.path().join("mod.patch");

    create_dir_tree(&old_dir, &[("sb.ini", b"[Main]\nBoot=HB01")]);
    create_dir_tree(&new_dir, &[("sb.ini", b"[Main]\nBoot=HB02"), ("new.ini", b"x=1")]);

    let create = |verbose: bool| {
        let mut cmd = Command::new(patcher_exe());
        cmd.env_remove("RUST_LOG");
        if verbose {
            cmd.arg("-v");
        }
        cmd.args([
            "create",
            "--old",
            s(&old_dir),
            "--new",
            s(&new_dir),
            "--output",
            s(&patch_file),
        ]);
        let output = cmd.output().expect("Failed to run hip-patcher");
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stderr).into_owned()
    };

    let quiet = create(false);
    assert!(!quiet.contains("MODIFY sb.ini"));

    let stderr = create(true);
    assert!(stderr.contains("MODIFY sb.ini"), "stderr: {}", stderr);
    assert!(stderr.contains("ADD new.ini"), "stderr: {}", stderr);
}

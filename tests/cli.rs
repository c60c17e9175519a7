use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn packwright(data: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("packwright").unwrap();
    cmd.current_dir(data.path())
        .env("PACKWRIGHT_DATA_DIR", data.path().join("data"))
        .env_remove("PACKWRIGHT_CURSEFORGE_API_KEY");
    cmd
}

#[test]
fn help_lists_commands() {
    let data = tempfile::tempdir().unwrap();
    packwright(&data)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("blocked"));
}

#[test]
fn instance_create_then_list() {
    let data = tempfile::tempdir().unwrap();

    packwright(&data)
        .args(["--json", "instance", "create", "Skyblock", "-m", "1.20.1", "--loader", "fabric"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"loader\": \"fabric\""));

    packwright(&data)
        .args(["--json", "instance", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skyblock"))
        .stdout(predicate::str::contains("1.20.1"));

    packwright(&data)
        .args(["instance", "show", "skyblock"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Minecraft: 1.20.1"))
        .stdout(predicate::str::contains("Mods:      0"));
}

#[test]
fn unknown_instance_exits_with_not_found() {
    let data = tempfile::tempdir().unwrap();
    packwright(&data)
        .args(["instance", "show", "nowhere"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn unknown_loader_is_rejected_by_parser() {
    let data = tempfile::tempdir().unwrap();
    packwright(&data)
        .args(["instance", "create", "Old", "-m", "1.12.2", "--loader", "rift"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("rift"));
}

#[test]
fn import_of_missing_file_fails() {
    let data = tempfile::tempdir().unwrap();
    packwright(&data)
        .args(["--json", "import", "does-not-exist.mrpack"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\": true"));
}

#[test]
fn blocked_with_empty_report_is_a_no_op() {
    let data = tempfile::tempdir().unwrap();
    let report = data.path().join("report.json");
    std::fs::write(&report, "[]").unwrap();

    packwright(&data)
        .args(["instance", "create", "Pack", "-m", "1.19.2"])
        .assert()
        .success();

    packwright(&data)
        .args(["blocked", "Pack"])
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("No blocked files"));
}

#[test]
fn blocked_without_downloads_folder_still_finishes() {
    let data = tempfile::tempdir().unwrap();
    let report = data.path().join("report.json");
    std::fs::write(
        &report,
        r#"{"blocked_files": [{"project_id": "238222", "file_id": "4567", "filename": "jei.jar",
            "platform": "curseforge", "content_type": "mod"}]}"#,
    )
    .unwrap();

    packwright(&data)
        .args(["instance", "create", "Pack", "-m", "1.20.1"])
        .assert()
        .success();

    packwright(&data)
        .args(["--json", "blocked", "Pack"])
        .arg(&report)
        .arg("--folder")
        .arg(data.path().join("Downloads"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"skipped\""))
        .stdout(predicate::str::contains("jei.jar"));
}

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn clean_streets(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("clean-streets").unwrap();
    cmd.current_dir(dir.path())
        .env(
            "CLEAN_STREETS__DATABASE__URL",
            format!("sqlite://{}", dir.path().join("cli.db").display()),
        )
        .env("CLEAN_STREETS__CLASSIFIER__FIXED_SCORE", "0.9")
        .env("CLEAN_STREETS__STORAGE__UPLOAD_DIR", dir.path().join("uploads"))
        .env_remove("DATABASE_URL")
        .env_remove("EMAIL_API_KEY");
    cmd
}

#[test]
fn test_no_subcommand_shows_getting_started() {
    let dir = tempfile::tempdir().unwrap();
    clean_streets(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("To get started:"))
        .stdout(predicate::str::contains("clean-streets migrate"));
}

#[test]
fn test_help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    clean_streets(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("transition"))
        .stdout(predicate::str::contains("notifications"))
        .stdout(predicate::str::contains("show-config"));
}

#[test]
fn test_show_config_reflects_environment() {
    let dir = tempfile::tempdir().unwrap();
    clean_streets(&dir)
        .arg("show-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("fixed_score = 0.9"))
        .stdout(predicate::str::contains("cli.db"));
}

#[test]
fn test_report_and_transition_flow() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("bins.png");
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&[0u8; 16]);
    std::fs::write(&photo, png).unwrap();

    clean_streets(&dir)
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    clean_streets(&dir)
        .args(["add-user", "--name", "Asha", "--email", "asha@example.org"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added citizen #1"));
    clean_streets(&dir)
        .args(["add-user", "--name", "Ravi", "--email", "ravi@example.org", "--role", "official"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added official #2"));

    clean_streets(&dir)
        .args([
            "report",
            "--as",
            "1",
            "--title",
            "Overflowing bins",
            "--description",
            "Bins by the bus stop",
            "--category",
            "waste",
            "--address",
            "12 Market Street",
            "--lat",
            "12.97",
            "--lng",
            "77.59",
        ])
        .arg(&photo)
        .assert()
        .success()
        .stdout(predicate::str::contains("Reported issue #1"));

    // Citizens cannot change status
    clean_streets(&dir)
        .args(["transition", "--as", "1", "1", "in_progress"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Transition refused"));

    clean_streets(&dir)
        .args(["transition", "--as", "2", "1", "in_progress"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now IN PROGRESS"));

    clean_streets(&dir)
        .args(["notifications", "--as", "1", "--mark-all-read"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 notifications, 2 unread"))
        .stdout(predicate::str::contains("Marked 2 notifications read"));
}

#[test]
fn test_admin_changes_role_and_ward() {
    let dir = tempfile::tempdir().unwrap();
    clean_streets(&dir).arg("migrate").assert().success();
    clean_streets(&dir)
        .args(["add-user", "--name", "Kiran", "--email", "kiran@example.org", "--role", "admin"])
        .assert()
        .success();
    clean_streets(&dir)
        .args(["add-user", "--name", "Dev", "--email", "dev@example.org"])
        .assert()
        .success();

    clean_streets(&dir)
        .args(["set-role", "--as", "2", "2", "admin"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Role change refused"));
    clean_streets(&dir)
        .args(["set-role", "--as", "1", "2", "mayor"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Role change refused"));
    clean_streets(&dir)
        .args(["set-role", "--as", "1", "2", "official"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dev #2 is now official"));

    clean_streets(&dir)
        .args(["set-ward", "--as", "1", "2", "14"])
        .assert()
        .success()
        .stdout(predicate::str::contains("now belongs to ward 14"));
    clean_streets(&dir)
        .args(["set-ward", "--as", "1", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no longer has a ward"));
}

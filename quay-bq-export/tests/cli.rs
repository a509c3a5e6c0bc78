use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

fn command() -> Command {
    let mut cmd = Command::cargo_bin("quay-bq-export").expect("Binary exists");
    cmd.env_remove("QUAY_AUTH_TOKEN")
        .env_remove("BIGQUERY_ACCESS_TOKEN")
        .env("RUST_LOG", "info");
    cmd
}

#[test]
fn help_lists_export_subcommand() {
    command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"));
}

#[test]
fn export_help_lists_flags() {
    command()
        .args(["export", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--allow-partial")
                .and(predicate::str::contains("--create-table"))
                .and(predicate::str::contains("--bigquery-token")),
        );
}

#[test]
fn export_without_token_fails_naming_the_flag() {
    command()
        .args(["export", "--namespace", "jetstack", "--repo", "cert-manager"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--auth-token must be specified"));
}

#[test]
fn export_with_missing_repo_fails_after_trace_initialised() {
    command()
        .args([
            "export",
            "--auth-token",
            "t",
            "--bigquery-token",
            "b",
            "--namespace",
            "jetstack",
        ])
        .assert()
        .failure()
        .stderr(
            predicate::str::contains("trace_initialised")
                .and(predicate::str::contains("--repo must be specified")),
        );
}

#[test]
fn config_file_with_secret_is_rejected() {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(config.path(), b"namespace: jetstack\nauth_token: leaked\n")
        .expect("Writing temp config failed");

    command()
        .args(["export", "--auth-token", "t", "--config"])
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config YAML"));
}

#[test]
fn reversed_date_range_is_rejected() {
    command()
        .args([
            "export",
            "--auth-token",
            "t",
            "--bigquery-token",
            "b",
            "--namespace",
            "n",
            "--repo",
            "r",
            "--project-id",
            "p",
            "--dataset",
            "d",
            "--table",
            "t",
            "--bucket",
            "b",
            "--start",
            "06/03/2023",
            "--end",
            "06/01/2023",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be after"));
}

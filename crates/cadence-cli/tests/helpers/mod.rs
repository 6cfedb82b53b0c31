use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

/// Runs the `cadence` binary against a throwaway database and user.
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
    user_id: Uuid,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self {
            temp_dir,
            db_path,
            user_id: Uuid::new_v4(),
        }
    }

    /// A command isolated from any `cadence.toml` or `CADENCE_*` variables of the host.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");
        cmd.current_dir(self.temp_dir.path())
            .env("CADENCE_DATABASE_PATH", &self.db_path)
            .env("CADENCE_USER_ID", self.user_id.to_string())
            .env("CADENCE_DEFAULT_TIMEZONE", "UTC")
            .env("CADENCE_LOG", "warn");
        cmd
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs `args` and returns the first task id printed on stdout.
    pub fn create_task(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        let stdout = String::from_utf8(output).expect("stdout is not UTF-8");
        extract_uuid(&stdout).expect("no task id in output")
    }
}

/// Finds a hyphenated UUID in text that may carry ANSI colour codes.
pub fn extract_uuid(text: &str) -> Option<String> {
    text.char_indices().find_map(|(i, _)| {
        let candidate = text.get(i..i + 36)?;
        Uuid::parse_str(candidate).ok().map(|id| id.to_string())
    })
}

pub mod assertions {
    use predicates::prelude::*;

    pub fn has_task_table_headers() -> impl Predicate<str> {
        predicate::str::contains("ID")
            .and(predicate::str::contains("Title"))
            .and(predicate::str::contains("Start"))
            .and(predicate::str::contains("Status"))
    }

    pub fn task_created_successfully() -> impl Predicate<str> {
        predicate::str::contains("✓")
            .and(predicate::str::contains("Created").and(predicate::str::contains("task")))
    }

    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}

use linetrace_core::Database;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const BEFORE: &str = "fn main() {\n}\n";
const AFTER: &str = "fn main() {\n    println!(\"hi\");\n}\n";

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    work: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let work = base.join("work");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(work.join("src")).expect("failed to create work dir");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            work,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("linetrace/data.db")
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.work.join(rel);
        fs::write(&path, content).expect("failed to write work file");
        path
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(PathBuf::from(assert_cmd::cargo::cargo_bin!("linetrace")));
        command
            .args(args)
            .env("HOME", &self.home)
            .env("XDG_DATA_HOME", &self.xdg_data)
            .env("XDG_CONFIG_HOME", &self.xdg_config)
            .env("XDG_STATE_HOME", &self.xdg_state)
            .env_remove("LINETRACE_DB_PATH")
            .env_remove("RUST_LOG");
        command
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    env.command(args)
        .stdin(Stdio::null())
        .output()
        .unwrap_or_else(|e| panic!("failed to execute linetrace: {e}"))
}

fn run_bin_with_stdin(env: &CliTestEnv, args: &[&str], input: &str) -> Output {
    let mut child = env
        .command(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to spawn linetrace: {e}"));

    child
        .stdin
        .take()
        .expect("stdin not piped")
        .write_all(input.as_bytes())
        .expect("failed to write stdin");

    child
        .wait_with_output()
        .unwrap_or_else(|e| panic!("failed to wait for linetrace: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "linetrace {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Record one edit of `src/main.rs` from BEFORE to AFTER, leaving AFTER on disk.
fn record_main_edit(env: &CliTestEnv, session: &str) -> PathBuf {
    let before = env.write("before.txt", BEFORE);
    let target = env.write("src/main.rs", AFTER);
    let target_arg = path_arg(&target);
    let before_arg = path_arg(&before);

    let args = [
        "record-before",
        "--session",
        session,
        "--file",
        target_arg.as_str(),
        "--content-file",
        before_arg.as_str(),
    ];
    let output = run_bin(env, &args);
    assert_success(&args, &output);

    let args = [
        "record-after",
        "--session",
        session,
        "--file",
        target_arg.as_str(),
        "--content-file",
        target_arg.as_str(),
        "--info",
        "test-agent",
    ];
    let output = run_bin(env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Recorded 1 added, 0 modified"),
        "unexpected record-after output:\n{stdout}"
    );

    target
}

fn json_stdout(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn record_then_query_session_reports_adoption() {
    let env = CliTestEnv::new();
    record_main_edit(&env, "s1");

    let args = ["session", "s1", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let report = json_stdout(&output);
    assert_eq!(report["metrics"]["ai_total_lines"], 1);
    assert_eq!(report["metrics"]["adopted_lines"], 1);
    assert_eq!(report["metrics"]["adoption_rate"], 100.0);
    assert_eq!(report["metrics"]["generation_rate"], 33.33);
    assert_eq!(report["diff_lines"][0]["line_content"], "println!(\"hi\");");
    assert_eq!(report["summaries"][0]["session_info"], "test-agent");

    let db = Database::open(&env.db_path()).expect("failed to open db");
    let (pending, summaries, diff_lines) = db.get_total_counts().expect("failed to count rows");
    assert_eq!((pending, summaries, diff_lines), (0, 1, 1));
}

#[test]
fn edited_away_lines_lower_adoption() {
    let env = CliTestEnv::new();
    let target = record_main_edit(&env, "s1");

    // Human rewrites the AI line afterwards
    fs::write(&target, "fn main() {\n    eprintln!(\"bye\");\n}\n").expect("rewrite failed");

    let target_arg = path_arg(&target);
    let args = ["file", target_arg.as_str(), "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let report = json_stdout(&output);
    assert_eq!(report["metrics"]["adopted_lines"], 0);
    assert_eq!(report["metrics"]["adoption_rate"], 0.0);
}

#[test]
fn project_and_global_scopes_cover_recorded_files() {
    let env = CliTestEnv::new();
    record_main_edit(&env, "s1");

    let work_arg = path_arg(&env.work);
    let args = ["project", work_arg.as_str(), "--format", "text"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Adoption rate:       100.00%"), "got:\n{stdout}");

    let other = env.work.join("src");
    let other_arg = path_arg(&other.join("nested"));
    let args = ["project", other_arg.as_str(), "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert_eq!(json_stdout(&output)["metrics"]["ai_total_lines"], 0);

    let args = ["global", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let report = json_stdout(&output);
    assert_eq!(report["metrics"]["session_count"], 1);
    assert_eq!(report["metrics"]["file_count"], 1);
}

#[test]
fn record_after_without_before_fails() {
    let env = CliTestEnv::new();
    let target = env.write("src/lib.rs", "pub fn f() {}\n");
    let target_arg = path_arg(&target);

    let args = [
        "record-after",
        "--session",
        "s1",
        "--file",
        target_arg.as_str(),
        "--content-file",
        target_arg.as_str(),
    ];
    let output = run_bin(&env, &args);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("no before-edit snapshot"),
        "unexpected stderr:\n{stderr}"
    );
}

#[test]
fn content_can_come_from_stdin() {
    let env = CliTestEnv::new();
    let target = env.write("src/lib.rs", "a\nb\n");
    let target_arg = path_arg(&target);

    let args = ["record-before", "--session", "s2", "--file", target_arg.as_str()];
    let output = run_bin_with_stdin(&env, &args, "a\n");
    assert_success(&args, &output);

    let args = [
        "record-after",
        "--session",
        "s2",
        "--file",
        target_arg.as_str(),
        "--format",
        "json",
    ];
    let output = run_bin_with_stdin(&env, &args, "a\nb\n");
    assert_success(&args, &output);

    let outcome = json_stdout(&output);
    assert_eq!(outcome["add_lines_count"], 1);
    assert_eq!(outcome["total_lines_after"], 3);
}

#[test]
fn empty_database_reports_no_edits() {
    let env = CliTestEnv::new();

    let args = ["global"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Metrics for global"));
    assert!(stdout.contains("No recorded edits."));
}

#[test]
fn export_writes_csv_report() {
    let env = CliTestEnv::new();
    record_main_edit(&env, "s1");

    let export_path = env.work.join("out/report.csv");
    let export_arg = path_arg(&export_path);
    let args = [
        "session",
        "s1",
        "--export",
        export_arg.as_str(),
        "--export-format",
        "csv",
    ];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);

    let csv = fs::read_to_string(&export_path).expect("export file missing");
    assert!(csv.starts_with("Metric Name,Value\n"));
    assert!(csv.contains("AI Generated Lines,1\n"));
    assert!(csv.contains("Diff Type,Line Number,Code Content\n"));
    assert!(csv.contains("add,2,\"println!(\"\"hi\"\");\"\n"));
}

#[test]
fn cleanup_keeps_recent_edits() {
    let env = CliTestEnv::new();
    record_main_edit(&env, "s1");

    let args = ["cleanup", "--days", "30"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Deleted 0 session record(s)"), "got:\n{stdout}");
    assert!(
        stdout.contains("Remaining: 1 session record(s), 1 diff line(s), 0 pending snapshot(s)"),
        "got:\n{stdout}"
    );

    let args = ["session", "s1", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert_eq!(json_stdout(&output)["metrics"]["ai_total_lines"], 1);
}

#[test]
fn delete_removes_session_records() {
    let env = CliTestEnv::new();
    record_main_edit(&env, "s1");

    let args = ["delete", "s1"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Deleted 1 session record(s)"));

    let args = ["session", "s1", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert_eq!(json_stdout(&output)["summaries"].as_array().map(Vec::len), Some(0));
}

#[test]
fn session_text_view_shows_agent_info() {
    let env = CliTestEnv::new();
    record_main_edit(&env, "s1");

    let args = ["session", "s1"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Agent info:          test-agent"), "got:\n{stdout}");
    assert!(stdout.contains("Operation time:"), "got:\n{stdout}");
}

#[test]
fn sessions_lists_every_recorded_session() {
    let env = CliTestEnv::new();
    record_main_edit(&env, "s1");
    record_main_edit(&env, "s2");

    let args = ["sessions", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let sessions = json_stdout(&output);
    let sessions = sessions.as_array().expect("sessions should be an array");
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s["session_info"] == "test-agent"));
    assert!(sessions.iter().all(|s| s["file_count"] == 1));

    let args = ["sessions"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 session(s)"), "got:\n{stdout}");

    let args = ["sessions", "--since", "2999-01-01", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert_eq!(json_stdout(&output).as_array().map(Vec::len), Some(0));
}

#[test]
fn compare_reports_one_row_per_session() {
    let env = CliTestEnv::new();
    record_main_edit(&env, "s1");
    record_main_edit(&env, "s2");

    let args = ["compare", "s2", "s1", "missing", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let rows = json_stdout(&output);
    assert_eq!(rows[0]["session_id"], "s2");
    assert_eq!(rows[0]["metrics"]["ai_total_lines"], 1);
    assert_eq!(rows[1]["session_id"], "s1");
    assert_eq!(rows[1]["metrics"]["adoption_rate"], 100.0);
    assert_eq!(rows[2]["metrics"]["ai_total_lines"], 0);

    let args = ["compare", "s1"];
    let output = run_bin(&env, &args);
    assert!(!output.status.success(), "a single session should be rejected");
}

#[test]
fn time_window_limits_metrics_queries() {
    let env = CliTestEnv::new();
    record_main_edit(&env, "s1");

    let args = ["global", "--since", "2999-01-01", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    let report = json_stdout(&output);
    assert_eq!(report["metrics"]["ai_total_lines"], 0);
    assert!(report["window"]["since"].is_string());

    let args = ["session", "s1", "--until", "2999-01-01", "--format", "json"];
    let output = run_bin(&env, &args);
    assert_success(&args, &output);
    assert_eq!(json_stdout(&output)["metrics"]["ai_total_lines"], 1);

    let args = ["global", "--since", "yesterday-ish"];
    let output = run_bin(&env, &args);
    assert!(!output.status.success(), "unparseable dates should be rejected");
}

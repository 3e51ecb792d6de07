//! Process-backed execution service.
//!
//! Each variation runs as one child process of the configured program:
//!
//! - stdin receives `{"variation": {...}, "prompt": "..."}` and is then closed
//! - `FANOUT_VARIATION_ID`, `FANOUT_MODEL` and `FANOUT_THINKING_LEVEL` are set
//! - exit code 0 means success; stdout is read as
//!   `{"output": "...", "usage": {...}, "metrics": {...}}` when it parses,
//!   otherwise taken verbatim
//! - any other exit is an error carrying stderr
//!
//! The process is awaited on a background task, so `poll` only reads the
//! recorded state and never blocks.

use async_trait::async_trait;
use fanout_application::ports::execution_service::{
    CompletedRun, ExecutionError, ExecutionService, PollResponse, StartResponse,
};
use fanout_domain::Variation;
use fanout_domain::util::{cap_output, preview};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Maximum output kept per run (1 MB)
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Characters of stderr kept in an error message
const STDERR_PREVIEW_CHARS: usize = 2000;

/// What to launch for each variation
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone)]
enum RunState {
    Running,
    Finished(PollResponse),
}

type RunTable = Arc<Mutex<HashMap<String, RunState>>>;

/// [`ExecutionService`] that launches one local process per variation.
///
/// Children are killed if the runtime drops their wait task.
pub struct ProcessExecutionService {
    config: ProcessConfig,
    runs: RunTable,
    next_run: AtomicU64,
}

impl ProcessExecutionService {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            runs: Arc::new(Mutex::new(HashMap::new())),
            next_run: AtomicU64::new(0),
        }
    }

    fn command(&self, variation: &Variation) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("FANOUT_VARIATION_ID", &variation.id);
        if let Some(model) = &variation.model {
            cmd.env("FANOUT_MODEL", model);
        }
        if let Some(level) = variation.thinking_level {
            cmd.env("FANOUT_THINKING_LEVEL", level.as_str());
        }
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

fn lock(runs: &Mutex<HashMap<String, RunState>>) -> MutexGuard<'_, HashMap<String, RunState>> {
    runs.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ExecutionService for ProcessExecutionService {
    async fn start(&self, variation: &Variation) -> Result<StartResponse, ExecutionError> {
        let payload = serde_json::to_vec(&json!({
            "variation": variation,
            "prompt": variation.effective_prompt(),
        }))
        .map_err(|e| ExecutionError::Other(format!("Failed to encode variation: {}", e)))?;

        let mut child = match self.command(variation).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.config.program, error = %e, "Failed to spawn execution process");
                return Ok(StartResponse::error(format!(
                    "Failed to spawn {}: {}",
                    self.config.program, e
                )));
            }
        };

        let n = self.next_run.fetch_add(1, Ordering::SeqCst);
        let run_id = format!("{}-{}", variation.id, n);
        let session_key = child
            .id()
            .map(|pid| format!("pid:{}", pid))
            .unwrap_or_else(|| run_id.clone());
        lock(&self.runs).insert(run_id.clone(), RunState::Running);

        info!(run_id = %run_id, session_key = %session_key, "Execution process started");

        let stdin = child.stdin.take();
        let runs = Arc::clone(&self.runs);
        let task_run_id = run_id.clone();
        tokio::spawn(async move {
            // feed stdin while draining stdout so neither pipe can stall the other
            let feed = async move {
                if let Some(mut stdin) = stdin
                    && let Err(e) = stdin.write_all(&payload).await
                {
                    debug!(error = %e, "Process did not read its input");
                }
            };
            let ((), waited) = tokio::join!(feed, child.wait_with_output());

            let response = match waited {
                Ok(output) => interpret_output(output),
                Err(e) => PollResponse::error(format!("Failed to wait for process: {}", e)),
            };
            debug!(run_id = %task_run_id, terminal = response.is_terminal(), "Execution process exited");
            lock(&runs).insert(task_run_id, RunState::Finished(response));
        });

        Ok(StartResponse::accepted(run_id, session_key))
    }

    async fn poll(&self, run_id: &str) -> Result<PollResponse, ExecutionError> {
        let state = lock(&self.runs).get(run_id).cloned();
        match state {
            Some(RunState::Running) => Ok(PollResponse::Running),
            Some(RunState::Finished(response)) => Ok(response),
            None => Err(ExecutionError::UnknownRun(run_id.to_string())),
        }
    }
}

/// Map a finished process to a poll response.
fn interpret_output(output: Output) -> PollResponse {
    if !output.status.success() {
        let exit = match output.status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let error = if stderr.is_empty() {
            format!("Process failed with {}", exit)
        } else {
            format!(
                "Process failed with {}: {}",
                exit,
                preview(stderr, STDERR_PREVIEW_CHARS)
            )
        };
        return PollResponse::error(error);
    }

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let mut run = parse_structured(&stdout).unwrap_or_else(|| CompletedRun::new(stdout));

    let (capped, truncated) = cap_output(std::mem::take(&mut run.output), MAX_OUTPUT_BYTES);
    if truncated {
        warn!(limit = MAX_OUTPUT_BYTES, "Process output truncated");
    }
    run.output = capped;
    PollResponse::Completed(run)
}

/// Stdout counts as structured only if it is a JSON object with a string `output`.
fn parse_structured(stdout: &str) -> Option<CompletedRun> {
    let value: Value = serde_json::from_str(stdout.trim()).ok()?;
    if !value.get("output").is_some_and(Value::is_string) {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_domain::ThinkingLevel;
    use std::time::Duration;

    #[test]
    fn test_parse_structured() {
        let run = parse_structured(
            r#"{"output": "fixed", "usage": {"total_tokens": 12}, "metrics": {"confidence": 0.9}}"#,
        )
        .unwrap();
        assert_eq!(run.output, "fixed");
        assert_eq!(run.usage.unwrap().total_tokens, Some(12));
        assert_eq!(run.metrics.unwrap().confidence, Some(0.9));

        assert!(parse_structured("plain text").is_none());
        assert!(parse_structured(r#"{"result": "x"}"#).is_none());
        assert!(parse_structured(r#"{"output": 3}"#).is_none());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::process::ExitStatusExt;
        use std::process::ExitStatus;

        fn output(code: i32, stdout: &[u8], stderr: &[u8]) -> Output {
            Output {
                status: ExitStatus::from_raw(code << 8),
                stdout: stdout.to_vec(),
                stderr: stderr.to_vec(),
            }
        }

        fn shell(script: &str) -> ProcessExecutionService {
            ProcessExecutionService::new(
                ProcessConfig::new("sh").with_args(vec!["-c".to_string(), script.to_string()]),
            )
        }

        async fn run_to_end(service: &ProcessExecutionService, variation: &Variation) -> PollResponse {
            let StartResponse::Accepted { run_id, .. } = service.start(variation).await.unwrap()
            else {
                panic!("start was not accepted");
            };
            for _ in 0..500 {
                let response = service.poll(&run_id).await.unwrap();
                if response.is_terminal() {
                    return response;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("process did not finish");
        }

        #[test]
        fn test_interpret_raw_output_is_capped() {
            let big = vec![b'x'; MAX_OUTPUT_BYTES + 10];
            let PollResponse::Completed(run) = interpret_output(output(0, &big, b"")) else {
                panic!("expected completion");
            };
            assert_eq!(run.output.len(), MAX_OUTPUT_BYTES);
        }

        #[test]
        fn test_interpret_failure() {
            let response = interpret_output(output(3, b"partial", b"boom\n"));
            assert_eq!(response, PollResponse::error("Process failed with exit code 3: boom"));

            let response = interpret_output(output(1, b"", b""));
            assert_eq!(response, PollResponse::error("Process failed with exit code 1"));
        }

        #[tokio::test]
        async fn test_structured_completion() {
            let service = shell(
                r#"cat > /dev/null; printf '{"output":"fixed","metrics":{"confidence":0.9}}'"#,
            );
            let variation = Variation::new("v1", "v1", 0);

            let PollResponse::Completed(run) = run_to_end(&service, &variation).await else {
                panic!("expected completion");
            };
            assert_eq!(run.output, "fixed");
            assert_eq!(run.metrics.unwrap().confidence, Some(0.9));
        }

        #[tokio::test]
        async fn test_env_vars() {
            let service = shell(
                r#"printf '%s|%s|%s' "$FANOUT_VARIATION_ID" "$FANOUT_MODEL" "$FANOUT_THINKING_LEVEL""#,
            );
            let variation = Variation::new("hybrid-3", "gpt/high", 3)
                .with_model("gpt-5")
                .with_thinking_level(ThinkingLevel::High);

            let response = run_to_end(&service, &variation).await;
            assert_eq!(response, PollResponse::completed("hybrid-3|gpt-5|high"));
        }

        #[tokio::test]
        async fn test_stdin_payload() {
            let service = shell("cat");
            let variation = Variation::new("v1", "v1", 0)
                .with_task("Fix the bug")
                .with_additional_context("Be brief.");

            let PollResponse::Completed(run) = run_to_end(&service, &variation).await else {
                panic!("expected completion");
            };
            let payload: Value = serde_json::from_str(&run.output).unwrap();
            assert_eq!(payload["variation"]["id"], "v1");
            assert_eq!(payload["prompt"], "Fix the bug\n\nBe brief.");
        }

        #[tokio::test]
        async fn test_nonzero_exit() {
            let service = shell("echo boom >&2; exit 3");
            let variation = Variation::new("v1", "v1", 0);

            let response = run_to_end(&service, &variation).await;
            assert_eq!(response, PollResponse::error("Process failed with exit code 3: boom"));
        }

        #[tokio::test]
        async fn test_run_ids_are_unique() {
            let service = shell("true");
            let variation = Variation::new("v1", "v1", 0);

            let first = service.start(&variation).await.unwrap();
            let second = service.start(&variation).await.unwrap();
            let (
                StartResponse::Accepted { run_id: a, .. },
                StartResponse::Accepted { run_id: b, .. },
            ) = (first, second)
            else {
                panic!("start was not accepted");
            };
            assert_eq!(a, "v1-0");
            assert_eq!(b, "v1-1");
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_is_start_error() {
        let service = ProcessExecutionService::new(ProcessConfig::new(
            "/nonexistent/fanout-test-agent",
        ));
        let response = service.start(&Variation::new("v1", "v1", 0)).await.unwrap();
        assert!(matches!(response, StartResponse::Error { .. }));
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let service = ProcessExecutionService::new(ProcessConfig::new("true"));
        let err = service.poll("missing-0").await.unwrap_err();
        assert_eq!(err, ExecutionError::UnknownRun("missing-0".to_string()));
    }
}

use std::io::{ErrorKind, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ExecError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DRAIN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn diagnostic_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<CommandOutput, ExecError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|err| match err.kind() {
        ErrorKind::NotFound => ExecError::NotFound,
        _ => ExecError::Io(err),
    })?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            debug!(pid = child.id(), ?timeout, "killing process past deadline");
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::TimedOut(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    // A grandchild can inherit the pipes and keep them open past our child's exit.
    let stdout = drain(&stdout_reader, deadline, "stdout");
    let stderr = drain(&stderr_reader, deadline, "stderr");

    Ok(CommandOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (sender, receiver) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = sender.send(buf);
        });
    }
    receiver
}

fn drain(receiver: &Receiver<Vec<u8>>, deadline: Instant, stream: &str) -> Vec<u8> {
    let wait = deadline
        .saturating_duration_since(Instant::now())
        .max(DRAIN_GRACE);
    match receiver.recv_timeout(wait) {
        Ok(buf) => buf,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            debug!(stream, "output stream still open after exit, discarding it");
            Vec::new()
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Vec::new(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_status() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo hello; echo oops >&2; exit 3");

        let output = run_with_timeout(command, Duration::from_secs(5)).expect("sh should run");
        assert!(!output.success());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.diagnostic_text(), "oops");
    }

    #[test]
    fn diagnostic_text_falls_back_to_stdout() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo only-stdout; exit 1");

        let output = run_with_timeout(command, Duration::from_secs(5)).expect("sh should run");
        assert_eq!(output.diagnostic_text(), "only-stdout");
    }

    #[test]
    fn kills_process_past_deadline() {
        let mut command = Command::new("sleep");
        command.arg("5");

        let started = Instant::now();
        let result = run_with_timeout(command, Duration::from_millis(200));
        assert!(matches!(result, Err(ExecError::TimedOut(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn inherited_pipe_does_not_outlive_deadline() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("sleep 5 & exit 0");

        let started = Instant::now();
        let output =
            run_with_timeout(command, Duration::from_millis(500)).expect("sh should run");
        assert!(output.success());
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn missing_executable_maps_to_not_found() {
        let command = Command::new("/nonexistent/definitely-not-a-tool");
        let result = run_with_timeout(command, Duration::from_secs(1));
        assert!(matches!(result, Err(ExecError::NotFound)));
    }
}

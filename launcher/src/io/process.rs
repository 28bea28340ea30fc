//! Child-process plumbing: spawning with piped output, streaming readers,
//! and the poll/cancel/kill wait loop.

use std::io::Read;
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Liveness poll interval while the child runs, so exit is detected
/// promptly even when output has stopped.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Python buffers pipe output unless told otherwise.
const UNBUFFERED_ENV: (&str, &str) = ("PYTHONUNBUFFERED", "1");

/// A spawned child with its piped output streams taken out of the handle.
#[derive(Debug)]
pub struct StreamedChild {
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Spawn `argv` with stdout/stderr piped and stdin closed.
pub fn spawn_streamed(argv: &[String]) -> Result<StreamedChild> {
    let (program, args) = argv.split_first().ok_or_else(|| anyhow!("empty command"))?;
    let mut cmd = Command::new(program);
    cmd.args(args)
        .env(UNBUFFERED_ENV.0, UNBUFFERED_ENV.1)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = %program, "spawning child process");
    let mut child = cmd.spawn().with_context(|| format!("spawn {program}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    Ok(StreamedChild {
        child,
        stdout,
        stderr,
    })
}

/// Forward a stream to `forward` in 8 KiB chunks as they arrive, keeping a
/// bounded tail of the most recent bytes when `tail_limit > 0`.
///
/// Returns the captured tail once the stream closes.
pub fn spawn_reader<R, F>(mut reader: R, tail_limit: usize, forward: F) -> thread::JoinHandle<Result<String>>
where
    R: Read + Send + 'static,
    F: Fn(&str) + Send + 'static,
{
    thread::spawn(move || {
        let mut tail: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = reader.read(&mut chunk).context("read child output")?;
            if n == 0 {
                break;
            }
            forward(&String::from_utf8_lossy(&chunk[..n]));
            if tail_limit > 0 {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > tail_limit {
                    let excess = tail.len() - tail_limit;
                    tail.drain(..excess);
                }
            }
        }
        Ok(String::from_utf8_lossy(&tail).into_owned())
    })
}

/// Join a reader thread, mapping a panic to an error.
pub fn join_reader(handle: thread::JoinHandle<Result<String>>) -> Result<String> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Result of waiting on a supervised child.
#[derive(Debug)]
pub struct WaitResult {
    pub status: ExitStatus,
    /// True when the grace period elapsed and the child was force-killed.
    pub forced_kill: bool,
}

/// Block until the child exits, checking `cancel` between liveness polls.
///
/// A cancel request first asks the child to terminate cooperatively; if it
/// is still alive after `grace`, it is killed unconditionally.
pub fn wait_with_cancel(child: &mut Child, cancel: &AtomicBool, grace: Duration) -> Result<WaitResult> {
    loop {
        if cancel.load(Ordering::SeqCst) {
            debug!(pid = child.id(), "termination requested");
            terminate(child);
            return match child.wait_timeout(grace).context("wait after terminate")? {
                Some(status) => Ok(WaitResult {
                    status,
                    forced_kill: false,
                }),
                None => {
                    warn!(
                        pid = child.id(),
                        grace_ms = grace.as_millis() as u64,
                        "grace period elapsed, killing"
                    );
                    child.kill().context("kill child")?;
                    let status = child.wait().context("wait after kill")?;
                    Ok(WaitResult {
                        status,
                        forced_kill: true,
                    })
                }
            };
        }

        if let Some(status) = child.wait_timeout(POLL_INTERVAL).context("poll child")? {
            return Ok(WaitResult {
                status,
                forced_kill: false,
            });
        }
    }
}

/// Ask the child to terminate cooperatively: SIGTERM on unix, a plain kill
/// where no gentler signal exists.
#[cfg(unix)]
#[allow(unsafe_code)]
fn terminate(child: &mut Child) {
    // Safety: kill() is a plain syscall with no memory-safety concerns.
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        debug!(pid = child.id(), "SIGTERM delivery failed, child likely already exited");
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!(pid = child.id(), error = %err, "kill failed, child likely already exited");
    }
}

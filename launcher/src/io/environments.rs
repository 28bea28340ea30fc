//! Execution-environment resolution and discovery.
//!
//! The [`EnvironmentResolver`] trait decouples the supervisor from the
//! actual environment backend (currently conda). Tests use static resolvers
//! that return predetermined prefixes without touching the machine.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// How long environment discovery may take before giving up.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Maps an environment name to a concrete command prefix: the way to invoke
/// an interpreter inside that environment.
pub trait EnvironmentResolver: Send + Sync {
    /// Command prefix that runs the interpreter inside `name`.
    fn resolve(&self, name: &str) -> Result<Vec<String>>;

    /// Names of the environments available on this machine.
    fn list(&self) -> Result<Vec<String>>;
}

/// Resolver backed by the `conda` binary.
pub struct CondaResolver {
    interpreter: Vec<String>,
}

impl CondaResolver {
    pub fn new(interpreter: Vec<String>) -> Self {
        Self { interpreter }
    }
}

impl EnvironmentResolver for CondaResolver {
    fn resolve(&self, name: &str) -> Result<Vec<String>> {
        let mut prefix = vec![
            "conda".to_string(),
            "run".to_string(),
            "--no-capture-output".to_string(),
            "-n".to_string(),
            name.to_string(),
        ];
        prefix.extend(self.interpreter.iter().cloned());
        Ok(prefix)
    }

    #[instrument(skip(self))]
    fn list(&self) -> Result<Vec<String>> {
        let output = run_capture(&["conda", "env", "list"], DISCOVERY_TIMEOUT)?;
        let names = parse_env_list(&output);
        debug!(count = names.len(), "discovered environments");
        Ok(names)
    }
}

/// Default interpreter invocation used when no environment is selected:
/// `python3` (or `python`) on PATH, unbuffered.
pub fn default_interpreter() -> Result<Vec<String>> {
    let python = which::which("python3")
        .or_else(|_| which::which("python"))
        .context("no python interpreter found on PATH")?;
    Ok(vec![python.to_string_lossy().into_owned(), "-u".to_string()])
}

/// Parse `conda env list` output: one environment per non-comment line,
/// name in the first whitespace-delimited column.
fn parse_env_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Run a short discovery command, capturing stdout, with a hard timeout.
fn run_capture(argv: &[&str], timeout: Duration) -> Result<String> {
    let (program, args) = argv.split_first().ok_or_else(|| anyhow!("empty command"))?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawn {program}"))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).map(|_| buf)
    });

    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(program = %program, "discovery command timed out, killing");
            child.kill().context("kill command")?;
            child.wait().context("wait after kill")?
        }
    };

    let stdout = reader
        .join()
        .map_err(|_| anyhow!("stdout reader thread panicked"))?
        .context("read stdout")?;
    if !status.success() {
        return Err(anyhow!("{program} exited with status {:?}", status.code()));
    }
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_conda_env_list_output() {
        let output = "\
# conda environments:
#
base                  *  /home/user/miniconda3
modeling                 /home/user/miniconda3/envs/modeling

gdal310                  /home/user/miniconda3/envs/gdal310
";
        assert_eq!(parse_env_list(output), vec!["base", "modeling", "gdal310"]);
    }

    #[test]
    fn resolve_builds_conda_run_prefix() {
        let resolver = CondaResolver::new(vec!["python3".to_string(), "-u".to_string()]);
        let prefix = resolver.resolve("modeling").expect("resolve");
        assert_eq!(
            prefix,
            vec![
                "conda",
                "run",
                "--no-capture-output",
                "-n",
                "modeling",
                "python3",
                "-u"
            ]
        );
    }

    #[test]
    fn run_capture_reads_stdout() {
        let output = run_capture(&["echo", "hello"], Duration::from_secs(5)).expect("run");
        assert_eq!(output.trim(), "hello");
    }

    #[test]
    fn run_capture_reports_missing_program() {
        assert!(run_capture(&["/nonexistent/conda"], Duration::from_secs(1)).is_err());
    }
}

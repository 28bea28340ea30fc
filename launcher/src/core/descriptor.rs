//! Run descriptors and the command plans derived from them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What is about to be executed. Immutable once created; discarded when the
/// run ends (only its summary survives in the history).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDescriptor {
    /// Path to the script to execute.
    pub script_path: PathBuf,
    /// Configuration file passed to the script as `--config <path>`.
    pub config_path: Option<PathBuf>,
    /// Named execution environment; `None` means the default interpreter.
    pub environment: Option<String>,
}

impl RunDescriptor {
    /// File name of the script, for display and history records.
    pub fn script_name(&self) -> String {
        file_name_of(&self.script_path)
    }
}

/// Concrete invocation derived from a descriptor at launch time.
///
/// `primary` is attempted first. When the primary is environment-qualified
/// and cannot be spawned, `fallback` (the plain default-interpreter
/// invocation) is attempted once before the run is failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPlan {
    pub primary: Vec<String>,
    pub fallback: Option<Vec<String>>,
}

impl CommandPlan {
    /// Derive the invocation for `descriptor`.
    ///
    /// With a resolved environment prefix the plain-interpreter invocation
    /// is kept as the one-shot fallback; without one the plain invocation
    /// is the primary and there is nothing left to fall back to.
    pub fn build(
        descriptor: &RunDescriptor,
        env_prefix: Option<Vec<String>>,
        interpreter: &[String],
    ) -> Self {
        let direct = invocation(interpreter, descriptor);
        match env_prefix {
            Some(prefix) => Self {
                primary: invocation(&prefix, descriptor),
                fallback: Some(direct),
            },
            None => Self {
                primary: direct,
                fallback: None,
            },
        }
    }
}

fn invocation(prefix: &[String], descriptor: &RunDescriptor) -> Vec<String> {
    let mut argv: Vec<String> = prefix.to_vec();
    argv.push(descriptor.script_path.display().to_string());
    if let Some(config) = &descriptor.config_path {
        argv.push("--config".to_string());
        argv.push(config.display().to_string());
    }
    argv
}

/// Render an argv as a single command line for reporting.
pub fn command_line(argv: &[String]) -> String {
    argv.join(" ")
}

/// File name component of a path, falling back to the full path display.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(config: Option<&str>, environment: Option<&str>) -> RunDescriptor {
        RunDescriptor {
            script_path: PathBuf::from("/scripts/model.py"),
            config_path: config.map(PathBuf::from),
            environment: environment.map(str::to_string),
        }
    }

    #[test]
    fn plain_invocation_uses_interpreter_and_config_arg() {
        let interpreter = vec!["python3".to_string(), "-u".to_string()];
        let plan = CommandPlan::build(&descriptor(Some("/cfg/model_config.yml"), None), None, &interpreter);

        assert_eq!(
            plan.primary,
            vec![
                "python3",
                "-u",
                "/scripts/model.py",
                "--config",
                "/cfg/model_config.yml"
            ]
        );
        assert!(plan.fallback.is_none());
    }

    #[test]
    fn environment_prefix_keeps_plain_fallback() {
        let interpreter = vec!["python3".to_string(), "-u".to_string()];
        let prefix = vec![
            "conda".to_string(),
            "run".to_string(),
            "--no-capture-output".to_string(),
            "-n".to_string(),
            "base".to_string(),
            "python3".to_string(),
            "-u".to_string(),
        ];
        let plan = CommandPlan::build(&descriptor(None, Some("base")), Some(prefix), &interpreter);

        assert_eq!(plan.primary[..5], ["conda", "run", "--no-capture-output", "-n", "base"]);
        assert_eq!(
            plan.fallback,
            Some(vec![
                "python3".to_string(),
                "-u".to_string(),
                "/scripts/model.py".to_string()
            ])
        );
    }

    #[test]
    fn command_line_joins_argv() {
        let argv = vec!["python3".to_string(), "-u".to_string(), "s.py".to_string()];
        assert_eq!(command_line(&argv), "python3 -u s.py");
    }

    #[test]
    fn script_name_is_file_name() {
        assert_eq!(descriptor(None, None).script_name(), "model.py");
    }
}

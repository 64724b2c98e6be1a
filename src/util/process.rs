use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use anyhow::{Context, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StreamMode {
    Inherit,
    Capture,
}

#[derive(Clone, Debug)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
    pub current_dir: Option<PathBuf>,
    pub stdout: StreamMode,
    pub stderr: StreamMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            current_dir: None,
            stdout: StreamMode::Inherit,
            stderr: StreamMode::Inherit,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn captured(mut self) -> Self {
        self.stdout = StreamMode::Capture;
        self.stderr = StreamMode::Capture;
        self
    }

    /// Human readable command line for log output.
    pub fn display(&self) -> String {
        let mut line = self.program.to_string_lossy().into_owned();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Option<Vec<u8>>,
    pub stderr: Option<Vec<u8>>,
}

pub fn run(spec: CommandSpec) -> Result<CommandOutput> {
    tracing::debug!("running `{}`", spec.display());
    let mut command = spec.command();

    match (spec.stdout, spec.stderr) {
        (StreamMode::Inherit, StreamMode::Inherit) => {
            command.stdout(Stdio::inherit());
            command.stderr(Stdio::inherit());
            let status = command
                .status()
                .with_context(|| format!("failed to spawn `{}`", spec.program.to_string_lossy()))?;
            Ok(CommandOutput {
                status,
                stdout: None,
                stderr: None,
            })
        }
        (StreamMode::Capture, StreamMode::Capture) => {
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
            let output = command
                .output()
                .with_context(|| format!("failed to spawn `{}`", spec.program.to_string_lossy()))?;
            Ok(CommandOutput {
                status: output.status,
                stdout: Some(output.stdout),
                stderr: Some(output.stderr),
            })
        }
        _ => anyhow::bail!("mixed capture/inherit mode is not supported yet"),
    }
}

/// Starts the command without waiting for it; used for long-running servers.
pub fn spawn(spec: CommandSpec) -> Result<Child> {
    tracing::debug!("spawning `{}`", spec.display());
    let mut command = spec.command();
    command.stdout(Stdio::inherit());
    command.stderr(Stdio::inherit());
    command
        .spawn()
        .with_context(|| format!("failed to spawn `{}`", spec.program.to_string_lossy()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "echo hi"]).captured();
        let output = run(spec).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.unwrap(), b"hi\n");
    }

    #[test]
    fn rejects_mixed_modes() {
        let mut spec = CommandSpec::new("sh");
        spec.stdout = StreamMode::Capture;
        assert!(run(spec).is_err());
    }

    #[test]
    fn display_joins_arguments() {
        let spec = CommandSpec::new("cordova").args(["prepare", "android"]);
        assert_eq!(spec.display(), "cordova prepare android");
    }
}

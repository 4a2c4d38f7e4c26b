//! Child-process shim.
//!
//! Every tool flappy drives (compilers, archivers, cmake, dependency build
//! commands) goes through [`run`]: spawn, capture both streams, normalise the
//! exit status, and optionally inject environment variables. Shell commands
//! run under `/bin/sh -c` on Unix and `cmd.exe /C` on Windows.

use std::path::PathBuf;

use tokio::process::Command;
use tracing::debug;

/// A fully assembled child-process invocation.
///
/// `CommandSpec` is plain data so toolchain transformers can rewrite it (the
/// MSVC shim turns a `cl` invocation into a `cmd.exe /c "call vcvarsall && cl"`
/// one) and the compilation database can record it verbatim.
#[derive(Debug, Clone)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  pub envs: Vec<(String, String)>,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      envs: Vec::new(),
    }
  }

  /// A spec that runs `command` through the platform shell.
  pub fn shell(command: &str) -> Self {
    #[cfg(windows)]
    {
      let mut spec = Self::new("cmd.exe");
      spec.args.push("/C".to_string());
      spec.args.push(command.to_string());
      spec
    }
    #[cfg(not(windows))]
    {
      let mut spec = Self::new("/bin/sh");
      spec.args.push("-c".to_string());
      spec.args.push(command.to_string());
      spec
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.envs.push((key.into(), value.into()));
    self
  }

  pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
    self.envs.extend(vars);
    self
  }

  /// The invocation as a single shell-style line.
  ///
  /// Arguments containing whitespace or quotes are double-quoted with inner
  /// quotes escaped; this is the form recorded in `compile_commands.json`.
  pub fn command_line(&self) -> String {
    let mut line = String::new();
    line.push_str(&quote(&self.program));
    for arg in &self.args {
      line.push(' ');
      line.push_str(&quote(arg));
    }
    line
  }
}

fn quote(token: &str) -> String {
  if !token.is_empty() && !token.chars().any(|c| c.is_whitespace() || c == '"') {
    return token.to_string();
  }
  let mut quoted = String::with_capacity(token.len() + 2);
  quoted.push('"');
  for c in token.chars() {
    if c == '"' || c == '\\' {
      quoted.push('\\');
    }
    quoted.push(c);
  }
  quoted.push('"');
  quoted
}

/// Captured result of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
  /// Exit code; `None` when the process was terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ProcessOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Spawn the process described by `spec` and wait for it to exit.
///
/// Both streams are captured; the injected environment is merged on top of
/// the inherited one.
pub async fn run(spec: &CommandSpec) -> std::io::Result<ProcessOutput> {
  debug!(program = %spec.program, args = ?spec.args, "spawning process");

  let mut command = Command::new(&spec.program);
  command.args(&spec.args);
  if let Some(cwd) = &spec.cwd {
    command.current_dir(cwd);
  }
  for (key, value) in &spec.envs {
    command.env(key, value);
  }

  let output = command.output().await?;

  Ok(ProcessOutput {
    code: output.status.code(),
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn command_line_quotes_only_when_needed() {
    let spec = CommandSpec::new("g++")
      .arg("-c")
      .arg("src/my file.cpp")
      .arg("-DNAME=\"app\"");
    assert_eq!(spec.command_line(), r#"g++ -c "src/my file.cpp" "-DNAME=\"app\"""#);
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn captures_stdout_and_exit_code() {
    let out = run(&CommandSpec::shell("echo hello")).await.unwrap();
    assert!(out.success());
    assert_eq!(out.stdout.trim(), "hello");
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn nonzero_exit_is_reported() {
    let out = run(&CommandSpec::shell("exit 3")).await.unwrap();
    assert!(!out.success());
    assert_eq!(out.code, Some(3));
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn injected_env_reaches_the_child() {
    let spec = CommandSpec::shell("echo \"$FLAPPY_TEST_VAR\"").env("FLAPPY_TEST_VAR", "injected");
    let out = run(&spec).await.unwrap();
    assert_eq!(out.stdout.trim(), "injected");
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn cwd_is_applied() {
    let temp = tempfile::TempDir::new().unwrap();
    let spec = CommandSpec::shell("pwd").cwd(temp.path());
    let out = run(&spec).await.unwrap();
    assert_eq!(
      std::path::PathBuf::from(out.stdout.trim()).canonicalize().unwrap(),
      temp.path().canonicalize().unwrap()
    );
  }
}

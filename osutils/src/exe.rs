use std::{
    os::unix::process::ExitStatusExt,
    process::{Command, Output},
};

use anyhow::{anyhow, bail, Context, Error};
use log::{trace, warn};

use crate::crate_private::Sealed;

/// Extension for `std::process::Output` to check status and turn failures into anyhow errors.
/// This is a sealed trait, so it cannot be implemented outside of this crate.
pub trait OutputChecker: Sealed {
    /// Check if the process exited successfully
    fn is_success(&self) -> bool;

    /// Get the exit code of the process, if it exited normally
    fn exit_code(&self) -> Option<i32>;

    /// Get the signal that terminated the process, if it was terminated by a signal
    fn end_signal(&self) -> Option<i32>;

    /// Get stdout
    fn output(&self) -> String;

    /// Get stderr
    fn error_output(&self) -> String;

    /// Get all available output, for reporting
    fn output_report(&self) -> String {
        let sections: Vec<String> = [("stdout", self.output()), ("stderr", self.error_output())]
            .into_iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(name, text)| format!("{name}:\n{text}\n"))
            .collect();
        sections.join("\n")
    }

    /// Check if the process exited successfully, otherwise produce an error
    fn check(&self) -> Result<(), Error> {
        if self.is_success() {
            return Ok(());
        }

        Err(match self.output_report() {
            s if !s.is_empty() => anyhow!("Process output:\n{}", s).context(self.explain_exit()),
            _ => anyhow!("(No output was captured)").context(self.explain_exit()),
        })
    }

    /// Check the exit status and return stdout
    fn check_output(&self) -> Result<String, Error> {
        self.check()?;
        Ok(self.output())
    }

    fn explain_exit(&self) -> String {
        if let Some(code) = self.exit_code() {
            format!("process exited with status: {code}")
        } else if let Some(signal) = self.end_signal() {
            format!("process was terminated by signal: {signal}")
        } else {
            "process exited with unknown status".into()
        }
    }
}

impl Sealed for Output {}

impl OutputChecker for Output {
    fn is_success(&self) -> bool {
        self.status.success()
    }

    fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    fn end_signal(&self) -> Option<i32> {
        self.status.signal()
    }

    fn output(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into()
    }

    fn error_output(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into()
    }
}

impl Sealed for Result<Output, std::io::Error> {}

impl OutputChecker for Result<Output, std::io::Error> {
    fn is_success(&self) -> bool {
        self.as_ref().is_ok_and(|output| output.is_success())
    }

    fn exit_code(&self) -> Option<i32> {
        self.as_ref().ok().and_then(|output| output.exit_code())
    }

    fn end_signal(&self) -> Option<i32> {
        self.as_ref().ok().and_then(|output| output.end_signal())
    }

    fn output(&self) -> String {
        self.as_ref()
            .map(|output| output.output())
            .unwrap_or_default()
    }

    fn error_output(&self) -> String {
        self.as_ref()
            .map(|output| output.error_output())
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), Error> {
        match self {
            Ok(output) => output.check(),
            Err(e) => bail!("Failed to execute process: {}", e),
        }
    }

    fn explain_exit(&self) -> String {
        match self {
            Ok(output) => output.explain_exit(),
            Err(e) => format!("Failed to execute process: {}", e),
        }
    }
}

pub trait RunAndCheck: Sealed {
    /// Run the command to completion and fail unless it exits with status 0.
    fn run_and_check(&mut self) -> Result<(), Error>;

    /// Like `run_and_check`, returning stdout.
    fn output_and_check(&mut self) -> Result<String, Error>;

    /// Render the command line for logs.
    fn render_command(&self) -> String;
}

impl Sealed for Command {}

impl RunAndCheck for Command {
    fn run_and_check(&mut self) -> Result<(), Error> {
        self.output_and_check().map(|_| ())
    }

    fn output_and_check(&mut self) -> Result<String, Error> {
        let rendered_command = self.render_command();
        trace!("Executing '{rendered_command}'");
        let result = self.output();
        trace!(
            "Executed '{rendered_command}': {}. Report:\n{}",
            result.explain_exit(),
            result.output_report(),
        );
        result
            .check_output()
            .with_context(|| format!("Error when running: {rendered_command}"))
    }

    fn render_command(&self) -> String {
        std::iter::once(self.get_program().to_string_lossy())
            .chain(self.get_args().map(|arg| arg.to_string_lossy()))
            .map(|arg| {
                if arg.contains(' ') {
                    format!("'{}'", arg)
                } else {
                    arg.into()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of an optional step.
///
/// A failed optional step is logged at warn level when the value is built and
/// is never turned into an error. Callers may look at `succeeded()` to adjust
/// log output but must not change the run's course on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BestEffort(bool);

impl BestEffort {
    pub fn from_result<T>(step: &str, result: Result<T, Error>) -> Self {
        match result {
            Ok(_) => BestEffort(true),
            Err(e) => {
                warn!("Optional step '{step}' failed, continuing: {e:?}");
                BestEffort(false)
            }
        }
    }

    /// Runs `f` as an optional step.
    pub fn attempt<T>(step: &str, f: impl FnOnce() -> Result<T, Error>) -> Self {
        Self::from_result(step, f())
    }

    pub fn succeeded(&self) -> bool {
        self.0
    }
}

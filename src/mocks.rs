use std::collections::HashSet;
use std::fs;

use parking_lot::Mutex;

use crate::commands::{CommandRunner, Step, ToolCommand, ToolOutput};
use crate::errors::Result;

/// Command runner for tests.
///
/// Records every command instead of spawning it and writes an empty file at
/// each command's output so later steps find their inputs.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<ToolCommand>>,
    failing: HashSet<Step>,
    failing_fragments: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands of this step exit with status 1.
    pub fn failing_on(mut self, step: Step) -> Self {
        self.failing.insert(step);
        self
    }

    /// Commands whose rendered command line contains `fragment` exit with status 1.
    pub fn failing_when(mut self, fragment: &str) -> Self {
        self.failing_fragments.push(fragment.to_string());
        self
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.commands.lock().clone()
    }

    fn should_fail(&self, command: &ToolCommand) -> bool {
        if self.failing.contains(&command.step) {
            return true;
        }
        let line = command.command_line();
        self.failing_fragments.iter().any(|f| line.contains(f.as_str()))
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.commands.lock().push(command.clone());

        if self.should_fail(command) {
            return Ok(ToolOutput {
                code: Some(1),
                stdout: String::new(),
                stderr: format!("{} failed", command.program),
            });
        }

        if let Some(parent) = command.output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&command.output, b"")?;

        Ok(ToolOutput {
            code: Some(0),
            ..ToolOutput::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::animated_gif;
    use crate::config::Tools;
    use crate::errors::CardConvertError;
    use tempfile::TempDir;

    #[test]
    fn test_records_and_creates_output() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let output = temp_dir.path().join("anim/a.gif");
        let command = animated_gif(&Tools::default(), &temp_dir.path().join("a.png"), &output);

        let runner = RecordingRunner::new();
        runner.execute(&command)?;

        assert!(output.exists());
        assert_eq!(runner.commands(), vec![command]);
        Ok(())
    }

    #[test]
    fn test_failing_step() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("a.gif");
        let command = animated_gif(&Tools::default(), &temp_dir.path().join("a.png"), &output);

        let runner = RecordingRunner::new().failing_on(Step::AnimatedGif);
        let err = runner.execute(&command).unwrap_err();

        assert!(matches!(err, CardConvertError::Command { code: Some(1), .. }));
        assert!(!output.exists());
    }
}

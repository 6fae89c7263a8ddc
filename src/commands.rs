//! External tool invocations.
//!
//! Builders here are pure: they turn paths into a [`ToolCommand`] without
//! touching the filesystem. Execution goes through [`CommandRunner`] so the
//! conversion steps can be driven without the real tools installed.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::{OutputKind, Tools};
use crate::errors::{CardConvertError, Result};

const UNSHARP: &str = "1.5x1+0.7+0.02";
const MEDIUM_SIZE: &str = "200x303";
const SMALL_SIZE: &str = "123x186";
const SMALL_ICON_SIZE: &str = "11x16";
const MEDIUM_ICON_SIZE: &str = "30x44";
const LARGE_ICON_SIZE: &str = "40x60";
const JPG_BACKGROUND: &str = "#242424";
const JPG_CROP: &str = "200x302+0+0";
const JPG_QUALITY: &str = "85%";

/// One conversion step of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    MediumCopy,
    SmallCopy,
    JpgCopy,
    SmallIcon,
    MediumIcon,
    LargeIcon,
    AnimatedPng,
    AnimatedGif,
    Composite,
    Mp4,
    Webm,
}

impl Step {
    pub const fn name(self) -> &'static str {
        match self {
            Step::MediumCopy => "medium copy",
            Step::SmallCopy => "small copy",
            Step::JpgCopy => "jpg copy",
            Step::SmallIcon => "small icon",
            Step::MediumIcon => "medium icon",
            Step::LargeIcon => "large icon",
            Step::AnimatedPng => "animated png",
            Step::AnimatedGif => "animated gif",
            Step::Composite => "composite",
            Step::Mp4 => "mp4",
            Step::Webm => "webm",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully specified external command. `output` is the file it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub step: Step,
    pub program: String,
    pub args: Vec<OsString>,
    pub output: PathBuf,
}

impl ToolCommand {
    fn new(step: Step, program: &str, output: PathBuf) -> Self {
        Self {
            step,
            program: program.to_string(),
            args: Vec::new(),
            output,
        }
    }

    fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Space-joined rendering for logs and error messages.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs tool commands.
///
/// `run` only fails when the process cannot be started; `execute` also
/// turns a non-zero exit into [`CardConvertError::Command`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;

    fn execute(&self, command: &ToolCommand) -> Result<ToolOutput> {
        tracing::debug!(step = %command.step, "Executing: {}", command.command_line());
        let output = self.run(command)?;
        if !output.success() {
            return Err(CardConvertError::Command {
                step: command.step,
                command: command.command_line(),
                code: output.code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

/// Spawns the real binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CardConvertError::ToolSpawn {
                program: command.program.clone(),
                source: e,
            })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// ImageMagick command producing the static copy for `kind`.
///
/// Returns `None` for kinds that are not a single resize of the static image.
/// The jpg copy replaces the extension of `output` with `.jpg`.
pub fn static_copy(
    tools: &Tools,
    kind: OutputKind,
    input: &Path,
    output: &Path,
) -> Option<ToolCommand> {
    let (step, size) = match kind {
        OutputKind::Medium => (Step::MediumCopy, MEDIUM_SIZE),
        OutputKind::Small => (Step::SmallCopy, SMALL_SIZE),
        OutputKind::SmallIcon => (Step::SmallIcon, SMALL_ICON_SIZE),
        OutputKind::MediumIcon => (Step::MediumIcon, MEDIUM_ICON_SIZE),
        OutputKind::LargeIcon => (Step::LargeIcon, LARGE_ICON_SIZE),
        OutputKind::MediumJpg => return Some(jpg_copy(tools, input, output)),
        _ => return None,
    };

    Some(
        ToolCommand::new(step, &tools.convert, output.to_path_buf())
            .arg(input)
            .args(["-filter", "lanczos", "-resize", size, "-unsharp", UNSHARP])
            .arg(output),
    )
}

fn jpg_copy(tools: &Tools, input: &Path, output: &Path) -> ToolCommand {
    let output = output.with_extension("jpg");
    ToolCommand::new(Step::JpgCopy, &tools.convert, output.clone())
        .arg(input)
        .args(["-background", JPG_BACKGROUND, "-layers", "flatten"])
        .args(["-filter", "lanczos", "-resize", MEDIUM_SIZE, "+repage"])
        .args(["-gravity", "south", "-crop", JPG_CROP, "+repage"])
        .args(["-unsharp", UNSHARP, "-quality", JPG_QUALITY])
        .arg(output)
}

pub fn animated_png(tools: &Tools, output: &Path, frames: &[PathBuf]) -> ToolCommand {
    ToolCommand::new(Step::AnimatedPng, &tools.apngasm, output.to_path_buf())
        .arg(output)
        .args(frames)
}

pub fn animated_gif(tools: &Tools, apng: &Path, output: &Path) -> ToolCommand {
    ToolCommand::new(Step::AnimatedGif, &tools.apng2gif, output.to_path_buf())
        .arg(apng)
        .arg(output)
}

/// Places `frame` on `background`, or just re-encodes it when there is none.
pub fn composite_frame(
    tools: &Tools,
    background: Option<&Path>,
    frame: &Path,
    output: &Path,
) -> ToolCommand {
    let command = ToolCommand::new(Step::Composite, &tools.convert, output.to_path_buf());
    match background {
        Some(background) => command
            .arg(background)
            .arg(frame)
            .args(["-gravity", "center", "-composite"])
            .arg(output),
        None => command.arg(frame).arg(output),
    }
}

/// Encodes a numbered frame sequence (`pattern` uses `%04d`) with ffmpeg.
///
/// Only [`Step::Mp4`] and [`Step::Webm`] are meaningful here.
pub fn encode_video(
    tools: &Tools,
    step: Step,
    pattern: &Path,
    framerate: u32,
    output: &Path,
) -> ToolCommand {
    let command = ToolCommand::new(step, &tools.ffmpeg, output.to_path_buf())
        .args(["-y", "-f", "image2", "-framerate"])
        .arg(framerate.to_string())
        .arg("-i")
        .arg(pattern);
    let command = if step == Step::Mp4 {
        command.args(["-profile:v", "baseline", "-level", "3.0", "-pix_fmt", "yuv420p"])
    } else {
        command
    };
    command.arg(output)
}

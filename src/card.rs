use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::card_type::CardType;
use crate::commands::{self, CommandRunner, Step};
use crate::config::{CardTypeConfig, Config, OutputKind};
use crate::crawler::CardFiles;
use crate::errors::{CardConvertError, Result};

/// Static copies in the order they are produced.
const STATIC_KINDS: [OutputKind; 6] = [
    OutputKind::Medium,
    OutputKind::Small,
    OutputKind::MediumJpg,
    OutputKind::SmallIcon,
    OutputKind::MediumIcon,
    OutputKind::LargeIcon,
];

const ANIMATION_TEMP: &str = "animation_temp";

/// One card under one card-type rule set. This is the unit of work the
/// dispatcher hands to a worker.
#[derive(Debug, Clone)]
pub struct Card<'a> {
    pub name: String,
    pub locale: String,
    pub card_type: CardType,
    pub files: CardFiles,
    rules: &'a CardTypeConfig,
    config: &'a Config,
}

impl<'a> Card<'a> {
    pub fn new(
        name: String,
        locale: String,
        card_type: CardType,
        files: CardFiles,
        config: &'a Config,
    ) -> Result<Self> {
        let rules = config.card_type(card_type)?;
        Ok(Self {
            name,
            locale,
            card_type,
            files,
            rules,
            config,
        })
    }

    /// Runs every configured step and returns the files written.
    ///
    /// The first failing step stops the remaining ones.
    pub fn process<R: CommandRunner + ?Sized>(
        &self,
        output_dir: &Path,
        backgrounds: &Path,
        runner: &R,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        self.make_output_folders(output_dir)?;

        if self.rules.wants(OutputKind::Original) {
            written.push(self.copy_original(output_dir)?);
        }

        for kind in STATIC_KINDS {
            if !self.rules.wants(kind) {
                continue;
            }
            let output = self.output_path(output_dir, kind)?;
            if let Some(command) =
                commands::static_copy(&self.config.tools, kind, &self.files.static_path, &output)
            {
                runner.execute(&command)?;
                written.push(command.output);
            }
        }

        let wants_animation = self.rules.outputs.iter().any(|k| k.needs_frames());
        if wants_animation && self.files.animated.is_empty() {
            tracing::info!("No animation for {}", self.name);
            return Ok(written);
        }

        if self.rules.wants(OutputKind::Animation) {
            written.push(self.make_animation(output_dir, runner)?);
        }

        if self.rules.wants(OutputKind::Mp4) || self.rules.wants(OutputKind::Webm) {
            written.extend(self.make_web_formats(output_dir, backgrounds, runner)?);
        }

        Ok(written)
    }

    fn locale_dir(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.card_type.as_str()).join(&self.locale)
    }

    fn file_name(&self) -> Result<&std::ffi::OsStr> {
        self.files
            .static_path
            .file_name()
            .ok_or_else(|| CardConvertError::Validation {
                field: "static_path".to_string(),
                reason: format!("{:?} has no file name", self.files.static_path),
            })
    }

    /// `<output>/<card_type>/<locale>/<kind folder>/<static file name>`
    pub fn output_path(&self, output_dir: &Path, kind: OutputKind) -> Result<PathBuf> {
        Ok(self
            .locale_dir(output_dir)
            .join(kind.folder())
            .join(self.file_name()?))
    }

    fn make_output_folders(&self, output_dir: &Path) -> Result<()> {
        for kind in &self.rules.outputs {
            let path = self.locale_dir(output_dir).join(kind.folder());
            tracing::debug!("Creating folder: {}", path.display());
            fs::create_dir_all(&path)
                .map_err(|e| CardConvertError::file_system(&path, "create output folder", e))?;
        }
        Ok(())
    }

    fn copy_original(&self, output_dir: &Path) -> Result<PathBuf> {
        let input = &self.files.static_path;
        let output = self.output_path(output_dir, OutputKind::Original)?;
        fs::copy(input, &output)
            .map_err(|e| CardConvertError::file_system(&output, "copy original", e))?;
        tracing::debug!("Copied {} ---> {}", input.display(), output.display());
        Ok(output)
    }

    /// Assembles the frames into an animated PNG, converts it to a GIF, and
    /// removes the intermediate PNG.
    fn make_animation<R: CommandRunner + ?Sized>(
        &self,
        output_dir: &Path,
        runner: &R,
    ) -> Result<PathBuf> {
        let apng = self
            .output_path(output_dir, OutputKind::Animation)?
            .with_extension("png");
        let gif = apng.with_extension("gif");
        let tools = &self.config.tools;

        runner.execute(&commands::animated_png(tools, &apng, &self.files.animated))?;
        runner.execute(&commands::animated_gif(tools, &apng, &gif))?;

        tracing::debug!("Removing input png file: {}", apng.display());
        fs::remove_file(&apng)
            .map_err(|e| CardConvertError::file_system(&apng, "remove intermediate png", e))?;
        Ok(gif)
    }

    fn make_web_formats<R: CommandRunner + ?Sized>(
        &self,
        output_dir: &Path,
        backgrounds: &Path,
        runner: &R,
    ) -> Result<Vec<PathBuf>> {
        let background = self.rules.background(backgrounds);
        if let Some(background) = &background {
            if !background.is_file() {
                return Err(CardConvertError::file_system(
                    background,
                    "background lookup",
                    std::io::Error::new(std::io::ErrorKind::NotFound, "background not found"),
                ));
            }
        }

        let temp_dir = self
            .locale_dir(output_dir)
            .join(ANIMATION_TEMP)
            .join(&self.name);
        fs::create_dir_all(&temp_dir)
            .map_err(|e| CardConvertError::file_system(&temp_dir, "create frame folder", e))?;

        let encoded = self.encode_frames(&temp_dir, background.as_deref(), output_dir, runner);

        let removed = fs::remove_dir_all(&temp_dir);
        match (encoded, removed) {
            (Ok(written), Ok(())) => Ok(written),
            (Ok(_), Err(e)) => Err(CardConvertError::file_system(
                &temp_dir,
                "remove frame folder",
                e,
            )),
            (Err(err), removed) => {
                if let Err(e) = removed {
                    tracing::warn!("Failed to remove {}: {}", temp_dir.display(), e);
                }
                Err(err)
            }
        }
    }

    /// Frames are numbered without the card name, which may contain `%`.
    fn encode_frames<R: CommandRunner + ?Sized>(
        &self,
        temp_dir: &Path,
        background: Option<&Path>,
        output_dir: &Path,
        runner: &R,
    ) -> Result<Vec<PathBuf>> {
        let tools = &self.config.tools;
        for (index, frame) in self.files.animated.iter().enumerate() {
            let target = temp_dir.join(format!("ff_{:04}.png", index));
            runner.execute(&commands::composite_frame(tools, background, frame, &target))?;
        }

        let pattern = temp_dir.join("ff_%04d.png");
        let base = self.output_path(output_dir, OutputKind::Animation)?;

        let mut written = Vec::new();
        for (kind, step, extension) in [
            (OutputKind::Mp4, Step::Mp4, "mp4"),
            (OutputKind::Webm, Step::Webm, "webm"),
        ] {
            if !self.rules.wants(kind) {
                continue;
            }
            let output = base.with_extension(extension);
            let command =
                commands::encode_video(tools, step, &pattern, self.config.framerate, &output);
            runner.execute(&command)?;
            written.push(output);
        }
        Ok(written)
    }
}

impl fmt::Display for Card<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}::{}",
            self.name,
            self.locale,
            self.files.static_path.display()
        )
    }
}

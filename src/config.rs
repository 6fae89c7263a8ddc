use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::card_type::CardType;
use crate::errors::{CardConvertError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/CardConvert.yaml";

/// Conversion settings loaded from `CardConvert.yaml`.
///
/// Loaded once at startup and shared read-only by every worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub processes: Option<usize>,

    #[serde(default)]
    pub locale: Vec<String>,

    #[serde(default = "default_framerate")]
    pub framerate: u32,

    #[serde(default)]
    pub tools: Tools,

    pub card_types: BTreeMap<CardType, CardTypeConfig>,
}

/// Rules for one card type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardTypeConfig {
    /// Folder under the input path holding this type's cards.
    pub unity_folder: String,

    /// Pattern separating the card name from the frame counter.
    pub frame_re: String,

    /// Name of the sub-folder holding animation frames.
    pub anim_folder: String,

    pub outputs: Vec<OutputKind>,

    /// Background file name, looked up in the backgrounds folder.
    #[serde(default)]
    pub composite: Option<String>,
}

/// Binary names of the external tools. Resolved through `PATH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tools {
    pub convert: String,
    pub apngasm: String,
    pub apng2gif: String,
    pub ffmpeg: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            convert: "convert".to_string(),
            apngasm: "apngasm".to_string(),
            apng2gif: "apng2gif".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "small")]
    Small,
    #[serde(rename = "mediumj")]
    MediumJpg,
    #[serde(rename = "icons/small")]
    SmallIcon,
    #[serde(rename = "icons/medium")]
    MediumIcon,
    #[serde(rename = "icons/large")]
    LargeIcon,
    #[serde(rename = "animation")]
    Animation,
    #[serde(rename = "mp4")]
    Mp4,
    #[serde(rename = "webm")]
    Webm,
}

impl OutputKind {
    /// Folder, relative to `<output>/<card_type>/<locale>`, this kind writes into.
    pub const fn folder(self) -> &'static str {
        match self {
            OutputKind::Original => "original",
            OutputKind::Medium => "medium",
            OutputKind::Small => "small",
            OutputKind::MediumJpg => "mediumj",
            OutputKind::SmallIcon => "icons/small",
            OutputKind::MediumIcon => "icons/medium",
            OutputKind::LargeIcon => "icons/large",
            OutputKind::Animation | OutputKind::Mp4 | OutputKind::Webm => "animation",
        }
    }

    pub const fn needs_frames(self) -> bool {
        matches!(
            self,
            OutputKind::Animation | OutputKind::Mp4 | OutputKind::Webm
        )
    }
}

const fn default_framerate() -> u32 {
    11
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| CardConvertError::Configuration {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        let config = Self::from_yaml(&contents).map_err(|e| match e {
            CardConvertError::Configuration { message } => CardConvertError::Configuration {
                message: format!("{}: {}", path.display(), message),
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(contents).map_err(|e| CardConvertError::Configuration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.processes == Some(0) {
            return Err(CardConvertError::Validation {
                field: "processes".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        for (card_type, rules) in &self.card_types {
            if rules.anim_folder.is_empty() {
                return Err(CardConvertError::Validation {
                    field: format!("card_types.{}.anim_folder", card_type),
                    reason: "must not be empty".to_string(),
                });
            }
            rules.frame_regex().map_err(|e| CardConvertError::Validation {
                field: format!("card_types.{}.frame_re", card_type),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn card_type(&self, card_type: CardType) -> Result<&CardTypeConfig> {
        self.card_types
            .get(&card_type)
            .ok_or_else(|| CardConvertError::Configuration {
                message: format!("no rules for card type `{}`", card_type),
            })
    }

    /// Pool size when neither the command line nor the file sets one.
    pub fn default_processes() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

impl CardTypeConfig {
    pub fn frame_regex(&self) -> std::result::Result<Regex, regex::Error> {
        Regex::new(&self.frame_re)
    }

    pub fn wants(&self, kind: OutputKind) -> bool {
        self.outputs.contains(&kind)
    }

    /// Background path for compositing, if this type has one.
    pub fn background(&self, backgrounds: &Path) -> Option<PathBuf> {
        self.composite.as_ref().map(|name| backgrounds.join(name))
    }
}

/// Backgrounds folder used when none is given: `backgrounds/` beside the
/// folder that holds the config file.
pub fn default_backgrounds_folder(config_path: &Path) -> PathBuf {
    let config_dir = config_path.parent().unwrap_or(Path::new(""));
    config_dir
        .parent()
        .unwrap_or(Path::new(""))
        .join("backgrounds")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
processes: 2
locale: [enUS, esES]
card_types:
  cards:
    unity_folder: Cards
    frame_re: "_\\d+$"
    anim_folder: animated
    outputs: [original, medium, small, mediumj, icons/small, animation]
  cardbacks:
    unity_folder: CardBacks
    frame_re: "_\\d+$"
    anim_folder: animated
    outputs: [original, animation, mp4, webm]
    composite: cardback_bg.png
"#;

    #[test]
    fn test_parse_sample() -> Result<()> {
        let config = Config::from_yaml(SAMPLE)?;

        assert_eq!(config.processes, Some(2));
        assert_eq!(config.locale, vec!["enUS", "esES"]);
        assert_eq!(config.framerate, 11);
        assert_eq!(config.tools, Tools::default());

        let cards = config.card_type(CardType::Cards)?;
        assert_eq!(cards.unity_folder, "Cards");
        assert!(cards.wants(OutputKind::SmallIcon));
        assert!(!cards.wants(OutputKind::Mp4));
        assert_eq!(cards.composite, None);

        let cardbacks = config.card_type(CardType::Cardbacks)?;
        assert_eq!(
            cardbacks.background(Path::new("/bg")),
            Some(PathBuf::from("/bg/cardback_bg.png"))
        );
        Ok(())
    }

    #[test]
    fn test_missing_card_type() -> Result<()> {
        let config = Config::from_yaml(SAMPLE)?;
        let err = config.card_type(CardType::Heroes).unwrap_err();
        assert!(matches!(err, CardConvertError::Configuration { .. }));
        Ok(())
    }

    #[test]
    fn test_invalid_frame_regex() {
        let yaml = r#"
card_types:
  heroes:
    unity_folder: Heroes
    frame_re: "(["
    anim_folder: animated
    outputs: [original]
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        match err {
            CardConvertError::Validation { field, .. } => {
                assert_eq!(field, "card_types.heroes.frame_re")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_processes_rejected() {
        let yaml = "processes: 0\ncard_types: {}\n";
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(CardConvertError::Validation { .. })
        ));
    }

    #[test]
    fn test_unknown_output_kind_rejected() {
        let yaml = r#"
card_types:
  cards:
    unity_folder: Cards
    frame_re: "_\\d+$"
    anim_folder: animated
    outputs: [thumbnail]
"#;
        assert!(matches!(
            Config::from_yaml(yaml),
            Err(CardConvertError::Configuration { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.yaml");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("CardConvert.yaml");
        fs::write(&path, SAMPLE)?;

        let config = Config::load(&path)?;
        assert_eq!(config.card_types.len(), 2);
        Ok(())
    }

    #[test]
    fn test_default_backgrounds_folder() {
        assert_eq!(
            default_backgrounds_folder(Path::new("/opt/cc/config/CardConvert.yaml")),
            PathBuf::from("/opt/cc/backgrounds")
        );
    }

    #[test]
    fn test_output_folders() {
        assert_eq!(OutputKind::SmallIcon.folder(), "icons/small");
        assert_eq!(OutputKind::Mp4.folder(), "animation");
        assert!(OutputKind::Webm.needs_frames());
        assert!(!OutputKind::MediumJpg.needs_frames());
    }
}

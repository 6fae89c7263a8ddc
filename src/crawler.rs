use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use regex::Regex;
use walkdir::WalkDir;

/// Files making up one card: the static image and its animation frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFiles {
    pub static_path: PathBuf,
    pub animated: Vec<PathBuf>,
}

/// Collects the cards under `target_dir`, keyed by card name.
///
/// Static images are files outside any `anim_folder` directory and are named
/// by their file stem. Frames live in `anim_folder` directories; a frame's
/// card name is the part of its stem before `frame_re`. Frames without a
/// matching static image are dropped.
pub fn crawl(
    target_dir: &Path,
    frame_re: &Regex,
    anim_folder: &str,
) -> BTreeMap<String, CardFiles> {
    let mut cards = BTreeMap::new();
    if !target_dir.is_dir() {
        return cards;
    }

    let entries = WalkDir::new(target_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !is_hidden(e.path()))
        .filter(|e| ImageFormat::from_path(e.path()).is_ok());

    // frames are attached once every static image is known
    let mut frames = Vec::new();
    for entry in entries {
        let path = entry.into_path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let stem = stem.to_string();

        if in_anim_folder(&path, anim_folder) {
            frames.push((card_name_of_frame(&stem, frame_re), path));
        } else {
            cards.entry(stem).or_insert_with(|| CardFiles {
                static_path: path,
                animated: Vec::new(),
            });
        }
    }

    for (name, path) in frames {
        if let Some(card) = cards.get_mut(&name) {
            card.animated.push(path);
        } else {
            tracing::debug!(frame = %path.display(), "frame without static image");
        }
    }

    cards
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn in_anim_folder(path: &Path, anim_folder: &str) -> bool {
    path.parent()
        .and_then(|p| p.file_name())
        .is_some_and(|n| n == anim_folder)
}

fn card_name_of_frame(stem: &str, frame_re: &Regex) -> String {
    frame_re.split(stem).next().unwrap_or(stem).to_string()
}

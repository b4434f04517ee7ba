//! Chapter discovery: enumerate staged folders, parse and resolve their
//! names, and attach each chapter's page images in natural order.

use crate::chapter_name::parse_chapter_name;
use crate::name_map::{resolve, NameIdMap, ResolveKind};
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// A chapter ready for validation and upload. Title and group IDs are
/// resolved platform IDs; `images` is in natural reading order.
#[derive(Debug, Clone)]
pub struct ChapterDescriptor {
    pub source_path: PathBuf,
    pub title_id: String,
    pub group_ids: Vec<String>,
    pub language: String,
    pub chapter: Option<String>,
    pub volume: Option<String>,
    pub chapter_title: Option<String>,
    pub publish_date: Option<String>,
    pub is_oneshot: bool,
    pub images: Vec<PathBuf>,
}

/// Check if a file is a recognized page image
fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn stem_of(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
}

/// First run of decimal digits in a filename stem, if any
fn first_digit_run(stem: &str) -> Option<u64> {
    let digits: String = stem
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        // Absurdly long runs saturate rather than fail the sort
        Some(digits.parse().unwrap_or(u64::MAX))
    }
}

/// Natural page order: embedded numbers compare numerically when both stems
/// have one, case-insensitive string order otherwise (and for ties).
pub fn natural_cmp(a: &Path, b: &Path) -> Ordering {
    let (stem_a, stem_b) = (stem_of(a), stem_of(b));
    match (first_digit_run(stem_a), first_digit_run(stem_b)) {
        (Some(num_a), Some(num_b)) if num_a != num_b => num_a.cmp(&num_b),
        _ => stem_a.to_lowercase().cmp(&stem_b.to_lowercase()),
    }
}

/// List and naturally order the page images of one chapter folder.
/// An unreadable folder yields an empty list; downstream validation decides.
fn list_chapter_images(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to read directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut images: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    images.sort_by(|a, b| natural_cmp(a, b));
    images
}

/// Enumerate top-level entries under `root` and build a descriptor for every
/// folder whose name parses and resolves. Parse and resolution failures skip
/// the folder with a log line; they never fail the run.
pub fn discover(root: &Path, map: &NameIdMap) -> io::Result<Vec<ChapterDescriptor>> {
    let mut chapters = Vec::new();

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let raw_name = file_name.to_string_lossy().to_string();
        // Extension stripped before parsing, so archive-named folders work too
        let stem = Path::new(&file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&raw_name)
            .to_string();

        let Some(parsed) = parse_chapter_name(&stem) else {
            warn!("Skipped (name does not match grammar): {}", raw_name);
            continue;
        };

        let Some(title_id) = resolve(ResolveKind::Title, &parsed.title, map) else {
            warn!("Skipped {}: unresolved title '{}'", raw_name, parsed.title);
            continue;
        };

        let mut group_ids = Vec::with_capacity(parsed.groups.len());
        let mut unresolved_group = None;
        for group in &parsed.groups {
            match resolve(ResolveKind::Group, group, map) {
                Some(id) => group_ids.push(id),
                None => {
                    unresolved_group = Some(group.clone());
                    break;
                }
            }
        }
        if let Some(group) = unresolved_group {
            warn!("Skipped {}: unresolved group '{}'", raw_name, group);
            continue;
        }

        let source_path = entry.path();
        let images = list_chapter_images(&source_path);
        if images.is_empty() {
            warn!("No images found in: {}", source_path.display());
        }

        info!("Parsed: {} ({} page(s))", raw_name, images.len());

        chapters.push(ChapterDescriptor {
            source_path,
            title_id,
            group_ids,
            language: parsed.language,
            chapter: parsed.chapter,
            volume: parsed.volume,
            chapter_title: parsed.chapter_title,
            publish_date: parsed.publish_date,
            is_oneshot: parsed.is_oneshot,
            images,
        });
    }

    Ok(chapters)
}

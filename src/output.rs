//! CLI output formatting for all admin commands.
//!
//! # Information-First Display
//!
//! Every entity (site image, gallery image) leads with its position and its
//! human identity. Raw sources are secondary context on indented lines, and
//! embedded `data:` sources are summarised by type and size instead of being
//! dumped.
//!
//! # Output Format
//!
//! ## Settings
//!
//! ```text
//! Profile photo
//!     https://images.unsplash.com/photo-1507003211169-...
//! Logo
//!     (none)
//! Portfolio
//! 001 embedded image/jpeg, 182.4 KB
//! 002 (unfilled)
//! ```
//!
//! ## Gallery
//!
//! ```text
//! 001 wedding-01.jpg [wedding] (selected)
//!     Id: 1718000000000-9f2c41d0
//!     2.31 MB • 2024-06-10
//!
//! 1 image, 1 selected
//! ```
//!
//! ## Upload
//!
//! ```text
//! [ 50%] Processing a.jpg...
//!     a.jpg (1.2 KB)
//! [100%] Processing b.png...
//!     b.png (840 Bytes)
//! Successfully uploaded 2 images!
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::gallery::{GalleryImage, GalleryStats, Selection};
use crate::render::ApplyReport;
use crate::settings::{ImageRef, ImageSettings, Slot};
use crate::types::{Notice, NoticeLevel, Outcome};
use crate::upload::UploadEvent;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable size: `0 Bytes`, `1 KB`, `1.5 KB`, `2.31 MB`.
///
/// Two decimals at most, trailing zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, UNITS[unit])
}

/// One-line description of an image source.
///
/// ```text
/// https://example.com/logo.png       // remote, shown as-is
/// embedded image/png, 1.5 KB         // data URL, summarised
/// ```
fn describe_source(src: &ImageRef) -> String {
    if !src.is_embedded() {
        return src.as_str().to_string();
    }
    let media_type = src.media_type().unwrap_or("data");
    match src.embedded_len() {
        Some(len) => format!("embedded {}, {}", media_type, format_file_size(len as u64)),
        None => format!("embedded {}", media_type),
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Format the current image settings.
pub fn format_settings(settings: &ImageSettings) -> Vec<String> {
    let mut lines = vec![
        "Profile photo".to_string(),
        format!("{}{}", indent(1), describe_source(&settings.profile_photo)),
        "Logo".to_string(),
    ];
    match &settings.logo {
        Some(logo) => lines.push(format!("{}{}", indent(1), describe_source(logo))),
        None => lines.push(format!("{}(none)", indent(1))),
    }
    lines.push("Portfolio".to_string());
    for slot in Slot::all() {
        let value = settings
            .slot(slot)
            .map(describe_source)
            .unwrap_or_else(|| "(unfilled)".to_string());
        lines.push(format!("{} {}", format_index(slot.number()), value));
    }
    lines
}

pub fn print_settings(settings: &ImageSettings) {
    for line in format_settings(settings) {
        println!("{}", line);
    }
}

// ============================================================================
// Gallery
// ============================================================================

/// `N image(s), M selected`.
pub fn format_stats(stats: GalleryStats) -> String {
    let plural = if stats.total == 1 { "" } else { "s" };
    format!("{} image{}, {} selected", stats.total, plural, stats.selected)
}

/// Format the visible gallery images followed by the stats line.
pub fn format_gallery(
    images: &[&GalleryImage],
    selection: &Selection,
    stats: GalleryStats,
) -> Vec<String> {
    if images.is_empty() {
        return vec!["No images found. Upload some images to get started!".to_string()];
    }
    let mut lines = Vec::new();
    for (i, image) in images.iter().enumerate() {
        let marker = if selection.contains(&image.id) {
            " (selected)"
        } else {
            ""
        };
        lines.push(format!(
            "{} {} [{}]{}",
            format_index(i + 1),
            image.name,
            image.category,
            marker
        ));
        lines.push(format!("{}Id: {}", indent(1), image.id));
        lines.push(format!(
            "{}{} \u{2022} {}",
            indent(1),
            format_file_size(image.size),
            image.upload_date.format("%Y-%m-%d")
        ));
    }
    lines.push(String::new());
    lines.push(format_stats(stats));
    lines
}

pub fn print_gallery(images: &[&GalleryImage], selection: &Selection, stats: GalleryStats) {
    for line in format_gallery(images, selection, stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Upload progress
// ============================================================================

/// Format a single upload progress event as display lines.
pub fn format_upload_event(event: &UploadEvent) -> Vec<String> {
    match event {
        UploadEvent::Started { .. } => {
            let percent = (event.fraction() * 100.0).round() as u32;
            vec![format!("[{:>3}%] {}", percent, event.status())]
        }
        UploadEvent::Completed { name, size, .. } => {
            vec![format!("{}{} ({})", indent(1), name, format_file_size(*size))]
        }
        UploadEvent::BatchCompleted { .. } => vec![event.status()],
    }
}

// ============================================================================
// Notices and reports
// ============================================================================

pub fn format_notice(notice: &Notice) -> String {
    match notice.level {
        NoticeLevel::Warning => format!("warning: {}", notice.message),
        NoticeLevel::Info | NoticeLevel::Success => notice.message.clone(),
    }
}

pub fn print_notice(notice: &Notice) {
    println!("{}", format_notice(notice));
}

pub fn format_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Done(notice) => format_notice(notice),
        Outcome::Cancelled => "Cancelled.".to_string(),
    }
}

pub fn print_outcome(outcome: &Outcome) {
    println!("{}", format_outcome(outcome));
}

/// Summary of a render pass over a page.
pub fn format_apply_report(report: &ApplyReport) -> String {
    format!(
        "Applied {} profile, {} logo, {} portfolio ({} changed)",
        report.profile, report.logo, report.portfolio, report.changed
    )
}

// ============================================================================
// Tests
// ============================================================================

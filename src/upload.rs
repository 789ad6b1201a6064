//! Upload pipeline: raw files → embedded image data → gallery records.
//!
//! Files come from a picker (paths on disk), a directory walk, or a drop
//! (in-memory bytes). Only image-typed inputs survive filtering; if none do,
//! the whole batch is rejected with [`UploadError::NoImages`] and nothing is
//! read.
//!
//! Files are processed strictly one after another. Each file is read, encoded
//! as a `data:<mime>;base64,...` URL, and turned into a [`GalleryImage`]. The
//! caller receives the whole batch at the end and appends it to the gallery
//! in one write, so the stored order always matches the input order.
//!
//! ## Progress
//!
//! Pass a `Sender<UploadEvent>` to observe the batch:
//!
//! ```text
//! Started   { index: 1, total: 2, name: "a.jpg" }   "Processing a.jpg..."  50%
//! Completed { completed: 1, total: 2, ... }
//! Started   { index: 2, total: 2, name: "b.png" }   "Processing b.png..." 100%
//! Completed { completed: 2, total: 2, ... }
//! BatchCompleted { count: 2 }
//! ```

use crate::gallery::{Category, GalleryImage, ImageId};
use crate::settings::ImageRef;
use base64::Engine as _;
use chrono::Utc;
use image::ImageFormat;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Please select image files only.")]
    NoImages,
    #[error("No file selected.")]
    NoFile,
    #[error("Not an image file: {0}")]
    NotAnImage(String),
}

const FALLBACK_MIME: &str = "application/octet-stream";

/// Bytes sniffed when the file name does not reveal the format.
const SNIFF_LEN: u64 = 64;

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A file-like upload input with its metadata.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    source: Source,
}

impl FileInput {
    /// Describe a file on disk. The content is not read yet.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let size = fs::metadata(path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = match mime_from_name(&name) {
            Some(mime) => mime.to_string(),
            None => {
                let mut head = Vec::new();
                fs::File::open(path)?
                    .take(SNIFF_LEN)
                    .read_to_end(&mut head)?;
                mime_from_bytes(&head).unwrap_or(FALLBACK_MIME).to_string()
            }
        };
        Ok(Self {
            name,
            mime_type,
            size,
            source: Source::Path(path.to_path_buf()),
        })
    }

    /// An in-memory file, as delivered by a drop.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_from_name(&name)
            .or_else(|| mime_from_bytes(&bytes))
            .unwrap_or(FALLBACK_MIME)
            .to_string();
        Self {
            name,
            mime_type,
            size: bytes.len() as u64,
            source: Source::Bytes(bytes),
        }
    }

    /// Override the detected type with the one the picker reported.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn read(&self) -> Result<Vec<u8>, UploadError> {
        match &self.source {
            Source::Path(path) => Ok(fs::read(path)?),
            Source::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    /// Read the content and embed it as a `data:` URL.
    pub fn read_as_data_url(&self) -> Result<ImageRef, UploadError> {
        let bytes = self.read()?;
        Ok(embed(&self.mime_type, &bytes))
    }
}

fn mime_from_name(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("svg") {
        return Some("image/svg+xml");
    }
    ImageFormat::from_extension(ext).map(|f| f.to_mime_type())
}

fn mime_from_bytes(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|f| f.to_mime_type())
}

/// Encode raw bytes as a self-contained `data:` URL.
pub fn embed(mime_type: &str, bytes: &[u8]) -> ImageRef {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    ImageRef::data_url(mime_type, &payload)
}

/// All regular files below `dir`, sorted by name within each directory.
///
/// Hidden files are skipped. Non-image files are kept; [`ingest`] filters them.
pub fn collect_dir(dir: &Path) -> Result<Vec<FileInput>, UploadError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        files.push(FileInput::from_path(entry.path())?);
    }
    Ok(files)
}

/// The first dropped file, if it is an image. The rest of a drop is ignored.
pub fn first_dropped_image(files: Vec<FileInput>) -> Result<FileInput, UploadError> {
    let file = files.into_iter().next().ok_or(UploadError::NoFile)?;
    if file.is_image() {
        Ok(file)
    } else {
        Err(UploadError::NotAnImage(file.name))
    }
}

/// Progress of a batch ingest.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Started {
        index: usize,
        total: usize,
        name: String,
    },
    Completed {
        completed: usize,
        total: usize,
        name: String,
        size: u64,
    },
    BatchCompleted {
        count: usize,
    },
}

impl UploadEvent {
    /// Completed share of the batch, 0.0..=1.0.
    pub fn fraction(&self) -> f64 {
        match self {
            UploadEvent::Started { index, total, .. } => *index as f64 / *total as f64,
            UploadEvent::Completed {
                completed, total, ..
            } => *completed as f64 / *total as f64,
            UploadEvent::BatchCompleted { .. } => 1.0,
        }
    }

    /// Human-readable status line.
    pub fn status(&self) -> String {
        match self {
            UploadEvent::Started { name, .. } => format!("Processing {name}..."),
            UploadEvent::Completed { name, .. } => format!("Processed {name}"),
            UploadEvent::BatchCompleted { count } => {
                format!("Successfully uploaded {count} images!")
            }
        }
    }
}

/// Turn a batch of inputs into gallery records, one file at a time.
pub fn ingest(
    files: Vec<FileInput>,
    progress: Option<Sender<UploadEvent>>,
) -> Result<Vec<GalleryImage>, UploadError> {
    let files: Vec<FileInput> = files.into_iter().filter(FileInput::is_image).collect();
    if files.is_empty() {
        return Err(UploadError::NoImages);
    }

    let emit = |event: UploadEvent| {
        if let Some(tx) = &progress {
            let _ = tx.send(event);
        }
    };

    let total = files.len();
    let mut images = Vec::with_capacity(total);
    for (i, file) in files.into_iter().enumerate() {
        emit(UploadEvent::Started {
            index: i + 1,
            total,
            name: file.name.clone(),
        });

        let src = file.read_as_data_url()?;
        let now = Utc::now();
        debug!(name = %file.name, size = file.size, "embedded upload");

        emit(UploadEvent::Completed {
            completed: i + 1,
            total,
            name: file.name.clone(),
            size: file.size,
        });

        images.push(GalleryImage {
            id: ImageId::generate(now),
            name: file.name,
            src,
            category: Category::Other,
            upload_date: now,
            size: file.size,
            mime_type: file.mime_type,
        });
    }

    emit(UploadEvent::BatchCompleted {
        count: images.len(),
    });
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{JPEG_BYTES, PNG_BYTES};
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[test]
    fn mime_from_extension() {
        assert_eq!(FileInput::from_bytes("a.JPG", vec![]).mime_type, "image/jpeg");
        assert_eq!(FileInput::from_bytes("b.png", vec![]).mime_type, "image/png");
        assert_eq!(FileInput::from_bytes("c.webp", vec![]).mime_type, "image/webp");
        assert_eq!(FileInput::from_bytes("logo.svg", vec![]).mime_type, "image/svg+xml");
    }

    #[test]
    fn mime_from_magic_bytes_when_name_is_opaque() {
        let file = FileInput::from_bytes("upload", PNG_BYTES.to_vec());
        assert_eq!(file.mime_type, "image/png");
        assert!(file.is_image());
    }

    #[test]
    fn unknown_content_is_not_an_image() {
        let file = FileInput::from_bytes("notes.txt", b"hello".to_vec());
        assert_eq!(file.mime_type, FALLBACK_MIME);
        assert!(!file.is_image());
    }

    #[test]
    fn picker_type_overrides_detection() {
        let file = FileInput::from_bytes("x.bin", vec![1, 2, 3]).with_mime_type("image/heic");
        assert!(file.is_image());
    }

    #[test]
    fn from_path_reads_metadata_and_sniffs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scan-0001");
        fs::write(&path, JPEG_BYTES).unwrap();
        let file = FileInput::from_path(&path).unwrap();
        assert_eq!(file.name, "scan-0001");
        assert_eq!(file.size, JPEG_BYTES.len() as u64);
        assert_eq!(file.mime_type, "image/jpeg");
    }

    #[test]
    fn embed_produces_type_prefixed_data_url() {
        let src = embed("image/png", b"abc");
        assert_eq!(src.as_str(), "data:image/png;base64,YWJj");
        assert_eq!(src.media_type(), Some("image/png"));
    }

    #[test]
    fn ingest_two_files_in_order() {
        let files = vec![
            FileInput::from_bytes("a.jpg", JPEG_BYTES.to_vec()),
            FileInput::from_bytes("b.png", PNG_BYTES.to_vec()),
        ];
        let images = ingest(files, None).unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].name, "a.jpg");
        assert_eq!(images[1].name, "b.png");
        assert_ne!(images[0].id, images[1].id);
        for image in &images {
            assert_eq!(image.category, Category::Other);
            assert!(image.src.is_embedded());
            assert!(image.src.as_str().len() > "data:image/png;base64,".len());
        }
        assert!(images[0].src.as_str().starts_with("data:image/jpeg;base64,"));
        assert!(images[1].src.as_str().starts_with("data:image/png;base64,"));
        assert_eq!(images[1].size, PNG_BYTES.len() as u64);
        assert_eq!(images[1].mime_type, "image/png");
    }

    #[test]
    fn ingest_skips_non_images() {
        let files = vec![
            FileInput::from_bytes("a.jpg", JPEG_BYTES.to_vec()),
            FileInput::from_bytes("notes.txt", b"text".to_vec()),
            FileInput::from_bytes("b.png", PNG_BYTES.to_vec()),
        ];
        let images = ingest(files, None).unwrap();
        let names: Vec<&str> = images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn ingest_rejects_batch_without_images() {
        let (tx, rx) = mpsc::channel();
        let files = vec![FileInput::from_bytes("notes.txt", b"text".to_vec())];
        assert!(matches!(ingest(files, Some(tx)), Err(UploadError::NoImages)));
        assert!(rx.try_recv().is_err(), "no progress for a rejected batch");
    }

    #[test]
    fn ingest_reports_progress_per_file() {
        let (tx, rx) = mpsc::channel();
        let files = vec![
            FileInput::from_bytes("a.jpg", JPEG_BYTES.to_vec()),
            FileInput::from_bytes("b.png", PNG_BYTES.to_vec()),
        ];
        ingest(files, Some(tx)).unwrap();
        let events: Vec<UploadEvent> = rx.iter().collect();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].status(), "Processing a.jpg...");
        assert_eq!(events[1].fraction(), 0.5);
        assert_eq!(events[2].status(), "Processing b.png...");
        assert_eq!(events[3].fraction(), 1.0);
        assert_eq!(events[4], UploadEvent::BatchCompleted { count: 2 });
        assert_eq!(events[4].status(), "Successfully uploaded 2 images!");
    }

    #[test]
    fn ingest_propagates_read_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.png");
        fs::write(&path, PNG_BYTES).unwrap();
        let file = FileInput::from_path(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(matches!(ingest(vec![file], None), Err(UploadError::Io(_))));
    }

    #[test]
    fn collect_dir_walks_sorted_and_skips_hidden() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("weddings")).unwrap();
        fs::write(tmp.path().join("b.png"), PNG_BYTES).unwrap();
        fs::write(tmp.path().join("a.jpg"), JPEG_BYTES).unwrap();
        fs::write(tmp.path().join(".DS_Store"), b"junk").unwrap();
        fs::write(tmp.path().join("weddings/c.jpg"), JPEG_BYTES).unwrap();
        let names: Vec<String> = collect_dir(tmp.path())
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.jpg"]);
    }

    #[test]
    fn first_dropped_image_uses_only_first_file() {
        let files = vec![
            FileInput::from_bytes("a.jpg", JPEG_BYTES.to_vec()),
            FileInput::from_bytes("b.png", PNG_BYTES.to_vec()),
        ];
        assert_eq!(first_dropped_image(files).unwrap().name, "a.jpg");
    }

    #[test]
    fn first_dropped_image_rejects_non_image_first_file() {
        let files = vec![
            FileInput::from_bytes("notes.txt", b"x".to_vec()),
            FileInput::from_bytes("b.png", PNG_BYTES.to_vec()),
        ];
        assert!(matches!(
            first_dropped_image(files),
            Err(UploadError::NotAnImage(name)) if name == "notes.txt"
        ));
        assert!(matches!(first_dropped_image(vec![]), Err(UploadError::NoFile)));
    }
}

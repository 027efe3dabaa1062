//! Multipart upload body with byte-level progress reporting

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::models::MediaKind;

/// Upload progress callback: (sent_bytes, total_bytes)
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// How long the "upload complete" state stays visible
pub const COMPLETION_LINGER: Duration = Duration::from_millis(1000);

/// A file chosen by the operator for upload
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub kind: Option<MediaKind>,
    pub size: u64,
}

impl SelectedFile {
    /// Inspect a local file; unreadable metadata leaves size at 0
    pub fn inspect(path: &Path) -> Self {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        Self::new(path, size)
    }

    pub fn new(path: &Path, size: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            kind: MediaKind::from_path(path),
            size,
        }
    }
}

/// Visible upload indicator state
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UploadProgress {
    #[default]
    Idle,
    Uploading { sent: u64, total: u64 },
    Completed { at: Instant },
}

impl UploadProgress {
    pub fn fraction(&self) -> Option<f32> {
        match self {
            UploadProgress::Idle => None,
            UploadProgress::Uploading { sent, total } => {
                if *total == 0 {
                    Some(0.0)
                } else {
                    Some((*sent as f64 / *total as f64).min(1.0) as f32)
                }
            }
            UploadProgress::Completed { .. } => Some(1.0),
        }
    }

    /// Whether the completion state has lingered long enough to hide
    pub fn should_hide(&self, now: Instant) -> bool {
        matches!(self, UploadProgress::Completed { at } if now.saturating_duration_since(*at) >= COMPLETION_LINGER)
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "wmv" => "video/x-ms-wmv",
        _ => "application/octet-stream",
    }
}

enum Part {
    Text { name: String, value: String },
    File { name: String, filename: String, content_type: String, path: PathBuf, size: u64 },
}

/// Streaming `multipart/form-data` body with a precomputed length
pub struct MultipartBody {
    boundary: String,
    parts: Vec<Part>,
}

impl MultipartBody {
    pub fn new() -> Self {
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self::with_boundary(&format!("----signage-panel-{:x}", nanos))
    }

    pub fn with_boundary(boundary: &str) -> Self {
        Self { boundary: boundary.to_string(), parts: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.push(Part::Text { name: name.to_string(), value: value.to_string() });
        self
    }

    pub fn file(mut self, name: &str, path: &Path, size: u64) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        self.parts.push(Part::File {
            name: name.to_string(),
            filename,
            content_type: content_type_for(path).to_string(),
            path: path.to_path_buf(),
            size,
        });
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn part_header(&self, part: &Part) -> String {
        match part {
            Part::Text { name, .. } => format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                self.boundary, escape_quotes(name)
            ),
            Part::File { name, filename, content_type, .. } => format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, escape_quotes(name), escape_quotes(filename), content_type
            ),
        }
    }

    fn closing(&self) -> String {
        format!("--{}--\r\n", self.boundary)
    }

    pub fn content_length(&self) -> u64 {
        let parts: u64 = self
            .parts
            .iter()
            .map(|part| {
                let body = match part {
                    Part::Text { value, .. } => value.len() as u64,
                    Part::File { size, .. } => *size,
                };
                self.part_header(part).len() as u64 + body + 2
            })
            .sum();
        parts + self.closing().len() as u64
    }

    /// Open every file and chain the parts into one reader
    pub fn into_reader(self) -> io::Result<Box<dyn Read + Send + Sync>> {
        let mut segments: VecDeque<Box<dyn Read + Send + Sync>> = VecDeque::new();

        for part in &self.parts {
            segments.push_back(Box::new(Cursor::new(self.part_header(part).into_bytes())));
            match part {
                Part::Text { value, .. } => {
                    segments.push_back(Box::new(Cursor::new(value.clone().into_bytes())));
                }
                Part::File { path, size, .. } => {
                    // Bounded by the announced size so Content-Length stays exact
                    let file = File::open(path)?;
                    segments.push_back(Box::new(file.take(*size)));
                }
            }
            segments.push_back(Box::new(Cursor::new(b"\r\n".to_vec())));
        }
        segments.push_back(Box::new(Cursor::new(self.closing().into_bytes())));

        Ok(Box::new(ChainReader { segments }))
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('"', "%22").replace('\r', "").replace('\n', "")
}

struct ChainReader {
    segments: VecDeque<Box<dyn Read + Send + Sync>>,
}

impl Read for ChainReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(front) = self.segments.front_mut() {
            match front.read(buf) {
                Ok(0) => {
                    self.segments.pop_front();
                }
                other => return other,
            }
        }
        Ok(0)
    }
}

/// Reader wrapper that reports how many bytes have been consumed
pub struct ProgressReader<R> {
    inner: R,
    sent: u64,
    total: u64,
    last_percent: Option<u64>,
    callback: ProgressCallback,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, total: u64, callback: ProgressCallback) -> Self {
        Self { inner, sent: 0, total, last_percent: None, callback }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.sent += n as u64;
            // Only report whole-percent steps to keep the UI channel quiet
            let percent = if self.total == 0 { 100 } else { self.sent * 100 / self.total };
            if self.last_percent != Some(percent) {
                self.last_percent = Some(percent);
                (self.callback)(self.sent, self.total);
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("signage_panel_{}_{}", std::process::id(), name));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_multipart_length_matches_stream() {
        let path = temp_file("ad1.jpg", b"\xff\xd8fake-jpeg-bytes\xff\xd9");
        let size = std::fs::metadata(&path).unwrap().len();

        let body = MultipartBody::with_boundary("XYZ")
            .file("file", &path, size)
            .text("duration", "10");
        let expected = body.content_length();

        let mut out = Vec::new();
        body.into_reader().unwrap().read_to_end(&mut out).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(out.len() as u64, expected);
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("name=\"file\"; filename=\""));
        assert!(text.contains("Content-Type: image/jpeg"));
        assert!(text.contains("name=\"duration\"\r\n\r\n10\r\n"));
        assert!(text.ends_with("--XYZ--\r\n"));
    }

    #[test]
    fn test_progress_reader_reaches_total() {
        let reports: Arc<Mutex<Vec<(u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let data = vec![7u8; 10_000];

        let mut reader = ProgressReader::new(
            Cursor::new(data),
            10_000,
            Box::new(move |sent, total| sink.lock().unwrap().push((sent, total))),
        );
        let mut buf = [0u8; 512];
        while reader.read(&mut buf).unwrap() > 0 {}

        let reports = reports.lock().unwrap();
        assert_eq!(reports.last(), Some(&(10_000, 10_000)));
        assert!(reports.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_selected_file_kind() {
        let file = SelectedFile::new(Path::new("/media/promo.MP4"), 2048);
        assert_eq!(file.name, "promo.MP4");
        assert_eq!(file.kind, Some(MediaKind::Video));
        assert_eq!(SelectedFile::new(Path::new("menu.pdf"), 1).kind, None);
    }

    #[test]
    fn test_completion_lingers_before_hiding() {
        let start = Instant::now();
        let done = UploadProgress::Completed { at: start };
        assert_eq!(done.fraction(), Some(1.0));
        assert!(!done.should_hide(start + Duration::from_millis(400)));
        assert!(done.should_hide(start + COMPLETION_LINGER));
        assert!(!UploadProgress::Idle.should_hide(start));
    }
}

//! yt-dlp backed extractor.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use tubevault_models::{FlatEntry, ItemMetadata};

use crate::error::{ExtractError, ExtractResult};
use crate::extractor::Extractor;

/// Cap on sanitized uploader directory names.
const MAX_DIR_NAME_LEN: usize = 80;

/// Extractor shelling out to the yt-dlp binary.
pub struct YtDlp {
    binary: PathBuf,
}

/// Shape of `yt-dlp -J` output for a flat playlist listing.
#[derive(Debug, Deserialize)]
struct FlatListing {
    #[serde(default)]
    entries: Vec<FlatEntry>,
}

impl YtDlp {
    /// Create a new extractor, verifying the binary is on PATH.
    pub fn new() -> ExtractResult<Self> {
        let binary = which::which("yt-dlp").map_err(|_| ExtractError::YtDlpNotFound)?;
        Ok(Self { binary })
    }

    async fn run(&self, args: &[&str]) -> ExtractResult<std::process::Output> {
        debug!("Running yt-dlp {:?}", args);
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;
        Ok(output)
    }
}

fn stderr_tail(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr.lines().last().unwrap_or("Unknown error").to_string()
}

fn parse_listing_json(json: &str) -> ExtractResult<Vec<FlatEntry>> {
    let listing: FlatListing = serde_json::from_str(json)?;
    Ok(listing.entries)
}

fn parse_detail_json(json: &str) -> Option<ItemMetadata> {
    serde_json::from_str::<Option<ItemMetadata>>(json)
        .ok()
        .flatten()
}

/// Sanitize an uploader name into a safe directory component.
///
/// Unsafe characters become underscores, whitespace collapses to single
/// spaces, names are capped and empty/missing names fall back to
/// `unknown`.
pub fn sanitize_dir_name(name: Option<&str>) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^\w\-\.\s]").unwrap());
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").unwrap());

    let s = name.unwrap_or("unknown").trim();
    let s = unsafe_chars.replace_all(s, "_");
    let s = spaces.replace_all(&s, " ");
    let s = s.trim();

    if s.is_empty() {
        return "unknown".to_string();
    }
    s.chars().take(MAX_DIR_NAME_LEN).collect()
}

/// Locate the downloaded file for an item id, preferring `.mp4`.
///
/// The merge format is mp4, but degraded downloads can end up with another
/// container, so scan for any `<id>.*` file.
fn find_output(dir: &Path, item_id: &str) -> ExtractResult<PathBuf> {
    let prefix = format!("{item_id}.");
    let mut candidates = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) {
            candidates.push(entry.path());
        }
    }

    if candidates.is_empty() {
        return Err(ExtractError::OutputMissing);
    }

    candidates.sort();
    let mp4 = candidates.iter().find(|p| {
        p.extension()
            .map(|e| e.eq_ignore_ascii_case("mp4"))
            .unwrap_or(false)
    });
    Ok(mp4.cloned().unwrap_or_else(|| candidates[0].clone()))
}

#[async_trait]
impl Extractor for YtDlp {
    async fn extract_flat(&self, listing_url: &str, limit: u32) -> ExtractResult<Vec<FlatEntry>> {
        let limit = limit.max(1);
        let end = limit.to_string();
        let args = [
            "--dump-single-json",
            "--skip-download",
            "--flat-playlist",
            "--ignore-errors",
            "--quiet",
            "--playlist-end",
            &end,
            listing_url,
        ];

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(ExtractError::extract_failed(stderr_tail(&output)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut entries = parse_listing_json(&stdout)?;
        entries.truncate(limit as usize);
        debug!("Flat listing of {} returned {} entries", listing_url, entries.len());
        Ok(entries)
    }

    async fn extract_detail(&self, item_url: &str) -> ExtractResult<Option<ItemMetadata>> {
        let args = [
            "--dump-single-json",
            "--skip-download",
            "--ignore-errors",
            "--quiet",
            "--retries",
            "3",
            item_url,
        ];

        let output = self.run(&args).await?;
        if !output.status.success() {
            warn!(
                "Detail extraction failed for {}: {}",
                item_url,
                stderr_tail(&output)
            );
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_detail_json(&stdout))
    }

    async fn download_media(
        &self,
        url: &str,
        output_dir: &Path,
        item_id: &str,
        uploader_hint: Option<&str>,
        max_height: u32,
    ) -> ExtractResult<PathBuf> {
        let uploader_dir = sanitize_dir_name(uploader_hint);
        let outdir = output_dir.join(uploader_dir);
        tokio::fs::create_dir_all(&outdir).await?;

        let outtmpl = outdir.join(format!("{item_id}.%(ext)s"));
        let outtmpl = outtmpl.to_string_lossy().into_owned();
        let format = format!("bestvideo[height<={max_height}]+bestaudio/best");

        info!("Downloading {} to {}", url, outdir.display());

        let args = [
            "--quiet",
            "--retries",
            "3",
            "-f",
            &format,
            "--merge-output-format",
            "mp4",
            "-o",
            &outtmpl,
            url,
        ];

        let output = self.run(&args).await?;
        if !output.status.success() {
            return Err(ExtractError::download_failed(stderr_tail(&output)));
        }

        let path = find_output(&outdir, item_id)?;
        info!("Downloaded {} to {}", item_id, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_dir_name() {
        assert_eq!(sanitize_dir_name(Some("Example Channel")), "Example Channel");
        assert_eq!(sanitize_dir_name(Some("a/b\\c:d")), "a_b_c_d");
        assert_eq!(sanitize_dir_name(Some("  lots   of\tspace  ")), "lots of space");
        assert_eq!(sanitize_dir_name(None), "unknown");
        assert_eq!(sanitize_dir_name(Some("   ")), "unknown");

        let long = "x".repeat(200);
        assert_eq!(sanitize_dir_name(Some(&long)).len(), MAX_DIR_NAME_LEN);
    }

    #[test]
    fn test_parse_listing_json() {
        let json = r#"{
            "id": "channel",
            "entries": [
                {"id": "abc123def45", "url": "https://www.youtube.com/watch?v=abc123def45"},
                {"id": "xyz987uvw21"},
                {"url": "https://www.youtube.com/watch?v=noid"}
            ]
        }"#;
        let entries = parse_listing_json(json).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id.as_deref(), Some("abc123def45"));
        assert!(entries[1].url.is_none());
        assert!(entries[2].id.is_none());
    }

    #[test]
    fn test_parse_listing_json_without_entries() {
        assert!(parse_listing_json(r#"{"id": "channel"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_detail_json() {
        let detail = parse_detail_json(r#"{"id": "abc123def45", "duration": 42}"#).unwrap();
        assert_eq!(detail.id.as_deref(), Some("abc123def45"));
        assert_eq!(detail.duration, Some(42));

        assert!(parse_detail_json("null").is_none());
        assert!(parse_detail_json("not json").is_none());
    }

    #[test]
    fn test_find_output_prefers_mp4() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc123def45.webm"), b"x").unwrap();
        std::fs::write(dir.path().join("abc123def45.mp4"), b"x").unwrap();
        std::fs::write(dir.path().join("other.mp4"), b"x").unwrap();

        let path = find_output(dir.path(), "abc123def45").unwrap();
        assert!(path.to_string_lossy().ends_with("abc123def45.mp4"));
    }

    #[test]
    fn test_find_output_falls_back_to_any_container() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc123def45.mkv"), b"x").unwrap();

        let path = find_output(dir.path(), "abc123def45").unwrap();
        assert!(path.to_string_lossy().ends_with("abc123def45.mkv"));
    }

    #[test]
    fn test_find_output_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_output(dir.path(), "abc123def45"),
            Err(ExtractError::OutputMissing)
        ));
    }
}

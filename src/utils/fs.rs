// File system utilities

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{speech::AudioClip, utils::text::string::slug};

/// Read file contents with error handling
pub fn read_file_safe<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    debug!("Reading file: {}", path.display());

    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Write file contents, creating parent directories as needed
pub fn write_file_safe<P: AsRef<Path>>(path: P, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    debug!("Writing file: {}", path.display());

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    fs::write(path, contents).with_context(|| format!("Failed to write file: {}", path.display()))
}

/// Ensure a directory exists
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("Creating directory: {}", path.display());
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// File name for a reply clip: `<persona>-<timestamp>-<message id prefix>.<ext>`
pub fn audio_file_name(persona: &str, message_id: &str, at: DateTime<Utc>, clip: &AudioClip) -> String {
    let short_id: String = message_id.chars().filter(|c| *c != '-').take(8).collect();
    format!(
        "{}-{}-{}.{}",
        slug(persona),
        at.format("%Y%m%dT%H%M%S"),
        short_id,
        clip.format.extension()
    )
}

/// Write a clip into `dir` and return its path
pub fn save_audio(
    dir: &Path,
    persona: &str,
    message_id: &str,
    at: DateTime<Utc>,
    clip: &AudioClip,
) -> Result<PathBuf> {
    let path = dir.join(audio_file_name(persona, message_id, at, clip));
    write_file_safe(&path, &clip.bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::AudioFormat;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn clip() -> AudioClip {
        AudioClip::new(vec![0xFF, 0xFB, 0x90], AudioFormat::Mp3)
    }

    #[test]
    fn test_audio_file_name() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        let name = audio_file_name("Drug AI", "0f8e2c1a-7b3d-4e", at, &clip());
        assert_eq!(name, "drug-ai-20240301T123005-0f8e2c1a.mp3");
    }

    #[test]
    fn test_save_audio_creates_directory() {
        let dir = TempDir::new().unwrap();
        let audio_dir = dir.path().join("nested").join("audio");

        let path = save_audio(&audio_dir, "airon", "abc", Utc::now(), &clip()).unwrap();
        assert!(path.starts_with(&audio_dir));
        assert_eq!(fs::read(&path).unwrap(), vec![0xFF, 0xFB, 0x90]);
    }

    #[test]
    fn test_write_and_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        write_file_safe(&path, "transcript").unwrap();
        assert_eq!(read_file_safe(&path).unwrap(), "transcript");
        assert!(read_file_safe(dir.path().join("missing.txt")).is_err());
    }
}

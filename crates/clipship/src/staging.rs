//! Staging of source videos into the working area.
//!
//! Each job copies its source video under a deterministic destination name
//! derived from the account, the requested publish time, and the source
//! file stem. Collisions are resolved with a numeric suffix, reserved with
//! exclusive creation so two processes cannot land on the same path.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, TimeZone};
use log::debug;

use crate::error::StagingError;
use crate::sanitize::slugify;

/// Upper bound on collision-suffix attempts before giving up.
const MAX_NAME_ATTEMPTS: u32 = 1000;

pub struct Staging {
    videos_dir: PathBuf,
    tz: FixedOffset,
}

impl Staging {
    pub fn new<P: AsRef<Path>>(videos_dir: P, tz: FixedOffset) -> Self {
        Self {
            videos_dir: videos_dir.as_ref().to_path_buf(),
            tz,
        }
    }

    pub fn videos_dir(&self) -> &Path {
        &self.videos_dir
    }

    /// Builds the base destination file name: `{account-slug}_{stamp}_{stem}{ext}`
    /// where the stamp renders the publish time in the publication timezone.
    pub fn destination_name(&self, account: &str, publish_ms: i64, source: &Path) -> String {
        let stamp = self
            .tz
            .timestamp_millis_opt(publish_ms)
            .single()
            .map(|dt| dt.format("%Y%m%d-%H%M").to_string())
            .unwrap_or_else(|| "00000000-0000".to_string());

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("video");
        let ext = source
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        format!("{}_{}_{}{}", slugify(account), stamp, stem, ext)
    }

    /// Copies the source video into the staging directory under `name`,
    /// appending `-1`, `-2`, … to the stem until an unused path can be
    /// created exclusively. Returns the destination path.
    pub fn stage_video(&self, source: &Path, name: &str) -> Result<PathBuf, StagingError> {
        std::fs::create_dir_all(&self.videos_dir).map_err(|e| StagingError::CreateDirectory {
            path: self.videos_dir.clone(),
            source: e,
        })?;

        let (stem, ext) = split_name(name);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.to_string()
            } else {
                format!("{}-{}{}", stem, attempt, ext)
            };
            let dest = self.videos_dir.join(&candidate);

            // create_new reserves the name atomically; losing the race just
            // moves on to the next suffix.
            match std::fs::OpenOptions::new().write(true).create_new(true).open(&dest) {
                Ok(mut file) => {
                    if let Err(e) = copy_into(source, &mut file) {
                        // Don't leave the reserved stub behind.
                        let _ = std::fs::remove_file(&dest);
                        return Err(StagingError::CopyFile {
                            from: source.to_path_buf(),
                            to: dest,
                            source: e,
                        });
                    }
                    debug!("Staged {} as {}", source.display(), dest.display());
                    return Ok(dest);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StagingError::CopyFile {
                        from: source.to_path_buf(),
                        to: dest,
                        source: e,
                    })
                }
            }
        }

        Err(StagingError::Exhausted(self.videos_dir.join(name)))
    }
}

fn copy_into(source: &Path, dest: &mut std::fs::File) -> io::Result<()> {
    let mut reader = std::fs::File::open(source)?;
    io::copy(&mut reader, dest)?;
    Ok(())
}

/// Splits `clip.mp4` into `("clip", ".mp4")`; names without a dot keep an
/// empty extension.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cst() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_destination_name_format() {
        let dir = TempDir::new().unwrap();
        let staging = Staging::new(dir.path(), cst());

        // 2026-08-07T04:00:00Z is 12:00 in UTC+8.
        let name = staging.destination_name(
            "studio",
            1786075200000,
            Path::new("/srv/videos/morning run.mp4"),
        );
        assert_eq!(name, "studio_20260807-1200_morning run.mp4");
    }

    #[test]
    fn test_destination_name_sanitizes_account() {
        let dir = TempDir::new().unwrap();
        let staging = Staging::new(dir.path(), cst());

        let name = staging.destination_name("a/b:c", 1786075200000, Path::new("clip.mp4"));
        assert!(name.starts_with("a b c_"));
    }

    #[test]
    fn test_stage_video_copies_content() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.mp4");
        std::fs::write(&source, b"video-bytes").unwrap();

        let staging = Staging::new(dir.path().join("videos"), cst());
        let dest = staging.stage_video(&source, "acct_20260807-1200_src.mp4").unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"video-bytes");
    }

    #[test]
    fn test_stage_video_collision_suffixes() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.mp4");
        std::fs::write(&source, b"x").unwrap();

        let staging = Staging::new(dir.path().join("videos"), cst());

        let mut paths = Vec::new();
        for _ in 0..4 {
            paths.push(staging.stage_video(&source, "same_name.mp4").unwrap());
        }

        // All distinct, with the documented suffix pattern.
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "same_name.mp4",
                "same_name-1.mp4",
                "same_name-2.mp4",
                "same_name-3.mp4"
            ]
        );
    }

    #[test]
    fn test_stage_video_missing_source() {
        let dir = TempDir::new().unwrap();
        let staging = Staging::new(dir.path().join("videos"), cst());

        let result = staging.stage_video(&dir.path().join("absent.mp4"), "out.mp4");
        assert!(matches!(result, Err(StagingError::CopyFile { .. })));
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("clip.mp4"), ("clip", ".mp4"));
        assert_eq!(split_name("noext"), ("noext", ""));
        assert_eq!(split_name(".hidden"), (".hidden", ""));
    }
}

//! Output file helpers: collision-free naming and saving.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::core::{AudioFormat, ErgonError, ImageFormat};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Returns `path` if nothing exists there, otherwise a `<stem>-DDDD.<ext>`
/// sibling that is free, trying at most `max_retries` random suffixes.
pub async fn resolve_unique_path(path: &Path, max_retries: u32) -> Result<PathBuf, ErgonError> {
    let mut rng = StdRng::from_entropy();
    resolve_unique_path_with(path, max_retries, &mut rng).await
}

/// Same as [`resolve_unique_path`] with an explicit suffix source.
pub async fn resolve_unique_path_with<R: Rng + Send>(
    path: &Path,
    max_retries: u32,
    rng: &mut R,
) -> Result<PathBuf, ErgonError> {
    if !exists(path).await? {
        return Ok(path.to_path_buf());
    }

    for attempt in 1..=max_retries {
        let candidate = with_suffix(path, rng.gen_range(0..10_000u16));
        tracing::debug!("Path {} taken, trying {} (attempt {})", path.display(), candidate.display(), attempt);
        if !exists(&candidate).await? {
            return Ok(candidate);
        }
    }

    Err(ErgonError::PathExhausted { attempts: max_retries })
}

/// Resolves a free path for `path` and writes `data` there in one call.
/// Returns the path actually written.
pub async fn save_unique(path: &Path, data: &[u8], max_retries: u32) -> Result<PathBuf, ErgonError> {
    let target = resolve_unique_path(path, max_retries).await?;
    fs::write(&target, data).await?;
    tracing::info!("Saved {} bytes to {}", data.len(), target.display());
    Ok(target)
}

/// Only "not found" counts as free; directories and any other error do not.
async fn exists(path: &Path) -> Result<bool, ErgonError> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// `dir/name.ext` -> `dir/name-0042.ext`, `dir/name` -> `dir/name-0042`
fn with_suffix(path: &Path, suffix: u16) -> PathBuf {
    let stem = path.file_stem().map(OsString::from).unwrap_or_default();
    let mut file_name = stem;
    file_name.push(format!("-{:04}", suffix));
    if let Some(ext) = path.extension() {
        file_name.push(".");
        file_name.push(ext);
    }
    path.with_file_name(file_name)
}

/// Where a generated artifact should go, as given by `--output`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write into this directory under a generated name
    Directory(PathBuf),
    /// Write to this path
    File(PathBuf),
}

impl OutputTarget {
    /// No output means the current directory; an existing directory stays a directory
    pub async fn from_arg(output: Option<&Path>) -> Result<Self, ErgonError> {
        let Some(path) = output else {
            return Ok(OutputTarget::Directory(PathBuf::new()));
        };
        match fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(OutputTarget::Directory(path.to_path_buf())),
            Ok(_) => Ok(OutputTarget::File(path.to_path_buf())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(OutputTarget::File(path.to_path_buf())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn needs_name(&self) -> bool {
        matches!(self, OutputTarget::Directory(_))
    }
}

/// A file container that can be named by its extension
pub trait OutputFormat: Copy {
    fn from_extension(ext: &str) -> Result<Self, ErgonError>;
    fn extension(&self) -> &'static str;
    fn same_container(&self, other: &Self) -> bool;
}

impl OutputFormat for ImageFormat {
    fn from_extension(ext: &str) -> Result<Self, ErgonError> {
        ImageFormat::parse(ext)
    }

    fn extension(&self) -> &'static str {
        self.as_str()
    }

    fn same_container(&self, other: &Self) -> bool {
        self.mime_type() == other.mime_type()
    }
}

impl OutputFormat for AudioFormat {
    fn from_extension(ext: &str) -> Result<Self, ErgonError> {
        AudioFormat::parse(ext)
    }

    fn extension(&self) -> &'static str {
        self.as_str()
    }

    fn same_container(&self, other: &Self) -> bool {
        self == other
    }
}

/// Video output is always MP4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mp4;

impl OutputFormat for Mp4 {
    fn from_extension(ext: &str) -> Result<Self, ErgonError> {
        if ext.eq_ignore_ascii_case("mp4") {
            Ok(Mp4)
        } else {
            Err(ErgonError::invalid("video format", ext, "mp4"))
        }
    }

    fn extension(&self) -> &'static str {
        "mp4"
    }

    fn same_container(&self, _other: &Self) -> bool {
        true
    }
}

/// Final file path and format for `target`.
///
/// A directory target gets `<name>.<ext>`. A file path without extension gets
/// the format's extension appended. A file path with an extension must name a
/// supported format; when `explicit` is set (the format was passed as a flag)
/// it must also match `format`, otherwise the extension decides the format.
pub fn resolve_output_file<F: OutputFormat>(
    target: &OutputTarget,
    name: &str,
    format: F,
    explicit: bool,
) -> Result<(PathBuf, F), ErgonError> {
    let path = match target {
        OutputTarget::Directory(dir) => return Ok((dir.join(format!("{}.{}", name, format.extension())), format)),
        OutputTarget::File(path) => path,
    };

    match path.extension().and_then(|e| e.to_str()) {
        None => {
            let mut file_name = path.file_name().map(OsString::from).unwrap_or_default();
            file_name.push(".");
            file_name.push(format.extension());
            Ok((path.with_file_name(file_name), format))
        }
        Some(ext) => {
            let found = F::from_extension(ext)?;
            if explicit && !found.same_container(&format) {
                return Err(ErgonError::invalid(
                    "output extension",
                    ext,
                    format!("{} (the requested format)", format.extension()),
                ));
            }
            Ok((path.to_path_buf(), found))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use tempfile::tempdir;

    fn is_suffixed(name: &str, stem: &str, ext: &str) -> bool {
        let Some(rest) = name.strip_prefix(&format!("{}-", stem)) else {
            return false;
        };
        let Some(digits) = rest.strip_suffix(ext) else {
            return false;
        };
        digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit())
    }

    #[tokio::test]
    async fn free_path_is_returned_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.png");
        assert_eq!(resolve_unique_path(&path, 3).await.unwrap(), path);
    }

    #[tokio::test]
    async fn taken_path_gets_four_digit_suffix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.png");
        std::fs::write(&path, b"x").unwrap();

        let resolved = resolve_unique_path(&path, 3).await.unwrap();
        assert_ne!(resolved, path);
        assert_eq!(resolved.parent(), path.parent());
        let name = resolved.file_name().unwrap().to_str().unwrap();
        assert!(is_suffixed(name, "out", ".png"), "unexpected name {}", name);
    }

    #[tokio::test]
    async fn exhaustion_reports_retry_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.png");
        std::fs::write(&path, b"x").unwrap();
        // StepRng(0, 0) always yields suffix 0000
        std::fs::write(dir.path().join("out-0000.png"), b"x").unwrap();

        let mut rng = StepRng::new(0, 0);
        let err = resolve_unique_path_with(&path, 5, &mut rng).await.unwrap_err();
        assert!(matches!(err, ErgonError::PathExhausted { attempts: 5 }));
        assert!(err.to_string().contains('5'));
    }

    #[tokio::test]
    async fn zero_retries_fails_immediately_on_collision() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.png");
        std::fs::write(&path, b"x").unwrap();
        let err = resolve_unique_path(&path, 0).await.unwrap_err();
        assert!(matches!(err, ErgonError::PathExhausted { attempts: 0 }));
    }

    #[tokio::test]
    async fn directory_counts_as_taken() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("render");
        std::fs::create_dir(&path).unwrap();

        let resolved = resolve_unique_path(&path, 3).await.unwrap();
        let name = resolved.file_name().unwrap().to_str().unwrap();
        assert!(is_suffixed(name, "render", ""), "unexpected name {}", name);
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(with_suffix(Path::new("a/b.c/name.tar"), 7), PathBuf::from("a/b.c/name-0007.tar"));
        assert_eq!(with_suffix(Path::new("name"), 1234), PathBuf::from("name-1234"));
        assert_eq!(with_suffix(Path::new("out.png"), 0), PathBuf::from("out-0000.png"));
    }

    #[tokio::test]
    async fn save_reports_the_path_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("voice.wav");

        let first = save_unique(&path, b"one", 3).await.unwrap();
        assert_eq!(first, path);
        let second = save_unique(&path, b"two", 3).await.unwrap();
        assert_ne!(second, path);

        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn missing_parent_surfaces_io_error_on_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.png");
        let err = save_unique(&path, b"x", 3).await.unwrap_err();
        assert!(matches!(err, ErgonError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_not_found_errors_propagate() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        // A path through a regular file fails with NotADirectory, not NotFound
        let path = file.join("out.png");
        let err = resolve_unique_path(&path, 3).await.unwrap_err();
        assert!(matches!(err, ErgonError::Io(_)));
    }

    #[tokio::test]
    async fn output_target_classification() {
        let dir = tempdir().unwrap();
        assert_eq!(OutputTarget::from_arg(None).await.unwrap(), OutputTarget::Directory(PathBuf::new()));
        assert_eq!(
            OutputTarget::from_arg(Some(dir.path())).await.unwrap(),
            OutputTarget::Directory(dir.path().to_path_buf())
        );
        let file = dir.path().join("new.png");
        assert_eq!(OutputTarget::from_arg(Some(&file)).await.unwrap(), OutputTarget::File(file.clone()));
        assert!(!OutputTarget::File(file).needs_name());
    }

    #[test]
    fn directory_target_uses_generated_name() {
        let target = OutputTarget::Directory(PathBuf::from("shots"));
        let (path, format) = resolve_output_file(&target, "red-fox", ImageFormat::Webp, false).unwrap();
        assert_eq!(path, PathBuf::from("shots/red-fox.webp"));
        assert_eq!(format, ImageFormat::Webp);

        let (path, _) = resolve_output_file(&OutputTarget::Directory(PathBuf::new()), "talk", AudioFormat::Mp3, false).unwrap();
        assert_eq!(path, PathBuf::from("talk.mp3"));
    }

    #[test]
    fn missing_extension_is_appended() {
        let target = OutputTarget::File(PathBuf::from("out/v1.2/fox"));
        let (path, _) = resolve_output_file(&target, "ignored", ImageFormat::Png, true).unwrap();
        assert_eq!(path, PathBuf::from("out/v1.2/fox.png"));
    }

    #[test]
    fn extension_must_agree_with_explicit_format() {
        let target = OutputTarget::File(PathBuf::from("fox.jpg"));
        assert!(resolve_output_file(&target, "x", ImageFormat::Png, true).is_err());

        let (path, format) = resolve_output_file(&target, "x", ImageFormat::Png, false).unwrap();
        assert_eq!(path, PathBuf::from("fox.jpg"));
        assert_eq!(format, ImageFormat::Jpg);

        let (_, format) = resolve_output_file(&target, "x", ImageFormat::Jpeg, true).unwrap();
        assert_eq!(format, ImageFormat::Jpg);

        let unknown = OutputTarget::File(PathBuf::from("fox.bmp"));
        assert!(matches!(
            resolve_output_file(&unknown, "x", ImageFormat::Png, false),
            Err(ErgonError::InvalidParameter { .. })
        ));

        let video = OutputTarget::File(PathBuf::from("clip.mov"));
        assert!(resolve_output_file(&video, "x", Mp4, true).is_err());
    }
}

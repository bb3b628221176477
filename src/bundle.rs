//! Bundle reader: parses the optional `content.json` manifest, renders a
//! bundle to markdown, and safely extracts members to disk.
//!
//! A bundle is a deflate-compressed ZIP archive whose magnet is the
//! keccak-256 digest of the archive bytes. Member extensions are restricted
//! to a small allow-list; everything else is either skipped or rejected
//! depending on the caller's strictness.

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use zip::ZipArchive;

use crate::error::BundleError;

/// Text-file index extensions, in precedence order.
const TEXT_EXTENSIONS: &[&str] = &["md", "txt"];
/// Image-file index extensions, in precedence order.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "gif", "vgif"];
/// Every extension a bundle member is allowed to carry (plus `content.json`
/// by name).
const ALLOWED_EXTENSIONS: &[&str] = &["md", "txt", "png", "jpg", "gif", "vgif"];

const MANIFEST_NAME: &str = "content.json";

/// Parsed `content.json` manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentJson {
    pub version: String,
    #[serde(default)]
    pub index: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
}

impl ContentJson {
    fn parse(raw: &str) -> Result<Self, BundleError> {
        let parsed: ContentJson = serde_json::from_str(raw)
            .map_err(|e| BundleError::BundleFormatError(e.to_string()))?;

        if parsed.version != "1.0" {
            return Err(BundleError::UnsupportedBundleVersion(parsed.version));
        }
        if parsed.index.is_none() && parsed.text.is_none() {
            return Err(BundleError::BundleFormatError(
                "the `index` file or `text` should be specified in content.json".to_string(),
            ));
        }
        Ok(parsed)
    }
}

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit('.').next().filter(|ext| *ext != name)
}

/// A bundle opened from a local file.
pub struct Bundle {
    archive: ZipArchive<fs::File>,
    manifest: Option<ContentJson>,
}

impl Bundle {
    /// Open a bundle by local path, parsing `content.json` if present.
    pub fn open(path: &Path) -> Result<Self, BundleError> {
        let file = fs::File::open(path).map_err(|e| BundleError::Io(e.to_string()))?;
        let mut archive =
            ZipArchive::new(file).map_err(|e| BundleError::Archive(e.to_string()))?;

        let manifest = match archive.by_name(MANIFEST_NAME) {
            Ok(mut entry) => {
                let mut raw = String::new();
                entry
                    .read_to_string(&mut raw)
                    .map_err(|e| BundleError::Io(e.to_string()))?;
                Some(ContentJson::parse(&raw)?)
            }
            Err(zip::result::ZipError::FileNotFound) => None,
            Err(e) => return Err(BundleError::Archive(e.to_string())),
        };

        Ok(Bundle { archive, manifest })
    }

    fn read_member_string(&mut self, name: &str) -> Result<String, BundleError> {
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|e| BundleError::Archive(e.to_string()))?;
        let mut out = String::new();
        entry
            .read_to_string(&mut out)
            .map_err(|e| BundleError::Io(e.to_string()))?;
        Ok(out)
    }

    fn member_names(&self) -> Vec<String> {
        self.archive.file_names().map(|s| s.to_string()).collect()
    }

    /// Render the bundle's content as markdown.
    ///
    /// If `content.json` is present, honour it: a text index renders as raw
    /// text, an image index renders as `![image](uri)` optionally followed
    /// by the manifest's `text`. Otherwise, pick the first index file found
    /// by precedence: `index.md`, `index.txt`, then images in
    /// `png, jpg, gif, vgif` order.
    pub fn render_markdown(&mut self) -> Result<String, BundleError> {
        if let Some(manifest) = self.manifest.clone() {
            return self.render_from_manifest(&manifest);
        }

        let names = self.member_names();

        for ext in TEXT_EXTENSIONS {
            let candidate = format!("index.{ext}");
            if names.iter().any(|n| n == &candidate) {
                return self.read_member_string(&candidate);
            }
        }

        for ext in IMAGE_EXTENSIONS {
            let candidate = format!("index.{ext}");
            if names.iter().any(|n| n == &candidate) {
                return Ok(render_image(&candidate, None));
            }
        }

        Err(BundleError::BundleFormatError(
            "bundle has no content.json and no recognised index file".to_string(),
        ))
    }

    fn render_from_manifest(&mut self, manifest: &ContentJson) -> Result<String, BundleError> {
        let Some(index) = &manifest.index else {
            return Ok(manifest.text.clone().unwrap_or_default());
        };

        let ext = extension_of(index).ok_or_else(|| {
            BundleError::BundleFormatError(format!(
                "index file {index} in content.json has no extension"
            ))
        })?;

        if TEXT_EXTENSIONS.contains(&ext) {
            self.read_member_string(index)
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            Ok(render_image(index, manifest.text.as_deref()))
        } else {
            Err(BundleError::BundleFormatError(format!(
                "unsupported index file {index} extension"
            )))
        }
    }

    /// Extract every allow-listed member into `dest`.
    ///
    /// In `strict` mode, a disallowed member fails the whole extraction with
    /// `UnsafeBundleContent`; otherwise such members are silently skipped.
    /// Members are never written outside `dest` (path traversal is rejected).
    pub fn extract_all(&mut self, dest: &Path, strict: bool) -> Result<(), BundleError> {
        fs::create_dir_all(dest).map_err(|e| BundleError::Io(e.to_string()))?;
        let dest = dest
            .canonicalize()
            .map_err(|e| BundleError::Io(e.to_string()))?;

        let names = self.member_names();
        for name in names {
            let ext = extension_of(&name).unwrap_or("");
            if name != MANIFEST_NAME && !ALLOWED_EXTENSIONS.contains(&ext) {
                if strict {
                    return Err(BundleError::UnsafeBundleContent(name));
                }
                continue;
            }

            let mut entry = self
                .archive
                .by_name(&name)
                .map_err(|e| BundleError::Archive(e.to_string()))?;

            let out_path = dest.join(entry.mangled_name());
            if !out_path.starts_with(&dest) {
                // Path traversal attempt; never extract above `dest`.
                if strict {
                    return Err(BundleError::UnsafeBundleContent(name));
                }
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| BundleError::Io(e.to_string()))?;
            }
            let mut out_file =
                fs::File::create(&out_path).map_err(|e| BundleError::Io(e.to_string()))?;
            std::io::copy(&mut entry, &mut out_file).map_err(|e| BundleError::Io(e.to_string()))?;
        }
        Ok(())
    }
}

fn render_image(uri: &str, text: Option<&str>) -> String {
    let image_md = format!("![image]({uri})");
    match text {
        Some(t) if !t.is_empty() => format!("{image_md}\n\n{t}"),
        _ => image_md,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn make_bundle(files: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            let mut writer = zip::ZipWriter::new(tmp.reopen().unwrap());
            let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for (name, contents) in files {
                writer.start_file(*name, options).unwrap();
                writer.write_all(contents).unwrap();
            }
            writer.finish().unwrap();
        }
        tmp
    }

    #[test]
    fn manifest_with_image_index_renders_image_then_text() {
        let manifest = br#"{"version":"1.0","index":"pic.png","text":"hi"}"#;
        let tmp = make_bundle(&[("content.json", manifest), ("pic.png", b"\x89PNG")]);
        let mut bundle = Bundle::open(tmp.path()).unwrap();
        assert_eq!(bundle.render_markdown().unwrap(), "![image](pic.png)\n\nhi");
    }

    #[test]
    fn no_manifest_falls_back_to_index_md() {
        let tmp = make_bundle(&[("index.md", b"# hello")]);
        let mut bundle = Bundle::open(tmp.path()).unwrap();
        assert_eq!(bundle.render_markdown().unwrap(), "# hello");
    }

    #[test]
    fn strict_extract_rejects_disallowed_member() {
        let tmp = make_bundle(&[("index.md", b"# ok"), ("evil.exe", b"MZ")]);
        let mut bundle = Bundle::open(tmp.path()).unwrap();
        let dest = tempfile::tempdir().unwrap();
        let err = bundle.extract_all(dest.path(), true).unwrap_err();
        assert_eq!(err, BundleError::UnsafeBundleContent("evil.exe".to_string()));
    }

    #[test]
    fn non_strict_extract_skips_disallowed_member() {
        let tmp = make_bundle(&[("index.md", b"# ok"), ("evil.exe", b"MZ")]);
        let mut bundle = Bundle::open(tmp.path()).unwrap();
        let dest = tempfile::tempdir().unwrap();
        bundle.extract_all(dest.path(), false).unwrap();
        assert!(dest.path().join("index.md").exists());
        assert!(!dest.path().join("evil.exe").exists());
    }

    #[test]
    fn strict_extract_keeps_content_json() {
        let manifest = br#"{"version":"1.0","text":"hi"}"#;
        let tmp = make_bundle(&[("content.json", manifest)]);
        let mut bundle = Bundle::open(tmp.path()).unwrap();
        let dest = tempfile::tempdir().unwrap();
        bundle.extract_all(dest.path(), true).unwrap();
        assert!(dest.path().join("content.json").exists());
    }

    #[test]
    fn bad_version_is_rejected() {
        let manifest = br#"{"version":"2.0","text":"hi"}"#;
        let tmp = make_bundle(&[("content.json", manifest)]);
        let err = Bundle::open(tmp.path()).unwrap_err();
        assert_eq!(err, BundleError::UnsupportedBundleVersion("2.0".to_string()));
    }
}

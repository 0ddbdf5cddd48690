use data_encoding::BASE64;
use std::fs;
use std::io;
use std::path::Path;

/// Inline images above this many characters are stripped from JSON bodies
/// before a remote save (the accompanying multipart upload path is the way
/// to ship large images).
pub const INLINE_IMAGE_LIMIT: usize = 50_000;

/// A user-selected image file, read into memory for a multipart upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Reads the file at the given path into an upload-ready representation.
    pub fn from_path(path: &Path) -> io::Result<ImageUpload> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        Ok(ImageUpload {
            file_name,
            mime_type: mime_for_path(path),
            bytes,
        })
    }

    /// The embeddable `data:` URL form of this image, used when a record
    /// keeps its picture inline instead of as a remote URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }
}

/// Whether an embedded image representation is too large to ride along in a
/// JSON body.
pub fn is_oversized(embedded_image: &str) -> bool {
    embedded_image.len() > INLINE_IMAGE_LIMIT
}

fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_file_into_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bud.png");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(&[0x89, 0x50, 0x4e, 0x47]).unwrap();
        drop(file);

        let upload = ImageUpload::from_path(&path).unwrap();
        assert_eq!(upload.file_name, "bud.png");
        assert_eq!(upload.mime_type, "image/png");
        assert_eq!(upload.to_data_url(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn unknown_extensions_fall_back_to_octet_stream() {
        assert_eq!(mime_for_path(Path::new("photo.bmp")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("no_extension")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("photo.JPG")), "image/jpeg");
    }

    #[test]
    fn oversized_threshold_is_exclusive() {
        let at_limit = "x".repeat(INLINE_IMAGE_LIMIT);
        assert!(!is_oversized(&at_limit));
        let over_limit = "x".repeat(INLINE_IMAGE_LIMIT + 1);
        assert!(is_oversized(&over_limit));
    }
}

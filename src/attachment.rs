//! Image and PDF attachments for multimodal user messages.
//!
//! Attachments travel inline as base64 `data:` URLs: images as `image_url`
//! parts, PDFs as `file` parts named after their path.

use crate::types::{ContentPart, ImageDetail};
use crate::{Error, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::path::Path;

/// Media type used for raw image bytes when none is given.
pub const DEFAULT_IMAGE_MEDIA_TYPE: &str = "image/png";

const PDF_MEDIA_TYPE: &str = "application/pdf";

/// `data:<media_type>;base64,<payload>`
pub fn data_url(media_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, BASE64.encode(data))
}

#[derive(Debug, Clone, PartialEq)]
enum ImageSource {
    Inline { data: Vec<u8>, media_type: String },
    Url(String),
}

/// An image to send next to a user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    source: ImageSource,
    detail: Option<ImageDetail>,
}

impl ImageAttachment {
    /// Encoded image bytes (PNG, JPEG, ...) with their media type.
    pub fn from_bytes(data: impl Into<Vec<u8>>, media_type: impl Into<String>) -> Self {
        Self {
            source: ImageSource::Inline {
                data: data.into(),
                media_type: media_type.into(),
            },
            detail: None,
        }
    }

    /// PNG bytes.
    pub fn png(data: impl Into<Vec<u8>>) -> Self {
        Self::from_bytes(data, DEFAULT_IMAGE_MEDIA_TYPE)
    }

    /// An image already reachable by URL; sent as-is.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            source: ImageSource::Url(url.into()),
            detail: None,
        }
    }

    /// Read an image file; the media type comes from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let media_type = image_media_type(path)?;
        let data = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(data, media_type))
    }

    pub fn with_detail(mut self, detail: ImageDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// The URL sent on the wire.
    pub fn url(&self) -> String {
        match &self.source {
            ImageSource::Inline { data, media_type } => data_url(media_type, data),
            ImageSource::Url(url) => url.clone(),
        }
    }

    pub fn to_content_part(&self) -> ContentPart {
        ContentPart::image_url(self.url(), self.detail)
    }
}

fn image_media_type(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        _ => Err(Error::invalid_input(format!(
            "unsupported image type: {}",
            path.display()
        ))),
    }
}

/// `file` part carrying a PDF read from `path`.
pub async fn pdf_part(path: impl AsRef<Path>) -> Result<ContentPart> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    log::debug!("attached PDF {} ({} bytes)", path.display(), data.len());

    Ok(ContentPart::file(
        path.display().to_string(),
        data_url(PDF_MEDIA_TYPE, &data),
    ))
}

/// Text first, then one part per image.
pub fn image_parts(text: &str, images: &[ImageAttachment]) -> Vec<ContentPart> {
    let mut parts = Vec::with_capacity(images.len() + 1);
    parts.push(ContentPart::text(text));
    parts.extend(images.iter().map(ImageAttachment::to_content_part));
    parts
}

/// Text first, then one part per PDF. Fails on the first unreadable file.
pub async fn pdf_parts<P: AsRef<Path>>(text: &str, paths: &[P]) -> Result<Vec<ContentPart>> {
    let mut parts = Vec::with_capacity(paths.len() + 1);
    parts.push(ContentPart::text(text));
    for path in paths {
        parts.push(pdf_part(path).await?);
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_data_url() {
        assert_eq!(data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
        assert_eq!(data_url("application/pdf", b""), "data:application/pdf;base64,");
    }

    #[test]
    fn test_image_attachment_inline() {
        let image = ImageAttachment::png(vec![1u8, 2, 3]).with_detail(ImageDetail::Low);
        match image.to_content_part() {
            ContentPart::ImageUrl { image_url } => {
                assert_eq!(image_url.url, "data:image/png;base64,AQID");
                assert_eq!(image_url.detail, Some(ImageDetail::Low));
            }
            other => panic!("Expected image part, got {:?}", other),
        }
    }

    #[test]
    fn test_image_attachment_url_passthrough() {
        let image = ImageAttachment::from_url("https://example.com/cat.jpg");
        assert_eq!(image.url(), "https://example.com/cat.jpg");
    }

    #[test]
    fn test_image_media_type_from_extension() {
        assert_eq!(image_media_type(Path::new("a/b.PNG")).unwrap(), "image/png");
        assert_eq!(image_media_type(Path::new("photo.jpeg")).unwrap(), "image/jpeg");
        assert!(image_media_type(Path::new("notes.txt")).is_err());
        assert!(image_media_type(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_image_parts_order() {
        let parts = image_parts(
            "What is in these?",
            &[
                ImageAttachment::png(vec![0u8]),
                ImageAttachment::from_bytes(vec![1u8], "image/jpeg"),
            ],
        );

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], ContentPart::text("What is in these?"));
        assert!(matches!(&parts[2], ContentPart::ImageUrl { image_url } if image_url.url.starts_with("data:image/jpeg;base64,")));
    }

    #[tokio::test]
    async fn test_pdf_parts_from_file() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"%PDF-1.4").unwrap();
        let path = file.path().to_path_buf();

        let parts = pdf_parts("Summarize", &[&path]).await.unwrap();
        assert_eq!(parts.len(), 2);
        match &parts[1] {
            ContentPart::File { file } => {
                assert_eq!(file.filename, path.display().to_string());
                assert_eq!(file.file_data, data_url("application/pdf", b"%PDF-1.4"));
            }
            other => panic!("Expected file part, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pdf_part_missing_file() {
        let err = pdf_part("/definitely/not/here.pdf").await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}

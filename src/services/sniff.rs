//! Image format and dimension sniffing from a stream header.
//!
//! Only the leading window of the stream is read and parsed; nothing is
//! decoded. The stream is always rewound so the caller can upload it whole.

use crate::{
    models::image::ImageInfo,
    services::storage_service::{StorageError, StorageResult},
};
use imagesize::ImageType;
use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tracing::debug;

/// Upper bound on header bytes read. JPEGs with large EXIF blocks place the
/// frame header well past the first few KiB.
const SNIFF_WINDOW: u64 = 256 * 1024;

/// Classify the image at the start of `stream` and rewind it to offset 0.
pub async fn sniff<R>(stream: &mut R) -> StorageResult<ImageInfo>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    stream.seek(SeekFrom::Start(0)).await?;
    let mut header = Vec::new();
    (&mut *stream)
        .take(SNIFF_WINDOW)
        .read_to_end(&mut header)
        .await?;
    stream.seek(SeekFrom::Start(0)).await?;

    let info = classify(&header)?;
    debug!(
        content_type = %info.content_type,
        width = info.width,
        height = info.height,
        "sniffed image header"
    );
    Ok(info)
}

fn classify(header: &[u8]) -> StorageResult<ImageInfo> {
    let kind = imagesize::image_type(header).map_err(|_| StorageError::UnrecognizedFormat)?;
    let format = format_name(kind).ok_or(StorageError::UnrecognizedFormat)?;
    let size = imagesize::blob_size(header).map_err(|_| StorageError::UnrecognizedFormat)?;

    let width = u32::try_from(size.width).map_err(|_| StorageError::UnrecognizedFormat)?;
    let height = u32::try_from(size.height).map_err(|_| StorageError::UnrecognizedFormat)?;
    if width == 0 || height == 0 {
        return Err(StorageError::UnrecognizedFormat);
    }

    Ok(ImageInfo {
        content_type: format!("image/{}", content_subtype(format)),
        width,
        height,
    })
}

/// Short format name, in file-extension form.
fn format_name(kind: ImageType) -> Option<&'static str> {
    let name = match kind {
        ImageType::Jpeg => "jpg",
        ImageType::Png => "png",
        ImageType::Gif => "gif",
        ImageType::Webp => "webp",
        ImageType::Bmp => "bmp",
        ImageType::Tiff => "tiff",
        ImageType::Ico => "ico",
        _ => return None,
    };
    Some(name)
}

/// Registered MIME subtype for a format name.
fn content_subtype(format: &str) -> &str {
    match format {
        "jpg" => "jpeg",
        "tif" => "tiff",
        "ico" => "x-icon",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    fn jpeg(width: u16, height: u16) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(b"JFIF\0");
        bytes.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&[0x03, 0x01, 0x22, 0x00, 0x02, 0x11, 0x01, 0x03, 0x11, 0x01]);
        bytes.extend_from_slice(&[0x12; 64]);
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[0x08, 0x06, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        bytes
    }

    #[tokio::test]
    async fn sniffs_jpeg_and_rewinds() {
        let original = jpeg(320, 200);
        let mut stream = Cursor::new(original.clone());

        let info = sniff(&mut stream).await.unwrap();
        assert_eq!(info.content_type, "image/jpeg");
        assert_eq!((info.width, info.height), (320, 200));

        assert_eq!(stream.position(), 0);
        let mut reread = Vec::new();
        stream.read_to_end(&mut reread).await.unwrap();
        assert_eq!(reread, original);
    }

    #[tokio::test]
    async fn sniffs_png_from_a_mid_stream_cursor() {
        let mut stream = Cursor::new(png(1920, 1080));
        stream.set_position(17);

        let info = sniff(&mut stream).await.unwrap();
        assert_eq!(info.content_type, "image/png");
        assert_eq!((info.width, info.height), (1920, 1080));
        assert_eq!(stream.position(), 0);
    }

    #[tokio::test]
    async fn rejects_non_images() {
        let mut text = Cursor::new(b"just some text, definitely not pixels".to_vec());
        assert_matches!(sniff(&mut text).await, Err(StorageError::UnrecognizedFormat));

        let mut empty = Cursor::new(Vec::new());
        assert_matches!(sniff(&mut empty).await, Err(StorageError::UnrecognizedFormat));
    }

    #[tokio::test]
    async fn rejects_zero_sized_images() {
        let mut stream = Cursor::new(png(0, 10));
        assert_matches!(sniff(&mut stream).await, Err(StorageError::UnrecognizedFormat));
    }

    #[test]
    fn jpg_is_reported_as_jpeg() {
        assert_eq!(content_subtype("jpg"), "jpeg");
        assert_eq!(content_subtype("png"), "png");
        assert_eq!(content_subtype("ico"), "x-icon");
    }
}

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::slot::FrameSlot;
use crate::CaptureError;

const DEFAULT_BOUNDARY: &str = "frame";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Parse state for the MJPEG multipart stream.
enum ParseState {
    /// Looking for the boundary marker `--<boundary>\r\n`.
    SeekingBoundary,
    /// Found boundary, now looking for end of headers `\r\n\r\n`.
    SeekingHeaderEnd,
    /// Collecting JPEG bytes until the next boundary.
    CollectingJpeg,
}

/// Incremental splitter for `multipart/x-mixed-replace` bodies.
///
/// A part is emitted once the boundary that follows it has been seen.
pub struct MjpegParser {
    boundary: Vec<u8>,
    buffer: BytesMut,
    state: ParseState,
    jpeg_start: usize,
}

impl MjpegParser {
    pub fn new(boundary: &str) -> Self {
        Self {
            boundary: format!("--{boundary}\r\n").into_bytes(),
            buffer: BytesMut::with_capacity(256 * 1024),
            state: ParseState::SeekingBoundary,
            jpeg_start: 0,
        }
    }

    /// Feed a chunk from the wire and return every part it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let mut parts = Vec::new();
        let boundary_len = self.boundary.len();

        loop {
            match self.state {
                ParseState::SeekingBoundary => {
                    if let Some(pos) = find_subsequence(&self.buffer, &self.boundary) {
                        // Discard everything up to and including the boundary
                        let _ = self.buffer.split_to(pos + boundary_len);
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Keep last few bytes in case boundary spans chunks
                        if self.buffer.len() > boundary_len {
                            let _ = self.buffer.split_to(self.buffer.len() - boundary_len);
                        }
                        break;
                    }
                }
                ParseState::SeekingHeaderEnd => {
                    if let Some(pos) = find_subsequence(&self.buffer, HEADER_END) {
                        let _ = self.buffer.split_to(pos + HEADER_END.len());
                        self.jpeg_start = 0;
                        self.state = ParseState::CollectingJpeg;
                    } else {
                        break;
                    }
                }
                ParseState::CollectingJpeg => {
                    let search_from = self.jpeg_start.min(self.buffer.len());
                    if let Some(pos) = find_subsequence(&self.buffer[search_from..], &self.boundary)
                    {
                        let jpeg_end = search_from + pos;
                        // Strip trailing \r\n before boundary
                        let end = if jpeg_end >= 2
                            && self.buffer[jpeg_end - 2] == b'\r'
                            && self.buffer[jpeg_end - 1] == b'\n'
                        {
                            jpeg_end - 2
                        } else {
                            jpeg_end
                        };

                        let mut part = self.buffer.split_to(jpeg_end + boundary_len);
                        part.truncate(end);
                        if !part.is_empty() {
                            parts.push(part.freeze());
                        }
                        self.state = ParseState::SeekingHeaderEnd;
                    } else {
                        // Avoid re-scanning old data, but keep a partial boundary.
                        self.jpeg_start = self.buffer.len().saturating_sub(boundary_len);
                        break;
                    }
                }
            }
        }

        parts
    }
}

/// Extract the multipart boundary from a `Content-Type` header value.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| param.strip_prefix("boundary="))
        .map(|b| b.trim_matches('"').trim_start_matches("--").to_string())
        .filter(|b| !b.is_empty())
}

/// Consume an MJPEG stream into the slot forever.
/// Reconnects with exponential backoff on failure.
pub async fn run_mjpeg_capture(stream_url: &str, slot: FrameSlot) -> Result<(), CaptureError> {
    let mut backoff = Duration::from_secs(2);
    let max_backoff = Duration::from_secs(30);

    loop {
        info!(url = stream_url, "connecting to MJPEG stream");
        match consume_stream(stream_url, &slot).await {
            Ok(()) => {
                info!("stream ended cleanly, reconnecting");
                backoff = Duration::from_secs(2);
            }
            Err(e) => {
                error!(error = %e, "stream error, reconnecting in {:?}", backoff);
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}

async fn consume_stream(url: &str, slot: &FrameSlot) -> Result<(), CaptureError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(CaptureError::HttpConnect)?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(CaptureError::HttpConnect)?;

    if !response.status().is_success() {
        return Err(CaptureError::HttpStatus(response.status().as_u16()));
    }

    let boundary = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(boundary_from_content_type)
        .unwrap_or_else(|| DEFAULT_BOUNDARY.to_string());

    info!(status = %response.status(), boundary, "connected to MJPEG stream");

    let mut byte_stream = response.bytes_stream();
    let mut parser = MjpegParser::new(&boundary);

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(CaptureError::HttpStream)?;
        for jpeg in parser.push(&chunk) {
            let bytes = jpeg.len();
            let seq = slot.publish(jpeg);
            debug!(seq, bytes, "captured MJPEG frame");
        }
    }

    Ok(())
}

/// Find the position of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(jpeg: &[u8]) -> Vec<u8> {
        let mut out = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        out.extend_from_slice(jpeg);
        out.extend_from_slice(b"\r\n");
        out
    }

    fn stream(jpegs: &[&[u8]]) -> Vec<u8> {
        let mut body: Vec<u8> = jpegs.iter().flat_map(|j| part(j)).collect();
        body.extend_from_slice(b"--frame\r\n");
        body
    }

    #[test]
    fn splits_whole_body() {
        let mut parser = MjpegParser::new("frame");
        let parts = parser.push(&stream(&[b"\xFF\xD8one\xFF\xD9", b"\xFF\xD8two\xFF\xD9"]));
        assert_eq!(parts.len(), 2);
        assert_eq!(&parts[0][..], b"\xFF\xD8one\xFF\xD9");
        assert_eq!(&parts[1][..], b"\xFF\xD8two\xFF\xD9");
    }

    #[test]
    fn splits_across_small_chunks() {
        let body = stream(&[b"\xFF\xD8first-frame\xFF\xD9", b"\xFF\xD8second\xFF\xD9"]);
        let mut parser = MjpegParser::new("frame");
        let mut parts = Vec::new();
        for chunk in body.chunks(3) {
            parts.extend(parser.push(chunk));
        }
        assert_eq!(parts.len(), 2);
        assert_eq!(&parts[0][..], b"\xFF\xD8first-frame\xFF\xD9");
        assert_eq!(&parts[1][..], b"\xFF\xD8second\xFF\xD9");
    }

    #[test]
    fn last_part_waits_for_next_boundary() {
        let mut parser = MjpegParser::new("frame");
        assert!(parser.push(&part(b"pending")).is_empty());
        let parts = parser.push(b"--frame\r\n");
        assert_eq!(parts.len(), 1);
        assert_eq!(&parts[0][..], b"pending");
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let mut body = b"HTTP noise before the first part".to_vec();
        body.extend(stream(&[b"data"]));
        let mut parser = MjpegParser::new("frame");
        let parts = parser.push(&body);
        assert_eq!(parts.len(), 1);
        assert_eq!(&parts[0][..], b"data");
    }

    #[test]
    fn custom_boundary() {
        let body = b"--camboundary\r\nContent-Type: image/jpeg\r\n\r\nabc\r\n--camboundary\r\n";
        let mut parser = MjpegParser::new("camboundary");
        let parts = parser.push(body);
        assert_eq!(parts.len(), 1);
        assert_eq!(&parts[0][..], b"abc");
    }

    #[test]
    fn boundary_parsed_from_header() {
        assert_eq!(
            boundary_from_content_type("multipart/x-mixed-replace; boundary=frame"),
            Some("frame".to_string())
        );
        assert_eq!(
            boundary_from_content_type("multipart/x-mixed-replace;boundary=\"--myboundary\""),
            Some("myboundary".to_string())
        );
        assert_eq!(boundary_from_content_type("image/jpeg"), None);
    }
}

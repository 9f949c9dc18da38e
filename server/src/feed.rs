use std::convert::Infallible;

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use hitboard_capture::FrameSlot;
use hitboard_common::frame::CapturedFrame;

pub const BOUNDARY: &str = "frame";

/// One multipart part: boundary, headers, JPEG, trailing CRLF.
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(jpeg.len() + 64);
    buf.put_slice(b"--");
    buf.put_slice(BOUNDARY.as_bytes());
    buf.put_slice(b"\r\nContent-Type: image/jpeg\r\n\r\n");
    buf.put_slice(jpeg);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// Every frame published to `slot`, starting with the current one.
pub fn frame_parts(slot: &FrameSlot) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let mut rx = slot.subscribe();
    let current = rx.borrow_and_update().clone();

    stream::unfold((rx, current), |(mut rx, pending)| async move {
        let frame: CapturedFrame = match pending {
            Some(frame) => frame,
            None => loop {
                // Ends the stream once the capture side is gone.
                rx.changed().await.ok()?;
                let next = rx.borrow_and_update().clone();
                if let Some(frame) = next {
                    break frame;
                }
            },
        };
        Some((Ok(multipart_part(&frame.jpeg)), (rx, None)))
    })
}

/// `multipart/x-mixed-replace` response that streams the live camera.
pub fn mjpeg_response(slot: &FrameSlot) -> Response {
    (
        [
            (
                header::CONTENT_TYPE,
                format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Body::from_stream(frame_parts(slot)),
    )
        .into_response()
}

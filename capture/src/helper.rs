use bytes::{Bytes, BytesMut};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::slot::FrameSlot;
use crate::CaptureError;

const SOI: &[u8] = &[0xFF, 0xD8];
const EOI: &[u8] = &[0xFF, 0xD9];
const READ_CHUNK: usize = 64 * 1024;

/// How to launch the external capture helper.
#[derive(Debug, Clone)]
pub struct HelperSpec {
    pub program: String,
    pub input_format: String,
    pub device: String,
    pub fps: f64,
}

impl HelperSpec {
    pub fn ffmpeg(input_format: &str, device: &str, fps: f64) -> Self {
        Self {
            program: "ffmpeg".into(),
            input_format: input_format.into(),
            device: device.into(),
            fps,
        }
    }

    /// Arguments that make ffmpeg write back-to-back JPEGs to stdout.
    pub fn args(&self) -> Vec<String> {
        let fps = self.fps.to_string();
        [
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            self.input_format.as_str(),
            "-framerate",
            fps.as_str(),
            "-i",
            self.device.as_str(),
            "-f",
            "image2pipe",
            "-vcodec",
            "mjpeg",
            "-q:v",
            "3",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Splits a concatenation of JPEG images on SOI/EOI markers.
///
/// Entropy-coded JPEG data byte-stuffs 0xFF, so `FF D9` only occurs as the
/// end-of-image marker.
#[derive(Default)]
pub struct JpegSplitter {
    buffer: BytesMut,
    /// Scan position for the EOI search once an SOI is at offset 0.
    scan_from: usize,
}

impl JpegSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(chunk);
        let mut images = Vec::new();

        loop {
            if !self.buffer.starts_with(SOI) {
                match find_subsequence(&self.buffer, SOI) {
                    Some(pos) => {
                        let _ = self.buffer.split_to(pos);
                        self.scan_from = SOI.len();
                    }
                    None => {
                        // Keep a trailing 0xFF that may start the next SOI.
                        let keep = usize::from(self.buffer.last() == Some(&0xFF));
                        let drop = self.buffer.len() - keep;
                        let _ = self.buffer.split_to(drop);
                        self.scan_from = 0;
                        break;
                    }
                }
            }

            let from = self.scan_from.max(SOI.len()).min(self.buffer.len());
            match find_subsequence(&self.buffer[from..], EOI) {
                Some(pos) => {
                    let end = from + pos + EOI.len();
                    images.push(self.buffer.split_to(end).freeze());
                    self.scan_from = 0;
                }
                None => {
                    self.scan_from = self.buffer.len().saturating_sub(EOI.len() - 1);
                    break;
                }
            }
        }

        images
    }
}

/// Run the capture helper forever, restarting it with exponential backoff.
pub async fn run_helper_capture(spec: HelperSpec, slot: FrameSlot) -> Result<(), CaptureError> {
    check_helper_available(&spec.program).await?;

    let mut backoff = Duration::from_secs(2);
    let max_backoff = Duration::from_secs(30);

    loop {
        info!(program = spec.program, device = spec.device, "starting capture helper");
        match capture_once(&spec, &slot).await {
            Ok(frames) if frames > 0 => {
                warn!(frames, "capture helper exited, restarting");
                backoff = Duration::from_secs(2);
            }
            Ok(_) => {
                warn!("capture helper exited without producing frames");
            }
            Err(e) => {
                error!(error = %e, "capture helper failed, restarting in {:?}", backoff);
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(max_backoff);
    }
}

/// Spawn the helper once and pump its stdout into the slot until it exits.
/// Returns the number of frames captured.
async fn capture_once(spec: &HelperSpec, slot: &FrameSlot) -> Result<u64, CaptureError> {
    let mut child = Command::new(&spec.program)
        .args(spec.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CaptureError::Spawn(e.to_string()))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| CaptureError::Spawn("could not get stdout handle".into()))?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(helper = %line, "capture helper stderr");
            }
        });
    }

    let mut splitter = JpegSplitter::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut frames = 0u64;

    loop {
        let n = stdout
            .read(&mut chunk)
            .await
            .map_err(|e| CaptureError::HelperRead(e.to_string()))?;
        if n == 0 {
            break;
        }
        for jpeg in splitter.push(&chunk[..n]) {
            let bytes = jpeg.len();
            let seq = slot.publish(jpeg);
            frames += 1;
            debug!(seq, bytes, "captured helper frame");
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| CaptureError::HelperRead(e.to_string()))?;
    if !status.success() {
        return Err(CaptureError::HelperExited(status.to_string()));
    }
    Ok(frames)
}

/// Check whether the helper binary runs at all.
pub async fn check_helper_available(program: &str) -> Result<(), CaptureError> {
    match Command::new(program).arg("-version").output().await {
        Ok(out) if out.status.success() => {
            debug!(program, "capture helper is available");
            Ok(())
        }
        Ok(out) => Err(CaptureError::HelperUnavailable(format!(
            "{program} -version exited with {}",
            out.status
        ))),
        Err(e) => Err(CaptureError::HelperUnavailable(format!("{program}: {e}"))),
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

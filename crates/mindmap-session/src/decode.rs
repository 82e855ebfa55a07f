//! Image payload decoding off the interaction thread.
//!
//! Requests carry the node id and the exact payload they were made for; the
//! session checks both against the live store before applying a result.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use mindmap_core::{Bitmap, NodeId};
use std::io::Cursor;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported image payload: {0}")]
    Image(#[from] image::ImageError),
    #[error("failed to read image payload: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed data URL")]
    DataUrl,
    #[error("image payload is empty")]
    Empty,
}

/// Strips an optional `data:<mime>;base64,` prefix.
fn payload_body(encoded: &str) -> Result<&str, DecodeError> {
    let trimmed = encoded.trim();
    let body = if trimmed.starts_with("data:") {
        trimmed
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or(DecodeError::DataUrl)?
    } else {
        trimmed
    };
    if body.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(body)
}

pub fn encode_image(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

/// Reads width and height from the header without decoding pixels.
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32), DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let reader = image::ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

pub fn decode_payload(encoded: &str) -> Result<Bitmap, DecodeError> {
    let bytes = BASE64_STANDARD.decode(payload_body(encoded)?.as_bytes())?;
    let rgba = image::load_from_memory(&bytes)?.to_rgba8();
    Ok(Bitmap {
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

#[derive(Debug)]
pub struct DecodeRequest {
    pub node: NodeId,
    pub encoded: Arc<str>,
}

#[derive(Debug)]
pub struct DecodeOutcome {
    pub node: NodeId,
    /// The payload this result was decoded from.
    pub encoded: Arc<str>,
    pub result: Result<Arc<Bitmap>, DecodeError>,
}

fn run(request: DecodeRequest) -> DecodeOutcome {
    let result = decode_payload(&request.encoded).map(Arc::new);
    DecodeOutcome {
        node: request.node,
        encoded: request.encoded,
        result,
    }
}

/// Fire-and-forget decoding with results collected by polling.
///
/// `threaded` runs one worker thread fed over a channel. `inline` decodes
/// during [`ImageDecoder::request`] but still hands results out through
/// polling, which keeps tests deterministic without changing the flow.
pub struct ImageDecoder {
    requests: Option<Sender<DecodeRequest>>,
    results_tx: Sender<DecodeOutcome>,
    results: Receiver<DecodeOutcome>,
    worker: Option<JoinHandle<()>>,
    pending: usize,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::threaded()
    }
}

impl ImageDecoder {
    pub fn threaded() -> Self {
        let (req_tx, req_rx) = unbounded::<DecodeRequest>();
        let (res_tx, res_rx) = unbounded::<DecodeOutcome>();

        let worker_tx = res_tx.clone();
        let worker = thread::Builder::new()
            .name("mindmap-image-decode".to_string())
            .spawn(move || {
                while let Ok(request) = req_rx.recv() {
                    if worker_tx.send(run(request)).is_err() {
                        break;
                    }
                }
            });

        match worker {
            Ok(handle) => Self {
                requests: Some(req_tx),
                results_tx: res_tx,
                results: res_rx,
                worker: Some(handle),
                pending: 0,
            },
            Err(e) => {
                tracing::error!("Failed to spawn image decode worker, decoding inline: {}", e);
                Self::inline()
            }
        }
    }

    pub fn inline() -> Self {
        let (results_tx, results) = unbounded();
        Self {
            requests: None,
            results_tx,
            results,
            worker: None,
            pending: 0,
        }
    }

    pub fn request(&mut self, node: NodeId, encoded: Arc<str>) {
        let request = DecodeRequest { node, encoded };
        self.pending += 1;
        let request = match &self.requests {
            Some(tx) => match tx.send(request) {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!("Image decode worker is gone, decoding inline");
                    err.into_inner()
                }
            },
            None => request,
        };
        let _ = self.results_tx.send(run(request));
    }

    /// Requests dispatched whose results have not been collected yet.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Results that are ready now. Never blocks.
    pub fn try_results(&mut self) -> Vec<DecodeOutcome> {
        let ready: Vec<DecodeOutcome> = self.results.try_iter().collect();
        self.pending = self.pending.saturating_sub(ready.len());
        ready
    }

    /// Blocks until every pending request has finished or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Vec<DecodeOutcome> {
        let deadline = Instant::now() + timeout;
        let mut ready = Vec::new();
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(outcome) => {
                    self.pending -= 1;
                    ready.push(outcome);
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!("{} image decodes still pending after {:?}", self.pending, timeout);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        ready
    }
}

impl Drop for ImageDecoder {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            tracing::error!("Image decode worker panicked");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_plain_and_data_url() {
        let encoded = encode_image(&png_bytes(3, 2));
        let bitmap = decode_payload(&encoded).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (3, 2));
        assert_eq!(bitmap.rgba.len(), 3 * 2 * 4);

        let url = format!("data:image/png;base64,{encoded}");
        assert_eq!(decode_payload(&url).unwrap(), bitmap);
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(decode_payload("%%%"), Err(DecodeError::Base64(_))));
        assert!(matches!(
            decode_payload(&encode_image(b"not an image")),
            Err(DecodeError::Image(_))
        ));
        assert!(matches!(decode_payload("data:image/png"), Err(DecodeError::DataUrl)));
        assert!(matches!(decode_payload("  "), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_dimensions_without_decoding() {
        assert_eq!(image_dimensions(&png_bytes(7, 5)).unwrap(), (7, 5));
        assert!(image_dimensions(&[]).is_err());
    }

    #[test]
    fn test_inline_decoder_delivers_on_poll() {
        let mut decoder = ImageDecoder::inline();
        decoder.request(NodeId(4), Arc::from(encode_image(&png_bytes(1, 1))));
        assert_eq!(decoder.pending(), 1);

        let results = decoder.try_results();
        assert_eq!(decoder.pending(), 0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].node, NodeId(4));
        assert!(results[0].result.is_ok());
    }

    #[test]
    fn test_threaded_decoder_completes() {
        let mut decoder = ImageDecoder::threaded();
        decoder.request(NodeId(1), Arc::from(encode_image(&png_bytes(2, 2))));
        decoder.request(NodeId(2), Arc::from("garbage!"));

        let mut results = decoder.wait(Duration::from_secs(10));
        results.sort_by_key(|r| r.node);
        assert_eq!(results.len(), 2);
        assert!(results[0].result.is_ok());
        assert!(results[1].result.is_err());
        assert_eq!(decoder.pending(), 0);
    }
}

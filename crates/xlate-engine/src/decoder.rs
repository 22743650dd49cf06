//! Incremental Opus-in-WebM decoder (spec §4.1).
//!
//! No crate in reach of this workspace demuxes WebM/Matroska, so the
//! EBML element walk here is hand-rolled: a minimal recursive-descent
//! reader over `Segment > {Tracks, Cluster > SimpleBlock}`, just enough
//! structure to recover the Opus track's channel count and sample rate
//! and pull out each block's raw Opus packet in order. Binary field
//! reads use `byteorder` the way the pack's other container-parsing
//! code (e.g. the walkie-talkie and airlift examples) reads explicit
//! big-endian fields out of a cursor.
//!
//! The decoder deliberately re-walks the entire accumulated buffer on
//! every `ingest` call (the "naive" approach the contract calls out as
//! O(N^2) over a session) and relies entirely on the two mandated
//! mitigations — tail-delta emission and periodic header refresh — to
//! keep that cost bounded in practice.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use xlate_core::error::EngineError;

const EBML_SEGMENT: u64 = 0x1853_8067;
const EBML_TRACKS: u64 = 0x1654_AE6B;
const EBML_TRACK_ENTRY: u64 = 0xAE;
const EBML_AUDIO: u64 = 0xE1;
const EBML_CHANNELS: u64 = 0x9F;
const EBML_SAMPLING_FREQUENCY: u64 = 0xB5;
const EBML_CLUSTER: u64 = 0x1F43_B675;
const EBML_SIMPLE_BLOCK: u64 = 0xA3;
const EBML_BLOCK_GROUP: u64 = 0xA0;
const EBML_BLOCK: u64 = 0xA1;

/// Container's native sample rate. Anything else is out of scope (see
/// `EngineError::UnsupportedSampleRate`).
const CONTAINER_SAMPLE_RATE_HZ: u32 = 48_000;

/// Plain decimation factor, 48 kHz → 16 kHz, no anti-alias filter — the
/// behavior is specified exactly this way, not an approximation of it.
const DECIMATION_FACTOR: usize = 3;

/// Why a decode-from-scratch attempt didn't yield new PCM this call.
enum ProbeOutcome {
    /// Not enough bytes yet to find a complete container header —
    /// ordinary startup state, not an error.
    Incomplete,
    /// The buffer parsed but didn't decode cleanly (corrupt payload, or
    /// a header-refresh seam). Caller should log and wait for the next
    /// probe.
    Malformed(String),
    /// The discovered track doesn't run at the one rate this decoder's
    /// plain decimation supports.
    UnsupportedRate(u32),
}

/// Incrementally decodes a growing Opus-in-WebM byte stream into 16 kHz
/// mono float32 PCM, returning only previously-unseen samples on each
/// call (spec §4.1, §3 "Audio container state").
pub struct AudioDecoder {
    buffer: Vec<u8>,
    samples_already_returned: usize,
}

impl AudioDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            samples_already_returned: 0,
        }
    }

    /// Append encoded bytes and return only the newly-decoded PCM tail.
    /// Never returns the same sample twice within the life of one
    /// encoded stream (§3 invariant).
    pub fn ingest(&mut self, bytes: &[u8]) -> Result<Vec<f32>, EngineError> {
        self.buffer.extend_from_slice(bytes);
        match decode_all(&self.buffer) {
            Ok(full_pcm) => {
                debug_assert!(full_pcm.len() >= self.samples_already_returned);
                if full_pcm.len() <= self.samples_already_returned {
                    return Ok(Vec::new());
                }
                let tail = full_pcm[self.samples_already_returned..].to_vec();
                self.samples_already_returned = full_pcm.len();
                Ok(tail)
            }
            Err(ProbeOutcome::Incomplete) => Ok(Vec::new()),
            Err(ProbeOutcome::Malformed(msg)) => {
                tracing::warn!(error = %msg, "audio decoder: malformed payload, awaiting header refresh");
                Ok(Vec::new())
            }
            Err(ProbeOutcome::UnsupportedRate(hz)) => Err(EngineError::UnsupportedSampleRate(hz)),
        }
    }

    /// Discard the buffer and counter — called when the client signals
    /// a new container header (periodic encoder restart, spec §4.1).
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.samples_already_returned = 0;
    }
}

impl Default for AudioDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// EBML variable-length integer: leading byte's highest set bit gives
/// the encoded width (1-8 bytes); the rest of that byte plus all
/// continuation bytes form the value. Returns `(value, width,
/// all-ones-marker)` — the all-ones case signals an "unknown size"
/// element, common in streamed WebM.
fn read_vint(buf: &[u8], pos: usize) -> Option<(u64, usize, bool)> {
    let first = *buf.get(pos)?;
    if first == 0 {
        return None;
    }
    let width = first.leading_zeros() as usize + 1;
    if pos + width > buf.len() {
        return None;
    }
    let mask = 0xFFu8 >> width;
    let mut value = u64::from(first & mask);
    let mut all_ones = (first & mask) == mask;
    for &b in &buf[pos + 1..pos + width] {
        value = (value << 8) | u64::from(b);
        all_ones &= b == 0xFF;
    }
    Some((value, width, all_ones))
}

/// One EBML element header: id, content length (`None` if unknown-size),
/// and the byte offset its content begins at.
struct ElementHeader {
    id: u64,
    size: Option<u64>,
    content_start: usize,
}

fn read_element_header(buf: &[u8], pos: usize) -> Option<ElementHeader> {
    // Element IDs keep their length marker bits (unlike sizes).
    let first = *buf.get(pos)?;
    let id_width = first.leading_zeros() as usize + 1;
    if pos + id_width > buf.len() {
        return None;
    }
    let mut id: u64 = 0;
    for &b in &buf[pos..pos + id_width] {
        id = (id << 8) | u64::from(b);
    }
    let size_pos = pos + id_width;
    let (raw_size, size_width, unknown) = read_vint(buf, size_pos)?;
    let content_start = size_pos + size_width;
    Some(ElementHeader {
        id,
        size: if unknown { None } else { Some(raw_size) },
        content_start,
    })
}

/// Elements this decoder recurses into rather than treating as opaque
/// binary payloads.
fn is_master_element(id: u64) -> bool {
    matches!(
        id,
        EBML_SEGMENT | EBML_TRACKS | EBML_TRACK_ENTRY | EBML_AUDIO | EBML_CLUSTER | EBML_BLOCK_GROUP
    )
}

struct TrackInfo {
    channels: u8,
    sample_rate: f64,
}

impl Default for TrackInfo {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: f64::from(CONTAINER_SAMPLE_RATE_HZ),
        }
    }
}

/// Walk the buffer from the top, collecting track info and every
/// SimpleBlock/Block payload in order. Returns `None` if the buffer
/// doesn't contain a complete top-level structure yet.
fn walk(buf: &[u8]) -> Option<(TrackInfo, Vec<&[u8]>)> {
    let mut track = TrackInfo::default();
    let mut blocks = Vec::new();

    let segment = read_element_header(buf, 0)?;
    if segment.id != EBML_SEGMENT {
        return None;
    }
    let segment_end = match segment.size {
        Some(size) => {
            let end = segment.content_start.checked_add(size as usize)?;
            if end > buf.len() {
                return None;
            }
            end
        }
        // Unknown-size Segment (the streaming-WebM norm): walk to
        // however much of the buffer has arrived so far.
        None => buf.len(),
    };

    walk_children(buf, segment.content_start, segment_end, &mut track, &mut blocks);
    Some((track, blocks))
}

fn walk_children<'a>(
    buf: &'a [u8],
    mut pos: usize,
    end: usize,
    track: &mut TrackInfo,
    blocks: &mut Vec<&'a [u8]>,
) {
    while pos < end {
        let Some(header) = read_element_header(buf, pos) else {
            return;
        };
        let content_end = match header.size {
            Some(size) => {
                let Some(e) = header.content_start.checked_add(size as usize) else {
                    return;
                };
                e.min(end)
            }
            None => end,
        };
        if content_end > buf.len() {
            // Element body hasn't fully arrived yet; stop here and wait
            // for more bytes.
            return;
        }

        match header.id {
            EBML_CHANNELS => {
                if let Some(&b) = buf.get(header.content_start) {
                    track.channels = b.max(1);
                }
            }
            EBML_SAMPLING_FREQUENCY => {
                let bytes = &buf[header.content_start..content_end];
                if let Some(freq) = read_ebml_float(bytes) {
                    track.sample_rate = freq;
                }
            }
            EBML_SIMPLE_BLOCK | EBML_BLOCK => {
                if let Some(payload) = strip_block_prefix(&buf[header.content_start..content_end]) {
                    blocks.push(payload);
                }
            }
            id if is_master_element(id) => {
                walk_children(buf, header.content_start, content_end, track, blocks);
            }
            _ => {}
        }

        pos = content_end;
        if header.size.is_none() {
            // Unknown-size leaf (shouldn't happen for non-master
            // elements); bail rather than loop forever.
            return;
        }
    }
}

/// EBML floats are stored as 4-byte (f32) or 8-byte (f64) big-endian.
fn read_ebml_float(bytes: &[u8]) -> Option<f64> {
    let mut cursor = Cursor::new(bytes);
    match bytes.len() {
        4 => cursor.read_f32::<BigEndian>().ok().map(f64::from),
        8 => cursor.read_f64::<BigEndian>().ok(),
        _ => None,
    }
}

/// A SimpleBlock/Block body is: track number (vint) + 2-byte signed
/// timecode + 1 flags byte + raw frame data (lacing unsupported — this
/// decoder expects one Opus packet per block, the common case for
/// Opus-in-WebM streamed from a `MediaRecorder`-style encoder).
fn strip_block_prefix(body: &[u8]) -> Option<&[u8]> {
    let (_, width, _) = read_vint(body, 0)?;
    let prefix_len = width + 3;
    if body.len() < prefix_len {
        return None;
    }
    Some(&body[prefix_len..])
}

fn decode_all(buffer: &[u8]) -> Result<Vec<f32>, ProbeOutcome> {
    if buffer.is_empty() {
        return Err(ProbeOutcome::Incomplete);
    }
    let (track, blocks) = walk(buffer).ok_or(ProbeOutcome::Incomplete)?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sample_rate = track.sample_rate.round() as u32;
    if sample_rate != CONTAINER_SAMPLE_RATE_HZ {
        return Err(ProbeOutcome::UnsupportedRate(sample_rate));
    }

    let channels = match track.channels {
        1 => opus::Channels::Mono,
        _ => opus::Channels::Stereo,
    };
    let mut decoder = opus::Decoder::new(CONTAINER_SAMPLE_RATE_HZ, channels)
        .map_err(|e| ProbeOutcome::Malformed(format!("opus decoder init failed: {e}")))?;

    let mut mono_48k = Vec::new();
    let frame_capacity = 5760 * usize::from(track.channels).max(1); // 120ms @ 48kHz, worst case
    for packet in blocks {
        let mut out = vec![0.0f32; frame_capacity];
        let written = decoder
            .decode_float(packet, &mut out, false)
            .map_err(|e| ProbeOutcome::Malformed(format!("opus decode failed: {e}")))?;
        out.truncate(written * usize::from(track.channels).max(1));
        if track.channels >= 2 {
            mono_48k.extend(out.chunks_exact(usize::from(track.channels)).map(|frame| {
                frame.iter().sum::<f32>() / frame.len() as f32
            }));
        } else {
            mono_48k.extend(out);
        }
    }

    Ok(mono_48k.into_iter().step_by(DECIMATION_FACTOR).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ingest_returns_no_samples_without_error() {
        let mut decoder = AudioDecoder::new();
        let out = decoder.ingest(&[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn partial_header_returns_empty_slice_not_error() {
        let mut decoder = AudioDecoder::new();
        // A single, truncated byte can never form a complete Segment
        // header; this must be treated as "not yet enough data".
        let out = decoder.ingest(&[0x18]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn reset_clears_buffer_and_counter() {
        let mut decoder = AudioDecoder::new();
        decoder.buffer.extend_from_slice(&[1, 2, 3]);
        decoder.samples_already_returned = 5;
        decoder.reset();
        assert!(decoder.buffer.is_empty());
        assert_eq!(decoder.samples_already_returned, 0);
    }

    #[test]
    fn vint_round_trips_known_size() {
        // A single 0x82 byte (width 1, 7 value bits) encodes size 2.
        let (value, width, unknown) = read_vint(&[0x82], 0).unwrap();
        assert_eq!(value, 2);
        assert_eq!(width, 1);
        assert!(!unknown);
    }

    #[test]
    fn vint_detects_unknown_size_marker() {
        let (_, width, unknown) = read_vint(&[0xFF], 0).unwrap();
        assert_eq!(width, 1);
        assert!(unknown);
    }

    #[test]
    fn strip_block_prefix_requires_minimum_length() {
        assert!(strip_block_prefix(&[0x81]).is_none());
        let body = [0x81, 0x00, 0x00, 0x00, 0xAA, 0xBB];
        let payload = strip_block_prefix(&body).unwrap();
        assert_eq!(payload, &[0xAA, 0xBB]);
    }
}

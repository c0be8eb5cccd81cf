//! Packaging recorded RTP packets into a playable file
//!
//! VP8/VP9 go into IVF, H.264 into an Annex-B elementary stream; both use
//! the writers shipped with webrtc-rs, which depacketize and reassemble
//! frames from marker bits. Anything else is stored raw.

use crate::config::ContainerFormat;
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::io::Cursor;
use tracing::{debug, warn};
use webrtc::media::io::h264_writer::H264Writer;
use webrtc::media::io::ivf_reader::IVFFileHeader;
use webrtc::media::io::ivf_writer::IVFWriter;
use webrtc::media::io::Writer;
use webrtc::rtp::packet::Packet;
use webrtc::util::Unmarshal;

/// IVF frame timestamps are frame indices; this is the nominal rate
const IVF_FRAME_RATE: u32 = 30;

/// Container chosen for one recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// IVF with the given FourCC (`VP80` or `VP90`)
    Ivf { four_cc: [u8; 4] },
    /// H.264 Annex-B byte stream
    H264AnnexB,
    /// Chunks concatenated as received
    Raw,
}

impl Container {
    /// Pick a container for a track with the given codec MIME type
    pub fn select(format: ContainerFormat, codec: Option<&str>) -> Self {
        if format == ContainerFormat::Raw {
            return Container::Raw;
        }
        match codec.map(str::to_ascii_lowercase).as_deref() {
            Some("video/vp8") => Container::Ivf { four_cc: *b"VP80" },
            Some("video/vp9") => Container::Ivf { four_cc: *b"VP90" },
            Some("video/h264") => Container::H264AnnexB,
            _ => Container::Raw,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Container::Ivf { .. } => "video/x-ivf",
            Container::H264AnnexB => "video/h264",
            Container::Raw => "application/octet-stream",
        }
    }

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Ivf { .. } => "ivf",
            Container::H264AnnexB => "h264",
            Container::Raw => "bin",
        }
    }

    /// Package `chunks`, each a marshalled RTP packet unless `Raw`.
    ///
    /// Packets that fail to parse or depacketize are skipped.
    ///
    /// # Errors
    ///
    /// `Error::ContainerError` if the container itself cannot be written.
    pub fn package(&self, chunks: &[Bytes]) -> Result<Bytes> {
        match self {
            Container::Raw => {
                let total = chunks.iter().map(Bytes::len).sum();
                let mut data = BytesMut::with_capacity(total);
                for chunk in chunks {
                    data.extend_from_slice(chunk);
                }
                Ok(data.freeze())
            }
            Container::Ivf { four_cc } => {
                let header = IVFFileHeader {
                    signature: *b"DKIF",
                    version: 0,
                    header_size: 32,
                    four_cc: *four_cc,
                    // Decoders read the frame size from the first keyframe
                    width: 0,
                    height: 0,
                    timebase_denominator: IVF_FRAME_RATE,
                    timebase_numerator: 1,
                    num_frames: 0,
                    unused: 0,
                };
                let mut buffer = Vec::new();
                {
                    let mut writer = IVFWriter::new(Cursor::new(&mut buffer), &header)
                        .map_err(|e| Error::ContainerError(format!("IVF header: {}", e)))?;
                    write_packets(&mut writer, chunks)?;
                }
                Ok(Bytes::from(buffer))
            }
            Container::H264AnnexB => {
                let mut buffer = Vec::new();
                {
                    let mut writer = H264Writer::new(Cursor::new(&mut buffer));
                    write_packets(&mut writer, chunks)?;
                }
                Ok(Bytes::from(buffer))
            }
        }
    }
}

fn write_packets<W: Writer>(writer: &mut W, chunks: &[Bytes]) -> Result<()> {
    let mut skipped = 0usize;
    for chunk in chunks {
        let mut buf = chunk.clone();
        let packet = match Packet::unmarshal(&mut buf) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Not an RTP packet ({} bytes): {}", chunk.len(), e);
                skipped += 1;
                continue;
            }
        };
        if let Err(e) = writer.write_rtp(&packet) {
            debug!("Dropping packet {}: {}", packet.header.sequence_number, e);
            skipped += 1;
        }
    }
    if skipped > 0 {
        warn!("Skipped {} of {} packets while packaging", skipped, chunks.len());
    }
    writer
        .close()
        .map_err(|e| Error::ContainerError(format!("Failed to finish container: {}", e)))
}

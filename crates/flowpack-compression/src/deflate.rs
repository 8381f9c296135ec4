//! DEFLATE-family backend
//!
//! Wraps `flate2`'s low-level `Compress`/`Decompress` state machines and
//! adds container framing: bare DEFLATE, zlib (handled by the codec
//! itself), or gzip, where the RFC 1952 header and CRC-32 + length trailer
//! are produced and checked here. The gzip header parser is incremental,
//! since a header may arrive split across any number of endpoint refills.

use flate2::{Compress, CompressError, Compression, Crc, Decompress, DecompressError};
use flate2::{FlushCompress, FlushDecompress, Status};
use flowpack_io::Endpoint;
use flowpack_types::{BufferSize, ContainerFormat, Direction, Error, Result, StreamState};

use crate::backend::write_all;

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;
const RESERVED_FLAGS: u8 = 0xe0;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const GZIP_FIXED_LEN: usize = 10;
const GZIP_TRAILER_LEN: usize = 8;
const CM_DEFLATE: u8 = 8;

/// DEFLATE codec state for one session
enum DeflateCodec {
    Idle,
    Encoder(Compress),
    Decoder(Decompress),
}

/// Where a gzip read session currently is within the container framing
enum GzipReadPhase {
    Header(GzipHeaderParser),
    Body,
    Trailer { buf: [u8; GZIP_TRAILER_LEN], have: usize },
}

pub(crate) struct DeflateBackend {
    container: ContainerFormat,
    level: u32,
    buffer_hint: usize,
    state: StreamState,
    scratch: Vec<u8>,
    in_pos: usize,
    in_len: usize,
    codec: DeflateCodec,
    crc: Crc,
    gzip_read: GzipReadPhase,
    header_written: bool,
}

impl DeflateBackend {
    pub(crate) fn new(container: ContainerFormat, level: u32, buffer_size: BufferSize) -> Self {
        Self {
            container,
            level,
            buffer_hint: buffer_size.get(),
            state: StreamState::Closed,
            scratch: Vec::new(),
            in_pos: 0,
            in_len: 0,
            codec: DeflateCodec::Idle,
            crc: Crc::new(),
            gzip_read: GzipReadPhase::Body,
            header_written: false,
        }
    }

    pub(crate) fn initialize(&mut self, direction: Direction) -> Result<()> {
        // The codec only emits or parses a wrapper for zlib framing; raw
        // and gzip sessions run the bare DEFLATE state machine and gzip
        // framing is layered on here.
        let zlib_wrapper = self.container == ContainerFormat::Zlib;

        match direction {
            Direction::Read => {
                self.codec = DeflateCodec::Decoder(Decompress::new(zlib_wrapper));
                self.gzip_read = GzipReadPhase::Header(GzipHeaderParser::new());
                self.state = StreamState::AwaitingFirstByte;
            }
            Direction::Write => {
                self.codec = DeflateCodec::Encoder(Compress::new(
                    Compression::new(self.level),
                    zlib_wrapper,
                ));
                self.state = StreamState::NoBytesWritten;
            }
        }

        self.scratch = vec![0u8; self.buffer_hint];
        self.in_pos = 0;
        self.in_len = 0;
        self.crc = Crc::new();
        self.header_written = false;
        Ok(())
    }

    pub(crate) fn read<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        out: &mut [u8],
    ) -> Result<usize> {
        let mut out_pos = 0;

        loop {
            // Refill the scratch buffer once the codec has consumed it.
            let mut source_dry = false;
            if self.in_pos == self.in_len {
                let available = match endpoint.read(&mut self.scratch) {
                    Ok(n) => n,
                    Err(e) => {
                        return Err(self.fail(Error::endpoint(format!(
                            "error reading from underlying endpoint: {}",
                            e.message()
                        ))));
                    }
                };
                self.in_pos = 0;
                self.in_len = available;

                if self.state != StreamState::InStream {
                    // Not in a stream and no bytes: an empty source, not an error.
                    if available == 0 {
                        return Ok(0);
                    }
                    self.state = StreamState::InStream;
                } else if available == 0 {
                    // Mid-stream and no new bytes right now. The codec still
                    // gets a chance to make progress before this call gives
                    // the produced bytes back for a later retry.
                    source_dry = true;
                }
            }

            if self.container == ContainerFormat::Gzip {
                match &mut self.gzip_read {
                    GzipReadPhase::Header(parser) => {
                        let consumed =
                            match parser.consume(&self.scratch[self.in_pos..self.in_len]) {
                                Ok(n) => n,
                                Err(e) => return Err(self.fail(e)),
                            };
                        let done = parser.is_done();
                        self.in_pos += consumed;
                        if !done {
                            if source_dry {
                                return Ok(out_pos);
                            }
                            continue;
                        }
                        self.gzip_read = GzipReadPhase::Body;
                    }
                    GzipReadPhase::Trailer { buf, have } => {
                        let available = self.in_len - self.in_pos;
                        let take = (GZIP_TRAILER_LEN - *have).min(available);
                        buf[*have..*have + take]
                            .copy_from_slice(&self.scratch[self.in_pos..self.in_pos + take]);
                        *have += take;
                        self.in_pos += take;
                        if *have < GZIP_TRAILER_LEN {
                            if source_dry {
                                return Ok(out_pos);
                            }
                            continue;
                        }

                        let trailer = *buf;
                        self.verify_gzip_trailer(&trailer)?;
                        self.state = StreamState::EndOfStream;
                        endpoint.push_back(&self.scratch[self.in_pos..self.in_len]);
                        self.in_pos = self.in_len;
                        return Ok(out_pos);
                    }
                    GzipReadPhase::Body => {}
                }
            }

            let (consumed, produced, step) = {
                let decoder = match &mut self.codec {
                    DeflateCodec::Decoder(decoder) => decoder,
                    _ => return Err(Error::codec("deflate decoder is not initialized")),
                };
                let before_in = decoder.total_in();
                let before_out = decoder.total_out();
                let result = decoder.decompress(
                    &self.scratch[self.in_pos..self.in_len],
                    &mut out[out_pos..],
                    FlushDecompress::None,
                );
                (
                    (decoder.total_in() - before_in) as usize,
                    (decoder.total_out() - before_out) as usize,
                    result,
                )
            };
            self.in_pos += consumed;
            let status = match step {
                Ok(status) => status,
                Err(e) => return Err(self.fail(decompress_error(&e))),
            };
            if self.container == ContainerFormat::Gzip {
                self.crc.update(&out[out_pos..out_pos + produced]);
            }
            out_pos += produced;

            match status {
                Status::StreamEnd => {
                    if self.container == ContainerFormat::Gzip {
                        // The compressed body is done; the CRC-32 and length
                        // trailer still has to be consumed and checked.
                        self.gzip_read = GzipReadPhase::Trailer {
                            buf: [0u8; GZIP_TRAILER_LEN],
                            have: 0,
                        };
                        continue;
                    }
                    self.state = StreamState::EndOfStream;
                    endpoint.push_back(&self.scratch[self.in_pos..self.in_len]);
                    self.in_pos = self.in_len;
                    return Ok(out_pos);
                }
                Status::Ok | Status::BufError => {
                    if out_pos == out.len() {
                        return Ok(out_pos);
                    }
                    if source_dry && consumed == 0 && produced == 0 {
                        return Ok(out_pos);
                    }
                }
            }
        }
    }

    pub(crate) fn write<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        data: &[u8],
    ) -> Result<usize> {
        self.ensure_gzip_header(endpoint)?;

        let mut in_pos = 0;
        loop {
            let (consumed, produced, step) = self.compress_step(&data[in_pos..], FlushCompress::None);
            let status = match step {
                Ok(status) => status,
                Err(e) => return Err(self.fail(compress_error(&e))),
            };
            if self.container == ContainerFormat::Gzip {
                self.crc.update(&data[in_pos..in_pos + consumed]);
            }
            in_pos += consumed;

            if produced > 0 {
                if let Err(e) = write_all(endpoint, &self.scratch[..produced]) {
                    return Err(self.fail(e));
                }
            }

            // Done once the input is consumed and the codec stopped filling
            // the whole scratch buffer (no further pending output).
            if in_pos == data.len() && produced < self.scratch.len() {
                break;
            }
            if consumed == 0 && produced == 0 && status != Status::Ok {
                break;
            }
        }

        self.state = StreamState::BytesWritten;
        Ok(data.len())
    }

    pub(crate) fn flush<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> Result<()> {
        self.ensure_gzip_header(endpoint)?;
        self.drive(endpoint, FlushCompress::Sync)?;
        self.state = StreamState::BytesWritten;
        Ok(())
    }

    pub(crate) fn finalize<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        direction: Direction,
    ) -> Result<()> {
        match direction {
            Direction::Read => {
                self.state = StreamState::AwaitingFirstByte;
                self.codec = DeflateCodec::Idle;
                Ok(())
            }
            Direction::Write => {
                // Only flush when something was written; an untouched
                // session tears down without emitting any framing.
                if self.state == StreamState::BytesWritten {
                    self.state = StreamState::NoBytesWritten;
                    self.ensure_gzip_header(endpoint)?;
                    self.drive(endpoint, FlushCompress::Finish)?;
                    if self.container == ContainerFormat::Gzip {
                        let mut trailer = [0u8; GZIP_TRAILER_LEN];
                        trailer[..4].copy_from_slice(&self.crc.sum().to_le_bytes());
                        trailer[4..].copy_from_slice(&self.crc.amount().to_le_bytes());
                        if let Err(e) = write_all(endpoint, &trailer) {
                            return Err(self.fail(e));
                        }
                    }
                }
                self.codec = DeflateCodec::Idle;
                Ok(())
            }
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state
    }

    /// Drive the encoder with no input until the requested flush completes
    fn drive<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E, mode: FlushCompress) -> Result<()> {
        loop {
            let (_, produced, step) = self.compress_step(&[], mode);
            let status = match step {
                Ok(status) => status,
                Err(e) => return Err(self.fail(compress_error(&e))),
            };
            if produced > 0 {
                if let Err(e) = write_all(endpoint, &self.scratch[..produced]) {
                    return Err(self.fail(e));
                }
            }

            // Finish must run to StreamEnd; a sync flush is done once the
            // codec stops filling the whole scratch buffer.
            let done = if matches!(mode, FlushCompress::Finish) {
                status == Status::StreamEnd
            } else {
                produced < self.scratch.len()
            };
            if done {
                return Ok(());
            }
        }
    }

    /// One encoder step into the scratch buffer
    fn compress_step(
        &mut self,
        input: &[u8],
        mode: FlushCompress,
    ) -> (usize, usize, std::result::Result<Status, CompressError>) {
        let encoder = match &mut self.codec {
            DeflateCodec::Encoder(encoder) => encoder,
            _ => {
                return (
                    0,
                    0,
                    Ok(Status::StreamEnd), // unreachable; write() is only called on open encoders
                );
            }
        };
        let before_in = encoder.total_in();
        let before_out = encoder.total_out();
        let result = encoder.compress(input, &mut self.scratch, mode);
        (
            (encoder.total_in() - before_in) as usize,
            (encoder.total_out() - before_out) as usize,
            result,
        )
    }

    /// Emit the gzip header once, before the first compressed byte
    fn ensure_gzip_header<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> Result<()> {
        if self.container != ContainerFormat::Gzip || self.header_written {
            return Ok(());
        }
        let header = gzip_header(self.level);
        if let Err(e) = write_all(endpoint, &header) {
            return Err(self.fail(e));
        }
        self.header_written = true;
        Ok(())
    }

    fn verify_gzip_trailer(&mut self, trailer: &[u8; GZIP_TRAILER_LEN]) -> Result<()> {
        let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let stored_len = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
        if stored_crc != self.crc.sum() {
            return Err(self.fail(Error::codec("gzip stream checksum mismatch")));
        }
        if stored_len != self.crc.amount() {
            return Err(self.fail(Error::codec("gzip stream length mismatch")));
        }
        Ok(())
    }

    fn fail(&mut self, error: Error) -> Error {
        self.state = StreamState::Error;
        error
    }
}

fn compress_error(error: &CompressError) -> Error {
    Error::codec(format!("internal deflate error when compressing: {}", error))
}

fn decompress_error(error: &DecompressError) -> Error {
    Error::codec(format!(
        "internal deflate error when decompressing: {}",
        error
    ))
}

/// RFC 1952 fixed header: magic, deflate, no flags, no mtime, XFL, unknown OS
fn gzip_header(level: u32) -> [u8; GZIP_FIXED_LEN] {
    let xfl = match level {
        9 => 2,
        1 => 4,
        _ => 0,
    };
    [
        GZIP_MAGIC[0],
        GZIP_MAGIC[1],
        CM_DEFLATE,
        0,
        0,
        0,
        0,
        0,
        xfl,
        255,
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderPhase {
    Fixed,
    ExtraLen,
    Extra,
    Name,
    Comment,
    HeaderCrc,
    Done,
}

/// Incremental RFC 1952 header parser
///
/// Consumes input byte-exactly: once the header is complete, not a single
/// byte of the DEFLATE body has been taken.
struct GzipHeaderParser {
    phase: HeaderPhase,
    flags: u8,
    have: usize,
    field_len: usize,
}

impl GzipHeaderParser {
    fn new() -> Self {
        Self {
            phase: HeaderPhase::Fixed,
            flags: 0,
            have: 0,
            field_len: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.phase == HeaderPhase::Done
    }

    /// Consume header bytes from `input`, returning how many were taken
    fn consume(&mut self, input: &[u8]) -> Result<usize> {
        let mut pos = 0;

        while pos < input.len() && self.phase != HeaderPhase::Done {
            match self.phase {
                HeaderPhase::Fixed => {
                    let byte = input[pos];
                    match self.have {
                        0 | 1 if byte != GZIP_MAGIC[self.have] => {
                            return Err(Error::codec("invalid gzip header magic"));
                        }
                        2 if byte != CM_DEFLATE => {
                            return Err(Error::codec(format!(
                                "unsupported gzip compression method {}",
                                byte
                            )));
                        }
                        3 => {
                            if byte & RESERVED_FLAGS != 0 {
                                return Err(Error::codec("reserved gzip header flags are set"));
                            }
                            self.flags = byte;
                        }
                        _ => {}
                    }
                    self.have += 1;
                    pos += 1;
                    if self.have == GZIP_FIXED_LEN {
                        self.advance(HeaderPhase::Fixed);
                    }
                }
                HeaderPhase::ExtraLen => {
                    let byte = input[pos];
                    self.field_len |= usize::from(byte) << (8 * self.have);
                    self.have += 1;
                    pos += 1;
                    if self.have == 2 {
                        self.advance(HeaderPhase::ExtraLen);
                    }
                }
                HeaderPhase::Extra => {
                    let take = self.field_len.min(input.len() - pos);
                    pos += take;
                    self.field_len -= take;
                    if self.field_len == 0 {
                        self.advance(HeaderPhase::Extra);
                    }
                }
                HeaderPhase::Name | HeaderPhase::Comment => {
                    let terminated = input[pos] == 0;
                    pos += 1;
                    if terminated {
                        self.advance(self.phase);
                    }
                }
                HeaderPhase::HeaderCrc => {
                    // Present when FHCRC is set; consumed but not verified.
                    self.have += 1;
                    pos += 1;
                    if self.have == 2 {
                        self.advance(HeaderPhase::HeaderCrc);
                    }
                }
                HeaderPhase::Done => {}
            }
        }

        Ok(pos)
    }

    fn advance(&mut self, completed: HeaderPhase) {
        self.have = 0;
        self.phase = self.next_phase(completed);
    }

    fn next_phase(&self, completed: HeaderPhase) -> HeaderPhase {
        match completed {
            HeaderPhase::Fixed => {
                if self.flags & FEXTRA != 0 {
                    HeaderPhase::ExtraLen
                } else {
                    self.next_phase(HeaderPhase::Extra)
                }
            }
            HeaderPhase::ExtraLen => {
                if self.field_len > 0 {
                    HeaderPhase::Extra
                } else {
                    self.next_phase(HeaderPhase::Extra)
                }
            }
            HeaderPhase::Extra => {
                if self.flags & FNAME != 0 {
                    HeaderPhase::Name
                } else {
                    self.next_phase(HeaderPhase::Name)
                }
            }
            HeaderPhase::Name => {
                if self.flags & FCOMMENT != 0 {
                    HeaderPhase::Comment
                } else {
                    self.next_phase(HeaderPhase::Comment)
                }
            }
            HeaderPhase::Comment => {
                if self.flags & FHCRC != 0 {
                    HeaderPhase::HeaderCrc
                } else {
                    HeaderPhase::Done
                }
            }
            HeaderPhase::HeaderCrc | HeaderPhase::Done => HeaderPhase::Done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_parser_plain_header() {
        let mut parser = GzipHeaderParser::new();
        let header = gzip_header(6);
        let consumed = parser.consume(&header).unwrap();
        assert_eq!(consumed, GZIP_FIXED_LEN);
        assert!(parser.is_done());
    }

    #[test]
    fn test_header_parser_split_across_feeds() {
        let mut parser = GzipHeaderParser::new();
        let header = gzip_header(9);
        for byte in header {
            parser.consume(&[byte]).unwrap();
        }
        assert!(parser.is_done());
    }

    #[test]
    fn test_header_parser_stops_at_body() {
        let mut parser = GzipHeaderParser::new();
        let mut bytes = gzip_header(6).to_vec();
        bytes.extend_from_slice(b"body");
        let consumed = parser.consume(&bytes).unwrap();
        assert_eq!(consumed, GZIP_FIXED_LEN);
    }

    #[test]
    fn test_header_parser_optional_fields() {
        // FEXTRA + FNAME + FCOMMENT + FHCRC, in RFC order.
        let mut bytes = vec![
            0x1f, 0x8b, 8, FEXTRA | FNAME | FCOMMENT | FHCRC, 0, 0, 0, 0, 0, 255,
        ];
        bytes.extend_from_slice(&[3, 0]); // XLEN = 3
        bytes.extend_from_slice(&[1, 2, 3]);
        bytes.extend_from_slice(b"name\0");
        bytes.extend_from_slice(b"comment\0");
        bytes.extend_from_slice(&[0xaa, 0xbb]);
        bytes.extend_from_slice(b"body");

        let mut parser = GzipHeaderParser::new();
        let consumed = parser.consume(&bytes).unwrap();
        assert!(parser.is_done());
        assert_eq!(consumed, bytes.len() - 4);
    }

    #[test]
    fn test_header_parser_rejects_bad_magic() {
        let mut parser = GzipHeaderParser::new();
        assert!(parser.consume(&[0x1f, 0x8c]).is_err());
    }

    #[test]
    fn test_header_parser_rejects_reserved_flags() {
        let mut parser = GzipHeaderParser::new();
        assert!(parser.consume(&[0x1f, 0x8b, 8, 0x80]).is_err());
    }

    #[test]
    fn test_gzip_header_xfl_tracks_level() {
        assert_eq!(gzip_header(9)[8], 2);
        assert_eq!(gzip_header(1)[8], 4);
        assert_eq!(gzip_header(6)[8], 0);
    }
}

//! Frame-streaming (zstd) backend
//!
//! Wraps the codec's raw streaming contexts (`zstd::stream::raw`), the
//! same incremental compress/decompress surface the C library exposes as
//! `ZSTD_compressStream2`/`ZSTD_decompressStream`. The scratch buffer is
//! raised to the codec's recommended chunk sizes when the caller's hint is
//! smaller.
//!
//! Without the `zstd` cargo feature this backend compiles to a stub with
//! the identical surface: `initialize` fails with a descriptive error and
//! the data operations fail fast without touching any codec state, so the
//! public stream contract is the same in every build.

use flowpack_io::Endpoint;
use flowpack_types::{BufferSize, Direction, Error, Result, StreamState};

#[cfg(feature = "zstd")]
use zstd::stream::raw::{Decoder, Encoder, InBuffer, Operation, OutBuffer};

#[cfg(feature = "zstd")]
use crate::backend::write_all;

#[cfg(not(feature = "zstd"))]
const UNSUPPORTED: &str = "the frame-streaming codec is not supported in this build";

#[cfg(feature = "zstd")]
enum FrameCodec {
    Idle,
    Encoder(Encoder<'static>),
    Decoder(Decoder<'static>),
}

/// Frame-streaming backend state for one session
#[cfg(feature = "zstd")]
pub(crate) struct FrameBackend {
    level: i32,
    buffer_hint: usize,
    state: StreamState,
    scratch: Vec<u8>,
    in_pos: usize,
    in_len: usize,
    codec: FrameCodec,
}

#[cfg(feature = "zstd")]
impl FrameBackend {
    pub(crate) fn new(level: i32, buffer_size: BufferSize) -> Self {
        Self {
            level,
            buffer_hint: buffer_size.get(),
            state: StreamState::Closed,
            scratch: Vec::new(),
            in_pos: 0,
            in_len: 0,
            codec: FrameCodec::Idle,
        }
    }

    pub(crate) fn initialize(&mut self, direction: Direction) -> Result<()> {
        let buffer_size = match direction {
            Direction::Read => {
                let decoder = Decoder::new().map_err(|e| {
                    Error::codec(format!("failed to create frame decoder: {}", e))
                })?;
                self.codec = FrameCodec::Decoder(decoder);
                self.state = StreamState::AwaitingFirstByte;
                self.buffer_hint.max(zstd::zstd_safe::DCtx::in_size())
            }
            Direction::Write => {
                let encoder = Encoder::new(self.level).map_err(|e| {
                    Error::codec(format!("failed to create frame encoder: {}", e))
                })?;
                self.codec = FrameCodec::Encoder(encoder);
                self.state = StreamState::NoBytesWritten;
                self.buffer_hint.max(zstd::zstd_safe::CCtx::out_size())
            }
        };

        self.scratch = vec![0u8; buffer_size];
        self.in_pos = 0;
        self.in_len = 0;
        Ok(())
    }

    pub(crate) fn read<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        out: &mut [u8],
    ) -> Result<usize> {
        let out_len = out.len();
        let mut out_buf = OutBuffer::around(out);

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
                    // Mid-frame and no new bytes right now. The codec still
                    // gets a run to flush internally buffered output before
                    // this call hands back what was produced.
                    source_dry = true;
                }
            }

            let before_out = out_buf.pos();
            let (consumed, step) = {
                let decoder = match &mut self.codec {
                    FrameCodec::Decoder(decoder) => decoder,
                    _ => return Err(Error::codec("frame decoder is not initialized")),
                };
                let mut in_buf = InBuffer::around(&self.scratch[self.in_pos..self.in_len]);
                let result = decoder.run(&mut in_buf, &mut out_buf);
                (in_buf.pos, result)
            };
            self.in_pos += consumed;

            let hint = match step {
                Ok(hint) => hint,
                Err(e) => {
                    return Err(self.fail(Error::codec(format!(
                        "internal frame codec error when decompressing: {}",
                        e
                    ))));
                }
            };

            // A zero hint means the frame is complete and fully flushed.
            if hint == 0 {
                self.state = StreamState::EndOfStream;
                endpoint.push_back(&self.scratch[self.in_pos..self.in_len]);
                self.in_pos = self.in_len;
                return Ok(out_buf.pos());
            }

            if out_buf.pos() == out_len {
                return Ok(out_buf.pos());
            }
            if source_dry && consumed == 0 && out_buf.pos() == before_out {
                return Ok(out_buf.pos());
            }
        }
    }

    pub(crate) fn write<E: Endpoint + ?Sized>(
        &mut self,
        endpoint: &mut E,
        data: &[u8],
    ) -> Result<usize> {
        let mut in_buf = InBuffer::around(data);

        loop {
            let (produced, step) = {
                let encoder = match &mut self.codec {
                    FrameCodec::Encoder(encoder) => encoder,
                    _ => return Err(Error::codec("frame encoder is not initialized")),
                };
                let mut out_buf = OutBuffer::around(&mut self.scratch[..]);
                let result = encoder.run(&mut in_buf, &mut out_buf);
                (out_buf.pos(), result)
            };

            if let Err(e) = step {
                return Err(self.fail(Error::codec(format!(
                    "internal frame codec error when compressing: {}",
                    e
                ))));
            }

            if produced > 0 {
                if let Err(e) = write_all(endpoint, &self.scratch[..produced]) {
                    return Err(self.fail(e));
                }
            }

            if in_buf.pos == data.len() {
                break;
            }
        }

        self.state = StreamState::BytesWritten;
        Ok(data.len())
    }

    pub(crate) fn flush<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E) -> Result<()> {
        self.drive(endpoint, false)?;
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
                self.codec = FrameCodec::Idle;
                Ok(())
            }
            Direction::Write => {
                // Only flush when something was written; an untouched
                // session tears down without emitting a frame.
                if self.state == StreamState::BytesWritten {
                    self.state = StreamState::NoBytesWritten;
                    self.drive(endpoint, true)?;
                }
                self.codec = FrameCodec::Idle;
                Ok(())
            }
        }
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state
    }

    /// Drive the encoder's flush or finish mode until it reports completion
    fn drive<E: Endpoint + ?Sized>(&mut self, endpoint: &mut E, finish: bool) -> Result<()> {
        loop {
            let (produced, step) = {
                let encoder = match &mut self.codec {
                    FrameCodec::Encoder(encoder) => encoder,
                    _ => return Err(Error::codec("frame encoder is not initialized")),
                };
                let mut out_buf = OutBuffer::around(&mut self.scratch[..]);
                let result = if finish {
                    encoder.finish(&mut out_buf, true)
                } else {
                    encoder.flush(&mut out_buf)
                };
                (out_buf.pos(), result)
            };

            let remaining = match step {
                Ok(remaining) => remaining,
                Err(e) => {
                    return Err(self.fail(Error::codec(format!(
                        "internal frame codec error when compressing: {}",
                        e
                    ))));
                }
            };

            if produced > 0 {
                if let Err(e) = write_all(endpoint, &self.scratch[..produced]) {
                    return Err(self.fail(e));
                }
            }

            if remaining == 0 {
                return Ok(());
            }
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        self.state = StreamState::Error;
        error
    }
}

/// Stub compiled in builds without the frame-streaming codec
///
/// Keeps the backend surface identical so callers always get a clean,
/// descriptive failure instead of a crash or a missing variant.
#[cfg(not(feature = "zstd"))]
pub(crate) struct FrameBackend {
    state: StreamState,
}

#[cfg(not(feature = "zstd"))]
impl FrameBackend {
    pub(crate) fn new(_level: i32, _buffer_size: BufferSize) -> Self {
        tracing::warn!("flowpack was built without the zstd feature; frame-streaming streams are unavailable");
        Self {
            state: StreamState::Closed,
        }
    }

    pub(crate) fn initialize(&mut self, _direction: Direction) -> Result<()> {
        Err(Error::config(UNSUPPORTED))
    }

    pub(crate) fn read<E: Endpoint + ?Sized>(
        &mut self,
        _endpoint: &mut E,
        _out: &mut [u8],
    ) -> Result<usize> {
        Err(Error::codec(UNSUPPORTED))
    }

    pub(crate) fn write<E: Endpoint + ?Sized>(
        &mut self,
        _endpoint: &mut E,
        _data: &[u8],
    ) -> Result<usize> {
        Err(Error::codec(UNSUPPORTED))
    }

    pub(crate) fn flush<E: Endpoint + ?Sized>(&mut self, _endpoint: &mut E) -> Result<()> {
        Err(Error::codec(UNSUPPORTED))
    }

    pub(crate) fn finalize<E: Endpoint + ?Sized>(
        &mut self,
        _endpoint: &mut E,
        _direction: Direction,
    ) -> Result<()> {
        Ok(())
    }

    pub(crate) fn state(&self) -> StreamState {
        self.state
    }
}


#[cfg(all(test, not(feature = "zstd")))]
mod stub_tests {
    use super::*;
    use flowpack_io::MemoryEndpoint;

    #[test]
    fn test_stub_fails_without_panicking() {
        let mut endpoint = MemoryEndpoint::new();
        let mut backend = FrameBackend::new(3, BufferSize::default());

        let err = backend.initialize(Direction::Write).unwrap_err();
        assert!(err.to_string().contains("not supported"));
        assert!(backend.write(&mut endpoint, b"data").is_err());
        assert!(backend.read(&mut endpoint, &mut [0u8; 8]).is_err());
    }
}

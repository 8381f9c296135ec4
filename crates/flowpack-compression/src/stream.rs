//! The compression stream façade
//!
//! [`CompressorStream`] wraps a sequential endpoint and a codec backend:
//! bytes written to the stream are compressed before they reach the
//! endpoint, bytes read are decompressed as they arrive. A session is
//! strictly one-directional; the direction is fixed by `open` and released
//! by `close`.

use flowpack_io::Endpoint;
use flowpack_types::{BufferSize, Direction, Error, Result, StreamState};
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::format::FormatSpec;

/// A transparent compression/decompression stream over a sequential endpoint
///
/// The stream owns its endpoint; pass `&mut endpoint` instead to keep using
/// the endpoint afterwards (for example to read a second concatenated
/// stream from where the first one ended).
pub struct CompressorStream<E: Endpoint> {
    endpoint: E,
    spec: FormatSpec,
    buffer_size: BufferSize,
    backend: Option<Backend>,
    direction: Option<Direction>,
    manage_endpoint: bool,
    last_error: Option<Error>,
}

impl<E: Endpoint> CompressorStream<E> {
    /// Create a stream over `endpoint` with the default buffer size
    pub fn new(endpoint: E, spec: FormatSpec) -> Self {
        Self::with_buffer_size(endpoint, spec, BufferSize::default())
    }

    /// Create a stream with an explicit scratch buffer size hint
    ///
    /// Backends may raise the hint to their codec's recommended chunk size.
    pub fn with_buffer_size(endpoint: E, spec: FormatSpec, buffer_size: BufferSize) -> Self {
        Self {
            endpoint,
            spec,
            buffer_size,
            backend: None,
            direction: None,
            manage_endpoint: false,
            last_error: None,
        }
    }

    /// Open a session in the given direction
    ///
    /// If the endpoint is closed it is opened here and closed again by
    /// [`close`](Self::close); if it is already open, its direction must
    /// match. Fails if a session is already open or the selected codec is
    /// not available in this build, leaving the stream closed.
    pub fn open(&mut self, direction: Direction) -> Result<()> {
        if self.backend.is_some() {
            return Err(self.record(Error::config("stream is already open")));
        }

        if self.endpoint.is_open() {
            if self.endpoint.open_direction() != Some(direction) {
                return Err(self.record(Error::config(
                    "underlying endpoint is open in an incompatible direction",
                )));
            }
            self.manage_endpoint = false;
        } else {
            if let Err(e) = self.endpoint.open(direction) {
                let error = Error::endpoint(format!(
                    "error opening underlying endpoint: {}",
                    e.message()
                ));
                return Err(self.record(error));
            }
            self.manage_endpoint = true;
        }

        let mut backend = Backend::new(&self.spec, self.buffer_size);
        if let Err(e) = backend.initialize(direction) {
            if self.manage_endpoint {
                self.endpoint.close();
                self.manage_endpoint = false;
            }
            return Err(self.record(e));
        }

        debug!("Opened compression stream for {:?}", direction);
        self.backend = Some(backend);
        self.direction = Some(direction);
        self.last_error = None;
        Ok(())
    }

    /// Close the session, finalizing the backend
    ///
    /// In Write direction this drains every pending compressed byte to the
    /// endpoint before returning. Closing an already-closed stream is a
    /// no-op; a finalize failure is recorded but the endpoint is still
    /// closed when this stream opened it, so no resource leaks.
    pub fn close(&mut self) {
        let Some(mut backend) = self.backend.take() else {
            return;
        };
        let direction = self.direction.take().unwrap_or(Direction::Read);

        if let Err(e) = backend.finalize(&mut self.endpoint, direction) {
            warn!("Failed to finalize compression stream: {}", e);
            self.last_error = Some(e);
        }

        if self.manage_endpoint {
            self.endpoint.close();
            self.manage_endpoint = false;
        }
        debug!("Closed compression stream");
    }

    /// Read and decompress up to `buf.len()` bytes
    ///
    /// Returns 0 at the end of the logical stream, when the source is
    /// empty, or when the endpoint has no more bytes right now; in the
    /// last case the call can simply be retried once more data exists.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.backend.is_none() || self.direction != Some(Direction::Read) {
            return Err(self.record(Error::config("stream is not open for reading")));
        }
        match self.state() {
            StreamState::EndOfStream => return Ok(0),
            StreamState::Error => return Err(self.sticky_error()),
            _ => {}
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let result = match self.backend.as_mut() {
            Some(backend) => backend.read(&mut self.endpoint, buf),
            None => return Err(Error::config("stream is not open for reading")),
        };
        match result {
            Ok(n) => Ok(n),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Compress and write all of `data`
    ///
    /// An empty `data` is a no-op that never touches the endpoint.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.backend.is_none() || self.direction != Some(Direction::Write) {
            return Err(self.record(Error::config("stream is not open for writing")));
        }
        if data.is_empty() {
            return Ok(0);
        }
        if self.state() == StreamState::Error {
            return Err(self.sticky_error());
        }

        let result = match self.backend.as_mut() {
            Some(backend) => backend.write(&mut self.endpoint, data),
            None => return Err(Error::config("stream is not open for writing")),
        };
        match result {
            Ok(n) => Ok(n),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Push all buffered compressed bytes to the endpoint without ending
    /// the stream
    ///
    /// Forces the codec to emit a sync point, so frequent flushing
    /// increases the compressed size; that is the documented trade-off,
    /// not a defect. Writing may continue afterwards. A no-op on streams
    /// that are closed or open for reading.
    pub fn flush(&mut self) -> Result<()> {
        if self.backend.is_none() || self.direction != Some(Direction::Write) {
            return Ok(());
        }
        if self.state() == StreamState::Error {
            return Err(self.sticky_error());
        }

        let result = match self.backend.as_mut() {
            Some(backend) => backend.flush(&mut self.endpoint),
            None => return Ok(()),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.record(e)),
        }
    }

    /// Whether a read may yield more bytes: 1 until the end of the stream
    /// or an error, 0 afterwards
    ///
    /// Compressed and decompressed sizes are decoupled, so this can never
    /// be a byte count; remaining raw bytes may all belong to the
    /// stream's trailer and produce nothing.
    pub fn bytes_available(&self) -> u64 {
        if self.direction != Some(Direction::Read) {
            return 0;
        }
        match self.state() {
            StreamState::AwaitingFirstByte | StreamState::InStream => 1,
            _ => 0,
        }
    }

    /// Streams are strictly sequential; there is no seeking
    pub fn is_sequential(&self) -> bool {
        true
    }

    /// Whether a session is currently open
    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// The direction of the open session, if any
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        self.backend
            .as_ref()
            .map_or(StreamState::Closed, Backend::state)
    }

    /// The format this stream was configured with
    pub fn format(&self) -> FormatSpec {
        self.spec
    }

    /// Human-readable description of the last error, if any
    pub fn error_description(&self) -> Option<String> {
        self.last_error.as_ref().map(|e| e.to_string())
    }

    /// A shared reference to the underlying endpoint
    pub fn get_ref(&self) -> &E {
        &self.endpoint
    }

    /// A mutable reference to the underlying endpoint
    ///
    /// Touching the endpoint while a session is open can corrupt the
    /// stream.
    pub fn get_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }

    fn record(&mut self, error: Error) -> Error {
        self.last_error = Some(error.clone());
        error
    }

    fn sticky_error(&self) -> Error {
        self.last_error
            .clone()
            .unwrap_or_else(|| Error::codec("stream is in the error state"))
    }
}

impl<E: Endpoint> Drop for CompressorStream<E> {
    fn drop(&mut self) {
        self.close();
    }
}

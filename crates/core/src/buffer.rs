// Output Buffer - segmented byte store for child stdout/stderr
//
// Output of unbounded size is kept as a chain of fixed-capacity segments.
// Only the tail segment may be partially filled.

use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::constants::{DRAIN_CHUNK_SIZE, SEGMENT_CAPACITY};

/// Growable buffer made of fixed-capacity segments
#[derive(Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    segments: Vec<Vec<u8>>,
    segment_capacity: usize,
}

impl OutputBuffer {
    /// Create an empty buffer with the default segment capacity
    pub fn new() -> Self {
        Self::with_segment_capacity(SEGMENT_CAPACITY)
    }

    /// Create an empty buffer whose segments hold `segment_capacity` bytes (minimum 1)
    pub fn with_segment_capacity(segment_capacity: usize) -> Self {
        Self {
            segments: Vec::new(),
            segment_capacity: segment_capacity.max(1),
        }
    }

    pub fn segment_capacity(&self) -> usize {
        self.segment_capacity
    }

    /// Append bytes, spilling into new segments whenever the tail fills up
    pub fn append(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let capacity = self.segment_capacity;
            let tail = self.tail_with_space();
            let take = (capacity - tail.len()).min(bytes.len());
            tail.extend_from_slice(&bytes[..take]);
            bytes = &bytes[take..];
        }
    }

    /// Read from `reader` until end-of-stream, returning the number of bytes read.
    ///
    /// Every completed read is appended before the next one starts, so if the
    /// returned future is dropped early the buffer still holds everything read
    /// up to that point.
    pub async fn fill_from<R>(&mut self, reader: &mut R) -> io::Result<usize>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut chunk = vec![0u8; DRAIN_CHUNK_SIZE.min(self.segment_capacity)];
        let mut total = 0;

        loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) => return Ok(total),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.append(&chunk[..n]);
            total += n;
        }
    }

    /// Write every segment, in order, to `writer`
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        for segment in &self.segments {
            writer.write_all(segment).await?;
        }
        Ok(())
    }

    /// Total number of bytes held (summed over segments on every call)
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Filled part of each segment, in arrival order
    pub fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.segments.iter().map(Vec::as_slice)
    }

    /// Copy the contents into one contiguous vector
    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        for segment in &self.segments {
            bytes.extend_from_slice(segment);
        }
        bytes
    }

    fn tail_with_space(&mut self) -> &mut Vec<u8> {
        let needs_segment = self
            .segments
            .last()
            .map_or(true, |tail| tail.len() == self.segment_capacity);

        if needs_segment {
            self.segments
                .push(Vec::with_capacity(self.segment_capacity));
        }

        let last = self.segments.len() - 1;
        &mut self.segments[last]
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&[u8]> for OutputBuffer {
    fn from(bytes: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.append(bytes);
        buffer
    }
}

impl fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputBuffer")
            .field("len", &self.len())
            .field("segments", &self.segments.len())
            .field("segment_capacity", &self.segment_capacity)
            .finish()
    }
}

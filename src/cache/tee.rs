//! Tee reader: every byte handed to the consumer is copied into a sink.

use std::io::{self, Read, Write};

/// Reader adapter that mirrors everything read from `reader` into `sink`.
///
/// Only bytes the consumer actually reads are copied. A sink write failure
/// surfaces as a read error so the consumer aborts.
pub struct TeeReader<R, W> {
    reader: R,
    sink: W,
}

impl<R: Read, W: Write> TeeReader<R, W> {
    pub fn new(reader: R, sink: W) -> Self {
        Self { reader, sink }
    }
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.sink.write_all(&buf[..n])?;
        Ok(n)
    }
}

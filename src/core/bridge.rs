//! Bounded in-memory byte stream between two threads.
//!
//! The writer half blocks once `capacity` chunks are queued and resumes when
//! the reader drains them. Dropping the writer is end-of-stream for the
//! reader; dropping the reader makes further writes fail with `BrokenPipe`,
//! so a producer never outlives an abandoned consumer.

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, SyncSender};

/// Chunks queued between producer and consumer before the producer blocks.
pub const DEFAULT_CAPACITY: usize = 16;

pub fn bridge(capacity: usize) -> (BridgeWriter, BridgeReader) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (
        BridgeWriter { tx },
        BridgeReader {
            rx,
            pending: Vec::new(),
            pos: 0,
        },
    )
}

pub struct BridgeWriter {
    tx: SyncSender<Vec<u8>>,
}

impl Write for BridgeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "bridge reader closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct BridgeReader {
    rx: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pos: usize,
}

impl Read for BridgeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.pos >= self.pending.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                // Writer dropped: end of stream.
                Err(_) => return Ok(0),
            }
        }

        let available = &self.pending[self.pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn bytes_arrive_in_order() {
        let (mut writer, mut reader) = bridge(2);

        let producer = thread::spawn(move || {
            for i in 0..100u8 {
                writer.write_all(&[i; 10]).unwrap();
            }
        });

        let mut received = Vec::new();
        reader.read_to_end(&mut received).unwrap();
        producer.join().unwrap();

        let expected: Vec<u8> = (0..100u8).flat_map(|i| [i; 10]).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn dropped_writer_is_end_of_stream() {
        let (writer, mut reader) = bridge(1);
        drop(writer);

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn dropped_reader_breaks_writer() {
        let (mut writer, reader) = bridge(1);
        drop(reader);

        let err = writer.write(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn small_reads_drain_large_chunks() {
        let (mut writer, mut reader) = bridge(1);
        writer.write_all(b"abcdef").unwrap();
        drop(writer);

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}

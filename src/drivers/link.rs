use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::warn;

use crate::error::{AcquisitionError, AcquisitionResult};

/// Longest line kept while waiting for a newline; anything longer is noise.
pub const MAX_LINE_BYTES: usize = 4096;

/// A connection that yields newline-terminated lines.
///
/// `read_line` returns `Ok(None)` when no complete line arrived within the
/// link's read timeout, so callers can check for cancellation between reads.
pub trait DeviceLink: Send {
    fn read_line(&mut self) -> AcquisitionResult<Option<Vec<u8>>>;
    /// Releases the connection. Calling it again does nothing.
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn name(&self) -> &str;
}

impl DeviceLink for Box<dyn DeviceLink> {
    fn read_line(&mut self) -> AcquisitionResult<Option<Vec<u8>>> {
        (**self).read_line()
    }
    fn close(&mut self) {
        (**self).close()
    }
    fn is_open(&self) -> bool {
        (**self).is_open()
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Splits a byte stream with read timeouts into lines.
///
/// Bytes of an unfinished line survive a timeout and are completed by the
/// next call.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(64),
        }
    }

    pub fn poll_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut chunk = [0u8; 256];
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                return Ok(Some(line));
            }
            if self.pending.len() > MAX_LINE_BYTES {
                warn!(
                    "discarding {} bytes without a line terminator",
                    self.pending.len()
                );
                self.pending.clear();
            }
            match self.inner.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "device closed the connection",
                    ))
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// In-memory link useful for tests and deterministic playback.
///
/// Once the scripted lines run out it either reports a disconnect (the
/// default) or idles like a silent device.
pub struct ManualLink {
    lines: VecDeque<Vec<u8>>,
    idle_when_drained: Option<Duration>,
    closed: Arc<AtomicBool>,
}

impl ManualLink {
    pub fn new<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Vec<u8>>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            idle_when_drained: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// After the script, return `Ok(None)` every `poll` instead of failing.
    pub fn then_idle(mut self, poll: Duration) -> Self {
        self.idle_when_drained = Some(poll);
        self
    }

    /// Flag that flips to `true` once the link has been closed.
    pub fn close_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl DeviceLink for ManualLink {
    fn read_line(&mut self) -> AcquisitionResult<Option<Vec<u8>>> {
        if !self.is_open() {
            return Err(AcquisitionError::Read(io::Error::new(
                ErrorKind::NotConnected,
                "link is closed",
            )));
        }
        if let Some(line) = self.lines.pop_front() {
            return Ok(Some(line));
        }
        match self.idle_when_drained {
            Some(poll) => {
                thread::sleep(poll);
                Ok(None)
            }
            None => Err(AcquisitionError::Read(io::Error::new(
                ErrorKind::UnexpectedEof,
                "script exhausted",
            ))),
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that times out between scripted chunks.
    struct Chunked {
        chunks: VecDeque<Option<Vec<u8>>>,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Some(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(None) => Err(io::Error::new(ErrorKind::TimedOut, "timeout")),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn splits_lines_and_reports_eof() {
        let mut reader = LineReader::new(Cursor::new(b"1.5\r\n2.5\n".to_vec()));
        assert_eq!(reader.poll_line().unwrap(), Some(b"1.5\r\n".to_vec()));
        assert_eq!(reader.poll_line().unwrap(), Some(b"2.5\n".to_vec()));
        let err = reader.poll_line().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }

    #[test]
    fn partial_line_survives_timeout() {
        let mut reader = LineReader::new(Chunked {
            chunks: VecDeque::from(vec![
                Some(b"12".to_vec()),
                None,
                Some(b".75\n".to_vec()),
            ]),
        });
        assert_eq!(reader.poll_line().unwrap(), None);
        assert_eq!(reader.poll_line().unwrap(), Some(b"12.75\n".to_vec()));
    }

    #[test]
    fn overlong_garbage_is_dropped() {
        let mut data = vec![b'x'; MAX_LINE_BYTES + 300];
        data.extend_from_slice(b"\n7\n");
        let mut reader = LineReader::new(Cursor::new(data));
        let first = reader.poll_line().unwrap().unwrap();
        assert!(first.len() < MAX_LINE_BYTES);
        assert_eq!(reader.poll_line().unwrap(), Some(b"7\n".to_vec()));
    }

    #[test]
    fn manual_link_plays_script_then_disconnects() {
        let mut link = ManualLink::new(["1\n", "2\n"]);
        assert_eq!(link.read_line().unwrap(), Some(b"1\n".to_vec()));
        assert_eq!(link.read_line().unwrap(), Some(b"2\n".to_vec()));
        assert!(matches!(link.read_line(), Err(AcquisitionError::Read(_))));
    }

    #[test]
    fn manual_link_close_is_idempotent() {
        let mut link = ManualLink::new(Vec::<Vec<u8>>::new()).then_idle(Duration::from_millis(1));
        let flag = link.close_flag();
        assert_eq!(link.read_line().unwrap(), None);
        link.close();
        link.close();
        assert!(flag.load(Ordering::SeqCst));
        assert!(!link.is_open());
        assert!(link.read_line().is_err());
    }
}

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::bus::{DeviceCtx, Line, Peripheral};

pub const OUTPUT: u16 = 0;
pub const INPUT: u16 = 1;
pub const PENDING: u16 = 2;

pub const DEFAULT_CAPACITY: usize = 256;
const JOIN_POLLS: usize = 50;

/// Receives I/O errors from the reader thread.
pub type ErrorListener = Box<dyn Fn(io::Error) + Send>;

type Buffer = Arc<Mutex<VecDeque<u16>>>;

/// Character console.
///
/// Writing offset 0 emits the low byte to the output sink. Reading offset 1
/// pops one buffered input byte, or 0 when nothing is waiting; it never blocks.
/// Reading offset 2 gives the number of buffered bytes.
///
/// Input is fed by a background thread reading from the source handed to
/// [`Console::with_input`]. The thread starts on attach and is stopped on detach.
pub struct Console {
    out: Box<dyn Write + Send>,
    source: Option<Box<dyn Read + Send>>,
    listener: Option<ErrorListener>,
    capacity: usize,
    buf: Buffer,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl Console {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Box::new(out),
            source: None,
            listener: None,
            capacity: DEFAULT_CAPACITY,
            buf: Arc::default(),
            stop: Arc::new(AtomicBool::new(false)),
            reader: None,
        }
    }

    pub fn with_input(mut self, src: impl Read + Send + 'static) -> Self {
        self.source = Some(Box::new(src));
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Without a listener, reader errors are logged and end the input stream.
    pub fn on_error(mut self, listener: impl Fn(io::Error) + Send + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn buffered(&self) -> usize {
        self.buf.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn pop(&self) -> u16 {
        self.buf
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or(0)
    }

    fn spawn_reader(&mut self) {
        let Some(src) = self.source.take() else {
            return;
        };
        self.stop.store(false, Ordering::SeqCst);
        let feed = Feed {
            src,
            buf: Arc::clone(&self.buf),
            stop: Arc::clone(&self.stop),
            capacity: self.capacity,
            listener: self.listener.take(),
        };
        match thread::Builder::new()
            .name("console-input".into())
            .spawn(move || feed.run())
        {
            Ok(h) => self.reader = Some(h),
            Err(e) => warn!(error = %e, "could not start console reader"),
        }
    }
}

struct Feed {
    src: Box<dyn Read + Send>,
    buf: Buffer,
    stop: Arc<AtomicBool>,
    capacity: usize,
    listener: Option<ErrorListener>,
}

impl Feed {
    fn run(mut self) {
        let mut chunk = [0u8; 64];
        while !self.stop.load(Ordering::SeqCst) {
            let n = match self.src.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    match &self.listener {
                        Some(l) => l(e),
                        None => warn!(error = %e, "console input failed; treating as end of input"),
                    }
                    break;
                }
            };
            for &byte in &chunk[..n] {
                if !self.offer(byte as u16) {
                    return;
                }
            }
        }
        debug!("console reader finished");
    }

    /// Waits for room in the buffer. Returns false when asked to stop first.
    fn offer(&self, word: u16) -> bool {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return false;
            }
            match self.buf.lock() {
                Ok(mut q) if q.len() < self.capacity => {
                    q.push_back(word);
                    return true;
                }
                Ok(_) => {}
                Err(_) => return false,
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Peripheral for Console {
    fn name(&self) -> &str {
        "console"
    }

    fn on_attach(&mut self, _line: Option<Line>) {
        self.spawn_reader();
    }

    fn on_detach(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(h) = self.reader.take() {
            // A reader parked in a blocking read exits once that read returns.
            for _ in 0..JOIN_POLLS {
                if h.is_finished() {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
            if h.is_finished() {
                if h.join().is_err() {
                    warn!("console reader panicked");
                }
            } else {
                debug!("console reader still blocked in read; leaving it to exit");
            }
        }
        if let Err(e) = self.out.flush() {
            warn!(error = %e, "console flush failed");
        }
    }

    fn on_read(&mut self, offset: u16, _ctx: &mut DeviceCtx<'_>) -> u16 {
        match offset {
            INPUT => self.pop(),
            PENDING => self.buffered().min(u16::MAX as usize) as u16,
            _ => 0,
        }
    }

    fn on_write(&mut self, offset: u16, new: u16, _old: u16, _ctx: &mut DeviceCtx<'_>) {
        if offset != OUTPUT {
            return;
        }
        if let Err(e) = self.out.write_all(&[new as u8]).and_then(|_| self.out.flush()) {
            warn!(error = %e, "console write failed");
        }
    }
}

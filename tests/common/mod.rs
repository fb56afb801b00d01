//! Scripted codec for driving the pool from integration tests.
//!
//! Inputs are JPEG magic bytes followed by a marker that tells the codec how
//! to behave: `CORRUPT` fails decoding, `PANIC` panics, `STALL` blocks until
//! the test opens the stall gate, `SLOW` sleeps briefly and `FLAKY` fails
//! the first time it is seen. Successful encodes halve the input size.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;

use image_compressor_lib::processing::{Bitmap, CodecError};
use image_compressor_lib::{
    AppState,
    Codec,
    CodecFactory,
    CompressorConfig,
    ImageItem,
    OutputFormat,
    SignalProbe,
    SourceFormat,
};

const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

#[derive(Default)]
pub struct Tracker {
    active: AtomicUsize,
    peak: AtomicUsize,
    decodes: AtomicUsize,
    flaky_failures: AtomicUsize,
}

impl Tracker {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct ScriptedCodecs {
    pub tracker: Arc<Tracker>,
    stall: Arc<Mutex<Option<mpsc::Receiver<()>>>>,
    /// Fails `create` for every context when set
    pub broken: bool,
}

impl ScriptedCodecs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self { broken: true, ..Self::default() })
    }

    /// Arms the stall gate. Stalled decodes wait until the sender fires or is dropped.
    pub fn stall_gate(&self) -> mpsc::Sender<()> {
        let (tx, rx) = mpsc::channel();
        *self.stall.lock() = Some(rx);
        tx
    }
}

impl CodecFactory for ScriptedCodecs {
    fn create(&self, _base_url: &str) -> Result<Box<dyn Codec>, CodecError> {
        if self.broken {
            return Err(CodecError::Unavailable("codec module failed to load".to_string()));
        }
        Ok(Box::new(ScriptedCodec {
            tracker: Arc::clone(&self.tracker),
            stall: Arc::clone(&self.stall),
        }))
    }
}

struct ScriptedCodec {
    tracker: Arc<Tracker>,
    stall: Arc<Mutex<Option<mpsc::Receiver<()>>>>,
}

fn has_marker(bytes: &[u8], marker: &[u8]) -> bool {
    bytes.windows(marker.len()).any(|w| w == marker)
}

impl Codec for ScriptedCodec {
    fn decode(&mut self, bytes: &[u8], format: SourceFormat) -> Result<Bitmap, CodecError> {
        self.tracker.enter();
        let outcome = self.script(bytes, format);
        self.tracker.leave();
        outcome
    }

    fn encode(&mut self, bitmap: &Bitmap, _format: OutputFormat, _quality: u8) -> Result<Vec<u8>, CodecError> {
        let mut out = JPEG_MAGIC.to_vec();
        out.resize((bitmap.rgba.len() / 2).max(JPEG_MAGIC.len()), 0);
        Ok(out)
    }
}

impl ScriptedCodec {
    fn script(&self, bytes: &[u8], format: SourceFormat) -> Result<Bitmap, CodecError> {
        if has_marker(bytes, b"CORRUPT") {
            return Err(CodecError::Decode { format, message: "corrupt data".to_string() });
        }
        if has_marker(bytes, b"PANIC") {
            panic!("scripted codec panic");
        }
        if has_marker(bytes, b"FLAKY") && self.tracker.flaky_failures.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(CodecError::Decode { format, message: "transient failure".to_string() });
        }
        if has_marker(bytes, b"STALL") {
            // Take the gate out so the lock is not held while blocked.
            let gate = self.stall.lock().take();
            if let Some(gate) = gate {
                let _ = gate.recv_timeout(Duration::from_secs(10));
            }
        }
        if has_marker(bytes, b"SLOW") {
            std::thread::sleep(Duration::from_millis(40));
        }
        Ok(Bitmap { width: bytes.len() as u32, height: 1, rgba: bytes.to_vec() })
    }
}

/// A JPEG-looking input of `len` bytes carrying `marker`.
pub fn jpeg_input(marker: &str, len: usize) -> Vec<u8> {
    let mut bytes = JPEG_MAGIC.to_vec();
    bytes.extend_from_slice(marker.as_bytes());
    bytes.resize(len.max(bytes.len()), 0);
    bytes
}

pub fn item(name: &str, marker: &str) -> ImageItem {
    ImageItem::from_bytes(name, jpeg_input(marker, 1000))
}

/// State on an 8-core desktop (max parallelism 7) backed by `codecs`.
pub fn state(codecs: &Arc<ScriptedCodecs>) -> AppState {
    AppState::new(CompressorConfig::default())
        .with_probe(&SignalProbe::desktop(8))
        .with_codecs(Arc::clone(codecs) as Arc<dyn CodecFactory>)
}

//! Synthetic images and fake platform objects shared by unit tests.

use anyhow::{bail, Result};
use image::Rgb;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::capture::{BgrImage, ForegroundOracle, Region, ScreenGrabber};
use crate::rotation::input::{HotkeyProbe, KeyCombo, KeySender};

/// Deterministic uniform noise.
pub fn noise_image(width: u32, height: u32, seed: u64) -> BgrImage {
    let mut rng = StdRng::seed_from_u64(seed);
    BgrImage::from_fn(width, height, |_, _| {
        Rgb([rng.gen_range(0..=255), rng.gen_range(0..=255), rng.gen_range(0..=255)])
    })
}

/// Copies `tpl` into `frame` with its top-left corner at (x, y).
pub fn paste(frame: &mut BgrImage, tpl: &BgrImage, x: u32, y: u32) {
    for (tx, ty, pixel) in tpl.enumerate_pixels() {
        frame.put_pixel(x + tx, y + ty, *pixel);
    }
}

/// Foreground oracle whose answer can be flipped from a test.
pub struct FakeForeground(pub AtomicBool);

impl FakeForeground {
    pub fn new(value: bool) -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(value)))
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }
}

impl ForegroundOracle for FakeForeground {
    fn is_target_foreground(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Grabber that returns a copy of a frame the test can swap out.
pub struct FixedGrabber {
    pub frame: Arc<Mutex<BgrImage>>,
    pub calls: Arc<AtomicUsize>,
}

impl FixedGrabber {
    pub fn new(frame: BgrImage) -> Self {
        Self {
            frame: Arc::new(Mutex::new(frame)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ScreenGrabber for FixedGrabber {
    fn grab(&mut self, _region: &Region) -> Result<BgrImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.frame.lock().unwrap().clone())
    }
}

/// Grabber that panics on every call.
pub struct PanickingGrabber(pub Arc<AtomicUsize>);

impl ScreenGrabber for PanickingGrabber {
    fn grab(&mut self, _region: &Region) -> Result<BgrImage> {
        self.0.fetch_add(1, Ordering::SeqCst);
        panic!("capture driver crashed");
    }
}

pub struct FailingGrabber;

impl ScreenGrabber for FailingGrabber {
    fn grab(&mut self, _region: &Region) -> Result<BgrImage> {
        bail!("device lost")
    }
}

/// Key sender that records every press as its display string.
#[derive(Clone, Default)]
pub struct RecordingKeys {
    pub pressed: Arc<Mutex<Vec<String>>>,
}

impl RecordingKeys {
    pub fn presses(&self) -> Vec<String> {
        self.pressed.lock().unwrap().clone()
    }
}

impl KeySender for RecordingKeys {
    fn press(&mut self, key: &KeyCombo) -> Result<()> {
        self.pressed.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

pub struct FailingKeys;

impl KeySender for FailingKeys {
    fn press(&mut self, key: &KeyCombo) -> Result<()> {
        bail!("injection blocked for {}", key)
    }
}

/// Hotkey whose held state can be flipped from a test.
#[derive(Clone)]
pub struct FakeHotkey(pub Arc<AtomicBool>);

impl FakeHotkey {
    pub fn new(held: bool) -> Self {
        Self(Arc::new(AtomicBool::new(held)))
    }

    pub fn set(&self, held: bool) {
        self.0.store(held, Ordering::SeqCst);
    }
}

impl HotkeyProbe for FakeHotkey {
    fn is_held(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

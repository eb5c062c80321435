//! Capture stand-ins for platforms without a native implementation.
//!
//! The stub oracle never reports the target as foregrounded, so the engine
//! idles instead of grabbing or pressing anything.

use anyhow::{bail, Result};

use super::{BgrImage, ForegroundOracle, Region, ScreenGrabber};

pub struct StubForeground;

impl StubForeground {
    pub fn new(target_process: &str) -> Self {
        crate::log(&format!(
            "stub: foreground checks for \"{}\" always report background",
            target_process
        ));
        Self
    }
}

impl ForegroundOracle for StubForeground {
    fn is_target_foreground(&self) -> bool {
        false
    }
}

pub struct StubGrabber;

impl ScreenGrabber for StubGrabber {
    fn grab(&mut self, region: &Region) -> Result<BgrImage> {
        bail!("stub: screen capture of {:?} is not supported on this platform", region)
    }
}

//! Recording [`Effects`] double for tests.

use crate::effects::{Cue, Effects};
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records every effect instead of running it.
#[derive(Debug, Default)]
pub struct RecordingEffects {
    cues: Mutex<Vec<Cue>>,
    alerts: AtomicUsize,
    bans: Mutex<Vec<IpAddr>>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cues played so far, in order.
    pub fn cues(&self) -> Vec<Cue> {
        self.cues.lock().clone()
    }

    pub fn count(&self, cue: Cue) -> usize {
        self.cues.lock().iter().filter(|played| **played == cue).count()
    }

    pub fn alerts(&self) -> usize {
        self.alerts.load(Ordering::SeqCst)
    }

    pub fn bans(&self) -> Vec<IpAddr> {
        self.bans.lock().clone()
    }
}

impl Effects for RecordingEffects {
    fn play(&self, cue: Cue) {
        self.cues.lock().push(cue);
    }

    fn send_open_door_alert(&self) {
        self.alerts.fetch_add(1, Ordering::SeqCst);
    }

    fn ban(&self, ip: IpAddr) {
        self.bans.lock().push(ip);
    }
}

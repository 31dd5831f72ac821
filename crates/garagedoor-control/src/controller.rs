//! The state-owning door controller.

use crate::automation::{self, CloseAutomation, Step, Toggled};
use crate::broadcast::{StatusRegistry, StatusSubscription};
use crate::effects::{Cue, DisarmFlag, Effects};
use crate::sensors::SensorModel;
use crate::watchdog::{Check, Watchdog};
use garagedoor_core::constants::*;
use garagedoor_core::{ArmedStatus, Config, RollupStatus, StatusReport};
use garagedoor_hardware::{DigitalIo, Level, OutputPin};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fixed delays used by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Relay closed time for one press.
    pub button_hold: Duration,
    /// Motor LED hold when the disarm flag suppresses the relay.
    pub disarmed_hold: Duration,
    pub light_show: Duration,
    pub close_poll: Duration,
    /// Pause after opening a closed door before the close loop starts.
    pub open_settle: Duration,
    pub debounce: Duration,
    pub watchdog_interval: Duration,
    pub status_interval: Duration,
    pub status_wake_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            button_hold: Duration::from_millis(BUTTON_HOLD_MS),
            disarmed_hold: Duration::from_millis(DISARMED_HOLD_MS),
            light_show: Duration::from_millis(LIGHT_SHOW_MS),
            close_poll: Duration::from_millis(CLOSE_POLL_INTERVAL_MS),
            open_settle: Duration::from_millis(OPEN_SETTLE_MS),
            debounce: Duration::from_millis(DEBOUNCE_WINDOW_MS),
            watchdog_interval: Duration::from_millis(WATCHDOG_INTERVAL_MS),
            status_interval: Duration::from_millis(STATUS_INTERVAL_MS),
            status_wake_interval: Duration::from_millis(STATUS_WAKE_INTERVAL_MS),
        }
    }
}

/// Owns the close automation flag, the watchdog slot and the subscription
/// registry, and performs every physical action on the door.
///
/// Shared as `Arc<DoorController>`; methods that start background tasks
/// take `self: &Arc<Self>`.
///
/// # Examples
///
/// ```
/// use garagedoor_control::{DoorController, mock::RecordingEffects};
/// use garagedoor_core::{ArmedStatus, RollupStatus};
/// use garagedoor_hardware::mock::SimulatedBoard;
/// use std::sync::Arc;
///
/// let (board, _handle) = SimulatedBoard::new();
/// let controller = DoorController::builder(Arc::new(board), Arc::new(RecordingEffects::new()))
///     .build();
///
/// let report = controller.status_report();
/// assert_eq!(report.rollup, RollupStatus::Closed);
/// assert_eq!(report.armed, ArmedStatus::Disarmed);
/// ```
pub struct DoorController {
    io: Arc<dyn DigitalIo>,
    sensors: SensorModel,
    effects: Arc<dyn Effects>,
    disarm: DisarmFlag,
    timings: Timings,
    close_time: RwLock<Duration>,
    automation: CloseAutomation,
    watchdog: Watchdog,
    registry: StatusRegistry,
}

impl DoorController {
    pub fn builder(io: Arc<dyn DigitalIo>, effects: Arc<dyn Effects>) -> ControllerBuilder {
        ControllerBuilder::new(io, effects)
    }

    pub fn sensors(&self) -> &SensorModel {
        &self.sensors
    }

    pub fn io(&self) -> &Arc<dyn DigitalIo> {
        &self.io
    }

    pub fn effects(&self) -> &dyn Effects {
        self.effects.as_ref()
    }

    pub fn registry(&self) -> &StatusRegistry {
        &self.registry
    }

    pub fn automation(&self) -> &CloseAutomation {
        &self.automation
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn timings(&self) -> Timings {
        self.timings
    }

    pub fn close_time(&self) -> Duration {
        *self.close_time.read()
    }

    /// Applies to the next poll of a running close task.
    pub fn set_close_time(&self, close_time: Duration) {
        let mut current = self.close_time.write();
        if *current != close_time {
            info!(close_time_ms = close_time.as_millis() as u64, "Close time updated");
            *current = close_time;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.automation.is_running()
    }

    /// Compose the four current states.
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            rollup: self.sensors.rollup(),
            door: self.sensors.back_door(),
            beam: self.sensors.beam(),
            armed: self.automation.armed_status(),
        }
    }

    pub fn wake_subscribers(&self) {
        self.registry.wake_all();
    }

    pub(crate) fn drive(&self, pin: OutputPin, on: bool) {
        if let Err(e) = self.io.set_output(pin, Level::from_on(on)) {
            warn!(%pin, error = %e, "Unable to set output");
        }
    }

    /// Pulse the motor relay once.
    ///
    /// While the disarm flag exists the relay is left alone but the motor
    /// LED is still held, so remote observers see the same timing.
    pub async fn press_button(&self) {
        info!("Press button");
        self.drive(OutputPin::LedMotor, true);

        if self.disarm.is_disarmed() {
            tokio::time::sleep(self.timings.disarmed_hold).await;
            self.drive(OutputPin::LedMotor, false);
            info!(flag = %self.disarm.path().display(), "Exiting - disarmed");
            return;
        }

        self.drive(OutputPin::Relay, true);
        tokio::time::sleep(self.timings.button_hold).await;
        self.drive(OutputPin::Relay, false);
        self.drive(OutputPin::LedMotor, false);
    }

    /// Press if the door is closed. Returns whether a press happened.
    pub async fn open_door(&self) -> bool {
        let pressed = self.sensors.rollup() == RollupStatus::Closed;
        if pressed {
            self.press_button().await;
        }
        pressed
    }

    /// Press if the door is open. Returns whether a press happened.
    pub async fn close_door(&self) -> bool {
        let pressed = self.sensors.rollup() == RollupStatus::Open;
        if pressed {
            self.press_button().await;
        }
        pressed
    }

    /// Light every indicator LED for a moment.
    pub async fn light_show(&self) {
        for led in OutputPin::LEDS {
            self.drive(led, true);
        }
        tokio::time::sleep(self.timings.light_show).await;
        for led in OutputPin::LEDS {
            self.drive(led, false);
        }
    }

    /// Start close automation. No-op if it is already running.
    pub fn start_close_task(self: &Arc<Self>) -> bool {
        match self.automation.try_begin() {
            Some(generation) => {
                tokio::spawn(Arc::clone(self).run_close_task(generation));
                true
            }
            None => {
                debug!("Close task already running");
                false
            }
        }
    }

    /// Ask the running close task to stop.
    pub fn stop_close_task(&self) -> bool {
        self.automation.stop()
    }

    /// Stop close automation if it is running, else start it.
    pub fn toggle_close_task(self: &Arc<Self>) -> ArmedStatus {
        match self.automation.toggle() {
            Toggled::Started(generation) => {
                tokio::spawn(Arc::clone(self).run_close_task(generation));
                ArmedStatus::Armed
            }
            Toggled::Stopped => ArmedStatus::Disarmed,
        }
    }

    async fn run_close_task(self: Arc<Self>, generation: u64) {
        info!(
            close_time_ms = self.close_time().as_millis() as u64,
            "Close task run"
        );
        self.registry.wake_all();
        self.drive(OutputPin::LedWait, true);
        self.effects.play(Cue::CloseStart);

        if self.sensors.rollup() == RollupStatus::Closed {
            self.press_button().await;
            tokio::time::sleep(self.timings.open_settle).await;
        }

        info!("Close task waiting to close door");
        self.automation.mark_beam_clear(Instant::now());

        while self.automation.is_current(generation) {
            let beam = self.sensors.beam();
            let since_clear = self.automation.since_beam_clear(beam, Instant::now());
            let rollup = self.sensors.rollup();

            match automation::decide(since_clear, self.close_time(), beam, rollup) {
                Step::Wait => {}
                Step::Retry => {
                    info!("Close task closing door");
                    self.automation.mark_beam_clear(Instant::now());
                    self.press_button().await;
                }
                Step::Abort(status) => {
                    warn!(rollup = %status, "Door is not open");
                    break;
                }
                Step::Done => {
                    info!("Close task exiting because door is closed");
                    break;
                }
            }
            tokio::time::sleep(self.timings.close_poll).await;
        }

        if self.automation.finish(generation, || self.drive(OutputPin::LedWait, false)) {
            self.registry.wake_all();
            self.effects.play(Cue::CloseDone);
            info!("Close task done");
        }
    }

    /// Start a watchdog for the current open cycle, replacing any other.
    pub fn start_watchdog(self: &Arc<Self>) {
        let (generation, token) = self.watchdog.arm();
        debug!(generation, "Watchdog start");
        tokio::spawn(Arc::clone(self).run_watchdog(generation, token));
    }

    pub fn cancel_watchdog(&self) -> bool {
        self.watchdog.cancel()
    }

    async fn run_watchdog(self: Arc<Self>, generation: u64, token: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                () = tokio::time::sleep(self.timings.watchdog_interval) => {}
            }

            match self
                .watchdog
                .check(generation, &self.sensors, self.effects.as_ref())
            {
                Check::Alerted(_) => {}
                Check::Cancelled | Check::Closed => break,
            }
        }
        debug!(generation, "Watchdog done");
    }

    /// Start pushing status reports into `sender` until the returned handle
    /// is dropped or the receiver goes away.
    pub fn subscribe_status<T>(self: &Arc<Self>, sender: mpsc::Sender<T>) -> StatusSubscription
    where
        T: From<StatusReport> + Send + 'static,
    {
        StatusSubscription::spawn(Arc::clone(self), sender)
    }
}

impl std::fmt::Debug for DoorController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoorController")
            .field("disarm", &self.disarm)
            .field("timings", &self.timings)
            .field("close_time", &self.close_time())
            .field("automation", &self.automation)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for [`DoorController`].
pub struct ControllerBuilder {
    io: Arc<dyn DigitalIo>,
    effects: Arc<dyn Effects>,
    close_time: Duration,
    disarm_file: PathBuf,
    timings: Timings,
}

impl ControllerBuilder {
    fn new(io: Arc<dyn DigitalIo>, effects: Arc<dyn Effects>) -> Self {
        Self {
            io,
            effects,
            close_time: Duration::from_millis(DEFAULT_CLOSE_TIME_MS),
            disarm_file: PathBuf::from(DEFAULT_DISARM_FILE),
            timings: Timings::default(),
        }
    }

    /// Take close time and disarm file from the configuration.
    pub fn with_config(self, config: &Config) -> Self {
        self.with_close_time(config.close_time)
            .with_disarm_file(config.disarm_file.clone())
    }

    pub fn with_close_time(mut self, close_time: Duration) -> Self {
        self.close_time = close_time;
        self
    }

    pub fn with_disarm_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.disarm_file = path.into();
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn build(self) -> Arc<DoorController> {
        Arc::new(DoorController {
            sensors: SensorModel::new(Arc::clone(&self.io)),
            registry: StatusRegistry::new(Arc::clone(&self.io)),
            io: self.io,
            effects: self.effects,
            disarm: DisarmFlag::new(self.disarm_file),
            timings: self.timings,
            close_time: RwLock::new(self.close_time),
            automation: CloseAutomation::new(),
            watchdog: Watchdog::new(),
        })
    }
}

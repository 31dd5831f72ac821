//! Edge events to logical transitions.
//!
//! The closed and open sensors form one rollup group; the beam and the back
//! door are independent groups. Each group has its own [`DebounceGate`] and
//! its own dispatch task, so a burst on one sensor never delays another.
//! Buttons are not debounced and only act on the press (falling) edge.

use crate::controller::DoorController;
use crate::debounce::DebounceGate;
use crate::effects::Cue;
use garagedoor_core::{ArmedStatus, RollupStatus};
use garagedoor_hardware::{EdgeEvent, InputPin, Level, OutputPin};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Routes board edges into the controller.
#[derive(Debug)]
pub struct EventTranslator {
    controller: Arc<DoorController>,
    rollup_gate: DebounceGate,
    beam_gate: DebounceGate,
    back_door_gate: DebounceGate,
}

impl EventTranslator {
    pub fn new(controller: Arc<DoorController>) -> Self {
        let window = controller.timings().debounce;
        Self {
            controller,
            rollup_gate: DebounceGate::new(window),
            beam_gate: DebounceGate::new(window),
            back_door_gate: DebounceGate::new(window),
        }
    }

    /// Subscribe to every input and dispatch edges until the board stops
    /// delivering them.
    ///
    /// # Errors
    /// Returns the board error if a pin cannot be watched.
    pub fn spawn(self) -> garagedoor_hardware::Result<JoinSet<()>> {
        let translator = Arc::new(self);
        let io = Arc::clone(translator.controller.io());
        let groups: [&[InputPin]; 4] = [
            &[InputPin::Closed, InputPin::Open],
            &[InputPin::Beam],
            &[InputPin::BackDoor],
            &[InputPin::Button1, InputPin::Button2],
        ];

        let mut tasks = JoinSet::new();
        for pins in groups {
            let (sender, mut receiver) = mpsc::unbounded_channel();
            for pin in pins {
                io.subscribe_edge(*pin, sender.clone())?;
            }

            let translator = Arc::clone(&translator);
            tasks.spawn(async move {
                while let Some(event) = receiver.recv().await {
                    translator.handle(event);
                }
            });
        }
        Ok(tasks)
    }

    /// Handle one edge.
    pub fn handle(&self, event: EdgeEvent) {
        trace!(pin = %event.pin, level = ?event.level, "Edge");
        match event.pin {
            InputPin::Closed | InputPin::Open => self.on_rollup_edge(event.pin),
            InputPin::Beam => self.on_beam_edge(event.level),
            InputPin::BackDoor => self.on_back_door_edge(event.level),
            InputPin::Button1 | InputPin::Button2 => self.on_button(event.pin, event.level),
        }
    }

    fn on_rollup_edge(&self, pin: InputPin) {
        if !self.rollup_gate.try_accept() {
            return;
        }
        let controller = &self.controller;
        controller.wake_subscribers();

        match controller.sensors().rollup() {
            RollupStatus::Open => {
                controller.effects().play(Cue::Bell1);
                controller.drive(OutputPin::LedTransit, false);
                info!("Rollup door open");
                controller.start_watchdog();
            }
            RollupStatus::Closed => {
                controller.effects().play(Cue::Bell1);
                controller.drive(OutputPin::LedTransit, false);
                info!("Rollup door closed");
                controller.cancel_watchdog();
            }
            status => {
                controller.effects().play(Cue::Bell2);
                controller.drive(OutputPin::LedTransit, true);
                if pin == InputPin::Closed {
                    info!(rollup = %status, "Rollup door opening");
                } else {
                    info!(rollup = %status, "Rollup door closing");
                }
            }
        }
    }

    fn on_beam_edge(&self, level: Level) {
        if !self.beam_gate.try_accept() {
            return;
        }
        let controller = &self.controller;
        controller.wake_subscribers();
        let armed = controller.is_armed();

        if level.is_asserted() {
            controller.automation().clear_beam_timer();
            controller.drive(OutputPin::LedBeam, true);
            debug!("Beam blocked");
            if armed {
                controller.effects().play(Cue::BeamBlocked);
            }
        } else {
            controller.automation().mark_beam_clear(Instant::now());
            controller.drive(OutputPin::LedBeam, false);
            debug!("Beam clear");
            if armed {
                controller.effects().play(Cue::BeamClear);
            }
        }
    }

    fn on_back_door_edge(&self, level: Level) {
        if !self.back_door_gate.try_accept() {
            return;
        }
        self.controller.wake_subscribers();
        if level.is_asserted() {
            info!("Back door closed");
        } else {
            info!("Back door opened");
        }
    }

    fn on_button(&self, pin: InputPin, level: Level) {
        if !level.is_asserted() {
            return;
        }
        match pin {
            InputPin::Button1 => {
                info!("Button 1 press");
                match self.controller.toggle_close_task() {
                    ArmedStatus::Armed => info!("Button 1 starting task"),
                    ArmedStatus::Disarmed => info!("Button 1 aborted task"),
                }
            }
            _ => {
                info!("Button 2 press");
                let controller = Arc::clone(&self.controller);
                tokio::spawn(async move { controller.press_button().await });
            }
        }
    }
}

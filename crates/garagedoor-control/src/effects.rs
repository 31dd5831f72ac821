//! Side effects that leave the process.
//!
//! Sounds, open-door alerts and bans are fire-and-forget: the caller never
//! waits for them and a failure is only logged. The control logic talks to
//! them through [`Effects`]; [`ShellEffects`] runs the configured external
//! commands.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Audible cue names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    Tink,
    Ding,
    /// Rollup door reached a rest position.
    Bell1,
    /// Rollup door left a rest position.
    Bell2,
    CloseStart,
    CloseDone,
    BeamClear,
    BeamBlocked,
    Error,
}

impl Cue {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Cue::Tink => "tink",
            Cue::Ding => "ding",
            Cue::Bell1 => "bell1",
            Cue::Bell2 => "bell2",
            Cue::CloseStart => "close start",
            Cue::CloseDone => "close done",
            Cue::BeamClear => "beam clear",
            Cue::BeamBlocked => "beam blocked",
            Cue::Error => "error",
        }
    }

    /// Sound file played for this cue.
    #[must_use]
    pub fn sound_file(self) -> &'static str {
        match self {
            Cue::Tink => "/usr/share/sounds/tink.wav",
            Cue::Ding => "/usr/share/sounds/ding.wav",
            Cue::Bell1 | Cue::Bell2 => "/usr/share/sounds/bicycle_bell.wav",
            Cue::CloseStart => "/usr/share/sounds/Window_DeIconify.wav",
            Cue::CloseDone => "/usr/share/sounds/Window_Iconify.wav",
            Cue::BeamClear => "/usr/share/sounds/Desktop6.wav",
            Cue::BeamBlocked => "/usr/share/sounds/Desktop7.wav",
            Cue::Error => "/usr/share/sounds/defaultbeep.wav",
        }
    }
}

impl std::fmt::Display for Cue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fire-and-forget actuators.
///
/// Implementations must return promptly; any slow work runs in the
/// background.
pub trait Effects: Send + Sync {
    fn play(&self, cue: Cue);

    /// Tell the owner the rollup door has been left open.
    fn send_open_door_alert(&self);

    /// Block an address that failed authentication.
    fn ban(&self, ip: IpAddr);
}

/// Runs external commands for each effect.
///
/// Each command line is split on whitespace; the first word is the program
/// and the effect's argument (sound file, address) is appended last.
#[derive(Debug, Clone)]
pub struct ShellEffects {
    sound_command: String,
    alert_command: Option<String>,
    ban_command: String,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Sound,
    Alert,
    Ban,
}

impl ShellEffects {
    pub fn new(
        sound_command: impl Into<String>,
        alert_command: Option<String>,
        ban_command: impl Into<String>,
    ) -> Self {
        Self {
            sound_command: sound_command.into(),
            alert_command,
            ban_command: ban_command.into(),
        }
    }

    pub fn from_config(config: &garagedoor_core::Config) -> Self {
        Self::new(
            config.sound_command.clone(),
            config.alert_command.clone(),
            config.ban_command.clone(),
        )
    }

    fn spawn(&self, template: &str, argument: Option<String>, action: Action) {
        let mut words = template.split_whitespace();
        let Some(program) = words.next() else {
            warn!(?action, "No command configured");
            return;
        };

        let mut command = Command::new(program);
        command
            .args(words)
            .args(argument.as_deref())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let argument = argument.unwrap_or_default();
        tokio::spawn(async move {
            match (command.status().await, action) {
                (Ok(status), Action::Ban) if status.success() => info!(ip = %argument, "Banned"),
                (Ok(status), _) if status.success() => {
                    debug!(?action, %argument, "Command finished");
                }
                (Ok(status), Action::Ban) => warn!(ip = %argument, %status, "Unable to ban"),
                (Ok(status), _) => warn!(?action, %argument, %status, "Command failed"),
                (Err(e), _) => warn!(?action, %argument, error = %e, "Unable to run command"),
            }
        });
    }
}

impl Effects for ShellEffects {
    fn play(&self, cue: Cue) {
        debug!(%cue, "Sound");
        self.spawn(
            &self.sound_command,
            Some(cue.sound_file().to_string()),
            Action::Sound,
        );
    }

    fn send_open_door_alert(&self) {
        match &self.alert_command {
            Some(command) => self.spawn(command, None, Action::Alert),
            None => warn!("Rollup door left open, no alert command configured"),
        }
    }

    fn ban(&self, ip: IpAddr) {
        self.spawn(&self.ban_command, Some(ip.to_string()), Action::Ban);
    }
}

/// Interlock file that suppresses the relay while it exists.
#[derive(Debug, Clone)]
pub struct DisarmFlag {
    path: PathBuf,
}

impl DisarmFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checked before every press.
    pub fn is_disarmed(&self) -> bool {
        self.path.exists()
    }
}

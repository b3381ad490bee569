use std::io::Write;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TriggerError {
    /// An unfired trigger is already bound to this transition. The caller
    /// must retire it first; firing both would double-mark the event.
    #[error("a trigger is already armed for the transition at {at:.3}s")]
    AlreadyArmed { at: f64 },
    #[error("trigger port unavailable: {0}")]
    Hardware(#[from] serialport::Error),
}

/// Byte-oriented write side of the trigger protocol. One write per event,
/// no framing, no acknowledgment.
pub trait TriggerSink {
    /// Returns true if the code was handed to the hardware.
    fn send(&mut self, code: u8) -> bool;
}

/// The serial trigger channel, or the legal no-op mode when no port is
/// configured. Hardware absence must never block the experiment: open
/// failures and write failures degrade to `Disabled` with a warning, and
/// trial timing proceeds unaffected.
pub enum TriggerChannel {
    Serial {
        name: String,
        port: Box<dyn serialport::SerialPort>,
    },
    Disabled,
}

impl TriggerChannel {
    pub const DEFAULT_BAUD: u32 = 9600;

    /// Opens `name` at `baud`, or returns `Disabled` when `name` is `None`
    /// or the port cannot be opened.
    pub fn open(name: Option<&str>, baud: u32) -> Self {
        let Some(name) = name else {
            println!("No trigger port configured; trigger sends disabled.");
            return Self::Disabled;
        };
        match Self::try_open(name, baud) {
            Ok(channel) => channel,
            Err(err) => {
                eprintln!("Could not open trigger port {name}: {err}; trigger sends disabled.");
                Self::Disabled
            }
        }
    }

    /// Opens `name` at `baud`, surfacing the failure to callers that want it.
    pub fn try_open(name: &str, baud: u32) -> Result<Self, TriggerError> {
        let port = serialport::new(name, baud)
            .timeout(Duration::from_millis(100))
            .open()?;
        println!("Trigger port {name} open at {baud} baud.");
        Ok(Self::Serial {
            name: name.to_owned(),
            port,
        })
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Serial { .. })
    }
}

impl TriggerSink for TriggerChannel {
    fn send(&mut self, code: u8) -> bool {
        match self {
            Self::Disabled => false,
            Self::Serial { name, port } => match port.write_all(&[code]) {
                Ok(()) => true,
                Err(err) => {
                    eprintln!("Trigger write to {name} failed: {err}; disabling trigger sends.");
                    *self = Self::Disabled;
                    false
                }
            },
        }
    }
}

impl std::fmt::Debug for TriggerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serial { name, .. } => f.debug_struct("Serial").field("name", name).finish(),
            Self::Disabled => write!(f, "Disabled"),
        }
    }
}

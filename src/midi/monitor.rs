use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use midir::{Ignore, MidiInput, MidiInputConnection};
use std::thread;
use tracing::{info, warn};

use super::message::MidiMessage;
use super::transport::PortInfo;
use crate::config::{MessageKind, MonitorConfig};
use crate::dispatch::port::{self, Direction};

/// Raw message as delivered by the MIDI input thread
struct Incoming {
    timestamp: u64,
    bytes: Vec<u8>,
}

/// Which message kinds the monitor drops before they reach the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgnoreFlags {
    pub sysex: bool,
    pub timing: bool,
    pub active_sensing: bool,
}

impl Default for IgnoreFlags {
    fn default() -> Self {
        Self {
            sysex: true,
            timing: true,
            active_sensing: true,
        }
    }
}

impl IgnoreFlags {
    /// Start from ignoring everything and unlock each requested kind
    pub fn receiving(kinds: &[MessageKind]) -> Self {
        let mut flags = Self::default();
        for kind in kinds {
            match kind {
                MessageKind::Sysex => flags.sysex = false,
                MessageKind::Timing => flags.timing = false,
                MessageKind::ActiveSensing => flags.active_sensing = false,
                MessageKind::All => {
                    flags = Self {
                        sysex: false,
                        timing: false,
                        active_sensing: false,
                    }
                }
            }
        }
        flags
    }

    fn to_midir(self) -> Ignore {
        match (self.sysex, self.timing, self.active_sensing) {
            (false, false, false) => Ignore::None,
            (true, false, false) => Ignore::Sysex,
            (false, true, false) => Ignore::Time,
            (true, true, false) => Ignore::SysexAndTime,
            (false, false, true) => Ignore::ActiveSense,
            (true, false, true) => Ignore::SysexAndActiveSense,
            (false, true, true) => Ignore::TimeAndActiveSense,
            (true, true, true) => Ignore::All,
        }
    }
}

/// Live subscription to an amplifier input port.
/// Logs every incoming message until dropped.
pub struct MidiMonitor {
    _connection: MidiInputConnection<()>,
    port: PortInfo,
}

impl MidiMonitor {
    /// Connect to the amplifier's input port and start logging
    pub fn start(config: &MonitorConfig, device_prefix: &str, client_name: &str) -> Result<Self> {
        let mut midi_in = MidiInput::new(client_name)?;
        midi_in.ignore(IgnoreFlags::receiving(&config.receive).to_midir());

        let ports = midi_in.ports();
        let infos: Vec<PortInfo> = ports
            .iter()
            .enumerate()
            .map(|(index, port)| PortInfo {
                index,
                name: midi_in
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index)),
            })
            .collect();

        let requested = config.port.map(|index| index.to_string());
        let resolved = port::resolve(requested.as_deref(), &infos, device_prefix, Direction::Input)?;
        let selected = ports
            .get(resolved.index)
            .ok_or_else(|| anyhow!("MIDI input port {} disappeared", resolved.index))?;

        let (tx, rx) = unbounded();
        spawn_logger(rx, resolved.name.clone())?;

        let connection = midi_in
            .connect(selected, client_name, forward(tx), ())
            .map_err(|e| anyhow!("Failed to connect to MIDI port: {}", e))?;

        info!("Successfully connected to {}", resolved.name);

        Ok(Self {
            _connection: connection,
            port: PortInfo {
                index: resolved.index,
                name: resolved.name,
            },
        })
    }

    pub fn port(&self) -> &PortInfo {
        &self.port
    }
}

/// MIDI input callback: hand the bytes to the logger without blocking
fn forward(tx: Sender<Incoming>) -> impl FnMut(u64, &[u8], &mut ()) + Send + 'static {
    move |timestamp, bytes, _| {
        let _ = tx.try_send(Incoming {
            timestamp,
            bytes: bytes.to_vec(),
        });
    }
}

/// Logger thread ends once the connection (and with it the sender) is dropped
fn spawn_logger(rx: Receiver<Incoming>, port_name: String) -> Result<()> {
    thread::Builder::new()
        .name("midi-monitor".to_string())
        .spawn(move || {
            let mut last: Option<u64> = None;
            for incoming in rx.iter() {
                let delta = last.map_or(0, |prev| incoming.timestamp.saturating_sub(prev));
                last = Some(incoming.timestamp);
                info!(
                    port = %port_name,
                    "m: {} d: {}us",
                    MidiMessage::parse(&incoming.bytes),
                    delta
                );
            }
            warn!(port = %port_name, "MIDI monitor stopped");
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ignores_everything() {
        assert_eq!(IgnoreFlags::receiving(&[]), IgnoreFlags::default());
        assert!(matches!(IgnoreFlags::default().to_midir(), Ignore::All));
    }

    #[test]
    fn test_receive_all_unlocks_every_kind() {
        let flags = IgnoreFlags::receiving(&[MessageKind::All]);
        assert!(!flags.sysex && !flags.timing && !flags.active_sensing);
        assert!(matches!(flags.to_midir(), Ignore::None));
    }

    #[test]
    fn test_receive_single_kind() {
        let flags = IgnoreFlags::receiving(&[MessageKind::Timing]);
        assert_eq!(
            flags,
            IgnoreFlags {
                sysex: true,
                timing: false,
                active_sensing: true
            }
        );
        assert!(matches!(flags.to_midir(), Ignore::SysexAndActiveSense));
    }

    #[test]
    fn test_forward_copies_bytes() {
        let (tx, rx) = unbounded();
        let mut callback = forward(tx);
        callback(42, &[0xB0, 10, 3], &mut ());
        let incoming = rx.try_recv().unwrap();
        assert_eq!(incoming.timestamp, 42);
        assert_eq!(incoming.bytes, vec![0xB0, 10, 3]);
    }
}

use std::fmt;

/// Incoming MIDI messages, decoded for logging
#[derive(Debug, Clone, PartialEq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    SysEx { len: usize },
    Other(Vec<u8>),
}

impl MidiMessage {
    /// Parse raw MIDI bytes into a message
    /// Handles standard MIDI protocol: [status, data1, data2]
    pub fn parse(bytes: &[u8]) -> Self {
        let Some(&status) = bytes.first() else {
            return MidiMessage::Other(Vec::new());
        };

        if status == 0xF0 {
            return MidiMessage::SysEx { len: bytes.len() };
        }

        let message_type = status & 0xF0;
        let channel = status & 0x0F;

        match (message_type, bytes.len()) {
            (0x90, 3..) => {
                // MIDI spec: Note On with velocity 0 is actually Note Off
                if bytes[2] == 0 {
                    MidiMessage::NoteOff {
                        channel,
                        note: bytes[1],
                        velocity: 0,
                    }
                } else {
                    MidiMessage::NoteOn {
                        channel,
                        note: bytes[1],
                        velocity: bytes[2],
                    }
                }
            }
            (0x80, 3..) => MidiMessage::NoteOff {
                channel,
                note: bytes[1],
                velocity: bytes[2],
            },
            (0xB0, 3..) => MidiMessage::ControlChange {
                channel,
                controller: bytes[1],
                value: bytes[2],
            },
            (0xC0, 2..) => MidiMessage::ProgramChange {
                channel,
                program: bytes[1],
            },
            _ => MidiMessage::Other(bytes.to_vec()),
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => write!(f, "note on  ch={} note={} vel={}", channel, note, velocity),
            MidiMessage::NoteOff { channel, note, .. } => {
                write!(f, "note off ch={} note={}", channel, note)
            }
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => write!(f, "cc       ch={} ctrlr={} value={}", channel, controller, value),
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "program  ch={} program={}", channel, program)
            }
            MidiMessage::SysEx { len } => write!(f, "sysex    {} bytes", len),
            MidiMessage::Other(bytes) => write!(f, "raw      {:02X?}", bytes),
        }
    }
}

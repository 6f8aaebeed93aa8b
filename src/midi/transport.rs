use midir::{MidiInput, MidiOutput, MidiOutputConnection};

use crate::error::MidiError;

/// An enumerated MIDI port: its position in the OS port list and display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
}

/// An open output port. Dropping the connection closes the port.
pub trait OutputConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError>;
}

/// Output side of the MIDI subsystem, as seen by the dispatch engine
pub trait MidiTransport: Send + Sync {
    /// Enumerate output ports in index order
    fn ports(&self) -> Result<Vec<PortInfo>, MidiError>;

    /// Open a previously enumerated port
    fn open(&self, port: &PortInfo) -> Result<Box<dyn OutputConnection>, MidiError>;
}

/// `MidiTransport` backed by the platform MIDI API through midir.
/// A fresh client is created for every call so no handle outlives a request.
pub struct MidirTransport {
    client_name: String,
}

impl MidirTransport {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }
}

impl MidiTransport for MidirTransport {
    fn ports(&self) -> Result<Vec<PortInfo>, MidiError> {
        let midi_out = MidiOutput::new(&self.client_name)?;
        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| PortInfo {
                index,
                name: midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index)),
            })
            .collect())
    }

    fn open(&self, port: &PortInfo) -> Result<Box<dyn OutputConnection>, MidiError> {
        let midi_out = MidiOutput::new(&self.client_name)?;
        let ports = midi_out.ports();
        let selected = ports
            .get(port.index)
            .ok_or(MidiError::PortVanished { index: port.index })?;

        // The port list may have changed since enumeration
        match midi_out.port_name(selected) {
            Ok(name) if name == port.name => {}
            _ => return Err(MidiError::PortVanished { index: port.index }),
        }

        let connection = midi_out
            .connect(selected, &self.client_name)
            .map_err(|e| MidiError::Connect {
                index: port.index,
                reason: e.to_string(),
            })?;

        Ok(Box::new(MidirConnection {
            connection: Some(connection),
        }))
    }
}

struct MidirConnection {
    connection: Option<MidiOutputConnection>,
}

impl OutputConnection for MidirConnection {
    fn send(&mut self, bytes: &[u8]) -> Result<(), MidiError> {
        match self.connection.as_mut() {
            Some(conn) => Ok(conn.send(bytes)?),
            None => Err(MidiError::Send("connection already closed".to_string())),
        }
    }
}

impl Drop for MidirConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
    }
}

/// List all available MIDI output ports
pub fn list_output_ports(client_name: &str) -> Result<Vec<PortInfo>, MidiError> {
    MidirTransport::new(client_name).ports()
}

/// List all available MIDI input ports
pub fn list_input_ports(client_name: &str) -> Result<Vec<PortInfo>, MidiError> {
    let midi_in = MidiInput::new(client_name)?;
    Ok(midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| PortInfo {
            index,
            name: midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index)),
        })
        .collect())
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_mock_connection_closes_on_drop() {
        let transport = MockTransport::with_ports(&["VYPYR 1"]);
        let ports = transport.ports().unwrap();
        {
            let mut conn = transport.open(&ports[0]).unwrap();
            conn.send(&[176, 10, 3]).unwrap();
            assert!(transport.closed().is_empty());
        }
        assert_eq!(transport.opened(), vec![0]);
        assert_eq!(transport.closed(), vec![0]);
        assert_eq!(transport.sent(), vec![(0, vec![176, 10, 3])]);
    }
}

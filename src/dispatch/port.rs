use thiserror::Error;
use tracing::debug;

use crate::midi::transport::PortInfo;

/// Name prefix shared by every port the amplifier exposes
pub const DEFAULT_DEVICE_PREFIX: &str = "VYPYR";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("no MIDI {0} devices were found.")]
    NoDevicesFound(Direction),

    #[error("No {prefix} {direction} ports were recognized on your device.")]
    NoCompatibleDeviceFound { prefix: String, direction: Direction },

    #[error("Specified port does not exist.")]
    PortOutOfRange,

    #[error("Specified port could not be recognized as {prefix} port")]
    IncompatiblePort { prefix: String },
}

impl PortError {
    pub fn status(&self) -> u16 {
        match self {
            PortError::PortOutOfRange => 400,
            _ => 404,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Outcome of port resolution, valid at the moment it was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPort {
    pub index: usize,
    pub name: String,
}

impl From<&PortInfo> for ResolvedPort {
    fn from(port: &PortInfo) -> Self {
        Self {
            index: port.index,
            name: port.name.clone(),
        }
    }
}

/// Pick the port a command should go to.
///
/// `requested` is the raw port parameter supplied by the caller. Without one,
/// the lowest-index port whose name starts with `prefix` wins.
pub fn resolve(
    requested: Option<&str>,
    ports: &[PortInfo],
    prefix: &str,
    direction: Direction,
) -> Result<ResolvedPort, PortError> {
    if ports.is_empty() {
        return Err(PortError::NoDevicesFound(direction));
    }

    let port = match requested {
        Some(raw) => {
            let index = parse_port_index(raw).ok_or(PortError::PortOutOfRange)?;
            ports.get(index).ok_or(PortError::PortOutOfRange)?
        }
        None => ports
            .iter()
            .find(|port| port.name.starts_with(prefix))
            .ok_or_else(|| PortError::NoCompatibleDeviceFound {
                prefix: prefix.to_string(),
                direction,
            })?,
    };

    if !port.name.starts_with(prefix) {
        return Err(PortError::IncompatiblePort {
            prefix: prefix.to_string(),
        });
    }

    debug!(index = port.index, name = %port.name, "resolved {} port", direction);
    Ok(ResolvedPort::from(port))
}

/// Port indices are non-negative integers; anything else cannot name a port
fn parse_port_index(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok()
}

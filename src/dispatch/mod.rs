//! Command dispatch: resolve the amplifier's port, validate the command and
//! hand it to the MIDI transport.

pub mod port;
pub mod validate;

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::catalog::ControllerCatalog;
use crate::error::MidiError;
use crate::midi::transport::MidiTransport;
use port::{Direction, PortError};
use validate::{RawCommand, Rejection};

/// Uniform outcome of one dispatch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub status_code: u16,
    pub message: String,
}

impl DispatchResult {
    fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

impl From<PortError> for DispatchResult {
    fn from(err: PortError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

impl From<Rejection> for DispatchResult {
    fn from(rejection: Rejection) -> Self {
        Self::new(rejection.status(), rejection.to_string())
    }
}

impl From<MidiError> for DispatchResult {
    fn from(err: MidiError) -> Self {
        Self::new(500, err.to_string())
    }
}

/// Stateless orchestrator shared by every request handler
pub struct DispatchEngine<T: MidiTransport> {
    transport: T,
    catalog: Arc<ControllerCatalog>,
    device_prefix: String,
}

impl<T: MidiTransport> DispatchEngine<T> {
    pub fn new(transport: T, catalog: Arc<ControllerCatalog>, device_prefix: impl Into<String>) -> Self {
        Self {
            transport,
            catalog,
            device_prefix: device_prefix.into(),
        }
    }

    /// Validate a command and send it to the amplifier.
    /// Produces exactly one result and never keeps a port open past the call.
    pub fn dispatch(&self, requested_port: Option<&str>, command: &RawCommand) -> DispatchResult {
        let result = self.try_dispatch(requested_port, command);
        if result.is_success() {
            info!("{}", result.message);
        } else {
            warn!(status = result.status_code, "{}", result.message);
        }
        result
    }

    fn try_dispatch(&self, requested_port: Option<&str>, command: &RawCommand) -> DispatchResult {
        let ports = match self.transport.ports() {
            Ok(ports) => ports,
            Err(e) => {
                error!("port enumeration failed: {}", e);
                return e.into();
            }
        };

        let resolved = match port::resolve(
            requested_port,
            &ports,
            &self.device_prefix,
            Direction::Output,
        ) {
            Ok(resolved) => resolved,
            Err(e) => return e.into(),
        };

        let Some(info) = ports.iter().find(|p| p.index == resolved.index) else {
            return MidiError::PortVanished {
                index: resolved.index,
            }
            .into();
        };

        // Dropping the connection closes the port on every return below
        let mut connection = match self.transport.open(info) {
            Ok(connection) => connection,
            Err(e) => {
                error!("{}", e);
                return e.into();
            }
        };

        let approved = match validate::validate(command, &self.catalog) {
            Ok(approved) => approved,
            Err(rejection) => return rejection.into(),
        };

        if let Err(e) = connection.send(&approved.bytes()) {
            error!("{}", e);
            return e.into();
        }

        DispatchResult::new(
            200,
            format!(
                "Message successfully sent to {} on port id {}",
                resolved.name, resolved.index
            ),
        )
    }
}

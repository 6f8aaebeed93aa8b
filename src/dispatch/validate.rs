use thiserror::Error;
use tracing::debug;

use crate::catalog::{CatalogMiss, ControllerCatalog, ValueDomain};

/// Command parameters exactly as received from the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub program: String,
    pub controller: String,
    pub value: String,
}

impl RawCommand {
    pub fn new(
        program: impl Into<String>,
        controller: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            controller: controller.into(),
            value: value.into(),
        }
    }
}

/// A command that passed every rule, ready to be transmitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovedCommand {
    pub program: u8,
    pub controller: u8,
    pub value: u8,
}

impl ApprovedCommand {
    pub fn bytes(&self) -> [u8; 3] {
        [self.program, self.controller, self.value]
    }
}

/// Why a command was refused. Every rejection maps to HTTP 400.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Provided program, ctrlr or value must be a number.")]
    NotANumber,

    #[error("Provided value for \"program\" parameter is invalid")]
    UnknownProgram,

    #[error("Provided value for \"ctrlr\" parameter is invalid")]
    UnknownController,

    #[error("Provided value for \"program\" parameter is not supported")]
    UnsupportedProgram,

    #[error("Provided value for \"value\" parameter is invalid (accepts only {0})")]
    ValueNotFixed(i64),

    #[error("Provided value for \"value\" parameter is out of range (accepts either {0} or {1})")]
    ValueNotEither(i64, i64),

    #[error("Provided value for \"value\" parameter is out of range (accepts {min} to {max})")]
    ValueOutOfRange { min: i64, max: i64 },

    #[error("Provided value for \"ctrlr\" parameter is out of range (accepts {min} to {max})")]
    ControllerOutOfRange { min: i64, max: i64 },
}

impl Rejection {
    pub fn status(&self) -> u16 {
        400
    }
}

impl From<CatalogMiss> for Rejection {
    fn from(miss: CatalogMiss) -> Self {
        match miss {
            CatalogMiss::UnknownProgram(_) => Rejection::UnknownProgram,
            CatalogMiss::UnknownController(_) => Rejection::UnknownController,
            CatalogMiss::UnsupportedProgram(_) => Rejection::UnsupportedProgram,
        }
    }
}

/// Check a command against the catalog. The first failing rule wins.
pub fn validate(
    command: &RawCommand,
    catalog: &ControllerCatalog,
) -> Result<ApprovedCommand, Rejection> {
    let (Some(program), Some(controller), Some(value)) = (
        parse_integer(&command.program),
        parse_integer(&command.controller),
        parse_integer(&command.value),
    ) else {
        return Err(Rejection::NotANumber);
    };

    let rule = catalog.lookup(program, controller)?;
    debug!(program, controller, value, rule = rule.name, "checking command");

    if !rule.value.contains(value) {
        return Err(match rule.value {
            ValueDomain::Fixed(expected) => Rejection::ValueNotFixed(expected),
            ValueDomain::Either(a, b) => Rejection::ValueNotEither(a, b),
            ValueDomain::Range { min, max } => Rejection::ValueOutOfRange { min, max },
        });
    }

    if let Some((min, max)) = rule.controller {
        if !(min..=max).contains(&controller) {
            return Err(Rejection::ControllerOutOfRange { min, max });
        }
    }

    // Catalog entries and rule domains keep every field inside a byte
    match (
        u8::try_from(program),
        u8::try_from(controller),
        u8::try_from(value),
    ) {
        (Ok(program), Ok(controller), Ok(value)) => Ok(ApprovedCommand {
            program,
            controller,
            value,
        }),
        _ => Err(Rejection::ValueOutOfRange { min: 0, max: 127 }),
    }
}

/// Parse a numeric parameter. Accepts anything that reads as a finite number
/// without a fractional part ("12", " 12 ", "1.2e1").
fn parse_integer(raw: &str) -> Option<i64> {
    let number: f64 = raw.trim().parse().ok()?;
    if !number.is_finite() || number.fract() != 0.0 {
        return None;
    }
    if number < i64::MIN as f64 || number > i64::MAX as f64 {
        return None;
    }
    Some(number as i64)
}

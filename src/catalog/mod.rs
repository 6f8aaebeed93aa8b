use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Catalog compiled into the binary, used when no catalog file is configured
const BUILTIN_CATALOG: &str = include_str!("controls.yaml");

/// MIDI status classes understood by the amplifier
pub const PROGRAM_CHANGE: i64 = 192;
pub const CONTROL_CHANGE: i64 = 176;
pub const NOTE_ON: i64 = 144;

/// Program change messages always carry this value
pub const PROGRAM_CHANGE_VALUE: i64 = 112;

/// Largest value a MIDI data byte can hold
pub const DATA_BYTE_MAX: i64 = 127;

const TUNER: i64 = 21;
const TAP_TEMPO: i64 = 56;

/// Legal values for the value byte of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDomain {
    /// Exactly one accepted value
    Fixed(i64),
    /// One of two discrete values (off/on switches)
    Either(i64, i64),
    /// Inclusive range
    Range { min: i64, max: i64 },
}

impl ValueDomain {
    pub fn contains(&self, value: i64) -> bool {
        match *self {
            ValueDomain::Fixed(expected) => value == expected,
            ValueDomain::Either(a, b) => value == a || value == b,
            ValueDomain::Range { min, max } => (min..=max).contains(&value),
        }
    }
}

/// Rule set governing one (program, controller) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRule {
    /// Category label, used in logs
    pub name: &'static str,
    /// Extra bound on the controller number, checked after the value
    pub controller: Option<(i64, i64)>,
    pub value: ValueDomain,
}

impl ValueRule {
    const fn range(name: &'static str, min: i64, max: i64) -> Self {
        Self {
            name,
            controller: None,
            value: ValueDomain::Range { min, max },
        }
    }

    /// Derive the rule for a pair from its program class and controller number.
    /// Returns `None` for program classes the amplifier does not accept.
    pub fn for_pair(program: i64, controller: i64) -> Option<Self> {
        let rule = match (program, controller) {
            (PROGRAM_CHANGE, _) => Self {
                name: "presets",
                controller: Some((0, 15)),
                value: ValueDomain::Fixed(PROGRAM_CHANGE_VALUE),
            },
            (NOTE_ON, TUNER) => Self {
                name: "tuner",
                controller: None,
                value: ValueDomain::Either(0, DATA_BYTE_MAX),
            },
            (CONTROL_CHANGE, TAP_TEMPO) => Self {
                name: "tapTempo",
                controller: None,
                value: ValueDomain::Either(0, DATA_BYTE_MAX),
            },
            (CONTROL_CHANGE, 10) => Self::range("inst", 0, 22),
            (CONTROL_CHANGE, 21 | 23 | 31) => Self::range("stomp", 0, DATA_BYTE_MAX),
            (CONTROL_CHANGE, 8) => Self::range("amps", 1, 12),
            (CONTROL_CHANGE, 12) => Self::range("ampsChannels", 0, 2),
            (CONTROL_CHANGE, 16..=20) => Self::range("modifiers", 0, DATA_BYTE_MAX),
            // No dedicated rule: only the data byte bound applies
            (CONTROL_CHANGE, _) => Self::range("unmapped", 0, DATA_BYTE_MAX),
            _ => return None,
        };
        Some(rule)
    }
}

/// Why a (program, controller) pair has no rule in the catalog
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogMiss {
    #[error("unknown program {0}")]
    UnknownProgram(i64),
    #[error("unknown controller {0}")]
    UnknownController(i64),
    #[error("unsupported program {0}")]
    UnsupportedProgram(i64),
}

/// One supported (program, controller) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSpec {
    pub program: i64,
    pub controller: i64,
}

impl ControllerSpec {
    pub fn rule(&self) -> Option<ValueRule> {
        ValueRule::for_pair(self.program, self.controller)
    }
}

/// On-disk layout: category name -> list of `[program, ctrlr]`
type CatalogFile = BTreeMap<String, Vec<[i64; 2]>>;

/// Static reference data describing the amplifier's control surface.
/// Immutable once loaded, so it can be shared between threads freely.
#[derive(Debug, Clone)]
pub struct ControllerCatalog {
    categories: BTreeMap<String, Vec<ControllerSpec>>,
    programs: BTreeSet<i64>,
    controllers: BTreeSet<i64>,
}

impl ControllerCatalog {
    /// Catalog shipped with the binary
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG).context("Failed to parse builtin controller catalog")
    }

    /// Load a catalog from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: CatalogFile = serde_yaml::from_str(text)?;
        Self::from_entries(raw)
    }

    fn from_entries(raw: CatalogFile) -> Result<Self> {
        if raw.values().all(Vec::is_empty) {
            return Err(anyhow!("Catalog must list at least one controller"));
        }

        let mut categories = BTreeMap::new();
        let mut programs = BTreeSet::new();
        let mut controllers = BTreeSet::new();

        for (name, pairs) in raw {
            let mut specs = Vec::with_capacity(pairs.len());
            for [program, controller] in pairs {
                if !(0x80..=0xFF).contains(&program) {
                    return Err(anyhow!(
                        "Category {}: program {} is not a MIDI status byte",
                        name,
                        program
                    ));
                }
                if !(0..=DATA_BYTE_MAX).contains(&controller) {
                    return Err(anyhow!(
                        "Category {}: ctrlr {} is not a MIDI data byte",
                        name,
                        controller
                    ));
                }
                programs.insert(program);
                controllers.insert(controller);
                specs.push(ControllerSpec {
                    program,
                    controller,
                });
            }
            categories.insert(name, specs);
        }

        Ok(Self {
            categories,
            programs,
            controllers,
        })
    }

    /// Find the rule governing a pair.
    ///
    /// Membership is checked against the set of known programs and, separately,
    /// the set of known controllers. The pair itself does not have to appear in
    /// a single entry.
    pub fn lookup(&self, program: i64, controller: i64) -> Result<ValueRule, CatalogMiss> {
        if !self.programs.contains(&program) {
            return Err(CatalogMiss::UnknownProgram(program));
        }
        if !self.controllers.contains(&controller) {
            return Err(CatalogMiss::UnknownController(controller));
        }
        ValueRule::for_pair(program, controller).ok_or(CatalogMiss::UnsupportedProgram(program))
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[ControllerSpec])> {
        self.categories
            .iter()
            .map(|(name, specs)| (name.as_str(), specs.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ControllerCatalog::builtin().unwrap();
        assert!(catalog.len() > 0);
        assert!(catalog.categories().any(|(name, _)| name == "inst"));
        for (_, specs) in catalog.categories() {
            for spec in specs {
                assert!(spec.rule().is_some(), "no rule for {:?}", spec);
            }
        }
    }

    #[test]
    fn test_lookup_known_pair() {
        let catalog = ControllerCatalog::builtin().unwrap();
        let rule = catalog.lookup(CONTROL_CHANGE, 10).unwrap();
        assert_eq!(rule.name, "inst");
        assert_eq!(rule.value, ValueDomain::Range { min: 0, max: 22 });
    }

    #[test]
    fn test_lookup_reports_program_before_controller() {
        let catalog = ControllerCatalog::builtin().unwrap();
        assert_eq!(catalog.lookup(200, 99), Err(CatalogMiss::UnknownProgram(200)));
        assert_eq!(
            catalog.lookup(CONTROL_CHANGE, 99),
            Err(CatalogMiss::UnknownController(99))
        );
    }

    #[test]
    fn test_lookup_is_permissive_across_entries() {
        // 144 and 10 never appear together, but both are known on their own
        let catalog = ControllerCatalog::builtin().unwrap();
        assert_eq!(
            catalog.lookup(NOTE_ON, 10),
            Err(CatalogMiss::UnsupportedProgram(NOTE_ON))
        );
        // ctrlr 20 only exists under 176, yet program change accepts it for lookup
        let rule = catalog.lookup(PROGRAM_CHANGE, 20).unwrap();
        assert_eq!(rule.controller, Some((0, 15)));
    }

    #[test]
    fn test_value_domain_bounds() {
        let range = ValueDomain::Range { min: 1, max: 12 };
        assert!(range.contains(1));
        assert!(range.contains(12));
        assert!(!range.contains(0));
        assert!(!range.contains(13));

        let either = ValueDomain::Either(0, 127);
        assert!(either.contains(0));
        assert!(either.contains(127));
        assert!(!either.contains(64));

        assert!(ValueDomain::Fixed(112).contains(112));
        assert!(!ValueDomain::Fixed(112).contains(111));
    }

    #[test]
    fn test_custom_catalog() {
        let yaml = r#"
amps:
  - [176, 8]
"#;
        let catalog = ControllerCatalog::from_yaml(yaml).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.lookup(CONTROL_CHANGE, 8).is_ok());
        assert_eq!(
            catalog.lookup(PROGRAM_CHANGE, 8),
            Err(CatalogMiss::UnknownProgram(PROGRAM_CHANGE))
        );
    }

    #[test]
    fn test_reject_invalid_catalog() {
        assert!(ControllerCatalog::from_yaml("amps: []").is_err());
        assert!(ControllerCatalog::from_yaml("amps:\n  - [12, 8]\n").is_err());
        assert!(ControllerCatalog::from_yaml("amps:\n  - [176, 300]\n").is_err());
        assert!(ControllerCatalog::from_yaml("amps: nope").is_err());
    }
}

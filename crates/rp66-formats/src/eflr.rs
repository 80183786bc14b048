//! Explicitly formatted logical records
//!
//! An EFLR body is a sequence of components. Each starts with a descriptor
//! byte: the three high bits give the role, the five low bits say which
//! characteristics follow.
//!
//! ```text
//! SET  TEMPLATE-ATTRIBUTE...  (OBJECT ATTRIBUTE...)...
//! ```
//!
//! Template attributes carry label, count, representation code, units and
//! a default value. Object attributes are matched to the template by
//! position; anything an object leaves out is taken from the template.

use tracing::{debug, info, warn};

use crate::error::{FormatError, FormatResult};
use crate::object::{Attribute, Fingerprint, ObjectSet, RawObject, SetRole};
use crate::record::{RawRecord, UPDATE};
use crate::repcode::{BodyReader, IDENT, Value};

/// Component role, from the three high bits of the descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Absent attribute
    AbsentAttribute,
    /// Attribute
    Attribute,
    /// Invariant attribute
    InvariantAttribute,
    /// Object
    Object,
    /// Redundant set
    RedundantSet,
    /// Replacement set
    ReplacementSet,
    /// Set
    Set,
}

impl Role {
    /// Decode the role of a descriptor byte
    pub fn from_descriptor(descriptor: u8) -> FormatResult<Self> {
        match descriptor >> 5 {
            0b000 => Ok(Self::AbsentAttribute),
            0b001 => Ok(Self::Attribute),
            0b010 => Ok(Self::InvariantAttribute),
            0b011 => Ok(Self::Object),
            0b101 => Ok(Self::RedundantSet),
            0b110 => Ok(Self::ReplacementSet),
            0b111 => Ok(Self::Set),
            _ => Err(FormatError::UnexpectedComponent {
                role: "reserved",
                context: "record body",
            }),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::AbsentAttribute => "ABSATR",
            Self::Attribute => "ATTRIB",
            Self::InvariantAttribute => "INVATR",
            Self::Object => "OBJECT",
            Self::RedundantSet => "RDSET",
            Self::ReplacementSet => "RSET",
            Self::Set => "SET",
        }
    }

    fn is_attribute(self) -> bool {
        matches!(
            self,
            Self::AbsentAttribute | Self::Attribute | Self::InvariantAttribute
        )
    }
}

mod flag {
    pub const SET_TYPE: u8 = 0x10;
    pub const SET_NAME: u8 = 0x08;

    pub const OBJECT_NAME: u8 = 0x10;

    pub const LABEL: u8 = 0x10;
    pub const COUNT: u8 = 0x08;
    pub const REPRC: u8 = 0x04;
    pub const UNITS: u8 = 0x02;
    pub const VALUE: u8 = 0x01;
}

fn template_default() -> Attribute {
    Attribute {
        label: String::new(),
        count: 1,
        reprc: IDENT,
        units: String::new(),
        values: Vec::new(),
    }
}

/// Read the characteristics of an attribute component over `base`
fn read_attribute(
    reader: &mut BodyReader<'_>,
    descriptor: u8,
    base: &Attribute,
) -> FormatResult<Attribute> {
    let mut attribute = base.clone();
    if descriptor & flag::LABEL != 0 {
        attribute.label = reader.ident()?;
    }
    if descriptor & flag::COUNT != 0 {
        attribute.count = reader.uvari()?;
    }
    if descriptor & flag::REPRC != 0 {
        attribute.reprc = reader.ushort()?;
    }
    if descriptor & flag::UNITS != 0 {
        attribute.units = reader.ident()?;
    }
    if descriptor & flag::VALUE != 0 {
        attribute.values = reader.values(attribute.reprc, attribute.count)?;
    } else if descriptor & (flag::COUNT | flag::REPRC) != 0 && attribute.count == 0 {
        attribute.values = Vec::new();
    }
    Ok(attribute)
}

struct Template {
    attributes: Vec<Attribute>,
    invariants: Vec<Attribute>,
}

fn read_template(reader: &mut BodyReader<'_>) -> FormatResult<Template> {
    let mut attributes = Vec::new();
    let mut invariants = Vec::new();

    while let Some(descriptor) = reader.peek() {
        let role = Role::from_descriptor(descriptor)?;
        match role {
            Role::Object => break,
            Role::Attribute | Role::InvariantAttribute => {
                reader.ushort()?;
                let index = attributes.len() + invariants.len();
                if descriptor & flag::LABEL == 0 {
                    return Err(FormatError::MissingLabel(index));
                }
                let attribute = read_attribute(reader, descriptor, &template_default())?;
                if role == Role::Attribute {
                    attributes.push(attribute);
                } else {
                    invariants.push(attribute);
                }
            }
            other => {
                return Err(FormatError::UnexpectedComponent {
                    role: other.name(),
                    context: "template",
                });
            }
        }
    }

    Ok(Template {
        attributes,
        invariants,
    })
}

fn read_object(
    reader: &mut BodyReader<'_>,
    set_type: &str,
    template: &Template,
) -> FormatResult<RawObject> {
    let descriptor = reader.ushort()?;
    if descriptor & flag::OBJECT_NAME == 0 {
        return Err(FormatError::MissingObjectName);
    }
    let name = reader.obname()?;

    let mut attributes = Vec::with_capacity(template.attributes.len() + template.invariants.len());
    let mut position = 0;
    while let Some(descriptor) = reader.peek() {
        let role = Role::from_descriptor(descriptor)?;
        if !role.is_attribute() {
            break;
        }
        if role == Role::InvariantAttribute {
            return Err(FormatError::UnexpectedComponent {
                role: role.name(),
                context: "object",
            });
        }
        let Some(base) = template.attributes.get(position) else {
            // More attributes than the template declares
            return Err(FormatError::UnexpectedComponent {
                role: role.name(),
                context: "object beyond its template",
            });
        };
        reader.ushort()?;
        position += 1;

        if role == Role::AbsentAttribute {
            continue;
        }
        let mut attribute = read_attribute(reader, descriptor, base)?;
        // The label always comes from the template
        attribute.label.clone_from(&base.label);
        attributes.push(attribute);
    }

    attributes.extend(template.attributes[position..].iter().cloned());
    attributes.extend(template.invariants.iter().cloned());

    Ok(RawObject {
        fingerprint: Fingerprint::new(set_type, &name),
        attributes,
    })
}

/// Parse one EFLR body into an object set
pub fn parse_set(record: &RawRecord) -> FormatResult<ObjectSet> {
    let mut reader = BodyReader::new(&record.body);

    let descriptor = reader.ushort()?;
    let role = match Role::from_descriptor(descriptor)? {
        Role::Set => SetRole::Set,
        Role::RedundantSet => SetRole::Redundant,
        Role::ReplacementSet => SetRole::Replacement,
        other => {
            return Err(FormatError::UnexpectedComponent {
                role: other.name(),
                context: "set position",
            });
        }
    };
    if descriptor & flag::SET_TYPE == 0 {
        return Err(FormatError::MissingSetType);
    }
    let set_type = reader.ident()?;
    let name = if descriptor & flag::SET_NAME != 0 {
        Some(reader.ident()?)
    } else {
        None
    };

    let template = read_template(&mut reader)?;

    let mut objects = Vec::new();
    while !reader.is_empty() {
        objects.push(read_object(&mut reader, &set_type, &template)?);
    }

    debug!(
        "Parsed {} set with {} objects from record at offset {}",
        set_type,
        objects.len(),
        record.offset
    );

    Ok(ObjectSet {
        set_type,
        name,
        role,
        record_type: record.record_type,
        objects,
    })
}

/// Parse every explicitly formatted record into object sets
///
/// Records that cannot be interpreted are logged and skipped, so one bad
/// record never hides the rest of the logical file.
pub fn parse_object_sets(records: &[RawRecord]) -> Vec<ObjectSet> {
    let mut sets = Vec::with_capacity(records.len());
    for record in records.iter().filter(|r| r.explicit) {
        if record.encrypted {
            info!(
                "Skipping encrypted record at offset {} (type {})",
                record.offset, record.record_type
            );
            continue;
        }
        if record.record_type == UPDATE {
            warn!(
                "UPDATE record at offset {} is not applied, objects it modifies may be stale",
                record.offset
            );
            continue;
        }
        match parse_set(record) {
            Ok(set) => {
                if set.role == SetRole::Replacement {
                    warn!(
                        "Replacement set {} at offset {} is kept as-is, replacement is not applied",
                        set.set_type, record.offset
                    );
                }
                sets.push(set);
            }
            Err(e) => {
                warn!("Skipping unparseable record at offset {}: {e}", record.offset);
            }
        }
    }
    sets
}

/// Values of the attribute with `label`, if present
pub fn values<'a>(object: &'a RawObject, label: &str) -> &'a [Value] {
    match object.attribute(label) {
        Some(attribute) => &attribute.values,
        None => &[],
    }
}

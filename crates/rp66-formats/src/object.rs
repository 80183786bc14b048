//! Metadata object model shared by the decoder and the object pool
//!
//! A [`RawObject`] is the as-parsed, type-agnostic form of one object
//! declared in an explicitly formatted logical record. It is identified by
//! its [`Fingerprint`].

use serde::Serialize;
use std::fmt;

use crate::repcode::Value;

/// Object name (OBNAME): origin, copy number and identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectName {
    /// Origin reference
    pub origin: u32,
    /// Copy number
    pub copy: u8,
    /// Identifier
    pub id: String,
}

impl ObjectName {
    /// Create a new object name
    pub fn new(origin: u32, copy: u8, id: impl Into<String>) -> Self {
        Self {
            origin,
            copy,
            id: id.into(),
        }
    }
}

/// Unique identity of a metadata object: type, name, origin and copy number
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Fingerprint {
    /// Object (set) type, e.g. `CHANNEL`
    pub object_type: String,
    /// Object identifier
    pub name: String,
    /// Origin reference
    pub origin: u32,
    /// Copy number
    pub copy: u8,
}

impl Fingerprint {
    /// Build a fingerprint from a type and an object name
    pub fn new(object_type: impl Into<String>, name: &ObjectName) -> Self {
        Self {
            object_type: object_type.into(),
            name: name.id.clone(),
            origin: name.origin,
            copy: name.copy,
        }
    }

    /// Build a fingerprint from its parts
    pub fn from_parts(
        object_type: impl Into<String>,
        name: impl Into<String>,
        origin: u32,
        copy: u8,
    ) -> Self {
        Self {
            object_type: object_type.into(),
            name: name.into(),
            origin,
            copy,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "T.{}-I.{}-O.{}-C.{}",
            self.object_type, self.name, self.origin, self.copy
        )
    }
}

/// One attribute of a raw object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    /// Attribute label
    pub label: String,
    /// Declared value count
    pub count: u32,
    /// Representation code of the values
    pub reprc: u8,
    /// Units
    pub units: String,
    /// Decoded values
    pub values: Vec<Value>,
}

/// As-parsed metadata object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawObject {
    /// Identity of the object
    pub fingerprint: Fingerprint,
    /// Attributes in template order
    pub attributes: Vec<Attribute>,
}

impl RawObject {
    /// Look up an attribute by label
    pub fn attribute(&self, label: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.label == label)
    }

    /// Position of an attribute in template order
    pub fn position(&self, label: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.label == label)
    }

    /// Compare everything except the identity
    pub fn same_content(&self, other: &Self) -> bool {
        self.fingerprint.object_type == other.fingerprint.object_type
            && self.fingerprint.name == other.fingerprint.name
            && self.attributes == other.attributes
    }
}

/// Role of a set component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SetRole {
    /// Plain set
    Set,
    /// Redundant set, repeats objects declared elsewhere
    Redundant,
    /// Replacement set, supersedes attribute values of earlier objects
    Replacement,
}

/// One parsed explicitly formatted logical record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSet {
    /// Set type, shared by every object in the set
    pub set_type: String,
    /// Optional set name
    pub name: Option<String>,
    /// Set role
    pub role: SetRole,
    /// Logical record type the set was read from
    pub record_type: u8,
    /// Objects in declaration order
    pub objects: Vec<RawObject>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_display() {
        let fp = Fingerprint::from_parts("CHANNEL", "GR", 2, 0);
        assert_eq!(fp.to_string(), "T.CHANNEL-I.GR-O.2-C.0");
    }

    #[test]
    fn origin_and_copy_distinguish_fingerprints() {
        let a = Fingerprint::new("CHANNEL", &ObjectName::new(1, 0, "GR"));
        let b = Fingerprint::new("CHANNEL", &ObjectName::new(2, 0, "GR"));
        let c = Fingerprint::new("CHANNEL", &ObjectName::new(1, 1, "GR"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn same_content_ignores_origin() {
        let attrs = vec![Attribute {
            label: "UNITS".to_string(),
            count: 1,
            reprc: 19,
            units: String::new(),
            values: vec![Value::Text("gAPI".to_string())],
        }];
        let a = RawObject {
            fingerprint: Fingerprint::from_parts("CHANNEL", "GR", 1, 0),
            attributes: attrs.clone(),
        };
        let b = RawObject {
            fingerprint: Fingerprint::from_parts("CHANNEL", "GR", 2, 0),
            attributes: attrs,
        };
        assert!(a.same_content(&b));
        assert_ne!(a, b);
    }
}

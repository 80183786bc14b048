//! Object type schemas and the type registry
//!
//! A [`Schema`] names the attributes a known object type carries and says
//! which of them point at other objects. The [`TypeRegistry`] maps set types
//! to schemas; types it does not know are promoted to the unknown variant.

use std::collections::HashMap;

/// What an attribute holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain values
    Value,
    /// OBNAME values naming objects of the given type
    Reference(&'static str),
    /// OBNAME values whose type is given by the text of another attribute
    TypedBy(&'static str),
}

/// One attribute of a known object type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Attribute label
    pub label: &'static str,
    /// Attribute content
    pub kind: FieldKind,
}

/// Attribute layout of a known object type
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    /// Set type this schema applies to
    pub object_type: &'static str,
    /// Attributes in declaration order
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Look up a field by label
    pub fn field(&self, label: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.label == label)
    }
}

const fn value(label: &'static str) -> FieldSpec {
    FieldSpec {
        label,
        kind: FieldKind::Value,
    }
}

const fn refs(label: &'static str, target: &'static str) -> FieldSpec {
    FieldSpec {
        label,
        kind: FieldKind::Reference(target),
    }
}

/// FILE-HEADER
pub static FILE_HEADER: Schema = Schema {
    object_type: "FILE-HEADER",
    fields: &[value("SEQUENCE-NUMBER"), value("ID")],
};

/// ORIGIN
pub static ORIGIN: Schema = Schema {
    object_type: "ORIGIN",
    fields: &[
        value("FILE-ID"),
        value("FILE-SET-NAME"),
        value("FILE-SET-NUMBER"),
        value("FILE-NUMBER"),
        value("FILE-TYPE"),
        value("PRODUCT"),
        value("VERSION"),
        value("PROGRAMS"),
        value("CREATION-TIME"),
        value("ORDER-NUMBER"),
        value("DESCENT-NUMBER"),
        value("RUN-NUMBER"),
        value("WELL-ID"),
        value("WELL-NAME"),
        value("FIELD-NAME"),
        value("PRODUCER-CODE"),
        value("PRODUCER-NAME"),
        value("COMPANY"),
        value("NAME-SPACE-NAME"),
        value("NAME-SPACE-VERSION"),
    ],
};

/// AXIS
pub static AXIS: Schema = Schema {
    object_type: "AXIS",
    fields: &[value("AXIS-ID"), value("COORDINATES"), value("SPACING")],
};

/// CHANNEL
pub static CHANNEL: Schema = Schema {
    object_type: "CHANNEL",
    fields: &[
        refs("LONG-NAME", "LONG-NAME"),
        value("PROPERTIES"),
        value("REPRESENTATION-CODE"),
        value("UNITS"),
        value("DIMENSION"),
        refs("AXIS", "AXIS"),
        value("ELEMENT-LIMIT"),
        value("SOURCE"),
    ],
};

/// FRAME
pub static FRAME: Schema = Schema {
    object_type: "FRAME",
    fields: &[
        value("DESCRIPTION"),
        refs("CHANNELS", "CHANNEL"),
        value("INDEX-TYPE"),
        value("DIRECTION"),
        value("SPACING"),
        value("ENCRYPTED"),
        value("INDEX-MIN"),
        value("INDEX-MAX"),
    ],
};

/// TOOL
pub static TOOL: Schema = Schema {
    object_type: "TOOL",
    fields: &[
        value("DESCRIPTION"),
        value("TRADEMARK-NAME"),
        value("GENERIC-NAME"),
        refs("PARTS", "EQUIPMENT"),
        value("STATUS"),
        refs("CHANNELS", "CHANNEL"),
        refs("PARAMETERS", "PARAMETER"),
    ],
};

/// PARAMETER
pub static PARAMETER: Schema = Schema {
    object_type: "PARAMETER",
    fields: &[
        refs("LONG-NAME", "LONG-NAME"),
        value("DIMENSION"),
        refs("AXIS", "AXIS"),
        refs("ZONES", "ZONE"),
        value("VALUES"),
    ],
};

/// COMPUTATION
pub static COMPUTATION: Schema = Schema {
    object_type: "COMPUTATION",
    fields: &[
        refs("LONG-NAME", "LONG-NAME"),
        value("PROPERTIES"),
        value("DIMENSION"),
        refs("AXIS", "AXIS"),
        refs("ZONES", "ZONE"),
        value("VALUES"),
        value("SOURCE"),
    ],
};

/// ZONE
pub static ZONE: Schema = Schema {
    object_type: "ZONE",
    fields: &[
        value("DESCRIPTION"),
        value("DOMAIN"),
        value("MAXIMUM"),
        value("MINIMUM"),
    ],
};

/// EQUIPMENT
pub static EQUIPMENT: Schema = Schema {
    object_type: "EQUIPMENT",
    fields: &[
        value("TRADEMARK-NAME"),
        value("STATUS"),
        value("TYPE"),
        value("SERIAL-NUMBER"),
        value("LOCATION"),
        value("HEIGHT"),
        value("LENGTH"),
        value("MINIMUM-DIAMETER"),
        value("MAXIMUM-DIAMETER"),
        value("VOLUME"),
        value("WEIGHT"),
        value("HOLE-SIZE"),
        value("PRESSURE"),
        value("TEMPERATURE"),
        value("VERTICAL-DEPTH"),
        value("RADIAL-DRIFT"),
        value("ANGULAR-DRIFT"),
    ],
};

/// PROCESS
pub static PROCESS: Schema = Schema {
    object_type: "PROCESS",
    fields: &[
        value("DESCRIPTION"),
        value("TRADEMARK-NAME"),
        value("VERSION"),
        value("PROPERTIES"),
        value("STATUS"),
        refs("INPUT-CHANNELS", "CHANNEL"),
        refs("OUTPUT-CHANNELS", "CHANNEL"),
        refs("INPUT-COMPUTATIONS", "COMPUTATION"),
        refs("OUTPUT-COMPUTATIONS", "COMPUTATION"),
        refs("PARAMETERS", "PARAMETER"),
        value("COMMENTS"),
    ],
};

/// SPLICE
pub static SPLICE: Schema = Schema {
    object_type: "SPLICE",
    fields: &[
        refs("OUTPUT-CHANNEL", "CHANNEL"),
        refs("INPUT-CHANNELS", "CHANNEL"),
        refs("ZONES", "ZONE"),
    ],
};

/// MESSAGE
pub static MESSAGE: Schema = Schema {
    object_type: "MESSAGE",
    fields: &[
        value("TYPE"),
        value("TIME"),
        value("BOREHOLE-DRIFT"),
        value("VERTICAL-DEPTH"),
        value("RADIAL-DRIFT"),
        value("ANGULAR-DRIFT"),
        value("TEXT"),
    ],
};

/// COMMENT
pub static COMMENT: Schema = Schema {
    object_type: "COMMENT",
    fields: &[value("TEXT")],
};

/// LONG-NAME
pub static LONG_NAME: Schema = Schema {
    object_type: "LONG-NAME",
    fields: &[
        value("GENERAL-MODIFIER"),
        value("QUANTITY"),
        value("QUANTITY-MODIFIER"),
        value("ALTERED-FORM"),
        value("ENTITY"),
        value("ENTITY-MODIFIER"),
        value("ENTITY-NUMBER"),
        value("ENTITY-PART"),
        value("ENTITY-PART-NUMBER"),
        value("GENERIC-SOURCE"),
        value("SOURCE-PART"),
        value("SOURCE-PART-NUMBER"),
        value("CONDITIONS"),
        value("STANDARD-SYMBOL"),
        value("PRIVATE-SYMBOL"),
    ],
};

/// CALIBRATION
pub static CALIBRATION: Schema = Schema {
    object_type: "CALIBRATION",
    fields: &[
        value("METHOD"),
        refs("CALIBRATED-CHANNELS", "CHANNEL"),
        refs("UNCALIBRATED-CHANNELS", "CHANNEL"),
        refs("COEFFICIENTS", "CALIBRATION-COEFFICIENT"),
        refs("MEASUREMENTS", "CALIBRATION-MEASUREMENT"),
        refs("PARAMETERS", "PARAMETER"),
    ],
};

/// CALIBRATION-COEFFICIENT
pub static CALIBRATION_COEFFICIENT: Schema = Schema {
    object_type: "CALIBRATION-COEFFICIENT",
    fields: &[
        value("LABEL"),
        value("COEFFICIENTS"),
        value("REFERENCES"),
        value("PLUS-TOLERANCES"),
        value("MINUS-TOLERANCES"),
    ],
};

/// CALIBRATION-MEASUREMENT
pub static CALIBRATION_MEASUREMENT: Schema = Schema {
    object_type: "CALIBRATION-MEASUREMENT",
    fields: &[
        value("PHASE"),
        value("MEASUREMENT-SOURCE"),
        value("TYPE"),
        value("DIMENSION"),
        refs("AXIS", "AXIS"),
        value("MEASUREMENT"),
        value("SAMPLE-COUNT"),
        value("MAXIMUM-DEVIATION"),
        value("STANDARD-DEVIATION"),
        value("BEGIN-TIME"),
        value("DURATION"),
        value("REFERENCE"),
        value("STANDARD"),
        value("PLUS-TOLERANCE"),
        value("MINUS-TOLERANCE"),
    ],
};

/// GROUP
pub static GROUP: Schema = Schema {
    object_type: "GROUP",
    fields: &[
        value("DESCRIPTION"),
        value("OBJECT-TYPE"),
        FieldSpec {
            label: "OBJECT-LIST",
            kind: FieldKind::TypedBy("OBJECT-TYPE"),
        },
        refs("GROUP-LIST", "GROUP"),
    ],
};

/// WELL-REFERENCE
pub static WELL_REFERENCE: Schema = Schema {
    object_type: "WELL-REFERENCE",
    fields: &[
        value("PERMANENT-DATUM"),
        value("VERTICAL-ZERO"),
        value("PERMANENT-DATUM-ELEVATION"),
        value("ABOVE-PERMANENT-DATUM"),
        value("MAGNETIC-DECLINATION"),
        value("COORDINATE-1-NAME"),
        value("COORDINATE-1-VALUE"),
        value("COORDINATE-2-NAME"),
        value("COORDINATE-2-VALUE"),
        value("COORDINATE-3-NAME"),
        value("COORDINATE-3-VALUE"),
    ],
};

/// PATH
pub static PATH: Schema = Schema {
    object_type: "PATH",
    fields: &[
        refs("FRAME-TYPE", "FRAME"),
        refs("WELL-REFERENCE-POINT", "WELL-REFERENCE"),
        refs("VALUE", "CHANNEL"),
        value("BOREHOLE-DEPTH"),
        value("VERTICAL-DEPTH"),
        value("RADIAL-DRIFT"),
        value("ANGULAR-DRIFT"),
        value("TIME"),
        value("DEPTH-OFFSET"),
        value("MEASURE-POINT-OFFSET"),
        value("TOOL-ZERO-OFFSET"),
    ],
};

/// Schemas registered by [`TypeRegistry::default`]
pub static DEFAULT_SCHEMAS: &[&Schema] = &[
    &FILE_HEADER,
    &ORIGIN,
    &AXIS,
    &CHANNEL,
    &FRAME,
    &TOOL,
    &PARAMETER,
    &COMPUTATION,
    &ZONE,
    &EQUIPMENT,
    &PROCESS,
    &SPLICE,
    &MESSAGE,
    &COMMENT,
    &LONG_NAME,
    &CALIBRATION,
    &CALIBRATION_COEFFICIENT,
    &CALIBRATION_MEASUREMENT,
    &GROUP,
    &WELL_REFERENCE,
    &PATH,
];

/// Set type to schema dispatch table
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    schemas: HashMap<String, &'static Schema>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for schema in DEFAULT_SCHEMAS {
            registry.register(*schema);
        }
        registry
    }
}

impl TypeRegistry {
    /// Registry that knows no types; everything is promoted as unknown
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Add or replace the schema for `schema.object_type`
    pub fn register(&mut self, schema: &'static Schema) -> &mut Self {
        self.schemas.insert(schema.object_type.to_string(), schema);
        self
    }

    /// Remove a type so it is promoted as unknown
    pub fn unregister(&mut self, object_type: &str) -> Option<&'static Schema> {
        self.schemas.remove(object_type)
    }

    /// Schema for a set type
    pub fn get(&self, object_type: &str) -> Option<&'static Schema> {
        self.schemas.get(object_type).copied()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_standard_types() {
        let registry = TypeRegistry::default();
        assert_eq!(registry.len(), DEFAULT_SCHEMAS.len());
        assert_eq!(registry.get("FRAME").unwrap().object_type, "FRAME");
        assert!(registry.get("UNKNOWN-SET").is_none());
    }

    #[test]
    fn frame_channels_are_references() {
        let field = FRAME.field("CHANNELS").unwrap();
        assert_eq!(field.kind, FieldKind::Reference("CHANNEL"));
    }

    #[test]
    fn unregister_falls_back_to_unknown() {
        let mut registry = TypeRegistry::default();
        assert!(registry.unregister("CHANNEL").is_some());
        assert!(registry.get("CHANNEL").is_none());
    }

    #[test]
    fn schema_labels_are_unique() {
        for schema in DEFAULT_SCHEMAS {
            let mut labels: Vec<_> = schema.fields.iter().map(|f| f.label).collect();
            labels.sort_unstable();
            labels.dedup();
            assert_eq!(labels.len(), schema.fields.len(), "{}", schema.object_type);
        }
    }
}

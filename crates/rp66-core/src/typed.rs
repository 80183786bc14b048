//! Typed objects promoted from raw objects

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use rp66_formats::{Attribute, Fingerprint, RawObject, Value};

use crate::schema::{FieldKind, Schema, TypeRegistry};

/// How a raw object was promoted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Registered type: each schema field mapped to its attribute position
    Known {
        /// Schema of the type
        schema: &'static Schema,
        /// Attribute index for each schema field, `None` when absent
        fields: Vec<Option<usize>>,
    },
    /// Unregistered type, attributes are only reachable by label
    Unknown,
}

/// One resolved reference slot
pub type Link = Option<Rc<TypedObject>>;

/// Schema-aware view over a raw object
#[derive(Debug)]
pub struct TypedObject {
    raw: Rc<RawObject>,
    shape: Shape,
    links: RefCell<BTreeMap<String, Vec<Option<Weak<TypedObject>>>>>,
}

impl TypedObject {
    /// Promote a raw object using the registry's dispatch table
    pub fn promote(raw: Rc<RawObject>, registry: &TypeRegistry) -> Self {
        let shape = match registry.get(&raw.fingerprint.object_type) {
            Some(schema) => Shape::Known {
                schema,
                fields: schema.fields.iter().map(|f| raw.position(f.label)).collect(),
            },
            None => Shape::Unknown,
        };
        Self {
            raw,
            shape,
            links: RefCell::new(BTreeMap::new()),
        }
    }

    /// Identity of the object
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.raw.fingerprint
    }

    /// Object type
    pub fn object_type(&self) -> &str {
        &self.raw.fingerprint.object_type
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.raw.fingerprint.name
    }

    /// Origin reference
    pub fn origin(&self) -> u32 {
        self.raw.fingerprint.origin
    }

    /// Copy number
    pub fn copy(&self) -> u8 {
        self.raw.fingerprint.copy
    }

    /// The raw object this view was promoted from
    pub fn raw(&self) -> &Rc<RawObject> {
        &self.raw
    }

    /// How the object was promoted
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Schema, for known types
    pub fn schema(&self) -> Option<&'static Schema> {
        match self.shape {
            Shape::Known { schema, .. } => Some(schema),
            Shape::Unknown => None,
        }
    }

    /// Whether the type is registered
    pub fn is_known(&self) -> bool {
        matches!(self.shape, Shape::Known { .. })
    }

    /// Attribute by label, for any shape
    pub fn attribute(&self, label: &str) -> Option<&Attribute> {
        self.raw.attribute(label)
    }

    /// Attribute for a schema field of a known type
    ///
    /// Returns `None` for unknown types and for labels the schema does not
    /// declare, even if the raw object carries them.
    pub fn field(&self, label: &str) -> Option<&Attribute> {
        let Shape::Known { schema, fields } = &self.shape else {
            return None;
        };
        let index = schema.fields.iter().position(|f| f.label == label)?;
        fields[index].map(|i| &self.raw.attributes[i])
    }

    /// Values of an attribute, empty when absent
    pub fn values(&self, label: &str) -> &[Value] {
        self.attribute(label)
            .map_or(&[][..], |attribute| attribute.values.as_slice())
    }

    /// Fingerprints referenced by each attribute
    ///
    /// OBJREF values always reference; OBNAME values reference when the
    /// schema declares the attribute as a reference. One slot per
    /// referencing value, in value order.
    pub fn references(&self) -> Vec<(&str, Vec<Fingerprint>)> {
        let schema = self.schema();
        let mut out = Vec::new();
        for attribute in &self.raw.attributes {
            let kind = schema
                .and_then(|s| s.field(&attribute.label))
                .map_or(FieldKind::Value, |f| f.kind);
            let target = match kind {
                FieldKind::Value => None,
                FieldKind::Reference(target) => Some(target.to_string()),
                FieldKind::TypedBy(label) => self
                    .values(label)
                    .first()
                    .and_then(Value::as_text)
                    .map(str::to_string),
            };

            let slots: Vec<Fingerprint> = attribute
                .values
                .iter()
                .filter_map(|value| match value {
                    Value::Reference { object_type, name } => {
                        Some(Fingerprint::new(object_type.clone(), name))
                    }
                    Value::Name(name) => target.as_ref().map(|t| Fingerprint::new(t.clone(), name)),
                    _ => None,
                })
                .collect();
            if !slots.is_empty() {
                out.push((attribute.label.as_str(), slots));
            }
        }
        out
    }

    /// Replace the resolved links of one attribute
    pub(crate) fn set_links(&self, label: &str, slots: Vec<Option<Weak<Self>>>) {
        self.links.borrow_mut().insert(label.to_string(), slots);
    }

    /// Resolved targets of a reference attribute, one slot per reference
    ///
    /// Empty until the pool has been linked. Slots stay `None` for
    /// references the pool could not resolve.
    pub fn linked(&self, label: &str) -> Vec<Link> {
        self.links
            .borrow()
            .get(label)
            .map(|slots| slots.iter().map(|s| s.as_ref().and_then(Weak::upgrade)).collect())
            .unwrap_or_default()
    }

    /// Labels that have been linked
    pub fn linked_labels(&self) -> Vec<String> {
        self.links.borrow().keys().cloned().collect()
    }
}

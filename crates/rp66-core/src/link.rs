//! Reference resolution between pooled objects

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use rp66_formats::Fingerprint;
use serde::Serialize;
use tracing::{debug, warn};

use crate::typed::TypedObject;

/// A reference to an object missing from the pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DanglingReference {
    /// Referencing object
    pub from: Fingerprint,
    /// Attribute holding the reference
    pub label: String,
    /// Referenced fingerprint
    pub target: Fingerprint,
}

/// Outcome of linking a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    /// Reference slots resolved to an object
    pub resolved: usize,
    /// Distinct unresolved references, one per (referencing object, target)
    pub dangling: Vec<DanglingReference>,
}

impl LinkReport {
    /// Whether every reference resolved
    pub fn is_complete(&self) -> bool {
        self.dangling.is_empty()
    }
}

/// Resolve every reference of `objects` against `objects`
///
/// Links are rebuilt from scratch, so running this again after the set of
/// objects grew resolves references that were dangling before.
pub(crate) fn link_objects(objects: &[Rc<TypedObject>]) -> LinkReport {
    let by_fingerprint: HashMap<&Fingerprint, &Rc<TypedObject>> =
        objects.iter().map(|o| (o.fingerprint(), o)).collect();

    let mut report = LinkReport::default();
    let mut seen = HashSet::new();

    for object in objects {
        for (label, targets) in object.references() {
            let mut slots = Vec::with_capacity(targets.len());
            for target in targets {
                if let Some(found) = by_fingerprint.get(&target) {
                    slots.push(Some(Rc::downgrade(found)));
                    report.resolved += 1;
                    continue;
                }
                slots.push(None);
                if seen.insert((object.fingerprint().clone(), target.clone())) {
                    warn!(
                        "{} references missing object {} in {}",
                        object.fingerprint(),
                        target,
                        label
                    );
                    report.dangling.push(DanglingReference {
                        from: object.fingerprint().clone(),
                        label: label.to_string(),
                        target,
                    });
                }
            }
            object.set_links(label, slots);
        }
    }

    debug!(
        "Linked {} objects: {} references resolved, {} dangling",
        objects.len(),
        report.resolved,
        report.dangling.len()
    );
    report
}

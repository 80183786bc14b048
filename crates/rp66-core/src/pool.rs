//! Per-logical-file object pool
//!
//! Raw objects are kept grouped by type in the order they were declared.
//! A type is promoted to [`TypedObject`]s the first time it is queried and,
//! unless caching is disabled, kept for later queries and for linking.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use rp66_formats::{Fingerprint, ObjectSet, RawObject};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::link::{LinkReport, link_objects};
use crate::matcher::{CompiledMatcher, Matcher};
use crate::schema::TypeRegistry;
use crate::typed::TypedObject;

/// Promoted objects of one type
#[derive(Debug, Default)]
struct TypeBucket {
    objects: Vec<Rc<TypedObject>>,
    by_name: HashMap<String, Vec<usize>>,
    by_fingerprint: HashMap<Fingerprint, usize>,
}

impl TypeBucket {
    fn build<'a>(raw: impl IntoIterator<Item = &'a Rc<RawObject>>, registry: &TypeRegistry) -> Self {
        let mut bucket = Self::default();
        for object in raw {
            bucket.insert(Rc::clone(object), registry);
        }
        bucket
    }

    /// Insert, collapsing an existing fingerprint in place
    fn insert(&mut self, raw: Rc<RawObject>, registry: &TypeRegistry) {
        let promoted = Rc::new(TypedObject::promote(Rc::clone(&raw), registry));
        if let Some(&index) = self.by_fingerprint.get(&raw.fingerprint) {
            if !self.objects[index].raw().same_content(&raw) {
                warn!(
                    "Duplicate object {} with different content, keeping the last one",
                    raw.fingerprint
                );
            }
            self.objects[index] = promoted;
            return;
        }

        let index = self.objects.len();
        self.by_fingerprint.insert(raw.fingerprint.clone(), index);
        self.by_name
            .entry(raw.fingerprint.name.clone())
            .or_default()
            .push(index);
        self.objects.push(promoted);
    }

    fn select(&self, name: Option<&CompiledMatcher>) -> Vec<Rc<TypedObject>> {
        match name {
            None => self.objects.clone(),
            Some(CompiledMatcher::Exact(name)) => self
                .by_name
                .get(name)
                .map(|indices| indices.iter().map(|&i| Rc::clone(&self.objects[i])).collect())
                .unwrap_or_default(),
            Some(matcher) => self
                .objects
                .iter()
                .filter(|o| matcher.matches(o.name()))
                .cloned()
                .collect(),
        }
    }
}

/// Indexed, cached pool of the metadata objects of one logical file
#[derive(Debug)]
pub struct ObjectPool {
    raw: BTreeMap<String, Vec<Rc<RawObject>>>,
    registry: TypeRegistry,
    cache_enabled: bool,
    cache: RefCell<HashMap<String, TypeBucket>>,
}

impl ObjectPool {
    /// Build a pool from parsed object sets
    pub fn new(sets: Vec<ObjectSet>, registry: TypeRegistry) -> Self {
        let mut pool = Self {
            raw: BTreeMap::new(),
            registry,
            cache_enabled: true,
            cache: RefCell::new(HashMap::new()),
        };
        pool.add_sets(sets);
        pool
    }

    /// Add more object sets
    ///
    /// Types already promoted are updated in place, so existing objects
    /// keep their identity unless a duplicate fingerprint replaces them.
    pub fn add_sets(&mut self, sets: Vec<ObjectSet>) {
        let cache = self.cache.get_mut();
        for set in sets {
            debug!("Pooling {} objects of type {}", set.objects.len(), set.set_type);
            let raw = self.raw.entry(set.set_type.clone()).or_default();
            for object in set.objects {
                let object = Rc::new(object);
                if let Some(bucket) = cache.get_mut(&set.set_type) {
                    bucket.insert(Rc::clone(&object), &self.registry);
                }
                raw.push(object);
            }
        }
    }

    /// Types present in the pool
    pub fn types(&self) -> BTreeSet<String> {
        self.raw.keys().cloned().collect()
    }

    /// Number of raw objects, duplicates included
    pub fn len(&self) -> usize {
        self.raw.values().map(Vec::len).sum()
    }

    /// Whether the pool holds no objects
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether promoted objects are cached
    pub fn is_caching(&self) -> bool {
        self.cache_enabled
    }

    /// Enable or disable caching
    ///
    /// Disabling drops everything cached, including resolved links. Types
    /// promoted afterwards are rebuilt on every query.
    ///
    /// [`link`](Self::link) fills the cache even while caching is disabled,
    /// so after linking every query returns the linked instances again.
    /// Call this with `false` once more to go back to fresh promotion.
    pub fn cache_metadata(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
        if !enabled {
            self.cache.get_mut().clear();
        }
    }

    /// Run `f` over the promoted bucket of `object_type`
    fn with_bucket<T>(&self, object_type: &str, f: impl FnOnce(&TypeBucket) -> T) -> T {
        if let Some(bucket) = self.cache.borrow().get(object_type) {
            return f(bucket);
        }

        let raw = self.raw.get(object_type).into_iter().flatten();
        let bucket = TypeBucket::build(raw, &self.registry);
        debug!(
            "Promoted {} objects of type {}",
            bucket.objects.len(),
            object_type
        );
        if !self.cache_enabled {
            return f(&bucket);
        }

        let mut cache = self.cache.borrow_mut();
        f(cache.entry(object_type.to_string()).or_insert(bucket))
    }

    /// Promote a type into the cache regardless of the caching setting
    fn materialise(&self, object_type: &str) -> Vec<Rc<TypedObject>> {
        if let Some(bucket) = self.cache.borrow().get(object_type) {
            return bucket.objects.clone();
        }
        let raw = self.raw.get(object_type).into_iter().flatten();
        let bucket = TypeBucket::build(raw, &self.registry);
        let objects = bucket.objects.clone();
        self.cache.borrow_mut().insert(object_type.to_string(), bucket);
        objects
    }

    /// All objects whose type matches `object_type` and, if given, whose
    /// name matches `name`
    ///
    /// Unknown types and names give an empty result.
    pub fn find(
        &self,
        object_type: &str,
        name: Option<&str>,
        matcher: Matcher,
    ) -> Result<Vec<Rc<TypedObject>>> {
        let name = name.map(|n| matcher.compile(n)).transpose()?;
        let types: Vec<&String> = match matcher.compile(object_type)? {
            CompiledMatcher::Exact(t) => self.raw.keys().filter(|k| **k == t).collect(),
            pattern => self.raw.keys().filter(|k| pattern.matches(k)).collect(),
        };

        let mut out = Vec::new();
        for object_type in types {
            out.extend(self.with_bucket(object_type, |bucket| bucket.select(name.as_ref())));
        }
        Ok(out)
    }

    /// Exactly one object of `object_type` named `name`
    ///
    /// `origin` and `copy` narrow the candidates. Several remaining
    /// candidates with identical content count as one.
    pub fn object(
        &self,
        object_type: &str,
        name: &str,
        origin: Option<u32>,
        copy: Option<u8>,
    ) -> Result<Rc<TypedObject>> {
        let candidates: Vec<Rc<TypedObject>> = self
            .find(object_type, Some(name), Matcher::Exact)?
            .into_iter()
            .filter(|o| origin.is_none_or(|origin| o.origin() == origin))
            .filter(|o| copy.is_none_or(|copy| o.copy() == copy))
            .collect();

        match candidates.as_slice() {
            [] => Err(Error::NotFound {
                object_type: object_type.to_string(),
                name: name.to_string(),
            }),
            [only] => Ok(Rc::clone(only)),
            [first, rest @ ..] => {
                if rest.iter().all(|o| o.raw().same_content(first.raw())) {
                    debug!(
                        "{} copies of {object_type} {name} are identical, returning the first",
                        candidates.len()
                    );
                    return Ok(Rc::clone(first));
                }
                Err(Error::Ambiguous {
                    object_type: object_type.to_string(),
                    name: name.to_string(),
                    candidates: candidates.iter().map(|o| (o.origin(), o.copy())).collect(),
                })
            }
        }
    }

    /// Resolve references between all objects in the pool
    ///
    /// Every type is promoted into the cache first, even with caching
    /// disabled, so links point at the instances later queries return.
    pub fn link(&self) -> LinkReport {
        let objects: Vec<Rc<TypedObject>> = self
            .raw
            .keys()
            .flat_map(|object_type| self.materialise(object_type))
            .collect();
        link_objects(&objects)
    }
}

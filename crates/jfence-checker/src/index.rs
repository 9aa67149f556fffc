//! The symbol-to-restriction index and ancestor lookup

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ErrorListener;
use crate::location::{Location, RestrictedElement};
use crate::policy::AccessRestriction;

/// The restrictions attached to one symbol: the target plus its ordered
/// policy list. Every policy in the set fires for every event; there is no
/// short-circuit.
#[derive(Clone)]
pub struct Restrictions {
    target: RestrictedElement,
    policies: Vec<Arc<dyn AccessRestriction>>,
}

impl Restrictions {
    /// Create a set for a target, keeping the policies in declaration order
    pub fn new(target: RestrictedElement, policies: Vec<Arc<dyn AccessRestriction>>) -> Self {
        Self { target, policies }
    }

    /// The restricted target this set guards
    pub fn target(&self) -> &RestrictedElement {
        &self.target
    }

    /// Whether the set carries no policies
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// The same target with only the policies that extend to lexically
    /// nested symbols
    pub fn nested_only(&self) -> Restrictions {
        Restrictions {
            target: self.target.clone(),
            policies: self
                .policies
                .iter()
                .filter(|p| p.applies_to_nested())
                .cloned()
                .collect(),
        }
    }

    /// The target is used as a superclass
    pub fn used_as_super_type(&self, location: &Location<'_>, listener: &mut dyn ErrorListener) {
        for policy in &self.policies {
            policy.used_as_super_type(location, &self.target, listener);
        }
    }

    /// The target is used as an implemented interface
    pub fn used_as_interface(&self, location: &Location<'_>, listener: &mut dyn ErrorListener) {
        for policy in &self.policies {
            policy.used_as_interface(location, &self.target, listener);
        }
    }

    /// The target type is instantiated
    pub fn instantiated(&self, location: &Location<'_>, listener: &mut dyn ErrorListener) {
        for policy in &self.policies {
            policy.instantiated(location, &self.target, listener);
        }
    }

    /// The target method is invoked
    pub fn invoked(&self, location: &Location<'_>, listener: &mut dyn ErrorListener) {
        for policy in &self.policies {
            policy.invoked(location, &self.target, listener);
        }
    }

    /// The target method is overridden
    pub fn overridden(&self, location: &Location<'_>, listener: &mut dyn ErrorListener) {
        for policy in &self.policies {
            policy.overridden(location, &self.target, listener);
        }
    }

    /// The target field is read
    pub fn read(&self, location: &Location<'_>, listener: &mut dyn ErrorListener) {
        for policy in &self.policies {
            policy.read(location, &self.target, listener);
        }
    }

    /// The target field is written
    pub fn written(&self, location: &Location<'_>, listener: &mut dyn ErrorListener) {
        for policy in &self.policies {
            policy.written(location, &self.target, listener);
        }
    }
}

/// Map from symbol key to its restriction set, frozen once loading completes
#[derive(Default)]
pub struct RestrictionIndex {
    entries: FxHashMap<String, Restrictions>,
}

impl RestrictionIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the set for a key. A later load for the same key replaces the
    /// earlier one.
    pub fn insert(&mut self, key: impl Into<String>, set: Restrictions) {
        self.entries.insert(key.into(), set);
    }

    /// The set recorded directly under a key, if any
    pub fn get(&self, key: &str) -> Option<&Restrictions> {
        self.entries.get(key)
    }

    /// Number of restricted symbols
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no symbols
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every restriction set applicable to a symbol under a suppression
    /// scope.
    ///
    /// The exact set for the key comes first, then the nested-applying part
    /// of each lexically enclosing type's set, innermost outward. A
    /// suppressed enclosing type stops the walk, and also withdraws the
    /// exact set; a suppressed key returns nothing at all.
    pub fn lookup(&self, key: &str, suppressed: &FxHashSet<String>) -> Vec<Restrictions> {
        if suppressed.contains(key) {
            return Vec::new();
        }

        let mut nested = Vec::new();
        let mut blocked = false;
        for ancestor in enclosing_types(key) {
            if suppressed.contains(ancestor) {
                blocked = true;
                break;
            }
            if let Some(set) = self.entries.get(ancestor) {
                let filtered = set.nested_only();
                if !filtered.is_empty() {
                    nested.push(filtered);
                }
            }
        }

        let mut applicable = Vec::new();
        if !blocked {
            if let Some(exact) = self.entries.get(key) {
                applicable.push(exact.clone());
            }
        }
        applicable.extend(nested);
        applicable
    }
}

/// The lexically enclosing types of a symbol key, innermost outward.
///
/// The member part (after `.`) is stripped first, then nested-type suffixes
/// one `$` segment at a time. The member separator goes first so a `$`
/// inside a method descriptor is never mistaken for a nesting boundary.
fn enclosing_types(key: &str) -> impl Iterator<Item = &str> {
    let mut current = key;
    let mut at_member = key.rfind('.').is_some();
    std::iter::from_fn(move || {
        if at_member {
            at_member = false;
            current = &current[..current.rfind('.').unwrap_or(0)];
            return Some(current);
        }
        let cut = current.rfind('$')?;
        current = &current[..cut];
        Some(current)
    })
}

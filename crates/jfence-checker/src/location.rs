//! Use-site locations and restricted targets

use std::collections::HashMap;
use std::fmt;

use crate::resolver::ClassResolver;

/// A use-site being inspected.
///
/// One is built per visited reference and dropped right after dispatch;
/// policies read from it during their callback and nothing else holds on
/// to it.
pub struct Location<'a> {
    class_name: &'a str,
    method_name: Option<&'a str>,
    method_descriptor: Option<&'a str>,
    line: u32,
    resolver: &'a dyn ClassResolver,
    properties: &'a HashMap<String, String>,
}

impl<'a> Location<'a> {
    /// Create a location. `class_name` is in dotted form.
    pub fn new(
        class_name: &'a str,
        method_name: Option<&'a str>,
        method_descriptor: Option<&'a str>,
        line: u32,
        resolver: &'a dyn ClassResolver,
        properties: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            class_name,
            method_name,
            method_descriptor,
            line,
            resolver,
            properties,
        }
    }

    /// Dotted name of the class in which the use happened
    pub fn class_name(&self) -> &str {
        self.class_name
    }

    /// Name of the enclosing method, when the use is inside one
    pub fn method_name(&self) -> Option<&str> {
        self.method_name
    }

    /// Descriptor of the enclosing method, to disambiguate overloads
    pub fn method_descriptor(&self) -> Option<&str> {
        self.method_descriptor
    }

    /// Source line of the use, 0 when unknown
    pub fn line_number(&self) -> u32 {
        self.line
    }

    /// Resolver for loading other class definitions, for policies that need
    /// to inspect the caller
    pub fn resolver(&self) -> &dyn ClassResolver {
        self.resolver
    }

    /// Caller-supplied configuration value
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

impl fmt::Display for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class_name, self.line)
    }
}

impl fmt::Debug for Location<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("class_name", &self.class_name)
            .field("method_name", &self.method_name)
            .field("method_descriptor", &self.method_descriptor)
            .field("line", &self.line)
            .finish()
    }
}

/// Identity of a restricted target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedElement {
    key: String,
    in_module: bool,
    message: String,
}

impl RestrictedElement {
    /// Create a target from its symbol key. `message` is the optional
    /// free-text diagnostic attached to the restriction.
    pub fn new(key: impl Into<String>, in_module: bool, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            in_module,
            message: message.into(),
        }
    }

    /// The symbol key, e.g. `a/B`, `a/B.field` or `a/B.m()V`
    pub fn key(&self) -> &str {
        &self.key
    }

    /// True when the target is defined inside the module being inspected.
    /// Restrictions are often relaxed for same-module uses.
    pub fn in_inspected_module(&self) -> bool {
        self.in_module
    }

    /// Additional message to append when reporting, empty when none
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Internal name of the class declaring the target: the key up to the
    /// member separator.
    pub fn declaring_class(&self) -> &str {
        self.key.split('.').next().unwrap_or(&self.key)
    }

    /// Whether the use-site lives in the same top-level class file as the
    /// target. Nested and anonymous classes count as their enclosing
    /// top-level type.
    pub fn is_same_class(&self, location: &Location<'_>) -> bool {
        let mut location_class = location.class_name();
        if let Some(i) = location_class.find('$') {
            location_class = &location_class[..i];
        }
        self.declaring_class().replace('/', ".") == location_class
    }
}

impl fmt::Display for RestrictedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

//! The checker: index loading and class-file scanning
//!
//! A run has two strict phases. Phase one reads the restriction indexes
//! advertised on the classpath and freezes the [`RestrictionIndex`]; phase
//! two walks the inspected class files and dispatches every observed use
//! against it. Violations and warnings stream through the listener; only
//! unreadable inputs abort a call chain, via `Result`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use jfence_classfile::{references, Annotation, ClassFile, DecodeError, ElementValue, Reference};
use rustc_hash::FxHashSet;

use crate::error::{CheckError, ErrorListener};
use crate::index::{RestrictionIndex, Restrictions};
use crate::location::{Location, RestrictedElement};
use crate::registry::PolicyRegistry;
use crate::resolver::ClassResolver;

/// Field descriptor of the restriction marker annotation
pub const RESTRICTED_DESCRIPTOR: &str = "Lorg/kohsuke/accmod/Restricted;";

/// Field descriptor of the suppression annotation
pub const SUPPRESS_DESCRIPTOR: &str =
    "Lorg/kohsuke/accmod/restrictions/suppressions/SuppressRestrictedWarnings;";

/// Conventional locations of the restriction index, both honored
const INDEX_RESOURCE_PREFIXES: [&str; 2] = ["META-INF/services/annotations/", "META-INF/annotations/"];

/// File name of the restriction index under either prefix
const INDEX_RESOURCE_NAME: &str = "org.kohsuke.accmod.Restricted";

/// A single inspection run: the classpath, the policy registry, the loaded
/// index, and the caller's property bag.
pub struct Checker<R> {
    resolver: R,
    registry: PolicyRegistry,
    index: RestrictionIndex,
    properties: HashMap<String, String>,
}

impl<R: ClassResolver> Checker<R> {
    /// Create a checker over a classpath. The index starts empty; call
    /// [`Checker::load_access_restrictions`] before scanning.
    pub fn new(resolver: R, properties: HashMap<String, String>) -> Self {
        Self {
            resolver,
            registry: PolicyRegistry::new(),
            index: RestrictionIndex::new(),
            properties,
        }
    }

    /// The policy registry, for registering custom policy factories before
    /// the index is loaded
    pub fn registry_mut(&mut self) -> &mut PolicyRegistry {
        &mut self.registry
    }

    /// The loaded restriction index
    pub fn index(&self) -> &RestrictionIndex {
        &self.index
    }

    /// Load every restriction index advertised by the classpath entries.
    /// The restricted symbols are recorded as external to the inspected
    /// module.
    pub fn load_access_restrictions(
        &mut self,
        listener: &mut dyn ErrorListener,
    ) -> Result<(), CheckError> {
        let lists = collect_index_lists(&self.resolver)?;
        for list in &lists {
            self.load_restriction_list(list, false, listener)?;
        }
        Ok(())
    }

    /// Load the restriction index resources found in `source`, recording the
    /// restricted symbols as the inspected module's own. Definitions still
    /// resolve through the checker's classpath.
    pub fn load_module_restrictions(
        &mut self,
        source: &dyn ClassResolver,
        listener: &mut dyn ErrorListener,
    ) -> Result<(), CheckError> {
        let lists = collect_index_lists(source)?;
        for list in &lists {
            self.load_restriction_list(list, true, listener)?;
        }
        Ok(())
    }

    /// Load one newline-separated list of fully-qualified restricted class
    /// names. Each named definition is located on the classpath, falling
    /// back to the package descriptor; a name with neither produces a
    /// warning and is skipped.
    pub fn load_restriction_list(
        &mut self,
        list: &str,
        in_module: bool,
        listener: &mut dyn ErrorListener,
    ) -> Result<(), CheckError> {
        for line in list.lines() {
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            let internal = name.replace('.', "/");
            let resource = format!("{internal}.class");
            let mut bytes = find_resource(&self.resolver, &resource)?;
            if bytes.is_none() {
                bytes = find_resource(&self.resolver, &format!("{internal}/package-info.class"))?;
            }
            let Some(bytes) = bytes else {
                listener.on_warning(None, None, &format!("failed to find class file for {name}"));
                continue;
            };
            let class = ClassFile::parse(&bytes).map_err(|e| CheckError::ClassFile {
                path: PathBuf::from(&resource),
                source: e,
            })?;
            self.index_class(&class, in_module, listener);
        }
        Ok(())
    }

    /// Record the restriction sets declared by one class definition: on the
    /// type itself, on its fields, and on its methods
    fn index_class(&mut self, class: &ClassFile, in_module: bool, listener: &mut dyn ErrorListener) {
        for annotation in &class.annotations {
            self.record(class.name.clone(), annotation, in_module, listener);
        }
        for field in &class.fields {
            for annotation in &field.annotations {
                let key = format!("{}.{}", class.name, field.name);
                self.record(key, annotation, in_module, listener);
            }
        }
        for method in &class.methods {
            for annotation in &method.annotations {
                let key = format!("{}.{}{}", class.name, method.name, method.descriptor);
                self.record(key, annotation, in_module, listener);
            }
        }
    }

    fn record(
        &mut self,
        key: String,
        annotation: &Annotation,
        in_module: bool,
        listener: &mut dyn ErrorListener,
    ) {
        if annotation.type_descriptor != RESTRICTED_DESCRIPTOR {
            return;
        }
        let message = annotation
            .element("message")
            .and_then(ElementValue::as_str)
            .unwrap_or("")
            .to_string();
        let mut policies = Vec::new();
        if let Some(ElementValue::Array(values)) = annotation.element("value") {
            for value in values {
                if let Some(internal) = value.as_class_internal_name() {
                    let identity = internal.replace('/', ".");
                    policies.push(self.registry.resolve(&identity, listener));
                }
            }
        }
        let target = RestrictedElement::new(&key, in_module, message);
        self.index.insert(key, Restrictions::new(target, policies));
    }

    /// Inspect a single `.class` file or a directory of them, recursively.
    /// Directories are visited in lexicographic order; files without the
    /// `.class` suffix are ignored.
    pub fn check(&self, path: &Path, listener: &mut dyn ErrorListener) -> Result<(), CheckError> {
        let io = |e| CheckError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if path.is_dir() {
            let mut children = Vec::new();
            for entry in fs::read_dir(path).map_err(io)? {
                children.push(entry.map_err(io)?.path());
            }
            children.sort();
            for child in children {
                self.check(&child, listener)?;
            }
            return Ok(());
        }
        if path.extension().is_some_and(|e| e == "class") {
            self.check_class(path, listener)?;
        }
        Ok(())
    }

    /// Inspect one class file on disk
    pub fn check_class(
        &self,
        path: &Path,
        listener: &mut dyn ErrorListener,
    ) -> Result<(), CheckError> {
        let bytes = fs::read(path).map_err(|e| CheckError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let class_file = |e| CheckError::ClassFile {
            path: path.to_path_buf(),
            source: e,
        };
        let class = ClassFile::parse(&bytes).map_err(class_file)?;
        self.scan_class(&class, listener).map_err(class_file)
    }

    /// Scan a parsed class against the index.
    ///
    /// Methods are visited first and the class-level supertype/interface
    /// events last, so the class's own suppression annotations are in
    /// effect for everything. Synthetic classes and members are skipped
    /// entirely.
    pub fn scan_class(
        &self,
        class: &ClassFile,
        listener: &mut dyn ErrorListener,
    ) -> Result<(), DecodeError> {
        if class.is_synthetic() {
            return Ok(());
        }
        let dotted = class.name.replace('/', ".");
        let class_scope = suppression_scope(&class.annotations);

        for method in &class.methods {
            if method.is_synthetic() {
                continue;
            }
            let mut scope = class_scope.clone();
            scope.extend(suppression_scope(&method.annotations));
            self.scan_method(class, &dotted, method, &scope, listener)?;
        }

        if let Some(super_name) = &class.super_name {
            if !same_class_file(&class.name, super_name) {
                let location = self.location(&dotted, None, None, 0);
                for set in self.index.lookup(super_name, &class_scope) {
                    set.used_as_super_type(&location, listener);
                }
            }
        }
        for interface in &class.interfaces {
            if same_class_file(&class.name, interface) {
                continue;
            }
            let location = self.location(&dotted, None, None, 0);
            for set in self.index.lookup(interface, &class_scope) {
                set.used_as_interface(&location, listener);
            }
        }
        Ok(())
    }

    fn scan_method(
        &self,
        class: &ClassFile,
        dotted: &str,
        method: &jfence_classfile::Member,
        scope: &FxHashSet<String>,
        listener: &mut dyn ErrorListener,
    ) -> Result<(), DecodeError> {
        if let Some(code) = &method.code {
            for item in references(&code.bytes, &class.pool) {
                let (pc, reference) = item?;
                let line = code.line_for(pc);
                let location =
                    self.location(dotted, Some(&method.name), Some(&method.descriptor), line);
                match reference {
                    Reference::New { owner } => {
                        if same_class_file(&class.name, owner) {
                            continue;
                        }
                        for set in self.index.lookup(owner, scope) {
                            set.instantiated(&location, listener);
                        }
                    }
                    Reference::Invoke(target) => {
                        if same_class_file(&class.name, target.owner) {
                            continue;
                        }
                        let key = format!("{}.{}{}", target.owner, target.name, target.descriptor);
                        for set in self.index.lookup(&key, scope) {
                            set.invoked(&location, listener);
                        }
                    }
                    Reference::FieldRead(target) => {
                        if same_class_file(&class.name, target.owner) {
                            continue;
                        }
                        let key = format!("{}.{}", target.owner, target.name);
                        for set in self.index.lookup(&key, scope) {
                            set.read(&location, listener);
                        }
                    }
                    Reference::FieldWrite(target) => {
                        if same_class_file(&class.name, target.owner) {
                            continue;
                        }
                        let key = format!("{}.{}", target.owner, target.name);
                        for set in self.index.lookup(&key, scope) {
                            set.written(&location, listener);
                        }
                    }
                }
            }
        }

        // Overriding is a structural fact, not an instruction: a method
        // whose name and descriptor match a restricted member of the
        // declared supertype or interfaces overrides it.
        if method.name != "<init>" && method.name != "<clinit>" {
            let supertypes = class
                .super_name
                .iter()
                .map(String::as_str)
                .chain(class.interfaces.iter().map(String::as_str));
            for owner in supertypes {
                if same_class_file(&class.name, owner) {
                    continue;
                }
                let key = format!("{}.{}{}", owner, method.name, method.descriptor);
                let sets = self.index.lookup(&key, scope);
                if sets.is_empty() {
                    continue;
                }
                let location =
                    self.location(dotted, Some(&method.name), Some(&method.descriptor), 0);
                for set in sets {
                    set.overridden(&location, listener);
                }
            }
        }
        Ok(())
    }

    fn location<'a>(
        &'a self,
        class_name: &'a str,
        method_name: Option<&'a str>,
        method_descriptor: Option<&'a str>,
        line: u32,
    ) -> Location<'a> {
        Location::new(
            class_name,
            method_name,
            method_descriptor,
            line,
            &self.resolver,
            &self.properties,
        )
    }
}

/// Read the content of every restriction index resource `source` exposes,
/// under both conventional prefixes
fn collect_index_lists(source: &dyn ClassResolver) -> Result<Vec<String>, CheckError> {
    let mut lists = Vec::new();
    for prefix in INDEX_RESOURCE_PREFIXES {
        let resource = format!("{prefix}{INDEX_RESOURCE_NAME}");
        let occurrences = source.find_resources(&resource).map_err(|e| CheckError::Io {
            path: PathBuf::from(&resource),
            source: e,
        })?;
        for bytes in occurrences {
            let text = String::from_utf8(bytes).map_err(|e| CheckError::Io {
                path: PathBuf::from(&resource),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;
            lists.push(text);
        }
    }
    Ok(lists)
}

fn find_resource(resolver: &dyn ClassResolver, path: &str) -> Result<Option<Vec<u8>>, CheckError> {
    resolver.find_resource(path).map_err(|e| CheckError::Io {
        path: PathBuf::from(path),
        source: e,
    })
}

/// The internal names the suppression annotation lists; both class literals
/// and plain string names are accepted
fn suppression_scope(annotations: &[Annotation]) -> FxHashSet<String> {
    let mut scope = FxHashSet::default();
    for annotation in annotations {
        if annotation.type_descriptor != SUPPRESS_DESCRIPTOR {
            continue;
        }
        if let Some(ElementValue::Array(values)) = annotation.element("value") {
            for value in values {
                if let Some(internal) = value.as_class_internal_name() {
                    scope.insert(internal.to_string());
                } else if let Some(name) = value.as_str() {
                    scope.insert(name.replace('.', "/"));
                }
            }
        }
    }
    scope
}

fn top_level_class(name: &str) -> &str {
    match name.find('$') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// Whether two internal names come from the same top-level source file. A
/// type may always use its own members and its own nested members.
fn same_class_file(current: &str, owner: &str) -> bool {
    top_level_class(current) == top_level_class(owner)
}

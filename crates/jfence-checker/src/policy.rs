//! Access restriction policies
//!
//! A policy is a strategy object reacting to the seven usage events the
//! scanner can observe. Policies are stateless; one instance per identity is
//! shared for a whole run through the [`crate::registry::PolicyRegistry`].

use jfence_classfile::ClassFile;

use crate::error::ErrorListener;
use crate::location::{Location, RestrictedElement};

/// Identities of the built-in policies, as they appear in `@Restricted`
pub mod identities {
    /// The permissive no-op policy
    pub const NONE: &str = "org.kohsuke.accmod.restrictions.None";
    /// Prohibits every use
    pub const DO_NOT_USE: &str = "org.kohsuke.accmod.restrictions.DoNotUse";
    /// Prohibits use from outside the inspected module
    pub const NO_EXTERNAL_USE: &str = "org.kohsuke.accmod.restrictions.NoExternalUse";
    /// Prohibits overriding
    pub const FINAL: &str = "org.kohsuke.accmod.restrictions.Final";
    /// Prohibits invocation except from subtypes, like `protected`
    pub const PROTECTED_EXTERNALLY: &str = "org.kohsuke.accmod.restrictions.ProtectedExternally";
}

/// A strategy reacting to usage events on a restricted element.
///
/// Every callback defaults to permitting the use; implementations override
/// the events they care about and report through the listener.
pub trait AccessRestriction {
    /// The restricted type is used as a superclass
    fn used_as_super_type(
        &self,
        _location: &Location<'_>,
        _target: &RestrictedElement,
        _listener: &mut dyn ErrorListener,
    ) {
    }

    /// The restricted type is used as an implemented interface
    fn used_as_interface(
        &self,
        _location: &Location<'_>,
        _target: &RestrictedElement,
        _listener: &mut dyn ErrorListener,
    ) {
    }

    /// The restricted type is instantiated
    fn instantiated(
        &self,
        _location: &Location<'_>,
        _target: &RestrictedElement,
        _listener: &mut dyn ErrorListener,
    ) {
    }

    /// The restricted method is invoked
    fn invoked(
        &self,
        _location: &Location<'_>,
        _target: &RestrictedElement,
        _listener: &mut dyn ErrorListener,
    ) {
    }

    /// The restricted method is overridden
    fn overridden(
        &self,
        _location: &Location<'_>,
        _target: &RestrictedElement,
        _listener: &mut dyn ErrorListener,
    ) {
    }

    /// The restricted field is read
    fn read(
        &self,
        _location: &Location<'_>,
        _target: &RestrictedElement,
        _listener: &mut dyn ErrorListener,
    ) {
    }

    /// The restricted field is written
    fn written(
        &self,
        _location: &Location<'_>,
        _target: &RestrictedElement,
        _listener: &mut dyn ErrorListener,
    ) {
    }

    /// Whether the restriction also covers all lexically nested symbols of
    /// the protected type
    fn applies_to_nested(&self) -> bool {
        false
    }
}

/// Permits everything. Also the fallback cached for policy identities that
/// fail to resolve.
#[derive(Debug, Default)]
pub struct Permissive;

impl AccessRestriction for Permissive {}

/// Prohibits every use except overriding
#[derive(Debug, Default)]
pub struct DoNotUse;

impl DoNotUse {
    fn deny(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        listener.on_error(
            None,
            Some(location),
            &format!("{} must not be used. {}", target, target.message()),
        );
    }
}

impl AccessRestriction for DoNotUse {
    fn used_as_super_type(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn used_as_interface(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn instantiated(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn invoked(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn read(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn written(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn applies_to_nested(&self) -> bool {
        true
    }
}

/// Prohibits use from outside the inspected module; same-module uses pass
#[derive(Debug, Default)]
pub struct NoExternalUse;

impl NoExternalUse {
    fn deny(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        if target.in_inspected_module() {
            return;
        }
        listener.on_error(
            None,
            Some(location),
            &format!("{} must not be used. {}", target, target.message()),
        );
    }
}

impl AccessRestriction for NoExternalUse {
    fn used_as_super_type(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn used_as_interface(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn instantiated(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn invoked(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn read(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn written(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        self.deny(location, target, listener);
    }

    fn applies_to_nested(&self) -> bool {
        true
    }
}

/// Permits everything except overriding
#[derive(Debug, Default)]
pub struct Final;

impl AccessRestriction for Final {
    fn overridden(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        listener.on_error(
            None,
            Some(location),
            &format!("{} must not be overridden. {}", target, target.message()),
        );
    }
}

/// Permits invocation only from the inspected module or from direct subtypes
/// of the declaring type, mimicking `protected` access across modules.
#[derive(Debug, Default)]
pub struct ProtectedExternally;

impl AccessRestriction for ProtectedExternally {
    fn invoked(
        &self,
        location: &Location<'_>,
        target: &RestrictedElement,
        listener: &mut dyn ErrorListener,
    ) {
        if target.in_inspected_module() {
            return;
        }

        let internal_name = location.class_name().replace('.', "/");
        let bytes = match location.resolver().class_bytes(&internal_name) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                listener.on_error(None, Some(location), "could not find class");
                return;
            }
            Err(e) => {
                listener.on_error(Some(&e), Some(location), "cannot inspect caller");
                return;
            }
        };
        let caller = match ClassFile::parse(&bytes) {
            Ok(caller) => caller,
            Err(e) => {
                listener.on_error(Some(&e), Some(location), "cannot inspect caller");
                return;
            }
        };

        // TODO: traverse the supertype hierarchy recursively; only the
        // caller's directly declared supertype and interfaces are checked.
        let declaring = target.declaring_class();
        if caller.super_name.as_deref() == Some(declaring)
            || caller.interfaces.iter().any(|i| i == declaring)
        {
            return;
        }

        listener.on_error(
            None,
            Some(location),
            &format!(
                "{} must not be called except as if protected. {}",
                target,
                target.message()
            ),
        );
    }
}

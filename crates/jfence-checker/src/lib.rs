//! Access-restriction enforcement for JVM class files
//!
//! Symbols in a library can be tagged with `@Restricted` policies; this
//! crate scans compiled class files and reports every use that a policy
//! prohibits. A run loads the restriction indexes advertised on the
//! classpath into a [`RestrictionIndex`], then walks the inspected classes
//! dispatching each observed reference through the applicable
//! [`AccessRestriction`] policies:
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::path::Path;
//! use jfence_checker::{Checker, Classpath, CollectingListener};
//!
//! # fn main() -> Result<(), jfence_checker::CheckError> {
//! let classpath = Classpath::new(vec!["target/classes".into(), "dep.jar".into()])
//!     .map_err(|e| jfence_checker::CheckError::Io { path: "dep.jar".into(), source: e })?;
//! let mut checker = Checker::new(classpath, HashMap::new());
//! let mut listener = CollectingListener::new();
//! checker.load_access_restrictions(&mut listener)?;
//! checker.check(Path::new("target/classes"), &mut listener)?;
//! assert!(!listener.has_errors());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod index;
pub mod location;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod scanner;

pub use error::{CheckError, CollectingListener, ErrorListener, NullListener, Report, Severity};
pub use index::{RestrictionIndex, Restrictions};
pub use location::{Location, RestrictedElement};
pub use policy::AccessRestriction;
pub use registry::{PolicyLoadError, PolicyRegistry};
pub use resolver::{ClassResolver, Classpath, MemoryResolver};
pub use scanner::Checker;

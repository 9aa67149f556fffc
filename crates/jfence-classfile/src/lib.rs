//! JVM Class File Parsing
//!
//! This crate provides the class-file plumbing for the jfence inspector:
//! - Big-endian byte reading and writing
//! - Constant pool decoding with lazy entry resolution
//! - Structural parsing (header, members, annotations, code attributes)
//! - An instruction-level reference iterator over method bodies
//! - A [`ClassBuilder`] for synthesizing fixture class files in tests

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod annotation;
pub mod builder;
pub mod class;
pub mod code;
pub mod encoder;
pub mod pool;

pub use annotation::{Annotation, ElementValue};
pub use builder::{AnnotationSpec, ClassBuilder, CodeBuilder, ValueSpec};
pub use class::{flags, ClassFile, Code, Member};
pub use code::{references, Reference};
pub use encoder::{ByteReader, ByteWriter, DecodeError};
pub use pool::{Constant, ConstantPool, MemberRef};

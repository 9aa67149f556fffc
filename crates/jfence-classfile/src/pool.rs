//! Constant pool parsing and lookup
//!
//! The pool is decoded eagerly but resolved lazily: the scanner only asks for
//! the handful of entries an instruction actually references.

use crate::encoder::{ByteReader, DecodeError};

/// Constant pool entry tags (JVMS table 4.4-B)
mod tag {
    pub const UTF8: u8 = 1;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const LONG: u8 = 5;
    pub const DOUBLE: u8 = 6;
    pub const CLASS: u8 = 7;
    pub const STRING: u8 = 8;
    pub const FIELD_REF: u8 = 9;
    pub const METHOD_REF: u8 = 10;
    pub const INTERFACE_METHOD_REF: u8 = 11;
    pub const NAME_AND_TYPE: u8 = 12;
    pub const METHOD_HANDLE: u8 = 15;
    pub const METHOD_TYPE: u8 = 16;
    pub const DYNAMIC: u8 = 17;
    pub const INVOKE_DYNAMIC: u8 = 18;
    pub const MODULE: u8 = 19;
    pub const PACKAGE: u8 = 20;
}

/// A single constant pool entry
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Modified-UTF-8 string
    Utf8(String),
    /// 32-bit integer
    Integer(i32),
    /// 32-bit float
    Float(f32),
    /// 64-bit integer (occupies two slots)
    Long(i64),
    /// 64-bit float (occupies two slots)
    Double(f64),
    /// Class reference: index of the internal name
    Class {
        /// Utf8 index of the internal name
        name: u16,
    },
    /// String literal: index of the Utf8 entry
    String {
        /// Utf8 index of the value
        value: u16,
    },
    /// Field reference
    FieldRef {
        /// Class index of the owner
        class: u16,
        /// NameAndType index
        name_and_type: u16,
    },
    /// Method reference
    MethodRef {
        /// Class index of the owner
        class: u16,
        /// NameAndType index
        name_and_type: u16,
    },
    /// Interface method reference
    InterfaceMethodRef {
        /// Class index of the owner
        class: u16,
        /// NameAndType index
        name_and_type: u16,
    },
    /// Name and descriptor pair
    NameAndType {
        /// Utf8 index of the name
        name: u16,
        /// Utf8 index of the descriptor
        descriptor: u16,
    },
    /// Method handle (kind + referenced member)
    MethodHandle {
        /// Reference kind
        kind: u8,
        /// Referenced member index
        reference: u16,
    },
    /// Method type descriptor
    MethodType {
        /// Utf8 index of the descriptor
        descriptor: u16,
    },
    /// Dynamically-computed constant
    Dynamic {
        /// Bootstrap method attribute index
        bootstrap: u16,
        /// NameAndType index
        name_and_type: u16,
    },
    /// Dynamically-computed call site
    InvokeDynamic {
        /// Bootstrap method attribute index
        bootstrap: u16,
        /// NameAndType index
        name_and_type: u16,
    },
    /// Module name
    Module {
        /// Utf8 index of the name
        name: u16,
    },
    /// Package name
    Package {
        /// Utf8 index of the name
        name: u16,
    },
    /// Second slot of a Long or Double entry
    Unusable,
}

/// A member reference resolved from the pool: owner, name, descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef<'a> {
    /// Internal name of the owning class
    pub owner: &'a str,
    /// Member name
    pub name: &'a str,
    /// Member descriptor
    pub descriptor: &'a str,
}

/// Decoded constant pool, indexed from 1 as in the class file itself
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    /// Decode the pool, including the leading entry count
    pub fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let count = reader.read_u16()? as usize;
        let mut entries = Vec::with_capacity(count);
        // Slot 0 is unusable by definition
        entries.push(Constant::Unusable);

        while entries.len() < count {
            let offset = reader.position();
            let t = reader.read_u8()?;
            let entry = match t {
                tag::UTF8 => Constant::Utf8(reader.read_utf8()?),
                tag::INTEGER => Constant::Integer(reader.read_u32()? as i32),
                tag::FLOAT => Constant::Float(f32::from_bits(reader.read_u32()?)),
                tag::LONG => Constant::Long(reader.read_u64()? as i64),
                tag::DOUBLE => Constant::Double(f64::from_bits(reader.read_u64()?)),
                tag::CLASS => Constant::Class {
                    name: reader.read_u16()?,
                },
                tag::STRING => Constant::String {
                    value: reader.read_u16()?,
                },
                tag::FIELD_REF => Constant::FieldRef {
                    class: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                tag::METHOD_REF => Constant::MethodRef {
                    class: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                tag::INTERFACE_METHOD_REF => Constant::InterfaceMethodRef {
                    class: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                tag::NAME_AND_TYPE => Constant::NameAndType {
                    name: reader.read_u16()?,
                    descriptor: reader.read_u16()?,
                },
                tag::METHOD_HANDLE => Constant::MethodHandle {
                    kind: reader.read_u8()?,
                    reference: reader.read_u16()?,
                },
                tag::METHOD_TYPE => Constant::MethodType {
                    descriptor: reader.read_u16()?,
                },
                tag::DYNAMIC => Constant::Dynamic {
                    bootstrap: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                tag::INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap: reader.read_u16()?,
                    name_and_type: reader.read_u16()?,
                },
                tag::MODULE => Constant::Module {
                    name: reader.read_u16()?,
                },
                tag::PACKAGE => Constant::Package {
                    name: reader.read_u16()?,
                },
                other => return Err(DecodeError::UnknownTag(other, offset)),
            };
            let two_slots = matches!(entry, Constant::Long(_) | Constant::Double(_));
            entries.push(entry);
            if two_slots {
                entries.push(Constant::Unusable);
            }
        }

        Ok(Self { entries })
    }

    /// Raw entry at an index, if valid
    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize)
    }

    /// Resolve a Utf8 entry
    pub fn utf8(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(DecodeError::BadPoolIndex {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Resolve a Class entry to its internal name
    pub fn class_name(&self, index: u16) -> Result<&str, DecodeError> {
        match self.get(index) {
            Some(Constant::Class { name }) => self.utf8(*name),
            _ => Err(DecodeError::BadPoolIndex {
                index,
                expected: "Class",
            }),
        }
    }

    /// Resolve a NameAndType entry
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), DecodeError> {
        match self.get(index) {
            Some(Constant::NameAndType { name, descriptor }) => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(DecodeError::BadPoolIndex {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Resolve a FieldRef, MethodRef or InterfaceMethodRef entry
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>, DecodeError> {
        let (class, name_and_type) = match self.get(index) {
            Some(Constant::FieldRef {
                class,
                name_and_type,
            })
            | Some(Constant::MethodRef {
                class,
                name_and_type,
            })
            | Some(Constant::InterfaceMethodRef {
                class,
                name_and_type,
            }) => (*class, *name_and_type),
            _ => {
                return Err(DecodeError::BadPoolIndex {
                    index,
                    expected: "member reference",
                })
            }
        };
        let owner = self.class_name(class)?;
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            owner,
            name,
            descriptor,
        })
    }

    /// Number of slots, including the unusable slot 0
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool holds no real entries
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }
}

//! Class file structure parsing
//!
//! Parses the pieces of a class file the inspector cares about: the
//! structural header (super type, interfaces), declared members with their
//! annotations, and each method's code attribute. Everything else (stack map
//! frames, inner-class tables, signatures) is skipped.

use crate::annotation::Annotation;
use crate::encoder::{ByteReader, DecodeError};
use crate::pool::ConstantPool;

/// Class file magic number
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Access and property flags (JVMS table 4.1-B)
pub mod flags {
    /// Declared public
    pub const ACC_PUBLIC: u16 = 0x0001;
    /// Declared private
    pub const ACC_PRIVATE: u16 = 0x0002;
    /// Declared protected
    pub const ACC_PROTECTED: u16 = 0x0004;
    /// Declared static
    pub const ACC_STATIC: u16 = 0x0008;
    /// Declared final
    pub const ACC_FINAL: u16 = 0x0010;
    /// Treat superclass methods specially for invokespecial
    pub const ACC_SUPER: u16 = 0x0020;
    /// Is an interface
    pub const ACC_INTERFACE: u16 = 0x0200;
    /// Declared abstract
    pub const ACC_ABSTRACT: u16 = 0x0400;
    /// Generated by the compiler, absent from source
    pub const ACC_SYNTHETIC: u16 = 0x1000;
    /// Is an annotation type
    pub const ACC_ANNOTATION: u16 = 0x2000;
    /// Is an enum type
    pub const ACC_ENUM: u16 = 0x4000;
}

/// A parsed class file
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Minor version
    pub minor_version: u16,
    /// Major version
    pub major_version: u16,
    /// Access flags
    pub access_flags: u16,
    /// Internal name of this class, e.g. `a/B$C`
    pub name: String,
    /// Internal name of the superclass; `None` only for `java/lang/Object`
    pub super_name: Option<String>,
    /// Internal names of directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Declared fields
    pub fields: Vec<Member>,
    /// Declared methods
    pub methods: Vec<Member>,
    /// Class-level annotations, visible and invisible retention combined
    pub annotations: Vec<Annotation>,
    /// The constant pool, kept for instruction resolution
    pub pool: ConstantPool,
}

/// A declared field or method
#[derive(Debug, Clone)]
pub struct Member {
    /// Access flags
    pub access_flags: u16,
    /// Member name
    pub name: String,
    /// Field or method descriptor
    pub descriptor: String,
    /// Member annotations, visible and invisible retention combined
    pub annotations: Vec<Annotation>,
    /// Code attribute, methods only
    pub code: Option<Code>,
}

impl Member {
    /// Whether the member is compiler-generated
    pub fn is_synthetic(&self) -> bool {
        self.access_flags & flags::ACC_SYNTHETIC != 0
    }
}

/// A method's code attribute, with the instruction stream kept raw
#[derive(Debug, Clone)]
pub struct Code {
    /// Max operand stack depth
    pub max_stack: u16,
    /// Number of local variable slots
    pub max_locals: u16,
    /// Raw instruction bytes
    pub bytes: Vec<u8>,
    /// LineNumberTable entries as (start_pc, line), in file order
    pub line_numbers: Vec<(u16, u16)>,
}

impl Code {
    /// Source line active at the given instruction offset, or 0 when the
    /// class was compiled without line numbers.
    pub fn line_for(&self, pc: u16) -> u32 {
        let mut line = 0u32;
        let mut best = None;
        for &(start, l) in &self.line_numbers {
            if start <= pc && best.map_or(true, |b| start >= b) {
                best = Some(start);
                line = l as u32;
            }
        }
        line
    }
}

impl ClassFile {
    /// Parse a class file from its bytes.
    ///
    /// Method bodies are stored raw; instruction decoding happens on demand
    /// through [`crate::code::references`].
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(data);

        let magic = reader.read_u32()?;
        if magic != MAGIC {
            return Err(DecodeError::InvalidMagic(magic));
        }
        let minor_version = reader.read_u16()?;
        let major_version = reader.read_u16()?;

        let pool = ConstantPool::decode(&mut reader)?;

        let access_flags = reader.read_u16()?;
        let name = pool.class_name(reader.read_u16()?)?.to_string();
        let super_index = reader.read_u16()?;
        let super_name = if super_index == 0 {
            None
        } else {
            Some(pool.class_name(super_index)?.to_string())
        };

        let interface_count = reader.read_u16()? as usize;
        let mut interfaces = Vec::with_capacity(interface_count);
        for _ in 0..interface_count {
            interfaces.push(pool.class_name(reader.read_u16()?)?.to_string());
        }

        let fields = Self::parse_members(&mut reader, &pool)?;
        let methods = Self::parse_members(&mut reader, &pool)?;
        let (annotations, _) = Self::parse_attributes(&mut reader, &pool)?;

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            name,
            super_name,
            interfaces,
            fields,
            methods,
            annotations,
            pool,
        })
    }

    /// Whether the class itself is compiler-generated
    pub fn is_synthetic(&self) -> bool {
        self.access_flags & flags::ACC_SYNTHETIC != 0
    }

    fn parse_members(
        reader: &mut ByteReader<'_>,
        pool: &ConstantPool,
    ) -> Result<Vec<Member>, DecodeError> {
        let count = reader.read_u16()? as usize;
        let mut members = Vec::with_capacity(count);
        for _ in 0..count {
            let access_flags = reader.read_u16()?;
            let name = pool.utf8(reader.read_u16()?)?.to_string();
            let descriptor = pool.utf8(reader.read_u16()?)?.to_string();
            let (annotations, code) = Self::parse_attributes(reader, pool)?;
            members.push(Member {
                access_flags,
                name,
                descriptor,
                annotations,
                code,
            });
        }
        Ok(members)
    }

    /// Parse an attribute table, collecting annotations and the code
    /// attribute and skipping everything else.
    fn parse_attributes(
        reader: &mut ByteReader<'_>,
        pool: &ConstantPool,
    ) -> Result<(Vec<Annotation>, Option<Code>), DecodeError> {
        let count = reader.read_u16()? as usize;
        let mut annotations = Vec::new();
        let mut code = None;
        for _ in 0..count {
            let name = pool.utf8(reader.read_u16()?)?;
            let length = reader.read_u32()? as usize;
            match name {
                "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                    let body = reader.read_bytes(length)?;
                    annotations.extend(Annotation::decode_attribute(body, pool)?);
                }
                "Code" => {
                    let body = reader.read_bytes(length)?;
                    code = Some(Self::parse_code(body, pool)?);
                }
                _ => reader.skip(length)?,
            }
        }
        Ok((annotations, code))
    }

    fn parse_code(body: &[u8], pool: &ConstantPool) -> Result<Code, DecodeError> {
        let mut reader = ByteReader::new(body);
        let max_stack = reader.read_u16()?;
        let max_locals = reader.read_u16()?;
        let code_length = reader.read_u32()? as usize;
        let bytes = reader.read_bytes(code_length)?.to_vec();

        let exception_count = reader.read_u16()? as usize;
        reader.skip(exception_count * 8)?;

        let mut line_numbers = Vec::new();
        let attr_count = reader.read_u16()? as usize;
        for _ in 0..attr_count {
            let name = pool.utf8(reader.read_u16()?)?;
            let length = reader.read_u32()? as usize;
            if name == "LineNumberTable" {
                let mut table = ByteReader::new(reader.read_bytes(length)?);
                let entries = table.read_u16()? as usize;
                for _ in 0..entries {
                    let start_pc = table.read_u16()?;
                    let line = table.read_u16()?;
                    line_numbers.push((start_pc, line));
                }
            } else {
                reader.skip(length)?;
            }
        }

        Ok(Code {
            max_stack,
            max_locals,
            bytes,
            line_numbers,
        })
    }
}

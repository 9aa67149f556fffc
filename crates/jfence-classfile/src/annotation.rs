//! Annotation attribute parsing (JVMS 4.7.16)

use crate::encoder::{ByteReader, DecodeError};
use crate::pool::ConstantPool;

/// A parsed annotation: type descriptor plus named element values
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Field descriptor of the annotation type, e.g. `Lorg/kohsuke/accmod/Restricted;`
    pub type_descriptor: String,
    /// Element name/value pairs in declaration order
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    /// Look up an element value by name
    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.elements
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub(crate) fn decode(
        reader: &mut ByteReader<'_>,
        pool: &ConstantPool,
    ) -> Result<Self, DecodeError> {
        let type_descriptor = pool.utf8(reader.read_u16()?)?.to_string();
        let pair_count = reader.read_u16()? as usize;
        let mut elements = Vec::with_capacity(pair_count);
        for _ in 0..pair_count {
            let name = pool.utf8(reader.read_u16()?)?.to_string();
            let value = ElementValue::decode(reader, pool)?;
            elements.push((name, value));
        }
        Ok(Self {
            type_descriptor,
            elements,
        })
    }

    /// Decode a `RuntimeVisibleAnnotations` / `RuntimeInvisibleAnnotations`
    /// attribute body into a list of annotations.
    pub(crate) fn decode_attribute(
        data: &[u8],
        pool: &ConstantPool,
    ) -> Result<Vec<Annotation>, DecodeError> {
        let mut reader = ByteReader::new(data);
        let count = reader.read_u16()? as usize;
        let mut annotations = Vec::with_capacity(count);
        for _ in 0..count {
            annotations.push(Annotation::decode(&mut reader, pool)?);
        }
        Ok(annotations)
    }
}

/// A single annotation element value
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Integral constant (tags B, C, I, S, Z)
    Int(i32),
    /// Long constant
    Long(i64),
    /// Float constant
    Float(f32),
    /// Double constant
    Double(f64),
    /// String constant
    Str(String),
    /// Enum constant: type descriptor and constant name
    Enum {
        /// Field descriptor of the enum type
        type_descriptor: String,
        /// Name of the enum constant
        const_name: String,
    },
    /// Class literal, as a field descriptor (e.g. `La/B;`)
    Class(String),
    /// Nested annotation
    Annotation(Box<Annotation>),
    /// Array of values
    Array(Vec<ElementValue>),
}

impl ElementValue {
    /// The string value, if this is a string constant
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ElementValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The class literal's internal name, if this is a class value.
    ///
    /// `La/B;` becomes `a/B`; array and primitive descriptors are returned
    /// unchanged since they never name a restrictable type.
    pub fn as_class_internal_name(&self) -> Option<&str> {
        match self {
            ElementValue::Class(desc) => Some(
                desc.strip_prefix('L')
                    .and_then(|d| d.strip_suffix(';'))
                    .unwrap_or(desc),
            ),
            _ => None,
        }
    }

    fn decode(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Self, DecodeError> {
        let t = reader.read_u8()?;
        let value = match t {
            b'B' | b'C' | b'I' | b'S' | b'Z' => {
                let index = reader.read_u16()?;
                match pool.get(index) {
                    Some(crate::pool::Constant::Integer(v)) => ElementValue::Int(*v),
                    _ => {
                        return Err(DecodeError::BadPoolIndex {
                            index,
                            expected: "Integer",
                        })
                    }
                }
            }
            b'J' => {
                let index = reader.read_u16()?;
                match pool.get(index) {
                    Some(crate::pool::Constant::Long(v)) => ElementValue::Long(*v),
                    _ => {
                        return Err(DecodeError::BadPoolIndex {
                            index,
                            expected: "Long",
                        })
                    }
                }
            }
            b'F' => {
                let index = reader.read_u16()?;
                match pool.get(index) {
                    Some(crate::pool::Constant::Float(v)) => ElementValue::Float(*v),
                    _ => {
                        return Err(DecodeError::BadPoolIndex {
                            index,
                            expected: "Float",
                        })
                    }
                }
            }
            b'D' => {
                let index = reader.read_u16()?;
                match pool.get(index) {
                    Some(crate::pool::Constant::Double(v)) => ElementValue::Double(*v),
                    _ => {
                        return Err(DecodeError::BadPoolIndex {
                            index,
                            expected: "Double",
                        })
                    }
                }
            }
            b's' => ElementValue::Str(pool.utf8(reader.read_u16()?)?.to_string()),
            b'e' => {
                let type_descriptor = pool.utf8(reader.read_u16()?)?.to_string();
                let const_name = pool.utf8(reader.read_u16()?)?.to_string();
                ElementValue::Enum {
                    type_descriptor,
                    const_name,
                }
            }
            b'c' => ElementValue::Class(pool.utf8(reader.read_u16()?)?.to_string()),
            b'@' => ElementValue::Annotation(Box::new(Annotation::decode(reader, pool)?)),
            b'[' => {
                let count = reader.read_u16()? as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(ElementValue::decode(reader, pool)?);
                }
                ElementValue::Array(values)
            }
            other => return Err(DecodeError::UnknownTag(other, reader.position())),
        };
        Ok(value)
    }
}

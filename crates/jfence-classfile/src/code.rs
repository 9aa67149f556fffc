//! Instruction-level reference extraction
//!
//! Walks a method's raw code bytes and yields every instruction that refers
//! to another symbol: type instantiations, method invocations, and field
//! reads/writes. This is a flat event-producing iterator, not a visitor
//! hierarchy; callers match on [`Reference`] and do their own dispatch.

use crate::encoder::DecodeError;
use crate::pool::{ConstantPool, MemberRef};

/// Opcodes the walker has to recognize by name
mod opcode {
    pub const IINC: u8 = 0x84;
    pub const TABLESWITCH: u8 = 0xAA;
    pub const LOOKUPSWITCH: u8 = 0xAB;
    pub const GETSTATIC: u8 = 0xB2;
    pub const PUTSTATIC: u8 = 0xB3;
    pub const GETFIELD: u8 = 0xB4;
    pub const PUTFIELD: u8 = 0xB5;
    pub const INVOKEVIRTUAL: u8 = 0xB6;
    pub const INVOKESPECIAL: u8 = 0xB7;
    pub const INVOKESTATIC: u8 = 0xB8;
    pub const INVOKEINTERFACE: u8 = 0xB9;
    pub const INVOKEDYNAMIC: u8 = 0xBA;
    pub const NEW: u8 = 0xBB;
    pub const WIDE: u8 = 0xC4;
}

/// A symbol reference found in an instruction stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'a> {
    /// `new` — instantiation of a type
    New {
        /// Internal name of the instantiated type
        owner: &'a str,
    },
    /// `invokevirtual` / `invokespecial` / `invokestatic` / `invokeinterface`
    Invoke(MemberRef<'a>),
    /// `getstatic` / `getfield`
    FieldRead(MemberRef<'a>),
    /// `putstatic` / `putfield`
    FieldWrite(MemberRef<'a>),
}

/// Iterate the symbol references of a method's code.
///
/// Yields `(pc, reference)` pairs in instruction order; `pc` is the offset of
/// the referring instruction, suitable for line-number lookup.
pub fn references<'a>(code: &'a [u8], pool: &'a ConstantPool) -> References<'a> {
    References { code, pool, pc: 0 }
}

/// Iterator over [`Reference`]s in a code array
pub struct References<'a> {
    code: &'a [u8],
    pool: &'a ConstantPool,
    pc: usize,
}

impl<'a> Iterator for References<'a> {
    type Item = Result<(u16, Reference<'a>), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pc < self.code.len() {
            let pc = self.pc;
            let op = self.code[pc];

            let length = match instruction_length(self.code, pc) {
                Ok(l) => l,
                Err(e) => {
                    self.pc = self.code.len();
                    return Some(Err(e));
                }
            };
            self.pc += length;

            let result = match op {
                opcode::NEW => read_u16_at(self.code, pc + 1)
                    .and_then(|index| self.pool.class_name(index))
                    .map(|owner| Some(Reference::New { owner })),
                opcode::INVOKEVIRTUAL
                | opcode::INVOKESPECIAL
                | opcode::INVOKESTATIC
                | opcode::INVOKEINTERFACE => read_u16_at(self.code, pc + 1)
                    .and_then(|index| self.pool.member_ref(index))
                    .map(|m| Some(Reference::Invoke(m))),
                opcode::GETSTATIC | opcode::GETFIELD => read_u16_at(self.code, pc + 1)
                    .and_then(|index| self.pool.member_ref(index))
                    .map(|m| Some(Reference::FieldRead(m))),
                opcode::PUTSTATIC | opcode::PUTFIELD => read_u16_at(self.code, pc + 1)
                    .and_then(|index| self.pool.member_ref(index))
                    .map(|m| Some(Reference::FieldWrite(m))),
                _ => Ok(None),
            };

            match result {
                Ok(Some(reference)) => return Some(Ok((pc as u16, reference))),
                Ok(None) => continue,
                Err(e) => {
                    self.pc = self.code.len();
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

fn read_u16_at(code: &[u8], offset: usize) -> Result<u16, DecodeError> {
    if offset + 2 > code.len() {
        return Err(DecodeError::MalformedCode(format!(
            "operand truncated at pc {offset}"
        )));
    }
    Ok(u16::from_be_bytes([code[offset], code[offset + 1]]))
}

fn read_i32_at(code: &[u8], offset: usize) -> Result<i32, DecodeError> {
    if offset + 4 > code.len() {
        return Err(DecodeError::MalformedCode(format!(
            "operand truncated at pc {offset}"
        )));
    }
    Ok(i32::from_be_bytes([
        code[offset],
        code[offset + 1],
        code[offset + 2],
        code[offset + 3],
    ]))
}

/// Total length in bytes of the instruction at `pc`, opcode included.
fn instruction_length(code: &[u8], pc: usize) -> Result<usize, DecodeError> {
    let op = code[pc];
    let operands = match op {
        // Fixed operand widths (JVMS chapter 6)
        0x00..=0x0F => 0,
        0x10 => 1,                       // bipush
        0x11 => 2,                       // sipush
        0x12 => 1,                       // ldc
        0x13 | 0x14 => 2,                // ldc_w, ldc2_w
        0x15..=0x19 => 1,                // iload..aload
        0x1A..=0x35 => 0,                // *load_<n>, array loads
        0x36..=0x3A => 1,                // istore..astore
        0x3B..=0x83 => 0,                // *store_<n>, stack ops, arithmetic
        opcode::IINC => 2,
        0x85..=0x98 => 0,                // conversions, comparisons
        0x99..=0xA8 => 2,                // branches, goto, jsr
        0xA9 => 1,                       // ret
        opcode::TABLESWITCH => {
            let base = align4(pc + 1);
            let lo = read_i32_at(code, base + 4)?;
            let hi = read_i32_at(code, base + 8)?;
            if hi < lo {
                return Err(DecodeError::MalformedCode(format!(
                    "tableswitch bounds {lo}..{hi} at pc {pc}"
                )));
            }
            return Ok(base - pc + 12 + (hi - lo + 1) as usize * 4);
        }
        opcode::LOOKUPSWITCH => {
            let base = align4(pc + 1);
            let npairs = read_i32_at(code, base + 4)?;
            if npairs < 0 {
                return Err(DecodeError::MalformedCode(format!(
                    "lookupswitch pair count {npairs} at pc {pc}"
                )));
            }
            return Ok(base - pc + 8 + npairs as usize * 8);
        }
        0xAC..=0xB1 => 0,                // returns
        0xB2..=0xB8 => 2,                // field access, invokes
        opcode::INVOKEINTERFACE | opcode::INVOKEDYNAMIC => 4,
        opcode::NEW => 2,
        0xBC => 1,                       // newarray
        0xBD => 2,                       // anewarray
        0xBE | 0xBF => 0,                // arraylength, athrow
        0xC0 | 0xC1 => 2,                // checkcast, instanceof
        0xC2 | 0xC3 => 0,                // monitorenter, monitorexit
        opcode::WIDE => {
            if pc + 1 >= code.len() {
                return Err(DecodeError::MalformedCode(format!(
                    "wide prefix truncated at pc {pc}"
                )));
            }
            if code[pc + 1] == opcode::IINC {
                5
            } else {
                3
            }
        }
        0xC5 => 3,                       // multianewarray
        0xC6 | 0xC7 => 2,                // ifnull, ifnonnull
        0xC8 | 0xC9 => 4,                // goto_w, jsr_w
        other => {
            return Err(DecodeError::MalformedCode(format!(
                "unknown opcode {other:#04x} at pc {pc}"
            )))
        }
    };
    if pc + 1 + operands > code.len() {
        return Err(DecodeError::MalformedCode(format!(
            "instruction truncated at pc {pc}"
        )));
    }
    Ok(1 + operands)
}

fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{ByteReader, ByteWriter};

    fn pool_with_method_ref() -> (ConstantPool, u16) {
        let mut w = ByteWriter::new();
        w.emit_u16(7);
        w.emit_u8(1);
        w.emit_utf8("a/B"); // 1
        w.emit_u8(7);
        w.emit_u16(1); // 2: Class
        w.emit_u8(1);
        w.emit_utf8("m"); // 3
        w.emit_u8(1);
        w.emit_utf8("()V"); // 4
        w.emit_u8(12);
        w.emit_u16(3);
        w.emit_u16(4); // 5: NameAndType
        w.emit_u8(10);
        w.emit_u16(2);
        w.emit_u16(5); // 6: MethodRef
        let bytes = w.into_bytes();
        let pool = ConstantPool::decode(&mut ByteReader::new(&bytes)).unwrap();
        (pool, 6)
    }

    #[test]
    fn test_invoke_extraction() {
        let (pool, index) = pool_with_method_ref();
        // iconst_0; invokevirtual #index; return
        let code = vec![0x03, 0xB6, (index >> 8) as u8, index as u8, 0xB1];
        let refs: Vec<_> = references(&code, &pool).collect::<Result<_, _>>().unwrap();
        assert_eq!(refs.len(), 1);
        let (pc, r) = &refs[0];
        assert_eq!(*pc, 1);
        match r {
            Reference::Invoke(m) => {
                assert_eq!(m.owner, "a/B");
                assert_eq!(m.name, "m");
            }
            other => panic!("unexpected reference {other:?}"),
        }
    }

    #[test]
    fn test_walks_past_variable_width_instructions() {
        let (pool, index) = pool_with_method_ref();
        // iconst_0 at pc 0, tableswitch at pc 1: pad to 4, default, lo=0,
        // hi=1, two offsets; then invokestatic.
        let mut code = vec![0x03, 0xAA];
        code.extend_from_slice(&[0, 0]); // padding to offset 4
        code.extend_from_slice(&0i32.to_be_bytes()); // default
        code.extend_from_slice(&0i32.to_be_bytes()); // lo
        code.extend_from_slice(&1i32.to_be_bytes()); // hi
        code.extend_from_slice(&0i32.to_be_bytes()); // offset 0
        code.extend_from_slice(&0i32.to_be_bytes()); // offset 1
        code.push(0xB8);
        code.extend_from_slice(&index.to_be_bytes());
        let refs: Vec<_> = references(&code, &pool).collect::<Result<_, _>>().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0 as usize, code.len() - 3);
    }

    #[test]
    fn test_unknown_opcode_is_an_error() {
        let (pool, _) = pool_with_method_ref();
        let code = vec![0xFF];
        let result: Result<Vec<_>, _> = references(&code, &pool).collect();
        assert!(result.is_err());
    }

    #[test]
    fn test_field_read_and_write() {
        let mut w = ByteWriter::new();
        w.emit_u16(7);
        w.emit_u8(1);
        w.emit_utf8("a/B"); // 1
        w.emit_u8(7);
        w.emit_u16(1); // 2
        w.emit_u8(1);
        w.emit_utf8("f"); // 3
        w.emit_u8(1);
        w.emit_utf8("I"); // 4
        w.emit_u8(12);
        w.emit_u16(3);
        w.emit_u16(4); // 5
        w.emit_u8(9);
        w.emit_u16(2);
        w.emit_u16(5); // 6: FieldRef
        let bytes = w.into_bytes();
        let pool = ConstantPool::decode(&mut ByteReader::new(&bytes)).unwrap();

        let code = vec![0xB2, 0x00, 0x06, 0xB3, 0x00, 0x06, 0xB1];
        let refs: Vec<_> = references(&code, &pool).collect::<Result<_, _>>().unwrap();
        assert_eq!(refs.len(), 2);
        assert!(matches!(refs[0].1, Reference::FieldRead(_)));
        assert!(matches!(refs[1].1, Reference::FieldWrite(_)));
    }
}

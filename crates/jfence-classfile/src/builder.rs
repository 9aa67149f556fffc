//! Programmatic class file construction
//!
//! A small writer for producing syntactically valid class files without a
//! Java compiler. The checker's integration tests build their fixture classes
//! with this; it emits only what the parser consumes (header, members,
//! annotations, code with line numbers), not stack maps or debug attributes.

use std::collections::HashMap;

use crate::class::flags;
use crate::encoder::ByteWriter;

/// Default class file version emitted by the builder (Java 8)
const MAJOR_VERSION: u16 = 52;

/// An annotation to attach to a class, field, or method
#[derive(Debug, Clone)]
pub struct AnnotationSpec {
    type_descriptor: String,
    elements: Vec<(String, ValueSpec)>,
}

impl AnnotationSpec {
    /// Start an annotation of the given type descriptor
    pub fn new(type_descriptor: impl Into<String>) -> Self {
        Self {
            type_descriptor: type_descriptor.into(),
            elements: Vec::new(),
        }
    }

    /// Add a string element
    pub fn with_str(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.elements
            .push((name.into(), ValueSpec::Str(value.into())));
        self
    }

    /// Add an array-of-class-literals element; each entry is an internal name
    pub fn with_class_array<I, S>(mut self, name: impl Into<String>, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = classes
            .into_iter()
            .map(|c| ValueSpec::Class(format!("L{};", c.into())))
            .collect();
        self.elements.push((name.into(), ValueSpec::Array(values)));
        self
    }
}

/// An annotation element value
#[derive(Debug, Clone)]
pub enum ValueSpec {
    /// String constant
    Str(String),
    /// Class literal, as a field descriptor
    Class(String),
    /// Integer constant
    Int(i32),
    /// Array of values
    Array(Vec<ValueSpec>),
}

/// Symbolic instruction recorded by [`CodeBuilder`]
#[derive(Debug, Clone)]
enum Insn {
    Line(u16),
    New(String),
    Invoke(u8, String, String, String),
    Field(u8, String, String, String),
    Return,
}

/// Builds a method body instruction by instruction
#[derive(Debug, Default)]
pub struct CodeBuilder {
    insns: Vec<Insn>,
}

impl CodeBuilder {
    /// Mark the source line for subsequent instructions
    pub fn line(&mut self, line: u16) -> &mut Self {
        self.insns.push(Insn::Line(line));
        self
    }

    /// `new` — instantiate a type
    pub fn new_type(&mut self, owner: impl Into<String>) -> &mut Self {
        self.insns.push(Insn::New(owner.into()));
        self
    }

    /// `invokevirtual`
    pub fn invoke_virtual(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> &mut Self {
        self.insns
            .push(Insn::Invoke(0xB6, owner.into(), name.into(), descriptor.into()));
        self
    }

    /// `invokespecial`
    pub fn invoke_special(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> &mut Self {
        self.insns
            .push(Insn::Invoke(0xB7, owner.into(), name.into(), descriptor.into()));
        self
    }

    /// `invokestatic`
    pub fn invoke_static(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> &mut Self {
        self.insns
            .push(Insn::Invoke(0xB8, owner.into(), name.into(), descriptor.into()));
        self
    }

    /// `getstatic`
    pub fn get_static(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> &mut Self {
        self.insns
            .push(Insn::Field(0xB2, owner.into(), name.into(), descriptor.into()));
        self
    }

    /// `putstatic`
    pub fn put_static(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> &mut Self {
        self.insns
            .push(Insn::Field(0xB3, owner.into(), name.into(), descriptor.into()));
        self
    }

    /// `getfield`
    pub fn get_field(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> &mut Self {
        self.insns
            .push(Insn::Field(0xB4, owner.into(), name.into(), descriptor.into()));
        self
    }

    /// `putfield`
    pub fn put_field(
        &mut self,
        owner: impl Into<String>,
        name: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> &mut Self {
        self.insns
            .push(Insn::Field(0xB5, owner.into(), name.into(), descriptor.into()));
        self
    }

    /// `return`
    pub fn vreturn(&mut self) -> &mut Self {
        self.insns.push(Insn::Return);
        self
    }
}

#[derive(Debug)]
struct MemberSpec {
    access_flags: u16,
    name: String,
    descriptor: String,
    annotations: Vec<AnnotationSpec>,
    code: Option<CodeBuilder>,
}

/// Builds a complete class file
#[derive(Debug)]
pub struct ClassBuilder {
    name: String,
    super_name: String,
    interfaces: Vec<String>,
    access_flags: u16,
    annotations: Vec<AnnotationSpec>,
    fields: Vec<MemberSpec>,
    methods: Vec<MemberSpec>,
}

impl ClassBuilder {
    /// Start a public class with the given internal name, extending Object
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: "java/lang/Object".to_string(),
            interfaces: Vec::new(),
            access_flags: flags::ACC_PUBLIC | flags::ACC_SUPER,
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the superclass internal name
    pub fn super_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.super_name = name.into();
        self
    }

    /// Add a directly implemented interface
    pub fn interface(&mut self, name: impl Into<String>) -> &mut Self {
        self.interfaces.push(name.into());
        self
    }

    /// Replace the class access flags
    pub fn access(&mut self, access_flags: u16) -> &mut Self {
        self.access_flags = access_flags;
        self
    }

    /// Attach a class-level annotation
    pub fn annotation(&mut self, annotation: AnnotationSpec) -> &mut Self {
        self.annotations.push(annotation);
        self
    }

    /// Add a field
    pub fn field(
        &mut self,
        access_flags: u16,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        annotations: Vec<AnnotationSpec>,
    ) -> &mut Self {
        self.fields.push(MemberSpec {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            annotations,
            code: None,
        });
        self
    }

    /// Add a method with a body
    pub fn method<F>(
        &mut self,
        access_flags: u16,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        annotations: Vec<AnnotationSpec>,
        body: F,
    ) -> &mut Self
    where
        F: FnOnce(&mut CodeBuilder),
    {
        let mut code = CodeBuilder::default();
        body(&mut code);
        self.methods.push(MemberSpec {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            annotations,
            code: Some(code),
        });
        self
    }

    /// Add a method without a code attribute (abstract or native)
    pub fn abstract_method(
        &mut self,
        access_flags: u16,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        annotations: Vec<AnnotationSpec>,
    ) -> &mut Self {
        self.methods.push(MemberSpec {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            annotations,
            code: None,
        });
        self
    }

    /// Serialize the class file
    pub fn build(&self) -> Vec<u8> {
        let mut pool = PoolBuilder::new();

        let this_index = pool.class(&self.name);
        let super_index = pool.class(&self.super_name);
        let interface_indices: Vec<u16> =
            self.interfaces.iter().map(|i| pool.class(i)).collect();

        let fields = encode_members(&mut pool, &self.fields);
        let methods = encode_members(&mut pool, &self.methods);
        let class_attrs = encode_member_attributes(&mut pool, &self.annotations, &None);

        let mut w = ByteWriter::new();
        w.emit_u32(crate::class::MAGIC);
        w.emit_u16(0);
        w.emit_u16(MAJOR_VERSION);
        pool.encode(&mut w);
        w.emit_u16(self.access_flags);
        w.emit_u16(this_index);
        w.emit_u16(super_index);
        w.emit_u16(interface_indices.len() as u16);
        for index in interface_indices {
            w.emit_u16(index);
        }
        w.emit_bytes(&fields);
        w.emit_bytes(&methods);
        w.emit_bytes(&class_attrs);
        w.into_bytes()
    }
}

fn encode_members(pool: &mut PoolBuilder, members: &[MemberSpec]) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.emit_u16(members.len() as u16);
    for member in members {
        let name_index = pool.utf8(&member.name);
        let descriptor_index = pool.utf8(&member.descriptor);
        let attrs = encode_member_attributes(pool, &member.annotations, &member.code);
        w.emit_u16(member.access_flags);
        w.emit_u16(name_index);
        w.emit_u16(descriptor_index);
        w.emit_bytes(&attrs);
    }
    w.into_bytes()
}

/// Encode an attribute table holding annotations and, for methods, code
fn encode_member_attributes(
    pool: &mut PoolBuilder,
    annotations: &[AnnotationSpec],
    code: &Option<CodeBuilder>,
) -> Vec<u8> {
    let mut w = ByteWriter::new();
    let mut count = 0u16;
    let mut body = ByteWriter::new();

    if !annotations.is_empty() {
        let name_index = pool.utf8("RuntimeVisibleAnnotations");
        let mut attr = ByteWriter::new();
        attr.emit_u16(annotations.len() as u16);
        for annotation in annotations {
            encode_annotation(&mut attr, pool, annotation);
        }
        let attr = attr.into_bytes();
        body.emit_u16(name_index);
        body.emit_u32(attr.len() as u32);
        body.emit_bytes(&attr);
        count += 1;
    }

    if let Some(code) = code {
        let name_index = pool.utf8("Code");
        let attr = encode_code(pool, code);
        body.emit_u16(name_index);
        body.emit_u32(attr.len() as u32);
        body.emit_bytes(&attr);
        count += 1;
    }

    w.emit_u16(count);
    w.emit_bytes(&body.into_bytes());
    w.into_bytes()
}

fn encode_annotation(w: &mut ByteWriter, pool: &mut PoolBuilder, annotation: &AnnotationSpec) {
    let type_index = pool.utf8(&annotation.type_descriptor);
    w.emit_u16(type_index);
    w.emit_u16(annotation.elements.len() as u16);
    for (name, value) in &annotation.elements {
        let name_index = pool.utf8(name);
        w.emit_u16(name_index);
        encode_value(w, pool, value);
    }
}

fn encode_value(w: &mut ByteWriter, pool: &mut PoolBuilder, value: &ValueSpec) {
    match value {
        ValueSpec::Str(s) => {
            w.emit_u8(b's');
            let index = pool.utf8(s);
            w.emit_u16(index);
        }
        ValueSpec::Class(descriptor) => {
            w.emit_u8(b'c');
            let index = pool.utf8(descriptor);
            w.emit_u16(index);
        }
        ValueSpec::Int(v) => {
            w.emit_u8(b'I');
            let index = pool.integer(*v);
            w.emit_u16(index);
        }
        ValueSpec::Array(values) => {
            w.emit_u8(b'[');
            w.emit_u16(values.len() as u16);
            for value in values {
                encode_value(w, pool, value);
            }
        }
    }
}

fn encode_code(pool: &mut PoolBuilder, code: &CodeBuilder) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut lines = Vec::new();
    for insn in &code.insns {
        match insn {
            Insn::Line(line) => lines.push((bytes.len() as u16, *line)),
            Insn::New(owner) => {
                let index = pool.class(owner);
                bytes.push(0xBB);
                bytes.extend_from_slice(&index.to_be_bytes());
            }
            Insn::Invoke(op, owner, name, descriptor) => {
                let index = if *op == 0xB9 {
                    pool.interface_method_ref(owner, name, descriptor)
                } else {
                    pool.method_ref(owner, name, descriptor)
                };
                bytes.push(*op);
                bytes.extend_from_slice(&index.to_be_bytes());
                if *op == 0xB9 {
                    bytes.extend_from_slice(&[1, 0]); // count, reserved
                }
            }
            Insn::Field(op, owner, name, descriptor) => {
                let index = pool.field_ref(owner, name, descriptor);
                bytes.push(*op);
                bytes.extend_from_slice(&index.to_be_bytes());
            }
            Insn::Return => bytes.push(0xB1),
        }
    }

    let mut w = ByteWriter::new();
    w.emit_u16(8); // max_stack, generous for fixture code
    w.emit_u16(8); // max_locals
    w.emit_u32(bytes.len() as u32);
    w.emit_bytes(&bytes);
    w.emit_u16(0); // exception table

    if lines.is_empty() {
        w.emit_u16(0);
    } else {
        let name_index = pool.utf8("LineNumberTable");
        let mut table = ByteWriter::new();
        table.emit_u16(lines.len() as u16);
        for (start_pc, line) in &lines {
            table.emit_u16(*start_pc);
            table.emit_u16(*line);
        }
        let table = table.into_bytes();
        w.emit_u16(1);
        w.emit_u16(name_index);
        w.emit_u32(table.len() as u32);
        w.emit_bytes(&table);
    }
    w.into_bytes()
}

/// Raw pool entry held by the builder before serialization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RawConstant {
    Utf8(String),
    Integer(i32),
    Class(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
}

/// Interning constant pool builder
#[derive(Debug, Default)]
struct PoolBuilder {
    entries: Vec<RawConstant>,
    interned: HashMap<RawConstant, u16>,
}

impl PoolBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, constant: RawConstant) -> u16 {
        if let Some(&index) = self.interned.get(&constant) {
            return index;
        }
        self.entries.push(constant.clone());
        let index = self.entries.len() as u16;
        self.interned.insert(constant, index);
        index
    }

    fn utf8(&mut self, value: &str) -> u16 {
        self.intern(RawConstant::Utf8(value.to_string()))
    }

    fn integer(&mut self, value: i32) -> u16 {
        self.intern(RawConstant::Integer(value))
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.intern(RawConstant::Class(name))
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.intern(RawConstant::NameAndType(name, descriptor))
    }

    fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        self.intern(RawConstant::FieldRef(class, nat))
    }

    fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        self.intern(RawConstant::MethodRef(class, nat))
    }

    fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let nat = self.name_and_type(name, descriptor);
        self.intern(RawConstant::InterfaceMethodRef(class, nat))
    }

    fn encode(&self, w: &mut ByteWriter) {
        w.emit_u16(self.entries.len() as u16 + 1);
        for entry in &self.entries {
            match entry {
                RawConstant::Utf8(s) => {
                    w.emit_u8(1);
                    w.emit_utf8(s);
                }
                RawConstant::Integer(v) => {
                    w.emit_u8(3);
                    w.emit_u32(*v as u32);
                }
                RawConstant::Class(name) => {
                    w.emit_u8(7);
                    w.emit_u16(*name);
                }
                RawConstant::NameAndType(name, descriptor) => {
                    w.emit_u8(12);
                    w.emit_u16(*name);
                    w.emit_u16(*descriptor);
                }
                RawConstant::FieldRef(class, nat) => {
                    w.emit_u8(9);
                    w.emit_u16(*class);
                    w.emit_u16(*nat);
                }
                RawConstant::MethodRef(class, nat) => {
                    w.emit_u8(10);
                    w.emit_u16(*class);
                    w.emit_u16(*nat);
                }
                RawConstant::InterfaceMethodRef(class, nat) => {
                    w.emit_u8(11);
                    w.emit_u16(*class);
                    w.emit_u16(*nat);
                }
            }
        }
    }
}

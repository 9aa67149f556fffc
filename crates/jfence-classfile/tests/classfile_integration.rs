//! Integration tests: build class files with the builder, parse them back,
//! and walk their instruction streams.

use jfence_classfile::{
    flags, references, AnnotationSpec, ClassBuilder, ClassFile, ElementValue, Reference,
};

#[test]
fn test_full_class_round_trip() {
    let mut cb = ClassBuilder::new("com/example/Widget");
    cb.super_name("com/example/Base")
        .interface("java/io/Serializable")
        .annotation(
            AnnotationSpec::new("Lcom/example/Marker;").with_str("message", "crate fixture"),
        )
        .field(flags::ACC_PRIVATE, "count", "I", vec![])
        .method(flags::ACC_PUBLIC, "tick", "()V", vec![], |code| {
            code.line(21);
            code.get_field("com/example/Widget", "count", "I");
            code.line(22);
            code.put_field("com/example/Widget", "count", "I");
            code.vreturn();
        });

    let parsed = ClassFile::parse(&cb.build()).unwrap();
    assert_eq!(parsed.name, "com/example/Widget");
    assert_eq!(parsed.super_name.as_deref(), Some("com/example/Base"));
    assert_eq!(parsed.interfaces, vec!["java/io/Serializable".to_string()]);
    assert_eq!(parsed.fields.len(), 1);
    assert_eq!(parsed.methods.len(), 1);

    let code = parsed.methods[0].code.as_ref().unwrap();
    let refs: Vec<_> = references(&code.bytes, &parsed.pool)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(refs.len(), 2);
    assert_eq!(code.line_for(refs[0].0), 21);
    assert_eq!(code.line_for(refs[1].0), 22);
}

#[test]
fn test_nested_annotation_values_survive_round_trip() {
    let mut cb = ClassBuilder::new("a/B");
    cb.method(
        flags::ACC_PUBLIC,
        "m",
        "()V",
        vec![AnnotationSpec::new("LRestrict;").with_class_array("value", ["p/PolicyA", "p/PolicyB"])],
        |code| {
            code.vreturn();
        },
    );

    let parsed = ClassFile::parse(&cb.build()).unwrap();
    let ann = &parsed.methods[0].annotations[0];
    match ann.element("value") {
        Some(ElementValue::Array(values)) => {
            let names: Vec<_> = values
                .iter()
                .filter_map(|v| v.as_class_internal_name())
                .collect();
            assert_eq!(names, vec!["p/PolicyA", "p/PolicyB"]);
        }
        other => panic!("unexpected element {other:?}"),
    }
}

#[test]
fn test_synthetic_flag_is_reported() {
    let mut cb = ClassBuilder::new("a/B");
    cb.method(
        flags::ACC_PUBLIC | flags::ACC_SYNTHETIC,
        "access$000",
        "()V",
        vec![],
        |code| {
            code.vreturn();
        },
    );
    let parsed = ClassFile::parse(&cb.build()).unwrap();
    assert!(parsed.methods[0].is_synthetic());
    assert!(!parsed.is_synthetic());
}

#[test]
fn test_abstract_method_has_no_code() {
    let mut cb = ClassBuilder::new("a/Api");
    cb.access(flags::ACC_PUBLIC | flags::ACC_ABSTRACT);
    cb.abstract_method(
        flags::ACC_PUBLIC | flags::ACC_ABSTRACT,
        "provide",
        "()Ljava/lang/String;",
        vec![],
    );
    let parsed = ClassFile::parse(&cb.build()).unwrap();
    assert!(parsed.methods[0].code.is_none());
}

#[test]
fn test_new_instruction_reports_instantiated_type() {
    let mut cb = ClassBuilder::new("caller/Caller");
    cb.method(flags::ACC_PUBLIC, "make", "()V", vec![], |code| {
        code.new_type("api/Gadget");
        code.invoke_special("api/Gadget", "<init>", "()V");
        code.vreturn();
    });
    let parsed = ClassFile::parse(&cb.build()).unwrap();
    let code = parsed.methods[0].code.as_ref().unwrap();
    let refs: Vec<_> = references(&code.bytes, &parsed.pool)
        .collect::<Result<_, _>>()
        .unwrap();
    assert!(matches!(refs[0].1, Reference::New { owner: "api/Gadget" }));
    match &refs[1].1 {
        Reference::Invoke(m) => assert_eq!(m.name, "<init>"),
        other => panic!("unexpected reference {other:?}"),
    }
}

//! End-to-end runs: build class files, load an index, scan, assert findings.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use jfence_checker::scanner::{RESTRICTED_DESCRIPTOR, SUPPRESS_DESCRIPTOR};
use jfence_checker::{Checker, Classpath, CollectingListener, MemoryResolver};

use jfence_classfile::{flags, AnnotationSpec, ClassFile};

const DO_NOT_USE: &str = "org/kohsuke/accmod/restrictions/DoNotUse";
const NO_EXTERNAL_USE: &str = "org/kohsuke/accmod/restrictions/NoExternalUse";
const FINAL: &str = "org/kohsuke/accmod/restrictions/Final";

const INDEX_RESOURCE: &str = "META-INF/services/annotations/org.kohsuke.accmod.Restricted";

fn restricted(policy: &str) -> AnnotationSpec {
    AnnotationSpec::new(RESTRICTED_DESCRIPTOR).with_class_array("value", [policy])
}

fn suppress(types: &[&str]) -> AnnotationSpec {
    AnnotationSpec::new(SUPPRESS_DESCRIPTOR).with_class_array("value", types.iter().copied())
}

/// A library type `api/Api` carrying a class-level restriction
fn api_class(policy: &str) -> Vec<u8> {
    let mut builder = jfence_classfile::ClassBuilder::new("api/Api");
    builder.annotation(restricted(policy));
    builder.field(flags::ACC_PUBLIC | flags::ACC_STATIC, "VALUE", "I", vec![]);
    builder.method(flags::ACC_PUBLIC, "run", "()V", vec![], |code| {
        code.vreturn();
    });
    builder.build()
}

fn loaded_checker(policy: &str, in_module: bool) -> (Checker<MemoryResolver>, CollectingListener) {
    let mut resolver = MemoryResolver::new();
    resolver.add(INDEX_RESOURCE, b"api.Api\n".to_vec());
    resolver.add_class("api/Api", api_class(policy));

    let mut listener = CollectingListener::new();
    let mut checker = Checker::new(resolver, HashMap::new());
    if in_module {
        let mut own = MemoryResolver::new();
        own.add(INDEX_RESOURCE, b"api.Api\n".to_vec());
        checker.load_module_restrictions(&own, &mut listener).unwrap();
    } else {
        checker.load_access_restrictions(&mut listener).unwrap();
    }
    (checker, listener)
}

fn scan(checker: &Checker<MemoryResolver>, bytes: &[u8], listener: &mut CollectingListener) {
    let class = ClassFile::parse(bytes).unwrap();
    checker.scan_class(&class, listener).unwrap();
}

#[test]
fn test_do_not_use_flags_every_use_kind() {
    let (checker, mut listener) = loaded_checker(DO_NOT_USE, false);

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.line(10)
            .new_type("api/Api")
            .invoke_virtual("api/Api", "run", "()V")
            .get_static("api/Api", "VALUE", "I")
            .put_static("api/Api", "VALUE", "I")
            .vreturn();
    });
    scan(&checker, &consumer.build(), &mut listener);

    // instantiated, invoked, read, written
    assert_eq!(listener.errors().count(), 4);
    assert!(listener.errors().all(|r| r.message.contains("must not be used")));
    assert!(listener
        .errors()
        .all(|r| r.location.as_deref() == Some("app.Consumer:10")));
}

#[test]
fn test_do_not_use_flags_supertype_and_interface() {
    let (checker, mut listener) = loaded_checker(DO_NOT_USE, false);

    let mut subtype = jfence_classfile::ClassBuilder::new("app/Sub");
    subtype.super_name("api/Api");
    scan(&checker, &subtype.build(), &mut listener);
    assert_eq!(listener.errors().count(), 1);

    let mut implementor = jfence_classfile::ClassBuilder::new("app/Impl");
    implementor.interface("api/Api");
    scan(&checker, &implementor.build(), &mut listener);
    assert_eq!(listener.errors().count(), 2);
}

#[test]
fn test_permissive_policy_reports_nothing() {
    let (checker, mut listener) =
        loaded_checker("org/kohsuke/accmod/restrictions/None", false);

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.super_name("api/Api");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.new_type("api/Api")
            .invoke_virtual("api/Api", "run", "()V")
            .vreturn();
    });
    scan(&checker, &consumer.build(), &mut listener);
    assert!(listener.reports.is_empty());
}

#[test]
fn test_no_external_use_exempts_the_inspected_module() {
    let (checker, mut listener) = loaded_checker(NO_EXTERNAL_USE, true);

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.invoke_virtual("api/Api", "run", "()V").vreturn();
    });
    scan(&checker, &consumer.build(), &mut listener);
    assert!(listener.reports.is_empty());

    // The same use against an externally loaded index is a violation.
    let (checker, mut listener) = loaded_checker(NO_EXTERNAL_USE, false);
    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.invoke_virtual("api/Api", "run", "()V").vreturn();
    });
    scan(&checker, &consumer.build(), &mut listener);
    assert_eq!(listener.errors().count(), 1);
}

#[test]
fn test_restriction_extends_to_nested_types() {
    let (checker, mut listener) = loaded_checker(DO_NOT_USE, false);

    // api/Api$Inner carries no annotation of its own; DoNotUse on the
    // enclosing type still covers it.
    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.invoke_virtual("api/Api$Inner", "run", "()V").vreturn();
    });
    scan(&checker, &consumer.build(), &mut listener);
    assert_eq!(listener.errors().count(), 1);
}

#[test]
fn test_non_nested_policy_ignores_nested_types() {
    let (checker, mut listener) = loaded_checker(FINAL, false);

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.invoke_virtual("api/Api$Inner", "run", "()V").vreturn();
    });
    scan(&checker, &consumer.build(), &mut listener);
    assert!(listener.reports.is_empty());
}

#[test]
fn test_own_nested_class_may_use_enclosing_type() {
    let (checker, mut listener) = loaded_checker(DO_NOT_USE, false);

    let mut inner = jfence_classfile::ClassBuilder::new("api/Api$Inner");
    inner.super_name("api/Api");
    inner.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.new_type("api/Api")
            .invoke_virtual("api/Api", "run", "()V")
            .get_static("api/Api", "VALUE", "I")
            .vreturn();
    });
    scan(&checker, &inner.build(), &mut listener);
    assert!(listener.reports.is_empty());
}

#[test]
fn test_suppression_scopes_union_class_and_method() {
    let mut resolver = MemoryResolver::new();
    resolver.add(INDEX_RESOURCE, b"api.X\napi.Y\napi.Z\n".to_vec());
    for name in ["api/X", "api/Y", "api/Z"] {
        let mut builder = jfence_classfile::ClassBuilder::new(name);
        builder.annotation(restricted(DO_NOT_USE));
        builder.method(flags::ACC_PUBLIC, "run", "()V", vec![], |code| {
            code.vreturn();
        });
        resolver.add_class(name, builder.build());
    }

    let mut listener = CollectingListener::new();
    let mut checker = Checker::new(resolver, HashMap::new());
    checker.load_access_restrictions(&mut listener).unwrap();

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.annotation(suppress(&["api/X"]));
    consumer.method(
        flags::ACC_PUBLIC,
        "go",
        "()V",
        vec![suppress(&["api/Y"])],
        |code| {
            code.invoke_virtual("api/X", "run", "()V")
                .invoke_virtual("api/Y", "run", "()V")
                .invoke_virtual("api/Z", "run", "()V")
                .vreturn();
        },
    );
    consumer.method(flags::ACC_PUBLIC, "other", "()V", vec![], |code| {
        // The method scope of go() does not leak here.
        code.invoke_virtual("api/Y", "run", "()V").vreturn();
    });
    scan(&checker, &consumer.build(), &mut listener);

    let errors: Vec<_> = listener.errors().collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|r| !r.message.contains("api/X")));
    assert_eq!(errors.iter().filter(|r| r.message.contains("api/Y")).count(), 1);
    assert_eq!(errors.iter().filter(|r| r.message.contains("api/Z")).count(), 1);
}

#[test]
fn test_final_method_override_reported_once() {
    let mut resolver = MemoryResolver::new();
    resolver.add(INDEX_RESOURCE, b"api.Api\n".to_vec());
    let mut api = jfence_classfile::ClassBuilder::new("api/Api");
    api.method(flags::ACC_PUBLIC, "run", "()V", vec![restricted(FINAL)], |code| {
        code.vreturn();
    });
    resolver.add_class("api/Api", api.build());

    let mut listener = CollectingListener::new();
    let mut checker = Checker::new(resolver, HashMap::new());
    checker.load_access_restrictions(&mut listener).unwrap();

    let mut implementation = jfence_classfile::ClassBuilder::new("app/Impl");
    implementation.super_name("api/Api");
    implementation.method(flags::ACC_PUBLIC, "run", "()V", vec![], |code| {
        code.invoke_special("api/Api", "run", "()V").vreturn();
    });
    scan(&checker, &implementation.build(), &mut listener);

    let errors: Vec<_> = listener.errors().collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("must not be overridden"));
}

#[test]
fn test_synthetic_members_are_skipped() {
    let (checker, mut listener) = loaded_checker(DO_NOT_USE, false);

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(
        flags::ACC_PUBLIC | flags::ACC_SYNTHETIC,
        "access$000",
        "()V",
        vec![],
        |code| {
            code.invoke_virtual("api/Api", "run", "()V").vreturn();
        },
    );
    scan(&checker, &consumer.build(), &mut listener);
    assert!(listener.reports.is_empty());

    let mut bridge = jfence_classfile::ClassBuilder::new("app/Bridge");
    bridge.access(flags::ACC_PUBLIC | flags::ACC_SYNTHETIC);
    bridge.super_name("api/Api");
    scan(&checker, &bridge.build(), &mut listener);
    assert!(listener.reports.is_empty());
}

#[test]
fn test_restriction_message_is_appended() {
    let mut resolver = MemoryResolver::new();
    resolver.add(INDEX_RESOURCE, b"api.Api\n".to_vec());
    let mut api = jfence_classfile::ClassBuilder::new("api/Api");
    api.annotation(
        AnnotationSpec::new(RESTRICTED_DESCRIPTOR)
            .with_class_array("value", [DO_NOT_USE])
            .with_str("message", "scheduled for removal in 2.0"),
    );
    resolver.add_class("api/Api", api.build());

    let mut listener = CollectingListener::new();
    let mut checker = Checker::new(resolver, HashMap::new());
    checker.load_access_restrictions(&mut listener).unwrap();

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.new_type("api/Api").vreturn();
    });
    scan(&checker, &consumer.build(), &mut listener);

    assert_eq!(listener.errors().count(), 1);
    assert!(listener
        .errors()
        .next()
        .unwrap()
        .message
        .contains("scheduled for removal in 2.0"));
}

#[test]
fn test_missing_definition_warns_and_scanning_continues() {
    let mut resolver = MemoryResolver::new();
    resolver.add(INDEX_RESOURCE, b"ghost.Ghost\napi.Api\n".to_vec());
    resolver.add_class("api/Api", api_class(DO_NOT_USE));

    let mut listener = CollectingListener::new();
    let mut checker = Checker::new(resolver, HashMap::new());
    checker.load_access_restrictions(&mut listener).unwrap();

    assert_eq!(listener.warnings().count(), 1);
    assert!(listener
        .warnings()
        .next()
        .unwrap()
        .message
        .contains("ghost.Ghost"));

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.new_type("api/Api").vreturn();
    });
    scan(&checker, &consumer.build(), &mut listener);
    assert_eq!(listener.errors().count(), 1);
}

#[test]
fn test_package_descriptor_fallback() {
    let mut resolver = MemoryResolver::new();
    resolver.add(INDEX_RESOURCE, b"api.internal\n".to_vec());
    // No api/internal.class exists; the restriction sits on the package
    // descriptor instead.
    let mut descriptor = jfence_classfile::ClassBuilder::new("api/internal/package-info");
    descriptor.annotation(restricted(DO_NOT_USE));
    resolver.add("api/internal/package-info.class", descriptor.build());

    let mut listener = CollectingListener::new();
    let mut checker = Checker::new(resolver, HashMap::new());
    checker.load_access_restrictions(&mut listener).unwrap();
    assert!(listener.warnings().count() == 0);
    assert_eq!(checker.index().len(), 1);
}

#[test]
fn test_unknown_policy_identity_degrades_to_permissive() {
    let mut resolver = MemoryResolver::new();
    resolver.add(INDEX_RESOURCE, b"api.Api\n".to_vec());
    resolver.add_class("api/Api", api_class("com/example/MissingPolicy"));

    let mut listener = CollectingListener::new();
    let mut checker = Checker::new(resolver, HashMap::new());
    checker.load_access_restrictions(&mut listener).unwrap();
    assert_eq!(listener.errors().count(), 1);
    assert!(listener
        .errors()
        .next()
        .unwrap()
        .message
        .contains("com.example.MissingPolicy"));

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.new_type("api/Api").vreturn();
    });
    let count_before = listener.reports.len();
    scan(&checker, &consumer.build(), &mut listener);
    assert_eq!(listener.reports.len(), count_before);
}

/// Directory traversal end to end: classes and the index live on disk.
#[test]
fn test_check_walks_directories_and_skips_other_files() {
    let root = env_temp_dir("jfence-checker-walk");
    let classes = root.join("classes");
    fs::create_dir_all(classes.join("app")).unwrap();
    fs::create_dir_all(classes.join("META-INF/services/annotations")).unwrap();

    fs::write(
        classes.join("META-INF/services/annotations/org.kohsuke.accmod.Restricted"),
        "api.Api\n",
    )
    .unwrap();
    fs::write(classes.join("api.Api.txt"), "not a class file").unwrap();

    let lib = root.join("lib");
    fs::create_dir_all(lib.join("api")).unwrap();
    fs::write(lib.join("api/Api.class"), api_class(DO_NOT_USE)).unwrap();

    let mut consumer = jfence_classfile::ClassBuilder::new("app/Consumer");
    consumer.method(flags::ACC_PUBLIC, "go", "()V", vec![], |code| {
        code.line(3).new_type("api/Api").vreturn();
    });
    fs::write(classes.join("app/Consumer.class"), consumer.build()).unwrap();

    let classpath = Classpath::new(vec![classes.clone(), lib]).unwrap();
    let mut listener = CollectingListener::new();
    let mut checker = Checker::new(classpath, HashMap::new());
    checker.load_access_restrictions(&mut listener).unwrap();
    checker.check(&classes, &mut listener).unwrap();

    assert_eq!(listener.errors().count(), 1);
    assert_eq!(
        listener.errors().next().unwrap().location.as_deref(),
        Some("app.Consumer:3")
    );

    fs::remove_dir_all(&root).unwrap();
}

fn env_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

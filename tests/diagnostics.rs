mod common;

use classgen::demo;
use classgen::jvm::{self, write_class_file, Type};
use classgen::translate::{self, LimitKind, Session, Settings};
use classgen::tree::{BinaryOp, Member};
use common::*;

fn deep_array(dims: usize) -> Type {
    (0..dims).fold(Type::INT, |ty, _| Type::array_of(ty))
}

#[test]
fn limit_violations_are_reported_together() {
    let mut fixture = Fixture::new("Good");
    let good = fixture.class;
    let answer = fixture.static_method("answer", vec![], Type::INT);

    let (wide, wide_ctor) = fixture.add_class("Wide");
    let many = fixture.static_method_in(wide, "many", vec![Type::INT; 256], Type::Void);
    let params: Vec<_> = (0..256).map(|i| fixture.local(many, &format!("p{}", i), Type::INT)).collect();

    let (deep, deep_ctor) = fixture.add_class("Deep");
    let nest = fixture.static_method_in(deep, "nest", vec![], Type::Void);
    let grid = fixture.local(nest, "grid", deep_array(256));

    let (late, late_ctor) = fixture.add_class("Late");

    let classes = {
        let make = fixture.maker();
        vec![
            (
                good,
                vec![
                    fixture.default_ctor(fixture.ctor),
                    Member::Method(make.method(answer, vec![], Some(make.body(vec![make.return_(Some(make.int(42)))])))),
                ],
            ),
            (
                wide,
                vec![
                    fixture.default_ctor(wide_ctor),
                    Member::Method(make.method(many, params, Some(make.body(vec![])))),
                ],
            ),
            (
                deep,
                vec![
                    fixture.default_ctor(deep_ctor),
                    Member::Method(make.method(nest, vec![], Some(make.body(vec![make.var_def(grid, None)])))),
                ],
            ),
            (late, vec![fixture.default_ctor(late_ctor)]),
        ]
    };

    let compiled = fixture.compile_classes(classes, Settings::default());
    let names: Vec<&str> = compiled.outputs.iter().map(|output| output.binary_name.as_str()).collect();
    assert_eq!(names, vec!["test/Good"], "nothing is written after the first diagnostic");

    let diagnostics = compiled.session.diagnostics();
    assert_eq!(diagnostics.count(), 2);
    let reported: Vec<(&str, LimitKind)> = diagnostics
        .iter()
        .map(|diagnostic| (diagnostic.class.as_str(), diagnostic.kind))
        .collect();
    assert_eq!(
        reported,
        vec![("test/Wide", LimitKind::Parameters), ("test/Deep", LimitKind::Dimensions)]
    );
    assert!(diagnostics.iter().all(|diagnostic| diagnostic.line == 1));
    assert!(diagnostics.to_string().contains("too many parameters"));
}

#[test]
fn receiver_counts_towards_the_parameter_limit() {
    let mut fixture = Fixture::new("Edge");
    let fits = fixture.static_method("fits", vec![Type::INT; 255], Type::Void);
    let fits_params: Vec<_> = (0..255).map(|i| fixture.local(fits, &format!("p{}", i), Type::INT)).collect();
    let instance = fixture.graph.add_method(classgen::jvm::MethodSymbol::new(
        "overflows",
        fixture.class,
        classgen::jvm::Flags::PUBLIC,
        vec![Type::INT; 255],
        Type::Void,
    ));
    let instance_params: Vec<_> = (0..255)
        .map(|i| fixture.local(instance, &format!("q{}", i), Type::INT))
        .collect();

    let members = {
        let make = fixture.maker();
        vec![
            fixture.default_ctor(fixture.ctor),
            Member::Method(make.method(fits, fits_params, Some(make.body(vec![])))),
            Member::Method(make.method(instance, instance_params, Some(make.body(vec![])))),
        ]
    };
    let compiled = fixture.compile(members, Settings::default());
    let kinds: Vec<LimitKind> = compiled.session.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![LimitKind::Parameters]);
    assert!(compiled.outputs.is_empty());
}

#[test]
fn long_string_constants_are_reported() {
    let mut fixture = Fixture::new("Text");
    let string = Type::Object(fixture.java.string);
    let text = fixture.static_method("text", vec![], string);
    let long = "x".repeat(70_000);

    let members = {
        let make = fixture.maker();
        vec![
            fixture.default_ctor(fixture.ctor),
            Member::Method(make.method(text, vec![], Some(make.body(vec![make.return_(Some(make.string(&long)))])))),
        ]
    };
    let compiled = fixture.compile(members, Settings::default());
    let kinds: Vec<LimitKind> = compiled.session.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![LimitKind::StringConstant]);
    assert!(compiled.outputs.is_empty());
}

#[test]
fn oversized_methods_are_reported() {
    let mut fixture = Fixture::new("Huge");
    let counter = fixture.static_field("counter", Type::INT);
    let huge = fixture.static_method("huge", vec![], Type::Void);

    let members = {
        let make = fixture.maker();
        let stats: Vec<_> = (0..7000)
            .map(|_| {
                make.exec(make.assign(
                    make.ident(counter),
                    make.binary(BinaryOp::Add, make.ident(counter), make.int(1000)),
                ))
            })
            .collect();
        vec![
            fixture.default_ctor(fixture.ctor),
            Member::Method(make.method(huge, vec![], Some(make.body(stats)))),
        ]
    };
    let compiled = fixture.compile(members, Settings::default());
    let kinds: Vec<LimitKind> = compiled.session.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![LimitKind::CodeTooLarge]);
    assert!(compiled.outputs.is_empty());
}

#[test]
fn compiled_demo_lands_under_its_package() {
    let dir = scratch_dir("demo-output");
    let demo = demo::build("answer").expect("known demo");
    let mut session = Session::new(demo.graph, demo.java, Settings::default());
    let written = session.compile_to(demo.unit, &dir).expect("class file written");

    let expected = dir.join("demo").join("Answer.class");
    assert_eq!(written, vec![expected.clone()]);
    let bytes = std::fs::read(&expected).expect("readable class file");
    assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    ClassFile::parse(&bytes);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn failed_writes_leave_no_class_file() {
    let dir = scratch_dir("blocked-output");
    let blocked = dir.join("demo").join("Answer.class");
    std::fs::create_dir_all(&blocked).expect("directory in the way");

    let demo = demo::build("answer").expect("known demo");
    let mut session = Session::new(demo.graph, demo.java, Settings::default());
    let err = session.compile_to(demo.unit, &dir).expect_err("path is a directory");
    assert!(matches!(err, translate::Error::Jvm(jvm::Error::IoError(_))), "{:?}", err);
    assert!(blocked.is_dir());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn class_files_create_missing_directories() {
    let dir = scratch_dir("nested-output");
    let path = write_class_file(&dir, "a/b/c/Deep", &[0xCA, 0xFE, 0xBA, 0xBE]).expect("written");
    assert_eq!(path, dir.join("a/b/c/Deep.class"));
    assert_eq!(std::fs::read(&path).expect("readable"), vec![0xCA, 0xFE, 0xBA, 0xBE]);

    let _ = std::fs::remove_dir_all(&dir);
}

//! Built-in compilation units
//!
//! There is no front end in this crate, so the command line compiles these hand-built trees.
//! Each one exercises a different part of the code generator.

use crate::jvm::{
    ClassGraph, ClassId, ClassSymbol, FieldSymbol, Flags, JavaLibrary, LocalSymbol, MethodId, MethodSymbol, Type,
};
use crate::tree::{BinaryOp, ClassDecl, CompilationUnit, FieldDecl, Member, Pos, Receiver, TreeMaker, UnaryOp};

/// Names accepted by [`build`]
pub const DEMOS: &[&str] = &["answer", "loops", "switch", "finally", "strings", "sync"];

/// Class graph and tree of one compilation unit
pub struct Demo {
    pub graph: ClassGraph,
    pub java: JavaLibrary,
    pub unit: CompilationUnit,
}

/// Build the demo unit of the given name
pub fn build(name: &str) -> Option<Demo> {
    let demo = match name {
        "answer" => answer(),
        "loops" => loops(),
        "switch" => switch(),
        "finally" => finally(),
        "strings" => strings(),
        "sync" => sync(),
        _ => return None,
    };
    Some(demo)
}

/// Graph with the standard library types and one public class `demo/<name>`
fn start(name: &str) -> (ClassGraph, JavaLibrary, ClassId, MethodId) {
    let mut graph = ClassGraph::new();
    let java = graph.insert_java_library_types();
    let class = graph.add_class(ClassSymbol::new(format!("demo/{}", name), Flags::PUBLIC, Some(java.object)));
    let ctor = graph.add_method(MethodSymbol::new("<init>", class, Flags::PUBLIC, vec![], Type::Void));
    (graph, java, class, ctor)
}

fn default_ctor(make: &TreeMaker, java: &JavaLibrary, ctor: MethodId) -> Member {
    Member::Method(make.method(
        ctor,
        vec![],
        Some(make.body(vec![make.super_call(java.object_init, vec![])])),
    ))
}

fn unit(name: &str, class: ClassId, members: Vec<Member>) -> CompilationUnit {
    CompilationUnit {
        source_file: format!("demo/{}.java", name),
        classes: vec![ClassDecl {
            class,
            members,
            pos: Pos::at_line(1),
        }],
    }
}

fn static_method(graph: &mut ClassGraph, class: ClassId, name: &str, params: Vec<Type>, ret: Type) -> MethodId {
    graph.add_method(MethodSymbol::new(name, class, Flags::PUBLIC | Flags::STATIC, params, ret))
}

/// `int m() { return 42; }`
fn answer() -> Demo {
    let (mut graph, java, class, ctor) = start("Answer");
    let m = graph.add_method(MethodSymbol::new("m", class, Flags::PUBLIC, vec![], Type::INT));

    let mut make = TreeMaker::new(&graph, &java, class);
    make.at_line(2);
    let members = vec![
        default_ctor(&make, &java, ctor),
        Member::Method(make.method(m, vec![], Some(make.body(vec![make.return_(Some(make.int(42)))])))),
    ];
    let unit = unit("Answer", class, members);
    Demo { graph, java, unit }
}

/// Counting loops, with `continue`, `break`, and compound assignment
fn loops() -> Demo {
    let (mut graph, java, class, ctor) = start("Loops");
    let sum = static_method(&mut graph, class, "sum", vec![Type::INT], Type::INT);
    let n = graph.add_local(LocalSymbol::new("n", sum, Type::INT));
    let s = graph.add_local(LocalSymbol::new("s", sum, Type::INT));
    let i = graph.add_local(LocalSymbol::new("i", sum, Type::INT));
    let total = static_method(&mut graph, class, "total", vec![Type::array_of(Type::LONG)], Type::LONG);
    let values = graph.add_local(LocalSymbol::new("values", total, Type::array_of(Type::LONG)));
    let acc = graph.add_local(LocalSymbol::new("acc", total, Type::LONG));
    let j = graph.add_local(LocalSymbol::new("j", total, Type::INT));

    let mut make = TreeMaker::new(&graph, &java, class);
    make.at_line(3);

    // for (int i = 0; i < n; i++) { if (i % 3 == 0) continue; s += i; }
    let sum_body = make.body(vec![
        make.var_def(s, Some(make.int(0))),
        make.for_(
            vec![make.var_def(i, Some(make.int(0)))],
            Some(make.binary(BinaryOp::Lt, make.local(i), make.local(n))),
            vec![make.unary(UnaryOp::PostInc, make.local(i))],
            make.block(vec![
                make.if_(
                    make.binary(
                        BinaryOp::Eq,
                        make.binary(BinaryOp::Rem, make.local(i), make.int(3)),
                        make.int(0),
                    ),
                    make.continue_(None),
                    None,
                ),
                make.exec(make.assign_op(BinaryOp::Add, make.local(s), make.local(i))),
            ]),
        ),
        make.return_(Some(make.local(s))),
    ]);

    // long acc = 0; int j = 0; while (true) { if (j >= values.length) break; acc += values[j++]; }
    let total_body = make.body(vec![
        make.var_def(acc, Some(make.long(0))),
        make.var_def(j, Some(make.int(0))),
        make.while_(
            make.boolean(true),
            make.block(vec![
                make.if_(
                    make.binary(BinaryOp::Ge, make.local(j), make.array_length(make.local(values))),
                    make.break_(None),
                    None,
                ),
                make.exec(make.assign_op(
                    BinaryOp::Add,
                    make.local(acc),
                    make.index(make.local(values), make.unary(UnaryOp::PostInc, make.local(j))),
                )),
            ]),
        ),
        make.return_(Some(make.local(acc))),
    ]);

    let members = vec![
        default_ctor(&make, &java, ctor),
        Member::Method(make.method(sum, vec![n], Some(sum_body))),
        Member::Method(make.method(total, vec![values], Some(total_body))),
    ];
    let unit = unit("Loops", class, members);
    Demo { graph, java, unit }
}

/// A dense switch (table) and a sparse one (lookup)
fn switch() -> Demo {
    let (mut graph, java, class, ctor) = start("Switch");
    let dense = static_method(&mut graph, class, "dense", vec![Type::INT], Type::INT);
    let x = graph.add_local(LocalSymbol::new("x", dense, Type::INT));
    let sparse = static_method(&mut graph, class, "sparse", vec![Type::INT], Type::INT);
    let y = graph.add_local(LocalSymbol::new("y", sparse, Type::INT));

    let mut make = TreeMaker::new(&graph, &java, class);
    make.at_line(4);
    let mut dense_cases: Vec<_> = (0..5)
        .map(|label| make.case(Some(label), vec![make.return_(Some(make.int(10 + label)))]))
        .collect();
    dense_cases.push(make.case(None, vec![make.return_(Some(make.int(-1)))]));
    let dense_body = make.body(vec![make.switch(make.local(x), dense_cases)]);

    let sparse_body = make.body(vec![
        make.switch(
            make.local(y),
            vec![
                make.case(Some(0), vec![make.return_(Some(make.int(1)))]),
                make.case(Some(1_000_000), vec![make.return_(Some(make.int(2)))]),
            ],
        ),
        make.return_(Some(make.int(0))),
    ]);

    let members = vec![
        default_ctor(&make, &java, ctor),
        Member::Method(make.method(dense, vec![x], Some(dense_body))),
        Member::Method(make.method(sparse, vec![y], Some(sparse_body))),
    ];
    let unit = unit("Switch", class, members);
    Demo { graph, java, unit }
}

/// `try { risky(); if (x > 0) return x; } finally { cleanup(); } return 0;`
fn finally() -> Demo {
    let (mut graph, java, class, ctor) = start("Finally");
    let risky = static_method(&mut graph, class, "risky", vec![], Type::Void);
    let cleanup = static_method(&mut graph, class, "cleanup", vec![], Type::Void);
    let run = static_method(&mut graph, class, "run", vec![Type::INT], Type::INT);
    let x = graph.add_local(LocalSymbol::new("x", run, Type::INT));

    let mut make = TreeMaker::new(&graph, &java, class);
    make.at_line(5);
    let run_body = make.body(vec![
        make.try_(
            make.body(vec![
                make.exec(make.call(Receiver::Implicit, risky, vec![])),
                make.if_(
                    make.binary(BinaryOp::Gt, make.local(x), make.int(0)),
                    make.return_(Some(make.local(x))),
                    None,
                ),
            ]),
            vec![],
            Some(make.body(vec![make.exec(make.call(Receiver::Implicit, cleanup, vec![]))])),
        ),
        make.return_(Some(make.int(0))),
    ]);

    let members = vec![
        default_ctor(&make, &java, ctor),
        Member::Method(make.method(risky, vec![], Some(make.body(vec![])))),
        Member::Method(make.method(cleanup, vec![], Some(make.body(vec![])))),
        Member::Method(make.method(run, vec![x], Some(run_body))),
    ];
    let unit = unit("Finally", class, members);
    Demo { graph, java, unit }
}

/// String concatenation and `+=` on a string field
fn strings() -> Demo {
    let (mut graph, java, class, ctor) = start("Strings");
    let string = Type::Object(java.string);
    let log = graph.add_field(FieldSymbol::new("log", class, Flags::PRIVATE, string.clone()));
    let greet = graph.add_method(MethodSymbol::new(
        "greet",
        class,
        Flags::PUBLIC,
        vec![string.clone(), Type::INT],
        string.clone(),
    ));
    let name = graph.add_local(LocalSymbol::new("name", greet, string));
    let n = graph.add_local(LocalSymbol::new("n", greet, Type::INT));

    let mut make = TreeMaker::new(&graph, &java, class);
    make.at_line(6);
    let greet_body = make.body(vec![
        make.exec(make.assign_op(BinaryOp::Add, make.ident(log), make.local(name))),
        make.return_(Some(make.binary(
            BinaryOp::Add,
            make.binary(BinaryOp::Add, make.string("hello "), make.local(name)),
            make.local(n),
        ))),
    ]);

    let members = vec![
        Member::Field(FieldDecl {
            field: log,
            init: Some(make.string("")),
            pos: make.pos(),
        }),
        default_ctor(&make, &java, ctor),
        Member::Method(make.method(greet, vec![name, n], Some(greet_body))),
    ];
    let unit = unit("Strings", class, members);
    Demo { graph, java, unit }
}

/// `synchronized (lock) { counter++; }` with a static counter
fn sync() -> Demo {
    let (mut graph, java, class, ctor) = start("Sync");
    let object = Type::Object(java.object);
    let counter = graph.add_field(FieldSymbol::new("counter", class, Flags::STATIC, Type::INT));
    let bump = graph.add_method(MethodSymbol::new("bump", class, Flags::PUBLIC, vec![object.clone()], Type::Void));
    let lock = graph.add_local(LocalSymbol::new("lock", bump, object));

    let mut make = TreeMaker::new(&graph, &java, class);
    make.at_line(7);
    let bump_body = make.body(vec![make.synchronized(
        make.local(lock),
        make.body(vec![make.exec(make.unary(UnaryOp::PostInc, make.ident(counter)))]),
    )]);

    let members = vec![
        Member::Field(FieldDecl {
            field: counter,
            init: Some(make.int(100)),
            pos: make.pos(),
        }),
        default_ctor(&make, &java, ctor),
        Member::Method(make.method(bump, vec![lock], Some(bump_body))),
    ];
    let unit = unit("Sync", class, members);
    Demo { graph, java, unit }
}

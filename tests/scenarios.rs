mod common;

use classgen::demo;
use classgen::jvm::Type;
use classgen::translate::{Session, Settings};
use classgen::tree::{BinaryOp, Member};
use common::*;

fn compile_demo(name: &str, settings: Settings) -> Compiled {
    let demo = demo::build(name).expect("known demo");
    let mut session = Session::new(demo.graph, demo.java, settings);
    let outputs = session.generate(demo.unit).expect("translation should not fail");
    Compiled { session, outputs }
}

#[test]
fn answer_is_a_push_and_a_return() {
    let compiled = compile_demo("answer", Settings::default());
    let class = compiled.single();
    assert_eq!(class.name(), "demo/Answer");
    assert_eq!(class.major_version, 51);

    let code = class.code("m", "()I");
    assert_eq!(code.code, vec![16, 42, 172], "bipush 42; ireturn");
    assert_eq!(code.max_stack, 1);
    assert_eq!(code.max_locals, 1);
    assert!(code.exception_table.is_empty());
}

#[test]
fn default_constructor_calls_super() {
    let compiled = compile_demo("answer", Settings::default());
    let class = compiled.single();
    let code = class.code("<init>", "()V");
    let invoked = class.invoked(&code);
    assert_eq!(invoked.len(), 1);
    assert_eq!(invoked[0].1, "<init>");
    assert_eq!(code.code.first(), Some(&42), "aload_0 first");
    assert_eq!(code.code.last(), Some(&177), "return last");
}

#[test]
fn constant_condition_emits_no_branches() {
    let mut fixture = Fixture::new("Constant");
    let pick = fixture.static_method("pick", vec![], Type::Void);
    let x = fixture.local(pick, "x", Type::INT);

    let make = fixture.maker();
    let body = make.body(vec![
        make.var_def(x, None),
        make.if_(
            make.boolean(true),
            make.exec(make.assign(make.local(x), make.int(1))),
            Some(make.exec(make.assign(make.local(x), make.int(2)))),
        ),
    ]);
    let members = vec![
        fixture.default_ctor(fixture.ctor),
        Member::Method(make.method(pick, vec![], Some(body))),
    ];
    drop(make);

    let class = fixture.compile(members, Settings::default()).single();
    let code = class.code("pick", "()V");
    let insns = code.instructions();
    assert!(insns.iter().all(|insn| !is_jump(insn.opcode)), "{:?}", code.code);
    assert!(insns.iter().all(|insn| insn.opcode != 5), "else branch is dropped");
    assert_eq!(code.code, vec![4, 59, 177], "iconst_1; istore_0; return");
}

#[test]
fn dense_switch_uses_a_table() {
    let compiled = compile_demo("switch", Settings::default());
    let class = compiled.single();
    let code = class.code("dense", "(I)I");
    let insns = code.instructions();
    let switch = insns.iter().find(|insn| insn.opcode == 170).expect("tableswitch");
    assert_eq!(switch.keys, vec![0, 1, 2, 3, 4]);

    // Each case returns its own constant
    let pcs: Vec<usize> = insns.iter().map(|insn| insn.pc).collect();
    for (key, target) in switch.keys.iter().zip(&switch.targets[1..]) {
        let i = pcs.binary_search(target).expect("case lands on an instruction");
        assert_eq!(insns[i].value, Some(10 + key));
    }
    check_stack(&class, &code);
}

#[test]
fn sparse_switch_uses_a_lookup() {
    let compiled = compile_demo("switch", Settings::default());
    let class = compiled.single();
    let code = class.code("sparse", "(I)I");
    let insns = code.instructions();
    assert!(insns.iter().all(|insn| insn.opcode != 170));
    let switch = insns.iter().find(|insn| insn.opcode == 171).expect("lookupswitch");
    assert_eq!(switch.keys, vec![0, 1_000_000]);

    // Without a default case, the default falls through to the code after the switch
    let default = switch.targets[0];
    let after = insns.iter().find(|insn| insn.pc == default).expect("default target");
    assert_eq!(after.opcode, 3, "iconst_0 of the trailing return");
    check_stack(&class, &code);
}

#[test]
fn finally_runs_on_every_exit() {
    let compiled = compile_demo("finally", Settings::default());
    let class = compiled.single();
    let code = class.code("run", "(I)I");

    let cleanups: Vec<usize> = class
        .invoked(&code)
        .into_iter()
        .filter(|(_, name)| name == "cleanup")
        .map(|(pc, _)| pc)
        .collect();
    assert_eq!(cleanups.len(), 3, "return, normal completion, and exception paths");

    let catch_all: Vec<&ExceptionEntry> =
        code.exception_table.iter().filter(|entry| entry.catch_type == 0).collect();
    assert!(!catch_all.is_empty());
    for entry in &catch_all {
        for pc in &cleanups {
            assert!(
                !(entry.start_pc..entry.end_pc).contains(pc),
                "finalizer at {} is covered by {:?}",
                pc,
                entry
            );
        }
    }

    // The handler runs the finalizer and rethrows
    let handler = catch_all[0].handler_pc;
    let insns = code.instructions();
    let tail: Vec<u8> = insns.iter().filter(|insn| insn.pc >= handler).map(|insn| insn.opcode).collect();
    assert_eq!(tail.first(), Some(&77), "astore_2 of the exception");
    assert!(cleanups.iter().any(|pc| *pc > handler));
    assert!(tail.contains(&191), "athrow");

    let report = check_stack(&class, &code);
    assert!(report.max_depth as usize <= code.max_stack);
}

#[test]
fn string_concatenation_uses_a_builder() {
    let compiled = compile_demo("strings", Settings::default());
    let class = compiled.single();
    let code = class.code("greet", "(Ljava/lang/String;I)Ljava/lang/String;");

    let insns = code.instructions();
    let builders: Vec<&str> = insns
        .iter()
        .filter(|insn| insn.opcode == 187)
        .map(|insn| class.class_name(insn.index.unwrap_or_default()))
        .collect();
    assert_eq!(builders, vec!["java/lang/StringBuilder", "java/lang/StringBuilder"]);

    let appends: Vec<String> = insns
        .iter()
        .filter(|insn| insn.opcode == 182)
        .map(|insn| {
            let (_, name, descriptor) = class.member_ref(insn.index.unwrap_or_default());
            format!("{}{}", name, descriptor)
        })
        .filter(|call| call.starts_with("append"))
        .collect();
    assert_eq!(
        appends,
        vec![
            "append(Ljava/lang/String;)Ljava/lang/StringBuilder;",
            "append(Ljava/lang/String;)Ljava/lang/StringBuilder;",
            "append(Ljava/lang/String;)Ljava/lang/StringBuilder;",
            "append(Ljava/lang/String;)Ljava/lang/StringBuilder;",
            "append(I)Ljava/lang/StringBuilder;",
        ]
    );
    check_stack(&class, &code);
}

#[test]
fn old_targets_concatenate_with_string_buffer() {
    let settings = Settings {
        target: classgen::jvm::Version::JAVA1_4,
        ..Settings::default()
    };
    let compiled = compile_demo("strings", settings);
    let class = compiled.single();
    assert_eq!(class.major_version, 48);
    let code = class.code("greet", "(Ljava/lang/String;I)Ljava/lang/String;");
    let owners: Vec<&str> = code
        .instructions()
        .iter()
        .filter(|insn| insn.opcode == 182)
        .map(|insn| class.member_ref(insn.index.unwrap_or_default()).0)
        .collect();
    assert!(owners.iter().all(|owner| *owner == "java/lang/StringBuffer"), "{:?}", owners);
}

#[test]
fn field_initializers_move_into_constructors() {
    let compiled = compile_demo("strings", Settings::default());
    let class = compiled.single();
    let code = class.code("<init>", "()V");
    let insns = code.instructions();

    let super_call = insns.iter().position(|insn| insn.opcode == 183).expect("super call");
    let store = insns.iter().position(|insn| insn.opcode == 181).expect("field store");
    assert!(super_call < store, "initializer runs after super()");
    let (_, name, descriptor) = class.member_ref(insns[store].index.unwrap_or_default());
    assert_eq!((name, descriptor), ("log", "Ljava/lang/String;"));
}

#[test]
fn static_initializers_move_into_clinit() {
    let compiled = compile_demo("sync", Settings::default());
    let class = compiled.single();
    let clinit = class.method("<clinit>", "()V");
    assert_eq!(clinit.access_flags & 0x0008, 0x0008, "static");

    let code = class.code("<clinit>", "()V");
    let insns = code.instructions();
    assert_eq!(insns[0].value, Some(100), "bipush 100");
    let (_, name, _) = class.member_ref(insns[1].index.unwrap_or_default());
    assert_eq!((insns[1].opcode, name), (179, "counter"));
}

#[test]
fn synchronized_releases_the_monitor_on_every_exit() {
    let compiled = compile_demo("sync", Settings::default());
    let class = compiled.single();
    let code = class.code("bump", "(Ljava/lang/Object;)V");

    assert_eq!(count_opcode(&code, 194), 1, "one monitorenter");
    assert_eq!(count_opcode(&code, 195), 2, "monitorexit on normal and exceptional exit");

    let handler = code
        .exception_table
        .iter()
        .find(|entry| entry.catch_type == 0)
        .expect("catch-all around the body")
        .handler_pc;
    let insns = code.instructions();
    let tail: Vec<u8> = insns.iter().filter(|insn| insn.pc >= handler).map(|insn| insn.opcode).collect();
    let exit = tail.iter().position(|op| *op == 195).expect("monitorexit in the handler");
    let throw = tail.iter().position(|op| *op == 191).expect("athrow in the handler");
    assert!(exit < throw);

    let enter = insns.iter().find(|insn| insn.opcode == 194).map(|insn| insn.pc);
    assert!(code
        .exception_table
        .iter()
        .all(|entry| enter.map_or(true, |pc| !(entry.start_pc..entry.end_pc).contains(&pc))));
    check_stack(&class, &code);
}

#[test]
fn compound_assignment_on_locals_uses_iinc() {
    let mut fixture = Fixture::new("Incr");
    let bump = fixture.static_method("bump", vec![Type::INT], Type::INT);
    let n = fixture.local(bump, "n", Type::INT);

    let make = fixture.maker();
    let body = make.body(vec![
        make.exec(make.assign_op(BinaryOp::Add, make.local(n), make.int(5))),
        make.return_(Some(make.local(n))),
    ]);
    let members = vec![
        fixture.default_ctor(fixture.ctor),
        Member::Method(make.method(bump, vec![n], Some(body))),
    ];
    drop(make);

    let class = fixture.compile(members, Settings::default()).single();
    let code = class.code("bump", "(I)I");
    assert_eq!(code.code, vec![132, 0, 5, 26, 172], "iinc 0 5; iload_0; ireturn");
}

mod common;

use classgen::demo;
use classgen::jvm::{Flags, MethodSymbol, Type, Version};
use classgen::translate::{Session, Settings};
use classgen::tree::{BinaryOp, Member};
use common::*;
use std::collections::HashSet;

fn compile_demo(name: &str, settings: Settings) -> Compiled {
    let demo = demo::build(name).expect("known demo");
    let mut session = Session::new(demo.graph, demo.java, settings);
    let outputs = session.generate(demo.unit).expect("translation should not fail");
    Compiled { session, outputs }
}

/// Every method body of every demo, decoded
fn all_demo_code(settings: &Settings) -> Vec<(ClassFile, String, CodeAttribute)> {
    let mut bodies = vec![];
    for name in demo::DEMOS {
        let compiled = compile_demo(name, settings.clone());
        assert!(compiled.session.diagnostics().is_empty(), "{}", compiled.session.diagnostics());
        for output in &compiled.outputs {
            let class = ClassFile::parse(&output.bytes);
            let methods: Vec<(String, String)> = class
                .methods
                .iter()
                .filter(|method| method.attributes.iter().any(|attr| attr.name == "Code"))
                .map(|method| (method.name.clone(), method.descriptor.clone()))
                .collect();
            for (name, descriptor) in methods {
                let code = class.code(&name, &descriptor);
                bodies.push((ClassFile::parse(&output.bytes), format!("{}{}", name, descriptor), code));
            }
        }
    }
    bodies
}

fn assert_jumps_land_on_instructions(method: &str, code: &CodeAttribute) {
    let insns = code.instructions();
    let starts: HashSet<usize> = insns.iter().map(|insn| insn.pc).collect();
    for insn in &insns {
        for target in &insn.targets {
            assert!(
                starts.contains(target),
                "{}: jump at {} lands mid-instruction at {}",
                method,
                insn.pc,
                target
            );
        }
    }
    for entry in &code.exception_table {
        assert!(starts.contains(&entry.start_pc), "{}: {:?}", method, entry);
        assert!(starts.contains(&entry.handler_pc), "{}: {:?}", method, entry);
        assert!(entry.end_pc == code.code.len() || starts.contains(&entry.end_pc), "{}: {:?}", method, entry);
    }
}

#[test]
fn every_demo_has_sound_jumps_and_balanced_stacks() {
    for settings in [
        Settings::default(),
        Settings {
            target: Version::JAVA1_4,
            jsr_limit: 0,
            ..Settings::default()
        },
        Settings {
            fat_code: true,
            ..Settings::default()
        },
    ] {
        for (class, method, code) in all_demo_code(&settings) {
            assert_jumps_land_on_instructions(&method, &code);
            let report = check_stack(&class, &code);
            assert!(
                report.max_depth as usize <= code.max_stack,
                "{}: depth {} exceeds max_stack {}",
                method,
                report.max_depth,
                code.max_stack
            );
        }
    }
}

#[test]
fn for_loop_jumps_back_to_its_condition() {
    let compiled = compile_demo("loops", Settings::default());
    let class = compiled.single();
    let code = class.code("sum", "(I)I");
    let insns = code.instructions();

    let back = insns
        .iter()
        .rev()
        .find(|insn| insn.opcode == 167 && insn.targets[0] < insn.pc)
        .expect("backward goto");
    let target = insns.iter().find(|insn| insn.pc == back.targets[0]).expect("loop start");
    assert_eq!(target.opcode, 28, "iload_2 loads the loop variable");

    // `continue` lands on the step
    let step = insns.iter().find(|insn| insn.opcode == 132).expect("iinc for i++");
    assert_eq!(step.index, Some(2));
    assert!(insns
        .iter()
        .any(|insn| insn.opcode == 167 && insn.targets[0] == step.pc));
}

#[test]
fn break_leaves_an_infinite_loop() {
    let compiled = compile_demo("loops", Settings::default());
    let class = compiled.single();
    let code = class.code("total", "([J)J");
    let insns = code.instructions();

    // The only way out of `while (true)` is the `break`, which lands on the trailing return
    let ret = insns.iter().find(|insn| insn.opcode == 173).expect("lreturn");
    let load = insns.iter().rev().find(|insn| insn.pc < ret.pc).expect("load of acc");
    assert!(insns
        .iter()
        .any(|insn| is_jump(insn.opcode) && insn.targets.first() == Some(&load.pc)));
    check_stack(&class, &code);
}

#[test]
fn fat_code_uses_wide_jumps_only() {
    let settings = Settings {
        fat_code: true,
        ..Settings::default()
    };
    let compiled = compile_demo("loops", settings);
    let class = compiled.single();
    for (name, descriptor) in [("sum", "(I)I"), ("total", "([J)J")] {
        let code = class.code(name, descriptor);
        let insns = code.instructions();
        assert_eq!(count_opcode(&code, 167), 0, "no 16-bit goto in {}", name);
        assert!(count_opcode(&code, 200) > 0);
        for (i, insn) in insns.iter().enumerate() {
            if is_jump(insn.opcode) && insn.opcode != 200 {
                assert_eq!(insn.targets[0], insn.pc + 8, "conditional skips a goto_w");
                assert_eq!(insns[i + 1].opcode, 200);
            }
        }
    }
}

#[test]
fn long_backward_jump_switches_to_fat_code() {
    let mut fixture = Fixture::new("Long");
    let counter = fixture.static_field("counter", Type::INT);
    let spin = fixture.static_method("spin", vec![], Type::Void);

    let make = fixture.maker();
    let filler: Vec<_> = (0..4000)
        .map(|_| {
            make.exec(make.assign(
                make.ident(counter),
                make.binary(BinaryOp::Add, make.ident(counter), make.int(1000)),
            ))
        })
        .collect();
    let body = make.body(vec![make.while_(
        make.binary(BinaryOp::Lt, make.ident(counter), make.int(10)),
        make.block(filler),
    )]);
    let members = vec![
        fixture.default_ctor(fixture.ctor),
        Member::Method(make.method(spin, vec![], Some(body))),
    ];
    drop(make);

    let compiled = fixture.compile(members, Settings::default());
    assert!(compiled.session.diagnostics().is_empty());
    let class = compiled.single();
    let code = class.code("spin", "()V");
    assert!(code.code.len() > 40_000);
    assert_eq!(count_opcode(&code, 167), 0);

    let insns = code.instructions();
    let back = insns
        .iter()
        .find(|insn| insn.opcode == 200 && insn.targets[0] == 0)
        .expect("goto_w back to the condition");
    assert!(back.pc > 32_767);
    check_stack(&class, &code);
}

#[test]
fn finalizers_become_subroutines_on_old_targets() {
    let settings = Settings {
        target: Version::JAVA1_4,
        jsr_limit: 0,
        ..Settings::default()
    };
    let compiled = compile_demo("finally", settings);
    let class = compiled.single();
    assert_eq!(class.major_version, 48);

    let code = class.code("run", "(I)I");
    assert!(!code.has_attribute("StackMapTable"));
    let cleanups = class.invoked(&code).into_iter().filter(|(_, name)| name == "cleanup").count();
    assert_eq!(cleanups, 1, "finalizer body emitted once");
    assert!(count_opcode(&code, 168) >= 2, "every exit calls the subroutine");
    assert_eq!(count_opcode(&code, 169), 1, "one ret");

    // Every jsr calls the same subroutine
    let targets: HashSet<usize> = code
        .instructions()
        .iter()
        .filter(|insn| insn.opcode == 168)
        .map(|insn| insn.targets[0])
        .collect();
    assert_eq!(targets.len(), 1);
    check_stack(&class, &code);
}

#[test]
fn small_finalizers_are_inlined_under_the_default_limit() {
    let settings = Settings {
        target: Version::JAVA1_4,
        ..Settings::default()
    };
    let compiled = compile_demo("finally", settings);
    let class = compiled.single();
    let code = class.code("run", "(I)I");
    assert_eq!(count_opcode(&code, 168), 0);
    assert_eq!(count_opcode(&code, 169), 0);
}

#[test]
fn stack_maps_follow_the_target() {
    let modern = compile_demo("loops", Settings::default()).single();
    assert!(modern.code("sum", "(I)I").has_attribute("StackMapTable"));
    assert!(!modern.code("<init>", "()V").has_attribute("StackMapTable"), "straight-line code");

    let old = compile_demo(
        "loops",
        Settings {
            target: Version::JAVA5,
            ..Settings::default()
        },
    )
    .single();
    assert_eq!(old.major_version, 49);
    assert!(!old.code("sum", "(I)I").has_attribute("StackMapTable"));
}

#[test]
fn debug_tables_follow_the_settings() {
    let class = compile_demo("loops", Settings::default()).single();
    let code = class.code("sum", "(I)I");
    assert!(code.has_attribute("LineNumberTable"));
    assert!(!code.has_attribute("LocalVariableTable"));
    assert!(class.attributes.iter().any(|attr| attr.name == "SourceFile"));

    let settings = Settings {
        line_debug_info: false,
        var_debug_info: true,
        source_file_debug_info: false,
        ..Settings::default()
    };
    let class = compile_demo("loops", settings).single();
    let code = class.code("sum", "(I)I");
    assert!(!code.has_attribute("LineNumberTable"));
    assert!(code.has_attribute("LocalVariableTable"));
    assert!(class.attributes.iter().all(|attr| attr.name != "SourceFile"));
}

#[test]
fn abstract_methods_have_no_code() {
    let mut fixture = Fixture::new("Shape");
    let area = fixture.graph.add_method(MethodSymbol::new(
        "area",
        fixture.class,
        Flags::PUBLIC | Flags::ABSTRACT,
        vec![],
        Type::DOUBLE,
    ));
    fixture.graph.class_mut(fixture.class).flags |= Flags::ABSTRACT;

    let make = fixture.maker();
    let members = vec![
        fixture.default_ctor(fixture.ctor),
        Member::Method(make.method(area, vec![], None)),
    ];
    drop(make);

    let class = fixture.compile(members, Settings::default()).single();
    let area = class.method("area", "()D");
    assert!(area.attributes.iter().all(|attr| attr.name != "Code"));
    assert_eq!(area.access_flags & 0x0400, 0x0400);
}

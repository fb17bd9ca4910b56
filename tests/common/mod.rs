#![allow(dead_code)]

//! Shared helpers for the integration tests
//!
//! The class file decoder here is written independently of the crate's own writer, so that
//! tests check the bytes against the format rather than against the writer's assumptions.

use byteorder::{BigEndian, ReadBytesExt};
use classgen::jvm::{ClassGraph, ClassId, ClassSymbol, FieldId, FieldSymbol, Flags, JavaLibrary, LocalId, LocalSymbol, MethodId, MethodSymbol, Type};
use classgen::translate::{ClassOutput, Session, Settings};
use classgen::tree::{ClassDecl, CompilationUnit, Member, Pos, TreeMaker};
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::path::PathBuf;

/* Trees */

/// One public class `test/<name>` with a default constructor, over the standard library types
pub struct Fixture {
    pub graph: ClassGraph,
    pub java: JavaLibrary,
    pub class: ClassId,
    pub ctor: MethodId,
}

impl Fixture {
    pub fn new(name: &str) -> Fixture {
        let mut graph = ClassGraph::new();
        let java = graph.insert_java_library_types();
        let class = graph.add_class(ClassSymbol::new(format!("test/{}", name), Flags::PUBLIC, Some(java.object)));
        let ctor = graph.add_method(MethodSymbol::new("<init>", class, Flags::PUBLIC, vec![], Type::Void));
        Fixture {
            graph,
            java,
            class,
            ctor,
        }
    }

    /// Add another class to the same graph
    pub fn add_class(&mut self, name: &str) -> (ClassId, MethodId) {
        let class = self.graph.add_class(ClassSymbol::new(
            format!("test/{}", name),
            Flags::PUBLIC,
            Some(self.java.object),
        ));
        let ctor = self.graph.add_method(MethodSymbol::new("<init>", class, Flags::PUBLIC, vec![], Type::Void));
        (class, ctor)
    }

    pub fn static_method(&mut self, name: &str, params: Vec<Type>, ret: Type) -> MethodId {
        self.static_method_in(self.class, name, params, ret)
    }

    pub fn static_method_in(&mut self, class: ClassId, name: &str, params: Vec<Type>, ret: Type) -> MethodId {
        self.graph.add_method(MethodSymbol::new(name, class, Flags::PUBLIC | Flags::STATIC, params, ret))
    }

    pub fn static_field(&mut self, name: &str, ty: Type) -> FieldId {
        self.graph.add_field(FieldSymbol::new(name, self.class, Flags::STATIC, ty))
    }

    pub fn local(&mut self, method: MethodId, name: &str, ty: Type) -> LocalId {
        self.graph.add_local(LocalSymbol::new(name, method, ty))
    }

    pub fn maker(&self) -> TreeMaker<'_> {
        self.maker_for(self.class)
    }

    pub fn maker_for(&self, class: ClassId) -> TreeMaker<'_> {
        let mut make = TreeMaker::new(&self.graph, &self.java, class);
        make.at_line(1);
        make
    }

    /// `public <init>() { super(); }`
    pub fn default_ctor(&self, ctor: MethodId) -> Member {
        let make = self.maker();
        Member::Method(make.method(
            ctor,
            vec![],
            Some(make.body(vec![make.super_call(self.java.object_init, vec![])])),
        ))
    }

    /// Compile the members of the fixture class
    pub fn compile(self, members: Vec<Member>, settings: Settings) -> Compiled {
        let class = self.class;
        self.compile_classes(vec![(class, members)], settings)
    }

    pub fn compile_classes(self, classes: Vec<(ClassId, Vec<Member>)>, settings: Settings) -> Compiled {
        let unit = CompilationUnit {
            source_file: "test/Test.java".to_owned(),
            classes: classes
                .into_iter()
                .map(|(class, members)| ClassDecl {
                    class,
                    members,
                    pos: Pos::at_line(1),
                })
                .collect(),
        };
        let mut session = Session::new(self.graph, self.java, settings);
        let outputs = session.generate(unit).expect("translation should not fail");
        Compiled { session, outputs }
    }
}

pub struct Compiled {
    pub session: Session,
    pub outputs: Vec<ClassOutput>,
}

impl Compiled {
    /// Decode the only class produced
    pub fn single(&self) -> ClassFile {
        assert_eq!(self.outputs.len(), 1, "expected exactly one class file");
        ClassFile::parse(&self.outputs[0].bytes)
    }

    pub fn class(&self, binary_name: &str) -> ClassFile {
        let output = self
            .outputs
            .iter()
            .find(|output| output.binary_name == binary_name)
            .unwrap_or_else(|| panic!("no class file for {}", binary_name));
        ClassFile::parse(&output.bytes)
    }
}

/// Fresh scratch directory for output tests
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("classgen-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("scratch directory");
    dir
}

/* Class files */

#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub info: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start_pc: usize,
    pub end_pc: usize,
    pub handler_pc: usize,
    pub catch_type: u16,
}

#[derive(Clone, Debug)]
pub struct CodeAttribute {
    pub max_stack: usize,
    pub max_locals: usize,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes: Vec<Attribute>,
}

impl CodeAttribute {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attr| attr.name == name)
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        instructions(&self.code)
    }
}

#[derive(Debug)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,

    /// Indexed like the pool (slot `0` and the slots after wide constants are `None`)
    pub constants: Vec<Option<Constant>>,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<Attribute>,
}

fn read_u1(cursor: &mut Cursor<&[u8]>) -> u8 {
    cursor.read_u8().expect("truncated class file")
}

fn read_u2(cursor: &mut Cursor<&[u8]>) -> u16 {
    cursor.read_u16::<BigEndian>().expect("truncated class file")
}

fn read_u4(cursor: &mut Cursor<&[u8]>) -> u32 {
    cursor.read_u32::<BigEndian>().expect("truncated class file")
}

fn read_bytes(cursor: &mut Cursor<&[u8]>, len: usize) -> Vec<u8> {
    let mut bytes = vec![0; len];
    cursor.read_exact(&mut bytes).expect("truncated class file");
    bytes
}

/// Decode modified UTF-8 (only as much of it as the tests need)
fn decode_utf8(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = vec![];
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i] as u16;
        if b & 0x80 == 0 {
            units.push(b);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push(((b & 0x1F) << 6) | (bytes[i + 1] as u16 & 0x3F));
            i += 2;
        } else {
            units.push(((b & 0x0F) << 12) | ((bytes[i + 1] as u16 & 0x3F) << 6) | (bytes[i + 2] as u16 & 0x3F));
            i += 3;
        }
    }
    String::from_utf16_lossy(&units)
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> ClassFile {
        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_u4(&mut cursor), 0xCAFE_BABE, "magic number");
        let minor_version = read_u2(&mut cursor);
        let major_version = read_u2(&mut cursor);

        let count = read_u2(&mut cursor) as usize;
        let mut constants: Vec<Option<Constant>> = vec![None];
        while constants.len() < count {
            let tag = read_u1(&mut cursor);
            let constant = match tag {
                1 => {
                    let len = read_u2(&mut cursor) as usize;
                    Constant::Utf8(decode_utf8(&read_bytes(&mut cursor, len)))
                }
                3 => Constant::Integer(read_u4(&mut cursor) as i32),
                4 => Constant::Float(f32::from_bits(read_u4(&mut cursor))),
                5 => {
                    let high = read_u4(&mut cursor) as u64;
                    let low = read_u4(&mut cursor) as u64;
                    Constant::Long(((high << 32) | low) as i64)
                }
                6 => {
                    let high = read_u4(&mut cursor) as u64;
                    let low = read_u4(&mut cursor) as u64;
                    Constant::Double(f64::from_bits((high << 32) | low))
                }
                7 => Constant::Class(read_u2(&mut cursor)),
                8 => Constant::String(read_u2(&mut cursor)),
                9 => Constant::FieldRef(read_u2(&mut cursor), read_u2(&mut cursor)),
                10 => Constant::MethodRef(read_u2(&mut cursor), read_u2(&mut cursor)),
                11 => Constant::InterfaceMethodRef(read_u2(&mut cursor), read_u2(&mut cursor)),
                12 => Constant::NameAndType(read_u2(&mut cursor), read_u2(&mut cursor)),
                other => panic!("unknown constant tag {}", other),
            };
            let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
            constants.push(Some(constant));
            if wide {
                constants.push(None);
            }
        }
        assert_eq!(constants.len(), count, "wide constant overran the pool count");

        let mut class = ClassFile {
            minor_version,
            major_version,
            constants,
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
            attributes: vec![],
        };
        class.access_flags = read_u2(&mut cursor);
        class.this_class = read_u2(&mut cursor);
        class.super_class = read_u2(&mut cursor);
        let interfaces = read_u2(&mut cursor);
        class.interfaces = (0..interfaces).map(|_| read_u2(&mut cursor)).collect();
        let fields = read_u2(&mut cursor);
        class.fields = (0..fields).map(|_| class.parse_member(&mut cursor)).collect();
        let methods = read_u2(&mut cursor);
        class.methods = (0..methods).map(|_| class.parse_member(&mut cursor)).collect();
        class.attributes = class.parse_attributes(&mut cursor);
        assert_eq!(cursor.position() as usize, bytes.len(), "trailing bytes after the class");
        class
    }

    fn parse_member(&self, cursor: &mut Cursor<&[u8]>) -> MemberInfo {
        let access_flags = read_u2(cursor);
        let name = self.utf8(read_u2(cursor)).to_owned();
        let descriptor = self.utf8(read_u2(cursor)).to_owned();
        let attributes = self.parse_attributes(cursor);
        MemberInfo {
            access_flags,
            name,
            descriptor,
            attributes,
        }
    }

    fn parse_attributes(&self, cursor: &mut Cursor<&[u8]>) -> Vec<Attribute> {
        let count = read_u2(cursor);
        (0..count)
            .map(|_| {
                let name = self.utf8(read_u2(cursor)).to_owned();
                let len = read_u4(cursor) as usize;
                Attribute {
                    name,
                    info: read_bytes(cursor, len),
                }
            })
            .collect()
    }

    pub fn constant(&self, index: u16) -> &Constant {
        self.constants
            .get(index as usize)
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("no constant at index {}", index))
    }

    pub fn utf8(&self, index: u16) -> &str {
        match self.constant(index) {
            Constant::Utf8(utf8) => utf8,
            other => panic!("expected utf8 at {}, found {:?}", index, other),
        }
    }

    pub fn class_name(&self, index: u16) -> &str {
        match self.constant(index) {
            Constant::Class(name) => self.utf8(*name),
            other => panic!("expected class at {}, found {:?}", index, other),
        }
    }

    pub fn name(&self) -> &str {
        self.class_name(self.this_class)
    }

    /// Owner, name, and descriptor of a field or method reference
    pub fn member_ref(&self, index: u16) -> (&str, &str, &str) {
        let (class, name_and_type) = match self.constant(index) {
            Constant::FieldRef(class, nat)
            | Constant::MethodRef(class, nat)
            | Constant::InterfaceMethodRef(class, nat) => (*class, *nat),
            other => panic!("expected member reference at {}, found {:?}", index, other),
        };
        match self.constant(name_and_type) {
            Constant::NameAndType(name, descriptor) => {
                (self.class_name(class), self.utf8(*name), self.utf8(*descriptor))
            }
            other => panic!("expected name and type at {}, found {:?}", name_and_type, other),
        }
    }

    pub fn method(&self, name: &str, descriptor: &str) -> &MemberInfo {
        self.methods
            .iter()
            .find(|method| method.name == name && method.descriptor == descriptor)
            .unwrap_or_else(|| panic!("no method {}{}", name, descriptor))
    }

    pub fn field(&self, name: &str) -> &MemberInfo {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .unwrap_or_else(|| panic!("no field {}", name))
    }

    pub fn code(&self, name: &str, descriptor: &str) -> CodeAttribute {
        let method = self.method(name, descriptor);
        let attr = method
            .attributes
            .iter()
            .find(|attr| attr.name == "Code")
            .unwrap_or_else(|| panic!("{}{} has no code", name, descriptor));
        let mut cursor = Cursor::new(attr.info.as_slice());
        let max_stack = read_u2(&mut cursor) as usize;
        let max_locals = read_u2(&mut cursor) as usize;
        let len = read_u4(&mut cursor) as usize;
        let code = read_bytes(&mut cursor, len);
        let entries = read_u2(&mut cursor);
        let exception_table = (0..entries)
            .map(|_| ExceptionEntry {
                start_pc: read_u2(&mut cursor) as usize,
                end_pc: read_u2(&mut cursor) as usize,
                handler_pc: read_u2(&mut cursor) as usize,
                catch_type: read_u2(&mut cursor),
            })
            .collect();
        let attributes = self.parse_attributes(&mut cursor);
        CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        }
    }

    /// Names of the methods invoked at each `invoke*` instruction, in code order
    pub fn invoked(&self, code: &CodeAttribute) -> Vec<(usize, String)> {
        code.instructions()
            .iter()
            .filter(|insn| (182..=185).contains(&insn.opcode))
            .map(|insn| {
                let (_, name, _) = self.member_ref(insn.index.unwrap_or_default());
                (insn.pc, name.to_owned())
            })
            .collect()
    }
}

/* Instructions */

#[derive(Clone, Debug)]
pub struct Instruction {
    pub pc: usize,

    /// For `wide` instructions, the opcode being widened
    pub opcode: u8,
    pub wide: bool,
    pub len: usize,

    /// Absolute branch targets (for switches, the default first)
    pub targets: Vec<usize>,

    /// Switch keys, lined up with `targets[1..]`
    pub keys: Vec<i32>,

    /// Pool index or local variable index
    pub index: Option<u16>,

    /// Immediate operand (`bipush`, `sipush`, `iinc`, `newarray`, `multianewarray` dimensions)
    pub value: Option<i32>,
}

fn u2_at(code: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([code[at], code[at + 1]])
}

fn i2_at(code: &[u8], at: usize) -> i32 {
    i16::from_be_bytes([code[at], code[at + 1]]) as i32
}

fn i4_at(code: &[u8], at: usize) -> i32 {
    i32::from_be_bytes([code[at], code[at + 1], code[at + 2], code[at + 3]])
}

fn offset(pc: usize, delta: i32) -> usize {
    (pc as i64 + delta as i64) as usize
}

/// Decode a method body into instructions
pub fn instructions(code: &[u8]) -> Vec<Instruction> {
    let mut decoded = vec![];
    let mut pc = 0;
    while pc < code.len() {
        let opcode = code[pc];
        let mut insn = Instruction {
            pc,
            opcode,
            wide: false,
            len: 1,
            targets: vec![],
            keys: vec![],
            index: None,
            value: None,
        };
        match opcode {
            16 => {
                insn.len = 2;
                insn.value = Some(code[pc + 1] as i8 as i32);
            }
            17 => {
                insn.len = 3;
                insn.value = Some(i2_at(code, pc + 1));
            }
            18 => {
                insn.len = 2;
                insn.index = Some(code[pc + 1] as u16);
            }
            19 | 20 | 178..=184 | 187 | 189 | 192 | 193 => {
                insn.len = 3;
                insn.index = Some(u2_at(code, pc + 1));
            }
            21..=25 | 54..=58 | 169 => {
                insn.len = 2;
                insn.index = Some(code[pc + 1] as u16);
            }
            132 => {
                insn.len = 3;
                insn.index = Some(code[pc + 1] as u16);
                insn.value = Some(code[pc + 2] as i8 as i32);
            }
            153..=168 | 198 | 199 => {
                insn.len = 3;
                insn.targets.push(offset(pc, i2_at(code, pc + 1)));
            }
            200 | 201 => {
                insn.len = 5;
                insn.targets.push(offset(pc, i4_at(code, pc + 1)));
            }
            170 => {
                let base = (pc + 4) & !3;
                let low = i4_at(code, base + 4);
                let high = i4_at(code, base + 8);
                insn.targets.push(offset(pc, i4_at(code, base)));
                for (i, key) in (low..=high).enumerate() {
                    insn.keys.push(key);
                    insn.targets.push(offset(pc, i4_at(code, base + 12 + 4 * i)));
                }
                insn.len = base + 12 + 4 * insn.keys.len() - pc;
            }
            171 => {
                let base = (pc + 4) & !3;
                let npairs = i4_at(code, base + 4) as usize;
                insn.targets.push(offset(pc, i4_at(code, base)));
                for i in 0..npairs {
                    insn.keys.push(i4_at(code, base + 8 + 8 * i));
                    insn.targets.push(offset(pc, i4_at(code, base + 12 + 8 * i)));
                }
                insn.len = base + 8 + 8 * npairs - pc;
            }
            185 | 186 => {
                insn.len = 5;
                insn.index = Some(u2_at(code, pc + 1));
            }
            188 => {
                insn.len = 2;
                insn.value = Some(code[pc + 1] as i32);
            }
            196 => {
                insn.wide = true;
                insn.opcode = code[pc + 1];
                insn.index = Some(u2_at(code, pc + 2));
                if insn.opcode == 132 {
                    insn.len = 6;
                    insn.value = Some(i2_at(code, pc + 4));
                } else {
                    insn.len = 4;
                }
            }
            197 => {
                insn.len = 4;
                insn.index = Some(u2_at(code, pc + 1));
                insn.value = Some(code[pc + 3] as i32);
            }
            _ => (),
        }
        pc += insn.len;
        decoded.push(insn);
    }
    assert_eq!(pc, code.len(), "last instruction runs past the end of the code");
    decoded
}

/// Is this a branch (conditional or not, `jsr` included, switches excluded)?
pub fn is_jump(opcode: u8) -> bool {
    matches!(opcode, 153..=168 | 198..=201)
}

/* Stack simulation */

fn field_width(descriptor: &str) -> i32 {
    match descriptor.as_bytes().first() {
        Some(b'J') | Some(b'D') => 2,
        Some(b'V') => 0,
        _ => 1,
    }
}

/// Slots taken by the parameters of a method descriptor, and by its return value
fn method_widths(descriptor: &str) -> (i32, i32) {
    let close = descriptor.find(')').expect("method descriptor");
    let params = descriptor[1..close].as_bytes();
    let mut width = 0;
    let mut i = 0;
    while i < params.len() {
        let is_array = params[i] == b'[';
        while params[i] == b'[' {
            i += 1;
        }
        if params[i] == b'L' {
            while params[i] != b';' {
                i += 1;
            }
        }
        width += if !is_array && matches!(params[i], b'J' | b'D') { 2 } else { 1 };
        i += 1;
    }
    (width, field_width(&descriptor[close + 1..]))
}

/// Net stack effect of an instruction (in slots)
fn stack_effect(class: &ClassFile, insn: &Instruction) -> i32 {
    let op = insn.opcode;
    match op {
        0 => 0,
        1..=8 => 1,
        9 | 10 => 2,
        11..=13 => 1,
        14 | 15 => 2,
        16 | 17 => 1,
        18 | 19 => 1,
        20 => 2,
        21 | 23 | 25 => 1,
        22 | 24 => 2,
        26..=29 | 34..=37 | 42..=45 => 1,
        30..=33 | 38..=41 => 2,
        46 | 48 | 50..=53 => -1,
        47 | 49 => 0,
        54 | 56 | 58 => -1,
        55 | 57 => -2,
        59..=62 | 67..=70 | 75..=78 => -1,
        63..=66 | 71..=74 => -2,
        79 | 81 | 83..=86 => -3,
        80 | 82 => -4,
        87 => -1,
        88 => -2,
        89..=91 => 1,
        92..=94 => 2,
        95 => 0,
        96..=115 => {
            if (op - 96) % 2 == 1 {
                -2
            } else {
                -1
            }
        }
        116..=119 => 0,
        120..=125 => -1,
        126 | 128 | 130 => -1,
        127 | 129 | 131 => -2,
        132 => 0,
        133 | 135 | 140 | 141 => 1,
        134 | 138 | 139 | 143 | 145..=147 => 0,
        136 | 137 | 142 | 144 => -1,
        148 | 151 | 152 => -3,
        149 | 150 => -1,
        153..=158 => -1,
        159..=166 => -2,
        167 | 200 => 0,
        168 | 201 => 1,
        169 => 0,
        170 | 171 => -1,
        172 | 174 | 176 => -1,
        173 | 175 => -2,
        177 => 0,
        178..=181 => {
            let (_, _, descriptor) = class.member_ref(insn.index.unwrap_or_default());
            let width = field_width(descriptor);
            match op {
                178 => width,
                179 => -width,
                180 => width - 1,
                _ => -width - 1,
            }
        }
        182..=185 => {
            let (_, _, descriptor) = class.member_ref(insn.index.unwrap_or_default());
            let (params, ret) = method_widths(descriptor);
            let receiver = if op == 184 { 0 } else { 1 };
            ret - params - receiver
        }
        187 => 1,
        188 | 189 | 190 | 192 | 193 => 0,
        191 => -1,
        194 | 195 => -1,
        197 => 1 - insn.value.unwrap_or_default(),
        198 | 199 => -1,
        other => panic!("unexpected opcode {} at {}", other, insn.pc),
    }
}

/// Stack depths found by [`check_stack`]
pub struct StackReport {
    /// Depth before each reachable instruction
    pub depths: BTreeMap<usize, i32>,
    pub max_depth: i32,
}

/// Walk every path through a method body, checking that stack depths agree wherever paths
/// meet, never go negative, and are empty (apart from the returned value) at every return
pub fn check_stack(class: &ClassFile, code: &CodeAttribute) -> StackReport {
    let insns = code.instructions();
    let by_pc: HashMap<usize, usize> = insns.iter().enumerate().map(|(i, insn)| (insn.pc, i)).collect();

    let mut depths: BTreeMap<usize, i32> = BTreeMap::new();
    let mut worklist: Vec<(usize, i32)> = vec![(0, 0)];
    for entry in &code.exception_table {
        worklist.push((entry.handler_pc, 1));
    }
    let mut max_depth = 0;

    while let Some((pc, depth)) = worklist.pop() {
        let i = *by_pc
            .get(&pc)
            .unwrap_or_else(|| panic!("control reaches {} which is not an instruction", pc));
        if let Some(known) = depths.get(&pc) {
            assert_eq!(*known, depth, "stack depths disagree at {}", pc);
            continue;
        }
        depths.insert(pc, depth);

        let insn = &insns[i];
        let after = depth + stack_effect(class, insn);
        assert!(after >= 0, "stack underflow at {} (opcode {})", pc, insn.opcode);
        max_depth = max_depth.max(depth).max(after);

        let next = pc + insn.len;
        match insn.opcode {
            172..=177 => {
                assert_eq!(after, 0, "values left on the stack by the return at {}", pc);
            }
            191 | 169 => (),
            167 | 200 => worklist.push((insn.targets[0], after)),
            168 | 201 => {
                worklist.push((insn.targets[0], after));
                worklist.push((next, depth));
            }
            170 | 171 => {
                for target in &insn.targets {
                    worklist.push((*target, after));
                }
            }
            op if is_jump(op) => {
                worklist.push((insn.targets[0], after));
                worklist.push((next, after));
            }
            _ => worklist.push((next, after)),
        }
    }

    StackReport { depths, max_depth }
}

/// Count instructions with the given opcode
pub fn count_opcode(code: &CodeAttribute, opcode: u8) -> usize {
    code.instructions().iter().filter(|insn| insn.opcode == opcode).count()
}

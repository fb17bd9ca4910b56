//! Addressable values
//!
//! Translating an expression yields an [`Item`] describing where its value lives (on the stack,
//! in a local, in a field, ...) without necessarily loading it. Whoever consumes the item then
//! decides whether to load it, store into it, call it, or branch on it.

use super::Error;
use crate::jvm::code::{merge_chains, Code, Jumps};
use crate::jvm::opcodes::*;
use crate::jvm::{negate, ClassGraph, ClassId, ConstValue, FieldId, MethodId, Pool, Type, TypeCode};

/// Member and the class it is accessed through
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Member {
    Field(FieldId),
    Method(MethodId),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemberRef {
    pub member: Member,

    /// Class named in the constant pool reference
    pub qualifier: ClassId,
}

impl MemberRef {
    pub fn field(field: FieldId, qualifier: ClassId) -> MemberRef {
        MemberRef {
            member: Member::Field(field),
            qualifier,
        }
    }

    pub fn method(method: MethodId, qualifier: ClassId) -> MemberRef {
        MemberRef {
            member: Member::Method(method),
            qualifier,
        }
    }

    fn type_code(&self, graph: &ClassGraph) -> TypeCode {
        match self.member {
            Member::Field(field) => graph.field(field).ty.type_code(),
            Member::Method(_) => TypeCode::Void,
        }
    }
}

/// Value produced by a boolean expression as pending jumps
///
/// Control goes to `true_jumps` or `false_jumps`, or falls through after testing `opcode`
/// (jumping when it holds).
#[derive(Clone, Debug)]
pub struct CondItem {
    pub opcode: u8,
    pub true_jumps: Jumps,
    pub false_jumps: Jumps,
}

impl CondItem {
    pub fn new(opcode: u8) -> CondItem {
        CondItem {
            opcode,
            true_jumps: None,
            false_jumps: None,
        }
    }

    pub fn with_jumps(opcode: u8, true_jumps: Jumps, false_jumps: Jumps) -> CondItem {
        CondItem {
            opcode,
            true_jumps,
            false_jumps,
        }
    }

    /// Always true, without any jump
    pub fn is_true(&self) -> bool {
        self.false_jumps.is_none() && self.opcode == GOTO
    }

    /// Always false, without any jump
    pub fn is_false(&self) -> bool {
        self.true_jumps.is_none() && self.opcode == DONTGOTO
    }

    pub fn negate(self) -> CondItem {
        CondItem {
            opcode: negate(self.opcode),
            true_jumps: self.false_jumps,
            false_jumps: self.true_jumps,
        }
    }

    /// Jumps taken when the condition holds (control falls through otherwise)
    pub fn jump_true(&self, code: &mut Code) -> Result<Jumps, Error> {
        let jump = code.branch(self.opcode)?;
        Ok(merge_chains(self.true_jumps.clone(), jump)?)
    }

    /// Jumps taken when the condition fails (control falls through otherwise)
    pub fn jump_false(&self, code: &mut Code) -> Result<Jumps, Error> {
        let jump = code.branch(negate(self.opcode))?;
        Ok(merge_chains(self.false_jumps.clone(), jump)?)
    }

    /// Materialize the condition as `0` or `1` on the stack
    pub fn load(&self, code: &mut Code) -> Result<(), Error> {
        let false_chain = self.jump_false(code)?;
        let mut true_chain = None;
        if !self.is_false() {
            code.resolve(self.true_jumps.clone())?;
            code.emitop0(ICONST_1)?;
            true_chain = code.branch(GOTO)?;
        }
        if false_chain.is_some() {
            code.resolve(false_chain)?;
            code.emitop0(ICONST_0)?;
        }
        code.resolve(true_chain)?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub enum Item {
    /// Value on top of the stack
    Stack(TypeCode),

    /// Array element, with the array and index on the stack
    Indexed(TypeCode),

    /// `this` or `super`
    SelfRef { is_super: bool },

    Local { reg: usize, tc: TypeCode },

    /// Static field or method
    Static(MemberRef),

    /// Instance field or method, with the receiver on the stack
    ///
    /// Non-virtual methods get called with `invokespecial`.
    Member { member: MemberRef, nonvirtual: bool },

    /// Constant not yet pushed
    Immediate { value: ConstValue, tc: TypeCode },

    /// Result of an assignment to the inner item, with the new value on the stack
    Assign(Box<Item>),

    Cond(CondItem),
}

/// Translation of item operations into instructions
pub struct Items<'a, 'g> {
    pub code: &'a mut Code<'g>,
    pub pool: &'a mut Pool,
}

fn is_positive_zero_f32(value: f32) -> bool {
    value == 0.0 && value.is_sign_positive()
}

fn is_positive_zero_f64(value: f64) -> bool {
    value == 0.0 && value.is_sign_positive()
}

impl Item {
    pub fn type_code(&self, graph: &ClassGraph) -> TypeCode {
        match self {
            Item::Stack(tc) | Item::Indexed(tc) | Item::Local { tc, .. } => *tc,
            Item::Immediate { tc, .. } => *tc,
            Item::SelfRef { .. } => TypeCode::Object,
            Item::Static(member) | Item::Member { member, .. } => member.type_code(graph),
            Item::Assign(lhs) => lhs.type_code(graph),
            Item::Cond(_) => TypeCode::Byte,
        }
    }

    /// Number of stack slots the item's address takes up (and which `stash` has to dig under)
    pub fn width(&self, graph: &ClassGraph) -> usize {
        match self {
            Item::Stack(tc) => tc.width(),
            Item::Indexed(_) => 2,
            Item::Member { .. } => 1,
            Item::Assign(lhs) => lhs.width(graph) + lhs.type_code(graph).width(),
            _ => 0,
        }
    }
}

impl<'a, 'g> Items<'a, 'g> {
    pub fn new(code: &'a mut Code<'g>, pool: &'a mut Pool) -> Items<'a, 'g> {
        Items { code, pool }
    }

    fn graph(&self) -> &'g ClassGraph {
        self.code.graph()
    }

    fn unsupported(item: &Item, operation: &str) -> Error {
        Error::MalformedTree(format!("cannot {} {:?}", operation, item))
    }

    /// Push the item's value
    pub fn load(&mut self, item: Item) -> Result<Item, Error> {
        let graph = self.graph();
        let tc = item.type_code(graph);
        match item {
            Item::Stack(_) => return Ok(item),
            Item::Indexed(tc) => self.code.emitop0(IALOAD + tc.offset())?,
            Item::SelfRef { .. } => self.code.emitop0(ALOAD_0)?,
            Item::Local { reg, tc } => {
                let family = tc.truncate().offset();
                if reg <= 3 {
                    self.code.emitop0(ILOAD_0 + family * 4 + reg as u8)?;
                } else {
                    self.code.emitop1w(ILOAD + family, reg)?;
                }
            }
            Item::Static(MemberRef {
                member: Member::Field(field),
                qualifier,
            }) => {
                let index = self.pool.put_field(graph, field, qualifier)?;
                self.code.emit_field(GETSTATIC, index, &graph.field(field).ty)?;
            }
            Item::Member {
                member:
                    MemberRef {
                        member: Member::Field(field),
                        qualifier,
                    },
                ..
            } => {
                let index = self.pool.put_field(graph, field, qualifier)?;
                self.code.emit_field(GETFIELD, index, &graph.field(field).ty)?;
            }
            Item::Immediate { ref value, tc } => self.load_constant(value, tc)?,
            Item::Assign(lhs) => {
                self.stash(&lhs, tc)?;
                self.store(*lhs)?;
            }
            Item::Cond(ref cond) => cond.load(self.code)?,
            Item::Static(_) | Item::Member { .. } => return Err(Items::unsupported(&item, "load")),
        }
        Ok(Item::Stack(tc))
    }

    fn load_constant(&mut self, value: &ConstValue, tc: TypeCode) -> Result<(), Error> {
        match (value, tc.truncate()) {
            (ConstValue::Int(i), TypeCode::Int) => {
                let i = *i;
                if (-1..=5).contains(&i) {
                    self.code.emitop0((ICONST_0 as i32 + i) as u8)?;
                } else if let Ok(byte) = i8::try_from(i) {
                    self.code.emit_bipush(byte)?;
                } else if let Ok(short) = i16::try_from(i) {
                    self.code.emit_sipush(short)?;
                } else {
                    self.ldc(value, Type::INT)?;
                }
            }
            (ConstValue::Long(l), _) => match l {
                0 => self.code.emitop0(LCONST_0)?,
                1 => self.code.emitop0(LCONST_1)?,
                _ => self.ldc(value, Type::LONG)?,
            },
            (ConstValue::Float(f), _) => {
                if is_positive_zero_f32(*f) || *f == 1.0 || *f == 2.0 {
                    self.code.emitop0(FCONST_0 + *f as u8)?;
                } else {
                    self.ldc(value, Type::FLOAT)?;
                }
            }
            (ConstValue::Double(d), _) => {
                if is_positive_zero_f64(*d) || *d == 1.0 {
                    self.code.emitop0(DCONST_0 + *d as u8)?;
                } else {
                    self.ldc(value, Type::DOUBLE)?;
                }
            }
            (ConstValue::String(_), _) => {
                let string = self.code.graph().lookup_class("java/lang/String");
                let pushed = string.map(Type::Object).unwrap_or(Type::Null);
                self.ldc(value, pushed)?;
            }
            (value, tc) => {
                return Err(Error::MalformedTree(format!(
                    "constant {:?} does not have type code {:?}",
                    value, tc
                )))
            }
        }
        Ok(())
    }

    fn ldc(&mut self, value: &ConstValue, pushed: Type) -> Result<(), Error> {
        let index = self.pool.put_constant(value)?;
        self.code.emit_ldc(index, pushed)?;
        Ok(())
    }

    /// Pop the top of the stack into the item
    pub fn store(&mut self, item: Item) -> Result<(), Error> {
        let graph = self.graph();
        match item {
            Item::Indexed(tc) => self.code.emitop0(IASTORE + tc.offset())?,
            Item::Local { reg, tc } => {
                let family = tc.truncate().offset();
                if reg <= 3 {
                    self.code.emitop0(ISTORE_0 + family * 4 + reg as u8)?;
                } else {
                    self.code.emitop1w(ISTORE + family, reg)?;
                }
                self.code.set_defined(reg);
            }
            Item::Static(MemberRef {
                member: Member::Field(field),
                qualifier,
            }) => {
                let index = self.pool.put_field(graph, field, qualifier)?;
                self.code.emit_field(PUTSTATIC, index, &graph.field(field).ty)?;
            }
            Item::Member {
                member:
                    MemberRef {
                        member: Member::Field(field),
                        qualifier,
                    },
                ..
            } => {
                let index = self.pool.put_field(graph, field, qualifier)?;
                self.code.emit_field(PUTFIELD, index, &graph.field(field).ty)?;
            }
            other => return Err(Items::unsupported(&other, "store to")),
        }
        Ok(())
    }

    /// Call the method the item stands for (arguments are already on the stack)
    pub fn invoke(&mut self, item: Item) -> Result<Item, Error> {
        let graph = self.graph();
        let (method, qualifier, op) = match item {
            Item::Static(MemberRef {
                member: Member::Method(method),
                qualifier,
            }) => (method, qualifier, INVOKESTATIC),
            Item::Member {
                member:
                    MemberRef {
                        member: Member::Method(method),
                        qualifier,
                    },
                nonvirtual,
            } => {
                let op = if graph.class(qualifier).is_interface() {
                    INVOKEINTERFACE
                } else if nonvirtual {
                    INVOKESPECIAL
                } else {
                    INVOKEVIRTUAL
                };
                (method, qualifier, op)
            }
            other => return Err(Items::unsupported(&other, "invoke")),
        };
        let index = self.pool.put_method(graph, method, qualifier)?;
        self.code.emit_invoke(op, index, method)?;
        Ok(Item::Stack(graph.method(method).ret.type_code()))
    }

    /// Duplicate the item's address on the stack
    pub fn duplicate(&mut self, item: &Item) -> Result<(), Error> {
        match item {
            Item::Stack(tc) => match tc.width() {
                2 => self.code.emitop0(DUP2)?,
                1 => self.code.emitop0(DUP)?,
                _ => (),
            },
            Item::Indexed(_) => self.code.emitop0(DUP2)?,
            Item::Member { .. } => self.code.emitop0(DUP)?,
            Item::Assign(_) | Item::Cond(_) => {
                let loaded = self.load(item.clone())?;
                self.duplicate(&loaded)?;
            }
            _ => (),
        }
        Ok(())
    }

    /// Discard the item's address (or value) from the stack
    pub fn drop(&mut self, item: Item) -> Result<(), Error> {
        match item {
            Item::Stack(tc) => match tc.width() {
                2 => self.code.emitop0(POP2)?,
                1 => self.code.emitop0(POP)?,
                _ => (),
            },
            Item::Indexed(_) => self.code.emitop0(POP2)?,
            Item::Member { .. } => self.code.emitop0(POP)?,
            Item::Assign(lhs) => self.store(*lhs)?,
            Item::Cond(_) => {
                let loaded = self.load(item)?;
                self.drop(loaded)?;
            }
            _ => (),
        }
        Ok(())
    }

    /// Copy the value on top of the stack (of type code `toscode`) underneath the item's address
    pub fn stash(&mut self, item: &Item, toscode: TypeCode) -> Result<(), Error> {
        let graph = self.graph();
        let value_width = toscode.width() as u8;
        match item {
            Item::Stack(_) | Item::Indexed(_) | Item::Member { .. } => {
                let base = if item.width(graph) == 2 { DUP_X2 } else { DUP_X1 };
                self.code.emitop0(base + 3 * (value_width - 1))?;
            }
            Item::Assign(_) | Item::Cond(_) => return Err(Items::unsupported(item, "stash under")),
            _ => self.duplicate(&Item::Stack(toscode))?,
        }
        Ok(())
    }

    /// Convert the item to the given type code, loading it unless it is a constant
    pub fn coerce(&mut self, item: Item, target: TypeCode) -> Result<Item, Error> {
        let graph = self.graph();
        let tc = item.type_code(graph);
        if tc == target || target == TypeCode::Void || target == TypeCode::Object || tc == TypeCode::Object
        {
            return Ok(item);
        }
        if let Item::Immediate { value, tc } = &item {
            if tc.truncate() == TypeCode::Int && target == TypeCode::Int {
                return Ok(item);
            }
            return Ok(Item::Immediate {
                value: value.convert(target),
                tc: target,
            });
        }

        self.load(item)?;
        let from = tc.truncate();
        let to = target.truncate();
        if from != to {
            let offset = if to > from { to.offset() - 1 } else { to.offset() };
            self.code.emitop0(I2L + from.offset() * 3 + offset)?;
        }
        if target != to {
            self.code.emitop0(I2B + target.offset() - TypeCode::Byte.offset())?;
        }
        Ok(Item::Stack(target))
    }

    pub fn coerce_to(&mut self, item: Item, ty: &Type) -> Result<Item, Error> {
        self.coerce(item, ty.type_code())
    }

    /// Test the item as a boolean
    pub fn mk_cond(&mut self, item: Item) -> Result<CondItem, Error> {
        match item {
            Item::Cond(cond) => Ok(cond),
            Item::Immediate {
                value: ConstValue::Int(value),
                ..
            } => Ok(CondItem::new(if value != 0 { GOTO } else { DONTGOTO })),
            other => {
                self.load(other)?;
                Ok(CondItem::new(IFNE))
            }
        }
    }

    /// Add a constant to an `int` local in place
    ///
    /// Sub-int locals and increments outside 16 bits go through the stack, to get truncated.
    pub fn incr(&mut self, reg: usize, tc: TypeCode, x: i32) -> Result<(), Error> {
        match i16::try_from(x) {
            Ok(x) if tc == TypeCode::Int => {
                self.code.emit_iinc(reg, x)?;
            }
            _ => {
                let local = Item::Local { reg, tc };
                self.load(local.clone())?;
                if x >= 0 {
                    self.load(Item::Immediate {
                        value: ConstValue::Int(x),
                        tc: TypeCode::Int,
                    })?;
                    self.code.emitop0(IADD)?;
                } else {
                    self.load(Item::Immediate {
                        value: ConstValue::Int(x.wrapping_neg()),
                        tc: TypeCode::Int,
                    })?;
                    self.code.emitop0(ISUB)?;
                }
                let narrowed = self.coerce(Item::Stack(TypeCode::Int), tc)?;
                self.load(narrowed)?;
                self.store(local)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{CodeOptions, StackMapFormat};
    use crate::jvm::{ClassSymbol, Flags, MethodSymbol};

    fn options() -> CodeOptions {
        CodeOptions {
            fat_code: false,
            line_debug_info: false,
            var_debug_info: false,
            stack_map: StackMapFormat::Jsr202,
        }
    }

    fn method(graph: &mut ClassGraph, params: Vec<Type>) -> MethodId {
        let java = graph.insert_java_library_types();
        let class = graph.add_class(ClassSymbol::new("p/C", Flags::PUBLIC, Some(java.object)));
        graph.add_method(MethodSymbol::new("m", class, Flags::STATIC, params, Type::Void))
    }

    #[test]
    fn constants_pick_the_shortest_push() {
        let mut graph = ClassGraph::new();
        let method = method(&mut graph, vec![]);
        let mut pool = Pool::new();
        let mut code = Code::new(&graph, method, options());
        code.method_entry().unwrap();

        let mut items = Items::new(&mut code, &mut pool);
        for value in [3, -1, 100, -200, 40000] {
            let item = Item::Immediate {
                value: ConstValue::Int(value),
                tc: TypeCode::Int,
            };
            let loaded = items.load(item).unwrap();
            items.drop(loaded).unwrap();
        }
        let loaded = items
            .load(Item::Immediate {
                value: ConstValue::Long(1),
                tc: TypeCode::Long,
            })
            .unwrap();
        items.drop(loaded).unwrap();

        let finished = code.finish();
        assert_eq!(
            finished.bytes,
            vec![
                ICONST_3, POP, ICONST_M1, POP, BIPUSH, 100, POP, SIPUSH, 0xFF, 0x38, POP, LDC, 1,
                POP, LCONST_1, POP2
            ]
        );
    }

    #[test]
    fn coercions_widen_and_narrow() {
        let mut graph = ClassGraph::new();
        let method = method(&mut graph, vec![Type::INT]);
        let mut pool = Pool::new();
        let mut code = Code::new(&graph, method, options());
        let reg = code.new_local_var("x", Type::INT, None, false).unwrap();
        code.set_defined(reg);
        code.method_entry().unwrap();

        let mut items = Items::new(&mut code, &mut pool);
        let local = Item::Local { reg, tc: TypeCode::Int };
        let widened = items.coerce(local.clone(), TypeCode::Double).unwrap();
        items.drop(widened).unwrap();
        let narrowed = items.coerce(local, TypeCode::Char).unwrap();
        items.drop(narrowed).unwrap();

        let constant = Item::Immediate {
            value: ConstValue::Int(300),
            tc: TypeCode::Int,
        };
        match items.coerce(constant, TypeCode::Byte).unwrap() {
            Item::Immediate { value, tc } => {
                assert_eq!(value, ConstValue::Int(44));
                assert_eq!(tc, TypeCode::Byte);
            }
            other => panic!("constant should stay immediate, got {:?}", other),
        }

        let finished = code.finish();
        assert_eq!(finished.bytes, vec![ILOAD_0, I2D, POP2, ILOAD_0, I2C, POP]);
    }

    #[test]
    fn increments_use_iinc_when_possible() {
        let mut graph = ClassGraph::new();
        let method = method(&mut graph, vec![]);
        let mut pool = Pool::new();
        let mut code = Code::new(&graph, method, options());
        let int = code.new_local_var("i", Type::INT, None, false).unwrap();
        let byte = code.new_local_var("b", Type::BYTE, None, false).unwrap();
        code.set_defined(int);
        code.set_defined(byte);
        code.method_entry().unwrap();

        let mut items = Items::new(&mut code, &mut pool);
        items.incr(int, TypeCode::Int, 5).unwrap();
        items.incr(int, TypeCode::Int, -300).unwrap();
        items.incr(byte, TypeCode::Byte, 1).unwrap();

        let finished = code.finish();
        assert_eq!(
            finished.bytes,
            vec![
                IINC, 0, 5, WIDE, IINC, 0, 0, 0xFE, 0xD4, ILOAD_1, ICONST_1, IADD, I2B, ISTORE_1
            ]
        );
    }

    #[test]
    fn conditions_materialize_as_zero_or_one() {
        let mut graph = ClassGraph::new();
        let method = method(&mut graph, vec![]);
        let mut pool = Pool::new();
        let mut code = Code::new(&graph, method, options());
        code.method_entry().unwrap();

        let mut items = Items::new(&mut code, &mut pool);
        items.code.emitop0(ICONST_1).unwrap();
        let loaded = items.load(Item::Cond(CondItem::new(IFNE))).unwrap();
        items.drop(loaded).unwrap();
        items.code.emitop0(RETURN).unwrap();

        let finished = code.finish();
        assert_eq!(
            finished.bytes,
            vec![ICONST_1, IFEQ, 0, 7, ICONST_1, GOTO, 0, 4, ICONST_0, POP, RETURN]
        );
    }
}

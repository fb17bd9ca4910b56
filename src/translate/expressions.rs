//! Expressions
//!
//! Every expression translates to an [`Item`], which the caller then loads, stores into,
//! invokes, or branches on. Boolean expressions in conditions go through [`gen_cond`] instead,
//! which avoids materializing `0`/`1` on the stack.
//!
//! [`gen_cond`]: MethodTranslator::gen_cond

use super::items::{CondItem, Item, MemberRef};
use super::method::{MethodTranslator, MAX_DIMENSIONS};
use super::{Error, LimitKind};
use crate::jvm::code::merge_chains;
use crate::jvm::opcodes::*;
use crate::jvm::{
    ClassId, ConstValue, FieldId, Flags, MethodId, StringBuilderMembers, Type, TypeCode,
};
use crate::tree::{BinaryOp, Expr, ExprKind, Pos, Receiver, UnaryOp};

impl<'a, 'g, 't> MethodTranslator<'a, 'g, 't> {
    /// Translate an expression, converted to the expected type `pt`
    pub(super) fn gen_expr(&mut self, expr: &'t Expr, pt: &Type) -> Result<Item, Error> {
        let item = match &expr.constant {
            Some(value) => {
                self.check_string_constant(expr.pos, Some(value));
                Item::Immediate {
                    value: value.clone(),
                    tc: expr.ty.type_code(),
                }
            }
            None => self.gen_expr_kind(expr, pt)?,
        };
        self.items().coerce_to(item, pt)
    }

    /// Translate a boolean expression into pending jumps
    pub(super) fn gen_cond(&mut self, expr: &'t Expr) -> Result<CondItem, Error> {
        if let (
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            },
            None,
        ) = (&expr.kind, &expr.constant)
        {
            let c = self.gen_cond(cond)?;
            if c.is_true() {
                self.code.resolve(c.true_jumps)?;
                return self.gen_cond(then);
            }
            if c.is_false() {
                self.code.resolve(c.false_jumps)?;
                return self.gen_cond(otherwise);
            }
            let second_jumps = c.jump_false(&mut self.code)?;
            self.code.resolve(c.true_jumps)?;
            let first = self.gen_cond(then)?;
            let false_jumps = first.jump_false(&mut self.code)?;
            self.code.resolve(first.true_jumps)?;
            let true_jumps = self.code.branch(GOTO)?;
            self.code.resolve(second_jumps)?;
            let second = self.gen_cond(otherwise)?;
            return Ok(CondItem::with_jumps(
                second.opcode,
                merge_chains(true_jumps, second.true_jumps)?,
                merge_chains(false_jumps, second.false_jumps)?,
            ));
        }
        let item = self.gen_expr(expr, &Type::BOOLEAN)?;
        self.items().mk_cond(item)
    }

    fn gen_expr_kind(&mut self, expr: &'t Expr, pt: &Type) -> Result<Item, Error> {
        match &expr.kind {
            ExprKind::Literal(value) => Ok(Item::Immediate {
                value: value.clone(),
                tc: expr.ty.type_code(),
            }),
            ExprKind::Null => {
                self.code.emitop0(ACONST_NULL)?;
                if pt.dimensions() > 1 {
                    let index = self.make_ref(expr.pos, pt)?;
                    self.code.emit_checkcast(index, pt.clone())?;
                }
                Ok(Item::Stack(TypeCode::Object))
            }
            ExprKind::This => Ok(Item::SelfRef { is_super: false }),
            ExprKind::Local(var) => Ok(Item::Local {
                reg: self.local_reg(*var)?,
                tc: expr.ty.type_code(),
            }),
            ExprKind::Field { receiver, field } => self.gen_field(receiver, *field),
            ExprKind::Call {
                receiver,
                method,
                args,
            } => {
                let callee = self.gen_method_ref(receiver, *method)?;
                let params = self.graph.external_params(*method);
                self.gen_args(args, &params)?;
                self.items().invoke(callee)
            }
            ExprKind::New { class, ctor, args } => {
                let index = self.make_ref(expr.pos, &Type::Object(*class))?;
                self.code.emit_new(index, *class)?;
                self.code.emitop0(DUP)?;
                let params = self.graph.external_params(*ctor);
                self.gen_args(args, &params)?;
                self.items().invoke(Item::Member {
                    member: MemberRef::method(*ctor, *class),
                    nonvirtual: true,
                })?;
                Ok(Item::Stack(TypeCode::Object))
            }
            ExprKind::NewArray { dims, elems } => self.gen_new_array(expr, dims, elems.as_deref()),
            ExprKind::Assign { target, value } => {
                let lhs = self.gen_expr(target, &target.ty)?;
                let value = self.gen_expr(value, &target.ty)?;
                self.items().load(value)?;
                Ok(Item::Assign(Box::new(lhs)))
            }
            ExprKind::AssignOp {
                op,
                operand,
                target,
                value,
            } => self.gen_assign_op(expr, *op, operand, target, value),
            ExprKind::Binary {
                op,
                operand,
                lhs,
                rhs,
            } => self.gen_binary(expr, *op, operand, lhs, rhs),
            ExprKind::Unary { op, arg } => self.gen_unary(expr, *op, arg),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                let c = self.gen_cond(cond)?;
                let else_chain = c.jump_false(&mut self.code)?;
                let mut then_exit = None;
                if !c.is_false() {
                    self.code.resolve(c.true_jumps.clone())?;
                    let value = self.gen_expr(then, pt)?;
                    self.items().load(value)?;
                    self.code.force_stack_top(expr.ty.clone());
                    then_exit = self.code.branch(GOTO)?;
                }
                if else_chain.is_some() {
                    self.code.resolve(else_chain)?;
                    let value = self.gen_expr(otherwise, pt)?;
                    self.items().load(value)?;
                    self.code.force_stack_top(expr.ty.clone());
                }
                self.code.resolve(then_exit)?;
                Ok(Item::Stack(pt.type_code()))
            }
            ExprKind::Cast(inner) => {
                let value = self.gen_expr(inner, &expr.ty)?;
                let loaded = self.items().load(value)?;
                if expr.ty.is_reference() && !self.graph.is_subtype(&inner.ty, &expr.ty) {
                    let index = self.make_ref(expr.pos, &expr.ty)?;
                    self.code.emit_checkcast(index, expr.ty.clone())?;
                }
                Ok(loaded)
            }
            ExprKind::InstanceOf { expr: tested, target } => {
                let value = self.gen_expr(tested, &tested.ty)?;
                self.items().load(value)?;
                let index = self.make_ref(expr.pos, target)?;
                self.code.emit_instanceof(index)?;
                Ok(Item::Stack(TypeCode::Byte))
            }
            ExprKind::Index { array, index } => {
                let array_item = self.gen_expr(array, &array.ty)?;
                self.items().load(array_item)?;
                let index_item = self.gen_expr(index, &Type::INT)?;
                self.items().load(index_item)?;
                Ok(Item::Indexed(expr.ty.type_code()))
            }
            ExprKind::ArrayLength(array) => {
                let array_item = self.gen_expr(array, &array.ty)?;
                self.items().load(array_item)?;
                self.code.emitop0(ARRAYLENGTH)?;
                Ok(Item::Stack(TypeCode::Int))
            }
            ExprKind::ClassLiteral(ty) => {
                if !self.settings.target.has_class_literals() {
                    return Err(Error::MalformedTree(
                        "class literals must be lowered for this target".to_owned(),
                    ));
                }
                if !ty.is_reference() {
                    return Err(Error::MalformedTree(format!(
                        "class literal of {:?} must be lowered to a TYPE field",
                        ty
                    )));
                }
                let index = self.make_ref(expr.pos, ty)?;
                self.code.emit_ldc(index.into(), Type::Object(self.java.class))?;
                Ok(Item::Stack(TypeCode::Object))
            }
        }
    }

    /// Load arguments, converted to the parameter types of the callee
    fn gen_args(&mut self, args: &'t [Expr], params: &[Type]) -> Result<(), Error> {
        if args.len() != params.len() {
            return Err(Error::MalformedTree(format!(
                "{} arguments passed for {} parameters",
                args.len(),
                params.len()
            )));
        }
        for (arg, param) in args.iter().zip(params) {
            let value = self.gen_expr(arg, param)?;
            self.items().load(value)?;
        }
        Ok(())
    }

    /// Class to name in the pool for a member accessed through `site`
    ///
    /// Members are qualified by the class they are accessed through, so that binary compatible
    /// changes to the class hierarchy do not break the reference. Members of `Object` and
    /// synthetic static members keep their owner.
    fn binary_qualifier(&self, owner: ClassId, flags: Flags, site: &Type) -> ClassId {
        match site {
            Type::Object(site)
                if *site != owner
                    && !(flags.is_static() && flags.contains(Flags::SYNTHETIC))
                    && !self.graph.is_object(owner) =>
            {
                *site
            }
            _ => owner,
        }
    }

    fn superclass(&self) -> Result<ClassId, Error> {
        let this_class = self.code.this_class();
        self.graph.class(this_class).superclass.ok_or_else(|| {
            Error::MalformedTree(format!("{} has no superclass", self.graph.class(this_class).name))
        })
    }

    fn gen_field(&mut self, receiver: &'t Receiver, field: FieldId) -> Result<Item, Error> {
        let graph = self.graph;
        let data = graph.field(field);
        let is_static = data.flags.is_static();
        let nonvirtual = data.flags.is_private();
        let this_class = self.code.this_class();

        match receiver {
            Receiver::Implicit => {
                let qualifier = self.binary_qualifier(data.owner, data.flags, &Type::Object(this_class));
                let member = MemberRef::field(field, qualifier);
                if is_static {
                    Ok(Item::Static(member))
                } else {
                    self.items().load(Item::SelfRef { is_super: false })?;
                    Ok(Item::Member { member, nonvirtual })
                }
            }
            Receiver::Super => {
                let site = Type::Object(self.superclass()?);
                let member = MemberRef::field(field, self.binary_qualifier(data.owner, data.flags, &site));
                if is_static {
                    Ok(Item::Static(member))
                } else {
                    self.items().load(Item::SelfRef { is_super: true })?;
                    Ok(Item::Member {
                        member,
                        nonvirtual: true,
                    })
                }
            }
            Receiver::Class(class) => {
                if !is_static {
                    return Err(Error::MalformedTree(format!(
                        "instance field {} selected through a type",
                        data.name
                    )));
                }
                let qualifier = self.binary_qualifier(data.owner, data.flags, &Type::Object(*class));
                Ok(Item::Static(MemberRef::field(field, qualifier)))
            }
            Receiver::Expr(base) => {
                let base_item = self.gen_expr(base, &base.ty)?;
                let qualifier = self.binary_qualifier(data.owner, data.flags, &base.ty);
                let member = MemberRef::field(field, qualifier);

                if let Some(value) = &data.constant {
                    // Still evaluate the receiver, and null check it for an instance field
                    let loaded = self.items().load(base_item)?;
                    if is_static {
                        self.items().drop(loaded)?;
                    } else {
                        self.gen_null_check()?;
                    }
                    return Ok(Item::Immediate {
                        value: value.clone(),
                        tc: data.ty.type_code(),
                    });
                }

                let loaded = self.items().load(base_item)?;
                if is_static {
                    self.items().drop(loaded)?;
                    Ok(Item::Static(member))
                } else {
                    Ok(Item::Member { member, nonvirtual })
                }
            }
        }
    }

    /// Callee of a method call, with the receiver (if any) already on the stack
    fn gen_method_ref(&mut self, receiver: &'t Receiver, method: MethodId) -> Result<Item, Error> {
        let graph = self.graph;
        let data = graph.method(method);
        let this_class = self.code.this_class();

        if data.is_constructor() {
            // `this(...)` or `super(...)`
            self.items().load(Item::SelfRef {
                is_super: matches!(receiver, Receiver::Super),
            })?;
            return Ok(Item::Member {
                member: MemberRef::method(method, data.owner),
                nonvirtual: true,
            });
        }

        let is_static = data.is_static();
        let nonvirtual = data.flags.is_private();
        match receiver {
            Receiver::Implicit => {
                let qualifier = self.binary_qualifier(data.owner, data.flags, &Type::Object(this_class));
                let member = MemberRef::method(method, qualifier);
                if is_static {
                    Ok(Item::Static(member))
                } else {
                    self.items().load(Item::SelfRef { is_super: false })?;
                    Ok(Item::Member { member, nonvirtual })
                }
            }
            Receiver::Super => {
                let site = Type::Object(self.superclass()?);
                let member = MemberRef::method(method, self.binary_qualifier(data.owner, data.flags, &site));
                if is_static {
                    Ok(Item::Static(member))
                } else {
                    self.items().load(Item::SelfRef { is_super: true })?;
                    Ok(Item::Member {
                        member,
                        nonvirtual: true,
                    })
                }
            }
            Receiver::Class(class) => {
                if !is_static {
                    return Err(Error::MalformedTree(format!(
                        "instance method {} called through a type",
                        data.name
                    )));
                }
                let qualifier = self.binary_qualifier(data.owner, data.flags, &Type::Object(*class));
                Ok(Item::Static(MemberRef::method(method, qualifier)))
            }
            Receiver::Expr(base) => {
                let base_item = self.gen_expr(base, &base.ty)?;
                let qualifier = self.binary_qualifier(data.owner, data.flags, &base.ty);
                let member = MemberRef::method(method, qualifier);
                let loaded = self.items().load(base_item)?;
                if is_static {
                    self.items().drop(loaded)?;
                    Ok(Item::Static(member))
                } else {
                    Ok(Item::Member { member, nonvirtual })
                }
            }
        }
    }

    /// Throw a `NullPointerException` if the reference on top of the stack is `null`, popping it
    fn gen_null_check(&mut self) -> Result<(), Error> {
        let get_class = self.java.get_class;
        let object = self.java.object;
        self.items().invoke(Item::Member {
            member: MemberRef::method(get_class, object),
            nonvirtual: false,
        })?;
        self.code.emitop0(POP)?;
        Ok(())
    }

    fn gen_new_array(&mut self, expr: &'t Expr, dims: &'t [Expr], elems: Option<&'t [Expr]>) -> Result<Item, Error> {
        match elems {
            Some(elems) => {
                let elem_ty = expr
                    .ty
                    .elem_type()
                    .cloned()
                    .ok_or_else(|| Error::MalformedTree(format!("array initializer of type {:?}", expr.ty)))?;
                self.items().load(int_constant(elems.len() as i32))?;
                let array = self.make_new_array(expr.pos, &expr.ty, 1)?;
                for (i, elem) in elems.iter().enumerate() {
                    self.items().duplicate(&array)?;
                    self.items().load(int_constant(i as i32))?;
                    let value = self.gen_expr(elem, &elem_ty)?;
                    self.items().load(value)?;
                    self.items().store(Item::Indexed(elem_ty.type_code()))?;
                }
                Ok(array)
            }
            None => {
                for dim in dims {
                    let value = self.gen_expr(dim, &Type::INT)?;
                    self.items().load(value)?;
                }
                self.make_new_array(expr.pos, &expr.ty, dims.len())
            }
        }
    }

    /// Allocate an array of type `ty`, with the lengths of its first `ndims` dimensions on the
    /// stack
    fn make_new_array(&mut self, pos: Pos, ty: &Type, ndims: usize) -> Result<Item, Error> {
        let elem = ty
            .elem_type()
            .ok_or_else(|| Error::MalformedTree(format!("cannot allocate {:?} as an array", ty)))?;
        if ty.dimensions() > MAX_DIMENSIONS {
            self.report(pos, LimitKind::Dimensions);
        }
        let elem_code = elem.array_code();
        if elem_code == 0 || (elem_code == 1 && ndims == 1) {
            let index = self.make_ref(pos, elem)?;
            self.code.emit_anewarray(index, ty.clone())?;
        } else if elem_code == 1 {
            let index = self.make_ref(pos, ty)?;
            self.code.emit_multianewarray(ndims as u8, index, ty.clone())?;
        } else {
            self.code.emit_newarray(elem_code, ty.clone())?;
        }
        Ok(Item::Stack(TypeCode::Object))
    }

    /* String concatenation */

    fn string_builder(&self) -> &'a StringBuilderMembers {
        if self.settings.target.has_string_builder() {
            &self.java.string_builder
        } else {
            &self.java.string_buffer
        }
    }

    fn make_string_builder(&mut self, pos: Pos) -> Result<(), Error> {
        let builder = self.string_builder();
        let index = self.make_ref(pos, &Type::Object(builder.class))?;
        self.code.emit_new(index, builder.class)?;
        self.code.emitop0(DUP)?;
        self.items().invoke(Item::Member {
            member: MemberRef::method(builder.init, builder.class),
            nonvirtual: true,
        })?;
        Ok(())
    }

    /// Append the value of type `ty` on top of the stack to the builder under it
    fn append_string(&mut self, ty: &Type) -> Result<(), Error> {
        let builder = self.string_builder();
        let append = builder.append_for(ty, self.java.string);
        self.items().invoke(Item::Member {
            member: MemberRef::method(append, builder.class),
            nonvirtual: false,
        })?;
        Ok(())
    }

    /// Append every operand of a (possibly nested) string concatenation
    fn append_strings(&mut self, expr: &'t Expr) -> Result<(), Error> {
        if let (
            ExprKind::Binary {
                op: BinaryOp::Add,
                operand,
                lhs,
                rhs,
            },
            None,
        ) = (&expr.kind, &expr.constant)
        {
            if *operand == Type::Object(self.java.string) {
                self.append_strings(lhs)?;
                self.append_strings(rhs)?;
                return Ok(());
            }
        }
        let value = self.gen_expr(expr, &expr.ty)?;
        self.items().load(value)?;
        self.append_string(&expr.ty)
    }

    fn builder_to_string(&mut self) -> Result<(), Error> {
        let builder = self.string_builder();
        self.items().invoke(Item::Member {
            member: MemberRef::method(builder.to_string, builder.class),
            nonvirtual: false,
        })?;
        Ok(())
    }

    /* Operators */

    fn gen_assign_op(
        &mut self,
        expr: &Expr,
        op: BinaryOp,
        operand: &Type,
        target: &'t Expr,
        value: &'t Expr,
    ) -> Result<Item, Error> {
        let graph = self.graph;
        if op == BinaryOp::Add && *operand == Type::Object(self.java.string) {
            self.make_string_builder(expr.pos)?;
            let lhs = self.gen_expr(target, &target.ty)?;
            let width = lhs.width(graph);
            if width > 0 {
                self.code.emitop0(DUP_X1 + 3 * (width as u8 - 1))?;
            }
            self.items().load(lhs.clone())?;
            self.append_string(&target.ty)?;
            self.append_strings(value)?;
            self.builder_to_string()?;
            return Ok(Item::Assign(Box::new(lhs)));
        }

        let lhs = self.gen_expr(target, &target.ty)?;
        if let (BinaryOp::Add | BinaryOp::Sub, Item::Local { reg, tc }, Some(ConstValue::Int(increment))) =
            (op, &lhs, &value.constant)
        {
            if is_int_or_narrower(&target.ty) && is_int_or_narrower(&value.ty) {
                let increment = if op == BinaryOp::Sub {
                    increment.wrapping_neg()
                } else {
                    *increment
                };
                self.items().incr(*reg, *tc, increment)?;
                return Ok(lhs);
            }
        }

        self.items().duplicate(&lhs)?;
        let current = self.items().coerce_to(lhs.clone(), operand)?;
        self.items().load(current)?;
        let result = self.complete_binop(op, operand, operand, value)?;
        self.items().coerce_to(result, &target.ty)?;
        Ok(Item::Assign(Box::new(lhs)))
    }

    fn gen_binary(
        &mut self,
        expr: &'t Expr,
        op: BinaryOp,
        operand: &Type,
        lhs: &'t Expr,
        rhs: &'t Expr,
    ) -> Result<Item, Error> {
        match op {
            BinaryOp::Add if *operand == Type::Object(self.java.string) => {
                self.make_string_builder(expr.pos)?;
                self.append_strings(expr)?;
                self.builder_to_string()?;
                Ok(Item::Stack(TypeCode::Object))
            }
            BinaryOp::CondAnd => {
                let lcond = self.gen_cond(lhs)?;
                if lcond.is_false() {
                    return Ok(Item::Cond(lcond));
                }
                let false_jumps = lcond.jump_false(&mut self.code)?;
                self.code.resolve(lcond.true_jumps)?;
                let rcond = self.gen_cond(rhs)?;
                Ok(Item::Cond(CondItem::with_jumps(
                    rcond.opcode,
                    rcond.true_jumps,
                    merge_chains(false_jumps, rcond.false_jumps)?,
                )))
            }
            BinaryOp::CondOr => {
                let lcond = self.gen_cond(lhs)?;
                if lcond.is_true() {
                    return Ok(Item::Cond(lcond));
                }
                let true_jumps = lcond.jump_true(&mut self.code)?;
                self.code.resolve(lcond.false_jumps)?;
                let rcond = self.gen_cond(rhs)?;
                Ok(Item::Cond(CondItem::with_jumps(
                    rcond.opcode,
                    merge_chains(true_jumps, rcond.true_jumps)?,
                    rcond.false_jumps,
                )))
            }
            _ => {
                let value = self.gen_expr(lhs, operand)?;
                self.items().load(value)?;
                self.complete_binop(op, operand, &expr.ty, rhs)
            }
        }
    }

    /// Load the right operand and apply a binary operator to both operands
    ///
    /// Comparisons produce a condition rather than a value.
    fn complete_binop(&mut self, op: BinaryOp, operand: &Type, result: &Type, rhs: &'t Expr) -> Result<Item, Error> {
        let family = operand.type_code().truncate();
        if op.is_comparison() {
            let cond = comparison_index(op);
            let opcode = match family {
                TypeCode::Int => {
                    if rhs.constant.as_ref().map_or(false, ConstValue::is_int_zero) {
                        IFEQ + cond
                    } else {
                        self.load_operand(rhs, operand)?;
                        IF_ICMPEQ + cond
                    }
                }
                TypeCode::Object => {
                    let opcode = match op {
                        BinaryOp::Eq => IF_ACMPEQ,
                        BinaryOp::Ne => IF_ACMPNE,
                        _ => return Err(unsupported_operator(op, operand)),
                    };
                    if matches!(rhs.kind, ExprKind::Null) {
                        if opcode == IF_ACMPEQ {
                            IFNULL
                        } else {
                            IFNONNULL
                        }
                    } else {
                        self.load_operand(rhs, operand)?;
                        opcode
                    }
                }
                TypeCode::Long | TypeCode::Float | TypeCode::Double => {
                    self.load_operand(rhs, operand)?;
                    let compare = match family {
                        TypeCode::Long => LCMP,
                        TypeCode::Float if matches!(op, BinaryOp::Lt | BinaryOp::Le) => FCMPG,
                        TypeCode::Float => FCMPL,
                        _ if matches!(op, BinaryOp::Lt | BinaryOp::Le) => DCMPG,
                        _ => DCMPL,
                    };
                    self.code.emitop0(compare)?;
                    IFEQ + cond
                }
                _ => return Err(unsupported_operator(op, operand)),
            };
            return Ok(Item::Cond(CondItem::new(opcode)));
        }

        let numeric = matches!(
            family,
            TypeCode::Int | TypeCode::Long | TypeCode::Float | TypeCode::Double
        );
        let integral = matches!(family, TypeCode::Int | TypeCode::Long);
        let wide = u8::from(family == TypeCode::Long);
        let opcode = match op {
            BinaryOp::Add if numeric => IADD + family.offset(),
            BinaryOp::Sub if numeric => ISUB + family.offset(),
            BinaryOp::Mul if numeric => IMUL + family.offset(),
            BinaryOp::Div if numeric => IDIV + family.offset(),
            BinaryOp::Rem if numeric => IREM + family.offset(),
            BinaryOp::Shl if integral => ISHL + wide,
            BinaryOp::Shr if integral => ISHR + wide,
            BinaryOp::Ushr if integral => IUSHR + wide,
            BinaryOp::And if integral => IAND + wide,
            BinaryOp::Or if integral => IOR + wide,
            BinaryOp::Xor if integral => IXOR + wide,
            _ => return Err(unsupported_operator(op, operand)),
        };
        if op.is_shift() {
            self.load_operand(rhs, &Type::INT)?;
        } else {
            self.load_operand(rhs, operand)?;
        }
        self.code.emitop0(opcode)?;
        Ok(Item::Stack(result.type_code()))
    }

    fn load_operand(&mut self, expr: &'t Expr, ty: &Type) -> Result<(), Error> {
        let value = self.gen_expr(expr, ty)?;
        self.items().load(value)?;
        Ok(())
    }

    pub(super) fn gen_unary(&mut self, expr: &'t Expr, op: UnaryOp, arg: &'t Expr) -> Result<Item, Error> {
        if op == UnaryOp::Not {
            let cond = self.gen_cond(arg)?;
            return Ok(Item::Cond(cond.negate()));
        }

        let operand = match op {
            UnaryOp::Neg | UnaryOp::Pos | UnaryOp::Compl => expr.ty.clone(),
            _ => arg.ty.clone(),
        };
        let od = self.gen_expr(arg, &operand)?;
        let tc = operand.type_code();
        let family = tc.truncate();

        match op {
            UnaryOp::Pos => self.items().load(od),
            UnaryOp::Neg => {
                let result = self.items().load(od)?;
                self.code.emitop0(INEG + family.offset())?;
                Ok(result)
            }
            UnaryOp::Compl => {
                let result = self.items().load(od)?;
                if family == TypeCode::Long {
                    self.items().load(Item::Immediate {
                        value: ConstValue::Long(-1),
                        tc: TypeCode::Long,
                    })?;
                    self.code.emitop0(LXOR)?;
                } else {
                    self.code.emitop0(ICONST_M1)?;
                    self.code.emitop0(IXOR)?;
                }
                Ok(result)
            }
            UnaryOp::PreInc | UnaryOp::PreDec => {
                let increment = if op == UnaryOp::PreInc { 1 } else { -1 };
                self.items().duplicate(&od)?;
                if let Item::Local { reg, tc } = od {
                    if family == TypeCode::Int {
                        self.items().incr(reg, tc, increment)?;
                        return Ok(od);
                    }
                }
                self.items().load(od.clone())?;
                self.add_one(op == UnaryOp::PreInc, tc)?;
                Ok(Item::Assign(Box::new(od)))
            }
            UnaryOp::PostInc | UnaryOp::PostDec => {
                let increment = if op == UnaryOp::PostInc { 1 } else { -1 };
                self.items().duplicate(&od)?;
                if let Item::Local { reg, tc } = od {
                    if family == TypeCode::Int {
                        let result = self.items().load(od.clone())?;
                        self.items().incr(reg, tc, increment)?;
                        return Ok(result);
                    }
                }
                let result = self.items().load(od.clone())?;
                self.items().stash(&od, tc)?;
                self.add_one(op == UnaryOp::PostInc, tc)?;
                self.items().store(od)?;
                Ok(result)
            }
            UnaryOp::NullCheck => {
                let result = self.items().load(od)?;
                self.code.emitop0(DUP)?;
                self.gen_null_check()?;
                Ok(result)
            }
            UnaryOp::Not => Err(Error::MalformedTree(
                "logical negation is translated as a condition".to_owned(),
            )),
        }
    }

    /// Add or subtract one from the value of type code `tc` on the stack, narrowing the result
    /// back to `tc`
    fn add_one(&mut self, add: bool, tc: TypeCode) -> Result<(), Error> {
        let family = tc.truncate();
        let one = match family {
            TypeCode::Long => LCONST_1,
            TypeCode::Float => FCONST_1,
            TypeCode::Double => DCONST_1,
            _ => ICONST_1,
        };
        self.code.emitop0(one)?;
        self.code.emitop0(if add { IADD } else { ISUB } + family.offset())?;
        if tc != TypeCode::Int && family == TypeCode::Int {
            self.code.emitop0(I2B + tc.offset() - TypeCode::Byte.offset())?;
        }
        Ok(())
    }
}

fn int_constant(value: i32) -> Item {
    Item::Immediate {
        value: ConstValue::Int(value),
        tc: TypeCode::Int,
    }
}

/// `byte`, `short`, `char`, or `int`
fn is_int_or_narrower(ty: &Type) -> bool {
    matches!(ty.type_code(), TypeCode::Int | TypeCode::Byte | TypeCode::Short | TypeCode::Char)
        && *ty != Type::BOOLEAN
}

/// Offset of the condition in the `ifeq`..`ifle` and `if_icmpeq`..`if_icmple` families
fn comparison_index(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Eq => 0,
        BinaryOp::Ne => 1,
        BinaryOp::Lt => 2,
        BinaryOp::Ge => 3,
        BinaryOp::Gt => 4,
        _ => 5,
    }
}

fn unsupported_operator(op: BinaryOp, operand: &Type) -> Error {
    Error::MalformedTree(format!("operator {:?} does not apply to {:?}", op, operand))
}

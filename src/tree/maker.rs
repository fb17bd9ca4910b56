use super::*;
use crate::jvm::{BaseType, ClassGraph, Flags, JavaLibrary, TypeCode};

/// Builds attributed trees, filling in types and folding the simple constant expressions
///
/// Every node gets the position last set with [`TreeMaker::at`].
pub struct TreeMaker<'g> {
    graph: &'g ClassGraph,
    string: ClassId,
    class: ClassId,
    pos: Pos,
}

/// Type of the operands of an arithmetic operator after numeric promotion
fn binary_promote(lhs: &Type, rhs: &Type) -> Type {
    let rank = |ty: &Type| match ty {
        Type::Base(BaseType::Double) => 3,
        Type::Base(BaseType::Float) => 2,
        Type::Base(BaseType::Long) => 1,
        _ => 0,
    };
    match rank(lhs).max(rank(rhs)) {
        3 => Type::DOUBLE,
        2 => Type::FLOAT,
        1 => Type::LONG,
        _ => Type::INT,
    }
}

fn unary_promote(ty: &Type) -> Type {
    match ty {
        Type::Base(base) if base.is_int_like() => Type::INT,
        other => other.clone(),
    }
}

fn render_constant(value: &ConstValue, ty: &Type) -> String {
    match (value, ty) {
        (ConstValue::Int(i), Type::Base(BaseType::Boolean)) => (*i != 0).to_string(),
        (ConstValue::Int(i), Type::Base(BaseType::Char)) => char::from_u32(*i as u32)
            .map(String::from)
            .unwrap_or_default(),
        (ConstValue::Int(i), _) => i.to_string(),
        (ConstValue::Long(l), _) => l.to_string(),
        (ConstValue::Float(f), _) => format!("{:?}", f),
        (ConstValue::Double(d), _) => format!("{:?}", d),
        (ConstValue::String(s), _) => s.clone(),
    }
}

impl<'g> TreeMaker<'g> {
    /// Maker for trees inside `class`
    pub fn new(graph: &'g ClassGraph, java: &JavaLibrary, class: ClassId) -> TreeMaker<'g> {
        TreeMaker {
            graph,
            string: java.string,
            class,
            pos: Pos::NONE,
        }
    }

    pub fn at(&mut self, pos: Pos) -> &mut Self {
        self.pos = pos;
        self
    }

    pub fn at_line(&mut self, line: u32) -> &mut Self {
        self.at(Pos::at_line(line))
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    fn string_type(&self) -> Type {
        Type::Object(self.string)
    }

    fn is_string(&self, ty: &Type) -> bool {
        *ty == self.string_type()
    }

    fn expr(&self, kind: ExprKind, ty: Type) -> Expr {
        Expr {
            kind,
            ty,
            constant: None,
            pos: self.pos,
        }
    }

    fn stmt(&self, kind: StmtKind) -> Stmt {
        Stmt { kind, pos: self.pos }
    }

    /* Literals */

    pub fn literal(&self, value: ConstValue, ty: Type) -> Expr {
        Expr {
            kind: ExprKind::Literal(value.clone()),
            ty,
            constant: Some(value),
            pos: self.pos,
        }
    }

    pub fn int(&self, value: i32) -> Expr {
        self.literal(ConstValue::Int(value), Type::INT)
    }

    pub fn long(&self, value: i64) -> Expr {
        self.literal(ConstValue::Long(value), Type::LONG)
    }

    pub fn float(&self, value: f32) -> Expr {
        self.literal(ConstValue::Float(value), Type::FLOAT)
    }

    pub fn double(&self, value: f64) -> Expr {
        self.literal(ConstValue::Double(value), Type::DOUBLE)
    }

    pub fn boolean(&self, value: bool) -> Expr {
        self.literal(ConstValue::Int(value as i32), Type::BOOLEAN)
    }

    pub fn char(&self, value: char) -> Expr {
        self.literal(ConstValue::Int(value as i32), Type::CHAR)
    }

    pub fn string(&self, value: &str) -> Expr {
        self.literal(ConstValue::String(value.to_owned()), self.string_type())
    }

    pub fn null(&self) -> Expr {
        self.expr(ExprKind::Null, Type::Null)
    }

    /* Names */

    pub fn this(&self) -> Expr {
        self.expr(ExprKind::This, Type::Object(self.class))
    }

    pub fn local(&self, var: LocalId) -> Expr {
        let data = self.graph.local(var);
        let mut expr = self.expr(ExprKind::Local(var), data.ty.clone());
        expr.constant = data.constant.clone();
        expr
    }

    /// Field access, folded to the field's value when it is a constant named through a type
    ///
    /// A constant read through an expression is not folded, so the expression still gets
    /// evaluated.
    pub fn field(&self, receiver: Receiver, field: FieldId) -> Expr {
        let data = self.graph.field(field);
        let through_type = matches!(receiver, Receiver::Implicit | Receiver::Class(_));
        let mut expr = self.expr(ExprKind::Field { receiver, field }, data.ty.clone());
        if through_type && data.flags.is_static() && data.flags.contains(Flags::FINAL) {
            expr.constant = data.constant.clone();
        }
        expr
    }

    /// Unqualified field name
    pub fn ident(&self, field: FieldId) -> Expr {
        self.field(Receiver::Implicit, field)
    }

    pub fn select(&self, receiver: Expr, field: FieldId) -> Expr {
        self.field(Receiver::Expr(Box::new(receiver)), field)
    }

    /* Calls and allocation */

    pub fn call(&self, receiver: Receiver, method: MethodId, args: Vec<Expr>) -> Expr {
        let ret = self.graph.method(method).ret.clone();
        self.expr(
            ExprKind::Call {
                receiver,
                method,
                args,
            },
            ret,
        )
    }

    /// `super(args)` as the first statement of a constructor
    pub fn super_call(&self, ctor: MethodId, args: Vec<Expr>) -> Stmt {
        self.exec(self.call(Receiver::Super, ctor, args))
    }

    pub fn new_class(&self, ctor: MethodId, args: Vec<Expr>) -> Expr {
        let class = self.graph.method(ctor).owner;
        self.expr(ExprKind::New { class, ctor, args }, Type::Object(class))
    }

    /// `new T[d1]...[dn]` for an array type of at least `dims.len()` dimensions
    pub fn new_array(&self, array_type: Type, dims: Vec<Expr>) -> Expr {
        self.expr(ExprKind::NewArray { dims, elems: None }, array_type)
    }

    /// `new T[] { elems }`
    pub fn array_init(&self, array_type: Type, elems: Vec<Expr>) -> Expr {
        self.expr(
            ExprKind::NewArray {
                dims: vec![],
                elems: Some(elems),
            },
            array_type,
        )
    }

    /* Operators */

    pub fn assign(&self, target: Expr, value: Expr) -> Expr {
        let ty = target.ty.clone();
        self.expr(
            ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            ty,
        )
    }

    pub fn assign_op(&self, op: BinaryOp, target: Expr, value: Expr) -> Expr {
        let operand = if op == BinaryOp::Add && self.is_string(&target.ty) {
            self.string_type()
        } else if op.is_shift() {
            unary_promote(&target.ty)
        } else if target.ty == Type::BOOLEAN {
            Type::BOOLEAN
        } else {
            binary_promote(&target.ty, &value.ty)
        };
        let ty = target.ty.clone();
        self.expr(
            ExprKind::AssignOp {
                op,
                operand,
                target: Box::new(target),
                value: Box::new(value),
            },
            ty,
        )
    }

    pub fn binary(&self, op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        let is_string_add =
            op == BinaryOp::Add && (self.is_string(&lhs.ty) || self.is_string(&rhs.ty));
        let is_boolean = lhs.ty == Type::BOOLEAN && rhs.ty == Type::BOOLEAN;

        let operand = if is_string_add {
            self.string_type()
        } else if op.is_shift() {
            unary_promote(&lhs.ty)
        } else if is_boolean || lhs.ty.is_reference() || rhs.ty.is_reference() {
            if lhs.ty == Type::Null {
                rhs.ty.clone()
            } else {
                lhs.ty.clone()
            }
        } else {
            binary_promote(&lhs.ty, &rhs.ty)
        };
        let ty = if op.is_comparison() || matches!(op, BinaryOp::CondAnd | BinaryOp::CondOr) {
            Type::BOOLEAN
        } else {
            operand.clone()
        };

        let constant = match (&lhs.constant, &rhs.constant) {
            (Some(l), Some(r)) if is_string_add => Some(ConstValue::String(format!(
                "{}{}",
                render_constant(l, &lhs.ty),
                render_constant(r, &rhs.ty)
            ))),
            (Some(ConstValue::Int(l)), Some(ConstValue::Int(r)))
                if operand.type_code().truncate() == TypeCode::Int =>
            {
                fold_int(op, *l, *r)
            }
            _ => None,
        };

        let mut expr = self.expr(
            ExprKind::Binary {
                op,
                operand,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        );
        expr.constant = constant;
        expr
    }

    pub fn unary(&self, op: UnaryOp, arg: Expr) -> Expr {
        let ty = match op {
            UnaryOp::Neg | UnaryOp::Pos | UnaryOp::Compl => unary_promote(&arg.ty),
            _ => arg.ty.clone(),
        };
        let constant = match (op, &arg.constant) {
            (UnaryOp::Neg, Some(ConstValue::Int(i))) => Some(ConstValue::Int(i.wrapping_neg())),
            (UnaryOp::Compl, Some(ConstValue::Int(i))) => Some(ConstValue::Int(!i)),
            (UnaryOp::Not, Some(ConstValue::Int(i))) => Some(ConstValue::Int((*i == 0) as i32)),
            (UnaryOp::Pos, Some(value)) => Some(value.clone()),
            _ => None,
        };
        let mut expr = self.expr(ExprKind::Unary { op, arg: Box::new(arg) }, ty);
        expr.constant = constant;
        expr
    }

    pub fn conditional(&self, cond: Expr, then: Expr, otherwise: Expr) -> Expr {
        let ty = if then.ty == Type::Null {
            otherwise.ty.clone()
        } else if then.ty.is_primitive() && otherwise.ty.is_primitive() && then.ty != otherwise.ty {
            binary_promote(&then.ty, &otherwise.ty)
        } else {
            then.ty.clone()
        };
        self.expr(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            ty,
        )
    }

    pub fn cast(&self, ty: Type, expr: Expr) -> Expr {
        let constant = match (&expr.constant, &ty) {
            (Some(value), Type::Base(_)) => Some(value.convert(ty.type_code())),
            _ => None,
        };
        let mut cast = self.expr(ExprKind::Cast(Box::new(expr)), ty);
        cast.constant = constant;
        cast
    }

    pub fn instance_of(&self, expr: Expr, target: Type) -> Expr {
        self.expr(
            ExprKind::InstanceOf {
                expr: Box::new(expr),
                target,
            },
            Type::BOOLEAN,
        )
    }

    pub fn index(&self, array: Expr, index: Expr) -> Expr {
        let elem = array.ty.elem_type().cloned().unwrap_or(Type::Null);
        self.expr(
            ExprKind::Index {
                array: Box::new(array),
                index: Box::new(index),
            },
            elem,
        )
    }

    pub fn array_length(&self, array: Expr) -> Expr {
        self.expr(ExprKind::ArrayLength(Box::new(array)), Type::INT)
    }

    pub fn class_literal(&self, ty: Type, class_type: Type) -> Expr {
        self.expr(ExprKind::ClassLiteral(ty), class_type)
    }

    /* Statements */

    pub fn body(&self, stats: Vec<Stmt>) -> Block {
        Block {
            stats,
            end: self.pos,
        }
    }

    pub fn block(&self, stats: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Block(self.body(stats)))
    }

    pub fn var_def(&self, var: LocalId, init: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::VarDef { var, init })
    }

    pub fn exec(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn if_(&self, cond: Expr, then: Stmt, otherwise: Option<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            cond,
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        })
    }

    pub fn while_(&self, cond: Expr, body: Stmt) -> Stmt {
        self.stmt(StmtKind::While {
            cond,
            body: Box::new(body),
        })
    }

    pub fn do_while(&self, body: Stmt, cond: Expr) -> Stmt {
        self.stmt(StmtKind::DoWhile {
            body: Box::new(body),
            cond,
        })
    }

    pub fn for_(&self, init: Vec<Stmt>, cond: Option<Expr>, step: Vec<Expr>, body: Stmt) -> Stmt {
        self.stmt(StmtKind::For {
            init,
            cond,
            step,
            body: Box::new(body),
        })
    }

    pub fn labelled(&self, label: &str, body: Stmt) -> Stmt {
        self.stmt(StmtKind::Labelled {
            label: label.to_owned(),
            body: Box::new(body),
        })
    }

    pub fn break_(&self, label: Option<&str>) -> Stmt {
        self.stmt(StmtKind::Break(label.map(str::to_owned)))
    }

    pub fn continue_(&self, label: Option<&str>) -> Stmt {
        self.stmt(StmtKind::Continue(label.map(str::to_owned)))
    }

    pub fn switch(&self, selector: Expr, cases: Vec<Case>) -> Stmt {
        self.stmt(StmtKind::Switch { selector, cases })
    }

    pub fn case(&self, label: Option<i32>, stats: Vec<Stmt>) -> Case {
        Case {
            label,
            stats,
            pos: self.pos,
        }
    }

    pub fn return_(&self, expr: Option<Expr>) -> Stmt {
        self.stmt(StmtKind::Return(expr))
    }

    pub fn throw(&self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Throw(expr))
    }

    pub fn try_(&self, body: Block, catches: Vec<Catch>, finalizer: Option<Block>) -> Stmt {
        self.stmt(StmtKind::Try {
            body,
            catches,
            finalizer,
        })
    }

    pub fn catch(&self, param: LocalId, types: Vec<ClassId>, body: Block) -> Catch {
        Catch {
            param,
            types,
            body,
            pos: self.pos,
        }
    }

    pub fn synchronized(&self, lock: Expr, body: Block) -> Stmt {
        self.stmt(StmtKind::Synchronized { lock, body })
    }

    pub fn empty(&self) -> Stmt {
        self.stmt(StmtKind::Empty)
    }

    /* Declarations */

    pub fn method(&self, method: MethodId, params: Vec<LocalId>, body: Option<Block>) -> MethodDecl {
        MethodDecl {
            method,
            params,
            body,
            pos: self.pos,
        }
    }
}

fn fold_int(op: BinaryOp, l: i32, r: i32) -> Option<ConstValue> {
    let value = match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::And | BinaryOp::CondAnd => l & r,
        BinaryOp::Or | BinaryOp::CondOr => l | r,
        BinaryOp::Xor => l ^ r,
        BinaryOp::Eq => (l == r) as i32,
        BinaryOp::Ne => (l != r) as i32,
        BinaryOp::Lt => (l < r) as i32,
        BinaryOp::Gt => (l > r) as i32,
        BinaryOp::Le => (l <= r) as i32,
        BinaryOp::Ge => (l >= r) as i32,
        _ => return None,
    };
    Some(ConstValue::Int(value))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::ClassSymbol;

    #[test]
    fn folds_constant_expressions() {
        let mut graph = ClassGraph::new();
        let java = graph.insert_java_library_types();
        let class = graph.add_class(ClassSymbol::new("p/C", Flags::PUBLIC, Some(java.object)));
        let make = TreeMaker::new(&graph, &java, class);

        let sum = make.binary(BinaryOp::Add, make.int(2), make.int(3));
        assert_eq!(sum.constant, Some(ConstValue::Int(5)));
        assert_eq!(sum.ty, Type::INT);

        let text = make.binary(BinaryOp::Add, make.string("n="), make.int(5));
        assert_eq!(text.constant, Some(ConstValue::String("n=5".to_owned())));
        assert_eq!(text.ty, Type::Object(java.string));

        let test = make.binary(BinaryOp::Lt, make.int(1), make.int(2));
        assert_eq!(test.ty, Type::BOOLEAN);
        assert_eq!(test.constant, Some(ConstValue::Int(1)));
    }

    #[test]
    fn promotes_operands() {
        let mut graph = ClassGraph::new();
        let java = graph.insert_java_library_types();
        let class = graph.add_class(ClassSymbol::new("p/C", Flags::PUBLIC, Some(java.object)));
        let make = TreeMaker::new(&graph, &java, class);

        let mixed = make.binary(BinaryOp::Mul, make.int(2), make.double(1.5));
        assert_eq!(mixed.ty, Type::DOUBLE);
        assert!(mixed.constant.is_none());

        let shifted = make.binary(BinaryOp::Shl, make.char('a'), make.long(3));
        assert_eq!(shifted.ty, Type::INT);

        let negated = make.unary(UnaryOp::Neg, make.cast(Type::BYTE, make.int(300)));
        assert_eq!(negated.ty, Type::INT);
        assert_eq!(negated.constant, Some(ConstValue::Int(-44)));
    }
}

//! Attributed and lowered syntax trees, as handed over by a front end
//!
//! By the time a tree reaches the back end every name has been resolved to a symbol in the
//! [`ClassGraph`], every expression carries its erased type, constant expressions carry their
//! folded value, and nested classes have been flattened out into their own [`ClassDecl`]s.
//!
//! [`ClassGraph`]: crate::jvm::ClassGraph

mod maker;

pub use maker::*;

use crate::jvm::{ClassId, ConstValue, FieldId, LocalId, MethodId, Type};

/// Source position of a tree node
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    /// Character offset in the source file
    pub offset: u32,

    /// 1-based line number, or `0` if unknown
    pub line: u32,
}

impl Pos {
    pub const NONE: Pos = Pos { offset: 0, line: 0 };

    pub fn at_line(line: u32) -> Pos {
        Pos { offset: 0, line }
    }

    /// Line in the form a `LineNumberTable` can hold
    pub fn line_number(&self) -> Option<u16> {
        if self.line == 0 {
            None
        } else {
            u16::try_from(self.line).ok()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,

    /// Erased type of the expression
    pub ty: Type,

    /// Folded value, for constant expressions
    pub constant: Option<ConstValue>,
    pub pos: Pos,
}

/// What a field access or method call is applied to
#[derive(Clone, Debug, PartialEq)]
pub enum Receiver {
    /// Unqualified name, resolved against the current class (`this` for instance members)
    Implicit,

    /// `super.m()` or `super.f`
    Super,

    /// Static member selected through a type name
    Class(ClassId),

    Expr(Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Literal value (never `null`)
    Literal(ConstValue),
    Null,

    /// `this`
    This,

    /// Local variable or parameter
    Local(LocalId),

    Field {
        receiver: Receiver,
        field: FieldId,
    },

    /// Method call, including explicit `this(...)` and `super(...)` constructor calls
    ///
    /// Arguments line up with the external parameters of the method, so a call to an inner class
    /// constructor passes the outer instance first.
    Call {
        receiver: Receiver,
        method: MethodId,
        args: Vec<Expr>,
    },

    /// `new C(args)`
    New {
        class: ClassId,
        ctor: MethodId,
        args: Vec<Expr>,
    },

    /// `new T[d1][d2]...` (with `dims`) or `new T[] { elems }` (with `elems`)
    ///
    /// The array type is the type of the expression.
    NewArray {
        dims: Vec<Expr>,
        elems: Option<Vec<Expr>>,
    },

    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// Compound assignment `target op= value`
    ///
    /// `operand` is the type the operation is carried out at (`String` for `+=` on strings).
    AssignOp {
        op: BinaryOp,
        operand: Type,
        target: Box<Expr>,
        value: Box<Expr>,
    },

    /// Binary operation on operands of type `operand` (the left operand's type, for shifts)
    Binary {
        op: BinaryOp,
        operand: Type,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    Unary {
        op: UnaryOp,
        arg: Box<Expr>,
    },

    /// `cond ? then : otherwise`
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// Cast to the expression's type
    Cast(Box<Expr>),

    InstanceOf {
        expr: Box<Expr>,
        target: Type,
    },

    /// `array[index]`
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },

    /// `array.length`
    ArrayLength(Box<Expr>),

    /// `T.class`
    ClassLiteral(Type),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    Ushr,

    /// `&` (bitwise, or non-short-circuiting on booleans)
    And,
    Or,
    Xor,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    /// `&&`
    CondAnd,

    /// `||`
    CondOr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,

    /// `+x`
    Pos,

    /// `!x`
    Not,

    /// `~x`
    Compl,
    PreInc,
    PreDec,
    PostInc,
    PostDec,

    /// Null check inserted by lowering (eg. for qualified inner class creation)
    NullCheck,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Pos,
}

/// Statements between braces
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    pub stats: Vec<Stmt>,

    /// Position of the closing brace
    pub end: Pos,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    Block(Block),

    /// Local variable declaration, with an optional initializer
    VarDef {
        var: LocalId,
        init: Option<Expr>,
    },

    /// Expression evaluated for its side effects
    Expr(Expr),

    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },

    While {
        cond: Expr,
        body: Box<Stmt>,
    },

    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },

    /// `for (init; cond; step) body`, with a missing condition meaning `true`
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        step: Vec<Expr>,
        body: Box<Stmt>,
    },

    Labelled {
        label: String,
        body: Box<Stmt>,
    },

    Break(Option<String>),
    Continue(Option<String>),

    /// `switch` on an `int`-like selector
    Switch {
        selector: Expr,
        cases: Vec<Case>,
    },

    Return(Option<Expr>),
    Throw(Expr),

    Try {
        body: Block,
        catches: Vec<Catch>,
        finalizer: Option<Block>,
    },

    Synchronized {
        lock: Expr,
        body: Block,
    },

    Empty,
}

/// One `case` of a switch, `None` standing for `default`
#[derive(Clone, Debug, PartialEq)]
pub struct Case {
    pub label: Option<i32>,
    pub stats: Vec<Stmt>,
    pub pos: Pos,
}

/// `catch (T1 | T2 param) body`
#[derive(Clone, Debug, PartialEq)]
pub struct Catch {
    pub param: LocalId,
    pub types: Vec<ClassId>,
    pub body: Block,
    pub pos: Pos,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodDecl {
    pub method: MethodId,

    /// Parameters in the order of the method's external parameters
    pub params: Vec<LocalId>,

    /// `None` for abstract and native methods
    pub body: Option<Block>,
    pub pos: Pos,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub field: FieldId,
    pub init: Option<Expr>,
    pub pos: Pos,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Member {
    Method(MethodDecl),
    Field(FieldDecl),

    /// Instance or static initializer block
    Init { is_static: bool, body: Block },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassDecl {
    pub class: ClassId,
    pub members: Vec<Member>,
    pub pos: Pos,
}

/// Classes lowered from one source file, nested classes included
#[derive(Clone, Debug, PartialEq)]
pub struct CompilationUnit {
    pub source_file: String,
    pub classes: Vec<ClassDecl>,
}

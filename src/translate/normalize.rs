//! Class normalization
//!
//! Before any code gets generated, the members of a class are flattened into a list of method
//! declarations:
//!
//!   * instance field initializers and instance initializer blocks are inserted (in source
//!     order) into every constructor which starts with a `super(...)` call, right after it
//!   * static field initializers and static blocks become the body of a new `<clinit>` method
//!   * static final fields with constant values keep no code at all, since the class writer
//!     gives them a `ConstantValue` attribute instead

use super::method::MAX_STRING_LENGTH;
use super::{Diagnostic, LimitKind};
use crate::jvm::{ClassGraph, ConstValue, Flags, JavaLibrary, MethodSymbol, Type};
use crate::tree::{Block, ClassDecl, ExprKind, Member, MethodDecl, Receiver, Stmt, StmtKind, TreeMaker};

/// Flatten the members of a class into methods, adding `<clinit>` to the graph if needed
pub fn normalize_class(
    graph: &mut ClassGraph,
    java: &JavaLibrary,
    decl: ClassDecl,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<MethodDecl> {
    let mut init_code: Vec<Stmt> = vec![];
    let mut clinit_code: Vec<Stmt> = vec![];
    let mut methods: Vec<MethodDecl> = vec![];

    {
        let graph: &ClassGraph = graph;
        let mut make = TreeMaker::new(graph, java, decl.class);
        for member in decl.members {
            match member {
                Member::Method(method) => methods.push(method),
                Member::Init { is_static, body } => {
                    let stat = Stmt {
                        pos: body.stats.first().map_or(body.end, |stat| stat.pos),
                        kind: StmtKind::Block(body),
                    };
                    if is_static {
                        clinit_code.push(stat);
                    } else {
                        init_code.push(stat);
                    }
                }
                Member::Field(field_decl) => {
                    let init = match field_decl.init {
                        Some(init) => init,
                        None => continue,
                    };
                    let field = graph.field(field_decl.field);
                    make.at(field_decl.pos);
                    if !field.is_static() {
                        init_code.push(make.exec(make.assign(make.ident(field_decl.field), init)));
                    } else if field.constant.is_none() {
                        clinit_code.push(make.exec(make.assign(make.ident(field_decl.field), init)));
                    } else if diagnostics.is_empty() {
                        if let Some(ConstValue::String(string)) = &field.constant {
                            if string.encode_utf16().count() >= MAX_STRING_LENGTH {
                                diagnostics.push(Diagnostic::new(
                                    graph.class(decl.class).name.as_str(),
                                    init.pos,
                                    LimitKind::StringConstant,
                                ));
                            }
                        }
                    }
                }
            }
        }

        if !init_code.is_empty() {
            for method in &mut methods {
                if !graph.method(method.method).is_constructor() {
                    continue;
                }
                if let Some(body) = &mut method.body {
                    if starts_with_super_call(graph, body) {
                        let rest = body.stats.split_off(1);
                        body.stats.extend(init_code.iter().cloned());
                        body.stats.extend(rest);
                    }
                }
            }
        }
    }

    if !clinit_code.is_empty() {
        let end = clinit_code.last().map_or(decl.pos, |stat| stat.pos);
        let clinit = graph.add_method(MethodSymbol::new(
            "<clinit>",
            decl.class,
            Flags::STATIC,
            vec![],
            Type::Void,
        ));
        log::debug!(
            "collected {} static initializers into {}.<clinit>",
            clinit_code.len(),
            graph.class(decl.class).name
        );
        methods.push(MethodDecl {
            method: clinit,
            params: vec![],
            body: Some(Block {
                stats: clinit_code,
                end,
            }),
            pos: decl.pos,
        });
    }

    methods
}

/// Does the constructor body begin by calling a superclass constructor (and not `this(...)`)?
fn starts_with_super_call(graph: &ClassGraph, body: &Block) -> bool {
    match body.stats.first().map(|stat| &stat.kind) {
        Some(StmtKind::Expr(expr)) => match &expr.kind {
            ExprKind::Call {
                receiver: Receiver::Super,
                method,
                ..
            } => graph.method(*method).is_constructor(),
            _ => false,
        },
        _ => false,
    }
}

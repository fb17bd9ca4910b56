//! Rough estimate of how much code a `finally` block expands to
//!
//! A finalizer is copied onto every exit path of its `try` statement, so big finalizers get
//! emitted once as a `jsr` subroutine on targets which still allow that.

use crate::tree::{Block, Expr, ExprKind, Receiver, Stmt, StmtKind};

struct ComplexityScanner {
    complexity: i32,
    limit: i32,
}

/// Weighted size of a block, counted only until it exceeds `limit`
pub fn complexity(block: &Block, limit: i32) -> i32 {
    let mut scanner = ComplexityScanner {
        complexity: 0,
        limit,
    };
    scanner.scan_stmts(&block.stats);
    scanner.complexity
}

impl ComplexityScanner {
    fn done(&self) -> bool {
        self.complexity > self.limit
    }

    fn scan_stmts(&mut self, stats: &[Stmt]) {
        for stat in stats {
            self.scan_stmt(stat);
        }
    }

    fn scan_exprs(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.scan_expr(expr);
        }
    }

    fn scan_stmt(&mut self, stmt: &Stmt) {
        if self.done() {
            return;
        }
        match &stmt.kind {
            StmtKind::Block(block) => self.scan_stmts(&block.stats),
            StmtKind::VarDef { init, .. } => {
                if let Some(init) = init {
                    self.scan_expr(init);
                }
            }
            StmtKind::Expr(expr) => self.scan_expr(expr),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.complexity += 2;
                self.scan_expr(cond);
                self.scan_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.scan_stmt(otherwise);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                self.complexity += 1;
                self.scan_expr(cond);
                self.scan_stmt(body);
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                self.complexity += 1;
                self.scan_stmts(init);
                if let Some(cond) = cond {
                    self.scan_expr(cond);
                }
                self.scan_exprs(step);
                self.scan_stmt(body);
            }
            StmtKind::Labelled { body, .. } => self.scan_stmt(body),
            StmtKind::Switch { selector, cases } => {
                self.complexity += 5;
                self.scan_expr(selector);
                for case in cases {
                    self.complexity += 1;
                    self.scan_stmts(&case.stats);
                }
            }
            StmtKind::Synchronized { lock, body } => {
                self.complexity += 6;
                self.scan_expr(lock);
                self.scan_stmts(&body.stats);
            }
            StmtKind::Try {
                body,
                catches,
                finalizer,
            } => {
                if finalizer.is_some() {
                    self.complexity += 6;
                }
                self.scan_stmts(&body.stats);
                for catch in catches {
                    self.complexity += 2;
                    self.scan_stmts(&catch.body.stats);
                }
                if let Some(finalizer) = finalizer {
                    self.scan_stmts(&finalizer.stats);
                }
            }
            StmtKind::Break(_) | StmtKind::Continue(_) => self.complexity += 1,
            StmtKind::Return(expr) => {
                self.complexity += 1;
                if let Some(expr) = expr {
                    self.scan_expr(expr);
                }
            }
            StmtKind::Throw(expr) => {
                self.complexity += 1;
                self.scan_expr(expr);
            }
            StmtKind::Empty => (),
        }
    }

    fn scan_receiver(&mut self, receiver: &Receiver) {
        match receiver {
            Receiver::Implicit | Receiver::Class(_) => (),
            Receiver::Super => self.complexity += 1,
            Receiver::Expr(expr) => self.scan_expr(expr),
        }
    }

    fn scan_expr(&mut self, expr: &Expr) {
        if self.done() {
            return;
        }
        match &expr.kind {
            ExprKind::Literal(_) | ExprKind::Null => self.complexity += 1,
            ExprKind::This | ExprKind::Local(_) => self.complexity += 1,
            ExprKind::Field { receiver, .. } => {
                if let Receiver::Implicit = receiver {
                    self.complexity += 1;
                    if expr.constant.is_none() {
                        self.complexity += 1;
                    }
                } else {
                    self.scan_receiver(receiver);
                    self.complexity += 1;
                }
            }
            ExprKind::Call { receiver, args, .. } => {
                self.complexity += 2;
                self.scan_receiver(receiver);
                self.scan_exprs(args);
            }
            ExprKind::New { args, .. } => {
                self.complexity += 2;
                self.scan_exprs(args);
            }
            ExprKind::NewArray { dims, elems } => {
                self.complexity += 5;
                self.scan_exprs(dims);
                if let Some(elems) = elems {
                    self.scan_exprs(elems);
                }
            }
            ExprKind::Assign { target, value } => {
                self.complexity += 1;
                self.scan_expr(target);
                self.scan_expr(value);
            }
            ExprKind::AssignOp { target, value, .. } => {
                self.complexity += 2;
                self.scan_expr(target);
                self.scan_expr(value);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.complexity += 1;
                if expr.constant.is_none() {
                    self.scan_expr(lhs);
                    self.scan_expr(rhs);
                }
            }
            ExprKind::Unary { arg, .. } => {
                self.complexity += 1;
                if expr.constant.is_none() {
                    self.scan_expr(arg);
                }
            }
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                self.complexity += 2;
                self.scan_expr(cond);
                self.scan_expr(then);
                self.scan_expr(otherwise);
            }
            ExprKind::Cast(inner) => self.scan_expr(inner),
            ExprKind::InstanceOf { expr, .. } => {
                self.complexity += 1;
                self.scan_expr(expr);
            }
            ExprKind::Index { array, index } => {
                self.complexity += 1;
                self.scan_expr(array);
                self.scan_expr(index);
            }
            ExprKind::ArrayLength(array) => {
                self.scan_expr(array);
                self.complexity += 1;
            }
            ExprKind::ClassLiteral(_) => self.complexity += 1,
        }
    }
}

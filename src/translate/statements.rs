//! Statements, including the finalizer plumbing of `try` and `synchronized`

use super::complexity::complexity;
use super::env::{Env, EnvKind, Finalizer};
use super::items::{CondItem, Item};
use super::method::MethodTranslator;
use super::Error;
use crate::jvm::code::{merge_chains, Chain};
use crate::jvm::opcodes::*;
use crate::jvm::{LocalId, Type, TypeCode};
use crate::tree::{Block, Catch, Expr, ExprKind, Pos, Stmt, StmtKind, UnaryOp};

impl<'a, 'g, 't> MethodTranslator<'a, 'g, 't> {
    /// Translate a statement, if it is reachable
    ///
    /// Unreachable declarations directly inside a `switch` still get a register, since later
    /// cases may assign to them.
    pub(super) fn gen_stat(&mut self, stat: &'t Stmt) -> Result<(), Error> {
        if self.code.is_alive() {
            self.code.stat_begin(stat.pos.line_number());
            self.gen_stat_kind(stat)?;
            let depth = self.code.state.depth();
            if depth != 0 {
                let method = self.graph.method(self.decl.method);
                return Err(Error::StackNotEmpty {
                    method: format!("{}.{}", self.graph.class(method.owner).name, method.name),
                    depth,
                });
            }
        } else if self.envs.innermost().map_or(false, Env::is_switch) {
            if let StmtKind::VarDef { var, .. } = &stat.kind {
                self.new_local(*var, stat.pos)?;
            }
        }
        Ok(())
    }

    pub(super) fn gen_stats(&mut self, stats: &'t [Stmt]) -> Result<(), Error> {
        for stat in stats {
            self.gen_stat(stat)?;
        }
        Ok(())
    }

    /// Translate a block, closing the scopes it opens (except for the body of the method)
    pub(super) fn gen_block(&mut self, block: &'t Block, method_body: bool) -> Result<(), Error> {
        let limit = self.code.nextreg;
        self.gen_stats(&block.stats)?;
        if !method_body {
            self.code.end_scopes(limit)?;
        }
        Ok(())
    }

    fn gen_stat_kind(&mut self, stat: &'t Stmt) -> Result<(), Error> {
        match &stat.kind {
            StmtKind::Block(block) => self.gen_block(block, false),
            StmtKind::VarDef { var, init } => self.gen_var_def(*var, init.as_ref(), stat.pos),
            StmtKind::Expr(expr) => self.gen_exec(expr),
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => self.gen_if(cond, then, otherwise.as_deref()),
            StmtKind::While { cond, body } => {
                self.gen_loop(None, body, Some(cond), &[], true)
            }
            StmtKind::DoWhile { body, cond } => {
                self.gen_loop(None, body, Some(cond), &[], false)
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.gen_for(None, init, cond.as_ref(), step, body),
            StmtKind::Labelled { label, body } => self.gen_labelled(label, body),
            StmtKind::Break(label) => self.gen_break(label.as_deref()),
            StmtKind::Continue(label) => self.gen_continue(label.as_deref()),
            StmtKind::Switch { selector, cases } => self.gen_switch(selector, cases),
            StmtKind::Return(expr) => self.gen_return(expr.as_ref()),
            StmtKind::Throw(expr) => {
                let thrown = self.gen_expr(expr, &expr.ty)?;
                self.items().load(thrown)?;
                self.code.emitop0(ATHROW)?;
                Ok(())
            }
            StmtKind::Try {
                body,
                catches,
                finalizer,
            } => self.gen_try_stat(body, catches, finalizer.as_ref()),
            StmtKind::Synchronized { lock, body } => self.gen_synchronized(lock, body),
            StmtKind::Empty => Ok(()),
        }
    }

    fn gen_var_def(&mut self, var: LocalId, init: Option<&'t Expr>, pos: Pos) -> Result<(), Error> {
        let reg = self.new_local(var, pos)?;
        if let Some(init) = init {
            let local = self.graph.local(var);
            self.check_string_constant(init.pos, local.constant.as_ref());
            if local.constant.is_none() || self.settings.var_debug_info {
                let value = self.gen_expr(init, &local.ty)?;
                self.items().load(value)?;
                self.items().store(Item::Local {
                    reg,
                    tc: local.ty.type_code(),
                })?;
            }
        }
        Ok(())
    }

    /// Evaluate an expression for its side effects
    pub(super) fn gen_exec(&mut self, expr: &'t Expr) -> Result<(), Error> {
        let result = match &expr.kind {
            ExprKind::Unary {
                op: UnaryOp::PostInc,
                arg,
            } => self.gen_unary(expr, UnaryOp::PreInc, arg)?,
            ExprKind::Unary {
                op: UnaryOp::PostDec,
                arg,
            } => self.gen_unary(expr, UnaryOp::PreDec, arg)?,
            _ => self.gen_expr(expr, &expr.ty)?,
        };
        self.items().drop(result)
    }

    fn gen_if(&mut self, cond: &'t Expr, then: &'t Stmt, otherwise: Option<&'t Stmt>) -> Result<(), Error> {
        let limit = self.code.nextreg;
        let c = self.gen_cond(cond)?;
        let else_chain = c.jump_false(&mut self.code)?;
        let mut then_exit = None;
        if !c.is_false() {
            self.code.resolve(c.true_jumps.clone())?;
            self.gen_stat(then)?;
            then_exit = self.code.branch(GOTO)?;
        }
        if else_chain.is_some() {
            self.code.resolve(else_chain)?;
            if let Some(otherwise) = otherwise {
                self.gen_stat(otherwise)?;
            }
        }
        self.code.resolve(then_exit)?;
        self.code.end_scopes(limit)?;
        Ok(())
    }

    fn gen_for(
        &mut self,
        label: Option<&'t str>,
        init: &'t [Stmt],
        cond: Option<&'t Expr>,
        step: &'t [Expr],
        body: &'t Stmt,
    ) -> Result<(), Error> {
        let limit = self.code.nextreg;
        self.gen_stats(init)?;
        self.gen_loop(label, body, cond, step, true)?;
        self.code.end_scopes(limit)?;
        Ok(())
    }

    /// Translate a loop, testing the condition before (`while`, `for`) or after (`do`) the body
    fn gen_loop(
        &mut self,
        label: Option<&'t str>,
        body: &'t Stmt,
        cond: Option<&'t Expr>,
        step: &'t [Expr],
        test_first: bool,
    ) -> Result<(), Error> {
        let idx = self.envs.push(Env::new(EnvKind::Loop { label }));
        let start_pc = self.code.entry_point()?;

        if test_first {
            let c = match cond {
                Some(cond) => {
                    self.code.stat_begin(cond.pos.line_number());
                    self.gen_cond(cond)?
                }
                None => CondItem::new(GOTO),
            };
            let loop_done = c.jump_false(&mut self.code)?;
            self.code.resolve(c.true_jumps)?;
            self.gen_stat(body)?;
            let cont = self.envs.get_mut(idx).cont.take();
            self.code.resolve(cont)?;
            self.gen_steps(step)?;
            let back = self.code.branch(GOTO)?;
            self.code.resolve_to(back, start_pc)?;
            self.code.resolve(loop_done)?;
        } else {
            self.gen_stat(body)?;
            let cont = self.envs.get_mut(idx).cont.take();
            self.code.resolve(cont)?;
            self.gen_steps(step)?;
            if self.code.is_alive() {
                let c = match cond {
                    Some(cond) => {
                        self.code.stat_begin(cond.pos.line_number());
                        self.gen_cond(cond)?
                    }
                    None => CondItem::new(GOTO),
                };
                let back = c.jump_true(&mut self.code)?;
                self.code.resolve_to(back, start_pc)?;
                self.code.resolve(c.false_jumps)?;
            }
        }

        let env = self.envs.pop()?;
        self.code.resolve(env.exit)?;
        Ok(())
    }

    fn gen_steps(&mut self, step: &'t [Expr]) -> Result<(), Error> {
        for expr in step {
            if self.code.is_alive() {
                self.code.stat_begin(expr.pos.line_number());
                self.gen_exec(expr)?;
            }
        }
        Ok(())
    }

    fn gen_labelled(&mut self, label: &'t str, body: &'t Stmt) -> Result<(), Error> {
        match &body.kind {
            StmtKind::While { cond, body } => self.gen_loop(Some(label), body, Some(cond), &[], true),
            StmtKind::DoWhile { body, cond } => self.gen_loop(Some(label), body, Some(cond), &[], false),
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.gen_for(Some(label), init, cond.as_ref(), step, body),
            _ => {
                self.envs.push(Env::new(EnvKind::Labelled(label)));
                self.gen_stat(body)?;
                let env = self.envs.pop()?;
                self.code.resolve(env.exit)?;
                Ok(())
            }
        }
    }

    fn gen_break(&mut self, label: Option<&str>) -> Result<(), Error> {
        let target = self.envs.break_target(label)?;
        self.unwind(target)?;
        let exit = self.code.branch(GOTO)?;
        self.envs.get_mut(target).add_exit(exit)?;
        self.end_finalizer_gaps(target)?;
        Ok(())
    }

    fn gen_continue(&mut self, label: Option<&str>) -> Result<(), Error> {
        let target = self.envs.continue_target(label)?;
        self.unwind(target)?;
        let cont = self.code.branch(GOTO)?;
        self.envs.get_mut(target).add_cont(cont)?;
        self.end_finalizer_gaps(target)?;
        Ok(())
    }

    fn gen_return(&mut self, expr: Option<&'t Expr>) -> Result<(), Error> {
        let limit = self.code.nextreg;
        match expr {
            Some(expr) => {
                let ret = self.graph.method(self.decl.method).ret.clone();
                let value = self.gen_expr(expr, &ret)?;
                let mut result = self.items().load(value)?;
                if self.envs.has_finally(0) {
                    let reg = self.code.new_temp(ret.clone())?;
                    result = Item::Local {
                        reg,
                        tc: ret.type_code(),
                    };
                    self.items().store(result.clone())?;
                }
                self.unwind(0)?;
                self.items().load(result)?;
                self.code.emitop0(IRETURN + ret.type_code().truncate().offset())?;
            }
            None => {
                self.unwind(0)?;
                self.code.emitop0(RETURN)?;
            }
        }
        self.end_finalizer_gaps(0)?;
        self.code.end_scopes(limit)?;
        Ok(())
    }

    fn gen_synchronized(&mut self, lock: &'t Expr, body: &'t Block) -> Result<(), Error> {
        let limit = self.code.nextreg;
        let lock_reg = self.code.new_temp(Type::Object(self.java.object))?;
        let lock_item = Item::Local {
            reg: lock_reg,
            tc: TypeCode::Object,
        };
        let value = self.gen_expr(lock, &lock.ty)?;
        let value = self.items().load(value)?;
        self.items().duplicate(&value)?;
        self.items().store(lock_item)?;
        self.code.emitop0(MONITORENTER)?;
        self.code.state.lock(lock_reg as u16);

        let mut env = Env::new(EnvKind::Synchronized);
        env.finalizer = Some(Finalizer::Synchronized { lock_reg });
        env.gaps = Some(vec![]);
        let idx = self.envs.push(env);
        self.gen_try(body, &[], idx)?;
        self.envs.pop()?;
        self.code.end_scopes(limit)?;
        Ok(())
    }

    fn gen_try_stat(
        &mut self,
        body: &'t Block,
        catches: &'t [Catch],
        finalizer: Option<&'t Block>,
    ) -> Result<(), Error> {
        if !self.use_jsr && !self.settings.target.generates_stack_map_table() {
            let jsr_limit = self.settings.jsr_limit;
            self.use_jsr = jsr_limit <= 0
                || (jsr_limit < 100
                    && finalizer.map_or(false, |finalizer| complexity(finalizer, jsr_limit) > jsr_limit));
        }

        let mut env = Env::new(EnvKind::Try);
        env.finalizer = Some(Finalizer::Try { finally: finalizer });
        env.gaps = Some(vec![]);
        let idx = self.envs.push(env);
        self.gen_try(body, catches, idx)?;
        self.envs.pop()?;
        Ok(())
    }

    /// Translate the body and handlers of a `try` or `synchronized` statement whose environment
    /// is at `idx`
    fn gen_try(&mut self, body: &'t Block, catches: &'t [Catch], idx: usize) -> Result<(), Error> {
        let limit = self.code.nextreg;
        let start_pc = self.code.cur_cp()?;
        let state_try = self.code.state.clone();
        self.gen_block(body, false)?;
        let end_pc = self.code.cur_cp()?;
        let has_finalizer = self
            .envs
            .get(idx)
            .finalizer
            .map_or(false, |finalizer| finalizer.has_code());
        let gaps = self.envs.get(idx).gaps.clone().unwrap_or_default();

        self.code.stat_begin(body.end.line_number());
        self.gen_finalizer(idx)?;
        let mut exit_chain = self.code.branch(GOTO)?;
        self.end_finalizer_gap(idx)?;

        if start_pc != end_pc {
            for (i, catch) in catches.iter().enumerate() {
                let caught = self.graph.local(catch.param).ty.clone();
                self.code.entry_point_with_push(&state_try, caught)?;
                self.gen_catch(catch, start_pc, end_pc, &gaps)?;
                self.gen_finalizer(idx)?;
                if has_finalizer || i + 1 < catches.len() {
                    let exit = self.code.branch(GOTO)?;
                    exit_chain = merge_chains(exit_chain, exit)?;
                }
                self.end_finalizer_gap(idx)?;
            }
        }

        if has_finalizer {
            // Registers of the finalizer copies below must not be shared with the code above
            self.code.new_reg_segment();

            let throwable = Type::Object(self.java.throwable);
            let catch_all_pc = self.code.entry_point_with_push(&state_try, throwable.clone())?;

            let gaps = self.envs.get_mut(idx).gaps.take().unwrap_or_default();
            let mut start_seg = start_pc;
            for pair in gaps.chunks(2) {
                if let [end_seg, next_start] = pair {
                    self.register_catch(body.end, start_seg, *end_seg, catch_all_pc, None)?;
                    start_seg = *next_start;
                }
            }
            self.envs.get_mut(idx).gaps = Some(vec![]);

            let finalizer_pos = self.finalizer_pos(idx);
            self.code.stat_begin(finalizer_pos.line_number());
            let exc_reg = self.code.new_temp(throwable)?;
            let exc = Item::Local {
                reg: exc_reg,
                tc: TypeCode::Object,
            };
            self.items().store(exc.clone())?;
            self.gen_finalizer(idx)?;
            self.items().load(exc)?;
            let end_seg = self
                .envs
                .get(idx)
                .gaps
                .as_ref()
                .and_then(|gaps| gaps.first().copied())
                .unwrap_or(start_seg);
            self.register_catch(body.end, start_seg, end_seg, catch_all_pc, None)?;
            self.code.emitop0(ATHROW)?;

            let jsrs = self.envs.get_mut(idx).cont.take();
            if jsrs.is_some() {
                self.code.resolve(jsrs)?;
                self.code.stat_begin(finalizer_pos.line_number());
                let ret_reg = self.code.new_temp(Type::ReturnAddress)?;
                self.items().store(Item::Local {
                    reg: ret_reg,
                    tc: TypeCode::Object,
                })?;
                self.gen_last(idx)?;
                self.code.emitop1w(RET, ret_reg)?;
            }
        }

        self.code.resolve(exit_chain)?;
        self.code.end_scopes(limit)?;
        Ok(())
    }

    /// Position to attribute the catch-all handler to
    fn finalizer_pos(&self, idx: usize) -> Pos {
        match self.envs.get(idx).finalizer {
            Some(Finalizer::Try {
                finally: Some(finally),
            }) => finally.stats.first().map_or(finally.end, |stat| stat.pos),
            _ => Pos::NONE,
        }
    }

    /// Register the handler of one `catch` clause over the protected range minus its gaps, then
    /// translate the clause
    fn gen_catch(&mut self, catch: &'t Catch, start_pc: usize, end_pc: usize, gaps: &[usize]) -> Result<(), Error> {
        if start_pc == end_pc {
            return Ok(());
        }
        let handler_pc = self.code.cur_cp()?;
        let catch_types = catch
            .types
            .iter()
            .map(|class| self.make_ref(catch.pos, &Type::Object(*class)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut start_pc = start_pc;
        for pair in gaps.chunks(2) {
            for catch_type in &catch_types {
                self.register_catch(catch.pos, start_pc, pair[0], handler_pc, Some(*catch_type))?;
            }
            if let Some(next_start) = pair.get(1) {
                start_pc = *next_start;
            }
        }
        if start_pc < end_pc {
            for catch_type in &catch_types {
                self.register_catch(catch.pos, start_pc, end_pc, handler_pc, Some(*catch_type))?;
            }
        }

        self.code.stat_begin(catch.pos.line_number());
        let limit = self.code.nextreg;
        let reg = self.new_local(catch.param, catch.pos)?;
        self.items().store(Item::Local {
            reg,
            tc: TypeCode::Object,
        })?;
        self.gen_block(&catch.body, false)?;
        self.code.end_scopes(limit)?;
        Ok(())
    }

    /// Run the finalizer of the environment at `idx` on the way out of it
    ///
    /// Inline finalizers get copied here. Subroutine finalizers get a `jsr`, collected in the
    /// `cont` chain of the environment until the subroutine is emitted. Either way, the code
    /// which follows starts a gap in the catch-all range.
    pub(super) fn gen_finalizer(&mut self, idx: usize) -> Result<(), Error> {
        if !self.code.is_alive() {
            return Ok(());
        }
        match self.envs.get(idx).finalizer {
            Some(Finalizer::Try { finally }) => {
                if self.use_jsr {
                    if finally.is_some() {
                        let mut jsr_state = self.code.state.clone();
                        jsr_state.push(Type::ReturnAddress);
                        let pc = self.code.emit_jump(JSR)?;
                        let env = self.envs.get_mut(idx);
                        env.cont = Some(Chain::new(pc, env.cont.take(), jsr_state));
                    }
                    self.open_finalizer_gap(idx)?;
                } else {
                    self.open_finalizer_gap(idx)?;
                    self.gen_last(idx)?;
                }
            }
            Some(Finalizer::Synchronized { .. }) => {
                self.gen_last(idx)?;
                self.open_finalizer_gap(idx)?;
            }
            None => (),
        }
        Ok(())
    }

    /// Emit the finalizer code itself, outside of the environment it belongs to
    fn gen_last(&mut self, idx: usize) -> Result<(), Error> {
        match self.envs.get(idx).finalizer {
            Some(Finalizer::Try {
                finally: Some(finally),
            }) => {
                let inner = self.envs.split_off(idx);
                let result = self.gen_block(finally, false);
                self.envs.restore(inner);
                result
            }
            Some(Finalizer::Synchronized { lock_reg }) => {
                if self.code.is_alive() {
                    self.items().load(Item::Local {
                        reg: lock_reg,
                        tc: TypeCode::Object,
                    })?;
                    self.code.emitop0(MONITOREXIT)?;
                    self.code.state.unlock(lock_reg as u16)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn open_finalizer_gap(&mut self, idx: usize) -> Result<(), Error> {
        let pc = self.code.cur_cp()?;
        if let Some(gaps) = self.envs.get_mut(idx).gaps.as_mut() {
            gaps.push(pc);
        }
        Ok(())
    }

    /// Close the gap opened by the last finalizer run of the environment at `idx`, if any
    pub(super) fn end_finalizer_gap(&mut self, idx: usize) -> Result<(), Error> {
        let open = matches!(&self.envs.get(idx).gaps, Some(gaps) if gaps.len() % 2 == 1);
        if open {
            let pc = self.code.cur_cp()?;
            if let Some(gaps) = self.envs.get_mut(idx).gaps.as_mut() {
                gaps.push(pc);
            }
        }
        Ok(())
    }

    /// Close finalizer gaps from the innermost environment out to `target`, inclusive
    pub(super) fn end_finalizer_gaps(&mut self, target: usize) -> Result<(), Error> {
        for idx in (target..self.envs.len()).rev() {
            self.end_finalizer_gap(idx)?;
        }
        Ok(())
    }

    /// Run the finalizers of every environment from the innermost out to `target`, inclusive
    pub(super) fn unwind(&mut self, target: usize) -> Result<(), Error> {
        for idx in (target..self.envs.len()).rev() {
            self.gen_finalizer(idx)?;
        }
        Ok(())
    }
}

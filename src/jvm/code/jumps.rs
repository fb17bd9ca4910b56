use super::{merge_chains, Chain, Code, FrameState, Jumps};
use crate::jvm::opcodes::*;
use crate::jvm::Error;

impl<'g> Code<'g> {
    /// Emit a jump with a placeholder offset, returning the offset of the instruction to patch
    ///
    /// In fat mode, conditional jumps become the negated condition skipping over a `goto_w`.
    pub fn emit_jump(&mut self, op: u8) -> Result<usize, Error> {
        if self.fatcode {
            if op == GOTO || op == JSR {
                self.emitop4_jump(op - GOTO + GOTO_W, 0)?;
            } else {
                self.emitop2_jump(negate(op), 8)?;
                self.emitop4_jump(GOTO_W, 0)?;
                self.alive = true;
                self.pending_stack_map = self.need_stack_map();
            }
            Ok(self.pc() - 5)
        } else {
            self.emitop2_jump(op, 0)?;
            Ok(self.pc() - 3)
        }
    }

    /// Emit a jump to a target that is not yet known
    ///
    /// A `goto` takes over the jumps pending at the current position, since they now land
    /// wherever it does.
    pub fn branch(&mut self, op: u8) -> Result<Jumps, Error> {
        let mut result = None;
        if op == GOTO {
            result = self.pending_jumps.take();
        }
        if op != DONTGOTO && self.is_alive() {
            let pc = self.emit_jump(op)?;
            result = Some(Chain::new(pc, result, self.state.clone()));
            self.fixed_pc = self.fatcode;
            if op == GOTO {
                self.alive = false;
            }
        }
        Ok(result)
    }

    /// Point every jump in the chain at `target`
    pub fn resolve_to(&mut self, chain: Jumps, target: usize) -> Result<(), Error> {
        let mut target = target;
        let mut new_state: Option<FrameState> = None;

        let mut next = chain;
        while let Some(node) = next {
            next = node.next.clone();

            if target >= self.pc() {
                target = self.pc();
            } else if !self.fatcode && self.get1(target) == GOTO {
                target = (target as isize + self.get2(target + 1) as isize) as usize;
            }

            let is_goto_to_next = !self.fatcode
                && self.get1(node.pc) == GOTO
                && node.pc + 3 == target
                && target == self.pc()
                && !self.fixed_pc;
            if is_goto_to_next {
                let old_cp = self.pc();
                if self.options.var_debug_info {
                    self.adjust_alive_ranges(old_cp, -3);
                }
                self.bytes.truncate(old_cp - 3);
                target -= 3;
                log::trace!("resolve@{}: dropped goto to next instruction", node.pc);
                if node.next.is_none() {
                    // The code stays reachable from the instruction before the dropped goto
                    self.alive = true;
                    break;
                }
            } else {
                let displacement = target as isize - node.pc as isize;
                if self.fatcode {
                    self.put4(node.pc + 1, displacement as i32);
                } else if let Ok(displacement) = i16::try_from(displacement) {
                    self.put2(node.pc + 1, displacement);
                } else {
                    self.fatcode = true;
                }
                log::trace!("resolve@{}: jump to {}", node.pc, target);
            }
            self.fixed_pc = true;

            if self.pc() == target {
                let mut joined = node.state.clone();
                if self.alive {
                    joined.join(new_state.as_ref().unwrap_or(&self.state), self.graph)?;
                } else {
                    self.alive = true;
                }
                new_state = Some(joined);
            }
        }

        if let Some(state) = new_state {
            self.set_defined_bits(&state.defined)?;
            self.state = state;
            self.max_stack = self.max_stack.max(self.state.depth());
            self.pending_stack_map = self.need_stack_map();
        }
        Ok(())
    }

    /// Make the chain land on the next emitted instruction
    pub fn resolve(&mut self, chain: Jumps) -> Result<(), Error> {
        let pending = self.pending_jumps.take();
        self.pending_jumps = merge_chains(chain, pending)?;
        Ok(())
    }

    pub(super) fn resolve_pending(&mut self) -> Result<(), Error> {
        let pending = self.pending_jumps.take();
        let target = self.pc();
        self.resolve_to(pending, target)
    }
}

#[cfg(test)]
mod test {
    use crate::jvm::code::{Code, CodeOptions, StackMapFormat};
    use crate::jvm::opcodes::*;
    use crate::jvm::{ClassGraph, ClassSymbol, Flags, MethodId, MethodSymbol, Type};

    fn graph_with_method(ret: Type) -> (ClassGraph, MethodId) {
        let mut graph = ClassGraph::new();
        let java = graph.insert_java_library_types();
        let class = graph.add_class(ClassSymbol::new("p/C", Flags::PUBLIC, Some(java.object)));
        let method = graph.add_method(MethodSymbol::new("m", class, Flags::STATIC, vec![], ret));
        (graph, method)
    }

    fn options(fat_code: bool) -> CodeOptions {
        CodeOptions {
            fat_code,
            line_debug_info: true,
            var_debug_info: false,
            stack_map: StackMapFormat::Jsr202,
        }
    }

    #[test]
    fn goto_to_next_instruction_is_dropped() {
        let (graph, method) = graph_with_method(Type::Void);
        let mut code = Code::new(&graph, method, options(false));
        code.method_entry().unwrap();
        code.emitop0(ICONST_0).unwrap();
        code.emitop0(POP).unwrap();
        let jump = code.branch(GOTO).unwrap();
        assert!(!code.is_alive(), "nothing falls through a goto");
        code.resolve(jump).unwrap();
        code.emitop0(RETURN).unwrap();

        let finished = code.finish();
        assert_eq!(finished.bytes, vec![ICONST_0, POP, RETURN]);
        assert_eq!(finished.stack_map, Some(vec![]), "fallthrough needs no frame");
    }

    #[test]
    fn forward_conditional_jump_is_patched() {
        let (graph, method) = graph_with_method(Type::Void);
        let mut code = Code::new(&graph, method, options(false));
        code.method_entry().unwrap();
        code.emitop0(ICONST_1).unwrap();
        let jump = code.branch(IFEQ).unwrap();
        code.emitop0(NOP).unwrap();
        code.resolve(jump).unwrap();
        code.emitop0(RETURN).unwrap();

        let finished = code.finish();
        assert_eq!(finished.bytes, vec![ICONST_1, IFEQ, 0, 4, NOP, RETURN]);
        assert_eq!(finished.stack_map.map(|frames| frames.len()), Some(1));
        assert_eq!(finished.max_stack, 1);
    }

    #[test]
    fn backward_jump_in_fat_mode() {
        let (graph, method) = graph_with_method(Type::Void);
        let mut code = Code::new(&graph, method, options(true));
        code.method_entry().unwrap();
        let head = code.entry_point().unwrap();
        code.emitop0(ICONST_1).unwrap();
        let exit = code.branch(IFEQ).unwrap();
        let back = code.branch(GOTO).unwrap();
        code.resolve_to(back, head).unwrap();
        code.resolve(exit).unwrap();
        code.emitop0(RETURN).unwrap();

        let finished = code.finish();
        assert_eq!(
            finished.bytes,
            vec![
                ICONST_1, IFNE, 0, 8, GOTO_W, 0, 0, 0, 10, GOTO_W, 0xFF, 0xFF, 0xFF, 0xF7, RETURN
            ]
        );
    }

    #[test]
    fn jumps_with_different_stacks_cannot_merge() {
        let (graph, method) = graph_with_method(Type::Void);
        let mut code = Code::new(&graph, method, options(false));
        code.method_entry().unwrap();
        code.emitop0(ICONST_1).unwrap();
        let first = code.branch(IFEQ).unwrap();
        code.emitop0(ICONST_1).unwrap();
        let second = code.branch(GOTO).unwrap();
        code.resolve(first).unwrap();
        assert!(code.resolve(second).is_err());
    }
}

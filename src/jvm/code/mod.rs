//! Instruction emitter
//!
//! [`Code`] writes one method body at a time. Alongside the bytes it simulates the operand stack
//! and the definite assignment of local registers, which is enough to patch forward jumps without
//! a pre-pass, to capture stack map frames at every entry point, and to catch translator bugs
//! that would leave the stack unbalanced.

mod chain;
mod emit;
mod jumps;
mod stack_map;
mod state;

pub use chain::{exclude_registers_from, merge_chains, Chain, Jumps};
pub use stack_map::{compress_frame, compress_frames, verifier_view, FrameRecord};
pub use state::FrameState;

use crate::util::Bits;
use crate::jvm::{
    ByteBuffer, ClassConstantIndex, ClassGraph, ClassId, Error, ExceptionHandler, LineNumber,
    LocalId, MethodId, StackMapFrame, Type, Width,
};

/// Largest method body, number of local registers, or stack depth a class file can express
pub const MAX_CODE: usize = u16::MAX as usize;
pub const MAX_LOCALS: usize = u16::MAX as usize;
pub const MAX_STACK: usize = u16::MAX as usize;

/// Kind of verifier metadata recorded while emitting code
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StackMapFormat {
    /// Targets verified by type inference
    None,

    /// `StackMapTable` attribute
    Jsr202,
}

#[derive(Copy, Clone, Debug)]
pub struct CodeOptions {
    /// Start out with 4-byte jump offsets
    pub fat_code: bool,
    pub line_debug_info: bool,
    pub var_debug_info: bool,
    pub stack_map: StackMapFormat,
}

/// Limit of the class file format exceeded by a finished method body
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CodeLimit {
    CodeSize,
    Locals,
    Stack,
}

/// Closed live range of a named local, as written into `LocalVariableTable`
#[derive(Clone, Debug, PartialEq)]
pub struct LocalVarEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name: String,
    pub ty: Type,
    pub reg: u16,
}

/// Everything the class writer needs from a finished method body
#[derive(Clone, Debug)]
pub struct MethodCode {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytes: Vec<u8>,
    pub catch_table: Vec<ExceptionHandler>,
    pub line_numbers: Vec<LineNumber>,
    pub local_vars: Vec<LocalVarEntry>,

    /// Compressed frames, or `None` when the target does not use stack maps
    pub stack_map: Option<Vec<StackMapFrame<Option<Type>>>>,
}

/// Local register occupied by a variable (named or synthetic)
#[derive(Clone, Debug)]
struct LocalVar {
    var: Option<LocalId>,
    name: String,
    ty: Type,
    synthetic: bool,

    /// Start of the live range currently open
    open_since: Option<usize>,
}

/// Emitter for the body of one method
pub struct Code<'g> {
    graph: &'g ClassGraph,
    method: MethodId,
    this_class: ClassId,
    options: CodeOptions,

    bytes: ByteBuffer,
    pub state: FrameState,

    /// Is the current position reachable by falling through?
    alive: bool,

    /// Jumps use 4-byte offsets
    pub fatcode: bool,

    /// Something depends on the current position, so the code before it must not move
    fixed_pc: bool,

    /// Jumps waiting to be resolved to the next emitted instruction
    pending_jumps: Jumps,
    pending_stack_map: bool,
    pending_stat_line: Option<u16>,

    max_stack: usize,
    max_locals: usize,

    /// First register not in use by a variable in scope
    pub nextreg: usize,

    lvar: Vec<Option<LocalVar>>,
    var_buffer: Vec<LocalVarEntry>,
    catch_info: Vec<ExceptionHandler>,

    /// Line number entries, most recent last
    line_info: Vec<LineNumber>,

    initial_frame: FrameRecord,
    frames: Vec<FrameRecord>,
}

impl<'g> Code<'g> {
    pub fn new(graph: &'g ClassGraph, method: MethodId, options: CodeOptions) -> Code<'g> {
        let data = graph.method(method);
        let this_class = data.owner;

        let mut initial_locals = vec![];
        if !data.is_static() {
            let receiver = if data.is_constructor() && !graph.is_object(this_class) {
                Type::UninitializedThis(this_class)
            } else {
                Type::Object(this_class)
            };
            initial_locals.push(Some(receiver));
        }
        for param in graph.external_params(method) {
            initial_locals.push(Some(verifier_view(&param)));
        }

        Code {
            graph,
            method,
            this_class,
            options,
            bytes: ByteBuffer::new(),
            state: FrameState::new(),
            alive: true,
            fatcode: options.fat_code,
            fixed_pc: false,
            pending_jumps: None,
            pending_stack_map: false,
            pending_stat_line: None,
            max_stack: 0,
            max_locals: 0,
            nextreg: 0,
            lvar: vec![],
            var_buffer: vec![],
            catch_info: vec![],
            line_info: vec![],
            initial_frame: FrameRecord {
                pc: usize::MAX,
                locals: initial_locals,
                stack: vec![],
            },
            frames: vec![],
        }
    }

    pub fn graph(&self) -> &'g ClassGraph {
        self.graph
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn this_class(&self) -> ClassId {
        self.this_class
    }

    pub fn options(&self) -> &CodeOptions {
        &self.options
    }

    fn need_stack_map(&self) -> bool {
        self.options.stack_map != StackMapFormat::None
    }

    /// Raw current offset, without resolving anything pending
    pub fn pc(&self) -> usize {
        self.bytes.len()
    }

    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    /// Is the current position reachable, either by falling through or by a pending jump?
    pub fn is_alive(&self) -> bool {
        self.alive || self.pending_jumps.is_some()
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    /// Current offset, made stable: pending jumps land here and nothing before it moves
    pub fn cur_cp(&mut self) -> Result<usize, Error> {
        if self.pending_jumps.is_some() {
            self.resolve_pending()?;
        }
        if self.pending_stat_line.is_some() {
            self.mark_stat_begin();
        }
        self.fixed_pc = true;
        Ok(self.pc())
    }

    /// Mark the start of the method body (which needs no frame of its own)
    pub fn method_entry(&mut self) -> Result<usize, Error> {
        let pc = self.cur_cp()?;
        self.alive = true;
        Ok(pc)
    }

    /// Declare the current position reachable from elsewhere, with the current state
    pub fn entry_point(&mut self) -> Result<usize, Error> {
        let pc = self.cur_cp()?;
        self.alive = true;
        self.pending_stack_map = self.need_stack_map();
        Ok(pc)
    }

    /// Declare the current position reachable from elsewhere, in the given state
    pub fn entry_point_with(&mut self, state: &FrameState) -> Result<usize, Error> {
        let pc = self.cur_cp()?;
        self.alive = true;
        let new_state = state.clone();
        self.set_defined_bits(&new_state.defined)?;
        self.state = new_state;
        self.max_stack = self.max_stack.max(self.state.depth());
        self.pending_stack_map = self.need_stack_map();
        Ok(pc)
    }

    /// Like [`Code::entry_point_with`], with one extra value pushed (eg. a caught exception)
    pub fn entry_point_with_push(&mut self, state: &FrameState, pushed: Type) -> Result<usize, Error> {
        let pc = self.cur_cp()?;
        self.alive = true;
        let new_state = state.clone();
        self.set_defined_bits(&new_state.defined)?;
        self.state = new_state;
        self.push(pushed);
        self.pending_stack_map = self.need_stack_map();
        Ok(pc)
    }

    fn push(&mut self, ty: Type) {
        self.state.push(ty);
        self.max_stack = self.max_stack.max(self.state.depth());
    }

    /// Give the `null` on top of the stack a static type
    pub fn force_stack_top(&mut self, ty: Type) {
        if self.alive {
            self.state.force_stack_top(ty);
        }
    }

    /// Record that an uninitialized value (`this` or the result of `new`) has been initialized
    pub fn mark_initialized(&mut self, old: &Type) {
        let new = match old {
            Type::UninitializedThis(class) | Type::Uninitialized { class, .. } => Type::Object(*class),
            _ => return,
        };
        self.state.mark_initialized(old, &new);
        for local in self.lvar.iter_mut().flatten() {
            if &local.ty == old {
                local.ty = new.clone();
            }
        }
    }

    /* Local registers */

    /// Reserve a register for a value of the given type, without tracking it as a variable
    pub fn new_local(&mut self, ty: &Type) -> usize {
        let reg = self.nextreg;
        self.nextreg = reg + ty.type_code().width().max(1);
        self.max_locals = self.max_locals.max(self.nextreg);
        reg
    }

    /// Reserve a register for a variable, initially undefined
    pub fn new_local_var(
        &mut self,
        name: impl Into<String>,
        ty: Type,
        var: Option<LocalId>,
        synthetic: bool,
    ) -> Result<usize, Error> {
        let reg = self.new_local(&ty);
        if self.lvar.len() <= reg {
            self.lvar.resize(reg + 1, None);
        }
        if self.pending_jumps.is_some() {
            self.resolve_pending()?;
        }
        self.lvar[reg] = Some(LocalVar {
            var,
            name: name.into(),
            ty,
            synthetic,
            open_since: None,
        });
        self.state.defined.excl(reg);
        Ok(reg)
    }

    /// Synthetic temporary (lock holders, finalizer return addresses, ...)
    pub fn new_temp(&mut self, ty: Type) -> Result<usize, Error> {
        self.new_local_var("", ty, None, true)
    }

    /// Type of the variable in a register
    pub fn local_type(&self, reg: usize) -> Result<&Type, Error> {
        match self.lvar.get(reg) {
            Some(Some(local)) => Ok(&local.ty),
            _ => Err(Error::UnknownRegister(reg as u16)),
        }
    }

    /// Variable held in a register, if it is a declared one
    pub fn local_var(&self, reg: usize) -> Option<LocalId> {
        self.lvar.get(reg)?.as_ref()?.var
    }

    /// Mark a register as definitely assigned, opening a live range
    pub fn set_defined(&mut self, reg: usize) {
        let pc = self.pc();
        match self.lvar.get_mut(reg) {
            Some(Some(local)) => {
                self.state.defined.incl(reg);
                if pc < MAX_CODE && local.open_since.is_none() {
                    local.open_since = Some(pc);
                }
            }
            _ => self.state.defined.excl(reg),
        }
    }

    /// Mark a register as no longer definitely assigned, closing its live range
    pub fn set_undefined(&mut self, reg: usize) -> Result<(), Error> {
        self.state.defined.excl(reg);
        self.close_range(reg)
    }

    fn close_range(&mut self, reg: usize) -> Result<(), Error> {
        let is_open = matches!(self.lvar.get(reg), Some(Some(local)) if local.open_since.is_some());
        if !is_open {
            return Ok(());
        }
        let end = self.cur_cp()?;
        if let Some(Some(local)) = self.lvar.get_mut(reg) {
            if let Some(start) = local.open_since.take() {
                let length = end.saturating_sub(start);
                let keep = self.options.var_debug_info && !local.synthetic && length < MAX_CODE;
                if keep && length > 0 {
                    self.var_buffer.push(LocalVarEntry {
                        start_pc: start as u16,
                        length: length as u16,
                        name: local.name.clone(),
                        ty: local.ty.clone(),
                        reg: reg as u16,
                    });
                }
            }
        }
        Ok(())
    }

    /// Bring the definitely assigned registers in line with `new_defined`
    ///
    /// Registers at or above `nextreg` are out of scope and simply dropped.
    pub fn set_defined_bits(&mut self, new_defined: &Bits) -> Result<(), Error> {
        if !self.alive || *new_defined == self.state.defined {
            return Ok(());
        }
        let diff = self.state.defined.xor(new_defined);
        for reg in diff.iter().collect::<Vec<_>>() {
            if reg >= self.nextreg {
                self.state.defined.excl(reg);
            } else if self.state.defined.is_member(reg) {
                self.set_undefined(reg)?;
            } else {
                self.set_defined(reg);
            }
        }
        Ok(())
    }

    /// End the scope of the variable in one register
    pub fn end_scope(&mut self, reg: usize) -> Result<(), Error> {
        self.close_range(reg)?;
        if let Some(slot) = self.lvar.get_mut(reg) {
            *slot = None;
        }
        self.state.defined.excl(reg);
        Ok(())
    }

    /// End the scopes of every variable from register `first` on, freeing their registers
    pub fn end_scopes(&mut self, first: usize) -> Result<(), Error> {
        let prev_nextreg = self.nextreg;
        self.nextreg = first;
        for reg in first..prev_nextreg {
            self.end_scope(reg)?;
        }
        Ok(())
    }

    /// Start allocating registers above every register used so far
    pub fn new_reg_segment(&mut self) {
        self.nextreg = self.max_locals;
    }

    /// Shift closed live ranges after code at `old_cp` moved by `delta` bytes
    fn adjust_alive_ranges(&mut self, old_cp: usize, delta: isize) {
        for entry in &mut self.var_buffer {
            if entry.start_pc as usize + entry.length as usize >= old_cp {
                entry.length = (entry.length as isize + delta).max(0) as u16;
            }
        }
    }

    /* Debug info and exception table */

    /// Request a line number entry for the next emitted instruction
    pub fn stat_begin(&mut self, line: Option<u16>) {
        if line.is_some() {
            self.pending_stat_line = line;
        }
    }

    fn mark_stat_begin(&mut self) {
        if let Some(line) = self.pending_stat_line.take() {
            if self.alive && self.options.line_debug_info && self.pc() <= MAX_CODE {
                self.add_line_number(self.pc() as u16, line);
            }
        }
    }

    fn add_line_number(&mut self, start_pc: u16, line: u16) {
        if matches!(self.line_info.last(), Some(last) if last.start_pc == start_pc) {
            self.line_info.pop();
        }
        if !matches!(self.line_info.last(), Some(last) if last.line == line) {
            self.line_info.push(LineNumber { start_pc, line });
        }
    }

    pub fn add_catch(
        &mut self,
        start_pc: u16,
        end_pc: u16,
        handler_pc: u16,
        catch_type: Option<ClassConstantIndex>,
    ) {
        self.catch_info.push(ExceptionHandler {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        });
    }

    /// Drop empty ranges, and one-byte ranges covering just a handler's first instruction
    pub fn compress_catch_table(&mut self) {
        let handler_pcs: Vec<u16> = self.catch_info.iter().map(|entry| entry.handler_pc).collect();
        self.catch_info.retain(|entry| {
            let empty = entry.start_pc == entry.end_pc;
            let covers_handler = entry.start_pc as u32 + 1 == entry.end_pc as u32
                && handler_pcs.contains(&entry.start_pc);
            !empty && !covers_handler
        });
    }

    /// First format limit the finished body exceeds, if any
    pub fn check_limits(&self) -> Option<CodeLimit> {
        if self.pc() > MAX_CODE {
            Some(CodeLimit::CodeSize)
        } else if self.max_locals > MAX_LOCALS {
            Some(CodeLimit::Locals)
        } else if self.max_stack > MAX_STACK {
            Some(CodeLimit::Stack)
        } else {
            None
        }
    }

    /* Stack maps */

    fn emit_stack_map(&mut self) {
        let pc = self.pc();
        if !self.need_stack_map() {
            return;
        }

        let mut locals_size = 0;
        for reg in 0..self.max_locals {
            if let Some(Some(local)) = self.lvar.get(reg) {
                if self.state.defined.is_member(reg) {
                    locals_size = reg + local.ty.width().max(1);
                }
            }
        }
        let mut locals = vec![];
        let mut reg = 0;
        while reg < locals_size {
            match self.lvar.get(reg) {
                Some(Some(local)) if self.state.defined.is_member(reg) => {
                    locals.push(Some(verifier_view(&local.ty)));
                    reg += local.ty.width().max(1);
                }
                _ => {
                    locals.push(None);
                    reg += 1;
                }
            }
        }
        let stack = self.state.stack.iter().flatten().map(verifier_view).collect();

        if matches!(self.frames.last(), Some(last) if last.pc == pc) {
            self.frames.pop();
        }
        log::trace!("frame@{} locals={:?} stack={:?}", pc, locals, stack);
        self.frames.push(FrameRecord { pc, locals, stack });
    }

    /// Wrap up the method body
    pub fn finish(self) -> MethodCode {
        let stack_map = if self.need_stack_map() {
            Some(compress_frames(&self.initial_frame, &self.frames))
        } else {
            None
        };
        let mut local_vars = self.var_buffer;
        local_vars.sort_by_key(|entry| (entry.start_pc, entry.reg));
        MethodCode {
            max_stack: self.max_stack.min(MAX_STACK) as u16,
            max_locals: self.max_locals.min(MAX_LOCALS) as u16,
            bytes: self.bytes.into_vec(),
            catch_table: self.catch_info,
            line_numbers: self.line_info,
            local_vars,
            stack_map,
        }
    }
}

use super::Code;
use crate::jvm::opcodes::*;
use crate::jvm::{
    ClassConstantIndex, ClassId, ConstantIndex, Error, FieldRefConstantIndex, MethodId,
    MethodRefConstantIndex, Type, Width,
};

impl<'g> Code<'g> {
    fn emit1(&mut self, od: u8) {
        if self.alive {
            self.bytes.append_u1(od);
        }
    }

    fn emit2(&mut self, od: u16) {
        if self.alive {
            self.bytes.append_u2(od);
        }
    }

    /// Append a raw 4-byte word (switch tables)
    pub fn emit4(&mut self, od: i32) {
        if self.alive {
            self.bytes.append_i4(od);
        }
    }

    pub fn put4(&mut self, pc: usize, od: i32) {
        self.bytes.put_u4(pc, od as u32);
    }

    pub fn get4(&self, pc: usize) -> i32 {
        self.bytes.get_i4(pc)
    }

    pub(super) fn put2(&mut self, pc: usize, od: i16) {
        self.bytes.put_u2(pc, od as u16);
    }

    pub(super) fn get1(&self, pc: usize) -> u8 {
        self.bytes.get_u1(pc)
    }

    pub(super) fn get2(&self, pc: usize) -> i16 {
        self.bytes.get_i2(pc)
    }

    /// Pad with `nop` up to a multiple of `incr`
    pub fn align(&mut self, incr: usize) -> Result<(), Error> {
        if self.alive {
            while self.pc() % incr != 0 {
                self.emitop0(NOP)?;
            }
        }
        Ok(())
    }

    /// Emit an opcode byte, after flushing whatever is pending at this position
    fn emitop(&mut self, op: u8) -> Result<(), Error> {
        if self.pending_jumps.is_some() {
            self.resolve_pending()?;
        }
        if self.alive {
            if self.pending_stat_line.is_some() {
                self.mark_stat_begin();
            }
            if self.pending_stack_map {
                self.pending_stack_map = false;
                self.emit_stack_map();
            }
            log::trace!("emit@{} stack={}: {}", self.pc(), self.state.depth(), mnemonic(op));
            self.bytes.append_u1(op);
        }
        Ok(())
    }

    fn pop(&mut self, slots: usize, op: u8) -> Result<(), Error> {
        self.state.pop_slots(slots, op)
    }

    /// Returning while holding a monitor means a finalizer was skipped
    fn check_unlocked(&self) -> Result<(), Error> {
        match self.state.locks.last() {
            None => Ok(()),
            Some(held) => Err(Error::UnbalancedMonitor {
                expected: None,
                found: *held,
            }),
        }
    }

    /// Emit an instruction without operands
    pub fn emitop0(&mut self, op: u8) -> Result<(), Error> {
        self.emitop(op)?;
        if !self.alive {
            return Ok(());
        }
        match op {
            AALOAD => {
                self.pop(1, op)?;
                let array = self.state.pop1(op)?;
                let elem = match array {
                    Type::Array(elem) => *elem,
                    _ => Type::Null,
                };
                self.push(elem);
            }
            GOTO => self.mark_dead(),
            NOP | INEG | LNEG | FNEG | DNEG | I2B | I2C | I2S => (),
            ACONST_NULL => self.push(Type::Null),
            ICONST_M1..=ICONST_5 | ILOAD_0..=ILOAD_3 => self.push(Type::INT),
            LCONST_0 | LCONST_1 | LLOAD_0..=LLOAD_3 => self.push(Type::LONG),
            FCONST_0..=FCONST_2 | FLOAD_0..=FLOAD_3 => self.push(Type::FLOAT),
            DCONST_0 | DCONST_1 | DLOAD_0..=DLOAD_3 => self.push(Type::DOUBLE),
            ALOAD_0..=ALOAD_3 => {
                let ty = self.local_type((op - ALOAD_0) as usize)?.clone();
                self.push(ty);
            }
            IALOAD | BALOAD | CALOAD | SALOAD => {
                self.pop(2, op)?;
                self.push(Type::INT);
            }
            LALOAD => {
                self.pop(2, op)?;
                self.push(Type::LONG);
            }
            FALOAD => {
                self.pop(2, op)?;
                self.push(Type::FLOAT);
            }
            DALOAD => {
                self.pop(2, op)?;
                self.push(Type::DOUBLE);
            }
            ISTORE_0..=ISTORE_3 | FSTORE_0..=FSTORE_3 | ASTORE_0..=ASTORE_3 | POP => {
                self.pop(1, op)?
            }
            LSTORE_0..=LSTORE_3 | DSTORE_0..=DSTORE_3 | POP2 => self.pop(2, op)?,
            IASTORE | FASTORE | AASTORE | BASTORE | CASTORE | SASTORE => self.pop(3, op)?,
            LASTORE | DASTORE => self.pop(4, op)?,
            DUP => {
                let top = self.state.pop1(op)?;
                self.push(top.clone());
                self.push(top);
            }
            RETURN => {
                self.check_unlocked()?;
                self.mark_dead();
            }
            IRETURN | FRETURN | ARETURN => {
                self.check_unlocked()?;
                self.pop(1, op)?;
                self.mark_dead();
            }
            LRETURN | DRETURN => {
                self.check_unlocked()?;
                self.pop(2, op)?;
                self.mark_dead();
            }
            ATHROW => {
                self.pop(1, op)?;
                self.mark_dead();
            }
            L2I => {
                self.pop(2, op)?;
                self.push(Type::INT);
            }
            I2L => {
                self.pop(1, op)?;
                self.push(Type::LONG);
            }
            I2F => {
                self.pop(1, op)?;
                self.push(Type::FLOAT);
            }
            I2D => {
                self.pop(1, op)?;
                self.push(Type::DOUBLE);
            }
            L2F => {
                self.pop(2, op)?;
                self.push(Type::FLOAT);
            }
            L2D => {
                self.pop(2, op)?;
                self.push(Type::DOUBLE);
            }
            F2I => {
                self.pop(1, op)?;
                self.push(Type::INT);
            }
            F2L => {
                self.pop(1, op)?;
                self.push(Type::LONG);
            }
            F2D => {
                self.pop(1, op)?;
                self.push(Type::DOUBLE);
            }
            D2I => {
                self.pop(2, op)?;
                self.push(Type::INT);
            }
            D2L => {
                self.pop(2, op)?;
                self.push(Type::LONG);
            }
            D2F => {
                self.pop(2, op)?;
                self.push(Type::FLOAT);
            }
            LCMP | DCMPL | DCMPG => {
                self.pop(4, op)?;
                self.push(Type::INT);
            }
            FCMPL | FCMPG => {
                self.pop(2, op)?;
                self.push(Type::INT);
            }
            ARRAYLENGTH => {
                self.pop(1, op)?;
                self.push(Type::INT);
            }

            // The result replaces the operand below
            IADD | ISUB | IMUL | IDIV | IREM | ISHL | ISHR | IUSHR | IAND | IOR | IXOR
            | FADD | FSUB | FMUL | FDIV | FREM | LSHL | LSHR | LUSHR => self.pop(1, op)?,
            LADD | LSUB | LMUL | LDIV | LREM | LAND | LOR | LXOR | DADD | DSUB | DMUL | DDIV
            | DREM => self.pop(2, op)?,

            MONITORENTER | MONITOREXIT | TABLESWITCH | LOOKUPSWITCH => self.pop(1, op)?,

            DUP_X1 => {
                let value1 = self.state.pop1(op)?;
                let value2 = self.state.pop1(op)?;
                self.push(value1.clone());
                self.push(value2);
                self.push(value1);
            }
            DUP_X2 => {
                let value1 = self.state.pop1(op)?;
                if self.state.top_is_wide() {
                    let value2 = self.state.pop2(op)?;
                    self.push(value1.clone());
                    self.push(value2);
                    self.push(value1);
                } else {
                    let value2 = self.state.pop1(op)?;
                    let value3 = self.state.pop1(op)?;
                    self.push(value1.clone());
                    self.push(value3);
                    self.push(value2);
                    self.push(value1);
                }
            }
            DUP2 => {
                if self.state.top_is_wide() {
                    let value1 = self.state.pop2(op)?;
                    self.push(value1.clone());
                    self.push(value1);
                } else {
                    let value1 = self.state.pop1(op)?;
                    let value2 = self.state.pop1(op)?;
                    self.push(value2.clone());
                    self.push(value1.clone());
                    self.push(value2);
                    self.push(value1);
                }
            }
            DUP2_X1 => {
                if self.state.top_is_wide() {
                    let value1 = self.state.pop2(op)?;
                    let value2 = self.state.pop1(op)?;
                    self.push(value1.clone());
                    self.push(value2);
                    self.push(value1);
                } else {
                    let value1 = self.state.pop1(op)?;
                    let value2 = self.state.pop1(op)?;
                    let value3 = self.state.pop1(op)?;
                    self.push(value2.clone());
                    self.push(value1.clone());
                    self.push(value3);
                    self.push(value2);
                    self.push(value1);
                }
            }
            DUP2_X2 => {
                if self.state.top_is_wide() {
                    let value1 = self.state.pop2(op)?;
                    if self.state.top_is_wide() {
                        let value2 = self.state.pop2(op)?;
                        self.push(value1.clone());
                        self.push(value2);
                        self.push(value1);
                    } else {
                        let value2 = self.state.pop1(op)?;
                        let value3 = self.state.pop1(op)?;
                        self.push(value1.clone());
                        self.push(value3);
                        self.push(value2);
                        self.push(value1);
                    }
                } else {
                    let value1 = self.state.pop1(op)?;
                    let value2 = self.state.pop1(op)?;
                    if self.state.top_is_wide() {
                        let value3 = self.state.pop2(op)?;
                        self.push(value2.clone());
                        self.push(value1.clone());
                        self.push(value3);
                        self.push(value2);
                        self.push(value1);
                    } else {
                        let value3 = self.state.pop1(op)?;
                        let value4 = self.state.pop1(op)?;
                        self.push(value2.clone());
                        self.push(value1.clone());
                        self.push(value4);
                        self.push(value3);
                        self.push(value2);
                        self.push(value1);
                    }
                }
            }
            SWAP => {
                let value1 = self.state.pop1(op)?;
                let value2 = self.state.pop1(op)?;
                self.push(value1);
                self.push(value2);
            }
            _ => return Err(Error::UnexpectedOpcode(mnemonic(op))),
        }
        Ok(())
    }

    /// Emit `bipush`
    pub fn emit_bipush(&mut self, value: i8) -> Result<(), Error> {
        self.emitop(BIPUSH)?;
        if self.alive {
            self.emit1(value as u8);
            self.push(Type::INT);
        }
        Ok(())
    }

    /// Emit `sipush`
    pub fn emit_sipush(&mut self, value: i16) -> Result<(), Error> {
        self.emitop(SIPUSH)?;
        if self.alive {
            self.emit2(value as u16);
            self.push(Type::INT);
        }
        Ok(())
    }

    /// Load a constant from the pool, picking `ldc`, `ldc_w`, or `ldc2_w`
    pub fn emit_ldc(&mut self, index: ConstantIndex, pushed: Type) -> Result<(), Error> {
        if pushed.width() == 2 {
            self.emitop(LDC2_W)?;
            self.emit2(index.0);
        } else if index.0 <= 0xFF {
            self.emitop(LDC)?;
            self.emit1(index.0 as u8);
        } else {
            self.emitop(LDC_W)?;
            self.emit2(index.0);
        }
        if self.alive {
            self.push(pushed);
        }
        Ok(())
    }

    /// Emit an instruction taking a local register, using `wide` when the register needs it
    pub fn emitop1w(&mut self, op: u8, reg: usize) -> Result<(), Error> {
        if reg > 0xFF {
            self.emitop(WIDE)?;
            self.emitop(op)?;
            self.emit2(reg as u16);
        } else {
            self.emitop(op)?;
            self.emit1(reg as u8);
        }
        if !self.alive {
            return Ok(());
        }
        match op {
            ILOAD => self.push(Type::INT),
            LLOAD => self.push(Type::LONG),
            FLOAD => self.push(Type::FLOAT),
            DLOAD => self.push(Type::DOUBLE),
            ALOAD => {
                let ty = self.local_type(reg)?.clone();
                self.push(ty);
            }
            LSTORE | DSTORE => self.pop(2, op)?,
            ISTORE | FSTORE | ASTORE => self.pop(1, op)?,
            RET => self.mark_dead(),
            _ => return Err(Error::UnexpectedOpcode(mnemonic(op))),
        }
        Ok(())
    }

    /// Emit `iinc`, using `wide` for large registers or increments outside a byte
    pub fn emit_iinc(&mut self, reg: usize, incr: i16) -> Result<(), Error> {
        if reg > 0xFF || i8::try_from(incr).is_err() {
            self.emitop(WIDE)?;
            self.emitop(IINC)?;
            self.emit2(reg as u16);
            self.emit2(incr as u16);
        } else {
            self.emitop(IINC)?;
            self.emit1(reg as u8);
            self.emit1(incr as i8 as u8);
        }
        Ok(())
    }

    /// Emit a jump-like instruction with a 2-byte operand (the offset gets patched later)
    pub(super) fn emitop2_jump(&mut self, op: u8, od: i16) -> Result<(), Error> {
        self.emitop(op)?;
        if !self.alive {
            return Ok(());
        }
        self.emit2(od as u16);
        match op {
            IFEQ..=IFLE | IFNULL | IFNONNULL => self.pop(1, op)?,
            IF_ICMPEQ..=IF_ACMPNE => self.pop(2, op)?,
            GOTO => self.mark_dead(),
            JSR => (),
            _ => return Err(Error::UnexpectedOpcode(mnemonic(op))),
        }
        Ok(())
    }

    /// Emit `goto_w` or `jsr_w`
    pub(super) fn emitop4_jump(&mut self, op: u8, od: i32) -> Result<(), Error> {
        self.emitop(op)?;
        if !self.alive {
            return Ok(());
        }
        self.emit4(od);
        match op {
            GOTO_W => self.mark_dead(),
            JSR_W => (),
            _ => return Err(Error::UnexpectedOpcode(mnemonic(op))),
        }
        Ok(())
    }

    /// Emit `getstatic`, `putstatic`, `getfield`, or `putfield` on a field of type `ty`
    pub fn emit_field(&mut self, op: u8, field: FieldRefConstantIndex, ty: &Type) -> Result<(), Error> {
        self.emitop(op)?;
        if !self.alive {
            return Ok(());
        }
        self.emit2(field.0 .0);
        match op {
            GETSTATIC => self.push(ty.clone()),
            PUTSTATIC => self.pop(ty.width(), op)?,
            GETFIELD => {
                self.pop(1, op)?;
                self.push(ty.clone());
            }
            PUTFIELD => self.pop(ty.width() + 1, op)?,
            _ => return Err(Error::UnexpectedOpcode(mnemonic(op))),
        }
        Ok(())
    }

    /// Emit `new`, pushing an uninitialized reference tagged with this instruction's offset
    pub fn emit_new(&mut self, index: ClassConstantIndex, class: ClassId) -> Result<(), Error> {
        self.emitop(NEW)?;
        if self.alive {
            self.emit2(index.0 .0);
            let offset = (self.pc() - 3) as u32;
            self.push(Type::Uninitialized { class, offset });
        }
        Ok(())
    }

    pub fn emit_checkcast(&mut self, index: ClassConstantIndex, target: Type) -> Result<(), Error> {
        self.emitop(CHECKCAST)?;
        if self.alive {
            self.emit2(index.0 .0);
            self.pop(1, CHECKCAST)?;
            self.push(target);
        }
        Ok(())
    }

    pub fn emit_instanceof(&mut self, index: ClassConstantIndex) -> Result<(), Error> {
        self.emitop(INSTANCEOF)?;
        if self.alive {
            self.emit2(index.0 .0);
            self.pop(1, INSTANCEOF)?;
            self.push(Type::INT);
        }
        Ok(())
    }

    /// Emit any of the invoke instructions for `method`
    ///
    /// Arguments (and the receiver, unless static) are popped and the result pushed. Calling a
    /// constructor through `invokespecial` initializes the uninitialized reference under the
    /// arguments.
    pub fn emit_invoke(
        &mut self,
        op: u8,
        index: MethodRefConstantIndex,
        method: MethodId,
    ) -> Result<(), Error> {
        let graph = self.graph;
        let data = graph.method(method);
        let arg_size = graph.external_params(method).width();
        self.emitop(op)?;
        if !self.alive {
            return Ok(());
        }
        self.emit2(index.0 .0);
        match op {
            INVOKESTATIC => self.pop(arg_size, op)?,
            INVOKEVIRTUAL => self.pop(arg_size + 1, op)?,
            INVOKEINTERFACE => {
                self.emit1((arg_size + 1) as u8);
                self.emit1(0);
                self.pop(arg_size + 1, op)?;
            }
            INVOKESPECIAL => {
                self.pop(arg_size, op)?;
                if data.is_constructor() {
                    if let Some(receiver) = self.state.peek().cloned() {
                        self.mark_initialized(&receiver);
                    }
                }
                self.pop(1, op)?;
            }
            _ => return Err(Error::UnexpectedOpcode(mnemonic(op))),
        }
        self.push(data.ret.clone());
        Ok(())
    }

    /// Emit `newarray` for a primitive element type
    pub fn emit_newarray(&mut self, elem_code: u8, array_type: Type) -> Result<(), Error> {
        self.emitop(NEWARRAY)?;
        if self.alive {
            self.emit1(elem_code);
            self.pop(1, NEWARRAY)?;
            self.push(array_type);
        }
        Ok(())
    }

    /// Emit `anewarray` for a reference element type
    pub fn emit_anewarray(&mut self, elem: ClassConstantIndex, array_type: Type) -> Result<(), Error> {
        self.emitop(ANEWARRAY)?;
        if self.alive {
            self.emit2(elem.0 .0);
            self.pop(1, ANEWARRAY)?;
            self.push(array_type);
        }
        Ok(())
    }

    pub fn emit_multianewarray(
        &mut self,
        dims: u8,
        index: ClassConstantIndex,
        array_type: Type,
    ) -> Result<(), Error> {
        self.emitop(MULTIANEWARRAY)?;
        if self.alive {
            self.emit2(index.0 .0);
            self.emit1(dims);
            self.pop(dims as usize, MULTIANEWARRAY)?;
            self.push(array_type);
        }
        Ok(())
    }
}

use crate::jvm::{mnemonic, ClassGraph, Error, Type, Width};
use crate::util::Bits;

/// Simulated machine state at one point of a method's code
///
/// The operand stack holds one entry per slot: a wide (`long` or `double`) value takes its own
/// type followed by a `None` for the upper half. Sub-int types are normalized to `int` when
/// pushed, which is how the verifier sees them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameState {
    pub stack: Vec<Option<Type>>,

    /// Local registers which are definitely assigned
    pub defined: Bits,

    /// Registers holding the monitors entered so far, innermost last
    pub locks: Vec<u16>,
}

impl FrameState {
    pub fn new() -> FrameState {
        FrameState::default()
    }

    /// Stack depth in slots
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self, ty: Type) {
        match ty {
            Type::Void => (),
            Type::Base(base) if base.is_int_like() => self.stack.push(Some(Type::INT)),
            ty if ty.width() == 2 => {
                self.stack.push(Some(ty));
                self.stack.push(None);
            }
            ty => self.stack.push(Some(ty)),
        }
    }

    /// Pop a one-slot value
    pub fn pop1(&mut self, opcode: u8) -> Result<Type, Error> {
        match self.stack.pop() {
            Some(Some(ty)) => Ok(ty),
            Some(None) => Err(Error::InvalidWidth {
                opcode: mnemonic(opcode),
                expected: 1,
            }),
            None => Err(Error::StackUnderflow {
                opcode: mnemonic(opcode),
            }),
        }
    }

    /// Pop a two-slot value
    pub fn pop2(&mut self, opcode: u8) -> Result<Type, Error> {
        match self.stack.pop() {
            Some(None) => (),
            Some(Some(_)) => {
                return Err(Error::InvalidWidth {
                    opcode: mnemonic(opcode),
                    expected: 2,
                })
            }
            None => {
                return Err(Error::StackUnderflow {
                    opcode: mnemonic(opcode),
                })
            }
        }
        match self.stack.pop() {
            Some(Some(ty)) => Ok(ty),
            _ => Err(Error::StackUnderflow {
                opcode: mnemonic(opcode),
            }),
        }
    }

    /// Pop a value of either width
    pub fn pop_value(&mut self, opcode: u8) -> Result<Type, Error> {
        if self.top_is_wide() {
            self.pop2(opcode)
        } else {
            self.pop1(opcode)
        }
    }

    /// Pop raw slots, regardless of what values they hold
    pub fn pop_slots(&mut self, slots: usize, opcode: u8) -> Result<(), Error> {
        if slots > self.stack.len() {
            return Err(Error::StackUnderflow {
                opcode: mnemonic(opcode),
            });
        }
        self.stack.truncate(self.stack.len() - slots);
        Ok(())
    }

    /// Type of the value on top of the stack
    pub fn peek(&self) -> Option<&Type> {
        match self.stack.last()? {
            Some(ty) => Some(ty),
            None => self.stack.get(self.stack.len().checked_sub(2)?)?.as_ref(),
        }
    }

    pub fn top_is_wide(&self) -> bool {
        matches!(self.stack.last(), Some(None))
    }

    /// Replace the type on top of the stack (used to give `null` its static type)
    pub fn force_stack_top(&mut self, ty: Type) {
        if let Some(Some(top)) = self.stack.last_mut() {
            if top.is_reference() {
                *top = ty;
            }
        }
    }

    /// Swap every occurrence of an uninitialized type on the stack for its initialized type
    pub fn mark_initialized(&mut self, old: &Type, new: &Type) {
        for slot in self.stack.iter_mut().flatten() {
            if slot == old {
                *slot = new.clone();
            }
        }
    }

    /// Merge in the state of another path reaching the same point
    ///
    /// Both states must agree on stack depth and held monitors. Differing stack types are merged
    /// to whichever is the supertype of the other.
    pub fn join(&mut self, other: &FrameState, graph: &ClassGraph) -> Result<(), Error> {
        if self.stack.len() != other.stack.len() || self.locks != other.locks {
            return Err(Error::FrameShapeMismatch {
                stack_sizes: (self.stack.len(), other.stack.len()),
                lock_depths: (self.locks.len(), other.locks.len()),
            });
        }
        for (slot, (this, that)) in self.stack.iter_mut().zip(&other.stack).enumerate() {
            match (this.as_ref(), that) {
                (None, None) => (),
                (Some(t1), Some(t2)) if t1 == t2 => (),
                (Some(t1), Some(t2)) if graph.is_subtype(t1, t2) => *this = Some(t2.clone()),
                (Some(t1), Some(t2)) if graph.is_subtype(t2, t1) => (),
                (left, right) => {
                    return Err(Error::IncompatibleFrames {
                        slot,
                        left: left.cloned().unwrap_or(Type::Void),
                        right: right.clone().unwrap_or(Type::Void),
                    })
                }
            }
        }
        self.defined.and_set(&other.defined);
        Ok(())
    }

    pub fn lock(&mut self, reg: u16) {
        self.locks.push(reg);
    }

    pub fn unlock(&mut self, reg: u16) -> Result<(), Error> {
        match self.locks.last() {
            Some(innermost) if *innermost == reg => {
                self.locks.pop();
                Ok(())
            }
            innermost => Err(Error::UnbalancedMonitor {
                expected: innermost.copied(),
                found: reg,
            }),
        }
    }
}

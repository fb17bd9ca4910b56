use super::{Constant, Type};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// The constant would not fit in the 16-bit index space of the pool
    ConstantPoolOverflow {
        constant: Constant,
        offset: usize,
    },

    /// A `CONSTANT_Utf8` entry is longer than 65535 bytes once encoded
    StringOverflow(String),

    IoError(std::io::Error),

    /// Popped more off the simulated operand stack than was on it
    StackUnderflow {
        opcode: &'static str,
    },

    /// Top of the simulated stack has the wrong width for the instruction
    InvalidWidth {
        opcode: &'static str,
        expected: usize,
    },

    /// Two control-flow paths reach the same point with stack depths or monitor depths that
    /// differ (indicates a bug in the translator or an ill-formed tree)
    FrameShapeMismatch {
        stack_sizes: (usize, usize),
        lock_depths: (usize, usize),
    },

    /// Two control-flow paths reach the same point with unrelated types in some stack slot
    IncompatibleFrames {
        slot: usize,
        left: Type,
        right: Type,
    },

    /// Monitor released from a register which does not hold the innermost lock
    UnbalancedMonitor {
        expected: Option<u16>,
        found: u16,
    },

    /// Opcode passed to an emission helper that does not handle it
    UnexpectedOpcode(&'static str),

    /// Local variable register which was never allocated
    UnknownRegister(u16),

    /// Value cannot be represented in a stack map frame
    UnmappableType(Type),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ConstantPoolOverflow { offset, .. } => {
                write!(f, "constant pool overflow at index {}", offset)
            }
            Error::StringOverflow(string) => {
                let prefix: String = string.chars().take(16).collect();
                write!(f, "UTF8 constant too long: \"{}...\"", prefix)
            }
            Error::IoError(err) => write!(f, "{}", err),
            Error::StackUnderflow { opcode } => write!(f, "stack underflow in `{}`", opcode),
            Error::InvalidWidth { opcode, expected } => {
                write!(f, "`{}` expected an operand of width {}", opcode, expected)
            }
            Error::FrameShapeMismatch {
                stack_sizes,
                lock_depths,
            } => write!(
                f,
                "frames do not line up (stack {} vs {}, locks {} vs {})",
                stack_sizes.0, stack_sizes.1, lock_depths.0, lock_depths.1
            ),
            Error::IncompatibleFrames { slot, left, right } => write!(
                f,
                "stack slot {} merges incompatible types {:?} and {:?}",
                slot, left, right
            ),
            Error::UnbalancedMonitor { expected, found } => write!(
                f,
                "monitor exit on register {} while innermost lock is {:?}",
                found, expected
            ),
            Error::UnexpectedOpcode(opcode) => write!(f, "unexpected opcode `{}`", opcode),
            Error::UnknownRegister(reg) => write!(f, "unallocated local register {}", reg),
            Error::UnmappableType(ty) => write!(f, "no verification type for {:?}", ty),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

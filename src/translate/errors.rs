use crate::jvm;
use crate::tree::Pos;
use std::fmt;

/// Unrecoverable failure of a translation run
#[derive(Debug)]
pub enum Error {
    Jvm(jvm::Error),

    /// An exception range no longer fits in 16 bits, so the method gets translated again with
    /// finalizers as subroutines (never escapes method translation)
    CodeSizeOverflow,

    /// Operand stack still holds values when the method body ends
    StackNotEmpty { method: String, depth: usize },

    /// The input tree breaks the contract of an attributed tree
    MalformedTree(String),

    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Jvm(err) => write!(f, "{}", err),
            Error::CodeSizeOverflow => write!(f, "exception range overflow"),
            Error::StackNotEmpty { method, depth } => {
                write!(f, "{} values left on the stack at the end of {}", depth, method)
            }
            Error::MalformedTree(message) => write!(f, "malformed tree: {}", message),
            Error::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::Jvm(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

/// Class file limit that a class being translated exceeds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LimitKind {
    /// Receiver plus parameters take more than 255 slots
    Parameters,

    /// Array type with more than 255 dimensions
    Dimensions,

    /// Constant string longer than 65534 characters
    StringConstant,

    /// Encoded UTF8 constant longer than 65535 bytes
    StringOverflow,

    CodeTooLarge,

    /// Exception range offsets do not fit 16 bits
    CodeTooLargeForTry,
    Locals,
    Stack,

    /// Constant pool is out of indices
    Pool,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let message = match self {
            LimitKind::Parameters => "too many parameters",
            LimitKind::Dimensions => "array type has too many dimensions",
            LimitKind::StringConstant => "constant string too long",
            LimitKind::StringOverflow => "UTF8 representation for string is too long for the constant pool",
            LimitKind::CodeTooLarge => "code too large",
            LimitKind::CodeTooLargeForTry => "code too large for try statement",
            LimitKind::Locals => "too many local variables",
            LimitKind::Stack => "code requires too much stack",
            LimitKind::Pool => "too many constants",
        };
        f.write_str(message)
    }
}

/// Resource limit hit while translating a class
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// Binary name of the class being translated
    pub class: String,
    pub pos: u32,
    pub line: u32,
    pub kind: LimitKind,
}

impl Diagnostic {
    pub fn new(class: impl Into<String>, pos: Pos, kind: LimitKind) -> Diagnostic {
        Diagnostic {
            class: class.into(),
            pos: pos.offset,
            line: pos.line,
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}: {}", self.class, self.line, self.kind)
    }
}

/// Every diagnostic reported in a run, in order
#[derive(Default, Debug)]
pub struct Diagnostics {
    reported: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Diagnostics {
        Diagnostics::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        log::error!("{}", diagnostic);
        self.reported.push(diagnostic);
    }

    pub fn count(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.reported.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for diagnostic in &self.reported {
            writeln!(f, "{}", diagnostic)?;
        }
        match self.reported.len() {
            1 => write!(f, "1 error"),
            n => write!(f, "{} errors", n),
        }
    }
}

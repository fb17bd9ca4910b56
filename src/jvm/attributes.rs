use super::{
    ClassConstantIndex, ConstantIndex, InnerClassAccessFlags, NameAndTypeConstantIndex,
    Serialize, Utf8ConstantIndex,
};
use byteorder::WriteBytesExt;

/// Attributes are all stored in the same way (a name, a length, and a payload), but internally
/// they represent very different things. This trait is implemented by the payloads which can be
/// turned into attributes.
pub trait AttributeLike: Serialize {
    /// `attribute_name_index` points at this
    const NAME: &'static str;
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.2
pub struct ConstantValue(pub ConstantIndex);

impl Serialize for ConstantValue {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl AttributeLike for ConstantValue {
    const NAME: &'static str = "ConstantValue";
}

/// Name of the `Code` attribute
///
/// The payload of `Code` nests further attributes, so it is framed by hand instead of going
/// through [`AttributeLike`].
pub const CODE: &str = "Code";

/// Entry in the exception table of a `Code` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// First covered offset
    pub start_pc: u16,

    /// First offset past the covered range
    pub end_pc: u16,

    pub handler_pc: u16,

    /// Class of exceptions caught, or `None` for a catch-all
    pub catch_type: Option<ClassConstantIndex>,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        match self.catch_type {
            Some(catch_type) => catch_type.serialize(writer),
            None => 0u16.serialize(writer),
        }
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.5
pub struct Exceptions(pub Vec<ClassConstantIndex>);

impl Serialize for Exceptions {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl AttributeLike for Exceptions {
    const NAME: &'static str = "Exceptions";
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.10
pub struct SourceFile(pub Utf8ConstantIndex);

impl Serialize for SourceFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl AttributeLike for SourceFile {
    const NAME: &'static str = "SourceFile";
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.9
pub struct Signature(pub Utf8ConstantIndex);

impl Serialize for Signature {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl AttributeLike for Signature {
    const NAME: &'static str = "Signature";
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.7
pub struct EnclosingMethod {
    pub class: ClassConstantIndex,

    /// Absent when the class is not immediately enclosed by a method (eg. in a field initializer)
    pub method: Option<NameAndTypeConstantIndex>,
}

impl Serialize for EnclosingMethod {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.class.serialize(writer)?;
        match self.method {
            Some(method) => method.serialize(writer),
            None => 0u16.serialize(writer),
        }
    }
}

impl AttributeLike for EnclosingMethod {
    const NAME: &'static str = "EnclosingMethod";
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.6
pub struct InnerClasses(pub Vec<InnerClass>);

impl AttributeLike for InnerClasses {
    const NAME: &'static str = "InnerClasses";
}

impl Serialize for InnerClasses {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

pub struct InnerClass {
    pub inner_class: ClassConstantIndex,

    /// Absent for local and anonymous classes
    pub outer_class: Option<ClassConstantIndex>,

    /// Absent for anonymous classes
    pub inner_name: Option<Utf8ConstantIndex>,
    pub access_flags: InnerClassAccessFlags,
}

impl Serialize for InnerClass {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.inner_class.serialize(writer)?;
        match self.outer_class {
            Some(outer_class) => outer_class.serialize(writer)?,
            None => 0u16.serialize(writer)?,
        }
        match self.inner_name {
            Some(inner_name) => inner_name.serialize(writer)?,
            None => 0u16.serialize(writer)?,
        }
        self.access_flags.serialize(writer)?;
        Ok(())
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.12
pub struct LineNumberTable(pub Vec<LineNumber>);

impl AttributeLike for LineNumberTable {
    const NAME: &'static str = "LineNumberTable";
}

impl Serialize for LineNumberTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: u16,
    pub line: u16,
}

impl Serialize for LineNumber {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.line.serialize(writer)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.13
pub struct LocalVariableTable(pub Vec<LocalVariable>);

impl AttributeLike for LocalVariableTable {
    const NAME: &'static str = "LocalVariableTable";
}

impl Serialize for LocalVariableTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

pub struct LocalVariable {
    pub start_pc: u16,
    pub length: u16,
    pub name: Utf8ConstantIndex,
    pub descriptor: Utf8ConstantIndex,
    pub index: u16,
}

impl Serialize for LocalVariable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.length.serialize(writer)?;
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)?;
        self.index.serialize(writer)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.4
pub struct StackMapTable(pub Vec<StackMapFrame<VerificationType>>);

impl AttributeLike for StackMapTable {
    const NAME: &'static str = "StackMapTable";
}

impl Serialize for StackMapTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

/// Compressed stack map frame
///
/// The type parameter is what locals and stack entries are made of: simulated types while the
/// frame is being chosen, then verification types once the frame is written out.
#[derive(Clone, Debug, PartialEq)]
pub enum StackMapFrame<V> {
    /// Locals unchanged, empty stack (`same_frame`, `same_frame_extended`)
    SameLocalsNoStack { offset_delta: u16 },

    /// Locals unchanged, one stack entry
    SameLocalsOneStack { offset_delta: u16, stack: V },

    /// Last `chopped_k` (1 to 3) locals dropped, empty stack
    ChopLocalsNoStack { offset_delta: u16, chopped_k: u8 },

    /// Up to 3 locals added, empty stack
    AppendLocalsNoStack { offset_delta: u16, locals: Vec<V> },

    /// Everything spelled out
    Full {
        offset_delta: u16,
        locals: Vec<V>,
        stack: Vec<V>,
    },
}

impl<V> StackMapFrame<V> {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta }
            | StackMapFrame::SameLocalsOneStack { offset_delta, .. }
            | StackMapFrame::ChopLocalsNoStack { offset_delta, .. }
            | StackMapFrame::AppendLocalsNoStack { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    /// Convert every local and stack entry
    pub fn try_map<U, E>(self, mut f: impl FnMut(V) -> Result<U, E>) -> Result<StackMapFrame<U>, E> {
        Ok(match self {
            StackMapFrame::SameLocalsNoStack { offset_delta } => {
                StackMapFrame::SameLocalsNoStack { offset_delta }
            }
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack: f(stack)?,
            },
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            },
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals: locals.into_iter().map(&mut f).collect::<Result<_, _>>()?,
            },
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => StackMapFrame::Full {
                offset_delta,
                locals: locals.into_iter().map(&mut f).collect::<Result<_, _>>()?,
                stack: stack.into_iter().map(&mut f).collect::<Result<_, _>>()?,
            },
        })
    }
}

impl Serialize for StackMapFrame<VerificationType> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8).serialize(writer)?;
                } else {
                    251u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
            }

            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8 + 64).serialize(writer)?;
                } else {
                    247u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
                stack.serialize(writer)?;
            }

            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => {
                (251 - chopped_k).serialize(writer)?;
                offset_delta.serialize(writer)?;
            }

            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => {
                (251 + locals.len() as u8).serialize(writer)?;
                offset_delta.serialize(writer)?;
                for local in locals {
                    local.serialize(writer)?;
                }
            }

            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                255u8.serialize(writer)?;
                offset_delta.serialize(writer)?;
                locals.serialize(writer)?;
                stack.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Type of a local or stack entry as seen by the type-checking verifier
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VerificationType {
    /// Unusable local (never assigned, or the upper half of a wide value)
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// Receiver of a constructor until the superclass constructor returns
    UninitializedThis,

    /// Object or array type
    Object(ClassConstantIndex),

    /// State of an object after `new` has been called but `<init>` has not, identified by the
    /// offset of the `new` instruction from the start of the method body
    Uninitialized(u16),
}

impl Serialize for VerificationType {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationType::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// Attributes with an empty payload, written by targets which lack the matching flag bit
macro_rules! marker_attributes {
    ($($marker:ident),*) => {
        $(
            pub struct $marker;

            impl Serialize for $marker {
                fn serialize<W: WriteBytesExt>(&self, _writer: &mut W) -> std::io::Result<()> {
                    Ok(())
                }
            }

            impl AttributeLike for $marker {
                const NAME: &'static str = stringify!($marker);
            }
        )*
    };
}

marker_attributes!(Deprecated, Synthetic, Enum, Bridge, Varargs, Annotation);

#[cfg(test)]
mod test {
    use super::*;

    fn bytes(frame: StackMapFrame<VerificationType>) -> Vec<u8> {
        let mut out = vec![];
        frame.serialize(&mut out).unwrap();
        out
    }

    #[test]
    fn compact_frame_tags() {
        assert_eq!(bytes(StackMapFrame::SameLocalsNoStack { offset_delta: 5 }), vec![5]);
        assert_eq!(
            bytes(StackMapFrame::SameLocalsNoStack { offset_delta: 300 }),
            vec![251, 1, 44]
        );
        assert_eq!(
            bytes(StackMapFrame::SameLocalsOneStack {
                offset_delta: 2,
                stack: VerificationType::Integer
            }),
            vec![66, 1]
        );
        assert_eq!(
            bytes(StackMapFrame::ChopLocalsNoStack {
                offset_delta: 0,
                chopped_k: 2
            }),
            vec![249, 0, 0]
        );
        assert_eq!(
            bytes(StackMapFrame::AppendLocalsNoStack {
                offset_delta: 1,
                locals: vec![VerificationType::Long, VerificationType::Uninitialized(3)]
            }),
            vec![253, 0, 1, 4, 8, 0, 3]
        );
    }

    #[test]
    fn marker_names() {
        assert_eq!(Deprecated::NAME, "Deprecated");
        assert_eq!(Varargs::NAME, "Varargs");
    }
}

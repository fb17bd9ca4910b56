use byteorder::{BigEndian, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing fixed structures inside class files
///
/// Tags in a class file are always `u8` and the length prefix of a sequence is usually `u16`,
/// which is why sequences get a `u16` length instead of whatever `serde` would pick.
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

/// Multi-byte numbers are always big-endian
macro_rules! big_endian {
    ($($ty:ty => $write:ident),* $(,)?) => {
        $(
            impl Serialize for $ty {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
                    writer.$write::<BigEndian>(*self)
                }
            }
        )*
    };
}

big_endian! {
    u16 => write_u16,
    u32 => write_u32,
    i32 => write_i32,
    i64 => write_i64,
    f32 => write_f32,
    f64 => write_f64,
}

/// Size in `u16` is the first thing serialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

/// Number of slots something occupies in the constant pool, on the operand stack, or in the
/// local variables
///
/// Everything is one slot wide except `long` and `double` values, which take two.
pub trait Width {
    fn width(&self) -> usize;
}

impl<A: Width> Width for [A] {
    fn width(&self) -> usize {
        self.iter().map(Width::width).sum()
    }
}

impl<A: Width> Width for Vec<A> {
    fn width(&self) -> usize {
        self.as_slice().width()
    }
}

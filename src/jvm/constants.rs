use super::{ByteBuffer, Error, Serialize, Width};
use byteorder::WriteBytesExt;
use std::collections::HashMap;

/// Raw constant pool of a class file
///
/// Entries are deduplicated structurally: asking for a constant that is already in the pool
/// returns the index of the existing entry. Elements can be easily added to the pool, but not so
/// easily removed (only [`ConstantsPool::clear`] drops entries, and it drops all of them).
pub struct ConstantsPool {
    /// Index `0` and the slot following a `long` or `double` are `None`
    entries: Vec<Option<Constant>>,
    indices: HashMap<ConstantKey, ConstantIndex>,
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

impl ConstantsPool {
    /// Largest index a constant can occupy
    pub const MAX_INDEX: usize = u16::MAX as usize;

    /// Empty pool (first index handed out is `1`)
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            entries: vec![None],
            indices: HashMap::new(),
        }
    }

    /// Index the next inserted constant would get
    pub fn next_index(&self) -> usize {
        self.entries.len()
    }

    /// Number of constants in the pool (counting wide constants once)
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Drop every constant, so the pool can be reused for another class
    pub fn clear(&mut self) {
        self.entries.truncate(1);
        self.indices.clear();
    }

    /// Constant at an index, if the index is in use
    pub fn get(&self, index: ConstantIndex) -> Option<&Constant> {
        self.entries.get(index.0 as usize).and_then(Option::as_ref)
    }

    /// Find the index of a constant, without inserting it if it is missing
    pub fn lookup(&self, constant: &Constant) -> Option<ConstantIndex> {
        self.indices.get(&ConstantKey::from(constant)).copied()
    }

    /// Get or insert a constant
    ///
    /// Note: the largest valid index is 65535, indexing starts at 1, and some constants take two
    /// spaces. A constant which does not fit is handed back inside the error.
    pub fn intern(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let key = ConstantKey::from(&constant);
        if let Some(idx) = self.indices.get(&key) {
            return Ok(*idx);
        }

        let offset = self.entries.len();
        if offset + constant.width() - 1 > Self::MAX_INDEX {
            return Err(Error::ConstantPoolOverflow { constant, offset });
        }

        let idx = ConstantIndex(offset as u16);
        let width = constant.width();
        self.entries.push(Some(constant));
        if width == 2 {
            self.entries.push(None);
        }
        self.indices.insert(key, idx);
        Ok(idx)
    }

    /// Intern a `CONSTANT_Utf8`
    pub fn get_utf8(&mut self, utf8: impl Into<String>) -> Result<Utf8ConstantIndex, Error> {
        self.intern(Constant::Utf8(utf8.into())).map(Utf8ConstantIndex)
    }

    /// Intern a `CONSTANT_Class` naming the given binary name
    pub fn get_class(&mut self, name: Utf8ConstantIndex) -> Result<ClassConstantIndex, Error> {
        self.intern(Constant::Class(name)).map(ClassConstantIndex)
    }

    pub fn get_string(&mut self, utf8: Utf8ConstantIndex) -> Result<StringConstantIndex, Error> {
        self.intern(Constant::String(utf8)).map(StringConstantIndex)
    }

    pub fn get_name_and_type(
        &mut self,
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        self.intern(Constant::NameAndType { name, descriptor })
            .map(NameAndTypeConstantIndex)
    }

    /// Intern a `CONSTANT_Fieldref`
    pub fn get_field_ref(
        &mut self,
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
    ) -> Result<FieldRefConstantIndex, Error> {
        self.intern(Constant::FieldRef(class, name_and_type))
            .map(FieldRefConstantIndex)
    }

    /// Intern a `CONSTANT_Methodref`, or a `CONSTANT_InterfaceMethodref` for interface owners
    pub fn get_method_ref(
        &mut self,
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, Error> {
        self.intern(Constant::MethodRef {
            class,
            name_and_type,
            is_interface,
        })
        .map(MethodRefConstantIndex)
    }

    pub fn get_integer(&mut self, integer: i32) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Integer(integer))
    }

    pub fn get_long(&mut self, long: i64) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Long(long))
    }

    pub fn get_float(&mut self, float: f32) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Float(float))
    }

    pub fn get_double(&mut self, double: f64) -> Result<ConstantIndex, Error> {
        self.intern(Constant::Double(double))
    }

    /// Write the `constant_pool_count` followed by every entry
    ///
    /// This is where limits which only matter in the serialized form get checked: the count must
    /// itself fit in a `u16`, and so must the encoded length of every utf8 constant.
    pub fn write_to(&self, buffer: &mut ByteBuffer) -> Result<(), Error> {
        let count = self.entries.len();
        if count > Self::MAX_INDEX {
            let constant = self
                .entries
                .iter()
                .rev()
                .flatten()
                .next()
                .cloned()
                .unwrap_or(Constant::Integer(0));
            return Err(Error::ConstantPoolOverflow {
                constant,
                offset: count,
            });
        }
        buffer.append_u2(count as u16);
        for constant in self.entries.iter().flatten() {
            if let Constant::Utf8(string) = constant {
                if encode_modified_utf8(string).len() > u16::MAX as usize {
                    return Err(Error::StringOverflow(string.clone()));
                }
            }
            constant.serialize(buffer)?;
        }
        Ok(())
    }
}

/// Encode a string the way `CONSTANT_Utf8_info` expects
///
/// Despite the name, this is _not_ exactly UTF-8: the null character takes two bytes and
/// supplementary characters are encoded as a surrogate pair of three byte sequences.
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = Vec::with_capacity(string.len());
    for unit in string.encode_utf16() {
        match unit {
            0x0001..=0x007F => buffer.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                buffer.push((unit >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
            }
            _ => {
                buffer.push((unit >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((unit >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((unit & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Entry of the constant pool
///
/// Only the tags up to Java 6 exist here: nothing this back end emits needs method handles or
/// dynamic call sites.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Class(Utf8ConstantIndex),

    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// `Methodref` and `InterfaceMethodref`, told apart by `is_interface`
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// `ldc` of a `java/lang/String`
    String(Utf8ConstantIndex),

    Integer(i32),

    Float(f32),

    Long(i64),

    Double(f64),

    /// Member name with its descriptor
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant raw string value, see [`encode_modified_utf8`]
    Utf8(String),
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                let buffer = encode_modified_utf8(string);
                1u8.serialize(writer)?;
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(bytes) => {
                8u8.serialize(writer)?;
                bytes.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// `long` and `double` entries take two pool slots, the second of which is never used
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

/// Hashable identity of a constant
///
/// Floating point constants are compared by bit pattern, so `0.0` and `-0.0` stay distinct. All
/// NaNs collapse into the canonical one, since that is what ends up being observable.
#[derive(PartialEq, Eq, Hash)]
enum ConstantKey {
    Class(Utf8ConstantIndex),
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),
    MethodRef(ClassConstantIndex, NameAndTypeConstantIndex, bool),
    String(Utf8ConstantIndex),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    NameAndType(Utf8ConstantIndex, Utf8ConstantIndex),
    Utf8(String),
}

impl From<&Constant> for ConstantKey {
    fn from(constant: &Constant) -> ConstantKey {
        match constant {
            Constant::Class(name) => ConstantKey::Class(*name),
            Constant::FieldRef(class, name_and_type) => ConstantKey::FieldRef(*class, *name_and_type),
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => ConstantKey::MethodRef(*class, *name_and_type, *is_interface),
            Constant::String(utf8) => ConstantKey::String(*utf8),
            Constant::Integer(integer) => ConstantKey::Integer(*integer),
            Constant::Float(float) if float.is_nan() => ConstantKey::Float(f32::NAN.to_bits()),
            Constant::Float(float) => ConstantKey::Float(float.to_bits()),
            Constant::Long(long) => ConstantKey::Long(*long),
            Constant::Double(double) if double.is_nan() => ConstantKey::Double(f64::NAN.to_bits()),
            Constant::Double(double) => ConstantKey::Double(double.to_bits()),
            Constant::NameAndType { name, descriptor } => ConstantKey::NameAndType(*name, *descriptor),
            Constant::Utf8(string) => ConstantKey::Utf8(string.clone()),
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug, PartialOrd, Ord)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct StringConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct FieldRefConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct MethodRefConstantIndex(pub ConstantIndex);

macro_rules! typed_index {
    ($($index:ident),*) => {
        $(
            impl From<$index> for ConstantIndex {
                fn from(index: $index) -> ConstantIndex {
                    index.0
                }
            }

            impl Serialize for $index {
                fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                    self.0.serialize(writer)
                }
            }
        )*
    };
}

typed_index!(
    Utf8ConstantIndex,
    StringConstantIndex,
    NameAndTypeConstantIndex,
    ClassConstantIndex,
    FieldRefConstantIndex,
    MethodRefConstantIndex
);

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

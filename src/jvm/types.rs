use super::{ClassId, Width};

/// Primitive types
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub fn descriptor_char(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    /// Does this get represented as an `int` on the operand stack?
    pub fn is_int_like(self) -> bool {
        matches!(
            self,
            BaseType::Byte | BaseType::Char | BaseType::Short | BaseType::Int | BaseType::Boolean
        )
    }
}

/// Erased types, as seen by the code generator
///
/// Besides the types a front end can produce, this includes the extra states the simulated
/// operand stack and local variables can be in: the type of `null`, the uninitialized `this` in a
/// constructor, the result of `new` before its constructor has run, and `jsr` return addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Base(BaseType),
    Void,

    /// Type of the `null` literal, a subtype of every reference type
    Null,

    Object(ClassId),
    Array(Box<Type>),

    /// Receiver of a constructor before the superclass constructor has been called
    UninitializedThis(ClassId),

    /// Result of a `new` instruction before `<init>` has been called on it
    ///
    /// The offset is that of the `new` instruction in the method's code.
    Uninitialized { class: ClassId, offset: u32 },

    /// Pushed by `jsr` and consumed by `astore` ahead of `ret`
    ReturnAddress,
}

impl Type {
    pub const BYTE: Type = Type::Base(BaseType::Byte);
    pub const CHAR: Type = Type::Base(BaseType::Char);
    pub const DOUBLE: Type = Type::Base(BaseType::Double);
    pub const FLOAT: Type = Type::Base(BaseType::Float);
    pub const INT: Type = Type::Base(BaseType::Int);
    pub const LONG: Type = Type::Base(BaseType::Long);
    pub const SHORT: Type = Type::Base(BaseType::Short);
    pub const BOOLEAN: Type = Type::Base(BaseType::Boolean);

    pub fn array_of(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            Type::Null
                | Type::Object(_)
                | Type::Array(_)
                | Type::UninitializedThis(_)
                | Type::Uninitialized { .. }
        )
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Base(_))
    }

    /// Type of array elements, if this is an array
    pub fn elem_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Number of array dimensions (0 for non-array types)
    pub fn dimensions(&self) -> usize {
        let mut dims = 0;
        let mut ty = self;
        while let Type::Array(elem) = ty {
            dims += 1;
            ty = elem;
        }
        dims
    }

    pub fn type_code(&self) -> TypeCode {
        match self {
            Type::Base(BaseType::Byte) | Type::Base(BaseType::Boolean) => TypeCode::Byte,
            Type::Base(BaseType::Short) => TypeCode::Short,
            Type::Base(BaseType::Char) => TypeCode::Char,
            Type::Base(BaseType::Int) => TypeCode::Int,
            Type::Base(BaseType::Long) => TypeCode::Long,
            Type::Base(BaseType::Float) => TypeCode::Float,
            Type::Base(BaseType::Double) => TypeCode::Double,
            Type::Void => TypeCode::Void,
            Type::Null
            | Type::Object(_)
            | Type::Array(_)
            | Type::UninitializedThis(_)
            | Type::Uninitialized { .. }
            | Type::ReturnAddress => TypeCode::Object,
        }
    }

    /// Operand of `newarray` for arrays of this element type, or `0` for `anewarray` of a class
    /// and `1` for arrays of arrays
    pub fn array_code(&self) -> u8 {
        match self {
            Type::Base(BaseType::Byte) => 8,
            Type::Base(BaseType::Boolean) => 4,
            Type::Base(BaseType::Short) => 9,
            Type::Base(BaseType::Char) => 5,
            Type::Base(BaseType::Int) => 10,
            Type::Base(BaseType::Long) => 11,
            Type::Base(BaseType::Float) => 6,
            Type::Base(BaseType::Double) => 7,
            Type::Array(_) => 1,
            _ => 0,
        }
    }
}

impl Width for Type {
    fn width(&self) -> usize {
        match self {
            Type::Base(BaseType::Long) | Type::Base(BaseType::Double) => 2,
            Type::Void => 0,
            _ => 1,
        }
    }
}

/// Coarse classification of types by the instruction variants that operate on them
///
/// The order matters: typed instruction families (`iload`/`lload`/`fload`/`dload`/`aload`,
/// `iaload`..`saload`, ...) are laid out so that an opcode plus the type code selects the right
/// variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeCode {
    Int = 0,
    Long = 1,
    Float = 2,
    Double = 3,
    Object = 4,
    Byte = 5,
    Char = 6,
    Short = 7,
    Void = 8,
}

impl TypeCode {
    /// Collapse the sub-int types onto `Int`
    pub fn truncate(self) -> TypeCode {
        match self {
            TypeCode::Byte | TypeCode::Char | TypeCode::Short => TypeCode::Int,
            other => other,
        }
    }

    pub fn width(self) -> usize {
        match self {
            TypeCode::Long | TypeCode::Double => 2,
            TypeCode::Void => 0,
            _ => 1,
        }
    }

    pub fn offset(self) -> u8 {
        self as u8
    }

    /// The stack type values of this code are pushed as (for primitive codes)
    pub fn stack_type(self) -> Option<Type> {
        match self.truncate() {
            TypeCode::Int => Some(Type::INT),
            TypeCode::Long => Some(Type::LONG),
            TypeCode::Float => Some(Type::FLOAT),
            TypeCode::Double => Some(Type::DOUBLE),
            _ => None,
        }
    }
}

/// Compile-time constant values
///
/// `boolean`, `byte`, `char`, and `short` constants are all carried as `Int`.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl ConstValue {
    pub fn type_code(&self) -> TypeCode {
        match self {
            ConstValue::Int(_) => TypeCode::Int,
            ConstValue::Long(_) => TypeCode::Long,
            ConstValue::Float(_) => TypeCode::Float,
            ConstValue::Double(_) => TypeCode::Double,
            ConstValue::String(_) => TypeCode::Object,
        }
    }

    /// Convert a numeric constant as a primitive widening or narrowing conversion would
    pub fn convert(&self, target: TypeCode) -> ConstValue {
        let (as_int, as_long, as_float, as_double) = match self {
            ConstValue::Int(i) => (*i, *i as i64, *i as f32, *i as f64),
            ConstValue::Long(l) => (*l as i32, *l, *l as f32, *l as f64),
            ConstValue::Float(f) => (*f as i32, *f as i64, *f, *f as f64),
            ConstValue::Double(d) => (*d as i32, *d as i64, *d as f32, *d),
            ConstValue::String(_) => return self.clone(),
        };
        match target {
            TypeCode::Int => ConstValue::Int(as_int),
            TypeCode::Long => ConstValue::Long(as_long),
            TypeCode::Float => ConstValue::Float(as_float),
            TypeCode::Double => ConstValue::Double(as_double),
            TypeCode::Byte => ConstValue::Int(as_int as i8 as i32),
            TypeCode::Char => ConstValue::Int(as_int as u16 as i32),
            TypeCode::Short => ConstValue::Int(as_int as i16 as i32),
            TypeCode::Object | TypeCode::Void => self.clone(),
        }
    }

    /// Is this a numeric constant equal to zero (as an `int`)?
    pub fn is_int_zero(&self) -> bool {
        matches!(self, ConstValue::Int(0))
    }
}

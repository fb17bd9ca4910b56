use super::{Serialize, Version};
use bitflags::bitflags;
use byteorder::WriteBytesExt;
use std::io::Result;

bitflags! {
    /// `access_flags` of a `ClassFile`
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.1-200-E.1
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// `access_flags` of a `method_info`
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// `access_flags` of a `field_info`
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.5-200-A.1
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// `inner_class_access_flags` of an `InnerClasses` entry
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.7.6-300-D.2-5
    pub struct InnerClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Modifiers on symbols, as handed over by the front end
    ///
    /// The low 16 bits line up with the class file access flags. The bits above that carry
    /// properties which, depending on the target, end up either as access flags or as marker
    /// attributes.
    pub struct Flags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICTFP = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;

        const DEPRECATED = 0x0002_0000;
        const BRIDGE = 0x0004_0000;
        const VARARGS = 0x0008_0000;
    }
}

impl Flags {
    /// Class file bits for these modifiers, given what the target version can express
    pub fn adjusted(self, target: &Version) -> u16 {
        let mut result = self.bits() as u16;
        if self.contains(Flags::SYNTHETIC) && !target.uses_synthetic_flag() {
            result &= !(Flags::SYNTHETIC.bits() as u16);
        }
        if self.contains(Flags::ENUM) && !target.uses_enum_flag() {
            result &= !(Flags::ENUM.bits() as u16);
        }
        if self.contains(Flags::ANNOTATION) && !target.uses_annotation_flag() {
            result &= !(Flags::ANNOTATION.bits() as u16);
        }
        if self.contains(Flags::BRIDGE) && target.uses_bridge_flag() {
            result |= MethodAccessFlags::BRIDGE.bits();
        }
        if self.contains(Flags::VARARGS) && target.uses_varargs_flag() {
            result |= MethodAccessFlags::VARARGS.bits();
        }
        result
    }

    pub fn is_static(self) -> bool {
        self.contains(Flags::STATIC)
    }

    pub fn is_private(self) -> bool {
        self.contains(Flags::PRIVATE)
    }

    pub fn is_interface(self) -> bool {
        self.contains(Flags::INTERFACE)
    }
}

impl Serialize for ClassAccessFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for MethodAccessFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for FieldAccessFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for InnerClassAccessFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bridge_and_varargs_only_as_flags_on_new_targets() {
        let flags = Flags::PUBLIC | Flags::BRIDGE | Flags::VARARGS | Flags::SYNTHETIC;
        assert_eq!(flags.adjusted(&Version::JAVA7), 0x0001 | 0x0040 | 0x0080 | 0x1000);
        assert_eq!(
            flags.adjusted(&Version::JAVA1_4),
            0x0001,
            "old targets express these as marker attributes instead"
        );
    }
}

use super::Serialize;
use byteorder::WriteBytesExt;
use std::fmt;
use std::io::Result;

/// Target class file version
///
/// Besides being written into the header, the version is what decides which attribute forms and
/// flag bits the generated classes are allowed to use.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Version {
    pub major_version: u16,
    pub minor_version: u16,
}

impl Version {
    pub const JAVA1_1: Version = Version::new(45, 3);
    pub const JAVA1_2: Version = Version::new(46, 0);
    pub const JAVA1_3: Version = Version::new(47, 0);
    pub const JAVA1_4: Version = Version::new(48, 0);
    pub const JAVA5: Version = Version::new(49, 0);
    pub const JAVA6: Version = Version::new(50, 0);
    pub const JAVA7: Version = Version::new(51, 0);

    /// Newest target accepted
    pub const JAVA8: Version = Version::new(52, 0);

    pub const fn new(major_version: u16, minor_version: u16) -> Version {
        Version {
            major_version,
            minor_version,
        }
    }

    /// Parse a release name as accepted on a `-target` flag (eg. `1.4`, `5`, `1.7`)
    pub fn from_release(release: &str) -> Option<Version> {
        let version = match release {
            "1.1" => Version::JAVA1_1,
            "1.2" => Version::JAVA1_2,
            "1.3" => Version::JAVA1_3,
            "1.4" => Version::JAVA1_4,
            "1.5" | "5" => Version::JAVA5,
            "1.6" | "6" => Version::JAVA6,
            "1.7" | "7" => Version::JAVA7,
            "1.8" | "8" => Version::JAVA8,
            _ => return None,
        };
        Some(version)
    }

    /// Verification by type checking needs a `StackMapTable` on every method with code
    pub fn generates_stack_map_table(&self) -> bool {
        *self >= Version::JAVA6
    }

    pub fn uses_synthetic_flag(&self) -> bool {
        *self >= Version::JAVA5
    }

    pub fn uses_enum_flag(&self) -> bool {
        *self >= Version::JAVA5
    }

    pub fn uses_annotation_flag(&self) -> bool {
        *self >= Version::JAVA5
    }

    pub fn uses_bridge_flag(&self) -> bool {
        *self >= Version::JAVA5
    }

    pub fn uses_varargs_flag(&self) -> bool {
        *self >= Version::JAVA5
    }

    /// Is `java.lang.StringBuilder` available for string concatenation?
    pub fn has_string_builder(&self) -> bool {
        *self >= Version::JAVA5
    }

    pub fn has_enclosing_method_attribute(&self) -> bool {
        *self >= Version::JAVA5
    }

    /// Can `ldc` load a class constant?
    pub fn has_class_literals(&self) -> bool {
        *self >= Version::JAVA5
    }
}

impl Default for Version {
    fn default() -> Version {
        Version::JAVA7
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major_version, self.minor_version)
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

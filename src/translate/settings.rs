use crate::jvm::code::{CodeOptions, StackMapFormat};
use crate::jvm::Version;

#[derive(Clone, Debug)]
pub struct Settings {
    /// Class file version to generate
    pub target: Version,

    /// Emit `LineNumberTable` attributes
    pub line_debug_info: bool,

    /// Emit `LocalVariableTable` attributes
    ///
    /// This also keeps constant locals alive in registers so they show up in a debugger.
    pub var_debug_info: bool,

    /// Emit the `SourceFile` attribute
    pub source_file_debug_info: bool,

    /// Complexity above which a `finally` block is emitted once and reached with `jsr`
    ///
    /// Only applies to targets without stack maps. A limit of `0` or less always uses
    /// subroutines, while a limit of `100` or more never does.
    pub jsr_limit: i32,

    /// Start every method with 4-byte jump offsets instead of waiting for a jump to overflow
    pub fat_code: bool,
}

impl Settings {
    /// Options for the emitter of one method body
    pub fn code_options(&self, fat_code: bool) -> CodeOptions {
        CodeOptions {
            fat_code,
            line_debug_info: self.line_debug_info,
            var_debug_info: self.var_debug_info,
            stack_map: if self.target.generates_stack_map_table() {
                StackMapFormat::Jsr202
            } else {
                StackMapFormat::None
            },
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            target: Version::default(),
            line_debug_info: true,
            var_debug_info: false,
            source_file_debug_info: true,
            jsr_limit: 50,
            fat_code: false,
        }
    }
}

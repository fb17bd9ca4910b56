//! Bytecode generator and class file writer for the back end of a Java compiler
//!
//! The input is an attributed tree ([`tree`]) over a symbol table ([`jvm::ClassGraph`]). The
//! [`translate`] module turns it into bytecode, which [`jvm`] serializes into class files.

pub mod demo;
pub mod jvm;
pub mod translate;
pub mod tree;
pub mod util;

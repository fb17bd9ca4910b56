//! Compilation sessions
//!
//! A session owns the class graph, the settings, and the one pool reused by every class. Each
//! compilation unit goes through two phases: normalization (which may add `<clinit>` methods to
//! the graph) and then translation plus serialization of every class, one at a time.

use super::class::ClassTranslator;
use super::normalize::normalize_class;
use super::{Diagnostic, Diagnostics, Error, LimitKind, Settings};
use crate::jvm;
use crate::jvm::{write_class_file, ClassGraph, ClassId, ClassWriter, JavaLibrary, Pool};
use crate::tree::{CompilationUnit, MethodDecl, Pos};
use std::path::{Path, PathBuf};

/// Serialized class file
pub struct ClassOutput {
    pub class: ClassId,

    /// Binary name of the class (eg. `java/lang/Object`)
    pub binary_name: String,
    pub bytes: Vec<u8>,
}

/// Class after normalization, waiting to be translated
struct NormalizedClass {
    class: ClassId,
    pos: Pos,
    methods: Vec<MethodDecl>,
    diagnostics: Vec<Diagnostic>,
}

pub struct Session {
    graph: ClassGraph,
    java: JavaLibrary,
    settings: Settings,
    pool: Pool,
    diagnostics: Diagnostics,
}

impl Session {
    pub fn new(graph: ClassGraph, java: JavaLibrary, settings: Settings) -> Session {
        Session {
            graph,
            java,
            settings,
            pool: Pool::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn graph(&self) -> &ClassGraph {
        &self.graph
    }

    pub fn java(&self) -> &JavaLibrary {
        &self.java
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Every diagnostic reported so far
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Translate and serialize the classes of a compilation unit
    ///
    /// Classes are still translated after the first diagnostic (so that all limit violations
    /// get reported together), but from then on none of them is serialized.
    pub fn generate(&mut self, unit: CompilationUnit) -> Result<Vec<ClassOutput>, Error> {
        let normalized = self.normalize(unit);

        let mut outputs = vec![];
        for NormalizedClass {
            class,
            pos,
            methods,
            diagnostics,
        } in normalized
        {
            let (image, diagnostics) =
                ClassTranslator::new(&self.graph, &self.java, &self.settings, &mut self.pool)
                    .with_diagnostics(diagnostics)
                    .translate(class, pos, &methods)?;
            for diagnostic in diagnostics {
                self.diagnostics.report(diagnostic);
            }

            let image = match image {
                Some(image) if self.diagnostics.is_empty() => image,
                _ => continue,
            };
            let writer = ClassWriter::new(
                &self.graph,
                self.settings.target,
                self.settings.source_file_debug_info,
            );
            let kind = match writer.write_class(&image, &mut self.pool) {
                Ok(bytes) => {
                    outputs.push(ClassOutput {
                        class,
                        binary_name: self.graph.class(class).name.clone(),
                        bytes,
                    });
                    continue;
                }
                Err(jvm::Error::ConstantPoolOverflow { .. }) => LimitKind::Pool,
                Err(jvm::Error::StringOverflow(_)) => LimitKind::StringOverflow,
                Err(err) => return Err(err.into()),
            };
            let name = self.graph.class(class).name.as_str();
            self.diagnostics.report(Diagnostic::new(name, pos, kind));
        }
        Ok(outputs)
    }

    /// Translate a compilation unit and write its class files under `output_dir`
    ///
    /// Returns the paths of the files written.
    pub fn compile_to(&mut self, unit: CompilationUnit, output_dir: &Path) -> Result<Vec<PathBuf>, Error> {
        let mut written = vec![];
        for output in self.generate(unit)? {
            let path = write_class_file(output_dir, &output.binary_name, &output.bytes)?;
            log::info!("wrote {} ({} bytes)", path.display(), output.bytes.len());
            written.push(path);
        }
        Ok(written)
    }

    fn normalize(&mut self, unit: CompilationUnit) -> Vec<NormalizedClass> {
        let mut normalized = Vec::with_capacity(unit.classes.len());
        for decl in unit.classes {
            let class = decl.class;
            let pos = decl.pos;
            self.graph.class_mut(class).source_file = Some(unit.source_file.clone());

            let mut diagnostics = vec![];
            let methods = normalize_class(&mut self.graph, &self.java, decl, &mut diagnostics);
            normalized.push(NormalizedClass {
                class,
                pos,
                methods,
                diagnostics,
            });
        }
        normalized
    }
}

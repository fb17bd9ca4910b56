use super::method::MethodTranslator;
use super::{Diagnostic, Error, LimitKind, Settings};
use crate::jvm;
use crate::jvm::{ClassGraph, ClassId, ClassImage, ConstantsPool, JavaLibrary, Pool};
use crate::tree::{MethodDecl, Pos};

/// Translates the normalized methods of one class into a class image
///
/// The pool is shared by every class of a session and gets reset at the start of each class.
/// Limit violations end up in the class diagnostics, in which case no image is produced.
pub struct ClassTranslator<'a, 'g> {
    graph: &'g ClassGraph,
    java: &'a JavaLibrary,
    settings: &'a Settings,
    pool: &'a mut Pool,
    diagnostics: Vec<Diagnostic>,
}

impl<'a, 'g> ClassTranslator<'a, 'g> {
    pub fn new(
        graph: &'g ClassGraph,
        java: &'a JavaLibrary,
        settings: &'a Settings,
        pool: &'a mut Pool,
    ) -> ClassTranslator<'a, 'g> {
        ClassTranslator {
            graph,
            java,
            settings,
            pool,
            diagnostics: vec![],
        }
    }

    /// Start from diagnostics already reported for the class (during normalization)
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Generate code for every method
    ///
    /// Returns the image (`None` if the class has errors) along with the diagnostics of the
    /// class.
    pub fn translate(
        mut self,
        class: ClassId,
        pos: Pos,
        methods: &[MethodDecl],
    ) -> Result<(Option<ClassImage>, Vec<Diagnostic>), Error> {
        let graph = self.graph;
        log::debug!(
            "translating class {} ({} methods)",
            graph.class(class).name,
            methods.len()
        );
        self.pool.reset();

        let mut image = ClassImage::new(class);
        for decl in methods {
            let translator = MethodTranslator::new(
                graph,
                self.java,
                self.settings,
                &mut *self.pool,
                &mut self.diagnostics,
                decl,
            );
            match translator.translate() {
                Ok(Some(code)) => {
                    image.code.insert(decl.method, code);
                }
                Ok(None) => (),
                Err(Error::Jvm(jvm::Error::ConstantPoolOverflow { .. })) => {
                    self.report(class, decl.pos, LimitKind::Pool);
                    break;
                }
                Err(Error::Jvm(jvm::Error::StringOverflow(_))) => {
                    self.report(class, decl.pos, LimitKind::StringOverflow);
                }
                Err(err) => return Err(err),
            }
        }

        if self.pool.constants().next_index() > ConstantsPool::MAX_INDEX {
            self.report(class, pos, LimitKind::Pool);
        }

        if self.diagnostics.is_empty() {
            Ok((Some(image), self.diagnostics))
        } else {
            log::debug!(
                "discarding code of {} after {} errors",
                graph.class(class).name,
                self.diagnostics.len()
            );
            Ok((None, self.diagnostics))
        }
    }

    fn report(&mut self, class: ClassId, pos: Pos, kind: LimitKind) {
        let name = self.graph.class(class).name.as_str();
        self.diagnostics.push(Diagnostic::new(name, pos, kind));
    }
}

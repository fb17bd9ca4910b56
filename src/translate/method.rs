use super::env::EnvStack;
use super::items::Items;
use super::{Diagnostic, Error, LimitKind, Settings};
use crate::jvm::code::{Code, CodeLimit, MethodCode};
use crate::jvm::opcodes::{GOTO, RETURN};
use crate::jvm::{ClassConstantIndex, ClassGraph, ConstValue, JavaLibrary, LocalId, Pool, Type, Width};
use crate::tree::{Block, MethodDecl, Pos};
use std::collections::HashMap;

/// Most parameter slots a method descriptor may take, receiver included
pub const MAX_PARAMETERS: usize = 255;

/// Most dimensions an array type may have
pub const MAX_DIMENSIONS: usize = 255;

/// Longest string constant, in UTF-16 units, before the UTF8 encoding is at risk of overflowing
pub const MAX_STRING_LENGTH: usize = 0xFFFF;

/// Context for translating the body of one method into bytecode
///
/// Statements and expressions are translated by the methods in `statements.rs`,
/// `expressions.rs`, and `switch.rs`.
pub struct MethodTranslator<'a, 'g, 't> {
    pub(super) graph: &'g ClassGraph,
    pub(super) java: &'a JavaLibrary,
    pub(super) settings: &'a Settings,
    pub(super) pool: &'a mut Pool,

    /// Diagnostics of the class the method belongs to
    pub(super) diagnostics: &'a mut Vec<Diagnostic>,
    pub(super) decl: &'t MethodDecl,

    pub(super) code: Code<'g>,
    pub(super) envs: EnvStack<'t>,

    /// Register of every local variable in scope
    pub(super) locals: HashMap<LocalId, usize>,

    /// Emit finalizers as `jsr` subroutines
    ///
    /// Set for big finalizers, and for every finalizer once an exception range has failed to
    /// fit 16 bits. It sticks for the rest of the method.
    pub(super) use_jsr: bool,
}

impl<'a, 'g, 't> MethodTranslator<'a, 'g, 't> {
    pub fn new(
        graph: &'g ClassGraph,
        java: &'a JavaLibrary,
        settings: &'a Settings,
        pool: &'a mut Pool,
        diagnostics: &'a mut Vec<Diagnostic>,
        decl: &'t MethodDecl,
    ) -> MethodTranslator<'a, 'g, 't> {
        MethodTranslator {
            graph,
            java,
            settings,
            pool,
            diagnostics,
            decl,
            code: Code::new(graph, decl.method, settings.code_options(settings.fat_code)),
            envs: EnvStack::new(),
            locals: HashMap::new(),
            use_jsr: false,
        }
    }

    /// Translate the method
    ///
    /// Returns `None` for methods without code and for methods which exceed a class file limit
    /// (in which case a diagnostic has been reported).
    pub fn translate(mut self) -> Result<Option<MethodCode>, Error> {
        let graph = self.graph;
        let decl = self.decl;
        let method = graph.method(decl.method);

        let extra_slot = usize::from(!method.is_static() || method.is_constructor());
        if graph.external_params(decl.method).width() + extra_slot > MAX_PARAMETERS {
            self.report(decl.pos, LimitKind::Parameters);
            return Ok(None);
        }
        let body = match &decl.body {
            Some(body) => body,
            None => return Ok(None),
        };

        let mut fat_code = self.settings.fat_code;
        loop {
            log::debug!(
                "generating {}.{}{} (fat code: {}, jsr: {})",
                graph.class(method.owner).name,
                method.name,
                graph.method_descriptor(decl.method),
                fat_code,
                self.use_jsr
            );
            let attempt = match self.gen_method(body, fat_code) {
                // `use_jsr` is on now, so exception ranges get reported instead of overflowing
                Err(Error::CodeSizeOverflow) => self.gen_method(body, fat_code),
                other => other,
            };
            match attempt {
                Ok(()) => (),
                Err(Error::CodeSizeOverflow) => {
                    self.report(decl.pos, LimitKind::CodeTooLargeForTry);
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }

            if let Some(limit) = self.code.check_limits() {
                let kind = match limit {
                    CodeLimit::CodeSize => LimitKind::CodeTooLarge,
                    CodeLimit::Locals => LimitKind::Locals,
                    CodeLimit::Stack => LimitKind::Stack,
                };
                self.report(decl.pos, kind);
                return Ok(None);
            }
            if !fat_code && self.code.fatcode {
                fat_code = true;
                continue;
            }
            break;
        }

        self.code.compress_catch_table();
        Ok(Some(self.code.finish()))
    }

    /// Generate the whole body once, from a fresh emitter
    fn gen_method(&mut self, body: &'t Block, fat_code: bool) -> Result<(), Error> {
        self.init_code(fat_code)?;
        self.gen_block(body, true)?;

        let depth = self.code.state.depth();
        if depth != 0 {
            let method = self.graph.method(self.decl.method);
            return Err(Error::StackNotEmpty {
                method: format!("{}.{}", self.graph.class(method.owner).name, method.name),
                depth,
            });
        }

        if self.code.is_alive() {
            self.code.stat_begin(body.end.line_number());
            if self.graph.method(self.decl.method).ret == Type::Void {
                self.code.emitop0(RETURN)?;
            } else {
                // Unreachable in well-formed trees, but the verifier still wants a terminator
                let start = self.code.entry_point()?;
                let spin = self.code.branch(GOTO)?;
                self.code.resolve_to(spin, start)?;
            }
        }
        self.code.end_scopes(0)?;
        Ok(())
    }

    /// Start over with an empty emitter holding the receiver and the parameters
    fn init_code(&mut self, fat_code: bool) -> Result<(), Error> {
        let graph = self.graph;
        let decl = self.decl;
        let method = graph.method(decl.method);

        self.code = Code::new(graph, decl.method, self.settings.code_options(fat_code));
        self.envs = EnvStack::new();
        self.locals.clear();

        if !method.is_static() {
            let receiver = if method.is_constructor() && !graph.is_object(method.owner) {
                Type::UninitializedThis(method.owner)
            } else {
                Type::Object(method.owner)
            };
            let reg = self.code.new_local_var("this", receiver, None, false)?;
            self.code.set_defined(reg);
        }

        let params = graph.external_params(decl.method);
        if params.len() != decl.params.len() {
            return Err(Error::MalformedTree(format!(
                "{} declares {} parameters but its descriptor has {}",
                method.name,
                decl.params.len(),
                params.len()
            )));
        }
        for (var, ty) in decl.params.iter().zip(params) {
            self.check_dimension(decl.pos, &ty);
            let name = graph.local(*var).name.clone();
            let reg = self.code.new_local_var(name, ty, Some(*var), false)?;
            self.code.set_defined(reg);
            self.locals.insert(*var, reg);
        }

        self.code.method_entry()?;
        Ok(())
    }

    pub(super) fn items(&mut self) -> Items<'_, 'g> {
        Items::new(&mut self.code, &mut *self.pool)
    }

    pub(super) fn report(&mut self, pos: Pos, kind: LimitKind) {
        let class = &self.graph.class(self.code.this_class()).name;
        self.diagnostics.push(Diagnostic::new(class.as_str(), pos, kind));
    }

    /// Allocate a register for a declared local variable
    pub(super) fn new_local(&mut self, var: LocalId, pos: Pos) -> Result<usize, Error> {
        let local = self.graph.local(var);
        self.check_dimension(pos, &local.ty);
        let reg = self
            .code
            .new_local_var(local.name.clone(), local.ty.clone(), Some(var), false)?;
        self.locals.insert(var, reg);
        Ok(reg)
    }

    pub(super) fn local_reg(&self, var: LocalId) -> Result<usize, Error> {
        self.locals.get(&var).copied().ok_or_else(|| {
            Error::MalformedTree(format!("local {} used outside of its scope", self.graph.local(var).name))
        })
    }

    pub(super) fn check_dimension(&mut self, pos: Pos, ty: &Type) {
        if ty.dimensions() > MAX_DIMENSIONS {
            self.report(pos, LimitKind::Dimensions);
        }
    }

    /// Report string constants too long for the pool, unless the class already has errors
    pub(super) fn check_string_constant(&mut self, pos: Pos, constant: Option<&ConstValue>) {
        if !self.diagnostics.is_empty() {
            return;
        }
        if let Some(ConstValue::String(string)) = constant {
            if string.encode_utf16().count() >= MAX_STRING_LENGTH {
                self.report(pos, LimitKind::StringConstant);
            }
        }
    }

    /// Class constant for a reference type
    pub(super) fn make_ref(&mut self, pos: Pos, ty: &Type) -> Result<ClassConstantIndex, Error> {
        self.check_dimension(pos, ty);
        Ok(self.pool.put_type(self.graph, ty)?)
    }

    /// Add an exception table entry, unless the range is empty
    ///
    /// Offsets past 16 bits abort the attempt when switching to subroutines is still possible,
    /// since that shrinks the code.
    pub(super) fn register_catch(
        &mut self,
        pos: Pos,
        start_pc: usize,
        end_pc: usize,
        handler_pc: usize,
        catch_type: Option<ClassConstantIndex>,
    ) -> Result<(), Error> {
        if start_pc == end_pc {
            return Ok(());
        }
        match (
            u16::try_from(start_pc),
            u16::try_from(end_pc),
            u16::try_from(handler_pc),
        ) {
            (Ok(start_pc), Ok(end_pc), Ok(handler_pc)) => {
                self.code.add_catch(start_pc, end_pc, handler_pc, catch_type);
            }
            _ if !self.use_jsr && !self.settings.target.generates_stack_map_table() => {
                self.use_jsr = true;
                return Err(Error::CodeSizeOverflow);
            }
            _ => self.report(pos, LimitKind::CodeTooLargeForTry),
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::opcodes::ICONST_0;
    use crate::jvm::{ClassSymbol, Flags, MethodSymbol};
    use crate::tree::TreeMaker;

    #[test]
    fn leftover_stack_values_are_an_error() {
        let mut graph = ClassGraph::new();
        let java = graph.insert_java_library_types();
        let class = graph.add_class(ClassSymbol::new("p/C", Flags::PUBLIC, Some(java.object)));
        let method = graph.add_method(MethodSymbol::new("m", class, Flags::STATIC, vec![], Type::Void));

        let make = TreeMaker::new(&graph, &java, class);
        let stat = make.empty();
        let decl = make.method(method, vec![], Some(make.body(vec![])));

        let settings = Settings::default();
        let mut pool = Pool::new();
        let mut diagnostics = vec![];
        let mut translator = MethodTranslator::new(&graph, &java, &settings, &mut pool, &mut diagnostics, &decl);
        translator.init_code(false).unwrap();
        translator.code.emitop0(ICONST_0).unwrap();

        match translator.gen_stat(&stat) {
            Err(Error::StackNotEmpty { method, depth }) => {
                assert_eq!(method, "p/C.m");
                assert_eq!(depth, 1);
            }
            other => panic!("expected a stack error, got {:?}", other),
        }
    }

    #[test]
    fn reachable_method_ends_get_a_terminator() {
        let mut graph = ClassGraph::new();
        let java = graph.insert_java_library_types();
        let class = graph.add_class(ClassSymbol::new("p/C", Flags::PUBLIC, Some(java.object)));
        let void = graph.add_method(MethodSymbol::new("v", class, Flags::STATIC, vec![], Type::Void));
        let int = graph.add_method(MethodSymbol::new("i", class, Flags::STATIC, vec![], Type::INT));

        let make = TreeMaker::new(&graph, &java, class);
        let settings = Settings::default();
        let mut pool = Pool::new();
        let mut diagnostics = vec![];

        let decl = make.method(void, vec![], Some(make.body(vec![])));
        let code = MethodTranslator::new(&graph, &java, &settings, &mut pool, &mut diagnostics, &decl)
            .translate()
            .unwrap()
            .expect("method has a body");
        assert_eq!(code.bytes, vec![RETURN]);

        let decl = make.method(int, vec![], Some(make.body(vec![])));
        let code = MethodTranslator::new(&graph, &java, &settings, &mut pool, &mut diagnostics, &decl)
            .translate()
            .unwrap()
            .expect("method has a body");
        assert_eq!(code.bytes, vec![GOTO, 0, 0], "jump to itself");
        assert!(diagnostics.is_empty());
    }
}

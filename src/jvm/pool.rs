use super::{
    ClassConstantIndex, ClassGraph, ClassId, ClassOwner, ConstValue, Constant, ConstantIndex,
    ConstantsPool, Error, FieldId, FieldRefConstantIndex, MethodId, MethodRefConstantIndex,
    NameAndTypeConstantIndex, Type, Utf8ConstantIndex,
};
use std::collections::HashSet;

/// Constant pool of the class being written, keyed by symbols instead of raw constants
///
/// Every class that goes through [`Pool::put_class`] is also checked for being nested. Nested
/// classes (and, transitively, the classes enclosing them) get recorded for the `InnerClasses`
/// attribute the first time they are seen.
#[derive(Default)]
pub struct Pool {
    constants: ConstantsPool,

    /// Nested classes in the order they were first referenced
    inner_classes: Vec<ClassId>,
    inner_seen: HashSet<ClassId>,
}

impl Pool {
    pub fn new() -> Pool {
        Pool::default()
    }

    /// Underlying raw pool
    pub fn constants(&self) -> &ConstantsPool {
        &self.constants
    }

    /// Nested classes referenced so far, outermost first within each chain
    pub fn inner_classes(&self) -> &[ClassId] {
        &self.inner_classes
    }

    /// Forget everything, so the pool can be used for the next class
    pub fn reset(&mut self) {
        self.constants.clear();
        self.inner_classes.clear();
        self.inner_seen.clear();
    }

    pub fn put_utf8(&mut self, utf8: impl Into<String>) -> Result<Utf8ConstantIndex, Error> {
        self.constants.get_utf8(utf8)
    }

    pub fn lookup_utf8(&self, utf8: &str) -> Option<Utf8ConstantIndex> {
        self.constants
            .lookup(&Constant::Utf8(utf8.to_owned()))
            .map(Utf8ConstantIndex)
    }

    /// Class constant for a class symbol
    pub fn put_class(&mut self, graph: &ClassGraph, class: ClassId) -> Result<ClassConstantIndex, Error> {
        self.enter_inner(graph, class)?;
        self.put_class_name(&graph.class(class).name)
    }

    /// Class constant for a reference type (arrays are named by their descriptor)
    pub fn put_type(&mut self, graph: &ClassGraph, ty: &Type) -> Result<ClassConstantIndex, Error> {
        let mut elem = ty;
        while let Type::Array(inner) = elem {
            elem = inner;
        }
        if let Type::Object(class) = elem {
            self.enter_inner(graph, *class)?;
        }
        self.put_class_name(&graph.class_constant_name(ty))
    }

    fn put_class_name(&mut self, name: &str) -> Result<ClassConstantIndex, Error> {
        let name = self.constants.get_utf8(name)?;
        self.constants.get_class(name)
    }

    pub fn put_name_and_type(
        &mut self,
        name: &str,
        descriptor: &str,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        let name = self.constants.get_utf8(name)?;
        let descriptor = self.constants.get_utf8(descriptor)?;
        self.constants.get_name_and_type(name, descriptor)
    }

    /// Field reference, qualified by the class the field is accessed through
    pub fn put_field(
        &mut self,
        graph: &ClassGraph,
        field: FieldId,
        qualifier: ClassId,
    ) -> Result<FieldRefConstantIndex, Error> {
        let data = graph.field(field);
        let class = self.put_class(graph, qualifier)?;
        let name_and_type = self.put_name_and_type(&data.name, &graph.descriptor(&data.ty))?;
        self.constants.get_field_ref(class, name_and_type)
    }

    /// Method reference, qualified by the class the method is accessed through
    pub fn put_method(
        &mut self,
        graph: &ClassGraph,
        method: MethodId,
        qualifier: ClassId,
    ) -> Result<MethodRefConstantIndex, Error> {
        let data = graph.method(method);
        let is_interface = graph.class(qualifier).is_interface();
        let class = self.put_class(graph, qualifier)?;
        let name_and_type = self.put_name_and_type(&data.name, &graph.method_descriptor(method))?;
        self.constants.get_method_ref(class, name_and_type, is_interface)
    }

    /// Loadable constant for a folded value
    pub fn put_constant(&mut self, value: &ConstValue) -> Result<ConstantIndex, Error> {
        match value {
            ConstValue::Int(i) => self.constants.get_integer(*i),
            ConstValue::Long(l) => self.constants.get_long(*l),
            ConstValue::Float(f) => self.constants.get_float(*f),
            ConstValue::Double(d) => self.constants.get_double(*d),
            ConstValue::String(s) => {
                let utf8 = self.constants.get_utf8(s.as_str())?;
                self.constants.get_string(utf8).map(Into::into)
            }
        }
    }

    /// Record a nested class for the `InnerClasses` attribute
    ///
    /// Enclosing classes are entered before the classes they enclose. The simple name of the
    /// class gets pooled alongside it, and so does the attribute name on the very first entry.
    pub fn enter_inner(&mut self, graph: &ClassGraph, class: ClassId) -> Result<(), Error> {
        if !graph.is_inner(class) || self.inner_seen.contains(&class) {
            return Ok(());
        }
        let data = graph.class(class);
        match data.owner {
            ClassOwner::Package => (),
            ClassOwner::Class(outer) => {
                self.enter_inner(graph, outer)?;
                self.put_class_name(&graph.class(outer).name)?;
            }
            ClassOwner::Method(method) => self.enter_inner(graph, graph.method(method).owner)?,
        }
        self.put_class_name(&data.name)?;
        if !data.is_anonymous() {
            self.constants.get_utf8(data.simple_name.as_str())?;
        }
        if self.inner_classes.is_empty() {
            self.constants.get_utf8("InnerClasses")?;
        }
        self.inner_seen.insert(class);
        self.inner_classes.push(class);
        Ok(())
    }
}

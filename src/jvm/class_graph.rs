use super::{BaseType, ConstValue, Flags, Type};
use std::collections::{HashMap, HashSet};

/// Handle to a class or interface in a [`ClassGraph`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(usize);

/// Handle to a method in a [`ClassGraph`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(usize);

/// Handle to a field in a [`ClassGraph`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

/// Handle to a local variable (including parameters) in a [`ClassGraph`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(usize);

/// What lexically encloses a class
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassOwner {
    /// Top-level class
    Package,

    /// Member class
    Class(ClassId),

    /// Local or anonymous class declared inside a method body
    Method(MethodId),
}

#[derive(Debug)]
pub struct ClassSymbol {
    /// Binary name, written as `my/pkg/Outer$Inner`
    pub name: String,

    /// Name as written in source (empty for anonymous classes)
    pub simple_name: String,

    pub flags: Flags,
    pub superclass: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub owner: ClassOwner,

    /// Generic signature, if the class or anything in its header is generic
    pub signature: Option<String>,

    /// Path of the source file this class was compiled from
    pub source_file: Option<String>,

    pub fields: Vec<FieldId>,
    pub methods: Vec<MethodId>,
}

impl ClassSymbol {
    pub fn new(name: impl Into<String>, flags: Flags, superclass: Option<ClassId>) -> ClassSymbol {
        let name = name.into();
        let simple_name = name
            .rsplit(|c: char| c == '/' || c == '$')
            .next()
            .unwrap_or_default()
            .to_owned();
        ClassSymbol {
            name,
            simple_name,
            flags,
            superclass,
            interfaces: vec![],
            owner: ClassOwner::Package,
            signature: None,
            source_file: None,
            fields: vec![],
            methods: vec![],
        }
    }

    pub fn is_interface(&self) -> bool {
        self.flags.is_interface()
    }

    pub fn is_anonymous(&self) -> bool {
        self.simple_name.is_empty()
    }
}

#[derive(Debug)]
pub struct MethodSymbol {
    pub name: String,
    pub owner: ClassId,
    pub flags: Flags,

    /// Erased declared parameter types (without any synthetic outer instance parameter)
    pub params: Vec<Type>,
    pub ret: Type,
    pub thrown: Vec<ClassId>,
    pub signature: Option<String>,
}

impl MethodSymbol {
    pub fn new(
        name: impl Into<String>,
        owner: ClassId,
        flags: Flags,
        params: Vec<Type>,
        ret: Type,
    ) -> MethodSymbol {
        MethodSymbol {
            name: name.into(),
            owner,
            flags,
            params,
            ret,
            thrown: vec![],
            signature: None,
        }
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static(&self) -> bool {
        self.flags.is_static()
    }
}

#[derive(Debug)]
pub struct FieldSymbol {
    pub name: String,
    pub owner: ClassId,
    pub flags: Flags,
    pub ty: Type,

    /// Folded value of a constant variable
    pub constant: Option<ConstValue>,
    pub signature: Option<String>,
}

impl FieldSymbol {
    pub fn new(name: impl Into<String>, owner: ClassId, flags: Flags, ty: Type) -> FieldSymbol {
        FieldSymbol {
            name: name.into(),
            owner,
            flags,
            ty,
            constant: None,
            signature: None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.flags.is_static()
    }
}

#[derive(Debug)]
pub struct LocalSymbol {
    pub name: String,

    /// Method whose body declares the variable
    pub owner: MethodId,
    pub flags: Flags,
    pub ty: Type,
    pub constant: Option<ConstValue>,
}

impl LocalSymbol {
    pub fn new(name: impl Into<String>, owner: MethodId, ty: Type) -> LocalSymbol {
        LocalSymbol {
            name: name.into(),
            owner,
            flags: Flags::empty(),
            ty,
            constant: None,
        }
    }
}

/// Symbol table of every class, member, and local variable the back end can see
///
/// The front end hands over a fully populated graph: classes being compiled as well as the
/// library classes they refer to. Symbols refer to each other by id, including the back
/// references from members to their owning class and from locals to their declaring method.
#[derive(Default)]
pub struct ClassGraph {
    classes: Vec<ClassSymbol>,
    methods: Vec<MethodSymbol>,
    fields: Vec<FieldSymbol>,
    locals: Vec<LocalSymbol>,
    class_names: HashMap<String, ClassId>,
}

impl ClassGraph {
    /// New empty graph
    pub fn new() -> ClassGraph {
        ClassGraph::default()
    }

    /// Register a class, returning its id
    pub fn add_class(&mut self, class: ClassSymbol) -> ClassId {
        let id = ClassId(self.classes.len());
        self.class_names.insert(class.name.clone(), id);
        self.classes.push(class);
        id
    }

    /// Register a method, also listing it among its owner's methods
    pub fn add_method(&mut self, method: MethodSymbol) -> MethodId {
        let id = MethodId(self.methods.len());
        self.classes[method.owner.0].methods.push(id);
        self.methods.push(method);
        id
    }

    /// Register a field, also listing it among its owner's fields
    pub fn add_field(&mut self, field: FieldSymbol) -> FieldId {
        let id = FieldId(self.fields.len());
        self.classes[field.owner.0].fields.push(id);
        self.fields.push(field);
        id
    }

    pub fn add_local(&mut self, local: LocalSymbol) -> LocalId {
        let id = LocalId(self.locals.len());
        self.locals.push(local);
        id
    }

    pub fn class(&self, id: ClassId) -> &ClassSymbol {
        &self.classes[id.0]
    }

    pub fn class_mut(&mut self, id: ClassId) -> &mut ClassSymbol {
        &mut self.classes[id.0]
    }

    pub fn method(&self, id: MethodId) -> &MethodSymbol {
        &self.methods[id.0]
    }

    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodSymbol {
        &mut self.methods[id.0]
    }

    pub fn field(&self, id: FieldId) -> &FieldSymbol {
        &self.fields[id.0]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut FieldSymbol {
        &mut self.fields[id.0]
    }

    pub fn local(&self, id: LocalId) -> &LocalSymbol {
        &self.locals[id.0]
    }

    pub fn local_mut(&mut self, id: LocalId) -> &mut LocalSymbol {
        &mut self.locals[id.0]
    }

    pub fn lookup_class(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    /// Find a method declared directly on a class by name and erased parameter types
    pub fn lookup_method(&self, class: ClassId, name: &str, params: &[Type]) -> Option<MethodId> {
        self.class(class)
            .methods
            .iter()
            .copied()
            .find(|m| self.method(*m).name == name && self.method(*m).params == params)
    }

    pub fn is_object(&self, class: ClassId) -> bool {
        self.class(class).name == "java/lang/Object"
    }

    /// Member classes lexically nested directly inside `class`
    pub fn member_classes(&self, class: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        self.classes
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.owner == ClassOwner::Class(class))
            .map(|(idx, _)| ClassId(idx))
    }

    /// Is this a nested class (member, local, or anonymous)?
    pub fn is_inner(&self, class: ClassId) -> bool {
        self.class(class).owner != ClassOwner::Package
    }

    /// Class whose instance an instance of `class` is bound to, if any
    pub fn outer_instance(&self, class: ClassId) -> Option<ClassId> {
        let data = self.class(class);
        if data.flags.is_static() || data.is_interface() {
            return None;
        }
        match data.owner {
            ClassOwner::Package => None,
            ClassOwner::Class(outer) => Some(outer),
            ClassOwner::Method(method) => {
                let method = self.method(method);
                if method.is_static() {
                    None
                } else {
                    Some(method.owner)
                }
            }
        }
    }

    /// Parameter types as they appear in the method descriptor
    ///
    /// Constructors of inner classes take the enclosing instance as a leading extra argument.
    pub fn external_params(&self, method: MethodId) -> Vec<Type> {
        let data = self.method(method);
        let mut params = Vec::with_capacity(data.params.len() + 1);
        if data.is_constructor() {
            if let Some(outer) = self.outer_instance(data.owner) {
                params.push(Type::Object(outer));
            }
        }
        params.extend(data.params.iter().cloned());
        params
    }

    /// Field or method descriptor of a type
    pub fn descriptor(&self, ty: &Type) -> String {
        let mut rendered = String::new();
        self.render_descriptor(ty, &mut rendered);
        rendered
    }

    fn render_descriptor(&self, ty: &Type, out: &mut String) {
        match ty {
            Type::Base(base) => out.push(base.descriptor_char()),
            Type::Void => out.push('V'),
            Type::Object(class)
            | Type::UninitializedThis(class)
            | Type::Uninitialized { class, .. } => {
                out.push('L');
                out.push_str(&self.class(*class).name);
                out.push(';');
            }
            Type::Array(elem) => {
                out.push('[');
                self.render_descriptor(elem, out);
            }
            // Neither of these is ever written to a class file as a descriptor
            Type::Null | Type::ReturnAddress => out.push_str("Ljava/lang/Object;"),
        }
    }

    /// External method descriptor, eg. `(ILjava/lang/String;)V`
    pub fn method_descriptor(&self, method: MethodId) -> String {
        let mut rendered = String::from("(");
        for param in self.external_params(method) {
            self.render_descriptor(&param, &mut rendered);
        }
        rendered.push(')');
        self.render_descriptor(&self.method(method).ret, &mut rendered);
        rendered
    }

    /// Name to put in a `CONSTANT_Class_info` for a reference type
    ///
    /// Classes use their binary name while arrays use their descriptor.
    pub fn class_constant_name(&self, ty: &Type) -> String {
        match ty {
            Type::Object(class) => self.class(*class).name.clone(),
            other => self.descriptor(other),
        }
    }

    /// Subtyping between erased types
    ///
    /// Follows the verifier's assignability rules, restricted to what can show up on the operand
    /// stack.
    pub fn is_subtype(&self, sub_type: &Type, super_type: &Type) -> bool {
        match (sub_type, super_type) {
            (t1, t2) if t1 == t2 => true,
            (Type::Base(b1), Type::Base(b2)) => b1.is_int_like() && *b2 == BaseType::Int,
            (Type::Null, Type::Object(_) | Type::Array(_)) => true,
            (Type::Object(cls1), Type::Object(cls2)) => self.is_subclass(*cls1, *cls2),

            // Arrays extend `Object` and implement `Cloneable` and `Serializable`
            (Type::Array(_), Type::Object(cls)) => {
                let name = self.class(*cls).name.as_str();
                name == "java/lang/Object"
                    || name == "java/lang/Cloneable"
                    || name == "java/io/Serializable"
            }

            // Primitive arrays must match exactly, reference arrays are covariant
            (Type::Array(elem1), Type::Array(elem2)) => {
                elem1.is_reference() && elem2.is_reference() && self.is_subtype(elem1, elem2)
            }

            _ => false,
        }
    }

    /// Is `super_class` reachable from `sub_class` through superclasses and interfaces?
    ///
    /// Every class and interface is a subtype of `java/lang/Object`.
    pub fn is_subclass(&self, sub_class: ClassId, super_class: ClassId) -> bool {
        if sub_class == super_class || self.is_object(super_class) {
            return true;
        }

        let mut supertypes_to_visit: Vec<ClassId> = vec![sub_class];
        let mut dont_revisit: HashSet<ClassId> = HashSet::new();
        dont_revisit.insert(sub_class);

        // Interfaces never lead to a class
        let super_is_class: bool = !self.class(super_class).is_interface();

        while let Some(class) = supertypes_to_visit.pop() {
            if class == super_class {
                return true;
            }

            let data = self.class(class);
            if let Some(superclass) = data.superclass {
                if dont_revisit.insert(superclass) {
                    supertypes_to_visit.push(superclass);
                }
            }
            if !super_is_class {
                for interface in &data.interfaces {
                    if dont_revisit.insert(*interface) {
                        supertypes_to_visit.push(*interface);
                    }
                }
            }
        }

        false
    }

    /// Add the handful of standard library types the code generator relies on
    pub fn insert_java_library_types(&mut self) -> JavaLibrary {
        let public = Flags::PUBLIC;
        let object = self.add_class(ClassSymbol::new("java/lang/Object", public, None));
        let object_type = Type::Object(object);

        let add_interface = |graph: &mut ClassGraph, name: &str| {
            graph.add_class(ClassSymbol::new(
                name,
                public | Flags::INTERFACE | Flags::ABSTRACT,
                Some(object),
            ))
        };
        let serializable = add_interface(self, "java/io/Serializable");
        let cloneable = add_interface(self, "java/lang/Cloneable");
        let char_sequence = add_interface(self, "java/lang/CharSequence");

        let mut string_data = ClassSymbol::new("java/lang/String", public | Flags::FINAL, Some(object));
        string_data.interfaces = vec![serializable, char_sequence];
        let string = self.add_class(string_data);
        let string_type = Type::Object(string);

        let class = self.add_class(ClassSymbol::new("java/lang/Class", public | Flags::FINAL, Some(object)));
        let mut throwable_data = ClassSymbol::new("java/lang/Throwable", public, Some(object));
        throwable_data.interfaces = vec![serializable];
        let throwable = self.add_class(throwable_data);

        let object_init = self.add_method(MethodSymbol::new("<init>", object, public, vec![], Type::Void));
        let get_class = self.add_method(MethodSymbol::new(
            "getClass",
            object,
            public | Flags::FINAL,
            vec![],
            Type::Object(class),
        ));

        let mut add_builder = |graph: &mut ClassGraph, name: &str| -> StringBuilderMembers {
            let mut builder_data = ClassSymbol::new(name, public | Flags::FINAL, Some(object));
            builder_data.interfaces = vec![serializable, char_sequence];
            let builder = graph.add_class(builder_data);
            let builder_type = Type::Object(builder);
            let mut append = |graph: &mut ClassGraph, param: Type| {
                graph.add_method(MethodSymbol::new(
                    "append",
                    builder,
                    public,
                    vec![param],
                    builder_type.clone(),
                ))
            };
            StringBuilderMembers {
                class: builder,
                append_object: append(graph, object_type.clone()),
                append_string: append(graph, string_type.clone()),
                append_boolean: append(graph, Type::BOOLEAN),
                append_char: append(graph, Type::CHAR),
                append_int: append(graph, Type::INT),
                append_long: append(graph, Type::LONG),
                append_float: append(graph, Type::FLOAT),
                append_double: append(graph, Type::DOUBLE),
                init: graph.add_method(MethodSymbol::new("<init>", builder, public, vec![], Type::Void)),
                to_string: graph.add_method(MethodSymbol::new(
                    "toString",
                    builder,
                    public,
                    vec![],
                    string_type.clone(),
                )),
            }
        };
        let string_builder = add_builder(self, "java/lang/StringBuilder");
        let string_buffer = add_builder(self, "java/lang/StringBuffer");

        JavaLibrary {
            object,
            string,
            class,
            throwable,
            cloneable,
            serializable,
            object_init,
            get_class,
            string_builder,
            string_buffer,
        }
    }
}

/// Standard types inside `java.*` that generated code refers to on its own
pub struct JavaLibrary {
    pub object: ClassId,
    pub string: ClassId,
    pub class: ClassId,
    pub throwable: ClassId,
    pub cloneable: ClassId,
    pub serializable: ClassId,

    /// `java.lang.Object.<init>()`
    pub object_init: MethodId,

    /// `java.lang.Object.getClass()`, used for null checks
    pub get_class: MethodId,

    pub string_builder: StringBuilderMembers,
    pub string_buffer: StringBuilderMembers,
}

/// Members of `java.lang.StringBuilder` or `java.lang.StringBuffer` used for string concatenation
pub struct StringBuilderMembers {
    pub class: ClassId,
    pub init: MethodId,
    pub to_string: MethodId,
    pub append_object: MethodId,
    pub append_string: MethodId,
    pub append_boolean: MethodId,
    pub append_char: MethodId,
    pub append_int: MethodId,
    pub append_long: MethodId,
    pub append_float: MethodId,
    pub append_double: MethodId,
}

impl StringBuilderMembers {
    /// Overload of `append` for a value of the given type
    pub fn append_for(&self, ty: &Type, string: ClassId) -> MethodId {
        match ty {
            Type::Base(BaseType::Boolean) => self.append_boolean,
            Type::Base(BaseType::Char) => self.append_char,
            Type::Base(BaseType::Byte | BaseType::Short | BaseType::Int) => self.append_int,
            Type::Base(BaseType::Long) => self.append_long,
            Type::Base(BaseType::Float) => self.append_float,
            Type::Base(BaseType::Double) => self.append_double,
            Type::Object(class) if *class == string => self.append_string,
            _ => self.append_object,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn subclassing_through_interfaces() {
        let mut graph = ClassGraph::new();
        let java = graph.insert_java_library_types();
        let string = Type::Object(java.string);
        let object = Type::Object(java.object);
        let serializable = Type::Object(java.serializable);
        let throwable = Type::Object(java.throwable);

        assert!(graph.is_subtype(&string, &object));
        assert!(graph.is_subtype(&string, &serializable));
        assert!(!graph.is_subtype(&object, &string));
        assert!(!graph.is_subtype(&string, &throwable));
        assert!(graph.is_subtype(&Type::Null, &string));
        assert!(graph.is_subtype(&Type::array_of(string.clone()), &Type::array_of(object.clone())));
        assert!(graph.is_subtype(&Type::array_of(Type::INT), &Type::Object(java.cloneable)));
        assert!(
            !graph.is_subtype(&Type::array_of(Type::INT), &Type::array_of(Type::LONG)),
            "primitive arrays are invariant"
        );
    }

    #[test]
    fn inner_constructor_takes_outer_instance() {
        let mut graph = ClassGraph::new();
        let java = graph.insert_java_library_types();
        let outer = graph.add_class(ClassSymbol::new("p/Outer", Flags::PUBLIC, Some(java.object)));
        let mut inner_data = ClassSymbol::new("p/Outer$Inner", Flags::empty(), Some(java.object));
        inner_data.owner = ClassOwner::Class(outer);
        let inner = graph.add_class(inner_data);
        let init = graph.add_method(MethodSymbol::new(
            "<init>",
            inner,
            Flags::empty(),
            vec![Type::INT],
            Type::Void,
        ));

        assert_eq!(graph.class(inner).simple_name, "Inner");
        assert_eq!(graph.method_descriptor(init), "(Lp/Outer;I)V");
        assert_eq!(graph.member_classes(outer).collect::<Vec<_>>(), vec![inner]);
        assert_eq!(
            graph.class_constant_name(&Type::array_of(Type::Object(outer))),
            "[Lp/Outer;"
        );
    }
}

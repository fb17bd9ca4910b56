use super::code::{LocalVarEntry, MethodCode};
use super::*;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Everything generated for one class, ready to be serialized
pub struct ClassImage {
    pub class: ClassId,

    /// Finished bodies of the methods which have code
    pub code: HashMap<MethodId, MethodCode>,
}

impl ClassImage {
    pub fn new(class: ClassId) -> ClassImage {
        ClassImage {
            class,
            code: HashMap::new(),
        }
    }
}

/// Serializes class images into class files
///
/// The pool is the one code generation used for the class, since the instruction stream already
/// refers to its indices. It keeps growing while headers, members, and attributes get written,
/// which is why it gets serialized last and only then placed in front of the rest.
pub struct ClassWriter<'g> {
    graph: &'g ClassGraph,
    target: Version,
    source_file_debug_info: bool,
}

const MAGIC: u32 = 0xCAFE_BABE;

impl<'g> ClassWriter<'g> {
    pub fn new(graph: &'g ClassGraph, target: Version, source_file_debug_info: bool) -> ClassWriter<'g> {
        ClassWriter {
            graph,
            target,
            source_file_debug_info,
        }
    }

    /// Produce the bytes of a class file
    pub fn write_class(&self, image: &ClassImage, pool: &mut Pool) -> Result<Vec<u8>, Error> {
        let graph = self.graph;
        let class = graph.class(image.class);
        let mut databuf = ByteBuffer::new();

        let mut flags = class.flags;
        if flags.contains(Flags::PROTECTED) {
            flags |= Flags::PUBLIC;
        }
        flags.remove(Flags::STRICTFP);
        let mut class_flags = ClassAccessFlags::from_bits_truncate(flags.adjusted(&self.target));
        if !class.is_interface() {
            class_flags |= ClassAccessFlags::SUPER;
        }
        if graph.is_inner(image.class) && class.is_anonymous() {
            class_flags.remove(ClassAccessFlags::FINAL);
        }
        log::debug!("writing class {} with flags {:?}", class.name, class_flags);
        class_flags.serialize(&mut databuf)?;

        pool.put_class(graph, image.class)?.serialize(&mut databuf)?;
        match class.superclass {
            Some(superclass) => pool.put_class(graph, superclass)?.serialize(&mut databuf)?,
            None => 0u16.serialize(&mut databuf)?,
        }
        let interfaces = class
            .interfaces
            .iter()
            .map(|interface| pool.put_class(graph, *interface))
            .collect::<Result<Vec<_>, _>>()?;
        interfaces.serialize(&mut databuf)?;

        for member in graph.member_classes(image.class) {
            pool.enter_inner(graph, member)?;
        }

        databuf.append_u2(class.fields.len() as u16);
        for field in &class.fields {
            self.write_field(&mut databuf, pool, *field)?;
        }

        databuf.append_u2(class.methods.len() as u16);
        for method in &class.methods {
            self.write_method(&mut databuf, pool, *method, image.code.get(method))?;
        }

        let attr_count_at = databuf.len();
        databuf.append_u2(0);
        let mut attr_count = 0;
        if let Some(signature) = &class.signature {
            let signature = pool.put_utf8(signature.as_str())?;
            write_attr(&mut databuf, pool, &Signature(signature))?;
            attr_count += 1;
        }
        if let (Some(source_file), true) = (&class.source_file, self.source_file_debug_info) {
            let simple_name = source_file
                .rsplit(|c: char| c == '/' || c == '\\')
                .next()
                .unwrap_or(source_file.as_str());
            let simple_name = pool.put_utf8(simple_name)?;
            write_attr(&mut databuf, pool, &SourceFile(simple_name))?;
            attr_count += 1;
        }
        attr_count += self.write_flag_attrs(&mut databuf, pool, class.flags)?;
        if self.target.has_enclosing_method_attribute() {
            attr_count += self.write_enclosing_method(&mut databuf, pool, image.class)?;
        }
        if !pool.inner_classes().is_empty() {
            self.write_inner_classes(&mut databuf, pool)?;
            attr_count += 1;
        }
        databuf.put_u2(attr_count_at, attr_count);

        let mut poolbuf = ByteBuffer::new();
        poolbuf.append_u4(MAGIC);
        self.target.serialize(&mut poolbuf)?;
        pool.constants().write_to(&mut poolbuf)?;
        poolbuf.append_bytes(databuf.as_slice());
        Ok(poolbuf.into_vec())
    }

    fn write_field(&self, buf: &mut ByteBuffer, pool: &mut Pool, field: FieldId) -> Result<(), Error> {
        let data = self.graph.field(field);
        FieldAccessFlags::from_bits_truncate(data.flags.adjusted(&self.target)).serialize(buf)?;
        pool.put_utf8(data.name.as_str())?.serialize(buf)?;
        pool.put_utf8(self.graph.descriptor(&data.ty))?.serialize(buf)?;

        let attr_count_at = buf.len();
        buf.append_u2(0);
        let mut attr_count = 0;
        if let Some(constant) = &data.constant {
            let value = pool.put_constant(constant)?;
            write_attr(buf, pool, &ConstantValue(value))?;
            attr_count += 1;
        }
        attr_count += self.write_member_attrs(buf, pool, data.flags, data.signature.as_deref())?;
        buf.put_u2(attr_count_at, attr_count);
        Ok(())
    }

    fn write_method(
        &self,
        buf: &mut ByteBuffer,
        pool: &mut Pool,
        method: MethodId,
        code: Option<&MethodCode>,
    ) -> Result<(), Error> {
        let data = self.graph.method(method);
        MethodAccessFlags::from_bits_truncate(data.flags.adjusted(&self.target)).serialize(buf)?;
        pool.put_utf8(data.name.as_str())?.serialize(buf)?;
        pool.put_utf8(self.graph.method_descriptor(method))?.serialize(buf)?;

        let attr_count_at = buf.len();
        buf.append_u2(0);
        let mut attr_count = 0;
        if let Some(code) = code {
            self.write_code(buf, pool, code)?;
            attr_count += 1;
        }
        if !data.thrown.is_empty() {
            let thrown = data
                .thrown
                .iter()
                .map(|class| pool.put_class(self.graph, *class))
                .collect::<Result<Vec<_>, _>>()?;
            write_attr(buf, pool, &Exceptions(thrown))?;
            attr_count += 1;
        }
        attr_count += self.write_member_attrs(buf, pool, data.flags, data.signature.as_deref())?;
        buf.put_u2(attr_count_at, attr_count);
        Ok(())
    }

    fn write_code(&self, buf: &mut ByteBuffer, pool: &mut Pool, code: &MethodCode) -> Result<(), Error> {
        let start = begin_attr(buf, pool, CODE)?;
        buf.append_u2(code.max_stack);
        buf.append_u2(code.max_locals);
        buf.append_u4(code.bytes.len() as u32);
        buf.append_bytes(&code.bytes);
        code.catch_table.clone().serialize(buf)?;

        let attr_count_at = buf.len();
        buf.append_u2(0);
        let mut attr_count = 0;
        if !code.line_numbers.is_empty() {
            write_attr(buf, pool, &LineNumberTable(code.line_numbers.clone()))?;
            attr_count += 1;
        }
        if !code.local_vars.is_empty() {
            let locals = code
                .local_vars
                .iter()
                .map(|entry| self.local_variable(pool, entry))
                .collect::<Result<Vec<_>, _>>()?;
            write_attr(buf, pool, &LocalVariableTable(locals))?;
            attr_count += 1;
        }
        if let Some(frames) = code.stack_map.as_ref().filter(|frames| !frames.is_empty()) {
            let frames = frames
                .iter()
                .cloned()
                .map(|frame| frame.try_map(|ty| self.verification_type(pool, ty)))
                .collect::<Result<Vec<_>, _>>()?;
            write_attr(buf, pool, &StackMapTable(frames))?;
            attr_count += 1;
        }
        buf.put_u2(attr_count_at, attr_count);
        end_attr(buf, start);
        Ok(())
    }

    fn local_variable(&self, pool: &mut Pool, entry: &LocalVarEntry) -> Result<LocalVariable, Error> {
        Ok(LocalVariable {
            start_pc: entry.start_pc,
            length: entry.length,
            name: pool.put_utf8(entry.name.as_str())?,
            descriptor: pool.put_utf8(self.graph.descriptor(&entry.ty))?,
            index: entry.reg,
        })
    }

    fn verification_type(&self, pool: &mut Pool, ty: Option<Type>) -> Result<VerificationType, Error> {
        let ty = match ty {
            None => return Ok(VerificationType::Top),
            Some(ty) => ty,
        };
        Ok(match ty {
            Type::Base(base) if base.is_int_like() => VerificationType::Integer,
            Type::Base(BaseType::Float) => VerificationType::Float,
            Type::Base(BaseType::Long) => VerificationType::Long,
            Type::Base(BaseType::Double) => VerificationType::Double,
            Type::Null => VerificationType::Null,
            Type::UninitializedThis(_) => VerificationType::UninitializedThis,
            Type::Object(_) | Type::Array(_) => VerificationType::Object(pool.put_type(self.graph, &ty)?),
            Type::Uninitialized { offset, .. } => VerificationType::Uninitialized(offset as u16),
            other => return Err(Error::UnmappableType(other)),
        })
    }

    /// Marker attributes for modifiers the target has no flag bit for
    fn write_flag_attrs(&self, buf: &mut ByteBuffer, pool: &mut Pool, flags: Flags) -> Result<u16, Error> {
        let mut count = 0;
        if flags.contains(Flags::DEPRECATED) {
            write_attr(buf, pool, &Deprecated)?;
            count += 1;
        }
        if flags.contains(Flags::ENUM) && !self.target.uses_enum_flag() {
            write_attr(buf, pool, &Enum)?;
            count += 1;
        }
        if flags.contains(Flags::SYNTHETIC) && !self.target.uses_synthetic_flag() {
            write_attr(buf, pool, &Synthetic)?;
            count += 1;
        }
        if flags.contains(Flags::BRIDGE) && !self.target.uses_bridge_flag() {
            write_attr(buf, pool, &Bridge)?;
            count += 1;
        }
        if flags.contains(Flags::VARARGS) && !self.target.uses_varargs_flag() {
            write_attr(buf, pool, &Varargs)?;
            count += 1;
        }
        if flags.contains(Flags::ANNOTATION) && !self.target.uses_annotation_flag() {
            write_attr(buf, pool, &Annotation)?;
            count += 1;
        }
        Ok(count)
    }

    fn write_member_attrs(
        &self,
        buf: &mut ByteBuffer,
        pool: &mut Pool,
        flags: Flags,
        signature: Option<&str>,
    ) -> Result<u16, Error> {
        let mut count = self.write_flag_attrs(buf, pool, flags)?;
        if let Some(signature) = signature {
            let signature = pool.put_utf8(signature)?;
            write_attr(buf, pool, &Signature(signature))?;
            count += 1;
        }
        Ok(count)
    }

    /// `EnclosingMethod` for local and anonymous classes
    fn write_enclosing_method(&self, buf: &mut ByteBuffer, pool: &mut Pool, class: ClassId) -> Result<u16, Error> {
        let data = self.graph.class(class);
        let (enclosing_class, method) = match data.owner {
            ClassOwner::Method(method) => (self.graph.method(method).owner, Some(method)),
            ClassOwner::Class(outer) if data.is_anonymous() => (outer, None),
            _ => return Ok(0),
        };
        let class = pool.put_class(self.graph, enclosing_class)?;
        let method = match method {
            Some(method) => {
                let name = &self.graph.method(method).name;
                let descriptor = self.graph.method_descriptor(method);
                Some(pool.put_name_and_type(name, &descriptor)?)
            }
            None => None,
        };
        write_attr(buf, pool, &EnclosingMethod { class, method })?;
        Ok(1)
    }

    fn write_inner_classes(&self, buf: &mut ByteBuffer, pool: &mut Pool) -> Result<(), Error> {
        let graph = self.graph;
        let mut entries = vec![];
        for inner in pool.inner_classes().to_vec() {
            let data = graph.class(inner);
            let mut flags = data.flags;
            if flags.is_interface() {
                flags |= Flags::ABSTRACT;
            }
            flags.remove(Flags::STRICTFP);
            let outer_class = match data.owner {
                ClassOwner::Class(outer) if !data.is_anonymous() => Some(pool.put_class(graph, outer)?),
                _ => None,
            };
            let inner_name = if data.is_anonymous() {
                None
            } else {
                Some(pool.put_utf8(data.simple_name.as_str())?)
            };
            entries.push(InnerClass {
                inner_class: pool.put_class(graph, inner)?,
                outer_class,
                inner_name,
                access_flags: InnerClassAccessFlags::from_bits_truncate(flags.adjusted(&self.target)),
            });
        }
        write_attr(buf, pool, &InnerClasses(entries))
    }
}

/// Write an attribute name and a placeholder length, returning where the payload starts
fn begin_attr(buf: &mut ByteBuffer, pool: &mut Pool, name: &str) -> Result<usize, Error> {
    pool.put_utf8(name)?.serialize(buf)?;
    buf.append_u4(0);
    Ok(buf.len())
}

/// Patch the length of the attribute whose payload started at `start`
fn end_attr(buf: &mut ByteBuffer, start: usize) {
    let length = buf.len() - start;
    buf.put_u4(start - 4, length as u32);
}

fn write_attr<A: AttributeLike>(buf: &mut ByteBuffer, pool: &mut Pool, attribute: &A) -> Result<(), Error> {
    let start = begin_attr(buf, pool, A::NAME)?;
    attribute.serialize(buf)?;
    end_attr(buf, start);
    Ok(())
}

/// Write a class file under `output_dir`, at the path its binary name dictates
///
/// A partially written file is removed again if writing fails.
pub fn write_class_file(output_dir: &Path, binary_name: &str, bytes: &[u8]) -> Result<PathBuf, Error> {
    let path = output_dir.join(format!("{}.class", binary_name));
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let written = fs::File::create(&path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.flush()
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&path);
        return Err(Error::IoError(err));
    }
    Ok(path)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attribute_length_is_back_patched() {
        let mut pool = Pool::new();
        let mut buf = ByteBuffer::new();
        let signature = pool.put_utf8("TT;").unwrap();
        write_attr(&mut buf, &mut pool, &Signature(signature)).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.get_i4(2), 2, "payload is one u2 index");
    }

    #[test]
    fn minimal_class_layout() {
        let mut graph = ClassGraph::new();
        let java = graph.insert_java_library_types();
        let class = graph.add_class(ClassSymbol::new("p/Empty", Flags::PUBLIC | Flags::STRICTFP, Some(java.object)));
        let writer = ClassWriter::new(&graph, Version::JAVA7, true);
        let mut pool = Pool::new();
        let bytes = writer.write_class(&ClassImage::new(class), &mut pool).unwrap();

        assert_eq!(&bytes[0..8], &[0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 51]);
        let count = u16::from_be_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!(count, pool.constants().next_index());
        // Trailing: flags, this, super, 0 interfaces, 0 fields, 0 methods, 0 attributes
        let tail = &bytes[bytes.len() - 14..];
        assert_eq!(&tail[0..2], &[0x00, 0x21], "ACC_PUBLIC | ACC_SUPER without strictfp");
        assert_eq!(&tail[6..], &[0; 8][..]);
    }

    #[test]
    fn failed_write_leaves_nothing_behind() {
        let dir = std::env::temp_dir().join(format!("classgen-writer-{}", std::process::id()));
        let path = write_class_file(&dir, "p/Ok", &[1, 2, 3]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);

        // A directory squatting on the output path makes the create fail
        fs::create_dir_all(dir.join("p/Blocked.class")).unwrap();
        assert!(write_class_file(&dir, "p/Blocked", &[1]).is_err());
        assert!(dir.join("p/Blocked.class").is_dir());
        fs::remove_dir_all(&dir).unwrap();
    }
}

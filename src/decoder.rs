//! The stream grammar: a recursive-descent parser over a one-byte
//! lookahead, coupled with the handle table and the descriptor arena.

use crate::class_desc::{validate_flags, validate_type_code, ClassDesc, FieldDesc};
use crate::constants::{
    tag_name, PROXY_CLASS_NAME, RMI_CALL, RMI_DGC_ACK, STREAM_MAGIC, STREAM_VERSION, TC_ARRAY,
    TC_BLOCKDATA, TC_BLOCKDATALONG, TC_CLASS, TC_CLASSDESC, TC_ENDBLOCKDATA, TC_ENUM,
    TC_EXCEPTION, TC_LONGSTRING, TC_NULL, TC_OBJECT, TC_PROXYCLASSDESC, TC_REFERENCE, TC_RESET,
    TC_STRING,
};
use crate::error::ObjectStreamError;
use crate::handles::HandleTable;
use crate::mutf8;
use crate::postproc::PostProcRegistry;
use crate::reader::StreamReader;
use crate::trace::TraceSink;
use crate::value::{put, FieldMap, JavaArray, JavaEnum, JavaObject, JavaValue};

/// Decoder configuration.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Upper bound for any length-prefixed read. Defaults to the input
    /// length, which is the loosest safe bound for a buffered input.
    pub max_data_block_size: Option<usize>,
    /// Container reshaping hooks, keyed `className@serialVersionUID`.
    pub post_procs: PostProcRegistry,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_data_block_size: None,
            post_procs: PostProcRegistry::with_builtins(),
        }
    }
}

/// The result of a successful parse.
///
/// `Class(index)` values in the tree index into `classes`; `Ref(wire)`
/// values resolve through `handles`.
#[derive(Debug, PartialEq)]
pub struct Decoded {
    /// Top-level content elements in stream order.
    pub contents: Vec<JavaValue>,
    /// The class descriptor arena.
    pub classes: Vec<ClassDesc>,
    /// Final state of the handle table.
    pub handles: HandleTable,
}

/// Parses a serialized object stream with default options.
pub fn parse(data: &[u8]) -> Result<Decoded, ObjectStreamError> {
    parse_with(data, DecodeOptions::default())
}

/// Parses a serialized object stream.
pub fn parse_with(data: &[u8], options: DecodeOptions) -> Result<Decoded, ObjectStreamError> {
    ObjectStreamDecoder::with_options(data, options).decode()
}

/// Single-pass decoder for one byte buffer.
///
/// Create one per parse; the decoder owns its handle table and
/// descriptor arena and must not be shared across threads.
pub struct ObjectStreamDecoder<'a> {
    reader: StreamReader<'a>,
    handles: HandleTable,
    classes: Vec<ClassDesc>,
    post_procs: PostProcRegistry,
    tracer: Option<&'a mut dyn TraceSink>,
}

impl<'a> ObjectStreamDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, DecodeOptions::default())
    }

    pub fn with_options(data: &'a [u8], options: DecodeOptions) -> Self {
        let reader = match options.max_data_block_size {
            Some(max) => StreamReader::with_max_block_size(data, max),
            None => StreamReader::new(data),
        };
        Self {
            reader,
            handles: HandleTable::new(),
            classes: Vec::new(),
            post_procs: options.post_procs,
            tracer: None,
        }
    }

    /// Attaches a parse-progress observer.
    pub fn with_tracer(mut self, tracer: &'a mut dyn TraceSink) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Runs the parse to completion or first error.
    pub fn decode(mut self) -> Result<Decoded, ObjectStreamError> {
        self.prelude()?;
        self.trace_enter("Contents");
        let mut contents = Vec::new();
        while self.reader.remaining() > 0 {
            if let Some(value) = self.content()? {
                contents.push(value);
            }
        }
        self.trace_leave();
        Ok(Decoded {
            contents,
            classes: self.classes,
            handles: self.handles,
        })
    }

    // ---------------------------------------------------------- prelude

    fn prelude(&mut self) -> Result<(), ObjectStreamError> {
        // The stream may begin with a single RMI transport packet byte.
        if let Ok(lead) = self.reader.peek() {
            if (RMI_CALL..=RMI_DGC_ACK).contains(&lead) {
                self.reader.u8()?;
                self.trace_line(|| format!("RMI packet type - 0x{lead:02x}"));
            }
        }
        let magic = self.reader.u16()?;
        if magic != STREAM_MAGIC {
            return Err(ObjectStreamError::BadMagic(magic));
        }
        self.trace_line(|| format!("STREAM_MAGIC - 0x{magic:04x}"));
        let version = self.reader.u16()?;
        if version != STREAM_VERSION {
            return Err(ObjectStreamError::BadVersion(version));
        }
        self.trace_line(|| format!("STREAM_VERSION - {version}"));
        Ok(())
    }

    // ---------------------------------------------------------- dispatch

    /// Parses one content element. `TC_RESET` yields no element.
    fn content(&mut self) -> Result<Option<JavaValue>, ObjectStreamError> {
        let tag = self.reader.peek()?;
        match tag {
            TC_NULL => {
                self.reader.u8()?;
                self.trace_tag(TC_NULL);
                Ok(Some(JavaValue::Null))
            }
            TC_REFERENCE => self.reference().map(|(_, value)| Some(value)),
            TC_CLASSDESC | TC_PROXYCLASSDESC => {
                let index = self.new_class_desc()?;
                Ok(Some(JavaValue::Class(index)))
            }
            TC_OBJECT => self.object().map(Some),
            TC_STRING | TC_LONGSTRING => self.new_string().map(|s| Some(JavaValue::Str(s))),
            TC_ARRAY => self.array().map(Some),
            TC_CLASS => self.class_value().map(Some),
            TC_BLOCKDATA => self.block_data().map(Some),
            TC_ENDBLOCKDATA => {
                self.reader.u8()?;
                self.trace_tag(TC_ENDBLOCKDATA);
                Ok(Some(JavaValue::EndBlock))
            }
            TC_RESET => {
                self.reader.u8()?;
                self.trace_tag(TC_RESET);
                self.handles.reset();
                Ok(None)
            }
            TC_BLOCKDATALONG => self.long_block_data().map(Some),
            TC_EXCEPTION => self.exception().map(Some),
            TC_ENUM => self.enum_value().map(Some),
            other => Err(ObjectStreamError::BadTag(other)),
        }
    }

    // ---------------------------------------------------------- strings

    /// Reads a 2-byte-length modified-UTF-8 string.
    fn utf(&mut self) -> Result<String, ObjectStreamError> {
        let n = self.reader.u16()? as usize;
        self.utf_payload(n)
    }

    fn utf_payload(&mut self, n: usize) -> Result<String, ObjectStreamError> {
        if n > self.reader.max_data_block_size() {
            return Err(ObjectStreamError::BlockTooLarge {
                size: n,
                limit: self.reader.max_data_block_size(),
            });
        }
        if n > self.reader.remaining() {
            return Err(ObjectStreamError::BadUtf);
        }
        Ok(mutf8::decode(self.reader.take(n)?))
    }

    /// Reads a `TC_STRING` or `TC_LONGSTRING` element and registers its
    /// handle. The caller has already peeked one of the two tags.
    fn new_string(&mut self) -> Result<String, ObjectStreamError> {
        let tag = self.reader.u8()?;
        self.trace_tag(tag);
        let n = if tag == TC_STRING {
            self.reader.u16()? as usize
        } else {
            let n = self.reader.u64()?;
            if n > self.reader.max_data_block_size() as u64 {
                return Err(ObjectStreamError::BlockTooLarge {
                    size: n as usize,
                    limit: self.reader.max_data_block_size(),
                });
            }
            n as usize
        };
        let value = self.utf_payload(n)?;
        let handle = self.handles.assign(JavaValue::Str(value.clone()));
        self.trace_line(|| format!("newHandle 0x{handle:08x}"));
        self.trace_line(|| format!("value - {value}"));
        Ok(value)
    }

    /// Reads a content element constrained to string-producing tags:
    /// `TC_STRING`, `TC_LONGSTRING`, or a back-reference to a string.
    fn string_like(&mut self) -> Result<String, ObjectStreamError> {
        match self.reader.peek()? {
            TC_STRING | TC_LONGSTRING => self.new_string(),
            TC_REFERENCE => {
                let (wire, value) = self.reference()?;
                match value {
                    JavaValue::Str(s) => Ok(s),
                    _ => Err(ObjectStreamError::BadReference(wire)),
                }
            }
            other => Err(ObjectStreamError::BadTag(other)),
        }
    }

    // ---------------------------------------------------------- references

    fn reference(&mut self) -> Result<(u32, JavaValue), ObjectStreamError> {
        self.reader.u8()?;
        let wire = self.reader.u32()?;
        self.trace_line(|| format!("TC_REFERENCE - handle 0x{wire:08x}"));
        let value = self.handles.resolve(wire)?;
        Ok((wire, value))
    }

    // ---------------------------------------------------------- class descriptors

    /// Parses a `classDesc` position: a new descriptor, a null, or a
    /// back-reference to a prior descriptor.
    fn class_desc(&mut self) -> Result<Option<usize>, ObjectStreamError> {
        match self.reader.peek()? {
            TC_CLASSDESC | TC_PROXYCLASSDESC => Ok(Some(self.new_class_desc()?)),
            TC_NULL => {
                self.reader.u8()?;
                self.trace_tag(TC_NULL);
                Ok(None)
            }
            TC_REFERENCE => {
                let (wire, value) = self.reference()?;
                match value {
                    JavaValue::Class(index) => Ok(Some(index)),
                    _ => Err(ObjectStreamError::BadReference(wire)),
                }
            }
            other => Err(ObjectStreamError::BadTag(other)),
        }
    }

    fn new_class_desc(&mut self) -> Result<usize, ObjectStreamError> {
        match self.reader.peek()? {
            TC_CLASSDESC => self.read_class_desc(),
            TC_PROXYCLASSDESC => self.read_proxy_class_desc(),
            other => Err(ObjectStreamError::BadTag(other)),
        }
    }

    fn read_class_desc(&mut self) -> Result<usize, ObjectStreamError> {
        self.reader.u8()?;
        self.trace_enter("TC_CLASSDESC - 0x72");
        let name = self.utf()?;
        self.trace_line(|| format!("className - {name}"));
        let uid = hex(self.reader.take(8)?);
        self.trace_line(|| format!("serialVersionUID - 0x{uid}"));

        // The descriptor's handle precedes its body, so the body (and in
        // particular the super chain) may refer back to it.
        let index = self.classes.len();
        self.classes.push(ClassDesc::placeholder(name, uid, 0));
        let handle = self.handles.assign(JavaValue::Class(index));
        self.classes[index].handle = handle;
        self.trace_line(|| format!("newHandle 0x{handle:08x}"));

        let flags = self.reader.u8()?;
        validate_flags(flags)?;
        self.trace_line(|| format!("classDescFlags - 0x{flags:02x}"));

        let field_count = self.reader.u16()?;
        self.trace_line(|| format!("fieldCount - {field_count}"));
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            fields.push(self.field_desc()?);
        }

        self.trace_enter("classAnnotations");
        let annotations = self.annotation_list()?;
        self.trace_leave();
        self.trace_enter("superClassDesc");
        let super_class = self.class_desc()?;
        self.trace_leave();

        let desc = &mut self.classes[index];
        desc.flags = flags;
        desc.fields = fields;
        desc.annotations = annotations;
        desc.super_class = super_class;
        self.trace_leave();
        Ok(index)
    }

    fn read_proxy_class_desc(&mut self) -> Result<usize, ObjectStreamError> {
        self.reader.u8()?;
        self.trace_enter("TC_PROXYCLASSDESC - 0x7d");
        let index = self.classes.len();
        self.classes.push(ClassDesc::placeholder(
            PROXY_CLASS_NAME.to_owned(),
            String::new(),
            0,
        ));
        let handle = self.handles.assign(JavaValue::Class(index));
        self.classes[index].handle = handle;
        self.trace_line(|| format!("newHandle 0x{handle:08x}"));

        let count = self.reader.u32()?;
        self.trace_line(|| format!("interface count - {count}"));
        let mut interfaces = Vec::new();
        for _ in 0..count {
            let interface = self.utf()?;
            self.trace_line(|| format!("proxyInterfaceName - {interface}"));
            interfaces.push(interface);
        }

        self.trace_enter("classAnnotations");
        let annotations = self.annotation_list()?;
        self.trace_leave();
        self.trace_enter("superClassDesc");
        let super_class = self.class_desc()?;
        self.trace_leave();

        let desc = &mut self.classes[index];
        desc.proxy_interfaces = interfaces;
        desc.annotations = annotations;
        desc.super_class = super_class;
        self.trace_leave();
        Ok(index)
    }

    fn field_desc(&mut self) -> Result<FieldDesc, ObjectStreamError> {
        let type_code = self.reader.u8()?;
        validate_type_code(type_code)?;
        let name = self.utf()?;
        self.trace_line(|| format!("field {} - {name}", type_code as char));
        let class_name = if type_code == b'L' || type_code == b'[' {
            Some(self.string_like()?)
        } else {
            None
        };
        Ok(FieldDesc {
            type_code,
            name,
            class_name,
        })
    }

    /// Reads content elements up to and including `TC_ENDBLOCKDATA`.
    fn annotation_list(&mut self) -> Result<Vec<JavaValue>, ObjectStreamError> {
        let mut annotations = Vec::new();
        loop {
            match self.content()? {
                Some(JavaValue::EndBlock) => break,
                Some(value) => annotations.push(value),
                None => continue,
            }
        }
        Ok(annotations)
    }

    // ---------------------------------------------------------- objects

    fn object(&mut self) -> Result<JavaValue, ObjectStreamError> {
        self.reader.u8()?;
        self.trace_enter("TC_OBJECT - 0x73");
        let class = self
            .class_desc()?
            .ok_or(ObjectStreamError::MissingClassDesc)?;
        let deferred = self.handles.reserve();
        {
            let wire = deferred.wire_handle();
            self.trace_line(|| format!("newHandle 0x{wire:08x}"));
        }

        // Class data is written for the top-most super class first.
        let chain = self.class_chain(class);
        let mut fields: FieldMap = Vec::new();
        let mut extends: Vec<(String, FieldMap)> = Vec::new();
        for &link in chain.iter().rev() {
            let name = self.classes[link].name.clone();
            self.trace_enter(&format!("classdata {name}"));
            let data = self.class_data(link)?;
            self.trace_leave();
            for (key, value) in &data {
                put(&mut fields, key, value.clone());
            }
            extends.push((name, data));
        }

        let value = JavaValue::Object(Box::new(JavaObject {
            class,
            fields,
            extends,
        }));
        self.handles.fulfill(deferred, value.clone());
        self.trace_leave();
        Ok(value)
    }

    /// The descriptor chain from the given node upward, most derived
    /// first. Guards against descriptor loops introduced by malicious
    /// self-referential super links.
    fn class_chain(&self, start: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut cursor = Some(start);
        while let Some(index) = cursor {
            if chain.contains(&index) {
                break;
            }
            chain.push(index);
            cursor = self.classes[index].super_class;
        }
        chain
    }

    /// Reads one class's portion of an object's data, according to the
    /// class's flags, and applies any registered reshaping hook.
    fn class_data(&mut self, index: usize) -> Result<FieldMap, ObjectStreamError> {
        let (flags_serializable, flags_externalizable, write_method, block_data, field_descs) = {
            let desc = &self.classes[index];
            (
                desc.is_serializable(),
                desc.is_externalizable(),
                desc.has_write_method(),
                desc.has_block_data(),
                desc.fields.clone(),
            )
        };

        if flags_serializable {
            let mut data = self.values(&field_descs)?;
            if write_method {
                self.trace_enter("objectAnnotation");
                let annotations = self.annotation_list()?;
                self.trace_leave();
                put(&mut data, "@", JavaValue::List(annotations.clone()));
                let key = self.classes[index].post_proc_key();
                if let Some(reshape) = self.post_procs.get(&key) {
                    data = reshape(&self.handles, data, &annotations)?;
                }
            }
            return Ok(data);
        }

        if flags_externalizable {
            if !block_data {
                return Err(ObjectStreamError::Protocol1External);
            }
            self.trace_enter("objectAnnotation");
            let annotations = self.annotation_list()?;
            self.trace_leave();
            let mut data = FieldMap::new();
            put(&mut data, "@", JavaValue::List(annotations));
            return Ok(data);
        }

        // Flags byte of zero: no instance data. Dynamic proxy
        // descriptors land here.
        Ok(FieldMap::new())
    }

    /// Reads one value per declared field, in declaration order.
    fn values(&mut self, field_descs: &[FieldDesc]) -> Result<FieldMap, ObjectStreamError> {
        let mut data = FieldMap::new();
        for field in field_descs {
            self.trace_line(|| format!("value {}", field.name));
            let value = self.field_value(field.type_code)?;
            put(&mut data, &field.name, value);
        }
        Ok(data)
    }

    fn field_value(&mut self, type_code: u8) -> Result<JavaValue, ObjectStreamError> {
        match type_code {
            b'B' => Ok(JavaValue::Byte(self.reader.i8()?)),
            b'C' => Ok(JavaValue::Char(self.reader.u16()?)),
            b'D' => Ok(JavaValue::Double(self.reader.f64()?)),
            b'F' => Ok(JavaValue::Float(self.reader.f32()?)),
            b'I' => Ok(JavaValue::Int(self.reader.i32()?)),
            b'J' => Ok(JavaValue::Long(self.reader.i64()?)),
            b'S' => Ok(JavaValue::Short(self.reader.i16()?)),
            b'Z' => Ok(JavaValue::Bool(self.reader.u8()? != 0)),
            b'L' | b'[' => Ok(self.content()?.unwrap_or(JavaValue::Null)),
            other => Err(ObjectStreamError::BadTypeCode(other)),
        }
    }

    // ---------------------------------------------------------- arrays

    fn array(&mut self) -> Result<JavaValue, ObjectStreamError> {
        self.reader.u8()?;
        self.trace_enter("TC_ARRAY - 0x75");
        let class = self
            .class_desc()?
            .ok_or(ObjectStreamError::MissingClassDesc)?;
        {
            let desc = &self.classes[class];
            if desc.super_class.is_some() {
                return Err(ObjectStreamError::BadArrayClass(
                    "descriptor chain has more than one class".to_owned(),
                ));
            }
            if !desc.name.starts_with('[') {
                return Err(ObjectStreamError::BadArrayClass(format!(
                    "class name `{}` does not begin with '['",
                    desc.name
                )));
            }
        }
        let element_code = *self.classes[class]
            .name
            .as_bytes()
            .get(1)
            .ok_or_else(|| {
                ObjectStreamError::BadArrayClass("class name missing element type".to_owned())
            })?;
        validate_type_code(element_code)?;

        let deferred = self.handles.reserve();
        {
            let wire = deferred.wire_handle();
            self.trace_line(|| format!("newHandle 0x{wire:08x}"));
        }
        let declared = self.reader.i32()?;
        let length =
            usize::try_from(declared).map_err(|_| ObjectStreamError::BadArrayLength(declared))?;
        self.trace_line(|| format!("array length - {length}"));

        // Each element consumes at least one byte, so the remaining
        // input bounds any honest length claim.
        let mut elements = Vec::with_capacity(length.min(self.reader.remaining()));
        for _ in 0..length {
            elements.push(self.field_value(element_code)?);
        }
        let value = JavaValue::Array(Box::new(JavaArray { class, elements }));
        self.handles.fulfill(deferred, value.clone());
        self.trace_leave();
        Ok(value)
    }

    // ---------------------------------------------------------- enums

    fn enum_value(&mut self) -> Result<JavaValue, ObjectStreamError> {
        self.reader.u8()?;
        self.trace_enter("TC_ENUM - 0x7e");
        let class = self
            .class_desc()?
            .ok_or(ObjectStreamError::MissingClassDesc)?;
        if !self.classes[class].is_enum() {
            let name = self.classes[class].name.clone();
            self.trace_line(|| format!("warning: enum class {name} lacks SC_ENUM"));
        }
        let deferred = self.handles.reserve();
        {
            let wire = deferred.wire_handle();
            self.trace_line(|| format!("newHandle 0x{wire:08x}"));
        }
        let constant = self.string_like()?;
        let value = JavaValue::Enum(JavaEnum { class, constant });
        self.handles.fulfill(deferred, value.clone());
        self.trace_leave();
        Ok(value)
    }

    // ---------------------------------------------------------- misc elements

    fn class_value(&mut self) -> Result<JavaValue, ObjectStreamError> {
        self.reader.u8()?;
        self.trace_enter("TC_CLASS - 0x76");
        let class = self
            .class_desc()?
            .ok_or(ObjectStreamError::MissingClassDesc)?;
        let value = JavaValue::Class(class);
        let handle = self.handles.assign(value.clone());
        self.trace_line(|| format!("newHandle 0x{handle:08x}"));
        self.trace_leave();
        Ok(value)
    }

    fn block_data(&mut self) -> Result<JavaValue, ObjectStreamError> {
        self.reader.u8()?;
        let n = self.reader.u8()? as usize;
        self.trace_line(|| format!("TC_BLOCKDATA - {n} bytes"));
        let bytes = self.reader.block(n)?;
        Ok(JavaValue::Bytes(bytes.to_vec()))
    }

    fn long_block_data(&mut self) -> Result<JavaValue, ObjectStreamError> {
        self.reader.u8()?;
        let n = self.reader.u32()? as usize;
        self.trace_line(|| format!("TC_BLOCKDATALONG - {n} bytes"));
        let bytes = self.reader.block(n)?;
        Ok(JavaValue::Bytes(bytes.to_vec()))
    }

    /// `TC_EXCEPTION` resets the handle table, carries the throwable as
    /// a regular content element, then resets again.
    fn exception(&mut self) -> Result<JavaValue, ObjectStreamError> {
        self.reader.u8()?;
        self.trace_tag(TC_EXCEPTION);
        self.handles.reset();
        let throwable = self.content()?.unwrap_or(JavaValue::Null);
        self.handles.reset();
        Ok(throwable)
    }

    // ---------------------------------------------------------- tracing

    fn trace_line(&mut self, text: impl FnOnce() -> String) {
        if let Some(tracer) = self.tracer.as_deref_mut() {
            tracer.line(&text());
        }
    }

    fn trace_tag(&mut self, tag: u8) {
        if let Some(tracer) = self.tracer.as_deref_mut() {
            tracer.line(&format!("{} - 0x{tag:02x}", tag_name(tag)));
        }
    }

    fn trace_enter(&mut self, label: &str) {
        if let Some(tracer) = self.tracer.as_deref_mut() {
            tracer.enter(label);
        }
    }

    fn trace_leave(&mut self) {
        if let Some(tracer) = self.tracer.as_deref_mut() {
            tracer.leave();
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

//! Class descriptor model.

use crate::constants::{
    PROXY_CLASS_NAME, SC_BLOCK_DATA, SC_ENUM, SC_EXTERNALIZABLE, SC_SERIALIZABLE, SC_WRITE_METHOD,
    TYPE_CODES,
};
use crate::error::ObjectStreamError;
use crate::value::JavaValue;

/// A single field declaration inside a class descriptor.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FieldDesc {
    /// One of `B C D F I J S Z L [`.
    pub type_code: u8,
    pub name: String,
    /// Type signature string, present for `L` and `[` fields.
    pub class_name: Option<String>,
}

impl FieldDesc {
    /// True for `L` and `[` fields, whose values are content elements.
    pub fn is_object(&self) -> bool {
        self.type_code == b'L' || self.type_code == b'['
    }
}

/// A parsed class descriptor.
///
/// Descriptors live in an append-only arena owned by the decoder; the
/// super-class link is an index into that arena so descriptor chains
/// shared through back-references are stored once.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClassDesc {
    pub name: String,
    /// The eight serialVersionUID bytes, kept opaque as lowercase hex.
    pub serial_version_uid: String,
    /// Wire handle assigned to this descriptor.
    pub handle: u32,
    pub flags: u8,
    pub fields: Vec<FieldDesc>,
    /// Class annotation elements, up to the terminating end-block.
    pub annotations: Vec<JavaValue>,
    /// Interface names, for dynamic proxy descriptors only.
    pub proxy_interfaces: Vec<String>,
    /// Arena index of the super class descriptor, if any.
    pub super_class: Option<usize>,
}

impl ClassDesc {
    pub(crate) fn placeholder(name: String, serial_version_uid: String, handle: u32) -> Self {
        Self {
            name,
            serial_version_uid,
            handle,
            flags: 0,
            fields: Vec::new(),
            annotations: Vec::new(),
            proxy_interfaces: Vec::new(),
            super_class: None,
        }
    }

    pub fn is_serializable(&self) -> bool {
        self.flags & SC_SERIALIZABLE != 0
    }

    pub fn is_externalizable(&self) -> bool {
        self.flags & SC_EXTERNALIZABLE != 0
    }

    pub fn has_write_method(&self) -> bool {
        self.flags & SC_WRITE_METHOD != 0
    }

    pub fn has_block_data(&self) -> bool {
        self.flags & SC_BLOCK_DATA != 0
    }

    pub fn is_enum(&self) -> bool {
        self.flags & SC_ENUM != 0
    }

    pub fn is_proxy(&self) -> bool {
        self.name == PROXY_CLASS_NAME
    }

    /// The `className@serialVersionUID` key used by the post-processing
    /// registry.
    pub fn post_proc_key(&self) -> String {
        format!("{}@{}", self.name, self.serial_version_uid)
    }
}

/// Validates a classDescFlags byte.
///
/// `SC_SERIALIZABLE` and `SC_EXTERNALIZABLE` are mutually exclusive,
/// serializable classes never carry `SC_BLOCK_DATA`, externalizable
/// classes never carry `SC_WRITE_METHOD`, and when neither is set the
/// whole byte must be zero.
pub fn validate_flags(flags: u8) -> Result<(), ObjectStreamError> {
    if flags & SC_SERIALIZABLE != 0 {
        if flags & SC_EXTERNALIZABLE != 0 || flags & SC_BLOCK_DATA != 0 {
            return Err(ObjectStreamError::BadClassDescFlags(flags));
        }
    } else if flags & SC_EXTERNALIZABLE != 0 {
        if flags & SC_WRITE_METHOD != 0 {
            return Err(ObjectStreamError::BadClassDescFlags(flags));
        }
    } else if flags != 0 {
        return Err(ObjectStreamError::BadClassDescFlags(flags));
    }
    Ok(())
}

/// Validates a field or array-element type code.
pub fn validate_type_code(code: u8) -> Result<(), ObjectStreamError> {
    if TYPE_CODES.contains(&code) {
        Ok(())
    } else {
        Err(ObjectStreamError::BadTypeCode(code))
    }
}

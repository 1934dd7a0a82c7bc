//! Decoder for the Java Object Serialization Stream protocol.
//!
//! Parses the binary wire format written by `ObjectOutputStream`
//! (stream version 5, magic `0xACED`) into a language-neutral value
//! tree for inspecting serialized payloads, e.g. deserialization
//! exploit artifacts. The decoder never executes `readObject` logic;
//! custom-written data is surfaced as opaque annotation elements,
//! optionally reshaped for well-known `java.util` containers.
//!
//! ```
//! let data = [0xac, 0xed, 0x00, 0x05, 0x74, 0x00, 0x05, b'H', b'e', b'l', b'l', b'o'];
//! let decoded = javaobj::parse(&data).unwrap();
//! assert_eq!(
//!     decoded.contents,
//!     vec![javaobj::JavaValue::Str("Hello".to_owned())]
//! );
//! ```

pub mod class_desc;
pub mod constants;
pub mod decoder;
pub mod error;
pub mod handles;
pub mod minimal;
pub mod mutf8;
pub mod postproc;
pub mod reader;
pub mod trace;
pub mod value;

pub use class_desc::{ClassDesc, FieldDesc};
pub use decoder::{parse, parse_with, DecodeOptions, Decoded, ObjectStreamDecoder};
pub use error::ObjectStreamError;
pub use handles::{DeferredHandle, HandleTable};
pub use minimal::{minimal, parse_minimal, parse_minimal_with};
pub use postproc::{PostProc, PostProcRegistry};
pub use trace::{IndentTrace, TraceSink};
pub use value::{FieldMap, JavaArray, JavaEnum, JavaObject, JavaValue};

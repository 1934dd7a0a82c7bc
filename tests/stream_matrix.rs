use javaobj::{
    parse, parse_minimal, parse_with, DecodeOptions, JavaValue, ObjectStreamError,
};
use serde_json::json;

fn stream(body: &[u8]) -> Vec<u8> {
    let mut out = vec![0xac, 0xed, 0x00, 0x05];
    out.extend_from_slice(body);
    out
}

fn utf(s: &str) -> Vec<u8> {
    let mut out = (s.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(s.as_bytes());
    out
}

fn utf_string(s: &str) -> Vec<u8> {
    let mut out = vec![0x74];
    out.extend(utf(s));
    out
}

/// A `TC_CLASSDESC` with primitive-only fields, no annotations, and a
/// null super class.
fn plain_class_desc(name: &str, uid: u64, flags: u8, fields: &[(u8, &str)]) -> Vec<u8> {
    let mut out = vec![0x72];
    out.extend(utf(name));
    out.extend_from_slice(&uid.to_be_bytes());
    out.push(flags);
    out.extend_from_slice(&(fields.len() as u16).to_be_bytes());
    for (code, field_name) in fields {
        out.push(*code);
        out.extend(utf(field_name));
    }
    out.push(0x78); // end of class annotations
    out.push(0x70); // null super class
    out
}

fn object_fields(value: &JavaValue) -> &javaobj::FieldMap {
    match value {
        JavaValue::Object(object) => &object.fields,
        other => panic!("expected object, got {other:?}"),
    }
}

#[test]
fn prelude_matrix() {
    // Empty stream after the prelude decodes to no contents.
    let decoded = parse(&stream(&[])).unwrap();
    assert!(decoded.contents.is_empty());

    // Magic and version are validated up front.
    assert_eq!(
        parse(&[0xde, 0xad, 0x00, 0x05]),
        Err(ObjectStreamError::BadMagic(0xdead))
    );
    assert_eq!(
        parse(&[0xac, 0xed, 0x00, 0x04, 0x70]),
        Err(ObjectStreamError::BadVersion(4))
    );
    // The version check covers the full u16, not just the low byte.
    assert_eq!(
        parse(&[0xac, 0xed, 0x01, 0x05, 0x70]),
        Err(ObjectStreamError::BadVersion(0x0105))
    );

    // Any single RMI packet byte before the magic is skipped, and the
    // framed stream decodes identically to the plain one.
    let plain = stream(&[0x74, 0x00, 0x01, b'A']);
    let expected = parse(&plain).unwrap();
    for prefix in 0x50u8..=0x54 {
        let mut framed = vec![prefix];
        framed.extend_from_slice(&plain);
        let decoded = parse(&framed).unwrap();
        assert_eq!(decoded.contents, expected.contents, "prefix 0x{prefix:02x}");
    }

    // A lead byte outside the RMI range is not consumed; it
    // participates in the magic check and fails it.
    assert_eq!(
        parse(&[0x42, 0xac, 0xed, 0x00, 0x05]),
        Err(ObjectStreamError::BadMagic(0x42ac))
    );

    // Truncated preludes surface as EOF.
    assert_eq!(parse(&[0xac]), Err(ObjectStreamError::UnexpectedEof));
    assert_eq!(
        parse(&[0xac, 0xed, 0x00]),
        Err(ObjectStreamError::UnexpectedEof)
    );
}

#[test]
fn scalar_matrix() {
    // Null.
    let decoded = parse(&stream(&[0x70])).unwrap();
    assert_eq!(decoded.contents, vec![JavaValue::Null]);

    // A string binds the first handle, 0x7e0000.
    let decoded = parse(&stream(b"\x74\x00\x05Hello")).unwrap();
    assert_eq!(decoded.contents, vec![JavaValue::Str("Hello".into())]);
    assert_eq!(decoded.handles.len(), 1);
    assert_eq!(
        decoded.handles.get(0x7e0000),
        Some(&JavaValue::Str("Hello".into()))
    );

    // Long string: u64 length prefix.
    let mut body = vec![0x7c];
    body.extend_from_slice(&3u64.to_be_bytes());
    body.extend_from_slice(b"abc");
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(decoded.contents, vec![JavaValue::Str("abc".into())]);
    assert_eq!(decoded.handles.len(), 1);

    // Modified UTF-8: C0 80 is an embedded NUL.
    let decoded = parse(&stream(&[0x74, 0x00, 0x03, b'a', 0xc0, 0x80])).unwrap();
    assert_eq!(decoded.contents, vec![JavaValue::Str("a\0".into())]);

    // A declared string length past the end of input.
    assert_eq!(
        parse(&stream(b"\x74\x00\x05ab")),
        Err(ObjectStreamError::BadUtf)
    );

    // Block data, short and long form; no handle is assigned.
    let decoded = parse(&stream(&[0x77, 0x02, 0xde, 0xad])).unwrap();
    assert_eq!(decoded.contents, vec![JavaValue::Bytes(vec![0xde, 0xad])]);
    assert!(decoded.handles.is_empty());

    let mut body = vec![0x7a];
    body.extend_from_slice(&3u32.to_be_bytes());
    body.extend_from_slice(&[1, 2, 3]);
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(decoded.contents, vec![JavaValue::Bytes(vec![1, 2, 3])]);

    // A long block whose declared size exceeds the configured limit.
    let mut body = vec![0x7a];
    body.extend_from_slice(&32u32.to_be_bytes());
    body.extend_from_slice(&[0u8; 32]);
    let options = DecodeOptions {
        max_data_block_size: Some(16),
        ..DecodeOptions::default()
    };
    assert_eq!(
        parse_with(&stream(&body), options),
        Err(ObjectStreamError::BlockTooLarge { size: 32, limit: 16 })
    );

    // Unknown tags are fatal.
    assert_eq!(parse(&stream(&[0x7f])), Err(ObjectStreamError::BadTag(0x7f)));
    assert_eq!(parse(&stream(&[0x00])), Err(ObjectStreamError::BadTag(0x00)));
}

#[test]
fn reference_and_reset_matrix() {
    // A back-reference resolves to the registered value; no new handle.
    let decoded = parse(&stream(b"\x74\x00\x01A\x71\x00\x7e\x00\x00")).unwrap();
    assert_eq!(
        decoded.contents,
        vec![JavaValue::Str("A".into()), JavaValue::Str("A".into())]
    );
    assert_eq!(decoded.handles.len(), 1);

    // Out-of-range and below-base handles are rejected.
    assert_eq!(
        parse(&stream(b"\x71\x00\x7e\x00\x05")),
        Err(ObjectStreamError::BadReference(0x7e0005))
    );
    assert_eq!(
        parse(&stream(b"\x71\x00\x00\x00\x01")),
        Err(ObjectStreamError::BadReference(1))
    );

    // TC_RESET empties the table: the later reference resolves against
    // the post-reset numbering.
    let decoded =
        parse(&stream(b"\x74\x00\x01A\x79\x74\x00\x01B\x71\x00\x7e\x00\x00")).unwrap();
    assert_eq!(
        decoded.contents,
        vec![
            JavaValue::Str("A".into()),
            JavaValue::Str("B".into()),
            JavaValue::Str("B".into()),
        ]
    );
    assert_eq!(decoded.handles.len(), 1);
    assert_eq!(decoded.handles.get(0x7e0000), Some(&JavaValue::Str("B".into())));

    // TC_EXCEPTION resets around the throwable and surfaces it.
    let mut body = utf_string("A");
    body.push(0x7b);
    body.extend(utf_string("E"));
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(
        decoded.contents,
        vec![JavaValue::Str("A".into()), JavaValue::Str("E".into())]
    );
    assert!(decoded.handles.is_empty());
}

#[test]
fn class_desc_matrix() {
    // A descriptor as a top-level content element.
    let body = plain_class_desc("A", 0x2a, 0x02, &[(b'I', "x")]);
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(decoded.contents, vec![JavaValue::Class(0)]);
    let desc = &decoded.classes[0];
    assert_eq!(desc.name, "A");
    assert_eq!(desc.serial_version_uid, "000000000000002a");
    assert_eq!(desc.handle, 0x7e0000);
    assert_eq!(desc.fields.len(), 1);
    assert_eq!(desc.fields[0].name, "x");
    assert_eq!(desc.fields[0].type_code, b'I');
    assert!(desc.super_class.is_none());

    // Every illegal flag combination is fatal.
    for flags in [0x06u8, 0x0a, 0x05, 0x10, 0x01] {
        let body = plain_class_desc("A", 1, flags, &[]);
        assert_eq!(
            parse(&stream(&body)),
            Err(ObjectStreamError::BadClassDescFlags(flags)),
            "flags 0x{flags:02x}"
        );
    }

    // Unknown field type codes are fatal.
    let body = plain_class_desc("A", 1, 0x02, &[(b'Q', "x")]);
    assert_eq!(
        parse(&stream(&body)),
        Err(ObjectStreamError::BadTypeCode(b'Q'))
    );

    // An object-typed field carries a type signature string, which
    // takes a handle of its own.
    let mut body = vec![0x72];
    body.extend(utf("A"));
    body.extend_from_slice(&1u64.to_be_bytes());
    body.push(0x02);
    body.extend_from_slice(&1u16.to_be_bytes());
    body.push(b'L');
    body.extend(utf("s"));
    body.extend(utf_string("Ljava/lang/String;"));
    body.extend_from_slice(&[0x78, 0x70]);
    let decoded = parse(&stream(&body)).unwrap();
    let field = &decoded.classes[0].fields[0];
    assert_eq!(field.class_name.as_deref(), Some("Ljava/lang/String;"));
    assert_eq!(decoded.handles.len(), 2);

    // Dynamic proxy descriptors: synthetic name, interfaces, no fields.
    let mut body = vec![0x7d];
    body.extend_from_slice(&1u32.to_be_bytes());
    body.extend(utf("java.lang.Comparable"));
    body.extend_from_slice(&[0x78, 0x70]);
    let decoded = parse(&stream(&body)).unwrap();
    let desc = &decoded.classes[0];
    assert!(desc.is_proxy());
    assert_eq!(desc.proxy_interfaces, vec!["java.lang.Comparable".to_owned()]);
    assert!(desc.fields.is_empty());
    assert_eq!(desc.flags, 0);

    // TC_CLASS wraps a descriptor and takes a handle of its own.
    let mut body = vec![0x76];
    body.extend(plain_class_desc("A", 1, 0x02, &[]));
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(decoded.contents, vec![JavaValue::Class(0)]);
    assert_eq!(decoded.handles.len(), 2);
}

#[test]
fn object_matrix() {
    // Primitive fields, read in declaration order.
    let mut body = vec![0x73];
    body.extend(plain_class_desc("A", 0x2a, 0x02, &[(b'I', "x"), (b'Z', "b")]));
    body.extend_from_slice(&42i32.to_be_bytes());
    body.push(0x01);
    let decoded = parse(&stream(&body)).unwrap();
    match &decoded.contents[0] {
        JavaValue::Object(object) => {
            assert_eq!(object.class, 0);
            assert_eq!(
                object.fields,
                vec![
                    ("x".to_owned(), JavaValue::Int(42)),
                    ("b".to_owned(), JavaValue::Bool(true)),
                ]
            );
            assert_eq!(object.extends.len(), 1);
            assert_eq!(object.extends[0].0, "A");
        }
        other => panic!("expected object, got {other:?}"),
    }
    // Handles: class descriptor, then the object itself.
    assert_eq!(decoded.handles.len(), 2);

    // The full primitive grid in one object.
    let grid: &[(u8, &str)] = &[
        (b'B', "b"),
        (b'C', "c"),
        (b'D', "d"),
        (b'F', "f"),
        (b'I', "i"),
        (b'J', "j"),
        (b'S', "s"),
        (b'Z', "z"),
    ];
    let mut body = vec![0x73];
    body.extend(plain_class_desc("P", 4, 0x02, grid));
    body.push(0x80); // B: -128
    body.extend_from_slice(&0x0041u16.to_be_bytes()); // C: 'A'
    body.extend_from_slice(&1.5f64.to_be_bytes()); // D
    body.extend_from_slice(&0.5f32.to_be_bytes()); // F
    body.extend_from_slice(&(-7i32).to_be_bytes()); // I
    body.extend_from_slice(&(1i64 << 40).to_be_bytes()); // J
    body.extend_from_slice(&(-2i16).to_be_bytes()); // S
    body.push(0x02); // Z: any non-zero byte is true
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(
        object_fields(&decoded.contents[0]),
        &vec![
            ("b".to_owned(), JavaValue::Byte(-128)),
            ("c".to_owned(), JavaValue::Char(0x41)),
            ("d".to_owned(), JavaValue::Double(1.5)),
            ("f".to_owned(), JavaValue::Float(0.5)),
            ("i".to_owned(), JavaValue::Int(-7)),
            ("j".to_owned(), JavaValue::Long(1 << 40)),
            ("s".to_owned(), JavaValue::Short(-2)),
            ("z".to_owned(), JavaValue::Bool(true)),
        ]
    );

    // Super chains read top-most class first; the most derived class
    // wins the flattened slot on a name collision.
    let mut body = vec![0x73, 0x72];
    body.extend(utf("B"));
    body.extend_from_slice(&2u64.to_be_bytes());
    body.push(0x02);
    body.extend_from_slice(&1u16.to_be_bytes());
    body.push(b'I');
    body.extend(utf("x"));
    body.push(0x78); // B class annotations end
    body.extend(plain_class_desc("A", 1, 0x02, &[(b'I', "x")])); // super
    body.extend_from_slice(&1i32.to_be_bytes()); // A.x, written first
    body.extend_from_slice(&2i32.to_be_bytes()); // B.x
    let decoded = parse(&stream(&body)).unwrap();
    match &decoded.contents[0] {
        JavaValue::Object(object) => {
            assert_eq!(
                object.extends,
                vec![
                    ("A".to_owned(), vec![("x".to_owned(), JavaValue::Int(1))]),
                    ("B".to_owned(), vec![("x".to_owned(), JavaValue::Int(2))]),
                ]
            );
            assert_eq!(object.fields, vec![("x".to_owned(), JavaValue::Int(2))]);
        }
        other => panic!("expected object, got {other:?}"),
    }

    // Two instances sharing one descriptor via a back-reference.
    let mut body = vec![0x73];
    body.extend(plain_class_desc("A", 0x2a, 0x02, &[(b'I', "x")]));
    body.extend_from_slice(&1i32.to_be_bytes());
    body.extend_from_slice(&[0x73, 0x71, 0x00, 0x7e, 0x00, 0x00]);
    body.extend_from_slice(&2i32.to_be_bytes());
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(decoded.classes.len(), 1);
    match (&decoded.contents[0], &decoded.contents[1]) {
        (JavaValue::Object(first), JavaValue::Object(second)) => {
            assert_eq!(first.class, second.class);
            assert_eq!(first.fields, vec![("x".to_owned(), JavaValue::Int(1))]);
            assert_eq!(second.fields, vec![("x".to_owned(), JavaValue::Int(2))]);
        }
        other => panic!("expected two objects, got {other:?}"),
    }

    // SC_WRITE_METHOD classes capture their annotations under "@".
    let mut body = vec![0x73];
    body.extend(plain_class_desc("A", 1, 0x03, &[(b'I', "x")]));
    body.extend_from_slice(&7i32.to_be_bytes());
    body.extend_from_slice(&[0x77, 0x01, 0xaa, 0x78]); // one block, then end
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(
        object_fields(&decoded.contents[0]),
        &vec![
            ("x".to_owned(), JavaValue::Int(7)),
            (
                "@".to_owned(),
                JavaValue::List(vec![JavaValue::Bytes(vec![0xaa])])
            ),
        ]
    );

    // Externalizable classes with block data carry only annotations.
    let mut body = vec![0x73];
    body.extend(plain_class_desc("E", 1, 0x0c, &[]));
    body.extend_from_slice(&[0x77, 0x02, 0x01, 0x02, 0x78]);
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(
        object_fields(&decoded.contents[0]),
        &vec![(
            "@".to_owned(),
            JavaValue::List(vec![JavaValue::Bytes(vec![1, 2])])
        )]
    );

    // Externalizable without block data is protocol version 1.
    let mut body = vec![0x73];
    body.extend(plain_class_desc("E", 1, 0x04, &[]));
    assert_eq!(
        parse(&stream(&body)),
        Err(ObjectStreamError::Protocol1External)
    );

    // An object needs a class descriptor.
    assert_eq!(
        parse(&stream(&[0x73, 0x70])),
        Err(ObjectStreamError::MissingClassDesc)
    );

    // A dynamic proxy instance has no instance data of its own.
    let mut body = vec![0x73, 0x7d];
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(&[0x78, 0x70]);
    let decoded = parse(&stream(&body)).unwrap();
    assert!(object_fields(&decoded.contents[0]).is_empty());

    // Truncated instance data surfaces as EOF.
    let mut body = vec![0x73];
    body.extend(plain_class_desc("A", 1, 0x02, &[(b'J', "n")]));
    body.extend_from_slice(&[0x00, 0x01]); // only 2 of 8 bytes
    assert_eq!(parse(&stream(&body)), Err(ObjectStreamError::UnexpectedEof));

    // Cyclic self-reference: class "N" with one object field "next";
    // the instance points its "next" at its own (deferred) handle.
    let mut body = vec![0x73, 0x72];
    body.extend(utf("N"));
    body.extend_from_slice(&9u64.to_be_bytes());
    body.push(0x02);
    body.extend_from_slice(&1u16.to_be_bytes());
    body.push(b'L');
    body.extend(utf("next"));
    body.extend(utf_string("LN;"));
    body.extend_from_slice(&[0x78, 0x70]);
    body.extend_from_slice(&[0x71, 0x00, 0x7e, 0x00, 0x02]);
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(
        object_fields(&decoded.contents[0]),
        &vec![("next".to_owned(), JavaValue::Ref(0x7e0002))]
    );
    // The minimal projection breaks the cycle instead of recursing
    // forever.
    let minimal = parse_minimal(&stream(&body)).unwrap();
    assert_eq!(minimal, vec![json!({ "next": { "next": null } })]);
}

#[test]
fn array_matrix() {
    // Primitive element arrays read one value per element.
    let mut body = vec![0x75];
    body.extend(plain_class_desc("[I", 5, 0x02, &[]));
    body.extend_from_slice(&3i32.to_be_bytes());
    for n in [1i32, -2, 3] {
        body.extend_from_slice(&n.to_be_bytes());
    }
    let decoded = parse(&stream(&body)).unwrap();
    match &decoded.contents[0] {
        JavaValue::Array(array) => {
            assert_eq!(
                array.elements,
                vec![JavaValue::Int(1), JavaValue::Int(-2), JavaValue::Int(3)]
            );
        }
        other => panic!("expected array, got {other:?}"),
    }
    // Handles: array class, then the array.
    assert_eq!(decoded.handles.len(), 2);

    // Object arrays read content elements.
    let mut body = vec![0x75];
    body.extend(plain_class_desc("[Ljava.lang.String;", 6, 0x02, &[]));
    body.extend_from_slice(&2i32.to_be_bytes());
    body.extend(utf_string("a"));
    body.push(0x70); // null element
    let decoded = parse(&stream(&body)).unwrap();
    match &decoded.contents[0] {
        JavaValue::Array(array) => {
            assert_eq!(
                array.elements,
                vec![JavaValue::Str("a".into()), JavaValue::Null]
            );
        }
        other => panic!("expected array, got {other:?}"),
    }

    // A non-array class name is rejected, as is a negative length.
    let mut body = vec![0x75];
    body.extend(plain_class_desc("XY", 7, 0x02, &[]));
    body.extend_from_slice(&0i32.to_be_bytes());
    assert!(matches!(
        parse(&stream(&body)),
        Err(ObjectStreamError::BadArrayClass(_))
    ));

    let mut body = vec![0x75];
    body.extend(plain_class_desc("[I", 8, 0x02, &[]));
    body.extend_from_slice(&(-1i32).to_be_bytes());
    assert_eq!(
        parse(&stream(&body)),
        Err(ObjectStreamError::BadArrayLength(-1))
    );
}

#[test]
fn enum_matrix() {
    // An enum constant: class, deferred constant handle, name string.
    let mut body = vec![0x7e];
    body.extend(plain_class_desc("Color", 3, 0x12, &[]));
    body.extend(utf_string("RED"));
    let decoded = parse(&stream(&body)).unwrap();
    match &decoded.contents[0] {
        JavaValue::Enum(e) => {
            assert_eq!(e.constant, "RED");
            assert_eq!(decoded.classes[e.class].name, "Color");
        }
        other => panic!("expected enum, got {other:?}"),
    }
    assert_eq!(decoded.handles.len(), 3);

    // The constant name may arrive as a back-reference.
    let mut body = utf_string("RED");
    body.push(0x7e);
    body.extend(plain_class_desc("Color", 3, 0x12, &[]));
    body.extend_from_slice(&[0x71, 0x00, 0x7e, 0x00, 0x00]);
    let decoded = parse(&stream(&body)).unwrap();
    match &decoded.contents[1] {
        JavaValue::Enum(e) => assert_eq!(e.constant, "RED"),
        other => panic!("expected enum, got {other:?}"),
    }
}

#[test]
fn identity_matrix() {
    // Handles are dense, ordered, and start at the base wire handle.
    let body = [utf_string("a"), utf_string("b"), utf_string("c")].concat();
    let decoded = parse(&stream(&body)).unwrap();
    assert_eq!(decoded.handles.len(), 3);
    for (i, expected) in ["a", "b", "c"].iter().enumerate() {
        assert_eq!(
            decoded.handles.get(0x7e0000 + i as u32),
            Some(&JavaValue::Str((*expected).into()))
        );
    }

    // Parsing the same buffer twice is structurally identical.
    let mut body = vec![0x73];
    body.extend(plain_class_desc("A", 0x2a, 0x02, &[(b'J', "n")]));
    body.extend_from_slice(&1234567890123i64.to_be_bytes());
    body.extend(utf_string("tail"));
    let data = stream(&body);
    let first = parse(&data).unwrap();
    let second = parse(&data).unwrap();
    assert_eq!(first.contents, second.contents);
    assert_eq!(first.classes, second.classes);
    assert_eq!(first.handles.len(), second.handles.len());
}

// End-to-end generation scenarios, driven through the public API with
// descriptors built in code.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::rc::Rc;

use prost::Message as _;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet,
};

use prototab_codegen::{generate, generate_file_set, generate_file_source, Error, GeneratorContext};

fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        r#type: Some(ty as i32),
        label: Some(label as i32),
        ..Default::default()
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn file(name: &str, messages: Vec<DescriptorProto>) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        message_type: messages,
        ..Default::default()
    }
}

#[test]
fn empty_message() {
    let source = generate_file_source(&file("empty.proto", vec![message("Empty", vec![])])).unwrap();

    // zero-length presence array, no encoding entries
    assert!(source.contains("pub struct Empty"), "{source}");
    assert!(source.contains("[u32; 0usize]"), "{source}");
    assert!(source.contains("ENCODING_TABLE_Empty"), "{source}");
    assert_eq!(source.matches("encoded_tag:").count(), 0);

    // sixteen masked slots, all unknown
    assert!(source.contains("mask: 120u16"), "{source}");
    assert_eq!(source.matches("prototab::wire::FieldKind::Unknown").count(), 16);

    // snapshot sets no presence bits beyond the file name
    assert!(source.contains("FILE_DESCRIPTOR_PROTO"), "{source}");
}

#[test]
fn single_scalar_field() {
    let source = generate_file_source(&file(
        "m.proto",
        vec![message("M", vec![field("x", 1, Type::Int32, Label::Optional)])],
    ))
    .unwrap();

    assert!(source.contains("pub has_bits: [u32; 1usize]"), "{source}");
    assert!(source.contains("pub x: i32"), "{source}");
    assert!(source.contains("encoded_tag: 8u32"), "{source}");
    assert!(source.contains("has_bit: 0u8"), "{source}");
    // the slot entry names the field's storage and carries has-bit zero
    assert!(source.contains("offset_of!(M, x) as u16 + 0u16"), "{source}");
    assert!(source.contains("set_has_bit(0u32)"), "{source}");
}

#[test]
fn string_field() {
    let source = generate_file_source(&file(
        "s.proto",
        vec![message("S", vec![field("s", 2, Type::String, Label::Optional)])],
    ))
    .unwrap();

    assert!(source.contains("pub fn s(&self) -> &str"), "{source}");
    assert!(
        source.contains("pub fn set_s(&mut self, value: &str, arena: &mut prototab::arena::Arena)"),
        "{source}"
    );
    assert!(source.contains("prototab::wire::FieldKind::Bytes"), "{source}");
    assert!(source.contains("encoded_tag: 18u32"), "{source}");
}

#[test]
fn nested_message_goes_through_the_aux_table() {
    let mut c_field = field("c", 1, Type::Message, Label::Optional);
    c_field.type_name = Some(".C".to_string());
    let source = generate_file_source(&file(
        "p.proto",
        vec![
            message("P", vec![c_field]),
            message("C", vec![field("v", 1, Type::Int32, Label::Optional)]),
        ],
    ))
    .unwrap();

    // no presence bit for the message field
    let p_struct = source.find("pub struct P").unwrap();
    let c_struct = source.find("pub struct C").unwrap();
    assert!(source[p_struct..c_struct].contains("[u32; 0usize]"), "{source}");

    // the decoding slot for field 1 carries the aux-entry offset, and the
    // aux entry points at the child's tables
    assert!(source.contains("&DECODING_TABLE_C.0"), "{source}");
    assert!(source.contains("&ENCODING_TABLE_C.0"), "{source}");
    assert!(
        source.contains("size_of::<prototab::decoding::AuxTableEntry>()"),
        "{source}"
    );

    // typed accessor pair with null-as-absent
    assert!(source.contains("pub fn c(&self) -> Option<&C>"), "{source}");
    assert!(
        source.contains("pub fn c_mut(&mut self, arena: &mut prototab::arena::Arena) -> &mut C"),
        "{source}"
    );
}

#[test]
fn repeated_enum_field() {
    let mut es = field("es", 3, Type::Enum, Label::Repeated);
    es.type_name = Some(".E".to_string());
    let mut fd = file("r.proto", vec![message("R", vec![es])]);
    fd.syntax = Some("proto3".to_string());
    fd.enum_type = vec![EnumDescriptorProto {
        name: Some("E".to_string()),
        value: vec![
            EnumValueDescriptorProto {
                name: Some("A".to_string()),
                number: Some(0),
                ..Default::default()
            },
            EnumValueDescriptorProto {
                name: Some("B".to_string()),
                number: Some(1),
                ..Default::default()
            },
        ],
        ..Default::default()
    }];
    let source = generate_file_source(&fd).unwrap();

    assert!(source.contains("pub enum E"), "{source}");
    assert!(source.contains("A = 0i32"), "{source}");
    assert!(source.contains("B = 1i32"), "{source}");
    assert!(source.contains("Some(E::B)"), "{source}");
    assert!(source.contains("pub fn to_i32(self)"), "{source}");

    // no presence bit, typed storage slot, packed tag under proto3
    assert!(source.contains("pub es: prototab::containers::RepeatedField<i32>"), "{source}");
    assert!(source.contains("prototab::wire::FieldKind::RepeatedVarint32"), "{source}");
    assert!(source.contains("encoded_tag: 26u32"), "{source}");
}

#[test]
fn oversized_field_number_fails() {
    let err = generate_file_source(&file(
        "l.proto",
        vec![message("L", vec![field("x", 2048, Type::Int32, Label::Optional)])],
    ))
    .unwrap_err();
    assert!(matches!(err, Error::FieldNumberTooLarge { number: 2048, .. }));
}

#[test]
fn snapshot_reconstructs_the_input_descriptor() {
    let source = generate_file_source(&file(
        "m.proto",
        vec![message("M", vec![field("x", 1, Type::Int32, Label::Optional)])],
    ))
    .unwrap();

    assert!(
        source.contains(
            "pub static FILE_DESCRIPTOR_PROTO: prototab::descriptor::google_protobuf_FileDescriptorProto"
        ),
        "{source}"
    );
    assert!(source.contains("\"m.proto\""), "{source}");
    assert!(source.contains("\"M\""), "{source}");
    assert!(source.contains("\"x\""), "{source}");
    // field number, int32 type tag and optional label, as numbers
    assert!(source.contains("number: 1"), "{source}");
    assert!(source.contains("type_: 5"), "{source}");
    assert!(source.contains("label: 1"), "{source}");
    // absent options are a null owning pointer
    assert!(source.contains("core::ptr::null_mut()"), "{source}");
}

struct SharedSink(Rc<RefCell<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryContext {
    files: BTreeMap<String, Rc<RefCell<Vec<u8>>>>,
}

impl GeneratorContext for MemoryContext {
    fn open(&mut self, filename: &str) -> io::Result<Box<dyn Write>> {
        let buf = Rc::new(RefCell::new(Vec::new()));
        self.files.insert(filename.to_string(), Rc::clone(&buf));
        Ok(Box::new(SharedSink(buf)))
    }
}

#[test]
fn one_sink_per_input_file() {
    let set = FileDescriptorSet {
        file: vec![
            file("a.proto", vec![message("A", vec![])]),
            file("b.proto", vec![message("B", vec![])]),
        ],
    };
    let mut context = MemoryContext::default();
    generate_file_set(&set, &mut context).unwrap();

    let names: Vec<_> = context.files.keys().cloned().collect();
    assert_eq!(names, ["a.pc.rs", "b.pc.rs"]);
    for buf in context.files.values() {
        let source = String::from_utf8(buf.borrow().clone()).unwrap();
        assert!(source.starts_with("// Automatically generated"), "{source}");
        assert!(source.contains("use prototab::Protobuf;"), "{source}");
    }
}

#[test]
fn generation_is_idempotent() {
    let set = FileDescriptorSet {
        file: vec![file(
            "m.proto",
            vec![
                message("M", vec![field("x", 1, Type::Int32, Label::Optional)]),
                message("N", vec![field("s", 2, Type::String, Label::Repeated)]),
            ],
        )],
    };
    let bytes = set.encode_to_vec();
    let first = generate(&bytes).unwrap();
    let second = generate(&bytes).unwrap();
    assert_eq!(first, second);
}

#[test]
fn nested_types_emit_after_their_parent_with_flat_names() {
    let mut inner = message("Inner", vec![field("v", 1, Type::Int32, Label::Optional)]);
    inner.enum_type = vec![EnumDescriptorProto {
        name: Some("Mode".to_string()),
        value: vec![EnumValueDescriptorProto {
            name: Some("OFF".to_string()),
            number: Some(0),
            ..Default::default()
        }],
        ..Default::default()
    }];
    let mut outer = message("Outer", vec![]);
    outer.nested_type = vec![inner];
    let mut fd = file("n.proto", vec![outer]);
    fd.package = Some("pkg".to_string());
    let source = generate_file_source(&fd).unwrap();

    assert!(source.contains("pub struct pkg_Outer"), "{source}");
    assert!(source.contains("pub struct pkg_Outer_Inner"), "{source}");
    assert!(source.contains("pub enum pkg_Outer_Inner_Mode"), "{source}");

    let outer_at = source.find("pub struct pkg_Outer {").unwrap();
    let outer_tables = source.find("DECODING_TABLE_pkg_Outer:").unwrap();
    let inner_at = source.find("pub struct pkg_Outer_Inner {").unwrap();
    let inner_enum = source.find("pub enum pkg_Outer_Inner_Mode").unwrap();
    // nested messages come after the enclosing message's tables, and a
    // nested enum precedes the struct that stores it
    assert!(outer_at < outer_tables && outer_tables < inner_at, "{source}");
    assert!(inner_enum < inner_at, "{source}");
}

#[test]
fn real_oneofs_are_rejected() {
    let mut choice = field("choice", 1, Type::Int32, Label::Optional);
    choice.oneof_index = Some(0);
    let err = generate_file_source(&file("o.proto", vec![message("O", vec![choice])])).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFieldType { .. }));
}

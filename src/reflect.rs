// Read-only reflection over the descriptor schema.
//
// The snapshot emitter walks "a live descriptor message" without knowing its
// concrete type. This module provides that uniform view for the prost-types
// descriptor messages: a static field schema per message type, in
// descriptor.proto declaration order, and a `Value` taken by field number.
//
// Scope: the descriptor graph the generator consumes. `options`,
// `source_code_info`, `service` and extension fields stay in the schema so
// emitted literals are complete and presence bits line up, but they always
// reflect as absent; the snapshot does not reproduce the options subtree.

use prost_types::{
    descriptor_proto, enum_descriptor_proto, DescriptorProto, EnumDescriptorProto,
    EnumValueDescriptorProto, FieldDescriptorProto, FileDescriptorProto, OneofDescriptorProto,
};

/// Wire-agnostic kind of a schema field, as the snapshot emitter needs it.
/// The descriptor schema only carries these; bit-width distinctions beyond
/// i32 never occur in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int32,
    Str,
    Enum,
    Message,
}

/// One descriptor-schema field, in declaration order within its message.
pub struct FieldSchema {
    pub name: &'static str,
    pub number: i32,
    pub kind: FieldKind,
    pub repeated: bool,
}

impl FieldSchema {
    const fn singular(name: &'static str, number: i32, kind: FieldKind) -> Self {
        FieldSchema {
            name,
            number,
            kind,
            repeated: false,
        }
    }

    const fn repeated(name: &'static str, number: i32, kind: FieldKind) -> Self {
        FieldSchema {
            name,
            number,
            kind,
            repeated: true,
        }
    }

    /// Singular non-message fields carry a presence bit in the generated
    /// value types.
    pub fn has_presence_bit(&self) -> bool {
        !self.repeated && self.kind != FieldKind::Message
    }
}

/// Field value as seen by the snapshot walk. Absent fields are represented
/// by `None` at the `field_value` call site, not by a `Value` variant.
pub enum Value<'a> {
    Bool(bool),
    Int32(i32),
    Str(&'a str),
    Enum(i32),
    RepeatedInt32(&'a [i32]),
    RepeatedStr(Vec<&'a str>),
    RepeatedMessage(Vec<MessageRef<'a>>),
}

/// Borrowed view of any descriptor-schema message.
#[derive(Clone, Copy)]
pub struct MessageRef<'a>(pub &'a dyn ReflectMessage);

impl<'a> MessageRef<'a> {
    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn fields(&self) -> &'static [FieldSchema] {
        self.0.fields()
    }

    pub fn field_value(&self, number: i32) -> Option<Value<'a>> {
        self.0.field_value(number)
    }
}

pub trait ReflectMessage {
    /// Fully qualified proto type name, e.g.
    /// "google.protobuf.FileDescriptorProto".
    fn type_name(&self) -> &'static str;

    /// Schema in declaration order.
    fn fields(&self) -> &'static [FieldSchema];

    /// Value by field number; `None` means the field is not set (or not
    /// reproduced, for the options subtree).
    fn field_value(&self, number: i32) -> Option<Value<'_>>;
}

fn str_value(value: &Option<String>) -> Option<Value<'_>> {
    value.as_deref().map(Value::Str)
}

fn repeated_int32(values: &[i32]) -> Option<Value<'_>> {
    if values.is_empty() {
        None
    } else {
        Some(Value::RepeatedInt32(values))
    }
}

fn repeated_str(values: &[String]) -> Option<Value<'_>> {
    if values.is_empty() {
        None
    } else {
        Some(Value::RepeatedStr(values.iter().map(|s| s.as_str()).collect()))
    }
}

fn repeated_message<T: ReflectMessage>(values: &[T]) -> Option<Value<'_>> {
    if values.is_empty() {
        None
    } else {
        Some(Value::RepeatedMessage(
            values.iter().map(|m| MessageRef(m)).collect(),
        ))
    }
}

impl ReflectMessage for FileDescriptorProto {
    fn type_name(&self) -> &'static str {
        "google.protobuf.FileDescriptorProto"
    }

    fn fields(&self) -> &'static [FieldSchema] {
        use FieldKind::*;
        static FIELDS: &[FieldSchema] = &[
            FieldSchema::singular("name", 1, Str),
            FieldSchema::singular("package", 2, Str),
            FieldSchema::repeated("dependency", 3, Str),
            FieldSchema::repeated("public_dependency", 10, Int32),
            FieldSchema::repeated("weak_dependency", 11, Int32),
            FieldSchema::repeated("message_type", 4, Message),
            FieldSchema::repeated("enum_type", 5, Message),
            FieldSchema::repeated("service", 6, Message),
            FieldSchema::repeated("extension", 7, Message),
            FieldSchema::singular("options", 8, Message),
            FieldSchema::singular("source_code_info", 9, Message),
            FieldSchema::singular("syntax", 12, Str),
            FieldSchema::singular("edition", 14, Enum),
        ];
        FIELDS
    }

    fn field_value(&self, number: i32) -> Option<Value<'_>> {
        match number {
            1 => str_value(&self.name),
            2 => str_value(&self.package),
            3 => repeated_str(&self.dependency),
            10 => repeated_int32(&self.public_dependency),
            11 => repeated_int32(&self.weak_dependency),
            4 => repeated_message(&self.message_type),
            5 => repeated_message(&self.enum_type),
            12 => str_value(&self.syntax),
            14 => self.edition.map(Value::Enum),
            // service, extension, options, source_code_info
            _ => None,
        }
    }
}

impl ReflectMessage for DescriptorProto {
    fn type_name(&self) -> &'static str {
        "google.protobuf.DescriptorProto"
    }

    fn fields(&self) -> &'static [FieldSchema] {
        use FieldKind::*;
        static FIELDS: &[FieldSchema] = &[
            FieldSchema::singular("name", 1, Str),
            FieldSchema::repeated("field", 2, Message),
            FieldSchema::repeated("extension", 6, Message),
            FieldSchema::repeated("nested_type", 3, Message),
            FieldSchema::repeated("enum_type", 4, Message),
            FieldSchema::repeated("extension_range", 5, Message),
            FieldSchema::repeated("oneof_decl", 8, Message),
            FieldSchema::singular("options", 7, Message),
            FieldSchema::repeated("reserved_range", 9, Message),
            FieldSchema::repeated("reserved_name", 10, Str),
        ];
        FIELDS
    }

    fn field_value(&self, number: i32) -> Option<Value<'_>> {
        match number {
            1 => str_value(&self.name),
            2 => repeated_message(&self.field),
            3 => repeated_message(&self.nested_type),
            4 => repeated_message(&self.enum_type),
            5 => repeated_message(&self.extension_range),
            8 => repeated_message(&self.oneof_decl),
            9 => repeated_message(&self.reserved_range),
            10 => repeated_str(&self.reserved_name),
            // extension, options
            _ => None,
        }
    }
}

impl ReflectMessage for FieldDescriptorProto {
    fn type_name(&self) -> &'static str {
        "google.protobuf.FieldDescriptorProto"
    }

    fn fields(&self) -> &'static [FieldSchema] {
        use FieldKind::*;
        static FIELDS: &[FieldSchema] = &[
            FieldSchema::singular("name", 1, Str),
            FieldSchema::singular("number", 3, Int32),
            FieldSchema::singular("label", 4, Enum),
            FieldSchema::singular("type", 5, Enum),
            FieldSchema::singular("type_name", 6, Str),
            FieldSchema::singular("extendee", 2, Str),
            FieldSchema::singular("default_value", 7, Str),
            FieldSchema::singular("oneof_index", 9, Int32),
            FieldSchema::singular("json_name", 10, Str),
            FieldSchema::singular("options", 8, Message),
            FieldSchema::singular("proto3_optional", 17, Bool),
        ];
        FIELDS
    }

    fn field_value(&self, number: i32) -> Option<Value<'_>> {
        match number {
            1 => str_value(&self.name),
            3 => self.number.map(Value::Int32),
            4 => self.label.map(Value::Enum),
            5 => self.r#type.map(Value::Enum),
            6 => str_value(&self.type_name),
            2 => str_value(&self.extendee),
            7 => str_value(&self.default_value),
            9 => self.oneof_index.map(Value::Int32),
            10 => str_value(&self.json_name),
            17 => self.proto3_optional.map(Value::Bool),
            // options
            _ => None,
        }
    }
}

impl ReflectMessage for OneofDescriptorProto {
    fn type_name(&self) -> &'static str {
        "google.protobuf.OneofDescriptorProto"
    }

    fn fields(&self) -> &'static [FieldSchema] {
        use FieldKind::*;
        static FIELDS: &[FieldSchema] = &[
            FieldSchema::singular("name", 1, Str),
            FieldSchema::singular("options", 2, Message),
        ];
        FIELDS
    }

    fn field_value(&self, number: i32) -> Option<Value<'_>> {
        match number {
            1 => str_value(&self.name),
            _ => None,
        }
    }
}

impl ReflectMessage for EnumDescriptorProto {
    fn type_name(&self) -> &'static str {
        "google.protobuf.EnumDescriptorProto"
    }

    fn fields(&self) -> &'static [FieldSchema] {
        use FieldKind::*;
        static FIELDS: &[FieldSchema] = &[
            FieldSchema::singular("name", 1, Str),
            FieldSchema::repeated("value", 2, Message),
            FieldSchema::singular("options", 3, Message),
            FieldSchema::repeated("reserved_range", 4, Message),
            FieldSchema::repeated("reserved_name", 5, Str),
        ];
        FIELDS
    }

    fn field_value(&self, number: i32) -> Option<Value<'_>> {
        match number {
            1 => str_value(&self.name),
            2 => repeated_message(&self.value),
            4 => repeated_message(&self.reserved_range),
            5 => repeated_str(&self.reserved_name),
            _ => None,
        }
    }
}

impl ReflectMessage for EnumValueDescriptorProto {
    fn type_name(&self) -> &'static str {
        "google.protobuf.EnumValueDescriptorProto"
    }

    fn fields(&self) -> &'static [FieldSchema] {
        use FieldKind::*;
        static FIELDS: &[FieldSchema] = &[
            FieldSchema::singular("name", 1, Str),
            FieldSchema::singular("number", 2, Int32),
            FieldSchema::singular("options", 3, Message),
        ];
        FIELDS
    }

    fn field_value(&self, number: i32) -> Option<Value<'_>> {
        match number {
            1 => str_value(&self.name),
            2 => self.number.map(Value::Int32),
            _ => None,
        }
    }
}

impl ReflectMessage for descriptor_proto::ExtensionRange {
    fn type_name(&self) -> &'static str {
        "google.protobuf.DescriptorProto.ExtensionRange"
    }

    fn fields(&self) -> &'static [FieldSchema] {
        use FieldKind::*;
        static FIELDS: &[FieldSchema] = &[
            FieldSchema::singular("start", 1, Int32),
            FieldSchema::singular("end", 2, Int32),
            FieldSchema::singular("options", 3, Message),
        ];
        FIELDS
    }

    fn field_value(&self, number: i32) -> Option<Value<'_>> {
        match number {
            1 => self.start.map(Value::Int32),
            2 => self.end.map(Value::Int32),
            _ => None,
        }
    }
}

impl ReflectMessage for descriptor_proto::ReservedRange {
    fn type_name(&self) -> &'static str {
        "google.protobuf.DescriptorProto.ReservedRange"
    }

    fn fields(&self) -> &'static [FieldSchema] {
        use FieldKind::*;
        static FIELDS: &[FieldSchema] = &[
            FieldSchema::singular("start", 1, Int32),
            FieldSchema::singular("end", 2, Int32),
        ];
        FIELDS
    }

    fn field_value(&self, number: i32) -> Option<Value<'_>> {
        match number {
            1 => self.start.map(Value::Int32),
            2 => self.end.map(Value::Int32),
            _ => None,
        }
    }
}

impl ReflectMessage for enum_descriptor_proto::EnumReservedRange {
    fn type_name(&self) -> &'static str {
        "google.protobuf.EnumDescriptorProto.EnumReservedRange"
    }

    fn fields(&self) -> &'static [FieldSchema] {
        use FieldKind::*;
        static FIELDS: &[FieldSchema] = &[
            FieldSchema::singular("start", 1, Int32),
            FieldSchema::singular("end", 2, Int32),
        ];
        FIELDS
    }

    fn field_value(&self, number: i32) -> Option<Value<'_>> {
        match number {
            1 => self.start.map(Value::Int32),
            2 => self.end.map(Value::Int32),
            _ => None,
        }
    }
}

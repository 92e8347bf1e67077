// Field classification: storage type, wire kind, has-bit eligibility and
// the precomputed wire tag.

use proc_macro2::TokenStream;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::FieldDescriptorProto;
use quote::{format_ident, quote};

use crate::Error;

/// Wire-level shape of a singular field, mirroring the runtime's
/// `prototab::wire::FieldKind` namespace. Repeated fields render with a
/// `Repeated` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    Varint32,
    Varint32Zigzag,
    Varint64,
    Varint64Zigzag,
    Fixed32,
    Fixed64,
    Bytes,
    Message,
    Group,
}

impl WireKind {
    fn name(self) -> &'static str {
        match self {
            WireKind::Varint32 => "Varint32",
            WireKind::Varint32Zigzag => "Varint32Zigzag",
            WireKind::Varint64 => "Varint64",
            WireKind::Varint64Zigzag => "Varint64Zigzag",
            WireKind::Fixed32 => "Fixed32",
            WireKind::Fixed64 => "Fixed64",
            WireKind::Bytes => "Bytes",
            WireKind::Message => "Message",
            WireKind::Group => "Group",
        }
    }
}

/// Decode the type tag, distinguishing a missing tag (malformed input) from
/// a tag this generator has no mapping for.
pub fn field_type(field: &FieldDescriptorProto) -> Result<Type, Error> {
    let raw = field.r#type.ok_or_else(|| {
        Error::MalformedDescriptor(format!("field '{}' has no type tag", field.name()))
    })?;
    Type::try_from(raw).map_err(|_| Error::UnsupportedFieldType {
        field: field.name().to_string(),
        reason: format!("unknown type tag {raw}"),
    })
}

pub fn is_repeated(field: &FieldDescriptorProto) -> bool {
    field.label == Some(Label::Repeated as i32)
}

pub fn is_message(field: &FieldDescriptorProto) -> Result<bool, Error> {
    Ok(matches!(field_type(field)?, Type::Message | Type::Group))
}

/// Singular non-message fields carry a presence bit; messages signal
/// presence with a null pointer and repeated fields with their length.
pub fn needs_has_bit(field: &FieldDescriptorProto) -> Result<bool, Error> {
    Ok(!is_repeated(field) && !is_message(field)?)
}

/// Reject fields belonging to a real oneof. Synthetic oneofs created for
/// proto3 `optional` fields are plain singular fields.
pub fn ensure_supported(field: &FieldDescriptorProto) -> Result<(), Error> {
    if field.oneof_index.is_some() && !field.proto3_optional() {
        return Err(Error::UnsupportedFieldType {
            field: field.name().to_string(),
            reason: "oneof fields are not supported".to_string(),
        });
    }
    if matches!(field_type(field)?, Type::Message | Type::Group | Type::Enum)
        && field.type_name().is_empty()
    {
        return Err(Error::MalformedDescriptor(format!(
            "field '{}' has no type_name reference",
            field.name()
        )));
    }
    Ok(())
}

pub fn wire_kind(field: &FieldDescriptorProto) -> Result<WireKind, Error> {
    Ok(match field_type(field)? {
        Type::Int32 | Type::Uint32 => WireKind::Varint32,
        Type::Sint32 => WireKind::Varint32Zigzag,
        Type::Int64 | Type::Uint64 => WireKind::Varint64,
        Type::Sint64 => WireKind::Varint64Zigzag,
        Type::Fixed32 | Type::Sfixed32 | Type::Float => WireKind::Fixed32,
        Type::Fixed64 | Type::Sfixed64 | Type::Double => WireKind::Fixed64,
        Type::Bool => WireKind::Varint32,
        Type::Enum => WireKind::Varint32,
        Type::String | Type::Bytes => WireKind::Bytes,
        Type::Message => WireKind::Message,
        Type::Group => WireKind::Group,
    })
}

/// Fully qualified `prototab::wire::FieldKind` symbol for a field.
pub fn wire_kind_tokens(field: &FieldDescriptorProto) -> Result<TokenStream, Error> {
    let base = wire_kind(field)?.name();
    let ident = if is_repeated(field) {
        format_ident!("Repeated{}", base)
    } else {
        format_ident!("{}", base)
    };
    Ok(quote! { prototab::wire::FieldKind::#ident })
}

/// Storage type of the struct slot (element type for repeated fields).
pub fn storage_type_tokens(field: &FieldDescriptorProto) -> Result<TokenStream, Error> {
    Ok(match field_type(field)? {
        Type::Int32 | Type::Sint32 | Type::Sfixed32 | Type::Enum => quote! { i32 },
        Type::Int64 | Type::Sint64 | Type::Sfixed64 => quote! { i64 },
        Type::Uint32 | Type::Fixed32 => quote! { u32 },
        Type::Uint64 | Type::Fixed64 => quote! { u64 },
        Type::Float => quote! { f32 },
        Type::Double => quote! { f64 },
        Type::Bool => quote! { bool },
        Type::String => quote! { prototab::containers::String },
        Type::Bytes => quote! { prototab::containers::Bytes },
        Type::Message | Type::Group => quote! { prototab::base::Message },
    })
}

fn is_packed(field: &FieldDescriptorProto, syntax: Option<&str>) -> Result<bool, Error> {
    if !is_repeated(field) {
        return Ok(false);
    }
    let packable = !matches!(
        wire_kind(field)?,
        WireKind::Bytes | WireKind::Message | WireKind::Group
    );
    if !packable {
        return Ok(false);
    }
    // An explicit [packed] option wins; otherwise proto3 packs repeated
    // scalars by default and proto2 does not.
    Ok(match field.options.as_ref().and_then(|o| o.packed) {
        Some(packed) => packed,
        None => syntax == Some("proto3"),
    })
}

/// Precomputed varint tag: field number and wire type combined. Packed
/// repeated scalars take the length-delimited wire type.
pub fn encoded_tag(field: &FieldDescriptorProto, syntax: Option<&str>) -> Result<u32, Error> {
    let wire_type = if is_packed(field, syntax)? {
        2
    } else {
        match wire_kind(field)? {
            WireKind::Varint32
            | WireKind::Varint32Zigzag
            | WireKind::Varint64
            | WireKind::Varint64Zigzag => 0,
            WireKind::Fixed64 => 1,
            WireKind::Bytes | WireKind::Message => 2,
            WireKind::Group => 3,
            WireKind::Fixed32 => 5,
        }
    };
    Ok((field.number() as u32) << 3 | wire_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            r#type: Some(ty as i32),
            label: Some(label as i32),
            ..Default::default()
        }
    }

    #[test]
    fn scalar_kinds() {
        let f = field("x", 1, Type::Int32, Label::Optional);
        assert_eq!(wire_kind(&f).unwrap(), WireKind::Varint32);
        let f = field("x", 1, Type::Sint64, Label::Optional);
        assert_eq!(wire_kind(&f).unwrap(), WireKind::Varint64Zigzag);
        let f = field("x", 1, Type::Float, Label::Optional);
        assert_eq!(wire_kind(&f).unwrap(), WireKind::Fixed32);
        let f = field("x", 1, Type::Bool, Label::Optional);
        assert_eq!(wire_kind(&f).unwrap(), WireKind::Varint32);
        let f = field("x", 1, Type::Enum, Label::Optional);
        assert_eq!(wire_kind(&f).unwrap(), WireKind::Varint32);
    }

    #[test]
    fn repeated_kind_renders_with_prefix() {
        let f = field("xs", 3, Type::Enum, Label::Repeated);
        let tokens = wire_kind_tokens(&f).unwrap().to_string();
        assert!(tokens.ends_with("RepeatedVarint32"), "{tokens}");
    }

    #[test]
    fn tags_for_singular_fields() {
        let f = field("x", 1, Type::Int32, Label::Optional);
        assert_eq!(encoded_tag(&f, None).unwrap(), 8);
        let f = field("s", 2, Type::String, Label::Optional);
        assert_eq!(encoded_tag(&f, None).unwrap(), 18);
        let f = field("d", 3, Type::Double, Label::Optional);
        assert_eq!(encoded_tag(&f, None).unwrap(), 25);
    }

    #[test]
    fn repeated_scalars_pack_under_proto3_only() {
        let f = field("es", 3, Type::Enum, Label::Repeated);
        assert_eq!(encoded_tag(&f, Some("proto3")).unwrap(), 26);
        assert_eq!(encoded_tag(&f, Some("proto2")).unwrap(), 24);
        assert_eq!(encoded_tag(&f, None).unwrap(), 24);

        let mut explicit = field("es", 3, Type::Enum, Label::Repeated);
        explicit.options = Some(prost_types::FieldOptions {
            packed: Some(true),
            ..Default::default()
        });
        assert_eq!(encoded_tag(&explicit, None).unwrap(), 26);
    }

    #[test]
    fn repeated_strings_never_pack() {
        let f = field("ss", 4, Type::String, Label::Repeated);
        assert_eq!(encoded_tag(&f, Some("proto3")).unwrap(), 34);
    }

    #[test]
    fn real_oneof_is_rejected_but_proto3_optional_is_not() {
        let mut f = field("choice", 1, Type::Int32, Label::Optional);
        f.oneof_index = Some(0);
        assert!(matches!(
            ensure_supported(&f),
            Err(Error::UnsupportedFieldType { .. })
        ));

        f.proto3_optional = Some(true);
        assert!(ensure_supported(&f).is_ok());
    }

    #[test]
    fn missing_type_tag_is_malformed() {
        let mut f = field("x", 1, Type::Int32, Label::Optional);
        f.r#type = None;
        assert!(matches!(
            field_type(&f),
            Err(Error::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn message_without_reference_is_malformed() {
        let f = field("child", 1, Type::Message, Label::Optional);
        assert!(matches!(
            ensure_supported(&f),
            Err(Error::MalformedDescriptor(_))
        ));
    }
}

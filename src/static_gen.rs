// Descriptor snapshot emission.
//
// Walks a live descriptor message through the `reflect` view and emits a
// struct-literal constant that the runtime can decode back into the same
// descriptor: presence words first, then one initializer per field in
// declaration order. Nested messages become promoted statics behind owning
// pointers, so the whole snapshot is a single address.

use proc_macro2::{Literal, TokenStream};
use prost_types::FileDescriptorProto;
use quote::quote;

use crate::names;
use crate::reflect::{FieldKind, FieldSchema, MessageRef, ReflectMessage, Value};
use crate::Error;

/// The file-level snapshot constant. Its address is the descriptor payload
/// for the generated file.
pub fn generate_file_descriptor(file: &FileDescriptorProto) -> Result<TokenStream, Error> {
    let ty = names::descriptor_type_path(ReflectMessage::type_name(file));
    let literal = message_literal(MessageRef(file))?;
    Ok(quote! {
        pub static FILE_DESCRIPTOR_PROTO: #ty = #literal;
    })
}

fn message_literal(msg: MessageRef<'_>) -> Result<TokenStream, Error> {
    let ty = names::descriptor_type_path(msg.type_name());
    let has_bits = presence_words(msg);
    let has_bits_tokens: Vec<_> = has_bits.iter().map(|&w| Literal::u32_suffixed(w)).collect();

    let field_inits = msg
        .fields()
        .iter()
        .map(|schema| {
            let name = names::field_ident(schema.name);
            let value = field_value_tokens(msg.field_value(schema.number), schema)?;
            Ok(quote! { #name: #value })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(quote! {
        #ty {
            has_bits: [#(#has_bits_tokens),*],
            #(#field_inits,)*
        }
    })
}

/// One bit per singular non-message field in declaration order, set when the
/// source message has the field.
fn presence_words(msg: MessageRef<'_>) -> Vec<u32> {
    let eligible = msg.fields().iter().filter(|f| f.has_presence_bit());
    let count = eligible.clone().count();
    let mut words = vec![0u32; count.div_ceil(32)];
    for (bit_idx, schema) in eligible.enumerate() {
        if msg.field_value(schema.number).is_some() {
            words[bit_idx / 32] |= 1 << (bit_idx % 32);
        }
    }
    words
}

fn mismatch(schema: &FieldSchema) -> Error {
    Error::MalformedDescriptor(format!(
        "descriptor field '{}' does not match its schema kind",
        schema.name
    ))
}

fn field_value_tokens(
    value: Option<Value<'_>>,
    schema: &FieldSchema,
) -> Result<TokenStream, Error> {
    if schema.repeated {
        return repeated_value_tokens(value, schema);
    }

    if schema.kind == FieldKind::Message {
        // Singular message fields in the descriptor schema are exactly the
        // options subtree, which is never reproduced; nested descriptors
        // travel through repeated fields.
        return match value {
            None => Ok(quote! { prototab::base::Message(core::ptr::null_mut()) }),
            Some(_) => Err(mismatch(schema)),
        };
    }

    match value {
        None => Ok(default_value_tokens(schema)),
        Some(value) => scalar_value_tokens(value, schema),
    }
}

fn scalar_value_tokens(value: Value<'_>, schema: &FieldSchema) -> Result<TokenStream, Error> {
    Ok(match value {
        Value::Bool(v) => quote! { #v },
        // Enums store their number, not a variant.
        Value::Int32(v) | Value::Enum(v) => {
            let lit = Literal::i32_unsuffixed(v);
            quote! { #lit }
        }
        Value::Str(s) => quote! { prototab::containers::String::from_static_slice(#s) },
        Value::RepeatedInt32(_) | Value::RepeatedStr(_) | Value::RepeatedMessage(_) => {
            return Err(mismatch(schema))
        }
    })
}

fn repeated_value_tokens(
    value: Option<Value<'_>>,
    schema: &FieldSchema,
) -> Result<TokenStream, Error> {
    let Some(value) = value else {
        return Ok(quote! { prototab::containers::RepeatedField::new() });
    };

    let elements = match value {
        Value::RepeatedInt32(values) => values
            .iter()
            .map(|&v| {
                let lit = Literal::i32_unsuffixed(v);
                Ok(quote! { #lit })
            })
            .collect::<Result<Vec<_>, Error>>()?,
        Value::RepeatedStr(values) => values
            .iter()
            .map(|&s| Ok(quote! { prototab::containers::String::from_static_slice(#s) }))
            .collect::<Result<Vec<_>, Error>>()?,
        Value::RepeatedMessage(values) => values
            .into_iter()
            .map(|child| {
                let literal = message_literal(child)?;
                Ok(quote! {
                    prototab::base::Message(
                        &#literal as *const _ as *mut prototab::base::Object
                    )
                })
            })
            .collect::<Result<Vec<_>, Error>>()?,
        _ => return Err(mismatch(schema)),
    };

    Ok(quote! {
        prototab::containers::RepeatedField::from_static(&[#(#elements),*])
    })
}

fn default_value_tokens(schema: &FieldSchema) -> TokenStream {
    match schema.kind {
        FieldKind::Bool => quote! { false },
        FieldKind::Int32 | FieldKind::Enum => quote! { 0 },
        FieldKind::Str => quote! { prototab::containers::String::new() },
        FieldKind::Message => quote! { prototab::base::Message(core::ptr::null_mut()) },
    }
}

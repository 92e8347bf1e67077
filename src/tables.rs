// Emission of the per-message decoding and encoding table constants.
//
// Slot offsets inside the value type are emitted as `offset_of!` expressions
// rather than precomputed numbers, so the target compiler owns the layout
// arithmetic and the statics stay free of relocation logic. Aux-entry
// offsets are relative to the start of the table composite, which is also
// the address of its header.

use proc_macro2::{Ident, TokenStream};
use prost_types::{DescriptorProto, FieldDescriptorProto};
use quote::{format_ident, quote};

use crate::classify;
use crate::layout::{implied_field_number, MessageLayout};
use crate::names;
use crate::Error;

pub fn decoding_table_ident(mangled: &str) -> Ident {
    format_ident!("DECODING_TABLE_{}", mangled)
}

pub fn encoding_table_ident(mangled: &str) -> Ident {
    format_ident!("ENCODING_TABLE_{}", mangled)
}

fn find_field(message: &DescriptorProto, number: i32) -> Option<&FieldDescriptorProto> {
    message.field.iter().find(|f| f.number() == number)
}

fn child_decoding_table(field: &FieldDescriptorProto) -> Ident {
    decoding_table_ident(&names::mangle_full_name(
        field.type_name().trim_start_matches('.'),
    ))
}

fn child_encoding_table(field: &FieldDescriptorProto) -> Ident {
    encoding_table_ident(&names::mangle_full_name(
        field.type_name().trim_start_matches('.'),
    ))
}

fn generate_decoding_table(
    message: &DescriptorProto,
    layout: &MessageLayout,
    type_name: &Ident,
) -> Result<TokenStream, Error> {
    let num_masked = layout.num_masked();
    let num_entries = layout.num_decode_entries();
    let num_aux = layout.num_aux();
    let mask = layout.mask();

    // Masked window: the wire kind of the implied field number, or Unknown.
    let masked_kinds = (0..num_masked)
        .map(|slot| {
            let number = implied_field_number(slot);
            match find_field(message, number as i32) {
                Some(field) => classify::wire_kind_tokens(field),
                None => Ok(quote! { prototab::wire::FieldKind::Unknown }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Dense field-number-indexed entries.
    let entries = (0..=layout.max_field_number())
        .map(|number| {
            let Some(field) = find_field(message, number) else {
                return Ok(quote! { prototab::decoding::TableEntry(0) });
            };
            if classify::is_message(field)? {
                let aux_index = layout.aux_index(number).unwrap();
                Ok(quote! {
                    prototab::decoding::TableEntry(
                        (core::mem::offset_of!(
                            prototab::decoding::TableWithEntries<#num_masked, #num_entries, #num_aux>,
                            3
                        ) + #aux_index * core::mem::size_of::<prototab::decoding::AuxTableEntry>()) as u16
                    )
                })
            } else {
                let field_name = names::field_ident(field.name());
                let has_bit_shifted = (layout.has_bit(number).unwrap_or(0) << 10) as u16;
                Ok(quote! {
                    prototab::decoding::TableEntry(
                        core::mem::offset_of!(#type_name, #field_name) as u16 + #has_bit_shifted
                    )
                })
            }
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let aux_entries = message
        .field
        .iter()
        .filter(|f| classify::is_message(f).unwrap_or(false))
        .map(|field| {
            let field_name = names::field_ident(field.name());
            let child_table = child_decoding_table(field);
            quote! {
                prototab::decoding::AuxTableEntry {
                    offset: core::mem::offset_of!(#type_name, #field_name) as u32,
                    child_table: &#child_table.0,
                }
            }
        })
        .collect::<Vec<_>>();

    let table_name = decoding_table_ident(&type_name.to_string());
    Ok(quote! {
        #[allow(non_upper_case_globals, clippy::identity_op)]
        static #table_name: prototab::decoding::TableWithEntries<#num_masked, #num_entries, #num_aux> =
            prototab::decoding::TableWithEntries(
                prototab::decoding::Table {
                    mask: #mask,
                    size: core::mem::size_of::<#type_name>() as u16,
                },
                [#(#masked_kinds,)*],
                [#(#entries,)*],
                [#(#aux_entries,)*],
            );
    })
}

fn generate_encoding_table(
    message: &DescriptorProto,
    layout: &MessageLayout,
    type_name: &Ident,
    syntax: Option<&str>,
) -> Result<TokenStream, Error> {
    let num_entries = message.field.len();
    let num_aux = layout.num_aux();

    let entries = message
        .field
        .iter()
        .map(|field| {
            let number = field.number();
            let has_bit = layout.has_bit(number).unwrap_or(0) as u8;
            let kind = classify::wire_kind_tokens(field)?;
            let encoded_tag = classify::encoded_tag(field, syntax)?;

            if classify::is_message(field)? {
                let aux_index = layout.aux_index(number).unwrap();
                Ok(quote! {
                    prototab::encoding::TableEntry {
                        has_bit: #has_bit,
                        kind: #kind,
                        offset: (core::mem::offset_of!(
                            prototab::encoding::TableWithEntries<#num_entries, #num_aux>,
                            1
                        ) + #aux_index * core::mem::size_of::<prototab::encoding::AuxTableEntry>()) as u16,
                        encoded_tag: #encoded_tag,
                    }
                })
            } else {
                let field_name = names::field_ident(field.name());
                Ok(quote! {
                    prototab::encoding::TableEntry {
                        has_bit: #has_bit,
                        kind: #kind,
                        offset: core::mem::offset_of!(#type_name, #field_name) as u16,
                        encoded_tag: #encoded_tag,
                    }
                })
            }
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let aux_entries = message
        .field
        .iter()
        .filter(|f| classify::is_message(f).unwrap_or(false))
        .map(|field| {
            let field_name = names::field_ident(field.name());
            let child_table = child_encoding_table(field);
            quote! {
                prototab::encoding::AuxTableEntry {
                    offset: core::mem::offset_of!(#type_name, #field_name),
                    child_table: &#child_table.0,
                }
            }
        })
        .collect::<Vec<_>>();

    let table_name = encoding_table_ident(&type_name.to_string());
    Ok(quote! {
        #[allow(non_upper_case_globals, clippy::identity_op)]
        static #table_name: prototab::encoding::TableWithEntries<#num_entries, #num_aux> =
            prototab::encoding::TableWithEntries(
                [#(#entries,)*],
                [#(#aux_entries,)*],
            );
    })
}

/// Both table constants plus the conformance block binding the value type to
/// them.
pub fn generate_tables(
    message: &DescriptorProto,
    layout: &MessageLayout,
    type_name: &Ident,
    syntax: Option<&str>,
) -> Result<TokenStream, Error> {
    let decoding = generate_decoding_table(message, layout, type_name)?;
    let encoding = generate_encoding_table(message, layout, type_name, syntax)?;

    let decoding_name = decoding_table_ident(&type_name.to_string());
    let encoding_name = encoding_table_ident(&type_name.to_string());
    Ok(quote! {
        #decoding
        #encoding

        impl prototab::Protobuf for #type_name {
            fn encoding_table() -> &'static [prototab::encoding::TableEntry] {
                &#encoding_name.0
            }
            fn decoding_table() -> &'static prototab::decoding::Table {
                &#decoding_name.0
            }
        }
    })
}

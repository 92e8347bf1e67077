// Per-file emission: enums, value types with accessors, table constants and
// the trailing descriptor snapshot.
//
// Emission order within a message follows the runtime's expectations: nested
// enums first (structs store them as i32 but accessors name the enum type),
// then the struct, accessors and tables, then nested messages.

use proc_macro2::{Ident, TokenStream};
use prost_types::field_descriptor_proto::Type;
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use quote::{format_ident, quote};

use crate::classify;
use crate::layout::MessageLayout;
use crate::names;
use crate::static_gen;
use crate::tables;
use crate::Error;

/// Token stream for one input file, prologue import through snapshot
/// constant. The banner comment is prepended by the driver after
/// pretty-printing, since comments do not survive a token stream.
pub fn generate_file_tokens(file: &FileDescriptorProto) -> Result<TokenStream, Error> {
    let scope = file.package();
    let syntax = file.syntax.as_deref();

    let mut out = quote! {
        use prototab::Protobuf;
    };
    for enum_type in &file.enum_type {
        out.extend(generate_enum(enum_type, scope)?);
    }
    for message in &file.message_type {
        out.extend(generate_message(message, scope, syntax)?);
    }
    out.extend(static_gen::generate_file_descriptor(file)?);
    Ok(out)
}

fn definition_name<'a>(name: Option<&'a str>, scope: &str) -> Result<&'a str, Error> {
    match name {
        Some(name) if !name.is_empty() => Ok(name),
        _ => Err(Error::MalformedDescriptor(format!(
            "unnamed definition in '{scope}'"
        ))),
    }
}

fn generate_enum(enum_type: &EnumDescriptorProto, scope: &str) -> Result<TokenStream, Error> {
    let full_name = names::scoped_name(scope, definition_name(enum_type.name.as_deref(), scope)?);
    let name = format_ident!("{}", names::mangle_full_name(&full_name));

    // A zero-variant enum cannot carry #[repr(i32)].
    if enum_type.value.is_empty() {
        return Err(Error::MalformedDescriptor(format!(
            "enum '{full_name}' has no values"
        )));
    }
    let variants: Vec<(Ident, i32)> = enum_type
        .value
        .iter()
        .map(|value| {
            let value_name = definition_name(value.name.as_deref(), &full_name)?;
            Ok((format_ident!("{}", value_name), value.number()))
        })
        .collect::<Result<_, Error>>()?;

    let declarations = variants.iter().map(|(ident, number)| {
        quote! { #ident = #number }
    });

    // One arm per distinct number, first declaration wins.
    let mut seen = Vec::new();
    let from_arms = variants.iter().filter_map(|(ident, number)| {
        if seen.contains(number) {
            return None;
        }
        seen.push(*number);
        Some(quote! { #number => Some(#name::#ident), })
    });

    Ok(quote! {
        #[allow(non_camel_case_types)]
        #[repr(i32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum #name {
            #(#declarations,)*
        }

        impl #name {
            pub fn from_i32(value: i32) -> Option<#name> {
                match value {
                    #(#from_arms)*
                    _ => None,
                }
            }
            pub fn to_i32(self) -> i32 {
                self as i32
            }
        }
    })
}

fn generate_message(
    message: &DescriptorProto,
    scope: &str,
    syntax: Option<&str>,
) -> Result<TokenStream, Error> {
    let full_name = names::scoped_name(scope, definition_name(message.name.as_deref(), scope)?);
    let type_name = format_ident!("{}", names::mangle_full_name(&full_name));
    let layout = MessageLayout::plan(message, &full_name)?;

    let mut out = TokenStream::new();
    for enum_type in &message.enum_type {
        out.extend(generate_enum(enum_type, &full_name)?);
    }

    out.extend(generate_struct(message, &layout, &type_name)?);
    out.extend(generate_accessors(message, &layout, &type_name)?);
    out.extend(tables::generate_tables(message, &layout, &type_name, syntax)?);

    for nested in &message.nested_type {
        out.extend(generate_message(nested, &full_name, syntax)?);
    }
    Ok(out)
}

fn generate_struct(
    message: &DescriptorProto,
    layout: &MessageLayout,
    type_name: &Ident,
) -> Result<TokenStream, Error> {
    let presence_words = layout.presence_words();

    let fields = message
        .field
        .iter()
        .map(|field| {
            let name = names::field_ident(field.name());
            let storage = classify::storage_type_tokens(field)?;
            if classify::is_repeated(field) {
                Ok(quote! { pub #name: prototab::containers::RepeatedField<#storage> })
            } else {
                Ok(quote! { pub #name: #storage })
            }
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(quote! {
        #[allow(non_camel_case_types)]
        #[repr(C)]
        #[derive(Debug, Default)]
        pub struct #type_name {
            pub has_bits: [u32; #presence_words],
            #(#fields,)*
        }
    })
}

fn generate_accessors(
    message: &DescriptorProto,
    layout: &MessageLayout,
    type_name: &Ident,
) -> Result<TokenStream, Error> {
    let accessors = message
        .field
        .iter()
        .map(|field| generate_field_accessors(field, layout))
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(quote! {
        impl #type_name {
            #(#accessors)*
        }
    })
}

fn generate_field_accessors(
    field: &FieldDescriptorProto,
    layout: &MessageLayout,
) -> Result<TokenStream, Error> {
    let name = names::field_ident(field.name());
    let getter_mut = format_ident!("{}_mut", names::sanitize_field_name(field.name()));
    let setter = format_ident!("set_{}", names::sanitize_field_name(field.name()));

    if classify::is_repeated(field) {
        if classify::is_message(field)? {
            let child = names::type_ident(field.type_name());
            return Ok(quote! {
                pub fn #name(&self) -> &[prototab::TypedMessage<#child>] {
                    unsafe { core::mem::transmute(self.#name.slice()) }
                }
                pub fn #getter_mut(
                    &mut self,
                ) -> &mut prototab::containers::RepeatedField<prototab::TypedMessage<#child>> {
                    unsafe { core::mem::transmute(&mut self.#name) }
                }
            });
        }
        let storage = classify::storage_type_tokens(field)?;
        return Ok(quote! {
            pub fn #name(&self) -> &[#storage] {
                self.#name.slice()
            }
            pub fn #getter_mut(&mut self) -> &mut prototab::containers::RepeatedField<#storage> {
                &mut self.#name
            }
        });
    }

    let has_bit = layout.has_bit(field.number()).unwrap_or(0) as u32;
    Ok(match classify::field_type(field)? {
        Type::String => quote! {
            pub fn #name(&self) -> &str {
                &self.#name
            }
            pub fn #setter(&mut self, value: &str, arena: &mut prototab::arena::Arena) {
                self.as_object_mut().set_has_bit(#has_bit);
                self.#name.assign(value, arena);
            }
        },
        Type::Bytes => quote! {
            pub fn #name(&self) -> &[u8] {
                &self.#name
            }
            pub fn #setter(&mut self, value: &[u8], arena: &mut prototab::arena::Arena) {
                self.as_object_mut().set_has_bit(#has_bit);
                self.#name.assign(value, arena);
            }
        },
        Type::Message | Type::Group => {
            let child = names::type_ident(field.type_name());
            quote! {
                pub fn #name(&self) -> Option<&#child> {
                    if self.#name.0.is_null() {
                        None
                    } else {
                        Some(unsafe { &*(self.#name.0 as *const #child) })
                    }
                }
                pub fn #getter_mut(&mut self, arena: &mut prototab::arena::Arena) -> &mut #child {
                    if self.#name.0.is_null() {
                        let object = prototab::base::Object::create(
                            core::mem::size_of::<#child>() as u32,
                            arena,
                        );
                        self.#name = prototab::base::Message(object);
                    }
                    unsafe { &mut *(self.#name.0 as *mut #child) }
                }
            }
        }
        Type::Enum => {
            let enum_type = names::type_ident(field.type_name());
            quote! {
                pub fn #name(&self) -> Option<#enum_type> {
                    #enum_type::from_i32(self.#name)
                }
                pub fn #setter(&mut self, value: #enum_type) {
                    self.as_object_mut().set_has_bit(#has_bit);
                    self.#name = value.to_i32();
                }
            }
        }
        _ => {
            let storage = classify::storage_type_tokens(field)?;
            quote! {
                pub fn #name(&self) -> #storage {
                    self.#name
                }
                pub fn #setter(&mut self, value: #storage) {
                    self.as_object_mut().set_has_bit(#has_bit);
                    self.#name = value;
                }
            }
        }
    })
}

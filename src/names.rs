// Descriptor name mangling.
//
// Full names are flattened to a single identifier (`pkg.Sub.Msg` ->
// `pkg_Sub_Msg`) so every generated item lives at file scope. Field names
// pass through untouched unless they collide with a Rust keyword.

use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn", "for",
    "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return",
    "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe", "use", "where",
    "while", "async", "await", "dyn",
];

/// Escape a field name that collides with a Rust keyword by appending an
/// underscore. Raw identifiers are not an option here: `self`, `crate` and
/// `super` have no `r#` form.
pub fn sanitize_field_name(name: &str) -> String {
    if RUST_KEYWORDS.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

pub fn field_ident(name: &str) -> Ident {
    format_ident!("{}", sanitize_field_name(name))
}

/// Flatten a dotted descriptor full name to an identifier.
pub fn mangle_full_name(full_name: &str) -> String {
    full_name.replace('.', "_")
}

/// Resolve a field's `type_name` reference (".pkg.Msg.Nested", with or
/// without the leading dot) to the flat identifier of the generated type.
pub fn type_ident(type_name: &str) -> Ident {
    format_ident!("{}", mangle_full_name(type_name.trim_start_matches('.')))
}

/// Full name of a definition nested under `scope` ("" for file scope with no
/// package).
pub fn scoped_name(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// Path tokens for a bootstrap descriptor value type exposed by the runtime,
/// e.g. "google.protobuf.FileDescriptorProto" ->
/// `prototab::descriptor::google_protobuf_FileDescriptorProto`.
pub fn descriptor_type_path(type_name: &str) -> TokenStream {
    let ident = type_ident(type_name);
    quote! { prototab::descriptor::#ident }
}

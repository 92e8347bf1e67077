//! Code generator for the `prototab` table-driven protobuf runtime.
//!
//! Consumes parsed file descriptors (`prost-types`) and emits, per input
//! file, a Rust source file containing flat value types with explicit
//! presence bits and typed accessors, a masked-tag decoding table and a
//! declaration-ordered encoding table per message, enum conversions, and a
//! static snapshot of the file descriptor itself as bootstrap payload.

use std::io::{self, Write};

use prost::Message as _;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use thiserror::Error as ThisError;

mod classify;
mod generator;
mod layout;
mod names;
mod reflect;
mod static_gen;
mod tables;

/// Generation failures. Errors are never recovered: the first one aborts
/// emission for the current file and the caller discards partial output.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("unsupported field type on '{field}': {reason}")]
    UnsupportedFieldType { field: String, reason: String },

    #[error("field number {number} on '{field}' exceeds the supported maximum of 2047")]
    FieldNumberTooLarge { field: String, number: i32 },

    #[error("message '{message}' needs {count} presence bits, more than a decode entry can address")]
    TooManyPresenceBits { message: String, count: usize },

    #[error("failed to write '{filename}'")]
    Sink {
        filename: String,
        #[source]
        source: io::Error,
    },

    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("emitted code failed to re-parse")]
    Render(#[from] syn::Error),
}

/// Output sinks keyed by filename, supplied by the caller (the plugin
/// transport in a real compiler invocation).
pub trait GeneratorContext {
    fn open(&mut self, filename: &str) -> io::Result<Box<dyn Write>>;
}

/// Output name for an input file: strip `.proto`, append the runtime's
/// source suffix.
pub fn output_filename(input: &str) -> String {
    format!("{}.pc.rs", input.strip_suffix(".proto").unwrap_or(input))
}

/// Render one file descriptor to Rust source.
pub fn generate_file_source(file: &FileDescriptorProto) -> Result<String, Error> {
    let tokens = generator::generate_file_tokens(file)?;
    let syntax_tree = syn::parse2(tokens)?;
    Ok(format!(
        "// Automatically generated from {} by prototab-codegen. Do not edit.\n\n{}",
        file.name(),
        prettyplease::unparse(&syntax_tree)
    ))
}

/// Generate one file and write it through the context.
pub fn generate_file(
    file: &FileDescriptorProto,
    context: &mut dyn GeneratorContext,
) -> Result<(), Error> {
    let filename = output_filename(file.name());
    let source = generate_file_source(file)?;
    let sink_err = |source| Error::Sink {
        filename: filename.clone(),
        source,
    };
    let mut sink = context.open(&filename).map_err(sink_err)?;
    sink.write_all(source.as_bytes()).map_err(sink_err)?;
    sink.flush().map_err(sink_err)
}

/// Generate every file of a descriptor set, one sink per file.
pub fn generate_file_set(
    file_set: &FileDescriptorSet,
    context: &mut dyn GeneratorContext,
) -> Result<(), Error> {
    for file in &file_set.file {
        generate_file(file, context)?;
    }
    Ok(())
}

/// Decode a serialized `FileDescriptorSet` and generate through the context.
pub fn generate_from_bytes(
    descriptor_bytes: &[u8],
    context: &mut dyn GeneratorContext,
) -> Result<(), Error> {
    generate_file_set(&decode_descriptor_set(descriptor_bytes)?, context)
}

/// Decode a serialized `FileDescriptorSet` and return `(filename, source)`
/// pairs without touching any sink.
pub fn generate(descriptor_bytes: &[u8]) -> Result<Vec<(String, String)>, Error> {
    decode_descriptor_set(descriptor_bytes)?
        .file
        .iter()
        .map(|file| Ok((output_filename(file.name()), generate_file_source(file)?)))
        .collect()
}

fn decode_descriptor_set(descriptor_bytes: &[u8]) -> Result<FileDescriptorSet, Error> {
    FileDescriptorSet::decode(descriptor_bytes).map_err(|err| {
        Error::MalformedDescriptor(format!("failed to decode file descriptor set: {err}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingContext;

    impl GeneratorContext for FailingContext {
        fn open(&mut self, _filename: &str) -> io::Result<Box<dyn Write>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "refused"))
        }
    }

    #[test]
    fn output_names_strip_the_proto_suffix() {
        assert_eq!(output_filename("test.proto"), "test.pc.rs");
        assert_eq!(output_filename("dir/test.proto"), "dir/test.pc.rs");
        assert_eq!(output_filename("odd.name"), "odd.name.pc.rs");
    }

    #[test]
    fn sink_failures_carry_the_filename() {
        let file = FileDescriptorProto {
            name: Some("test.proto".to_string()),
            ..Default::default()
        };
        let err = generate_file(&file, &mut FailingContext).unwrap_err();
        match err {
            Error::Sink { filename, .. } => assert_eq!(filename, "test.pc.rs"),
            other => panic!("expected sink failure, got {other}"),
        }
    }

    #[test]
    fn garbage_descriptor_bytes_are_malformed() {
        let err = generate(&[0xFF, 0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, Error::MalformedDescriptor(_)));
    }
}

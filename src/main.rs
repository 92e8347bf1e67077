use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use prototab_codegen::GeneratorContext;

/// Writes each generated file into a target directory.
struct DirContext {
    dir: PathBuf,
}

impl GeneratorContext for DirContext {
    fn open(&mut self, filename: &str) -> io::Result<Box<dyn Write>> {
        let path = self.dir.join(filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(&path)?;
        eprintln!("Generated {}", path.display());
        Ok(Box::new(file))
    }
}

/// Streams every generated file to stdout, ignoring filenames.
struct StdoutContext;

impl GeneratorContext for StdoutContext {
    fn open(&mut self, _filename: &str) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(io::stdout()))
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<_> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        return Ok(());
    }

    // Read descriptor bytes
    let descriptor_bytes = if args[1] == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(&args[1])?
    };

    eprintln!("Read descriptor ({} bytes)", descriptor_bytes.len());

    if args.len() > 2 {
        let mut context = DirContext {
            dir: PathBuf::from(&args[2]),
        };
        prototab_codegen::generate_from_bytes(&descriptor_bytes, &mut context)?;
    } else {
        prototab_codegen::generate_from_bytes(&descriptor_bytes, &mut StdoutContext)?;
    }

    Ok(())
}

fn print_usage(program: &str) {
    eprintln!("Prototab Code Generator");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  {program} <descriptor.pb> [out_dir]");
    eprintln!("  {program} - < descriptor.pb > output.pc.rs");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("  descriptor.pb   FileDescriptorSet from protoc");
    eprintln!("  out_dir         Directory for generated .pc.rs files (default: stdout)");
    eprintln!();
    eprintln!("EXAMPLE:");
    eprintln!("  protoc --descriptor_set_out=desc.pb --include_imports my.proto");
    eprintln!("  {program} desc.pb src/generated");
}

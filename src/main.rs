//! Punto de entrada ("driver").
//!
//! Este módulo expone una CLI sobre el compilador: lee un archivo
//! `.pcl`, reporta diagnósticos y escribe las salidas solicitadas.

use anyhow::{bail, Context};
use clap::{crate_version, Arg, Command};
use picl::output::{Output, OutputOptions};

use std::{
    ffi::OsStr,
    fs::File,
    io::{self, BufReader, Write},
    path::{Path, PathBuf},
};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parsing de CLI
    let args = Command::new("piclc")
        .version(crate_version!())
        .about("PICL compiler for PIC16 microcontrollers")
        .arg(
            Arg::new("dump")
                .short('d')
                .long("dump")
                .help("Dump program memory image to stdout"),
        )
        .arg(
            Arg::new("listing")
                .short('l')
                .long("listing")
                .help("Generate listing file"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .takes_value(true)
                .value_name("FILE")
                .help("Output HEX file (default: <source>.hex)"),
        )
        .arg(
            Arg::new("source")
                .required(true)
                .value_name("SOURCE")
                .help("Source file, must end in .pcl"),
        )
        .get_matches();

    // Se extraen argumentos necesarios
    let source = args.value_of("source").context("Missing source file")?;
    let source = Path::new(source);

    if source.extension() != Some(OsStr::new("pcl")) {
        bail!("Source file must end in .pcl: {}", source.display());
    }

    let output = match args.value_of("output") {
        Some(path) => PathBuf::from(path),
        None => {
            let stem = source
                .file_stem()
                .with_context(|| format!("Bad source path: {}", source.display()))?;

            PathBuf::from(stem).with_extension("hex")
        }
    };

    let file = File::open(source)
        .with_context(|| format!("Failed to open for reading: {}", source.display()))?;

    log::info!("compiling {}", source.display());
    let compilation = picl::compile(BufReader::new(file), source.display().to_string());

    if args.is_present("dump") {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        for (address, word) in compilation.image().into_iter().enumerate() {
            writeln!(stdout, "{:#05x} {:#06x}", address, word).context("Failed to dump image")?;
        }
    }

    if !compilation.succeeded() {
        eprint!("{}", compilation.diagnostics);
    }

    let mut options = OutputOptions::HEX;
    if args.is_present("listing") {
        options |= OutputOptions::LISTING;
    }

    Output::new(&output)
        .write(&compilation, options)
        .with_context(|| format!("Failed to generate output: {}", output.display()))?;

    Ok(())
}

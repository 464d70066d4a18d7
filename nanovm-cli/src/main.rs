#[macro_use]
extern crate clap;

use clap::{Arg, ArgGroup};
use std::path::PathBuf;

use nanovm::vm::{ExitCode, Interpreter};

#[derive(Debug)]
enum Error {
    Assemble(nanovm_asm::AssembleFileError),
    Container(nanovm_container::Error),
    Runtime(nanovm::vm::RuntimeError),
    Io(std::io::Error, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Assemble(err) => write!(f, "assembling input failed: {err}"),
            Error::Container(err) => write!(f, "reading/writing container failed: {err}"),
            Error::Runtime(err) => write!(f, "program execution failed: {err}"),
            Error::Io(err, path) => write!(f, "I/O error on \"{}\": {err}", path.display()),
        }
    }
}

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("SOURCE")
                .help("Assembly source file to assemble and run")
                .index(1),
        )
        .arg(
            Arg::with_name("image")
                .short("i")
                .long("image")
                .takes_value(true)
                .value_name("IMAGE")
                .help("Runs a previously assembled .nvm container instead of assembling source"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Writes the assembled container to this path"),
        )
        .arg(
            Arg::with_name("memory")
                .short("m")
                .long("memory")
                .takes_value(true)
                .value_name("CHUNK_SIZE")
                .default_value("1024")
                .help("Sets the virtual machine's memory chunk size, in bytes"),
        )
        .arg(
            Arg::with_name("no_run")
                .long("no-run")
                .help("Assembles (and optionally writes) the program without executing it"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Enables tracing output; repeat for more detail"),
        )
        .group(ArgGroup::with_name("input").args(&["SOURCE", "image"]).required(true))
        .get_matches();

    install_tracing(matches.occurrences_of("verbose"));

    let chunk_size = value_t!(matches.value_of("memory"), u64).unwrap_or_else(|e| e.exit());

    let result = run(
        matches.value_of("SOURCE"),
        matches.value_of("image"),
        matches.value_of("output"),
        matches.is_present("no_run"),
        chunk_size,
    );

    match result {
        Ok(Some(exit_code)) => {
            println!("exit: {exit_code:?}");
        }
        Ok(None) => {}
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn install_tracing(verbosity: u64) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();
}

fn run(
    source: Option<&str>,
    image: Option<&str>,
    output: Option<&str>,
    no_run: bool,
    chunk_size: u64,
) -> Result<Option<ExitCode>, Error> {
    let container = match (source, image) {
        (Some(source_path), None) => {
            let program = nanovm_asm::assemble_file(source_path).map_err(Error::Assemble)?;
            tracing::info!(
                bytes = program.payload.len(),
                entry_point = program.entry_point,
                "assembled program"
            );
            let container = nanovm_container::Container::new(
                program.payload,
                program.base_addr,
                program.entry_point,
            );
            if let Some(output_path) = output {
                nanovm_container::write_file(output_path, &container).map_err(Error::Container)?;
            }
            container
        }
        (None, Some(image_path)) => {
            nanovm_container::read_file(image_path).map_err(Error::Container)?
        }
        _ => unreachable!("clap's ArgGroup guarantees exactly one of SOURCE/image is present"),
    };

    if no_run {
        return Ok(None);
    }

    let mut interpreter = Interpreter::new(chunk_size);
    interpreter.memory.load(container.load_offset(), container.payload());
    interpreter.set_ip(container.entry_point());

    let exit_code = interpreter.run().map_err(Error::Runtime)?;
    Ok(Some(exit_code))
}

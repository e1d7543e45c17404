use std::{path::PathBuf, process::ExitCode};

use clap::Parser;

use mochavm::runtime::{
    class_loader::bootstrap::{self, DirSource, JarSource},
    interpreter, thread,
};

/// Minimal JVM: loads classes from the given classpath entries and runs the
/// main class.
#[derive(Parser, Debug)]
#[command(name = "mocha", version, about)]
struct Args {
    /// Classpath entries: directories or .jar files, searched in order.
    #[arg(short = 'c', long = "classpath", value_delimiter = ':')]
    classpath: Vec<PathBuf>,

    /// Binary name of the class whose main method to run, dots or slashes.
    main_class: String,

    /// Arguments passed through to the guest main method.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    for entry in &args.classpath {
        if entry.extension().is_some_and(|ext| ext == "jar") {
            match JarSource::open(entry) {
                Ok(source) => bootstrap::add_source(Box::new(source)),
                Err(error) => {
                    eprintln!("mocha: cannot open {}: {error}", entry.display());
                    return ExitCode::FAILURE;
                }
            }
        } else {
            bootstrap::add_source(Box::new(DirSource::new(entry)));
        }
    }

    let main_class = args.main_class.replace('.', "/");
    match interpreter::invoke_main(&main_class, &args.args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(exception) => {
            interpreter::report_uncaught(&thread::current(), exception);
            ExitCode::FAILURE
        }
    }
}

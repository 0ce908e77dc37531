use argh::FromArgs;
use cekscheme::Interpreter;
use cekscheme::eval::TraceType;
use cekscheme::repl::{Flow, repl, run_file};
use std::path::PathBuf;

#[derive(FromArgs)]
/// A Scheme interpreter with proper tail calls and first-class continuations
struct Args {
    /// exit after running the files, do not enter the REPL
    #[argh(switch, short = 'q')]
    quit: bool,
    /// machine trace level: off, control or full (logged at debug level)
    #[argh(option, short = 't', default = "String::from(\"off\")")]
    trace: String,
    /// scheme source files to run in order
    #[argh(positional)]
    files: Vec<PathBuf>,
}

fn main() {
    env_logger::init();
    let args: Args = argh::from_env();
    let mut interp = Interpreter::new();

    match TraceType::from_name(&args.trace) {
        Some(level) => interp.set_trace(level),
        None => {
            eprintln!("unknown trace level '{}'; expected off, control or full", args.trace);
            std::process::exit(2);
        }
    }

    let mut stdout = std::io::stdout();
    for path in &args.files {
        match run_file(&mut interp, path, &mut stdout) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => return,
            Err(e) => {
                eprintln!("{} -- {} (LoadError)", e, path.display());
                std::process::exit(1);
            }
        }
    }

    if args.quit {
        return;
    }

    println!("cekscheme interpreter; (quit) or Ctrl-D to leave");
    if let Err(e) = repl(&mut interp) {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

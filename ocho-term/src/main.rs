//! Entrypoint for the terminal frontend.
use std::{env, error::Error, fs};

use log::info;
use ocho::{prelude::*, Hz};

mod keymap;
mod term;

use keymap::KeyBindings;
use term::TermDevices;

static USAGE: &str = r#"
usage: ocho CMD FILE [KEYMAP]

commands:
    run     Run the target ROM file, with an optional key bindings file
    dis     Disassemble the target ROM into a readable listing

examples:
    ocho run breakout.rom
    ocho run breakout.rom keymap.yaml
    ocho dis breakout.rom
"#;

/// Instruction dispatch rate, in instructions per second.
const CLOCK_FREQUENCY: Hz = Hz(500_000);

fn run_rom(filepath: &str, keymap: Option<String>) -> Result<(), Box<dyn Error>> {
    let rom = fs::read(filepath)?;

    let bindings = match keymap {
        Some(path) => KeyBindings::from_file(&path)?,
        None => KeyBindings::default(),
    };

    let mut vm = Chip8Vm::new(Chip8Conf {
        clock_frequency: Some(CLOCK_FREQUENCY),
    });
    vm.load_rom(&rom)?;

    info!("running {filepath}");

    // Raw mode and the alternate screen stay active until the guard drops.
    let mut devices = TermDevices::new(bindings)?;
    vm.run(&mut devices)?;

    Ok(())
}

fn disassemble(filepath: &str) -> Result<(), Box<dyn Error>> {
    let rom = fs::read(filepath)?;

    let mut buf = String::new();
    Disassembler::new(&rom).disassemble(&mut buf)?;
    println!("{buf}");

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init()?;

    match parse_args() {
        Some(Cmd::Run { filepath, keymap }) => run_rom(&filepath, keymap)?,
        Some(Cmd::Dis { filepath }) => disassemble(&filepath)?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next()?.as_str() {
        "run" => Some(Cmd::Run {
            filepath: args.next()?,
            keymap: args.next(),
        }),
        "dis" => Some(Cmd::Dis {
            filepath: args.next()?,
        }),
        _ => None,
    }
}

fn print_usage() {
    println!("ocho v{}", env!("CARGO_PKG_VERSION"));
    println!("{USAGE}");
}

enum Cmd {
    /// Run a ROM file
    Run {
        filepath: String,
        keymap: Option<String>,
    },
    /// Disassemble a ROM file
    Dis { filepath: String },
}

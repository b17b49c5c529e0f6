//!
//! Command-line front end: assembles a file, runs it and prints whatever the program sends
//! to the serial port. The exit code is the value left in r2.
//!

use niosim::config::Config;
use niosim::parser;
use niosim::simulator::{Event, RunOutcome, Simulator};
use owo_colors::OwoColorize;

use std::error::Error;
use std::io::Write;
use std::thread;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::get()?;
    let source = std::fs::read_to_string(&config.file)
        .map_err(|e| format!("Can't open <{}>: {}", config.file, e))?;

    let program = match parser::assemble(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{} in {}:\n{}", "error".bright_red().bold(), config.file, e);
            std::process::exit(1);
        }
    };

    let entry = match &config.entry {
        Some(name) => match program.global(name) {
            Ok(address) => address,
            Err(e) => {
                eprintln!("{}: {}", "error".bright_red().bold(), e);
                std::process::exit(1);
            }
        },
        None => program.start(),
    };

    let mut sim = Simulator::new();
    sim.load_with_entry(&program, entry)?;

    if config.print_instructions {
        for i in 0..program.len() as u32 {
            let address = program.start() + i * 4;
            match sim.disassemble(address) {
                Ok(instruction) => println!("{:#010x}  {}", address, instruction),
                Err(e) => println!("{:#010x}  {}", address, e),
            }
        }
    }

    // Serial output is printed by its own thread, so the simulator never waits on stdout
    let events = sim.subscribe();
    let printer = thread::Builder::new()
        .name("niosim serial".into())
        .spawn(move || {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for event in events {
                match event {
                    Event::SerialOutput(c) => {
                        let _ = out.write_all(&[c]);
                        let _ = out.flush();
                    }
                    Event::Halted { .. } => break,
                    _ => {}
                }
            }
        })?;

    config.input.bytes().for_each(|c| sim.feed_serial_input(c));

    let start_time = std::time::Instant::now();
    let result = match config.max_steps {
        Some(limit) => sim.run_with_limit(limit).map(Some),
        None => sim.run().map(|_| None),
    };

    // Dropping the simulator closes the channel, so the printer always finishes
    let exit_code: i32 = sim.register(2);
    if config.print_state {
        sim.print_state();
    }
    drop(sim);
    let _ = printer.join();

    match result {
        Ok(Some(RunOutcome::LimitReached)) => {
            eprintln!(
                "\n{} instruction limit reached",
                "warning:".bright_yellow().bold()
            );
        }
        Ok(_) => {
            tracing::info!(elapsed_ms = start_time.elapsed().as_millis() as u64, "Finished");
        }
        Err(e) => {
            eprintln!("\n{}", e);
            std::process::exit(1);
        }
    }

    std::process::exit(exit_code);
}

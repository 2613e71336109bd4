use cinder_runtime::runtime::{RunConfig, Runtime};
use clap::Parser;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "cindervm", version, about = "Cinder bytecode virtual machine")]
struct Cli {
    /// Bytecode file to execute
    file: PathBuf,

    /// Trace instruction dispatch
    #[arg(short = 'd', long)]
    debug: bool,

    /// Print execution statistics on exit
    #[arg(short = 's', long)]
    stats: bool,

    /// Print a bytecode listing and exit
    #[arg(long)]
    disassemble: bool,

    /// Dump the stack after execution
    #[arg(long)]
    dump_stack: bool,

    /// Dump static memory after execution
    #[arg(long)]
    dump_memory: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.disassemble {
        match Runtime::disassemble_file(&cli.file) {
            Ok(listing) => print!("{}", listing),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let config = RunConfig::new()
        .with_debug(cli.debug)
        .with_stats(cli.stats)
        .with_dump_stack(cli.dump_stack)
        .with_dump_memory(cli.dump_memory);

    if let Err(e) = Runtime::with_config(config).execute_file(&cli.file) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

use anyhow::{bail, Context, Result};
use cinder_compiler::codegen::CodeGenerator;
use cinder_compiler::lexer::Lexer;
use cinder_compiler::parser::Parser as CinderParser;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(
    name = "cinderc",
    version,
    about = "Cinder compiler: C++-like source to stack-VM bytecode"
)]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Output bytecode file (defaults to the input with an .ash extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the token stream as JSON to stdout and exit
    #[arg(long)]
    dump_tokens: bool,

    /// Print the AST and exit
    #[arg(long)]
    dump_ast: bool,

    /// Print the label table and a bytecode listing after compiling
    #[arg(long)]
    dump_bytecode: bool,

    /// Print token statistics
    #[arg(long)]
    stats: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let filename = cli.input.display().to_string();

    let mut lexer = Lexer::new(&source, &filename);
    let tokens = lexer.tokenize();

    if cli.stats {
        let stats = Lexer::statistics(&tokens);
        let mut entries: Vec<_> = stats.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        println!("Token statistics for {}:", filename);
        for (kind, count) in entries {
            println!("  {:<20} {}", format!("{:?}", kind), count);
        }
    }

    if cli.dump_tokens {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
        return Ok(());
    }

    if lexer.has_errors() {
        bail!("lexical errors in {}", filename);
    }

    let program = CinderParser::new(tokens).parse_program()?;

    if cli.dump_ast {
        print!("{}", program.dump());
        return Ok(());
    }

    let mut generator = CodeGenerator::new();
    let compiled = generator.generate(&program);

    if cli.dump_bytecode {
        print!("{}", generator.dump_bytecode());
    }
    if generator.had_errors() {
        bail!("code generation failed for {}", filename);
    }

    let output = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension("ash"));
    compiled
        .save_to_file(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Wrote {} ({} bytes of code, {} strings)",
        output.display(),
        compiled.code.len(),
        compiled.strings.len()
    );
    Ok(())
}

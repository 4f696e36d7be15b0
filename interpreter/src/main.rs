use anyhow::{Context, Result};
use clap::Parser;

use std::path::PathBuf;

#[cfg(feature = "dev")]
mod debugger;
mod logger;

/// runs when no script is given
const DEMO: &str = r#"-- functions are values, so print can be stored and shadowed
i = print
do
  print = "Hello"
  print = print .. " World!"
end
i(print)
"#;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// script to run, a small demo when omitted
    script: Option<PathBuf>,

    /// abort after this many instructions
    #[arg(long)]
    max_steps: Option<u64>,

    /// -v for debug output, -vv for traces of every stage
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[cfg(feature = "dev")]
    #[arg(short = 't', long)]
    show_tokens: bool,

    #[cfg(feature = "dev")]
    #[arg(short = 'a', long)]
    show_ast: bool,

    #[cfg(feature = "dev")]
    #[arg(short = 'b', long)]
    show_bytecode: bool,

    #[cfg(feature = "dev")]
    #[arg(short = 'd', long)]
    debug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose)?;
    let src = match &cli.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => DEMO.to_string(),
    };

    #[cfg(feature = "dev")]
    if cli.show_tokens {
        for token in minilua_lib::lexer::tokenize(&src)? {
            println!("{token}");
        }
        return Ok(());
    }

    let mut script = minilua_lib::compile(&src).context("loading the script")?;
    script.vm.set_step_limit(cli.max_steps);

    #[cfg(feature = "dev")]
    {
        if cli.show_ast {
            print!("{}", script.ast);
            return Ok(());
        }
        if cli.show_bytecode {
            print!("{}", script.vm.show_program());
            print!("{}", script.vm.show_symbols());
            return Ok(());
        }
        if cli.debug {
            use crossterm::{self as ct, terminal};
            let mut stdout = std::io::stdout();
            ct::execute!(stdout, terminal::EnterAlternateScreen)?;
            let res = debugger::run(&mut script.vm, &src, &mut stdout);
            ct::execute!(stdout, terminal::LeaveAlternateScreen)?;
            return res;
        }
    }

    if let Err(e) = script.run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

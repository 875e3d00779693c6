use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

mod assemble;
mod catalog;
mod gerbers;
mod prompt;

#[derive(Parser)]
#[command(name = "pcbzip")]
#[command(about = "Package KiCad gerber and assembly files for PCB manufacturers", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true, hide = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Zip the gerber and drill files for a manufacturer
    #[command(alias = "z")]
    Zip(gerbers::ZipArgs),

    /// View a gerber zip file in gerbv or gerbview
    #[command(alias = "v")]
    View(gerbers::ViewArgs),

    /// Assign supplier part numbers to a BOM and collect the assembly files
    #[command(alias = "a")]
    Assemble(assemble::AssembleArgs),

    /// Manage and search the local supplier parts catalog
    #[command(alias = "c")]
    Catalog(catalog::CatalogArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Default level depends on --debug, RUST_LOG overrides both
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    match cli.command {
        Commands::Zip(args) => gerbers::execute_zip(args),
        Commands::View(args) => gerbers::execute_view(args),
        Commands::Assemble(args) => assemble::execute(args),
        Commands::Catalog(args) => catalog::execute(args),
    }
}

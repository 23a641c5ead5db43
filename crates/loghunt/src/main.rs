use clap::Parser;
use loghunt::runtime::{boot, cli::Cli, run};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let cli = Cli::parse();
    let (dispatcher, config) = boot::boot(cli.config.as_deref())?;
    let stdout = std::io::stdout();
    run::run(cli.command, dispatcher, &config, &mut stdout.lock())
}

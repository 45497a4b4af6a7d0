use anyhow::Result;

use imgshift::cli::{self, args::Cli};

fn main() -> Result<()> {
    // Load .env before parsing so clap sees its variables too
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    cli::init_logging(cli.verbose, cli.debug);

    // Uploads run one at a time; current_thread is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(cli::run(cli))
}

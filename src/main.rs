use clap::Parser;
use tower_lsp::{LspService, Server};
use tracing_subscriber::EnvFilter;

use avrasm_lsp::{
    cli::{self, Cli, Command},
    server::Backend,
};

fn init_logging() {
    // stdout carries the LSP stream
    let filter = EnvFilter::try_from_env("AVRASM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Cli::parse();

    let output = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let stdin = tokio::io::stdin();
            let stdout = tokio::io::stdout();

            let (service, socket) = LspService::new(Backend::new);
            Server::new(stdin, stdout, socket).serve(service).await;
            return Ok(());
        }
        Command::Symbols { file } => cli::symbols(&file)?,
        Command::Index { pack, root } => cli::index(&pack, root)?,
        Command::Lookup { symbol, pack } => cli::lookup(&symbol, &pack)?,
    };

    println!("{output}");
    Ok(())
}

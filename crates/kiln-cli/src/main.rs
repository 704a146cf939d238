//! kiln - package resolution CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kiln_cli::cmd;
use kiln_cli::ui::ConsoleReporter;
use kiln_cli::{Cli, Commands, RedirectCommands};
use kiln_core::ResolveOptions;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cache_dir = cli.cache_dir.as_deref();
    let reporter = ConsoleReporter::new(cli.quiet);

    match cli.command {
        Commands::Resolve {
            module,
            platform,
            source_only,
            binary_only,
            force,
            no_safe_resolve,
            hard_links,
            redirects,
        } => {
            let options = ResolveOptions {
                source_only,
                binary_only,
                force_upgrade: force,
                safe_resolve: !no_safe_resolve,
                hard_links,
            };
            cmd::resolve::resolve(&module, &platform, options, &redirects, cache_dir, reporter)
                .await
        }
        Commands::Pack {
            dir,
            output,
            filter,
            format,
        } => cmd::pack::pack(&dir, &output, filter.as_deref(), &format, &reporter),
        Commands::Unpack {
            archive,
            dest,
            hard_links,
        } => cmd::unpack::unpack(&archive, &dest, hard_links, &reporter),
        Commands::Lookup {
            uri,
            platform,
            prefer_cache,
        } => cmd::lookup::lookup(&uri, &platform, prefer_cache, cache_dir, &reporter).await,
        Commands::Redirect { command } => match command {
            RedirectCommands::Add {
                original,
                replacement,
            } => cmd::redirect::add(&original, &replacement, cache_dir, &reporter),
            RedirectCommands::List => cmd::redirect::list(cache_dir),
        },
        Commands::CachePath => cmd::cache_path::cache_path(cache_dir),
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}

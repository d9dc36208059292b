//! Point d'entrée CLI pour catastro-bq

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Charger les bâtiments INSPIRE du cadastre espagnol dans BigQuery
#[derive(Parser)]
#[command(name = "catastro-bq")]
#[command(author, version)]
#[command(about = "Charger les bâtiments INSPIRE du cadastre espagnol dans BigQuery ou en CSV")]
#[command(long_about = "Télécharge les bâtiments INSPIRE du cadastre (flux ATOM), convertit chaque fichier GML en table CSV \
(géométrie GeoJSON en WGS84 + attributs), la dépose dans Cloud Storage et l'ajoute à BigQuery.\n\n\
Utilisez 'to-csv' pour convertir des fichiers locaux sans accès au cloud.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match &cli.command {
        Commands::Load(args) => {
            info!(offices = ?args.office, paths = ?args.path, config = %args.config, "Chargement dans BigQuery");
            cli::cmd_load(args)?;
        }
        Commands::ToCsv(args) => {
            info!(paths = ?args.path, output = %args.output.display(), "Export vers CSV");
            cli::cmd_to_csv(args)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}

use clap::{Parser, Subcommand};
use pixid_fixer::config::Config;
use pixid_fixer::invoice::two_decimals;
use pixid_fixer::processor::{self, FixOutcome};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pixid-fixer",
    version,
    about = "Correction automatique des factures XML PIXID lors des semaines à cheval sur deux mois"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "PIXID_FIXER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the analysis of an invoice as JSON
    Analyze { file: PathBuf },
    /// Write a corrected invoice (and report) when an inconsistency is found
    Fix {
        file: PathBuf,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        #[arg(long)]
        no_report: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    // init tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_filter));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    match cli.command {
        Command::Analyze { file } => {
            let analysis = processor::analyze_file(&file)?;
            println!("{}", serde_json::to_string_pretty(&analysis.summary())?);
        }
        Command::Fix {
            file,
            output_dir,
            no_report,
        } => {
            if let Some(dir) = output_dir {
                cfg.output_dir = dir;
            }
            if no_report {
                cfg.write_report = false;
            }

            match processor::fix_file(&file, &cfg)? {
                FixOutcome::Consistent(analysis) => {
                    println!("✅ Facture cohérente ({})", analysis.invoice_id);
                }
                FixOutcome::Uncorrectable(analysis) => {
                    println!("⚠️  {}", analysis.issue_message.trim_start_matches(" | "));
                    println!("❌ Montants corrigés hors limites, aucune correction écrite");
                }
                FixOutcome::Corrected(result) => {
                    let a = &result.analysis;
                    let c = &result.correction;
                    println!("⚠️  {}", a.issue_message.trim_start_matches(" | "));
                    println!("\nAvant correction :");
                    println!("- Heures : {}h", two_decimals(a.invoice_hours));
                    println!("- Montant HT : {} €", two_decimals(a.total_charges));
                    println!("- TVA : {} €", two_decimals(a.total_tax));
                    println!("- TTC : {} €", two_decimals(a.total_amount));
                    println!("\nAprès correction :");
                    println!("- Heures : {}h", two_decimals(c.hours));
                    println!("- Montant HT : {} €", two_decimals(c.total_charges));
                    println!("- TVA : {} €", two_decimals(c.total_tax));
                    println!("- TTC : {} €", two_decimals(c.total_amount));

                    println!("\nValidation :");
                    for (label, ok) in result.verification.checks() {
                        println!("- {label} : {}", if ok { "✅" } else { "❌" });
                    }

                    println!("\n📥 {}", result.xml_path.display());
                    if let Some(report) = &result.report_path {
                        println!("📊 {}", report.display());
                    }
                }
            }
        }
    }

    info!("Done");
    Ok(())
}

use anyhow::{Context, Result};
use badge_qualifier::app::ports::HttpClientPort;
use badge_qualifier::config::{Config, DEFAULT_CONFIG_PATH};
use badge_qualifier::infra::http_client::ReqwestHttp;
use badge_qualifier::logging::{self, DEFAULT_LOG_DIR};
use badge_qualifier::observability::metrics;
use badge_qualifier::pipeline::processing::badge_dates::{collect_badge_dates, load_progress};
use badge_qualifier::pipeline::processing::enrich::ProfileEnricher;
use badge_qualifier::pipeline::Pipeline;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "badge_qualifier")]
#[command(about = "Qualify event registrations against Skills Boost public profiles")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file; missing file means built-in defaults
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory for the rotating JSON log
    #[arg(long, global = true, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every registration and write the enriched report
    Analyze {
        /// Registration export
        #[arg(long, default_value = "data.csv")]
        input: PathBuf,
        /// Enriched report
        #[arg(long, default_value = "full_analysis_results.csv")]
        output: PathBuf,
        /// Canonical organization domain (overrides config and environment)
        #[arg(long)]
        domain: Option<String>,
        /// Expected account creation year (overrides config and environment)
        #[arg(long)]
        target_year: Option<i32>,
        /// Also write the summary as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
        /// Also write qualified rows in bulk-import format
        #[arg(long)]
        import_out: Option<PathBuf>,
    },
    /// Build the per-badge earned-date table from a progress export
    Badges {
        #[arg(long, default_value = "progress.csv")]
        input: PathBuf,
        #[arg(long, default_value = "badge_dates.csv")]
        output: PathBuf,
    },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    config.apply_env().context("reading QUALIFIER_* environment")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(&cli.log_dir);
    if let Err(e) = metrics::init() {
        warn!("Metrics disabled: {}", e);
    }

    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Analyze {
            input,
            output,
            domain,
            target_year,
            summary_json,
            import_out,
        } => {
            if domain.is_some() {
                config.organization.canonical_domain = domain;
            }
            if target_year.is_some() {
                config.organization.target_year = target_year;
            }
            let ctx = config.into_run_context().context("invalid configuration")?;
            info!(
                domain = %ctx.canonical_domain,
                target_year = ctx.target_year,
                "Starting analysis of {}",
                input.display()
            );
            println!("🔍 Analyzing {}...", input.display());

            let http: Arc<dyn HttpClientPort> = Arc::new(
                ReqwestHttp::new(ctx.enrichment.timeout, &ctx.enrichment.user_agent)
                    .context("building HTTP client")?,
            );
            let enricher = Arc::new(ProfileEnricher::from_settings(&ctx.enrichment, http));
            let pipeline = Pipeline::new(ctx, enricher);

            let report = pipeline
                .run_file(&input)
                .await
                .with_context(|| format!("loading registrations from {}", input.display()))?;

            report
                .write_csv_to_path(&output)
                .with_context(|| format!("writing report to {}", output.display()))?;
            report.print_summary();
            println!("\n✅ Results saved to {}", output.display());

            if let Some(path) = summary_json {
                report
                    .write_summary_json(&path)
                    .with_context(|| format!("writing summary to {}", path.display()))?;
                println!("📊 Summary saved to {}", path.display());
            }
            if let Some(path) = import_out {
                let file = File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                let written = report.write_import_candidates(file)?;
                println!("📥 {} import candidates saved to {}", written, path.display());
            }
        }
        Commands::Badges { input, output } => {
            let settings = config.enrichment_settings().context("invalid configuration")?;
            let tracked = config.tracked_badges();
            println!("🏅 Loading {}...", input.display());

            let file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
            let rows = load_progress(file)?;

            let http: Arc<dyn HttpClientPort> = Arc::new(
                ReqwestHttp::new(settings.timeout, &settings.user_agent)
                    .context("building HTTP client")?,
            );
            let enricher = Arc::new(ProfileEnricher::from_settings(&settings, http));
            let table = collect_badge_dates(rows, &tracked, &enricher).await;

            let out = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
            table.write_csv(out)?;
            println!("\n✅ Results saved to {}", output.display());
            table.print_summary();
        }
    }
    Ok(())
}

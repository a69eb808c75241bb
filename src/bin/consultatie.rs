//! Consultatie CLI: collect consultations and responses, find campaigns.
//!
//! Usage:
//!   consultatie consultations [--save-html]
//!   consultatie responses <slug> [--no-attachments] [--threshold 0.4]
//!   consultatie components <slug>
//!   consultatie export <slug> > responses.jsonl
//!   consultatie summary <slug>
//!   consultatie list

use clap::{Parser, Subcommand};
use consultatie::similarity::component_sizes;
use consultatie::{
    CancellationToken, ClusterConfig, Collector, ConsultationOptions, ConsultationSlug, HarvestConfig,
    HttpAttachmentResolver, OpenStore, PortalSource, RecordStore, ResponseOptions, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "consultatie",
    version,
    about = "Incremental collector for public consultation responses"
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a YAML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect metadata of closed consultations
    Consultations {
        /// Archive each consultation page as HTML
        #[arg(long)]
        save_html: bool,
        /// Directory for archived pages
        #[arg(long)]
        html_dir: Option<PathBuf>,
    },
    /// Collect the responses to one consultation
    Responses {
        /// Consultation slug (first path segment of its URL)
        slug: String,
        /// Keep respondents' names
        #[arg(long)]
        include_author_name: bool,
        /// Do not save attachment files
        #[arg(long)]
        no_attachments: bool,
        /// Do not extract attachment text
        #[arg(long)]
        no_extract: bool,
        /// Skip clustering after collection
        #[arg(long)]
        no_components: bool,
        /// Tokens per shingle
        #[arg(long)]
        shingle_size: Option<usize>,
        /// Jaccard similarity threshold in [0, 1]
        #[arg(long)]
        threshold: Option<f64>,
        /// Directory for downloaded attachments
        #[arg(long)]
        attachments_dir: Option<PathBuf>,
    },
    /// Recluster the stored responses of a consultation
    Components {
        slug: String,
        #[arg(long)]
        shingle_size: Option<usize>,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Print stored responses as JSON lines
    Export { slug: String },
    /// Print component sizes, largest first
    Summary { slug: String },
    /// List stored consultations
    List,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_settings(cli: &Cli) -> Result<HarvestConfig, String> {
    let mut settings = match &cli.config {
        Some(path) => HarvestConfig::load(path),
        None => HarvestConfig::discover(),
    }
    .map_err(|e| e.to_string())?;
    if let Some(db) = &cli.db {
        settings.db_path = Some(db.clone());
    }
    Ok(settings)
}

fn open_store(settings: &HarvestConfig) -> Result<Arc<SqliteStore>, String> {
    let store = SqliteStore::open(settings.db_path()).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(store))
}

fn build_collector(settings: &HarvestConfig, store: Arc<SqliteStore>) -> Result<Collector, String> {
    let source = PortalSource::new(&settings.base_url, settings.timeout(), &settings.user_agent)
        .map_err(|e| format!("Invalid portal settings: {}", e))?
        .with_request_delay(settings.request_delay());
    let resolver = HttpAttachmentResolver::new(settings.timeout(), &settings.user_agent)
        .map_err(|e| format!("Invalid portal settings: {}", e))?;
    Ok(Collector::new(store, Arc::new(source), Arc::new(resolver)))
}

/// Cluster settings with CLI overrides applied
fn cluster_config(
    settings: &HarvestConfig,
    shingle_size: Option<usize>,
    threshold: Option<f64>,
) -> Result<ClusterConfig, String> {
    let mut settings = settings.clone();
    if let Some(n) = shingle_size {
        settings.shingle_size = n;
    }
    if let Some(t) = threshold {
        settings.similarity_threshold = t;
    }
    settings.cluster_config().map_err(|e| e.to_string())
}

/// Cancel collection on Ctrl-C; committed records stay stored
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted; finishing the current record");
            handle.cancel();
        }
    });
    token
}

async fn cmd_consultations(settings: &HarvestConfig, save_html: bool, html_dir: Option<PathBuf>) -> Result<(), String> {
    let store = open_store(settings)?;
    let collector = build_collector(settings, store)?
        .with_html_dir(html_dir.unwrap_or_else(|| settings.html_dir()))
        .with_cancellation(cancel_on_ctrl_c());

    let report = collector
        .collect_consultations(&ConsultationOptions { save_html })
        .await
        .map_err(|e| e.to_string())?;
    println!("Consultations: {}", report);
    Ok(())
}

async fn cmd_responses(settings: &HarvestConfig, slug: &str, options: ResponseOptions, attachments_dir: Option<PathBuf>) -> Result<(), String> {
    let store = open_store(settings)?;
    let collector = build_collector(settings, store)?
        .with_attachments_dir(attachments_dir.unwrap_or_else(|| settings.attachments_dir()))
        .with_cancellation(cancel_on_ctrl_c());

    let report = collector
        .collect_responses(&ConsultationSlug::new(slug), &options)
        .await
        .map_err(|e| e.to_string())?;
    println!("Responses to '{}': {}", slug, report);
    Ok(())
}

fn cmd_components(settings: &HarvestConfig, slug: &str, config: &ClusterConfig) -> Result<(), String> {
    let store = open_store(settings)?;
    let collector = build_collector(settings, store)?;
    let count = collector
        .recluster(&ConsultationSlug::new(slug), config)
        .map_err(|e| e.to_string())?;
    println!("'{}': {} components", slug, count);
    Ok(())
}

fn cmd_export(settings: &HarvestConfig, slug: &str) -> Result<(), String> {
    let store = open_store(settings)?;
    let records = store
        .load_responses(&ConsultationSlug::new(slug))
        .map_err(|e| e.to_string())?;
    for record in &records {
        let line = serde_json::to_string(record).map_err(|e| e.to_string())?;
        println!("{}", line);
    }
    Ok(())
}

fn cmd_summary(settings: &HarvestConfig, slug: &str) -> Result<(), String> {
    let store = open_store(settings)?;
    let records = store
        .load_responses(&ConsultationSlug::new(slug))
        .map_err(|e| e.to_string())?;
    if records.is_empty() {
        println!("No responses stored for '{}'.", slug);
        return Ok(());
    }

    let sizes = component_sizes(&records);
    let unlabeled = records.iter().filter(|r| r.component.is_none()).count();
    println!("{:>9}  {:>9}", "COMPONENT", "RESPONSES");
    println!("{}", "-".repeat(20));
    for (label, size) in &sizes {
        println!("{:>9}  {:>9}", label, size);
    }
    println!(
        "{} responses, {} components, {} unlabeled",
        records.len(),
        sizes.len(),
        unlabeled
    );
    Ok(())
}

fn cmd_list(settings: &HarvestConfig) -> Result<(), String> {
    let store = open_store(settings)?;
    let consultations = store.load_consultations().map_err(|e| e.to_string())?;
    if consultations.is_empty() {
        println!("No consultations stored.");
        return Ok(());
    }
    println!("{:<40}  {:>7}  {:>8}  {}", "SLUG", "STORED", "REPORTED", "TITLE");
    println!("{}", "-".repeat(96));
    for consultation in consultations {
        let stored = store
            .count_responses(&consultation.slug)
            .map_err(|e| e.to_string())?;
        println!(
            "{:<40}  {:>7}  {:>8}  {}",
            consultation.slug, stored, consultation.response_count, consultation.title
        );
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), String> {
    let settings = load_settings(&cli)?;
    match cli.command {
        Commands::Consultations { save_html, html_dir } => cmd_consultations(&settings, save_html, html_dir).await,
        Commands::Responses {
            slug,
            include_author_name,
            no_attachments,
            no_extract,
            no_components,
            shingle_size,
            threshold,
            attachments_dir,
        } => {
            let options = ResponseOptions {
                include_author_name,
                download_attachments: !no_attachments,
                extract_attachment_text: !no_extract,
                detect_components: !no_components,
                cluster: cluster_config(&settings, shingle_size, threshold)?,
            };
            cmd_responses(&settings, &slug, options, attachments_dir).await
        }
        Commands::Components {
            slug,
            shingle_size,
            threshold,
        } => cmd_components(&settings, &slug, &cluster_config(&settings, shingle_size, threshold)?),
        Commands::Export { slug } => cmd_export(&settings, &slug),
        Commands::Summary { slug } => cmd_summary(&settings, &slug),
        Commands::List => cmd_list(&settings),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };
    std::process::exit(code);
}

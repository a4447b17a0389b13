//! CLI binary for content-archiver.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ArchiveOptions` / `CrawlConfig` and prints run summaries.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use content_archiver::convert::{default_document_output, default_web_output};
use content_archiver::crawl::urls::resolve_start_url;
use content_archiver::{
    document_to_file, harvest_to_file, inspect, ArchiveOptions, ContentMode, CrawlConfig, GroupDisplay,
    HarvestProgressCallback, ProgressCallback, RunReport, WebGrouping,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the page phase, reused for the
/// image phase, with a log line per scraped or skipped page.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Checking robots.txt…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, prefix: &'static str, unit: &str) {
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  ⏱ {{elapsed_precise}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.reset_eta();
    }
}

impl HarvestProgressCallback for CliProgressCallback {
    fn on_crawl_start(&self, start_url: &str, max_pages: usize) {
        self.activate_bar(max_pages, "Crawling", "pages");
        self.bar
            .println(format!("{} {}", cyan("◆"), bold(&format!("Crawling {start_url}…"))));
    }

    fn on_page_scraped(&self, url: &str, pages_done: usize, max_pages: usize) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            pages_done,
            max_pages,
            url
        ));
        self.bar.set_position(pages_done as u64);
    }

    fn on_page_skipped(&self, url: &str, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        let reason = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar
            .println(format!("  {} {}  {}", red("✗"), url, dim(&reason)));
    }

    fn on_images_start(&self, total_images: usize) {
        self.activate_bar(total_images, "Images", "images");
    }

    fn on_image_done(&self, done: usize, _total: usize, _success: bool) {
        self.bar.set_position(done as u64);
    }

    fn on_harvest_complete(&self, pages_scraped: usize, images_stored: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped.load(Ordering::SeqCst);
        eprintln!(
            "{} {} pages, {} images{}",
            if skipped == 0 { green("✔") } else { cyan("⚠") },
            bold(&pages_scraped.to_string()),
            bold(&images_stored.to_string()),
            if skipped == 0 {
                String::new()
            } else {
                format!("  ({} skipped)", red(&skipped.to_string()))
            }
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Structure an extracted document dump
  archiver document guide.json -o guide_archive.zip --name "Museum Guide"

  # Crawl a site (depth 1, up to 20 pages) into example.com_archive.zip
  archiver web example.com

  # Deeper crawl, one category per URL section
  archiver web https://example.com/tours --depth 2 --max-pages 50 --grouping url-path

  # Check an archive before importing it
  archiver inspect example.com_archive.zip

ENVIRONMENT VARIABLES:
  RUST_LOG                   Override the log filter (e.g. content_archiver=debug)
  ARCHIVER_OUTPUT            Default output path
  ARCHIVER_LANGUAGE          Default original language
  ARCHIVER_USER_AGENT        User-Agent for crawling
"#;

/// Structure documents and website crawls into project archives.
#[derive(Parser, Debug)]
#[command(
    name = "archiver",
    version,
    about = "Structure documents and website crawls into project archives",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ARCHIVER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ARCHIVER_QUIET")]
    quiet: bool,

    /// Print the run report (or validation report) as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Structure a JSON block dump into an archive.
    Document {
        /// Path to the block dump.
        input: PathBuf,

        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Crawl a website into an archive.
    Web {
        /// Start URL; a bare host gets `https://`.
        url: String,

        #[command(flatten)]
        crawl: CrawlArgs,

        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Read an archive back and validate it.
    Inspect {
        /// Path to the ZIP archive.
        archive: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ArchiveArgs {
    /// Write the archive here. Default: `<name>_archive.zip`.
    #[arg(short, long, env = "ARCHIVER_OUTPUT")]
    output: Option<PathBuf>,

    /// Project name. Default: first page title or file stem.
    #[arg(long)]
    name: Option<String>,

    /// Original language code.
    #[arg(long, env = "ARCHIVER_LANGUAGE", default_value = "en")]
    language: String,

    /// Content layout.
    #[arg(long, value_enum, default_value = "list")]
    content_mode: ContentModeArg,

    /// Force grouping on or off. Default: on when there is more than one category.
    #[arg(long)]
    grouped: Option<bool>,

    /// How groups are shown.
    #[arg(long, value_enum, default_value = "expanded")]
    group_display: GroupDisplayArg,
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Link depth below the start page (1–3).
    #[arg(long, env = "ARCHIVER_DEPTH", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..=3))]
    depth: u32,

    /// Maximum pages to collect (1–100).
    #[arg(long, env = "ARCHIVER_MAX_PAGES", default_value_t = 20,
          value_parser = clap::value_parser!(u32).range(1..=100))]
    max_pages: u32,

    /// Follow links to other domains too.
    #[arg(long)]
    allow_external: bool,

    /// Seconds between requests to the same origin.
    #[arg(long, env = "ARCHIVER_DELAY", default_value_t = 1.0)]
    delay: f64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "ARCHIVER_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Concurrent image downloads.
    #[arg(long, env = "ARCHIVER_IMAGE_CONCURRENCY", default_value_t = 4)]
    image_concurrency: usize,

    /// User-Agent header, also matched against robots.txt.
    #[arg(long, env = "ARCHIVER_USER_AGENT")]
    user_agent: Option<String>,

    /// How pages become categories.
    #[arg(long, value_enum, default_value = "headings")]
    grouping: GroupingArg,

    /// Disable progress bar.
    #[arg(long, env = "ARCHIVER_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ContentModeArg {
    Single,
    List,
    Grid,
    Cards,
}

impl From<ContentModeArg> for ContentMode {
    fn from(v: ContentModeArg) -> Self {
        match v {
            ContentModeArg::Single => ContentMode::Single,
            ContentModeArg::List => ContentMode::List,
            ContentModeArg::Grid => ContentMode::Grid,
            ContentModeArg::Cards => ContentMode::Cards,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum GroupDisplayArg {
    Expanded,
    Collapsed,
}

impl From<GroupDisplayArg> for GroupDisplay {
    fn from(v: GroupDisplayArg) -> Self {
        match v {
            GroupDisplayArg::Expanded => GroupDisplay::Expanded,
            GroupDisplayArg::Collapsed => GroupDisplay::Collapsed,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum GroupingArg {
    Headings,
    UrlPath,
}

impl From<GroupingArg> for WebGrouping {
    fn from(v: GroupingArg) -> Self {
        match v {
            GroupingArg::Headings => WebGrouping::Headings,
            GroupingArg::UrlPath => WebGrouping::UrlPath,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would fight with the progress bar; keep errors only
    // while it is shown.
    let show_progress = matches!(&cli.command, Command::Web { crawl, .. } if !crawl.no_progress)
        && !cli.quiet
        && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Document { input, archive } => {
            let options = build_options(archive)?;
            let output = archive
                .output
                .clone()
                .unwrap_or_else(|| default_document_output(input));
            let report = document_to_file(input, &output, &options)
                .await
                .context("Document conversion failed")?;
            finish(&cli, &report, &output)
        }

        Command::Web { url, crawl, archive } => {
            let start = resolve_start_url(url).context("Invalid start URL")?;
            let options = build_options(archive)?;
            let output = archive.output.clone().unwrap_or_else(|| default_web_output(&start));

            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn HarvestProgressCallback>)
            } else {
                None
            };
            let cancel = Arc::new(AtomicBool::new(false));
            spawn_ctrl_c_handler(Arc::clone(&cancel), cli.quiet);

            let config = build_crawl_config(crawl, progress, cancel)?;
            let report = harvest_to_file(start.as_str(), &output, &config, &options)
                .await
                .context("Harvest failed")?;
            finish(&cli, &report, &output)
        }

        Command::Inspect { archive } => {
            let (parsed, report) =
                inspect(archive).with_context(|| format!("Failed to read {}", archive.display()))?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?
                );
            } else {
                let card = &parsed.manifest.card;
                println!("Archive:      {}", archive.display());
                println!("Project:      {}", card.name);
                println!("Exported at:  {}", parsed.manifest.exported_at);
                println!("Language:     {}", card.original_language);
                println!("Content mode: {}", card.content_mode);
                println!("Grouped:      {}", card.is_grouped);
                println!("Categories:   {}", parsed.category_count());
                println!("Items:        {}", parsed.item_count());
                println!("Images:       {}", parsed.images.len());
                for w in &report.warnings {
                    println!("{} {}", cyan("⚠"), w);
                }
                for e in &report.errors {
                    println!("{} {}", red("✗"), e);
                }
            }
            if !report.is_valid() {
                anyhow::bail!("{} validation errors", report.errors.len());
            }
            Ok(())
        }
    }
}

/// Raise `cancel` on the first Ctrl-C; the crawl stops at the next page.
fn spawn_ctrl_c_handler(cancel: Arc<AtomicBool>, quiet: bool) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            if !quiet {
                eprintln!("{} Cancelling after the current page…", cyan("⚠"));
            }
            cancel.store(true, Ordering::SeqCst);
        }
    });
}

fn finish(cli: &Cli, report: &RunReport, output: &std::path::Path) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        eprint!("{}", report.summary());
        eprintln!("{}  →  {}", green("✔"), bold(&output.display().to_string()));
    }
    Ok(())
}

/// Map CLI args to `ArchiveOptions`.
fn build_options(args: &ArchiveArgs) -> Result<ArchiveOptions> {
    let mut builder = ArchiveOptions::builder()
        .language(args.language.clone())
        .content_mode(args.content_mode.into())
        .group_display(args.group_display.into());
    if let Some(ref name) = args.name {
        builder = builder.name(name.clone());
    }
    if let Some(grouped) = args.grouped {
        builder = builder.grouped(grouped);
    }
    builder.build().context("Invalid archive options")
}

/// Map CLI args to `CrawlConfig`.
fn build_crawl_config(
    args: &CrawlArgs,
    progress: Option<ProgressCallback>,
    cancel: Arc<AtomicBool>,
) -> Result<CrawlConfig> {
    let mut builder = CrawlConfig::builder()
        .max_depth(args.depth as usize)
        .max_pages(args.max_pages as usize)
        .same_domain_only(!args.allow_external)
        .delay_secs(args.delay)
        .request_timeout_secs(args.timeout)
        .image_concurrency(args.image_concurrency)
        .grouping(args.grouping.into())
        .cancel_flag(cancel);
    if let Some(ref agent) = args.user_agent {
        builder = builder.user_agent(agent.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid crawl configuration")
}

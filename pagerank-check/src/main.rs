//! PageRank Check CLI Application
//!
//! A command-line interface for batch lookups of checkpagerank.net domain
//! metrics. This CLI application provides a user-friendly interface to the
//! pagerank-check-lib library.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use console::Term;
use pagerank_check_lib::{
    dedup_domains, load_domains_from_file, load_env_config, parse_timeout_string, BatchConfig,
    BatchJob, BatchReport, CheckPageRankClient, ConfigManager, DelayPolicy, EnvConfig, FileConfig,
    PageRankError, DEFAULT_MAX_DELAY_SECS, DEFAULT_MIN_DELAY_SECS, MIN_SAFE_DELAY_SECS,
};
use std::io::BufRead;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Batches estimated to run longer than this ask for confirmation on a TTY.
const CONFIRM_THRESHOLD: Duration = Duration::from_secs(10 * 60);

/// CLI arguments for pagerank-check
#[derive(Parser, Debug)]
#[command(name = "pagerank-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fetch domain authority metrics from checkpagerank.net")]
#[command(
    long_about = "Fetch domain authority metrics from checkpagerank.net for a list of domains.\n\nLookups are spaced at least 30 seconds apart to stay under the service's rate limit; slow lookups overlap with later dispatches."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domains or URLs to look up
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Input file with domains (one per line, # starts a comment)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub file: Option<String>,

    /// Reduce each entry to its first-level domain (www.amazon.co.uk/x -> amazon.co.uk)
    #[arg(short = 'n', long = "normalize", help_heading = "Domain Selection")]
    pub normalize: bool,

    /// Fixed delay between lookups in seconds (minimum 30)
    #[arg(long = "delay", value_name = "SECS", help_heading = "Pacing")]
    pub delay: Option<u64>,

    /// Lower bound of the randomized delay in seconds (default 35)
    #[arg(long = "min-delay", value_name = "SECS", help_heading = "Pacing")]
    pub min_delay: Option<u64>,

    /// Upper bound (exclusive) of the randomized delay in seconds (default 60)
    #[arg(long = "max-delay", value_name = "SECS", help_heading = "Pacing")]
    pub max_delay: Option<u64>,

    /// Request timeout for each lookup (e.g. "20s", "1m")
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Pacing")]
    pub timeout: Option<String>,

    /// Write each result to JSON as soon as it arrives
    #[arg(long = "dump", help_heading = "Output")]
    pub dump: bool,

    /// Root directory for incremental JSON dumps
    #[arg(
        short = 'o',
        long = "output-dir",
        value_name = "DIR",
        help_heading = "Output"
    )]
    pub output_dir: Option<String>,

    /// Keep the raw HTML of every response
    #[arg(long = "save-html", help_heading = "Output")]
    pub save_html: bool,

    /// Print the batch report as JSON
    #[arg(short = 'j', long = "json", help_heading = "Output")]
    pub json: bool,

    /// Show the dispatch plan and estimated runtime without making requests
    #[arg(long = "dry-run", help_heading = "Output")]
    pub dry_run: bool,

    /// Skip the confirmation prompt for long batches
    #[arg(long = "yes", short = 'y', help_heading = "Output")]
    pub yes: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show debug logging and per-result details
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args);

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "pagerank-check starting");

    if let Err(e) = run_pagerank_check(args).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the flag-derived level.
fn init_logging(args: &Args) {
    let default = log_level(args);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn log_level(args: &Args) -> &'static str {
    if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    }
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    // Must have either domains or a file
    if args.domains.is_empty() && args.file.is_none() && std::env::var_os("PRC_FILE").is_none() {
        return Err("You must specify domain names or a file with --file".to_string());
    }

    if let Some(delay) = args.delay {
        if delay < MIN_SAFE_DELAY_SECS {
            return Err(format!(
                "Delay must be at least {} seconds, got {}",
                MIN_SAFE_DELAY_SECS, delay
            ));
        }
        if args.min_delay.is_some() || args.max_delay.is_some() {
            return Err("Cannot combine --delay with --min-delay or --max-delay".to_string());
        }
    }

    if let Some(min_delay) = args.min_delay {
        if min_delay < MIN_SAFE_DELAY_SECS {
            return Err(format!(
                "Minimum delay must be at least {} seconds, got {}",
                MIN_SAFE_DELAY_SECS, min_delay
            ));
        }
    }

    if let (Some(min_delay), Some(max_delay)) = (args.min_delay, args.max_delay) {
        if max_delay <= min_delay {
            return Err("--max-delay must be greater than --min-delay".to_string());
        }
    }

    if let Some(timeout) = &args.timeout {
        if parse_timeout_string(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use format like '20s' or '1m'",
                timeout
            ));
        }
    }

    Ok(())
}

/// Main batch logic
async fn run_pagerank_check(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let env_config = load_env_config();

    // Build configuration from config files, environment and CLI args
    let config = build_config(&args, &env_config)?;
    let json = args.json || env_config.json.unwrap_or(false);

    let domains = get_domains_to_check(&args, &env_config)?;
    debug!(count = domains.len(), "collected domain inputs");

    let fetcher = Arc::new(CheckPageRankClient::with_config(&config)?);
    let mut job = BatchJob::new(&domains, &config, fetcher)?;

    // Dry-run: print the plan and exit without any requests
    if args.dry_run {
        return display_plan(&job, json);
    }

    if job.pending_len() == 0 {
        return Err(PageRankError::EmptyBatch.into());
    }

    // Interactive confirmation for long runs (TTY only)
    if job.estimated_runtime() > CONFIRM_THRESHOLD && !args.yes {
        let term = Term::stderr();
        if term.is_term() && !confirm_long_run(&job)? {
            eprintln!("Aborted.");
            return Ok(());
        }
    }

    if !json {
        ui::print_header(
            job.pending_len(),
            job.estimated_runtime(),
            job.policy(),
            job.incremental_dump(),
        );
    }

    // Spinner::start returns None if stderr isn't a TTY.
    let spinner = if json {
        None
    } else {
        ui::Spinner::start(format!(
            "Fetching {} domain{} (about {})...",
            job.pending_len(),
            if job.pending_len() == 1 { "" } else { "s" },
            ui::format_duration(job.estimated_runtime())
        ))
    };

    let outcome = job.process().await;

    // Stop spinner before printing results
    if let Some(s) = spinner {
        s.stop().await;
    }

    let report = outcome?;
    display_report(&report, json, args.debug)?;

    Ok(())
}

fn confirm_long_run(job: &BatchJob) -> Result<bool, Box<dyn std::error::Error>> {
    eprint!(
        "Will look up {} domains (~{}). Proceed? [Y/n] ",
        job.pending_len(),
        ui::format_duration(job.estimated_runtime())
    );
    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;
    let answer = input.trim().to_lowercase();
    Ok(answer != "n" && answer != "no")
}

/// Build BatchConfig from CLI arguments with config file integration.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments (explicit user input)
/// 2. Environment variables (PRC_*)
/// 3. Local config file (./pagerank-check.toml)
/// 4. Global config file (~/.pagerank-check.toml)
/// 5. XDG config file (~/.config/pagerank-check/config.toml)
/// 6. Built-in defaults
fn build_config(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<BatchConfig, Box<dyn std::error::Error>> {
    let mut config = BatchConfig::default();

    let config_manager = ConfigManager::new(args.verbose);

    // Step 1: Determine config file path and load config files
    let explicit_path = args.config.as_ref().or(env_config.config.as_ref());
    if let Some(path) = explicit_path {
        info!(path = %path, "using explicit config file");

        let file_config = config_manager
            .load_file(path)
            .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?;

        config = merge_file_config_into_batch_config(config, file_config)?;
    } else {
        let file_config = config_manager.discover_and_load()?;
        config = merge_file_config_into_batch_config(config, file_config)?;
    }

    // Step 2: Apply environment variables (PRC_*)
    config = apply_environment_config(config, env_config)?;

    // Step 3: Apply CLI arguments (highest precedence)
    config = apply_cli_args_to_config(config, args)?;

    Ok(config)
}

/// Merge FileConfig into BatchConfig
fn merge_file_config_into_batch_config(
    mut config: BatchConfig,
    file_config: FileConfig,
) -> Result<BatchConfig, PageRankError> {
    if let Some(defaults) = file_config.defaults {
        config.delay = resolve_delay(
            &config.delay,
            defaults.delay,
            defaults.min_delay,
            defaults.max_delay,
        )?;

        if let Some(normalize) = defaults.normalize {
            config.normalize = normalize;
        }
        if let Some(incremental_dump) = defaults.incremental_dump {
            config.incremental_dump = incremental_dump;
        }
        if let Some(output_dir) = defaults.output_dir {
            config.output_dir = output_dir.into();
        }
        if let Some(save_html) = defaults.save_html {
            config.save_html = save_html;
        }
        if let Some(html_dir) = defaults.html_dir {
            config.html_dir = html_dir.into();
        }
        if let Some(secs) = defaults.timeout.as_deref().and_then(parse_timeout_string) {
            config.timeout = Duration::from_secs(secs);
        }
    }

    if let Some(service) = file_config.service {
        if let Some(endpoint) = service.endpoint {
            config.endpoint = endpoint;
        }
        if let Some(referer) = service.referer {
            config.referer = referer;
        }
    }

    Ok(config)
}

/// Apply PRC_* environment variables to config.
///
/// Values were already validated by the library's load_env_config().
fn apply_environment_config(
    mut config: BatchConfig,
    env_config: &EnvConfig,
) -> Result<BatchConfig, PageRankError> {
    config.delay = resolve_delay(
        &config.delay,
        env_config.delay,
        env_config.min_delay,
        env_config.max_delay,
    )?;

    if let Some(normalize) = env_config.normalize {
        config.normalize = normalize;
    }
    if let Some(dump) = env_config.dump {
        config.incremental_dump = dump;
    }
    if let Some(output_dir) = &env_config.output_dir {
        config.output_dir = output_dir.into();
    }
    if let Some(save_html) = env_config.save_html {
        config.save_html = save_html;
    }
    if let Some(secs) = env_config.timeout.as_deref().and_then(parse_timeout_string) {
        config.timeout = Duration::from_secs(secs);
    }

    Ok(config)
}

/// Apply CLI arguments to config (highest precedence).
///
/// Boolean flags only ever switch a setting on; without them the value from
/// the environment or config file stands.
fn apply_cli_args_to_config(
    mut config: BatchConfig,
    args: &Args,
) -> Result<BatchConfig, PageRankError> {
    config.delay = resolve_delay(&config.delay, args.delay, args.min_delay, args.max_delay)?;

    if args.normalize {
        config.normalize = true;
    }
    if args.dump {
        config.incremental_dump = true;
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.into();
    }
    if args.save_html {
        config.save_html = true;
    }
    if let Some(secs) = args.timeout.as_deref().and_then(parse_timeout_string) {
        config.timeout = Duration::from_secs(secs);
    }

    Ok(config)
}

/// Layer one source's delay settings over the current policy.
///
/// A fixed delay replaces everything. Either random bound alone keeps the
/// other bound from the current random policy (or the default range).
fn resolve_delay(
    current: &DelayPolicy,
    fixed: Option<u64>,
    min_delay: Option<u64>,
    max_delay: Option<u64>,
) -> Result<DelayPolicy, PageRankError> {
    if let Some(secs) = fixed {
        return DelayPolicy::fixed(secs);
    }
    if min_delay.is_none() && max_delay.is_none() {
        return Ok(current.clone());
    }

    let (current_min, current_max) = match *current {
        DelayPolicy::Random { min_secs, max_secs } => (min_secs, max_secs),
        DelayPolicy::Fixed { .. } => (DEFAULT_MIN_DELAY_SECS, DEFAULT_MAX_DELAY_SECS),
    };
    DelayPolicy::random(
        min_delay.unwrap_or(current_min),
        max_delay.unwrap_or(current_max),
    )
}

/// Get the list of domains to check from CLI args, environment, or file
fn get_domains_to_check(
    args: &Args,
    env_config: &EnvConfig,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut inputs = args.domains.clone();

    if let Some(cli_file) = &args.file {
        info!(path = %cli_file, "reading domains from file (--file)");
        inputs.extend(load_domains_from_file(cli_file)?);
    } else if let Some(env_file) = &env_config.file {
        info!(path = %env_file, "reading domains from file (PRC_FILE)");
        inputs.extend(load_domains_from_file(env_file)?);
    }

    let domains = dedup_domains(inputs);
    if domains.is_empty() {
        return Err("No valid domains found to check".into());
    }

    Ok(domains)
}

/// Print the dispatch plan for --dry-run
fn display_plan(job: &BatchJob, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let plan = job.plan();

    if json {
        let output = serde_json::json!({
            "domains": job.pending(),
            "dispatches": plan,
            "estimated_runtime_secs": job.estimated_runtime().as_secs(),
            "rejected": job.rejected(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        ui::print_plan(&plan, job.rejected());
    }

    eprintln!(
        "{} domain{} would be checked (estimated runtime {})",
        job.pending_len(),
        if job.pending_len() == 1 { "" } else { "s" },
        ui::format_duration(job.estimated_runtime())
    );
    Ok(())
}

/// Display the batch report in the selected format
fn display_report(
    report: &BatchReport,
    json: bool,
    debug: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        ui::print_report(report, debug);
        println!();
        ui::print_summary(report);
    }
    Ok(())
}

// pagerank-check/src/main.rs tests module

#[cfg(test)]
mod tests {
    use super::*;

    // Helper function with all required fields
    fn create_test_args() -> Args {
        Args {
            domains: vec![], // Empty domains for testing
            file: None,
            normalize: false,
            delay: None,
            min_delay: None,
            max_delay: None,
            timeout: None,
            dump: false,
            output_dir: None,
            save_html: false,
            json: false,
            dry_run: false,
            yes: false,
            config: None,
            debug: false,
            verbose: false,
        }
    }

    fn args_with_domain() -> Args {
        let mut args = create_test_args();
        args.domains = vec!["amazon.co.uk".to_string()];
        args
    }

    #[test]
    fn test_validate_args_requires_input() {
        let mut args = create_test_args();
        args.file = None;
        if std::env::var_os("PRC_FILE").is_none() {
            assert!(validate_args(&args).is_err());
        }

        args.file = Some("domains.txt".to_string());
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_short_delay_rejected() {
        let mut args = args_with_domain();
        args.delay = Some(10);
        let err = validate_args(&args).unwrap_err();
        assert!(err.contains("at least 30 seconds"));

        args.delay = Some(30);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_delay_conflicts_with_range() {
        let mut args = args_with_domain();
        args.delay = Some(45);
        args.min_delay = Some(35);
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_random_bounds() {
        let mut args = args_with_domain();
        args.min_delay = Some(20);
        assert!(validate_args(&args).is_err());

        args.min_delay = Some(50);
        args.max_delay = Some(50);
        assert!(validate_args(&args).is_err());

        args.max_delay = Some(80);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_timeout_format() {
        let mut args = args_with_domain();
        args.timeout = Some("soon".to_string());
        assert!(validate_args(&args).is_err());

        args.timeout = Some("45s".to_string());
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_log_level_from_flags() {
        let mut args = create_test_args();
        assert_eq!(log_level(&args), "warn");
        args.verbose = true;
        assert_eq!(log_level(&args), "info");
        args.debug = true;
        assert_eq!(log_level(&args), "debug");
    }

    #[test]
    fn test_resolve_delay_layers() {
        let default = DelayPolicy::default();

        // Nothing set keeps the current policy
        assert_eq!(resolve_delay(&default, None, None, None).unwrap(), default);

        // Fixed replaces everything
        assert_eq!(
            resolve_delay(&default, Some(40), None, None).unwrap(),
            DelayPolicy::Fixed { secs: 40 }
        );

        // One bound keeps the other
        assert_eq!(
            resolve_delay(&default, None, None, Some(90)).unwrap(),
            DelayPolicy::Random {
                min_secs: DEFAULT_MIN_DELAY_SECS,
                max_secs: 90
            }
        );

        // A bound overriding a fixed policy starts from the default range
        let fixed = DelayPolicy::Fixed { secs: 45 };
        assert_eq!(
            resolve_delay(&fixed, None, Some(40), None).unwrap(),
            DelayPolicy::Random {
                min_secs: 40,
                max_secs: DEFAULT_MAX_DELAY_SECS
            }
        );

        // Invalid combinations surface as configuration errors
        assert!(resolve_delay(&default, None, Some(70), None).is_err());
    }

    #[test]
    fn test_file_config_applied() {
        let file_config = FileConfig {
            defaults: Some(pagerank_check_lib::DefaultsConfig {
                delay: Some(45),
                normalize: Some(true),
                output_dir: Some("dumps".to_string()),
                timeout: Some("1m".to_string()),
                ..Default::default()
            }),
            service: Some(pagerank_check_lib::ServiceConfig {
                referer: Some("https://duckduckgo.com/".to_string()),
                ..Default::default()
            }),
        };

        let config =
            merge_file_config_into_batch_config(BatchConfig::default(), file_config).unwrap();

        assert_eq!(config.delay, DelayPolicy::Fixed { secs: 45 });
        assert!(config.normalize);
        assert_eq!(config.output_dir, std::path::PathBuf::from("dumps"));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.referer, "https://duckduckgo.com/");
    }

    #[test]
    fn test_env_overrides_file_and_cli_overrides_env() {
        let file_config = FileConfig {
            defaults: Some(pagerank_check_lib::DefaultsConfig {
                delay: Some(45),
                output_dir: Some("from-file".to_string()),
                ..Default::default()
            }),
            service: None,
        };
        let config =
            merge_file_config_into_batch_config(BatchConfig::default(), file_config).unwrap();

        let env_config = EnvConfig {
            delay: Some(50),
            output_dir: Some("from-env".to_string()),
            ..Default::default()
        };
        let config = apply_environment_config(config, &env_config).unwrap();
        assert_eq!(config.delay, DelayPolicy::Fixed { secs: 50 });
        assert_eq!(config.output_dir, std::path::PathBuf::from("from-env"));

        let mut args = args_with_domain();
        args.delay = Some(60);
        args.dump = true;
        let config = apply_cli_args_to_config(config, &args).unwrap();
        assert_eq!(config.delay, DelayPolicy::Fixed { secs: 60 });
        assert!(config.incremental_dump);
        assert_eq!(config.output_dir, std::path::PathBuf::from("from-env"));
    }

    #[test]
    fn test_unset_cli_flags_do_not_override() {
        let mut config = BatchConfig::default();
        config.normalize = true;
        config.save_html = true;

        let args = args_with_domain();
        let config = apply_cli_args_to_config(config, &args).unwrap();

        assert!(config.normalize);
        assert!(config.save_html);
    }

    #[test]
    fn test_get_domains_merges_file_and_args() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wikipedia.org").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "amazon.co.uk").unwrap();
        file.flush().unwrap();

        let mut args = args_with_domain();
        args.file = Some(file.path().to_string_lossy().into_owned());

        let domains = get_domains_to_check(&args, &EnvConfig::default()).unwrap();
        assert_eq!(domains, vec!["amazon.co.uk", "wikipedia.org"]);
    }
}

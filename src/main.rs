use anyhow::Result;
use bookshelf_search::config::{
    default_config_toml, find_config_file, get_config, load_config, save_config,
};
use bookshelf_search::models::{
    Book, SearchKind, SearchQuery, SearchReport, SortOrder, SourceId, SourceSelection,
    DEFAULT_MAX_RESULTS,
};
use bookshelf_search::{Config, SearchAggregator};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bookshelf Search - Find books across Google Books, NDL Search and Rakuten Books
#[derive(Parser, Debug)]
#[command(name = "bookshelf-search")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "hongkongkiwi")]
#[command(about = "Search Google Books, NDL Search and Rakuten Books from one place", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

/// Catalogs that can be selected on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceArg {
    #[value(name = "all", alias = "both")]
    All,
    #[value(name = "google_books", alias = "google")]
    GoogleBooks,
    #[value(name = "ndl")]
    Ndl,
    #[value(name = "rakuten")]
    Rakuten,
}

impl From<SourceArg> for SourceSelection {
    fn from(source: SourceArg) -> Self {
        match source {
            SourceArg::All => SourceSelection::All,
            SourceArg::GoogleBooks => SourceSelection::Only(SourceId::GoogleBooks),
            SourceArg::Ndl => SourceSelection::Only(SourceId::Ndl),
            SourceArg::Rakuten => SourceSelection::Only(SourceId::Rakuten),
        }
    }
}

/// Result ordering
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortArg {
    /// Newest publication date first
    Newest,
    /// Catalog relevance, sources in configured order
    Relevance,
}

impl From<SortArg> for SortOrder {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Newest => SortOrder::Newest,
            SortArg::Relevance => SortOrder::Relevance,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search books by title
    #[command(alias = "t")]
    Title {
        /// Title to search for
        term: String,

        /// Source to search
        #[arg(long, short, value_enum, default_value_t = SourceArg::All)]
        source: SourceArg,

        /// Maximum number of results across all sources
        #[arg(long, short, default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,

        /// Result ordering
        #[arg(long, value_enum, default_value_t = SortArg::Newest)]
        sort: SortArg,
    },

    /// Search books by author
    #[command(alias = "a")]
    Author {
        /// Author name to search for
        term: String,

        /// Source to search
        #[arg(long, short, value_enum, default_value_t = SourceArg::All)]
        source: SourceArg,

        /// Maximum number of results across all sources
        #[arg(long, short, default_value_t = DEFAULT_MAX_RESULTS)]
        max_results: usize,

        /// Result ordering
        #[arg(long, value_enum, default_value_t = SortArg::Newest)]
        sort: SortArg,
    },

    /// Look up a single book by ISBN-10 or ISBN-13
    Isbn {
        /// ISBN, hyphens allowed
        isbn: String,

        /// Source to query (default: try each source in ISBN order)
        #[arg(long, short, value_enum, default_value_t = SourceArg::All)]
        source: SourceArg,
    },

    /// List configured sources and their capabilities
    Sources {
        /// Show capabilities and page size limits
        #[arg(long)]
        detailed: bool,
    },

    /// Print the default configuration, or write it to a file
    Config {
        /// Write the configuration to this path instead of printing it
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration from file if specified or found in default locations
    let (config, config_path) = if let Some(path) = &cli.config {
        (load_config(path)?, Some(path.clone()))
    } else if let Some(path) = find_config_file() {
        (load_config(&path)?, Some(path))
    } else {
        (get_config()?, None)
    };

    init_tracing(&cli, &config);

    if let Some(path) = &config_path {
        tracing::debug!("Using config file: {}", path.display());
    }

    match &cli.command {
        Commands::Title {
            term,
            source,
            max_results,
            sort,
        } => {
            run_search(&cli, &config, SearchKind::Title, term, *source, *max_results, *sort)
                .await?;
        }

        Commands::Author {
            term,
            source,
            max_results,
            sort,
        } => {
            run_search(&cli, &config, SearchKind::Author, term, *source, *max_results, *sort)
                .await?;
        }

        Commands::Isbn { isbn, source } => {
            let aggregator = SearchAggregator::from_config(&config)?;
            match aggregator.fetch_by_isbn(isbn, (*source).into()).await {
                Ok(Some(book)) => output_books(&[book], cli.output)?,
                Ok(None) => {
                    if !cli.quiet {
                        eprintln!("No book found for ISBN {}", isbn);
                    }
                }
                Err(e) => anyhow::bail!("ISBN lookup failed: {}", e),
            }
        }

        Commands::Sources { detailed } => {
            let aggregator = SearchAggregator::from_config(&config)?;
            let registry = aggregator.registry();

            if registry.is_empty() {
                println!("No sources configured");
            }

            for src in registry.all() {
                if *detailed {
                    println!("{} ({})", src.name(), src.id());
                    println!("  Capabilities: {:?}", src.capabilities());
                    println!("  Max page size: {}", src.max_page_size());
                    println!(
                        "  Native sort: {}",
                        if src.supports_native_sort() {
                            "yes"
                        } else {
                            "no (sorted locally)"
                        }
                    );
                } else {
                    println!("{} - {}", src.id(), src.name());
                }
            }

            #[cfg(feature = "source-rakuten")]
            if registry.get("rakuten").is_none() && !cli.quiet {
                eprintln!("Rakuten Books is disabled: set RAKUTEN_APPLICATION_ID to enable it");
            }
        }

        Commands::Config { write } => match write {
            Some(path) => {
                save_config(&Config::default(), path)?;
                if !cli.quiet {
                    eprintln!("Wrote default configuration to {}", path.display());
                }
            }
            None => print!("{}", default_config_toml()?),
        },
    }

    Ok(())
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("bookshelf_search={}", level)),
    );

    let json = config
        .logging
        .format
        .as_deref()
        .is_some_and(|f| f.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run_search(
    cli: &Cli,
    config: &Config,
    kind: SearchKind,
    term: &str,
    source: SourceArg,
    max_results: usize,
    sort: SortArg,
) -> Result<()> {
    let aggregator = SearchAggregator::from_config(config)?;
    let query = SearchQuery::new(term)
        .max_results(max_results)
        .sort(sort.into())
        .selection(source.into());

    let report = match aggregator.search_detailed(kind, &query).await {
        Ok(report) => report,
        Err(e) if e.is_rate_limited() => {
            anyhow::bail!("Search failed: {} (try again later)", e)
        }
        Err(e) => anyhow::bail!("Search failed: {}", e),
    };

    report_failures(cli, &report);

    if report.all_failed() {
        anyhow::bail!("Search failed: no source could be reached");
    }

    if report.books.is_empty() {
        if !cli.quiet {
            eprintln!("No books found for {} '{}'", kind, term.trim());
        }
        return Ok(());
    }

    output_books(&report.books, cli.output)
}

fn report_failures(cli: &Cli, report: &SearchReport) {
    if cli.quiet {
        return;
    }
    for failure in &report.failures {
        if failure.rate_limited {
            eprintln!("{} is rate limiting requests; its results are missing", failure.source);
        } else {
            eprintln!("Error searching {}: {}", failure.source, failure.error);
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

fn output_books(books: &[Book], format: OutputFormat) -> Result<()> {
    let actual_format = if format == OutputFormat::Auto {
        if std::io::stdout().is_terminal() {
            OutputFormat::Table
        } else {
            OutputFormat::Json
        }
    } else {
        format
    };

    match actual_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(books)?);
        }
        OutputFormat::Plain => {
            for book in books {
                println!("{} - {} ({})", book.title, book.author_line(), book.source_id);
                if !book.publisher.is_empty() || !book.published_date.is_empty() {
                    println!("  Published: {} {}", book.publisher, book.published_date);
                }
                if !book.isbn().is_empty() {
                    println!("  ISBN: {}", book.isbn());
                }
                if !book.info_link.is_empty() {
                    println!("  URL: {}", book.info_link);
                }
                println!();
            }
        }
        OutputFormat::Table => {
            use comfy_table::{Attribute, Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["Title", "Authors", "Publisher", "Date", "ISBN", "Source"]);

            for book in books {
                table.add_row(vec![
                    Cell::new(truncate_chars(&book.title, 40)).add_attribute(Attribute::Bold),
                    Cell::new(truncate_chars(&book.author_line(), 24)),
                    Cell::new(truncate_chars(&book.publisher, 16)),
                    Cell::new(&book.published_date),
                    Cell::new(book.isbn()),
                    Cell::new(book.source_id.name()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Auto => unreachable!(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_version() {
        let version = env!("CARGO_PKG_VERSION");
        let parts: Vec<&str> = version.split('.').collect();
        assert!(parts.len() >= 2);
        assert!(parts[0].parse::<u32>().is_ok());
    }

    #[test]
    fn test_cli_title_defaults() {
        let cli = Cli::parse_from(["bookshelf-search", "title", "ノルウェイの森"]);
        match &cli.command {
            Commands::Title {
                term,
                source,
                max_results,
                sort,
            } => {
                assert_eq!(term, "ノルウェイの森");
                assert_eq!(*source, SourceArg::All);
                assert_eq!(*max_results, 20);
                assert_eq!(*sort, SortArg::Newest);
            }
            _ => panic!("Expected Title command"),
        }
        assert_eq!(cli.output, OutputFormat::Auto);
    }

    #[test]
    fn test_cli_author_with_options() {
        let cli = Cli::parse_from([
            "bookshelf-search",
            "author",
            "村上春樹",
            "--source",
            "rakuten",
            "--max-results",
            "5",
            "--sort",
            "relevance",
            "--output",
            "json",
        ]);
        match &cli.command {
            Commands::Author {
                source,
                max_results,
                sort,
                ..
            } => {
                assert_eq!(
                    SourceSelection::from(*source),
                    SourceSelection::Only(SourceId::Rakuten)
                );
                assert_eq!(*max_results, 5);
                assert_eq!(SortOrder::from(*sort), SortOrder::Relevance);
            }
            _ => panic!("Expected Author command"),
        }
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_cli_source_aliases() {
        let cli = Cli::parse_from(["bookshelf-search", "isbn", "9784062748681", "-s", "google"]);
        match &cli.command {
            Commands::Isbn { isbn, source } => {
                assert_eq!(isbn, "9784062748681");
                assert_eq!(*source, SourceArg::GoogleBooks);
            }
            _ => panic!("Expected Isbn command"),
        }

        let cli = Cli::parse_from(["bookshelf-search", "t", "x", "--source", "both"]);
        assert!(matches!(
            cli.command,
            Commands::Title {
                source: SourceArg::All,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_sources_and_config_commands() {
        let cli = Cli::parse_from(["bookshelf-search", "sources", "--detailed"]);
        assert!(matches!(cli.command, Commands::Sources { detailed: true }));

        let cli = Cli::parse_from(["bookshelf-search", "config", "--write", "/tmp/bs.toml"]);
        match &cli.command {
            Commands::Config { write } => {
                assert_eq!(write.as_deref(), Some(std::path::Path::new("/tmp/bs.toml")));
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("ノルウェイの森", 40), "ノルウェイの森");
        assert_eq!(truncate_chars("ノルウェイの森", 6), "ノルウ...");
    }
}

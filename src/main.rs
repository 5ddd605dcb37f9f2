use std::{
    io,
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use tracing::{
    error,
    info,
    warn,
};
use tracing_subscriber::EnvFilter;
use vocab_reorder::{
    collection::InMemoryCollection,
    dictionary::LanguageData,
    persistence::reorder_log::{
        ReorderLog,
        ReorderLogEntry,
    },
    segmentation::Tokenizers,
    target::{
        PlanOptions,
        ReorderPlan,
        ReorderResult,
        TargetList,
    },
    ReorderError,
    ReorderSettings,
};

/// Reorders new flashcards so the most useful words come first
#[derive(Parser)]
#[command(name = "vocab-reorder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Collection snapshot (JSON)
    #[arg(long)]
    collection: PathBuf,

    /// Target definitions (HJSON or JSON)
    #[arg(long)]
    targets: PathBuf,

    /// Language data directory, overrides the settings file
    #[arg(long)]
    lang_data: Option<PathBuf>,

    /// Plan and report without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Leave new cards outside the targets where they are
    #[arg(long)]
    no_shift: bool,

    /// Parse frequency lists without the bincode cache
    #[arg(long)]
    no_cache: bool,

    /// Where to write the updated collection snapshot
    #[arg(long)]
    write_back: Option<PathBuf>,
}

fn print_summary(result: &ReorderResult, dry_run: bool) {
    let verb = if dry_run { "would reposition" } else { "repositioned" };
    for target in &result.targets {
        match &target.error {
            Some(err) => println!("Target {}: failed: {}", target.target_name, err),
            None => println!(
                "Target {}: {} {} card(s) from position {}, {} field(s) updated",
                target.target_name,
                verb,
                target.num_cards_repositioned,
                target.starting_from,
                target.num_fields_updated
            ),
        }
        for warning in &target.warnings {
            println!("  warning: {}", warning);
        }
        if let Some(stats) = &target.stats {
            for (lang, count) in &stats.mature_words_per_language {
                println!("  {} mature word(s) in '{}'", count, lang);
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), ReorderError> {
    let start = Instant::now();
    let settings = ReorderSettings::load();

    let mut collection = InMemoryCollection::load(&cli.collection)?;
    let lang_data_dir = cli.lang_data.unwrap_or(settings.lang_data_dir.clone());
    let cache_dir = if cli.no_cache { None } else { settings.frequency_cache_dir() };
    let mut language_data = LanguageData::new(&lang_data_dir)?.with_cache_dir(cache_dir);
    let tokenizers = Tokenizers::new();

    let targets = TargetList::load(&cli.targets)?;
    if targets.is_empty() {
        warn!("No targets defined in {}", cli.targets.display());
        return Ok(());
    }

    let options = PlanOptions {
        shift_existing: settings.shift_existing_cards && !cli.no_shift,
        update_note_fields: settings.update_note_fields,
    };
    let plan = ReorderPlan::build(&targets, &collection, &mut language_data, &tokenizers, options);

    if cli.dry_run {
        print_summary(&plan.preview(), true);
        return Ok(());
    }

    let result = plan.commit(&mut collection);
    print_summary(&result, false);

    if settings.audit_log {
        if let Some(entry) = ReorderLogEntry::from_result(&result) {
            ReorderLog::append(&ReorderLog::default_path(), entry)?;
        }
    }

    if let Some(path) = &cli.write_back {
        collection.save(path)?;
        info!("Collection written to {}", path.display());
    }

    info!(
        "Reordered {} card(s) over {} target(s), {} failed ({:.1}s)",
        result.num_cards_repositioned(),
        result.targets.len(),
        result.num_failed(),
        start.elapsed().as_secs_f32()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

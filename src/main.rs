//! journal-pdf - Convert journal exports to PDF

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use journal_pdf::{
    AssembleOptions, BuildRequest, ContentBlock, Journal, Selection, SelectionEntry, build_pdf,
    load_exports,
};

#[derive(Parser)]
#[command(name = "journal-pdf")]
#[command(version, about = "Convert journal exports to PDF", long_about = None)]
#[command(after_help = "EXAMPLES:
    journal-pdf inspect bestiary.zip                          List pages and heading keys
    journal-pdf build bestiary.zip -o bestiary.pdf            Export everything
    journal-pdf build bestiary.zip -o wolf --select 'Bestiary::Wolf::h2:Stats'")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show the journals, pages and heading keys in one or more exports
    Inspect {
        /// Export files (JSON or ZIP)
        #[arg(value_name = "EXPORT", required = true)]
        exports: Vec<PathBuf>,

        /// Print the parsed journals as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render selected content to a PDF
    Build(BuildArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Export files (JSON or ZIP)
    #[arg(value_name = "EXPORT", required = true)]
    exports: Vec<PathBuf>,

    /// Output PDF path
    #[arg(short, long, value_name = "OUT")]
    output: PathBuf,

    /// Document title
    #[arg(long)]
    title: Option<String>,

    /// Do not start each journal on its own title page
    #[arg(long)]
    no_dividers: bool,

    /// Select a page (JOURNAL::PAGE) or section (JOURNAL::PAGE::KEY); repeatable
    #[arg(long = "select", value_name = "ENTRY")]
    select: Vec<String>,

    /// JSON file with a list of selection entries
    #[arg(long, value_name = "FILE")]
    selection_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let result = match cli.command {
        Command::Inspect { exports, json } => inspect(&exports, json),
        Command::Build(args) => build(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let default = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn load(paths: &[PathBuf]) -> Result<Vec<Journal>, String> {
    let report = load_exports(paths);
    for failure in &report.failures {
        warn!("Skipping {}: {}", failure.path.display(), failure.error);
    }
    if report.journals.is_empty() {
        return Err("no journals could be loaded".to_string());
    }
    Ok(report.journals)
}

fn inspect(paths: &[PathBuf], json: bool) -> Result<(), String> {
    let journals = load(paths)?;

    if json {
        let text = serde_json::to_string_pretty(&journals).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }

    for journal in &journals {
        println!("{} ({} pages)", journal.title, journal.pages.len());
        for page in &journal.pages {
            if page.key == page.title {
                println!("  {}", page.title);
            } else {
                println!("  {}  [{}]", page.title, page.key);
            }
            if !page.preface.is_empty() {
                println!("    (preface: {})", describe_blocks(&page.preface));
            }
            for heading in &page.headings {
                println!(
                    "    {}{}  [{}]  {}",
                    "  ".repeat(usize::from(heading.level.saturating_sub(2))),
                    heading.title,
                    heading.key,
                    describe_blocks(&heading.blocks)
                );
            }
        }
    }
    Ok(())
}

fn describe_blocks(blocks: &[ContentBlock]) -> String {
    let images = blocks
        .iter()
        .filter(|b| matches!(b, ContentBlock::Image(_)))
        .count();
    if images > 0 {
        format!("{} blocks, {images} images", blocks.len())
    } else {
        format!("{} blocks", blocks.len())
    }
}

fn build(args: BuildArgs) -> Result<(), String> {
    let journals = load(&args.exports)?;
    let selection = read_selection(&args, &journals)?;

    for entry in selection.unmatched(&journals) {
        warn!("Selection entry matches nothing: {entry}");
    }

    let mut options = AssembleOptions::new().with_divider_pages(!args.no_dividers);
    if let Some(title) = &args.title {
        options = options.with_title(title);
    }

    let output = pdf_path(&args.output);
    let request = BuildRequest::new(journals, selection, output).with_options(options);
    let path = build_pdf(&request).map_err(|e| e.to_string())?;
    info!("Saved {}", path.display());
    Ok(())
}

fn read_selection(args: &BuildArgs, journals: &[Journal]) -> Result<Selection, String> {
    if args.select.is_empty() && args.selection_file.is_none() {
        return Ok(Selection::all(journals));
    }

    let mut selection = match &args.selection_file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            Selection::from_json(&text).map_err(|e| e.to_string())?
        }
        None => Selection::new(),
    };
    for raw in &args.select {
        let entry: SelectionEntry = raw.parse().map_err(|e: journal_pdf::Error| e.to_string())?;
        selection.insert(entry);
    }
    Ok(selection)
}

/// Append `.pdf` unless the path already ends with it.
fn pdf_path(path: &Path) -> PathBuf {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".pdf");
        PathBuf::from(name)
    }
}

//! pdfmodel CLI - PDF to JSON document model converter

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfmodel::{json, Document, ExtractOptions, Extractor, JsonFormat, LopdfSource, PdfSource};

#[derive(Parser)]
#[command(name = "pdfmodel")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Convert PDF files to a JSON document model and back", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a PDF into a JSON document model
    Extract {
        /// Input PDF file
        #[arg(value_name = "PDF")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Keep text runs in content stream order
        #[arg(long)]
        unsorted: bool,

        /// Skip image extraction
        #[arg(long)]
        no_images: bool,
    },

    /// Build a PDF from a JSON document model
    Build {
        /// Input JSON file
        #[arg(value_name = "JSON")]
        input: PathBuf,

        /// Output PDF file
        #[arg(short, long, value_name = "PDF")]
        output: PathBuf,
    },

    /// Show document information
    Info {
        /// Input PDF file
        #[arg(value_name = "PDF")]
        input: PathBuf,

        /// Print metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            input,
            output,
            compact,
            unsorted,
            no_images,
        } => {
            let mut options = ExtractOptions::new().with_images(!no_images);
            if unsorted {
                options = options.unsorted();
            }
            cmd_extract(&input, output.as_deref(), compact, options)
        }
        Commands::Build { input, output } => cmd_build(&input, &output),
        Commands::Info { input, json } => cmd_info(&input, json),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn cmd_extract(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
    options: ExtractOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };

    let Some(path) = output else {
        // Keep stdout clean for piping.
        let doc = extract(input, options)?;
        println!("{}", json::to_json(&doc, format)?);
        return Ok(());
    };

    let pb = spinner("Extracting PDF...");
    let doc = extract(input, options)?;
    pb.set_message("Writing JSON...");
    fs::write(path, json::to_json(&doc, format)?)?;
    pb.finish_and_clear();

    println!(
        "{} {} ({} pages, {} text runs, {} images)",
        "Saved to".green(),
        path.display(),
        doc.page_count(),
        doc.pages.iter().map(|p| p.texts.len()).sum::<usize>(),
        doc.pages.iter().map(|p| p.images.len()).sum::<usize>(),
    );
    Ok(())
}

fn extract(input: &Path, options: ExtractOptions) -> pdfmodel::Result<Document> {
    log::info!("Extracting {} with {:?}", input.display(), options);
    let source = LopdfSource::load_file(input)?;
    let doc = Extractor::new().with_options(options).extract(&source)?;
    log::debug!("Extracted {} pages from PDF {}", doc.page_count(), source.version());
    Ok(doc)
}

fn cmd_build(input: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Building {} from {}", output.display(), input.display());
    let pb = spinner("Building PDF...");
    pdfmodel::json_to_pdf_file(input, output)?;
    pb.finish_and_clear();

    println!("{} {}", "Saved to".green(), output.display());
    Ok(())
}

fn cmd_info(input: &Path, as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let source = LopdfSource::load_file(input)?;
    let doc = Extractor::new()
        .with_options(ExtractOptions::new().with_images(false))
        .extract(&source)?;
    let metadata = doc.metadata.clone().unwrap_or_default();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: PDF {}", "Format".bold(), source.version());
    println!("{}: {}", "Pages".bold(), metadata.total_pages);

    if let Some(ref title) = metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if let Some(ref author) = metadata.author {
        println!("{}: {}", "Author".bold(), author);
    }
    if let Some(ref creator) = metadata.creator {
        println!("{}: {}", "Creator".bold(), creator);
    }
    if let Some(ref producer) = metadata.producer {
        println!("{}: {}", "Producer".bold(), producer);
    }
    if let Some(ref created) = metadata.creation_date {
        println!("{}: {}", "Created".bold(), created);
    }
    if let Some(ref modified) = metadata.modification_date {
        println!("{}: {}", "Modified".bold(), modified);
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let text = doc.plain_text();
    let runs: usize = doc.pages.iter().map(|p| p.texts.len()).sum();
    let images: usize = (0..source.page_count())
        .map(|i| source.image_resources(i).map(|r| r.len()).unwrap_or(0))
        .sum();

    println!("{}: {}", "Text runs".bold(), runs);
    println!("{}: {}", "Characters".bold(), text.chars().count());
    println!("{}: {}", "Images".bold(), images);

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdfmodel".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF to JSON document model converter");
    println!();
    println!("License: MIT");
}

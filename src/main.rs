//! quire - inspect an EPUB and render its chapters

use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use serde_json::json;

use quire::{Book, DisplayOutcome, DisplayRequest, HtmlSink, NavNode, RenditionOptions};

#[derive(Parser)]
#[command(name = "quire")]
#[command(version, about = "Inspect EPUB files and render chapters", long_about = None)]
#[command(after_help = "EXAMPLES:
    quire book.epub                          Show book metadata
    quire --toc book.epub                    Print the table of contents
    quire --show 3 book.epub                 Render spine item 3 as HTML
    quire --show OEBPS/ch2.xhtml#s3 book.epub  Render a chapter, scrolled to #s3")]
struct Cli {
    /// Input file (EPUB)
    #[arg(value_name = "INPUT")]
    input: String,

    /// Show book metadata (default when nothing else is asked for)
    #[arg(short, long)]
    info: bool,

    /// Print the table of contents
    #[arg(short, long)]
    toc: bool,

    /// Render a chapter: a spine index, an href, or "default"
    #[arg(short, long, value_name = "TARGET")]
    show: Option<DisplayRequest>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Log more (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(&cli);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), String> {
    let book = Book::open(&cli.input).await.map_err(|e| e.to_string())?;

    let show_info = cli.info || (!cli.toc && cli.show.is_none());
    if show_info {
        print_info(&cli.input, &book, cli.json)?;
    }
    if cli.toc {
        print_toc(book.navigation(), cli.json)?;
    }
    if let Some(request) = &cli.show {
        show_chapter(&book, request.clone(), cli.json).await?;
    }
    Ok(())
}

fn print_info(path: &str, book: &Book, as_json: bool) -> Result<(), String> {
    let meta = book.metadata();

    if as_json {
        let value = json!({
            "file": path,
            "package": book.opf_path(),
            "metadata": meta,
            "spine": book.spine().items(),
            "diagnostics": book.diagnostics(),
        });
        return print_json(&value);
    }

    println!("File: {path}");
    println!("Title: {}", meta.title.as_deref().unwrap_or("(untitled)"));
    if !meta.creators.is_empty() {
        println!("Authors: {}", meta.creators.join(", "));
    }
    if let Some(language) = &meta.language {
        println!("Language: {language}");
    }
    if let Some(publisher) = &meta.publisher {
        println!("Publisher: {publisher}");
    }
    let linear = book.spine().iter().filter(|item| item.is_navigable()).count();
    println!("Chapters: {} ({linear} linear)", book.spine().len());
    println!(
        "TOC entries: {}",
        book.navigation().iter().map(NavNode::count).sum::<usize>()
    );
    for diagnostic in book.diagnostics() {
        println!("Warning: {diagnostic}");
    }

    Ok(())
}

fn print_toc(navigation: &[NavNode], as_json: bool) -> Result<(), String> {
    if as_json {
        return print_json(&json!(navigation));
    }

    fn walk(nodes: &[NavNode], depth: usize) {
        for node in nodes {
            println!("{:indent$}{}  ->  {}", "", node.label, node.href, indent = depth * 2);
            walk(&node.children, depth + 1);
        }
    }
    walk(navigation, 0);
    Ok(())
}

async fn show_chapter(book: &Book, request: DisplayRequest, as_json: bool) -> Result<(), String> {
    let mut rendition = book.render_to(HtmlSink::new(), RenditionOptions::default());

    let report = match rendition.display(request).await {
        DisplayOutcome::Displayed(report) => report,
        DisplayOutcome::Unchanged => return Err("nothing to display".into()),
        DisplayOutcome::Failed(e) => return Err(e.to_string()),
    };

    if as_json {
        let handles: Vec<_> = report
            .handles
            .iter()
            .map(|h| {
                json!({
                    "reference": h.original_reference,
                    "path": h.resolved_path,
                    "handle": h.handle,
                })
            })
            .collect();
        let value = json!({
            "href": report.target.href,
            "fragment": report.target.fragment,
            "spine_index": report.target.spine_index,
            "handles": handles,
            "diagnostics": report.diagnostics,
            "html": rendition.sink().to_html(),
        });
        return print_json(&value);
    }

    print!("{}", rendition.sink().to_html());
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

fn init_logger(cli: &Cli) {
    env_logger::Builder::new()
        .filter_level(log_level(cli.quiet, cli.verbose))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn log_level(quiet: bool, verbose: u8) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

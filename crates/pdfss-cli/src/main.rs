use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use pdfss_core::config_file::{self, ConfigFile};
use pdfss_core::{DEFAULT_SKIP_KINDS, LayoutObject, ObjectKind, PdfBackend, page_selected};
use pdfss_layout::{RelayoutConfigBuilder, relayout};
use pdfss_pdf_mupdf::MupdfBackend;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod output;

use output::ColorMode;

/// PDF scraping system - extract, inspect and relayout the text of PDF documents
#[derive(Parser, Debug)]
#[command(version = env!("PDFSS_VERSION"), about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log debug information to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

/// Page numbers given on the command line, all pages when none.
fn page_filter(pages: &[u32]) -> Option<&[u32]> {
    if pages.is_empty() { None } else { Some(pages) }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the plain text of a PDF
    Text {
        /// Path to the PDF file
        file_path: PathBuf,
    },

    /// Print the layout tree of a PDF, to help building scrapers
    Dump {
        /// Path to the PDF file
        file_path: PathBuf,

        /// Page numbers to dump, starting at 1 (default: all)
        pages: Vec<u32>,
    },

    /// Save the layout tree of a PDF as JSON, e.g. to build test fixtures
    DumpJson {
        /// Path to the PDF file
        file_path: PathBuf,

        /// Page numbers to save, starting at 1 (default: all)
        pages: Vec<u32>,

        /// Path to the output JSON file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Object kinds to keep although skipped by default (e.g. figure)
        #[arg(long, value_delimiter = ',')]
        keep: Vec<ObjectKind>,
    },

    /// Regroup the text of a PDF, or of a JSON layout dump, into logical lines
    Relayout {
        /// Path to a PDF file or to a `dump-json` output (.json)
        file_path: PathBuf,

        /// Comma-separated page numbers to process, starting at 1 (default: all)
        #[arg(short, long, value_delimiter = ',')]
        pages: Vec<u32>,

        /// Drop lines whose text is exactly this (repeatable)
        #[arg(long)]
        skip_text: Vec<String>,

        /// Maximum gap between chars of a block, as a factor of the char width
        #[arg(long)]
        width_factor: Option<f64>,

        /// Print groups as JSON arrays instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config_file::load_config();
    let color_enabled = config
        .display
        .as_ref()
        .and_then(|d| d.color)
        .unwrap_or(true);
    let color = ColorMode(!cli.no_color && color_enabled);
    let backend = MupdfBackend::new();

    let stdout = std::io::stdout();
    let mut writer = stdout.lock();

    match cli.command {
        Command::Text { file_path } => {
            let text = pdfss_layout::pdf2text(&file_path, &backend)?;
            writer.write_all(text.as_bytes())?;
        }
        Command::Dump { file_path, pages } => {
            pdfss_layout::dump_pdf_structure(
                &file_path,
                &backend,
                page_filter(&pages),
                &mut writer,
            )?;
        }
        Command::DumpJson {
            file_path,
            pages,
            output,
            keep,
        } => {
            let skip_kinds: Vec<ObjectKind> = DEFAULT_SKIP_KINDS
                .iter()
                .copied()
                .filter(|kind| !keep.contains(kind))
                .collect();
            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(File::create(path)?),
                None => Box::new(writer),
            };
            pdfss_layout::dump_layout_json(
                &file_path,
                &backend,
                page_filter(&pages),
                &skip_kinds,
                &mut out,
            )?;
        }
        Command::Relayout {
            file_path,
            pages,
            skip_text,
            width_factor,
            json,
        } => {
            let options = RelayoutOptions {
                skip_text,
                width_factor,
                json,
                color,
            };
            relayout_file(
                &file_path,
                &backend,
                page_filter(&pages),
                &config,
                &options,
                &mut writer,
                &mut std::io::stderr(),
            )?;
        }
    }
    Ok(())
}

/// Log to stderr, `RUST_LOG` overriding the level chosen from `verbose`.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[derive(Debug)]
struct RelayoutOptions {
    skip_text: Vec<String>,
    width_factor: Option<f64>,
    json: bool,
    color: ColorMode,
}

fn relayout_file(
    file_path: &Path,
    backend: &dyn PdfBackend,
    pages: Option<&[u32]>,
    config: &ConfigFile,
    options: &RelayoutOptions,
    w: &mut dyn Write,
    warnings: &mut dyn Write,
) -> anyhow::Result<()> {
    let color = options.color;
    // CLI flags override config values
    let mut builder = match &config.relayout {
        Some(section) => RelayoutConfigBuilder::from_section(section),
        None => RelayoutConfigBuilder::new(),
    };
    builder = builder.skip_text(options.skip_text.iter().cloned());
    if let Some(factor) = options.width_factor {
        builder = builder.width_factor(factor);
    }
    let relayout_config = builder.build()?;

    let layout_pages = load_pages(file_path, backend, pages)?;
    tracing::debug!(
        path = %file_path.display(),
        pages = layout_pages.len(),
        config = ?relayout_config,
        "relayout"
    );

    let mut all_groups = Vec::new();
    for page in &layout_pages {
        let number = match page {
            LayoutObject::Page(p) => p.number,
            _ => 0,
        };
        let groups = relayout(page, &relayout_config)?;
        if groups.is_empty() && page.is_figure_only_page() {
            output::print_scanned_warning(warnings, number, color)?;
        }
        if options.json {
            all_groups.push(output::groups_json(&groups));
        } else {
            output::print_groups(w, number, &groups, color)?;
        }
    }

    if options.json {
        serde_json::to_writer_pretty(&mut *w, &all_groups)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Layout trees of the selected pages, from a PDF or from a JSON dump.
fn load_pages(
    file_path: &Path,
    backend: &dyn PdfBackend,
    pages: Option<&[u32]>,
) -> anyhow::Result<Vec<LayoutObject>> {
    let is_json = file_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Ok(backend.extract_pages(file_path, pages)?);
    }

    let dump = pdfss_layout::load_layout_json(BufReader::new(File::open(file_path)?))?;
    Ok(dump
        .pages
        .into_iter()
        .filter(|page| match page {
            LayoutObject::Page(p) => page_selected(pages, p.number),
            _ => true,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = r#"{"pages": [
        {"type": "page", "number": 1, "bbox": {"x0": 0, "y0": 0, "x1": 100, "y1": 100},
         "objects": [{"type": "text_line", "bbox": {"x0": 10, "y0": 50, "x1": 20, "y1": 60},
           "objects": [
             {"type": "char", "text": "o", "font_name": "F", "font_size": 10,
              "bbox": {"x0": 10, "y0": 50, "x1": 15, "y1": 60}},
             {"type": "char", "text": "k", "font_name": "F", "font_size": 10,
              "bbox": {"x0": 15, "y0": 50, "x1": 20, "y1": 60}}]}]},
        {"type": "page", "number": 2, "bbox": {"x0": 0, "y0": 0, "x1": 100, "y1": 100},
         "objects": [{"type": "figure", "bbox": {"x0": 0, "y0": 0, "x1": 100, "y1": 100},
           "objects": []}]}
    ]}"#;

    fn write_dump() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("layout.json"), DUMP).unwrap();
        dir
    }

    fn options(json: bool) -> RelayoutOptions {
        RelayoutOptions {
            skip_text: Vec::new(),
            width_factor: None,
            json,
            color: ColorMode(false),
        }
    }

    #[test]
    fn test_cli_parses_relayout() {
        let cli = Cli::try_parse_from([
            "pdfss",
            "-v",
            "relayout",
            "invoice.pdf",
            "--pages",
            "1,3",
            "--skip-text",
            "5 / 20",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Relayout {
                pages, skip_text, ..
            } => {
                assert_eq!(page_filter(&pages), Some(&[1, 3][..]));
                assert_eq!(skip_text, vec!["5 / 20".to_string()]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_keep_kinds() {
        let cli =
            Cli::try_parse_from(["pdfss", "dump-json", "a.pdf", "--keep", "figure,rect"]).unwrap();
        match cli.command {
            Command::DumpJson { keep, pages, .. } => {
                assert_eq!(keep, vec![ObjectKind::Figure, ObjectKind::Rect]);
                assert_eq!(page_filter(&pages), None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parses_positional_dump_pages() {
        let cli = Cli::try_parse_from(["pdfss", "dump", "invoice.pdf", "2", "4"]).unwrap();
        match cli.command {
            Command::Dump { file_path, pages } => {
                assert_eq!(file_path, PathBuf::from("invoice.pdf"));
                assert_eq!(page_filter(&pages), Some(&[2, 4][..]));
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli =
            Cli::try_parse_from(["pdfss", "dump-json", "a.pdf", "3", "-o", "a.json"]).unwrap();
        match cli.command {
            Command::DumpJson { pages, output, .. } => {
                assert_eq!(pages, vec![3]);
                assert_eq!(output, Some(PathBuf::from("a.json")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_relayout_json_dump() {
        let dir = write_dump();
        let mut out = Vec::new();
        relayout_file(
            &dir.path().join("layout.json"),
            &MupdfBackend::new(),
            Some(&[1]),
            &ConfigFile::default(),
            &options(true),
            &mut out,
            &mut std::io::sink(),
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json, serde_json::json!([[[["ok"]]]]));
    }

    #[test]
    fn test_relayout_config_skip_text() {
        let dir = write_dump();
        let config: ConfigFile = toml_config("[relayout]\nskip_text = [\"ok\"]\n");
        let mut out = Vec::new();
        let mut warnings = Vec::new();
        relayout_file(
            &dir.path().join("layout.json"),
            &MupdfBackend::new(),
            None,
            &config,
            &options(false),
            &mut out,
            &mut warnings,
        )
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "page 1 (0 groups)\n\npage 2 (0 groups)\n\n"
        );
        // page 1 lost its only line to skip_text, only page 2 is a figure
        assert_eq!(
            String::from_utf8(warnings).unwrap(),
            "WARNING: page 2 has no text but a single figure, is it a scanned document?\n"
        );
    }

    fn toml_config(content: &str) -> ConfigFile {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        config_file::load_from_path(&path).unwrap()
    }
}

//! xmlsave -- parse XML/HTML files and write them back out.
//!
//! Besides re-serializing, it can list the path of every node and dump the
//! declarations of the internal DTD subset.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use xmlfacade::dtd::{Declaration, DefaultKind};
use xmlfacade::parser::{parse_bytes_with_options, ParseOptions};
use xmlfacade::{Node, SaveOptions, XmlDocument};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// xmlsave -- parse XML/HTML files and serialize them again.
#[derive(Parser, Debug)]
#[command(name = "xmlsave", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Files to process (use `-` for stdin).
    #[arg(required = true)]
    files: Vec<String>,

    /// Log what is being done (debug level).
    #[arg(long)]
    verbose: bool,

    // -- Parsing options ---------------------------------------------------
    /// Parse input as HTML instead of XML.
    #[arg(long)]
    html: bool,

    /// Recover from parsing errors (produce partial tree).
    #[arg(long)]
    recover: bool,

    /// Remove blank (whitespace-only) text nodes.
    #[arg(long)]
    noblanks: bool,

    /// Substitute internal entities.
    #[arg(long)]
    noent: bool,

    // -- Output options ----------------------------------------------------
    /// Pretty-print the output.
    #[arg(long)]
    format: bool,

    /// Leave out the XML declaration.
    #[arg(long)]
    no_declaration: bool,

    /// Write `<a></a>` for empty elements.
    #[arg(long)]
    no_empty_tags: bool,

    /// Output in the given encoding (e.g., UTF-8, ISO-8859-1).
    #[arg(long, value_name = "ENCODING")]
    encode: Option<String>,

    /// Serialize using the HTML rules.
    #[arg(long)]
    as_html: bool,

    /// Print the path of every node instead of the document.
    #[arg(long)]
    paths: bool,

    /// Print the declarations of the internal subset instead of the
    /// document.
    #[arg(long)]
    dtd: bool,
}

const EXIT_SUCCESS: u8 = 0;
const EXIT_FAILURE: u8 = 1;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    let mut exit = EXIT_SUCCESS;
    for file in &cli.files {
        if let Err(msg) = process_file(&cli, file) {
            eprintln!("{file}: {msg}");
            exit = EXIT_FAILURE;
        }
    }
    ExitCode::from(exit)
}

fn process_file(cli: &Cli, filename: &str) -> Result<(), String> {
    let input = read_input(filename).map_err(|e| format!("failed to read: {e}"))?;
    debug!(file = filename, bytes = input.len(), "read input");

    let options = ParseOptions::default()
        .html(cli.html)
        .recover(cli.recover)
        .no_blanks(cli.noblanks)
        .substitute_entities(cli.noent);
    let tree = parse_bytes_with_options(&input, &options).map_err(|e| e.to_string())?;
    for diag in &tree.diagnostics {
        eprintln!("{filename}: {diag}");
    }
    let doc = XmlDocument::new(tree);

    if cli.paths {
        let out = list_paths(&doc).map_err(|e| e.to_string())?;
        return write_stdout(out.as_bytes());
    }
    if cli.dtd {
        let out = describe_dtd(&doc).map_err(|e| e.to_string())?;
        return write_stdout(out.as_bytes());
    }

    let mut save = SaveOptions::default()
        .format(cli.format)
        .no_declaration(cli.no_declaration)
        .no_empty_tags(cli.no_empty_tags);
    if cli.as_html {
        save = save.html(true);
    }
    let bytes = match &cli.encode {
        Some(encoding) => doc.serialize_to_bytes(&save.encoding(encoding)),
        None => doc.serialize_with_options(&save).map(String::into_bytes),
    }
    .map_err(|e| e.to_string())?;
    write_stdout(&bytes)
}

/// Reads input from a file or stdin (when filename is `-`).
fn read_input(filename: &str) -> io::Result<Vec<u8>> {
    if filename == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(filename)
    }
}

fn write_stdout(bytes: &[u8]) -> Result<(), String> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.flush())
        .map_err(|e| format!("failed to write output: {e}"))
}

// ---------------------------------------------------------------------------
// --paths
// ---------------------------------------------------------------------------

/// One line per node, document order, attributes right after their element.
fn list_paths(doc: &XmlDocument) -> xmlfacade::Result<String> {
    let mut out = String::new();
    let mut stack = vec![doc.document_node()?];
    while let Some(node) = stack.pop() {
        let _ = writeln!(out, "{}", doc.path(&node)?);
        for attr in doc.attribute_nodes(&node)? {
            let _ = writeln!(out, "{}", doc.path(&attr)?);
        }
        let children: Vec<Node> = doc.children(&node)?;
        stack.extend(children.into_iter().rev());
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// --dtd
// ---------------------------------------------------------------------------

fn describe_dtd(doc: &XmlDocument) -> xmlfacade::Result<String> {
    let mut out = String::new();
    let Some(dtd) = doc.internal_subset()? else {
        out.push_str("no document type declaration\n");
        return Ok(out);
    };

    let _ = writeln!(out, "DOCTYPE {}", dtd.name());
    if let Some(public_id) = dtd.external_id() {
        let _ = writeln!(out, "  public id: {public_id}");
    }
    if let Some(system_id) = dtd.system_id() {
        let _ = writeln!(out, "  system id: {system_id}");
    }
    if let Some(err) = dtd.declarations().parse_error() {
        let _ = writeln!(out, "  internal subset not readable: {err}");
    }

    for decl in dtd.children() {
        match decl {
            Declaration::Element(element) => {
                let _ = writeln!(
                    out,
                    "element {} {}",
                    element.name(),
                    element.model().unwrap_or("?")
                );
                for attr in element.attributes() {
                    let _ = writeln!(out, "  @{}", attr.name());
                }
            }
            Declaration::Attribute(attr) => {
                let default = match attr.default_kind() {
                    DefaultKind::Required => "#REQUIRED".to_string(),
                    DefaultKind::Implied => "#IMPLIED".to_string(),
                    DefaultKind::Fixed => {
                        format!("#FIXED \"{}\"", attr.default_value().unwrap_or_default())
                    }
                    DefaultKind::Value => format!("\"{}\"", attr.default_value().unwrap_or_default()),
                };
                let _ = writeln!(
                    out,
                    "attribute {}@{} {} {default}",
                    attr.element_name(),
                    attr.name(),
                    attr.attribute_type().unwrap_or("?"),
                );
            }
            Declaration::Entity(entity) => {
                let _ = writeln!(out, "entity {} {:?}", entity.name(), entity.kind());
            }
            Declaration::Notation(notation) => {
                let _ = writeln!(out, "notation {}", notation.name());
            }
        }
    }
    Ok(out)
}

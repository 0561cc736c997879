use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use doc_parser::{PageParser, ParseError};
use thiserror::Error;

const USAGE: &str = "\
Usage: doc_parser [--no-endpoints] [HTML_FILE|-]

Parses a saved documentation page and prints the extracted title, markdown,
code examples and endpoint metadata as JSON. Reads stdin when no file is given.

Options:
  --no-endpoints  Skip API endpoint detection
  -h, --help      Show this message
  -V, --version   Print package version";

#[derive(Debug, Error)]
enum CliError {
    #[error("unexpected argument {0:?}\n\n{usage}", usage = USAGE)]
    Usage(String),
    #[error("cannot read {source_name}: {error}")]
    Read {
        source_name: String,
        error: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("cannot encode page: {0}")]
    Encode(#[from] serde_json::Error),
}

enum Request {
    Help,
    Version,
    Parse {
        file: Option<PathBuf>,
        endpoints: bool,
    },
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Request, CliError> {
    let mut file = None;
    let mut endpoints = true;
    let mut stdin_requested = false;
    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Request::Help),
            "-V" | "--version" => return Ok(Request::Version),
            "--no-endpoints" => endpoints = false,
            "-" if file.is_none() && !stdin_requested => stdin_requested = true,
            path if file.is_none() && !stdin_requested && !path.starts_with('-') => {
                file = Some(PathBuf::from(path));
            }
            other => return Err(CliError::Usage(other.to_string())),
        }
    }
    Ok(Request::Parse { file, endpoints })
}

fn read_input(file: Option<&PathBuf>) -> Result<String, CliError> {
    match file {
        Some(path) => std::fs::read_to_string(path).map_err(|error| CliError::Read {
            source_name: path.display().to_string(),
            error,
        }),
        None => {
            let mut html = String::new();
            std::io::stdin()
                .read_to_string(&mut html)
                .map_err(|error| CliError::Read {
                    source_name: "stdin".to_string(),
                    error,
                })?;
            Ok(html)
        }
    }
}

fn execute(request: Request) -> Result<(), CliError> {
    let (file, endpoints) = match request {
        Request::Help => {
            println!("{USAGE}");
            return Ok(());
        }
        Request::Version => {
            println!("doc_parser {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Request::Parse { file, endpoints } => (file, endpoints),
    };

    let parser = if endpoints {
        PageParser::new()
    } else {
        PageParser::without_endpoints()
    };
    let page = parser.parse(&read_input(file.as_ref())?)?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

fn main() -> ExitCode {
    match parse_args(std::env::args().skip(1)).and_then(execute) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("doc_parser: {err}");
            ExitCode::FAILURE
        }
    }
}

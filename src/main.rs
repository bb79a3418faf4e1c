use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use mediaprobe::{
    parse_file_at, parse_http, Format, Nature, ParseOptions, ParseResult, ResultsMode,
};

/// Identify media files and print their intrinsic metadata as JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Files or http(s) URLs to identify.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Collect a result from every recognizing parser, not just the first.
    #[arg(long)]
    all: bool,

    /// Only try parsers producing these natures (comma-separated).
    #[arg(long, value_delimiter = ',')]
    natures: Vec<Nature>,

    /// Only try parsers handling these formats (comma-separated).
    #[arg(long, value_delimiter = ',')]
    formats: Vec<Format>,

    #[arg(long)]
    debug: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Report<'a> {
    First {
        source_path_or_url: &'a str,
        options: &'a ParseOptions,
        result: Option<ParseResult>,
    },
    All {
        source_path_or_url: &'a str,
        options: &'a ParseOptions,
        ambiguous: bool,
        results: Vec<ParseResult>,
    },
}

fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.debug {
        let filter = EnvFilter::from_default_env()
            .add_directive("mediaprobe=debug".parse().expect("valid directive"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut options = ParseOptions::new();
    if cli.all {
        options = options.results(ResultsMode::All);
    }
    if !cli.natures.is_empty() {
        options = options.natures(cli.natures.clone());
    }
    if !cli.formats.is_empty() {
        options = options.formats(cli.formats.clone());
    }

    let mut reports = Vec::new();
    let mut any_result = false;
    for input in &cli.inputs {
        let outcome = if is_url(input) {
            parse_http(input, &options)
        } else {
            parse_file_at(input, &options)
        };
        let results = match outcome {
            Ok(results) => results,
            Err(err) => {
                eprintln!("{input}: {err}");
                Vec::new()
            }
        };
        any_result |= !results.is_empty();
        reports.push(match options.results {
            ResultsMode::First => Report::First {
                source_path_or_url: input,
                options: &options,
                result: results.into_iter().next(),
            },
            ResultsMode::All => Report::All {
                source_path_or_url: input,
                options: &options,
                ambiguous: results.len() > 1,
                results,
            },
        });
    }

    match serde_json::to_string_pretty(&reports) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("serializing results: {err}");
            return ExitCode::FAILURE;
        }
    }

    if any_result {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

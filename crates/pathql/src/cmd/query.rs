//! pathql-query - Query code-structure fact bases.
//!
//! # Usage
//!
//! ```bash
//! pathql-query facts.json 'FROM class AS c WHERE c.name == "Main" SELECT c'
//! pathql-query facts.json -F query.pql --format json
//! pathql-query facts.json  # Interactive mode
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use pathql_core::Row;
use pathql_query::{
    build_query, ComparisonType, EvaluationContext, EvaluationResult, Evaluator,
    EvaluatorOptions, IntermediateResult, Query,
};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::facts::FactBase;
use crate::report;

/// Query code-structure fact bases.
#[derive(Parser, Debug)]
#[command(name = "pathql-query")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The JSON fact base to query
    #[arg(value_name = "FACTS")]
    facts: PathBuf,

    /// Query to execute (if not provided, enters interactive mode)
    #[arg(value_name = "QUERY", trailing_var_arg = true, num_args = 0..)]
    query: Vec<String>,

    /// Read query from file
    #[arg(short = 'F', long = "query-file", value_name = "QUERY_FILE")]
    query_file: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, value_name = "OUTPUT_FILE")]
    output: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short = 'f', long, default_value = "text")]
    format: OutputFormat,

    /// Page of results to print (1-based)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    page: u64,

    /// Rows per page (0 prints every row)
    #[arg(long, default_value_t = 0)]
    size: usize,

    /// Print the intermediate result of every expression node
    #[arg(long)]
    trace: bool,

    /// Compile comparison expressions for every row instead of caching them
    #[arg(long)]
    no_cache: bool,

    /// Fail dual-entity comparisons that would visit more row pairs
    #[arg(long, value_name = "PAIRS")]
    max_join_pairs: Option<usize>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Main entry point for the query command.
pub fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_logging(verbose: bool) {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if verbose {
        for directive in ["pathql=debug", "pathql_query=debug", "pathql_parser=debug"] {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &Args) -> Result<()> {
    if !args.facts.exists() {
        anyhow::bail!("file not found: {}", args.facts.display());
    }

    let facts = FactBase::load(&args.facts)?;
    if args.verbose {
        eprintln!(
            "Loaded {} rows of {} entity types",
            facts.row_count(),
            facts.entities.len()
        );
    }
    let context = facts.into_context();

    let query_str = if !args.query.is_empty() {
        args.query.join(" ")
    } else if let Some(ref query_file) = args.query_file {
        fs::read_to_string(query_file)
            .with_context(|| format!("failed to read query file {}", query_file.display()))?
    } else {
        return run_interactive(&args.facts, &context, args);
    };

    let settings = ShellSettings::from_args(args);
    match &settings.output_file {
        Some(path) => {
            let mut file = fs::File::create(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            execute_query(&query_str, &context, &settings, &mut file)
        }
        None => execute_query(&query_str, &context, &settings, &mut io::stdout()),
    }
}

/// Settings shared by one-shot and interactive runs.
struct ShellSettings {
    format: OutputFormat,
    page: usize,
    size: usize,
    trace: bool,
    options: EvaluatorOptions,
    output_file: Option<PathBuf>,
}

impl ShellSettings {
    fn from_args(args: &Args) -> Self {
        Self {
            format: args.format,
            page: usize::try_from(args.page).unwrap_or(usize::MAX),
            size: args.size,
            trace: args.trace,
            options: EvaluatorOptions {
                cache_expressions: !args.no_cache,
                max_join_pairs: args.max_join_pairs,
                ..EvaluatorOptions::default()
            },
            output_file: args.output.clone(),
        }
    }
}

fn build(query_str: &str) -> Result<Query> {
    build_query(query_str).map_err(|err| {
        let color = io::stderr().is_terminal();
        let _ = report::report_query_error(&err, "query", query_str, color, &mut io::stderr());
        anyhow::Error::new(err).context("failed to build query")
    })
}

fn execute_query<W: Write>(
    query_str: &str,
    context: &EvaluationContext,
    settings: &ShellSettings,
    writer: &mut W,
) -> Result<()> {
    let query = build(query_str)?;

    let result = Evaluator::with_options(context, settings.options)
        .execute(&query)
        .with_context(|| "failed to evaluate query")?;

    let rows = paginate(&result.data, settings.page, settings.size);
    match settings.format {
        OutputFormat::Text => {
            write_text(&result, rows, writer)?;
            if settings.trace {
                if let Some(root) = &result.root {
                    writeln!(writer)?;
                    write_trace(root, 0, writer)?;
                }
            }
        }
        OutputFormat::Json => write_json(&result, rows, settings, writer)?,
    }

    Ok(())
}

/// Rows of the 1-based `page` of `size` rows; `size` 0 is every row.
fn paginate(rows: &[Row], page: usize, size: usize) -> &[Row] {
    if size == 0 {
        return rows;
    }
    let start = page.saturating_sub(1).saturating_mul(size).min(rows.len());
    let end = start.saturating_add(size).min(rows.len());
    &rows[start..end]
}

/// Attribute names of `rows`, in first-seen order.
fn columns(rows: &[Row]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }
    columns
}

fn write_text<W: Write>(result: &EvaluationResult, rows: &[Row], writer: &mut W) -> Result<()> {
    let columns = columns(rows);
    if !columns.is_empty() {
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| row.get(*col).map(ToString::to_string).unwrap_or_default())
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = columns.iter().map(|col| col.len()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        for (i, col) in columns.iter().enumerate() {
            if i > 0 {
                write!(writer, "  ")?;
            }
            write!(writer, "{:width$}", col, width = widths[i])?;
        }
        writeln!(writer)?;

        for (i, width) in widths.iter().enumerate() {
            if i > 0 {
                write!(writer, "  ")?;
            }
            write!(writer, "{}", "-".repeat(*width))?;
        }
        writeln!(writer)?;

        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    write!(writer, "  ")?;
                }
                write!(writer, "{:width$}", cell, width = widths[i])?;
            }
            writeln!(writer)?;
        }
        writeln!(writer)?;
    }

    if rows.len() == result.len() {
        writeln!(writer, "{} row(s)", result.len())?;
    } else {
        writeln!(writer, "{} of {} row(s)", rows.len(), result.len())?;
    }
    Ok(())
}

fn write_trace<W: Write>(node: &IntermediateResult, depth: usize, writer: &mut W) -> Result<()> {
    let comparison = match node.comparison {
        Some(ComparisonType::SingleEntity) => ", single entity",
        Some(ComparisonType::DualEntity) => ", dual entity",
        None => "",
    };
    write!(
        writer,
        "{:indent$}{} [{}{}]",
        "",
        node.expression,
        node.node_type,
        comparison,
        indent = depth * 2
    )?;
    if node.comparison.is_some() || !node.data.is_empty() {
        write!(writer, " -> {} row(s)", node.data.len())?;
    }
    writeln!(writer)?;

    for child in [&node.left, &node.right].into_iter().flatten() {
        write_trace(child, depth + 1, writer)?;
    }
    Ok(())
}

fn write_json<W: Write>(
    result: &EvaluationResult,
    rows: &[Row],
    settings: &ShellSettings,
    writer: &mut W,
) -> Result<()> {
    let mut output = serde_json::json!({
        "entities": result.entities,
        "rows": rows,
        "row_count": result.len(),
        "page": settings.page,
        "size": settings.size,
    });
    if settings.trace {
        output["trace"] = serde_json::to_value(&result.root)?;
    }

    writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

/// Get the history file path
fn get_history_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pathql").join("history"))
}

fn run_interactive(file: &Path, context: &EvaluationContext, args: &Args) -> Result<()> {
    let mut rl: Editor<(), DefaultHistory> = DefaultEditor::new()?;

    if let Some(history_path) = get_history_path() {
        if let Some(parent) = history_path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = rl.load_history(&history_path);
    }

    let rows: usize = context.entity_data.values().map(Vec::len).sum();
    println!("Input file: \"{}\"", file.display());
    println!(
        "Ready with {rows} rows of {} entity types (:help for commands)",
        context.entity_data.len()
    );
    println!();

    let mut settings = ShellSettings::from_args(args);

    loop {
        match rl.readline("pathql> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(cmd) = line.strip_prefix(':') {
                    match handle_shell_command(cmd, &mut settings, context) {
                        ShellAction::Continue => continue,
                        ShellAction::Quit => break,
                    }
                }

                let result = if let Some(ref output_path) = settings.output_file {
                    match fs::File::create(output_path) {
                        Ok(mut file) => execute_query(line, context, &settings, &mut file),
                        Err(e) => {
                            eprintln!("error: failed to open {}: {}", output_path.display(), e);
                            continue;
                        }
                    }
                } else {
                    execute_query(line, context, &settings, &mut io::stdout())
                };
                if let Err(e) = result {
                    eprintln!("error: {e:#}");
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("(interrupted)");
            }
            Err(ReadlineError::Eof) => {
                println!("quit");
                break;
            }
            Err(err) => {
                eprintln!("error: {err}");
                break;
            }
        }
    }

    if let Some(history_path) = get_history_path() {
        let _ = rl.save_history(&history_path);
    }

    Ok(())
}

enum ShellAction {
    Continue,
    Quit,
}

fn handle_shell_command(
    cmd: &str,
    settings: &mut ShellSettings,
    context: &EvaluationContext,
) -> ShellAction {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    let command = parts.first().map(|s| s.to_lowercase()).unwrap_or_default();
    let args: Vec<&str> = parts.into_iter().skip(1).collect();

    match command.as_str() {
        "quit" | "exit" | "q" => return ShellAction::Quit,
        "help" => {
            println!("Shell commands (prefix with :):");
            println!("  :quit, :exit       Exit the shell");
            println!("  :help              Show this help");
            println!("  :set [VAR [VAL]]   Show or set format, page, size, trace, cache, output");
            println!("  :entities          List entity types and row counts");
            println!("  :parse QUERY       Show how a query is understood");
            println!();
            println!("Queries:");
            println!("  [predicate NAME(TYPE PARAM, ...) {{ EXPR }}]...");
            println!("  FROM TYPE AS ALIAS, ... [WHERE EXPR] SELECT ALIAS, ...");
            println!();
        }
        "set" => match args.as_slice() {
            [] => {
                for var in ["format", "page", "size", "trace", "cache", "output"] {
                    show_setting(settings, var);
                }
            }
            [var] => show_setting(settings, var),
            [var, value] => {
                if let Err(e) = set_setting(settings, var, value) {
                    eprintln!("error: {e}");
                }
            }
            _ => eprintln!("error: invalid number of arguments"),
        },
        "entities" => {
            for (entity, rows) in &context.entity_data {
                println!("{entity} ({} rows)", rows.len());
            }
        }
        "parse" => {
            if args.is_empty() {
                eprintln!("error: query required");
            } else {
                let query_str = args.join(" ");
                if let Ok(query) = build(&query_str) {
                    print_query(&query);
                }
            }
        }
        "" => {}
        _ => eprintln!("error: unknown command \":{command}\""),
    }
    ShellAction::Continue
}

fn show_setting(settings: &ShellSettings, var: &str) {
    match var {
        "format" => println!("format: {}", settings.format),
        "page" => println!("page: {}", settings.page),
        "size" => println!("size: {}", settings.size),
        "trace" => println!("trace: {}", settings.trace),
        "cache" => println!("cache: {}", settings.options.cache_expressions),
        "output" => match &settings.output_file {
            Some(path) => println!("output: {}", path.display()),
            None => println!("output: (stdout)"),
        },
        _ => eprintln!("error: unknown variable \"{var}\""),
    }
}

fn set_setting(settings: &mut ShellSettings, var: &str, value: &str) -> Result<()> {
    match var {
        "format" => {
            settings.format = match value {
                "text" => OutputFormat::Text,
                "json" => OutputFormat::Json,
                _ => anyhow::bail!("\"{value}\" is not a valid format"),
            };
        }
        "page" => {
            let page: usize = value.parse().context("page must be a number")?;
            if page == 0 {
                anyhow::bail!("pages start at 1");
            }
            settings.page = page;
        }
        "size" => settings.size = value.parse().context("size must be a number")?,
        "trace" => settings.trace = parse_bool(value)?,
        "cache" => settings.options.cache_expressions = parse_bool(value)?,
        "output" => {
            settings.output_file = if value == "-" {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        _ => anyhow::bail!("unknown variable \"{var}\""),
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => anyhow::bail!("\"{value}\" is not a valid boolean"),
    }
}

fn print_query(query: &Query) {
    for item in &query.select_list {
        println!("from:       {} AS {}", item.entity, item.alias);
    }
    for predicate in &query.predicates {
        let params: Vec<String> = predicate
            .parameters
            .iter()
            .map(|p| format!("{} {}", p.param_type, p.name))
            .collect();
        println!("predicate:  {}({})", predicate.name, params.join(", "));
    }
    if !query.expression.is_empty() {
        println!("where:      {}", query.expression);
    }
    for condition in &query.condition {
        println!("comparison: {condition}");
    }
    for output in &query.select_output {
        println!("select:     {} ({})", output.text, output.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathql_core::row;

    fn context() -> EvaluationContext {
        FactBase::from_json(
            r#"{
                "entities": {
                    "class": [
                        {"id": 1, "name": "MyClass", "methodCount": 3},
                        {"id": 2, "name": "Other", "methodCount": 0},
                        {"id": 3, "name": "Third", "methodCount": 5}
                    ]
                }
            }"#,
        )
        .unwrap()
        .into_context()
    }

    fn settings(format: OutputFormat) -> ShellSettings {
        ShellSettings {
            format,
            page: 1,
            size: 0,
            trace: false,
            options: EvaluatorOptions::default(),
            output_file: None,
        }
    }

    fn run_to_string(query: &str, settings: &ShellSettings) -> String {
        let mut out = Vec::new();
        execute_query(query, &context(), settings, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_paginate() {
        let rows: Vec<Row> = (0..5).map(|i| row! { "id" => i }).collect();
        assert_eq!(paginate(&rows, 1, 0).len(), 5);
        assert_eq!(paginate(&rows, 1, 2), &rows[0..2]);
        assert_eq!(paginate(&rows, 3, 2), &rows[4..5]);
        assert!(paginate(&rows, 4, 2).is_empty());
    }

    #[test]
    fn test_text_output() {
        let output = run_to_string(
            "FROM class AS c WHERE c.methodCount > 1 SELECT c",
            &settings(OutputFormat::Text),
        );
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0].split_whitespace().collect::<Vec<_>>(), ["id", "methodCount", "name"]);
        assert!(lines[2].contains("MyClass"));
        assert!(lines[3].contains("Third"));
        assert_eq!(lines.last(), Some(&"2 row(s)"));
    }

    #[test]
    fn test_text_output_paged_with_trace() {
        let mut settings = settings(OutputFormat::Text);
        settings.size = 1;
        settings.page = 2;
        settings.trace = true;
        let output = run_to_string(
            "FROM class AS c WHERE c.methodCount > 1 SELECT c",
            &settings,
        );
        assert!(output.contains("Third"));
        assert!(!output.contains("MyClass"));
        assert!(output.contains("1 of 2 row(s)"));
        assert!(output.contains("c.methodCount > 1 [binary, single entity] -> 2 row(s)"));
        assert!(output.contains("  c.methodCount [variable]"));
    }

    #[test]
    fn test_json_output() {
        let mut settings = settings(OutputFormat::Json);
        settings.trace = true;
        let output = run_to_string("FROM class AS c WHERE c.name == \"Other\" SELECT c", &settings);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["row_count"], 1);
        assert_eq!(json["rows"][0]["name"], "Other");
        assert_eq!(json["entities"][0], "class");
        assert_eq!(json["trace"]["node_type"], "binary");
    }

    #[test]
    fn test_query_errors_propagate() {
        let mut out = Vec::new();
        let err = execute_query(
            "FROM class AS c WHERE c.missing == 1 SELECT c",
            &context(),
            &settings(OutputFormat::Text),
            &mut out,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("failed to evaluate query"));

        let err = execute_query("FROM", &context(), &settings(OutputFormat::Text), &mut out)
            .unwrap_err();
        assert!(err.to_string().contains("failed to build query"));
    }

    #[test]
    fn test_set_setting() {
        let mut settings = settings(OutputFormat::Text);
        set_setting(&mut settings, "format", "json").unwrap();
        set_setting(&mut settings, "size", "10").unwrap();
        set_setting(&mut settings, "cache", "off").unwrap();
        assert_eq!(settings.format, OutputFormat::Json);
        assert_eq!(settings.size, 10);
        assert!(!settings.options.cache_expressions);

        assert!(set_setting(&mut settings, "page", "0").is_err());
        assert!(set_setting(&mut settings, "trace", "maybe").is_err());
        assert!(set_setting(&mut settings, "colour", "on").is_err());
    }
}

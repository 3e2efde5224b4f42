//! Error reporting with source diagnostics.
//!
//! Uses ariadne for pretty-printed syntax errors with source context.

use std::io::Write;

use ariadne::{ColorGenerator, Config, IndexType, Label, Report, ReportKind, Source};
use pathql_parser::SyntaxErrors;
use pathql_query::{QueryError, StructuralError};

/// Report syntax errors in `source` to the given writer.
///
/// Returns the number of errors reported.
pub fn report_syntax_errors<W: Write>(
    errors: &SyntaxErrors,
    name: &str,
    source: &str,
    color: bool,
    writer: &mut W,
) -> std::io::Result<usize> {
    let mut colors = ColorGenerator::new();

    for error in errors.iter() {
        let span = error.span.start..error.span.end;
        let mut report = Report::build(ReportKind::Error, (name, span.clone()))
            .with_code(format!("P{:04}", error.kind_code()))
            .with_message(error.message())
            .with_label(
                Label::new((name, span))
                    .with_message(error.label())
                    .with_color(colors.next()),
            )
            .with_config(
                Config::default()
                    .with_compact(false)
                    .with_color(color)
                    .with_index_type(IndexType::Byte),
            );
        if let Some(hint) = &error.hint {
            report = report.with_help(hint);
        }
        report
            .finish()
            .write((name, Source::from(source)), &mut *writer)?;
    }

    Ok(errors.len())
}

/// Report a query error to the given writer.
///
/// Syntax errors in the query text get source diagnostics, everything else
/// is a one-line message.
pub fn report_query_error<W: Write>(
    error: &QueryError,
    name: &str,
    source: &str,
    color: bool,
    writer: &mut W,
) -> std::io::Result<()> {
    match error {
        QueryError::Syntax(errors) => {
            report_syntax_errors(errors, name, source, color, writer)?;
        }
        QueryError::Structural(StructuralError::PredicateBody { name: predicate, errors }) => {
            writeln!(writer, "error: body of predicate `{predicate}` does not parse")?;
            for err in errors.iter() {
                writeln!(writer, "  {err}")?;
            }
        }
        other => writeln!(writer, "error: {other}")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathql_query::build_query;

    fn render(source: &str) -> String {
        let err = build_query(source).unwrap_err();
        let mut out = Vec::new();
        report_query_error(&err, "query", source, false, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_syntax_error_report() {
        let output = render("FROM class AS c WHERE c.name == SELECT c");
        assert!(output.contains("query"));
        assert!(output.contains("unexpected"));
        assert!(output.contains("P0003"));
    }

    #[test]
    fn test_other_errors_are_one_line() {
        let output = render("FROM class AS c WHERE nope(c) SELECT c");
        assert_eq!(
            output,
            "error: predicate resolution error: undefined predicate `nope`\n"
        );
    }

    #[test]
    fn test_report_count() {
        let source = "FROM class AS WHERE c.x == SELECT";
        let Err(QueryError::Syntax(errors)) = build_query(source) else {
            panic!("expected syntax errors");
        };
        let mut out = Vec::new();
        let count = report_syntax_errors(&errors, "q", source, false, &mut out).unwrap();
        assert_eq!(count, errors.len());
    }
}

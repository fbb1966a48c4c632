//! Output formatting for CLI commands.

use circle_client::{ClientError, Envelope, Receipt};
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::error::CliError;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON `{ data, error }` envelopes.
    Json,
}

/// Print rows as a table.
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found.".dimmed());
    } else {
        println!("{}", Table::new(rows));
    }
}

/// Print a serializable value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    println!("{json}");
}

/// Print the result of a client call.
///
/// JSON mode writes the envelope, success or not; table mode hands the data
/// to `table` and leaves errors to the caller.
pub fn emit<T, F>(format: OutputFormat, result: Result<T, ClientError>, table: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(T),
{
    match format {
        OutputFormat::Json => {
            let failed = result.is_err();
            print_json(&Envelope::from(result));
            if failed {
                return Err(CliError::Reported.into());
            }
            Ok(())
        }
        OutputFormat::Table => {
            table(result?);
            Ok(())
        }
    }
}

/// Print the receipt of a state-changing call.
pub fn emit_receipt(
    format: OutputFormat,
    result: Result<Receipt, ClientError>,
    message: &str,
) -> anyhow::Result<()> {
    emit(format, result, |receipt| {
        print_success(message);
        println!("  {} {}", "Request:".dimmed(), receipt.request_id);
    })
}

pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

pub fn display_option<T: std::fmt::Display>(opt: &Option<T>) -> String {
    opt.as_ref().map_or_else(|| "-".to_string(), ToString::to_string)
}

pub fn display_list<T: std::fmt::Display>(items: &[T]) -> String {
    if items.is_empty() {
        return "-".to_string();
    }
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_helpers_use_dash_for_missing() {
        assert_eq!(display_option::<String>(&None), "-");
        assert_eq!(display_option(&Some(3)), "3");
        assert_eq!(display_list::<String>(&[]), "-");
        assert_eq!(display_list(&["a", "b"]), "a, b");
    }

    #[test]
    fn json_errors_are_reported_once() {
        let err = emit::<u8, _>(
            OutputFormat::Json,
            Err(ClientError::validation("bad")),
            |_| unreachable!(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::Reported)
        ));
    }

    #[test]
    fn table_errors_propagate() {
        let err = emit::<u8, _>(
            OutputFormat::Table,
            Err(ClientError::validation("bad")),
            |_| unreachable!(),
        )
        .unwrap_err();
        assert!(err.downcast_ref::<ClientError>().is_some());
    }
}

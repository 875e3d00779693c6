//! Interactive search command vocabulary
//!
//! Every command code maps to exactly one [`CommandKind`] through the
//! [`COMMANDS`] table, which is also what the help screen is rendered from.

use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Category,
    MfrPart,
    Description,
    Package,
    Lcsc,
    LibraryType,
    Reset,
    Search,
    StockOnly,
    OneOffPricing,
    FieldList,
    OrderField,
    ColumnSizes,
    MaxRows,
    BasicExport,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub code: &'static str,
    pub kind: CommandKind,
    /// Whether the command needs a value (given inline or prompted for)
    pub takes_value: bool,
    pub help: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        code: "C",
        kind: CommandKind::Category,
        takes_value: true,
        help: "Category filter, matches either category level (empty to pick from a list)",
    },
    CommandSpec {
        code: "M",
        kind: CommandKind::MfrPart,
        takes_value: true,
        help: "Manufacturer part number contains",
    },
    CommandSpec {
        code: "D",
        kind: CommandKind::Description,
        takes_value: true,
        help: "Description contains",
    },
    CommandSpec {
        code: "P",
        kind: CommandKind::Package,
        takes_value: true,
        help: "Package contains",
    },
    CommandSpec {
        code: "J",
        kind: CommandKind::Lcsc,
        takes_value: true,
        help: "JLCPCB/LCSC part number contains",
    },
    CommandSpec {
        code: "T",
        kind: CommandKind::LibraryType,
        takes_value: true,
        help: "Library type (Basic/Extended)",
    },
    CommandSpec {
        code: "R",
        kind: CommandKind::Reset,
        takes_value: false,
        help: "Reset all search criteria",
    },
    CommandSpec {
        code: "S",
        kind: CommandKind::Search,
        takes_value: false,
        help: "Search",
    },
    CommandSpec {
        code: "SP",
        kind: CommandKind::StockOnly,
        takes_value: false,
        help: "Toggle showing only parts in stock",
    },
    CommandSpec {
        code: "OP",
        kind: CommandKind::OneOffPricing,
        takes_value: false,
        help: "Toggle showing only parts sold in single quantities",
    },
    CommandSpec {
        code: "FL",
        kind: CommandKind::FieldList,
        takes_value: true,
        help: "Fields to display, comma separated",
    },
    CommandSpec {
        code: "OF",
        kind: CommandKind::OrderField,
        takes_value: true,
        help: "Order by field (prefix with - for descending)",
    },
    CommandSpec {
        code: "CS",
        kind: CommandKind::ColumnSizes,
        takes_value: true,
        help: "Column sizes, comma separated (empty for defaults)",
    },
    CommandSpec {
        code: "MA",
        kind: CommandKind::MaxRows,
        takes_value: true,
        help: "Maximum number of rows (0 for no limit)",
    },
    CommandSpec {
        code: "BA",
        kind: CommandKind::BasicExport,
        takes_value: false,
        help: "Export basic parts as CSV",
    },
    CommandSpec {
        code: "?",
        kind: CommandKind::Help,
        takes_value: false,
        help: "Show this help and the current criteria",
    },
    CommandSpec {
        code: "Q",
        kind: CommandKind::Quit,
        takes_value: false,
        help: "Quit",
    },
];

/// A fully specified session command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryCommand {
    SetCategory(Option<String>),
    SetMfrPart(Option<String>),
    SetDescription(Option<String>),
    SetPackage(Option<String>),
    SetLcsc(Option<String>),
    SetLibraryType(Option<String>),
    Reset,
    Search,
    ToggleStockOnly,
    ToggleOneOffPricing,
    SetFields(String),
    SetOrder(String),
    SetColumnSizes(String),
    SetMaxRows(String),
    ExportBasic,
    Help,
    Quit,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl CommandKind {
    /// Attach the user's value; commands without a value ignore it
    pub fn with_value(self, value: &str) -> QueryCommand {
        match self {
            CommandKind::Category => QueryCommand::SetCategory(non_empty(value)),
            CommandKind::MfrPart => QueryCommand::SetMfrPart(non_empty(value)),
            CommandKind::Description => QueryCommand::SetDescription(non_empty(value)),
            CommandKind::Package => QueryCommand::SetPackage(non_empty(value)),
            CommandKind::Lcsc => QueryCommand::SetLcsc(non_empty(value)),
            CommandKind::LibraryType => QueryCommand::SetLibraryType(non_empty(value)),
            CommandKind::Reset => QueryCommand::Reset,
            CommandKind::Search => QueryCommand::Search,
            CommandKind::StockOnly => QueryCommand::ToggleStockOnly,
            CommandKind::OneOffPricing => QueryCommand::ToggleOneOffPricing,
            CommandKind::FieldList => QueryCommand::SetFields(value.trim().to_string()),
            CommandKind::OrderField => QueryCommand::SetOrder(value.trim().to_string()),
            CommandKind::ColumnSizes => QueryCommand::SetColumnSizes(value.trim().to_string()),
            CommandKind::MaxRows => QueryCommand::SetMaxRows(value.trim().to_string()),
            CommandKind::BasicExport => QueryCommand::ExportBasic,
            CommandKind::Help => QueryCommand::Help,
            CommandKind::Quit => QueryCommand::Quit,
        }
    }
}

pub fn lookup(code: &str) -> Option<&'static CommandSpec> {
    let code = code.trim();
    COMMANDS.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Split an input line into its command and optional inline value.
///
/// `M ADS1115` yields the `M` command with value `ADS1115`; a bare `M`
/// yields no value so the caller can prompt for one.
pub fn parse_line(line: &str) -> Result<(&'static CommandSpec, Option<String>)> {
    let line = line.trim();
    let (code, rest) = match line.split_once(char::is_whitespace) {
        Some((code, rest)) => (code, Some(rest.trim().to_string())),
        None => (line, None),
    };
    let spec = lookup(code).ok_or_else(|| CatalogError::UnknownCommand(code.to_string()))?;
    let value = if spec.takes_value { rest } else { None };
    Ok((spec, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in COMMANDS.iter().enumerate() {
            for b in &COMMANDS[i + 1..] {
                assert_ne!(a.code, b.code);
                assert_ne!(a.kind, b.kind);
            }
        }
    }

    #[test]
    fn test_vocabulary_is_complete() {
        for code in [
            "C", "M", "D", "P", "J", "T", "R", "S", "SP", "OP", "FL", "OF", "CS", "MA", "BA",
        ] {
            assert!(lookup(code).is_some(), "missing command {code}");
        }
    }

    #[test]
    fn test_parse_line() {
        let (spec, value) = parse_line("m ADS1115").unwrap();
        assert_eq!(spec.kind, CommandKind::MfrPart);
        assert_eq!(value.as_deref(), Some("ADS1115"));

        let (spec, value) = parse_line("  FL  LCSC, Stock ").unwrap();
        assert_eq!(spec.kind, CommandKind::FieldList);
        assert_eq!(value.as_deref(), Some("LCSC, Stock"));

        let (spec, value) = parse_line("sp").unwrap();
        assert_eq!(spec.kind, CommandKind::StockOnly);
        assert_eq!(value, None);

        let (_, value) = parse_line("D").unwrap();
        assert_eq!(value, None);

        assert!(matches!(
            parse_line("XX"),
            Err(CatalogError::UnknownCommand(code)) if code == "XX"
        ));
    }

    #[test]
    fn test_with_value() {
        assert_eq!(
            CommandKind::Package.with_value(" SOIC-8 "),
            QueryCommand::SetPackage(Some("SOIC-8".to_string()))
        );
        assert_eq!(
            CommandKind::Category.with_value(""),
            QueryCommand::SetCategory(None)
        );
        assert_eq!(CommandKind::Search.with_value("ignored"), QueryCommand::Search);
    }
}

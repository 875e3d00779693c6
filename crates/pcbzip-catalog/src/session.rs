//! Stateful search session driven by interactive commands

use std::fmt::Write as _;

use crate::command::{QueryCommand, COMMANDS};
use crate::error::{CatalogError, Result};
use crate::model::{parse_field_list, CatalogField};
use crate::store::{CatalogFilter, CatalogQuery, CatalogStore, OrderBy, QueryResult};
use crate::table::{render_csv, render_table};

pub const DEFAULT_FIELDS: [CatalogField; 7] = [
    CatalogField::Lcsc,
    CatalogField::MfrPart,
    CatalogField::Package,
    CatalogField::LibraryType,
    CatalogField::Stock,
    CatalogField::Price,
    CatalogField::Description,
];

pub const DEFAULT_MAX_ROWS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub filter: CatalogFilter,
    pub fields: Vec<CatalogField>,
    /// User supplied column widths; `None` uses each field's default width
    pub widths: Option<Vec<usize>>,
    pub order_by: Option<OrderBy>,
    /// 0 means no limit
    pub max_rows: usize,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            filter: CatalogFilter::default(),
            fields: DEFAULT_FIELDS.to_vec(),
            widths: None,
            order_by: None,
            max_rows: DEFAULT_MAX_ROWS,
        }
    }
}

impl SearchCriteria {
    pub fn effective_widths(&self) -> Vec<usize> {
        match &self.widths {
            Some(widths) => widths.clone(),
            None => self.fields.iter().map(|f| f.default_width()).collect(),
        }
    }

    pub fn to_query(&self) -> CatalogQuery {
        CatalogQuery {
            filter: self.filter.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| f.display_name().to_string())
                .collect(),
            order_by: self.order_by.clone(),
            limit: Some(self.max_rows),
        }
    }

    /// One line per criterion, for the help screen
    pub fn summary(&self) -> String {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let on_off = |b: bool| if b { "on" } else { "off" };
        let filter = &self.filter;
        let fields = self
            .fields
            .iter()
            .map(|f| f.display_name())
            .collect::<Vec<_>>()
            .join(",");
        let widths = self
            .effective_widths()
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let order = match &self.order_by {
            Some(o) if o.descending => format!("-{}", o.field),
            Some(o) => o.field.clone(),
            None => "-".to_string(),
        };
        let max = match self.max_rows {
            0 => "unlimited".to_string(),
            n => n.to_string(),
        };

        let mut out = String::new();
        let _ = writeln!(out, "Category:         {}", show(&filter.category));
        let _ = writeln!(out, "MFR.Part:         {}", show(&filter.mfr_part));
        let _ = writeln!(out, "Description:      {}", show(&filter.description));
        let _ = writeln!(out, "Package:          {}", show(&filter.package));
        let _ = writeln!(out, "LCSC:             {}", show(&filter.lcsc));
        let _ = writeln!(out, "Library type:     {}", show(&filter.library_type));
        let _ = writeln!(out, "In stock only:    {}", on_off(filter.in_stock));
        let _ = writeln!(out, "One-off pricing:  {}", on_off(filter.one_off_pricing));
        let _ = writeln!(out, "Fields:           {fields}");
        let _ = writeln!(out, "Column sizes:     {widths}");
        let _ = writeln!(out, "Order by:         {order}");
        let _ = writeln!(out, "Max rows:         {max}");
        out
    }
}

/// What a command produced, for the caller to display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutput {
    /// Criteria changed, nothing to show
    Updated,
    Table { text: String, rows: usize },
    Export { csv: String, rows: usize },
    Help(String),
    Quit,
}

#[derive(Debug, Clone, Default)]
pub struct QuerySession {
    criteria: SearchCriteria,
}

impl QuerySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn set_fields(&mut self, fields: Vec<CatalogField>) -> Result<()> {
        let fields = if fields.is_empty() {
            DEFAULT_FIELDS.to_vec()
        } else {
            fields
        };
        if let Some(widths) = &self.criteria.widths {
            if widths.len() != fields.len() {
                return Err(CatalogError::FieldWidthMismatch {
                    fields: fields.len(),
                    widths: widths.len(),
                });
            }
        }
        self.criteria.fields = fields;
        Ok(())
    }

    /// `None` reverts to per-field default widths
    pub fn set_widths(&mut self, widths: Option<Vec<usize>>) -> Result<()> {
        if let Some(widths) = &widths {
            if widths.len() != self.criteria.fields.len() {
                return Err(CatalogError::FieldWidthMismatch {
                    fields: self.criteria.fields.len(),
                    widths: widths.len(),
                });
            }
        }
        self.criteria.widths = widths;
        Ok(())
    }

    pub fn execute(&self, store: &CatalogStore) -> Result<QueryResult> {
        store.query(&self.criteria.to_query())
    }

    pub fn render(&self, result: &QueryResult) -> String {
        render_table(result, &self.criteria.effective_widths())
    }

    /// Basic parts matching the current criteria, every field and every row, as CSV
    pub fn export_basic(&self, store: &CatalogStore) -> Result<(String, usize)> {
        let mut query = self.criteria.to_query();
        query.filter.library_type = Some("Basic".to_string());
        query.fields.clear();
        query.limit = None;
        let result = store.query(&query)?;
        Ok((render_csv(&result)?, result.rows.len()))
    }

    pub fn help(&self) -> String {
        let mut out = String::from("Commands:\n");
        for spec in COMMANDS {
            let _ = writeln!(out, "  {:<3} {}", spec.code, spec.help);
        }
        out.push_str("\nCurrent search:\n");
        out.push_str(&self.criteria.summary());
        out
    }

    /// Apply one command. On error the criteria are left unchanged.
    pub fn apply(&mut self, command: QueryCommand, store: &CatalogStore) -> Result<SessionOutput> {
        match command {
            QueryCommand::SetCategory(v) => self.criteria.filter.category = v,
            QueryCommand::SetMfrPart(v) => self.criteria.filter.mfr_part = v,
            QueryCommand::SetDescription(v) => self.criteria.filter.description = v,
            QueryCommand::SetPackage(v) => self.criteria.filter.package = v,
            QueryCommand::SetLcsc(v) => self.criteria.filter.lcsc = v,
            QueryCommand::SetLibraryType(v) => self.criteria.filter.library_type = v,
            QueryCommand::ToggleStockOnly => {
                self.criteria.filter.in_stock = !self.criteria.filter.in_stock
            }
            QueryCommand::ToggleOneOffPricing => {
                self.criteria.filter.one_off_pricing = !self.criteria.filter.one_off_pricing
            }
            QueryCommand::Reset => self.criteria = SearchCriteria::default(),
            QueryCommand::SetFields(list) => self.set_fields(parse_field_list(&list)?)?,
            QueryCommand::SetOrder(order) => self.criteria.order_by = OrderBy::parse(&order)?,
            QueryCommand::SetColumnSizes(list) => self.set_widths(parse_widths(&list)?)?,
            QueryCommand::SetMaxRows(count) => {
                self.criteria.max_rows = count
                    .trim()
                    .parse()
                    .map_err(|_| CatalogError::InvalidCount(count.clone()))?;
            }
            QueryCommand::Search => {
                let result = self.execute(store)?;
                return Ok(SessionOutput::Table {
                    text: self.render(&result),
                    rows: result.rows.len(),
                });
            }
            QueryCommand::ExportBasic => {
                let (csv, rows) = self.export_basic(store)?;
                return Ok(SessionOutput::Export { csv, rows });
            }
            QueryCommand::Help => return Ok(SessionOutput::Help(self.help())),
            QueryCommand::Quit => return Ok(SessionOutput::Quit),
        }
        Ok(SessionOutput::Updated)
    }
}

/// Parse `10,20,8`; empty input means default widths
fn parse_widths(list: &str) -> Result<Option<Vec<usize>>> {
    let list = list.trim();
    if list.is_empty() {
        return Ok(None);
    }
    list.split(',')
        .map(|w| {
            let w = w.trim();
            match w.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(CatalogError::InvalidWidth(w.to_string())),
            }
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

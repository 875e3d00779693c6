use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

/// JLCPCB assembly library classification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum LibraryType {
    Basic,
    Extended,
    #[default]
    Unknown,
    Other(String),
}

impl LibraryType {
    pub fn as_str(&self) -> &str {
        match self {
            LibraryType::Basic => "Basic",
            LibraryType::Extended => "Extended",
            LibraryType::Unknown => "",
            LibraryType::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() {
            LibraryType::Unknown
        } else if s.eq_ignore_ascii_case("basic") {
            LibraryType::Basic
        } else if s.eq_ignore_ascii_case("extended") {
            LibraryType::Extended
        } else {
            LibraryType::Other(s.to_string())
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One supplier component as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CatalogRow {
    /// Supplier part number, e.g. `C375`
    pub lcsc: String,
    pub first_category: String,
    pub second_category: String,
    pub mfr_part: String,
    pub package: String,
    pub solder_joint: String,
    pub manufacturer: String,
    pub library_type: LibraryType,
    pub description: String,
    pub datasheet: String,
    /// Tiered price string, kept as the supplier wrote it
    pub price: String,
    pub stock: i64,
}

impl CatalogRow {
    /// Render one field for display or export
    pub fn value(&self, field: CatalogField) -> String {
        match field {
            CatalogField::Lcsc => self.lcsc.clone(),
            CatalogField::FirstCategory => self.first_category.clone(),
            CatalogField::SecondCategory => self.second_category.clone(),
            CatalogField::MfrPart => self.mfr_part.clone(),
            CatalogField::Package => self.package.clone(),
            CatalogField::SolderJoint => self.solder_joint.clone(),
            CatalogField::Manufacturer => self.manufacturer.clone(),
            CatalogField::LibraryType => self.library_type.to_string(),
            CatalogField::Description => self.description.clone(),
            CatalogField::Datasheet => self.datasheet.clone(),
            CatalogField::Price => self.price.clone(),
            CatalogField::Stock => self.stock.to_string(),
        }
    }
}

/// Columns of the catalog, in storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogField {
    Lcsc,
    FirstCategory,
    SecondCategory,
    MfrPart,
    Package,
    SolderJoint,
    Manufacturer,
    LibraryType,
    Description,
    Datasheet,
    Price,
    Stock,
}

impl CatalogField {
    pub const ALL: [CatalogField; 12] = [
        CatalogField::Lcsc,
        CatalogField::FirstCategory,
        CatalogField::SecondCategory,
        CatalogField::MfrPart,
        CatalogField::Package,
        CatalogField::SolderJoint,
        CatalogField::Manufacturer,
        CatalogField::LibraryType,
        CatalogField::Description,
        CatalogField::Datasheet,
        CatalogField::Price,
        CatalogField::Stock,
    ];

    /// Header text used by the supplier export and in result tables
    pub fn display_name(self) -> &'static str {
        match self {
            CatalogField::Lcsc => "LCSC",
            CatalogField::FirstCategory => "First Category",
            CatalogField::SecondCategory => "Second Category",
            CatalogField::MfrPart => "MFR.Part",
            CatalogField::Package => "Package",
            CatalogField::SolderJoint => "Solder Joint",
            CatalogField::Manufacturer => "Manufacturer",
            CatalogField::LibraryType => "Library Type",
            CatalogField::Description => "Description",
            CatalogField::Datasheet => "Datasheet",
            CatalogField::Price => "Price",
            CatalogField::Stock => "Stock",
        }
    }

    /// SQL column name in the `parts` table
    pub fn column(self) -> &'static str {
        match self {
            CatalogField::Lcsc => "lcsc",
            CatalogField::FirstCategory => "first_category",
            CatalogField::SecondCategory => "second_category",
            CatalogField::MfrPart => "mfr_part",
            CatalogField::Package => "package",
            CatalogField::SolderJoint => "solder_joint",
            CatalogField::Manufacturer => "manufacturer",
            CatalogField::LibraryType => "library_type",
            CatalogField::Description => "description",
            CatalogField::Datasheet => "datasheet",
            CatalogField::Price => "price",
            CatalogField::Stock => "stock",
        }
    }

    pub fn default_width(self) -> usize {
        match self {
            CatalogField::Lcsc => 9,
            CatalogField::FirstCategory | CatalogField::SecondCategory => 20,
            CatalogField::MfrPart => 20,
            CatalogField::Package => 16,
            CatalogField::SolderJoint => 6,
            CatalogField::Manufacturer => 16,
            CatalogField::LibraryType => 8,
            CatalogField::Description => 40,
            CatalogField::Datasheet => 30,
            CatalogField::Price => 20,
            CatalogField::Stock => 8,
        }
    }

    /// Alternative header spellings seen across supplier exports (lowercase)
    fn aliases(self) -> &'static [&'static str] {
        match self {
            CatalogField::Lcsc => &[
                "lcsc",
                "lcsc part",
                "lcsc part #",
                "lcsc part number",
                "jlcpcb part",
                "jlcpcb part #",
            ],
            CatalogField::FirstCategory => &["first category", "category"],
            CatalogField::SecondCategory => &["second category", "subcategory"],
            CatalogField::MfrPart => &["mfr.part", "mfr part", "manufacturer part", "mpn"],
            CatalogField::Package => &["package", "footprint"],
            CatalogField::SolderJoint => &["solder joint", "solder joints"],
            CatalogField::Manufacturer => &["manufacturer"],
            CatalogField::LibraryType => &["library type", "type"],
            CatalogField::Description => &["description"],
            CatalogField::Datasheet => &["datasheet"],
            CatalogField::Price => &["price"],
            CatalogField::Stock => &["stock"],
        }
    }

    /// Match a header or user-entered field name, ignoring case and padding
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        Self::ALL.into_iter().find(|field| {
            field.column() == name
                || field.display_name().to_lowercase() == name
                || field.aliases().contains(&name.as_str())
        })
    }
}

impl FromStr for CatalogField {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| CatalogError::InvalidField(s.trim().to_string()))
    }
}

impl fmt::Display for CatalogField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Parse a comma separated list of field names
pub fn parse_field_list(s: &str) -> Result<Vec<CatalogField>, CatalogError> {
    s.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup_accepts_aliases() {
        assert_eq!(CatalogField::lookup("LCSC Part"), Some(CatalogField::Lcsc));
        assert_eq!(CatalogField::lookup(" mfr.part "), Some(CatalogField::MfrPart));
        assert_eq!(CatalogField::lookup("Library Type"), Some(CatalogField::LibraryType));
        assert_eq!(CatalogField::lookup("first_category"), Some(CatalogField::FirstCategory));
        assert_eq!(CatalogField::lookup("Category"), Some(CatalogField::FirstCategory));
        assert_eq!(CatalogField::lookup("colour"), None);
        assert_eq!(CatalogField::lookup(""), None);
    }

    #[test]
    fn test_parse_field_list() {
        let fields = parse_field_list("LCSC, MFR.Part,stock").unwrap();
        assert_eq!(
            fields,
            vec![CatalogField::Lcsc, CatalogField::MfrPart, CatalogField::Stock]
        );

        let err = parse_field_list("LCSC,Colour").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidField(name) if name == "Colour"));
    }

    #[test]
    fn test_library_type_parse() {
        assert_eq!(LibraryType::parse("Basic"), LibraryType::Basic);
        assert_eq!(LibraryType::parse("extended"), LibraryType::Extended);
        assert_eq!(LibraryType::parse(""), LibraryType::Unknown);
        assert_eq!(
            LibraryType::parse("Preferred"),
            LibraryType::Other("Preferred".to_string())
        );
        assert_eq!(LibraryType::parse("Preferred").as_str(), "Preferred");
    }
}

/// One row of an assembly BOM
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BomLine {
    /// Component value, e.g. `100n`
    pub comment: String,
    /// Comma joined references, e.g. `C1,C2`
    pub designator: String,
    pub footprint: String,
    /// Supplier part number; empty means the part is not fitted
    pub part_number: String,
}

impl BomLine {
    pub fn new(comment: &str, designator: &str, footprint: &str, part_number: &str) -> Self {
        Self {
            comment: comment.to_string(),
            designator: designator.to_string(),
            footprint: footprint.to_string(),
            part_number: part_number.to_string(),
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.part_number.is_empty()
    }

    /// Number of references covered by this line
    pub fn quantity(&self) -> usize {
        self.designator
            .split(',')
            .filter(|d| !d.trim().is_empty())
            .count()
    }
}

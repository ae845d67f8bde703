//! Domain data shapes shared across layers

pub mod category;
pub mod records;

pub use category::{
    extract_prefix, resolve_category, CategoryCode, MarketingCategory, NoCategory,
    ProcessingCategory, ProductionCategory,
};
pub use records::{
    ExportationRecord, ImportationRecord, MarketingRecord, ProcessingRecord, ProductionRecord,
};

use crate::constants;
use crate::error::{IngestError, Result};
use crate::pipeline::processing::table::Cell;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;
use std::str::FromStr;

/// The datasets published by the Vitibrasil site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Production,
    Processing,
    Marketing,
    Importation,
    Exportation,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::Production,
        Dataset::Processing,
        Dataset::Marketing,
        Dataset::Importation,
        Dataset::Exportation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Production => "production",
            Dataset::Processing => "processing",
            Dataset::Marketing => "marketing",
            Dataset::Importation => "importation",
            Dataset::Exportation => "exportation",
        }
    }

    /// The `opcao` query value of the dataset's landing page.
    pub fn option_code(&self) -> &'static str {
        match self {
            Dataset::Production => constants::PRODUCTION_OPTION,
            Dataset::Processing => constants::PROCESSING_OPTION,
            Dataset::Marketing => constants::MARKETING_OPTION,
            Dataset::Importation => constants::IMPORTATION_OPTION,
            Dataset::Exportation => constants::EXPORTATION_OPTION,
        }
    }

    /// Canonical field delimiter of the published file and of its cache entry.
    pub fn delimiter(&self) -> u8 {
        match self {
            Dataset::Production | Dataset::Processing | Dataset::Marketing => b';',
            Dataset::Importation | Dataset::Exportation => b'\t',
        }
    }

    pub fn value_field(&self) -> &'static str {
        match self {
            Dataset::Production => ProductionRecord::VALUE_FIELD,
            Dataset::Processing => ProcessingRecord::VALUE_FIELD,
            Dataset::Marketing => MarketingRecord::VALUE_FIELD,
            Dataset::Importation => ImportationRecord::VALUE_FIELD,
            Dataset::Exportation => ExportationRecord::VALUE_FIELD,
        }
    }

    pub fn landing_url(&self, base_url: &str) -> String {
        format!("{}?opcao={}", base_url, self.option_code())
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dataset {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        Dataset::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| IngestError::Config(format!("unknown dataset '{}'", s)))
    }
}

/// A typed record of one dataset, declared statically.
pub trait DatasetRecord: Sized + Serialize + DeserializeOwned + fmt::Debug + Send {
    type Category: CategoryCode;

    /// Fields in output order.
    const FIELDS: &'static [&'static str];

    /// Lower-cased source column label -> field name.
    const COLUMN_TRANSLATIONS: &'static [(&'static str, &'static str)];

    const VALUE_FIELD: &'static str;

    /// Build a record from the mapped fields of one reshaped row. `seq` is the
    /// 1-based position of the row in the batch.
    fn from_fields(fields: &FieldMap, seq: usize) -> Result<Self>;
}

/// The schema fields present on one reshaped row.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    values: HashMap<&'static str, Cell>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: &'static str, cell: Cell) {
        self.values.insert(field, cell);
    }

    pub fn get(&self, field: &str) -> Option<&Cell> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn required(&self, field: &str, seq: usize) -> Result<&Cell> {
        match self.values.get(field) {
            Some(Cell::Missing) | None => {
                Err(IngestError::row(seq, format!("missing field '{}'", field)))
            }
            Some(cell) => Ok(cell),
        }
    }

    pub fn text(&self, field: &str, seq: usize) -> Result<String> {
        self.required(field, seq)?
            .to_text()
            .ok_or_else(|| IngestError::row(seq, format!("field '{}' is empty", field)))
    }

    pub fn optional_text(&self, field: &str) -> Option<String> {
        self.values
            .get(field)
            .and_then(Cell::to_text)
            .filter(|s| !s.is_empty())
    }

    pub fn number(&self, field: &str, seq: usize) -> Result<f64> {
        self.required(field, seq)?
            .as_number()
            .ok_or_else(|| IngestError::row(seq, format!("field '{}' is not numeric", field)))
    }

    pub fn year(&self, seq: usize) -> Result<i32> {
        let year = self.number("year", seq)?;
        if year.fract() != 0.0 || !(1000.0..=9999.0).contains(&year) {
            return Err(IngestError::row(seq, format!("year {} out of range", year)));
        }
        Ok(year as i32)
    }

    /// Source id when it holds an integer, the batch position otherwise.
    pub fn id_or_sequence(&self, seq: usize) -> i64 {
        self.values
            .get("id")
            .and_then(Cell::as_number)
            .filter(|n| n.fract() == 0.0)
            .map(|n| n as i64)
            .unwrap_or(seq as i64)
    }

    /// Category for a row. An explicitly supplied `category` text skips
    /// resolution: it is kept when it names a known category and left absent
    /// otherwise. Without one, the category is resolved from the control token.
    pub fn category<C: CategoryCode>(&self, control: &str) -> Result<Option<C>> {
        // Zero-filled empty cells arrive as numbers and count as not supplied
        if let Some(Cell::Text(supplied)) = self.values.get("category") {
            let supplied = supplied.trim();
            if !supplied.is_empty() {
                let found = C::from_code(&supplied.to_uppercase())
                    .or_else(|| category_from_label::<C>(supplied));
                if found.is_none() {
                    debug!(category = supplied, "Supplied category not recognised, left absent");
                }
                return Ok(found);
            }
        }
        if control.is_empty() {
            return Ok(None);
        }
        resolve_category::<C>(control).map(Some)
    }
}

// Categories serialize as their label.
fn category_from_label<C: CategoryCode>(label: &str) -> Option<C> {
    serde_json::from_value::<C>(serde_json::Value::String(label.to_string())).ok()
}

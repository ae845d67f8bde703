//! One record type per dataset, each with its static column translation table.

use super::category::{MarketingCategory, NoCategory, ProcessingCategory, ProductionCategory};
use super::{DatasetRecord, FieldMap};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub id: i64,
    pub control: String,
    pub product: String,
    pub category: Option<ProductionCategory>,
    pub year: i32,
    pub production: f64,
}

impl DatasetRecord for ProductionRecord {
    type Category = ProductionCategory;

    const FIELDS: &'static [&'static str] =
        &["id", "control", "product", "category", "year", "production"];
    const COLUMN_TRANSLATIONS: &'static [(&'static str, &'static str)] =
        &[("id", "id"), ("control", "control"), ("produto", "product")];
    const VALUE_FIELD: &'static str = "production";

    fn from_fields(fields: &FieldMap, seq: usize) -> Result<Self> {
        let control = fields.optional_text("control").unwrap_or_default();
        let category = fields.category::<Self::Category>(&control)?;
        Ok(Self {
            id: fields.id_or_sequence(seq),
            product: fields.text("product", seq)?,
            category,
            year: fields.year(seq)?,
            production: fields.number(Self::VALUE_FIELD, seq)?,
            control,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub id: i64,
    pub control: String,
    pub cultivar: String,
    pub category: Option<ProcessingCategory>,
    pub year: i32,
    pub processing: f64,
}

impl DatasetRecord for ProcessingRecord {
    type Category = ProcessingCategory;

    const FIELDS: &'static [&'static str] =
        &["id", "control", "cultivar", "category", "year", "processing"];
    const COLUMN_TRANSLATIONS: &'static [(&'static str, &'static str)] =
        &[("id", "id"), ("control", "control"), ("cultivar", "cultivar")];
    const VALUE_FIELD: &'static str = "processing";

    fn from_fields(fields: &FieldMap, seq: usize) -> Result<Self> {
        let control = fields.optional_text("control").unwrap_or_default();
        let category = fields.category::<Self::Category>(&control)?;
        Ok(Self {
            id: fields.id_or_sequence(seq),
            cultivar: fields.text("cultivar", seq)?,
            category,
            year: fields.year(seq)?,
            processing: fields.number(Self::VALUE_FIELD, seq)?,
            control,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketingRecord {
    pub id: i64,
    pub control: String,
    pub product: String,
    pub category: Option<MarketingCategory>,
    pub year: i32,
    pub marketing: f64,
}

impl DatasetRecord for MarketingRecord {
    type Category = MarketingCategory;

    const FIELDS: &'static [&'static str] =
        &["id", "control", "product", "category", "year", "marketing"];
    const COLUMN_TRANSLATIONS: &'static [(&'static str, &'static str)] =
        &[("id", "id"), ("control", "control"), ("produto", "product")];
    const VALUE_FIELD: &'static str = "marketing";

    fn from_fields(fields: &FieldMap, seq: usize) -> Result<Self> {
        let control = fields.optional_text("control").unwrap_or_default();
        let category = fields.category::<Self::Category>(&control)?;
        Ok(Self {
            id: fields.id_or_sequence(seq),
            product: fields.text("product", seq)?,
            category,
            year: fields.year(seq)?,
            marketing: fields.number(Self::VALUE_FIELD, seq)?,
            control,
        })
    }
}

// Trade tables are keyed by country and carry no control column.
const TRADE_TRANSLATIONS: &[(&str, &str)] = &[("id", "id"), ("país", "country"), ("pais", "country")];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportationRecord {
    pub id: i64,
    pub country: String,
    pub year: i32,
    pub importation: f64,
}

impl DatasetRecord for ImportationRecord {
    type Category = NoCategory;

    const FIELDS: &'static [&'static str] = &["id", "country", "year", "importation"];
    const COLUMN_TRANSLATIONS: &'static [(&'static str, &'static str)] = TRADE_TRANSLATIONS;
    const VALUE_FIELD: &'static str = "importation";

    fn from_fields(fields: &FieldMap, seq: usize) -> Result<Self> {
        Ok(Self {
            id: fields.id_or_sequence(seq),
            country: fields.text("country", seq)?,
            year: fields.year(seq)?,
            importation: fields.number(Self::VALUE_FIELD, seq)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportationRecord {
    pub id: i64,
    pub country: String,
    pub year: i32,
    pub exportation: f64,
}

impl DatasetRecord for ExportationRecord {
    type Category = NoCategory;

    const FIELDS: &'static [&'static str] = &["id", "country", "year", "exportation"];
    const COLUMN_TRANSLATIONS: &'static [(&'static str, &'static str)] = TRADE_TRANSLATIONS;
    const VALUE_FIELD: &'static str = "exportation";

    fn from_fields(fields: &FieldMap, seq: usize) -> Result<Self> {
        Ok(Self {
            id: fields.id_or_sequence(seq),
            country: fields.text("country", seq)?,
            year: fields.year(seq)?,
            exportation: fields.number(Self::VALUE_FIELD, seq)?,
        })
    }
}

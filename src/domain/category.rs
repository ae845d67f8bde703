//! Category codes derived from the `control` column.
//!
//! Each dataset has a closed set of categories. The category is encoded as the
//! prefix of the control token, e.g. `VM_TINTO` belongs to `VM` (Vinho de Mesa).

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A closed category enumeration for one dataset.
pub trait CategoryCode: Sized + Copy + Debug + Serialize + for<'de> Deserialize<'de> {
    /// Look up an upper-cased code. `None` for codes outside the set.
    fn from_code(code: &str) -> Option<Self>;

    fn code(&self) -> &'static str;

    fn label(&self) -> &'static str;
}

/// Marker for datasets without categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoCategory {}

impl CategoryCode for NoCategory {
    fn from_code(_code: &str) -> Option<Self> {
        None
    }

    fn code(&self) -> &'static str {
        match *self {}
    }

    fn label(&self) -> &'static str {
        match *self {}
    }
}

/// Prefix of `control` before the first underscore, or its first character
/// when there is no underscore.
pub fn extract_prefix(control: &str) -> &str {
    match control.find('_') {
        Some(pos) => &control[..pos],
        None => control
            .char_indices()
            .nth(1)
            .map(|(idx, _)| &control[..idx])
            .unwrap_or(control),
    }
}

/// Resolve the category for a control token.
pub fn resolve_category<C: CategoryCode>(control: &str) -> Result<C> {
    let code = extract_prefix(control).to_uppercase();
    C::from_code(&code).ok_or(IngestError::InvalidCategoryCode { code })
}

macro_rules! category_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => ($code:literal, $label:literal)),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl CategoryCode for $name {
            fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }
    };
}

category_enum! {
    /// Production dataset (`opt_02`).
    ProductionCategory {
        VinhoDeMesa => ("VM", "Vinho de Mesa"),
        VinhoFinoDeMesa => ("VV", "Vinho Fino de Mesa (Vinifera)"),
        Suco => ("SU", "Suco"),
        Derivados => ("DE", "Derivados"),
    }
}

category_enum! {
    /// Processing dataset (`opt_03`). `TI`/`BR` are the grape colour groups
    /// used by the published processing file.
    ProcessingCategory {
        Processamento => ("PR", "Processamento"),
        Armazenamento => ("AR", "Armazenamento"),
        Tintas => ("TI", "Tintas"),
        BrancasERosadas => ("BR", "Brancas e Rosadas"),
    }
}

category_enum! {
    /// Marketing dataset (`opt_04`).
    MarketingCategory {
        VinhoDeMesa => ("VM", "Vinho de Mesa"),
        VinhoFinoDeMesa => ("VV", "Vinho Fino de Mesa (Vinifera)"),
        VinhoEspecial => ("VE", "Vinho Especial"),
        Espumantes => ("ES", "Espumantes"),
        SucosDeUva => ("SU", "Sucos de Uva"),
        OutrosProdutos => ("OU", "Outros Produtos Comercializados"),
    }
}

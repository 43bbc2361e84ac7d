//! Domain types for FeatureLab

pub mod bar;

pub use bar::{Bar, BarError, PriceTable, SortOrder};

/// Symbol type alias
pub type Symbol = String;

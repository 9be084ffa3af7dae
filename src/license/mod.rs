//! License string normalization.
//!
//! - [`table`]: canonical identifiers, known aliases, keyword fallback rules,
//!   and [`LicenseRisk`](table::LicenseRisk) classes.
//! - [`expression`]: compound `AND`/`OR`/`WITH` expressions over canonical ids.
//! - [`normalize`]: entry point mapping raw declarations to a
//!   [`CanonicalLicense`](crate::models::CanonicalLicense).

pub mod expression;
pub mod normalize;
pub mod table;

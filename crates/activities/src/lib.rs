//! Activities domain module.
//!
//! Crop-cycle records with their product lines and fertigation days, the pure
//! cost aggregation run before every write, per-crop summaries, and reusable
//! product templates.

pub mod activity;
pub mod costing;
pub mod summary;
pub mod template;

pub use activity::{
    Activity, ActivityDraft, ActivityFilter, ActivityId, AreaUnit, CadastralReference,
    FertigationDay, GeoPoint, ProductCategory, ProductUsage,
};
pub use costing::{CostBreakdown, compute_costs, product_lines_cost};
pub use summary::{CropSummary, summarize_by_crop};
pub use template::{NewTemplate, Template, TemplateId, TemplateKind};

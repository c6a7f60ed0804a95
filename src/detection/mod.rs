// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Detection system
///
/// - types:  Frame / BBox / Detection shared by model, filter and renderer
/// - filter: confidence + target-class filter, alert-class classification
pub mod filter;
pub mod types;

pub use filter::{filter, DetectionFilter, FilterOutcome};
pub use types::{BBox, Detection, Frame};

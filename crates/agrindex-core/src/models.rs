pub mod field;
pub mod index;
pub mod plan;
pub mod scene;
pub mod trigger;

pub use field::{BoundingBox, FieldGeometry, Position, ProjectedRing};
pub use index::{IndexComputationRequest, IndexDefinition};
pub use plan::{OrchestrationPlan, WorkflowInput, WorkflowPayload};
pub use scene::{BandAsset, CatalogQuery, SceneMatch};
pub use trigger::TriggerRef;

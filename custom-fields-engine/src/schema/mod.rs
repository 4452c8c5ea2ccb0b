//! Schema hierarchy model and orphaned-field reconciliation.

mod index;
mod reconcile;

pub use index::{
    FieldPlacement, IndexedSection, IndexedSubsection, SchemaIndex, SectionOrigin,
    GENERAL_SECTION_NAME,
};
pub use reconcile::{placed_field_ids, reconcile_orphans, OrphanSource, Reconciliation};

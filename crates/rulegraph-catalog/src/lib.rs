//! Rulegraph catalog: the vocabulary every other crate speaks.
//!
//! This crate is the leaf of the workspace. It defines:
//!
//! - `tag`: the string-encoded type tags (`ord_document`, `ord_link_array`, …)
//!   used for connection compatibility between blocks,
//! - `catalog`: the read-only snapshot of collections, link types, views and
//!   variables that an editing session is built against, and
//! - `master`: the authoring context (rule, function, link, value) and the
//!   seed variables it implies.
//!
//! The engine crate treats a `Catalog` as immutable for the lifetime of a
//! session. Hosts that change the catalog rebuild the session.

pub mod catalog;
pub mod error;
pub mod master;
pub mod tag;

pub use catalog::{Attribute, Catalog, Collection, ConstraintKind, LinkType, Query, QueryStem, SeedVariable, View};
pub use error::CatalogError;
pub use master::{AutomationTarget, MasterBlockType, RuleEntity, RuleTrigger, Visibility};
pub use tag::{
    entity_id_of, link_array_tag, link_tag, record_array_tag, record_tag, suffix_of, EntityId,
    ScalarType, Suffix, TagParseError, TypeTag, UNRESOLVED_TAG,
};

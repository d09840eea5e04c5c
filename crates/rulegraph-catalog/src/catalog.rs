//! Domain catalog: the session-immutable snapshot of collections, link types,
//! views and variables the host application hands to an editing session.
//!
//! The JSON form mirrors the host contract (camelCase keys), so a catalog can be
//! loaded straight from what the host already serializes.

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::tag::{EntityId, TypeTag};

/// Attribute constraint kinds. Only `Files` has meaning for the engine (it
/// filters attachment pickers); the rest is carried for labels and tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    #[default]
    None,
    Text,
    Number,
    Boolean,
    Date,
    Select,
    User,
    Files,
    Address,
    Coordinates,
    Percentage,
    Duration,
    Color,
    Link,
    View,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub constraint_type: ConstraintKind,
}

impl Attribute {
    pub fn is_file(&self) -> bool {
        self.constraint_type == ConstraintKind::Files
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_attribute_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkType {
    pub id: EntityId,
    pub name: String,
    /// Link types connect exactly two collections (possibly the same one twice).
    pub collection_ids: [EntityId; 2],
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl LinkType {
    /// The collection on the other side of `collection_id`.
    ///
    /// For a self-link both sides match and the answer is the collection itself.
    pub fn counterpart(&self, collection_id: &str) -> Option<&str> {
        let [a, b] = &self.collection_ids;
        if a == collection_id {
            Some(b)
        } else if b == collection_id {
            Some(a)
        } else {
            None
        }
    }

    pub fn connects(&self, collection_id: &str) -> bool {
        self.collection_ids.iter().any(|c| c == collection_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStem {
    pub collection_id: EntityId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub stems: Vec<QueryStem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub query: Query,
}

/// A variable the host seeds into the graph (`newRecord`, `thisLink`, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_type_id: Option<EntityId>,
    /// The variable holds an array of records/links rather than a single one.
    #[serde(default)]
    pub list: bool,
}

impl SeedVariable {
    pub fn record(name: &str, collection_id: &str) -> Self {
        Self {
            name: name.to_string(),
            collection_id: Some(collection_id.to_string()),
            link_type_id: None,
            list: false,
        }
    }

    pub fn records(name: &str, collection_id: &str) -> Self {
        Self {
            list: true,
            ..Self::record(name, collection_id)
        }
    }

    pub fn link(name: &str, link_type_id: &str) -> Self {
        Self {
            name: name.to_string(),
            collection_id: None,
            link_type_id: Some(link_type_id.to_string()),
            list: false,
        }
    }

    pub fn tag(&self) -> TypeTag {
        match (&self.collection_id, &self.link_type_id, self.list) {
            (Some(c), _, false) => TypeTag::Record(c.clone()),
            (Some(c), _, true) => TypeTag::RecordArray(c.clone()),
            (None, Some(l), false) => TypeTag::Link(l.clone()),
            (None, Some(l), true) => TypeTag::LinkArray(l.clone()),
            (None, None, _) => TypeTag::Unset,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub collections: Vec<Collection>,
    #[serde(default)]
    pub link_types: Vec<LinkType>,
    #[serde(default)]
    pub views: Vec<View>,
    /// Implicit seed variables for the current master block type.
    #[serde(default)]
    pub variables: Vec<SeedVariable>,
    /// Project-level variable names (read through `get_variable`).
    #[serde(default)]
    pub project_variables: Vec<String>,
    #[serde(default)]
    pub selection_lists: Vec<String>,
}

impl Catalog {
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn collection(&self, id: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.id == id)
    }

    pub fn link_type(&self, id: &str) -> Option<&LinkType> {
        self.link_types.iter().find(|l| l.id == id)
    }

    pub fn view(&self, id: &str) -> Option<&View> {
        self.views.iter().find(|v| v.id == id)
    }

    /// Collection read by a view: the collection of its first query stem, if
    /// that collection still exists.
    pub fn view_collection(&self, view_id: &str) -> Option<&Collection> {
        let stem = self.view(view_id)?.query.stems.first()?;
        self.collection(&stem.collection_id)
    }

    /// A tag is live when its entity still exists. Tags without an entity are
    /// always live.
    pub fn is_live(&self, tag: &TypeTag) -> bool {
        match tag {
            TypeTag::Record(id) | TypeTag::RecordArray(id) => self.collection(id).is_some(),
            TypeTag::Link(id) | TypeTag::LinkArray(id) => self.link_type(id).is_some(),
            _ => true,
        }
    }

    /// Attributes reachable from a value of type `tag`, plus the preferred
    /// default attribute id.
    pub fn attributes_of(&self, tag: &TypeTag) -> Option<(&[Attribute], Option<&str>)> {
        match tag {
            TypeTag::Record(id) | TypeTag::RecordArray(id) => self
                .collection(id)
                .map(|c| (c.attributes.as_slice(), c.default_attribute_id.as_deref())),
            TypeTag::Link(id) | TypeTag::LinkArray(id) => {
                self.link_type(id).map(|l| (l.attributes.as_slice(), None))
            }
            _ => None,
        }
    }

    pub fn has_project_variable(&self, name: &str) -> bool {
        self.project_variables.iter().any(|v| v == name)
    }

    pub fn has_selection_list(&self, name: &str) -> bool {
        self.selection_lists.iter().any(|v| v == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_catalog() -> Catalog {
        Catalog::from_json(
            r#"{
              "collections": [
                {"id": "ord", "name": "Orders", "attributes": [
                  {"id": "attr1", "name": "status", "constraintType": "Text"},
                  {"id": "attr2", "name": "invoice", "constraintType": "Files"},
                  {"id": "attr3", "name": "weird", "constraintType": "SomethingNew"}
                ], "defaultAttributeId": "attr1"},
                {"id": "cus", "name": "Customers"}
              ],
              "linkTypes": [
                {"id": "oc", "name": "orders-customer", "collectionIds": ["ord", "cus"]}
              ],
              "views": [
                {"id": "v1", "name": "Open orders", "query": {"stems": [{"collectionId": "ord"}]}},
                {"id": "v2", "name": "Empty", "query": {"stems": []}}
              ],
              "projectVariables": ["apiKey"],
              "selectionLists": ["priorities"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn parses_host_json() {
        let catalog = orders_catalog();
        let orders = catalog.collection("ord").unwrap();
        assert_eq!(orders.attributes.len(), 3);
        assert!(orders.attributes[1].is_file());
        assert_eq!(orders.attributes[2].constraint_type, ConstraintKind::Other);
        assert_eq!(orders.default_attribute_id.as_deref(), Some("attr1"));
        assert!(catalog.has_project_variable("apiKey"));
        assert!(catalog.has_selection_list("priorities"));
    }

    #[test]
    fn counterpart_picks_the_other_side() {
        let catalog = orders_catalog();
        let link = catalog.link_type("oc").unwrap();
        assert_eq!(link.counterpart("ord"), Some("cus"));
        assert_eq!(link.counterpart("cus"), Some("ord"));
        assert_eq!(link.counterpart("zzz"), None);
    }

    #[test]
    fn view_collection_uses_first_stem() {
        let catalog = orders_catalog();
        assert_eq!(catalog.view_collection("v1").map(|c| c.id.as_str()), Some("ord"));
        assert!(catalog.view_collection("v2").is_none());
        assert!(catalog.view_collection("nope").is_none());
    }

    #[test]
    fn liveness_follows_entities() {
        let catalog = orders_catalog();
        assert!(catalog.is_live(&TypeTag::Record("ord".into())));
        assert!(!catalog.is_live(&TypeTag::RecordArray("gone".into())));
        assert!(catalog.is_live(&TypeTag::LinkArray("oc".into())));
        assert!(catalog.is_live(&TypeTag::Unresolved));
    }

    #[test]
    fn seed_variable_tags() {
        assert_eq!(SeedVariable::record("r", "ord").tag(), TypeTag::Record("ord".into()));
        assert_eq!(
            SeedVariable::records("rs", "ord").tag(),
            TypeTag::RecordArray("ord".into())
        );
        assert_eq!(SeedVariable::link("l", "oc").tag(), TypeTag::Link("oc".into()));
    }
}

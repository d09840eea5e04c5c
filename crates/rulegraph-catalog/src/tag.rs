//! Type tags: the string vocabulary used to decide which block may plug into
//! which socket.
//!
//! A tag is `{entityId}{suffix}` for domain entities (`ord_document`,
//! `ord_document_array`, `cust-ord_link`, `cust-ord_link_array`), one of a few
//! builtin scalar names (`String`, `Number`, …), the empty string for "not
//! known yet" and the fixed sentinel `unknown` for "resolves once something is
//! connected".
//!
//! The string form is what gets persisted into diagrams and compared in
//! check-lists. `TypeTag` is the parsed form the engine works with; the two
//! convert losslessly through `Display` / `FromStr`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub type EntityId = String;

pub const RECORD_SUFFIX: &str = "_document";
pub const RECORD_ARRAY_SUFFIX: &str = "_document_array";
pub const LINK_SUFFIX: &str = "_link";
pub const LINK_ARRAY_SUFFIX: &str = "_link_array";

/// Sentinel for a value whose entity cannot be determined until some socket is
/// connected (e.g. the document side of a link that is not wired yet), or whose
/// entity no longer exists in the catalog.
pub const UNRESOLVED_TAG: &str = "unknown";

/// Which family of operations may consume a tagged value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suffix {
    Record,
    RecordArray,
    Link,
    LinkArray,
    Unresolved,
}

impl Suffix {
    pub fn as_str(self) -> &'static str {
        match self {
            Suffix::Record => RECORD_SUFFIX,
            Suffix::RecordArray => RECORD_ARRAY_SUFFIX,
            Suffix::Link => LINK_SUFFIX,
            Suffix::LinkArray => LINK_ARRAY_SUFFIX,
            Suffix::Unresolved => UNRESOLVED_TAG,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    String,
    Number,
    Boolean,
    Date,
    Array,
}

impl ScalarType {
    pub const ALL: [ScalarType; 5] = [
        ScalarType::String,
        ScalarType::Number,
        ScalarType::Boolean,
        ScalarType::Date,
        ScalarType::Array,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Number => "Number",
            ScalarType::Boolean => "Boolean",
            ScalarType::Date => "Date",
            ScalarType::Array => "Array",
        }
    }

    fn from_name(s: &str) -> Option<Self> {
        ScalarType::ALL.into_iter().find(|t| t.name() == s)
    }
}

/// Parsed type tag.
///
/// `Unset` is "no information": an unset producer is unconstrained and may feed
/// any socket. `Unresolved` is the explicit sentinel and only matches sockets
/// that list it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    #[default]
    Unset,
    Unresolved,
    Scalar(ScalarType),
    Record(EntityId),
    RecordArray(EntityId),
    Link(EntityId),
    LinkArray(EntityId),
}

impl TypeTag {
    pub fn is_unset(&self) -> bool {
        matches!(self, TypeTag::Unset)
    }

    /// True for the four entity-carrying tags.
    pub fn is_entity(&self) -> bool {
        self.entity_id().is_some()
    }

    pub fn entity_id(&self) -> Option<&str> {
        match self {
            TypeTag::Record(id)
            | TypeTag::RecordArray(id)
            | TypeTag::Link(id)
            | TypeTag::LinkArray(id) => Some(id),
            _ => None,
        }
    }

    pub fn suffix(&self) -> Option<Suffix> {
        match self {
            TypeTag::Record(_) => Some(Suffix::Record),
            TypeTag::RecordArray(_) => Some(Suffix::RecordArray),
            TypeTag::Link(_) => Some(Suffix::Link),
            TypeTag::LinkArray(_) => Some(Suffix::LinkArray),
            TypeTag::Unresolved => Some(Suffix::Unresolved),
            TypeTag::Unset | TypeTag::Scalar(_) => None,
        }
    }

    /// Collection id of a record or record-array tag.
    pub fn collection_id(&self) -> Option<&str> {
        match self {
            TypeTag::Record(id) | TypeTag::RecordArray(id) => Some(id),
            _ => None,
        }
    }

    /// Link type id of a link or link-array tag.
    pub fn link_type_id(&self) -> Option<&str> {
        match self {
            TypeTag::Link(id) | TypeTag::LinkArray(id) => Some(id),
            _ => None,
        }
    }

    /// Element type of an array tag (`X_document_array` → `X_document`).
    /// Anything that is not an entity array has no element type.
    pub fn element(&self) -> TypeTag {
        match self {
            TypeTag::RecordArray(id) => TypeTag::Record(id.clone()),
            TypeTag::LinkArray(id) => TypeTag::Link(id.clone()),
            _ => TypeTag::Unset,
        }
    }
}

pub fn record_tag(collection_id: &str) -> TypeTag {
    TypeTag::Record(collection_id.to_string())
}

pub fn record_array_tag(collection_id: &str) -> TypeTag {
    TypeTag::RecordArray(collection_id.to_string())
}

pub fn link_tag(link_type_id: &str) -> TypeTag {
    TypeTag::Link(link_type_id.to_string())
}

pub fn link_array_tag(link_type_id: &str) -> TypeTag {
    TypeTag::LinkArray(link_type_id.to_string())
}

/// Entity id of a raw tag string, if it carries one.
pub fn entity_id_of(tag: &str) -> Option<&str> {
    split_entity(tag).map(|(id, _)| id)
}

/// Suffix of a raw tag string.
pub fn suffix_of(tag: &str) -> Option<Suffix> {
    if tag == UNRESOLVED_TAG {
        return Some(Suffix::Unresolved);
    }
    split_entity(tag).map(|(_, suffix)| suffix)
}

fn split_entity(tag: &str) -> Option<(&str, Suffix)> {
    // Array suffixes first: `x_document_array` must not be read as a record of
    // collection `x_document_array` minus nothing.
    for suffix in [
        Suffix::RecordArray,
        Suffix::LinkArray,
        Suffix::Record,
        Suffix::Link,
    ] {
        if let Some(id) = tag.strip_suffix(suffix.as_str()) {
            if !id.is_empty() {
                return Some((id, suffix));
            }
        }
    }
    None
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Unset => Ok(()),
            TypeTag::Unresolved => f.write_str(UNRESOLVED_TAG),
            TypeTag::Scalar(t) => f.write_str(t.name()),
            TypeTag::Record(id) => write!(f, "{id}{RECORD_SUFFIX}"),
            TypeTag::RecordArray(id) => write!(f, "{id}{RECORD_ARRAY_SUFFIX}"),
            TypeTag::Link(id) => write!(f, "{id}{LINK_SUFFIX}"),
            TypeTag::LinkArray(id) => write!(f, "{id}{LINK_ARRAY_SUFFIX}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised type tag `{0}`")]
pub struct TagParseError(pub String);

impl FromStr for TypeTag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(TypeTag::Unset);
        }
        if s == UNRESOLVED_TAG {
            return Ok(TypeTag::Unresolved);
        }
        if let Some(scalar) = ScalarType::from_name(s) {
            return Ok(TypeTag::Scalar(scalar));
        }
        let Some((id, suffix)) = split_entity(s) else {
            return Err(TagParseError(s.to_string()));
        };
        let id = id.to_string();
        Ok(match suffix {
            Suffix::Record => TypeTag::Record(id),
            Suffix::RecordArray => TypeTag::RecordArray(id),
            Suffix::Link => TypeTag::Link(id),
            Suffix::LinkArray => TypeTag::LinkArray(id),
            Suffix::Unresolved => TypeTag::Unresolved,
        })
    }
}

impl Serialize for TypeTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_entity_tags() {
        assert_eq!(record_tag("ord").to_string(), "ord_document");
        assert_eq!(record_array_tag("ord").to_string(), "ord_document_array");
        assert_eq!(link_tag("l1").to_string(), "l1_link");
        assert_eq!(link_array_tag("l1").to_string(), "l1_link_array");
        assert_eq!(TypeTag::Unset.to_string(), "");
        assert_eq!(TypeTag::Unresolved.to_string(), "unknown");
    }

    #[test]
    fn array_suffix_wins_over_scalar_suffix() {
        assert_eq!(entity_id_of("ord_document_array"), Some("ord"));
        assert_eq!(suffix_of("ord_document_array"), Some(Suffix::RecordArray));
        assert_eq!(suffix_of("l1_link_array"), Some(Suffix::LinkArray));
        assert_eq!(suffix_of("unknown"), Some(Suffix::Unresolved));
        assert_eq!(suffix_of("String"), None);
    }

    #[test]
    fn entity_ids_may_contain_suffix_text() {
        let tag: TypeTag = "my_document_store_document".parse().unwrap();
        assert_eq!(tag, TypeTag::Record("my_document_store".to_string()));
        assert_eq!(tag.to_string(), "my_document_store_document");
    }

    #[test]
    fn rejects_bare_suffix_and_garbage() {
        assert!("_document".parse::<TypeTag>().is_err());
        assert!("whatever".parse::<TypeTag>().is_err());
        assert_eq!("".parse::<TypeTag>().unwrap(), TypeTag::Unset);
        assert_eq!(
            "Number".parse::<TypeTag>().unwrap(),
            TypeTag::Scalar(ScalarType::Number)
        );
    }

    #[test]
    fn element_of_arrays() {
        assert_eq!(record_array_tag("c").element(), record_tag("c"));
        assert_eq!(link_array_tag("l").element(), link_tag("l"));
        assert_eq!(record_tag("c").element(), TypeTag::Unset);
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&record_tag("ord")).unwrap();
        assert_eq!(json, "\"ord_document\"");
        let back: TypeTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record_tag("ord"));
    }
}

//! Authoring contexts.
//!
//! A graph is always edited for one *master block type*: a rule reacting to
//! record changes, a rule reacting to link changes, a function run against a
//! single record/link, or a value computation. The master type decides which
//! blocks the palette offers and which protected variables are seeded.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, SeedVariable};
use crate::error::CatalogError;
use crate::tag::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterBlockType {
    Rule,
    Function,
    Link,
    Value,
}

impl MasterBlockType {
    pub const ALL: [MasterBlockType; 4] = [
        MasterBlockType::Rule,
        MasterBlockType::Function,
        MasterBlockType::Link,
        MasterBlockType::Value,
    ];

    fn bit(self) -> u8 {
        match self {
            MasterBlockType::Rule => 1,
            MasterBlockType::Function => 1 << 1,
            MasterBlockType::Link => 1 << 2,
            MasterBlockType::Value => 1 << 3,
        }
    }
}

impl fmt::Display for MasterBlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MasterBlockType::Rule => "rule",
            MasterBlockType::Function => "function",
            MasterBlockType::Link => "link",
            MasterBlockType::Value => "value",
        })
    }
}

/// Set of master block types a block may appear in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Visibility(u8);

impl Visibility {
    pub const ALL: Visibility = Visibility(0b1111);

    pub fn only(types: &[MasterBlockType]) -> Self {
        Visibility(types.iter().fold(0, |acc, t| acc | t.bit()))
    }

    pub fn allows(self, master: MasterBlockType) -> bool {
        self.0 & master.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = MasterBlockType> {
        MasterBlockType::ALL.into_iter().filter(move |t| self.allows(*t))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RuleEntity {
    Collection(EntityId),
    LinkType(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTrigger {
    Create,
    Update,
    Delete,
    Cron,
}

/// What a graph is being authored for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationTarget {
    pub master: MasterBlockType,
    pub entity: RuleEntity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<RuleTrigger>,
}

impl AutomationTarget {
    pub fn rule(collection_id: &str, trigger: RuleTrigger) -> Self {
        Self {
            master: MasterBlockType::Rule,
            entity: RuleEntity::Collection(collection_id.to_string()),
            trigger: Some(trigger),
        }
    }

    pub fn link_rule(link_type_id: &str, trigger: RuleTrigger) -> Self {
        Self {
            master: MasterBlockType::Link,
            entity: RuleEntity::LinkType(link_type_id.to_string()),
            trigger: Some(trigger),
        }
    }

    pub fn function(entity: RuleEntity) -> Self {
        Self {
            master: MasterBlockType::Function,
            entity,
            trigger: None,
        }
    }

    pub fn value(entity: RuleEntity) -> Self {
        Self {
            master: MasterBlockType::Value,
            entity,
            trigger: None,
        }
    }

    /// The protected variables implied by this target.
    ///
    /// Fails for combinations the host must never request (a cron trigger on a
    /// link type, a trigger on a function, an entity missing from the catalog).
    pub fn seed_variables(&self, catalog: &Catalog) -> Result<Vec<SeedVariable>, CatalogError> {
        let unsupported = |msg: String| Err(CatalogError::UnsupportedConfiguration(msg));

        match &self.entity {
            RuleEntity::Collection(id) if catalog.collection(id).is_none() => {
                return unsupported(format!("unknown collection `{id}`"));
            }
            RuleEntity::LinkType(id) if catalog.link_type(id).is_none() => {
                return unsupported(format!("unknown link type `{id}`"));
            }
            _ => {}
        }

        match (self.master, &self.entity, self.trigger) {
            (MasterBlockType::Rule, RuleEntity::Collection(id), Some(RuleTrigger::Cron)) => {
                Ok(vec![SeedVariable::records("records", id)])
            }
            (MasterBlockType::Rule, RuleEntity::Collection(id), _) => Ok(vec![
                SeedVariable::record("oldRecord", id),
                SeedVariable::record("newRecord", id),
            ]),
            (MasterBlockType::Rule, RuleEntity::LinkType(id), _) => {
                unsupported(format!("rule on link type `{id}` must use the link master type"))
            }
            (MasterBlockType::Link, RuleEntity::LinkType(_), Some(RuleTrigger::Cron)) => {
                unsupported("Unsupported Cron rule type".to_string())
            }
            (MasterBlockType::Link, RuleEntity::LinkType(id), _) => Ok(vec![
                SeedVariable::link("oldLink", id),
                SeedVariable::link("newLink", id),
            ]),
            (MasterBlockType::Link, RuleEntity::Collection(id), _) => {
                unsupported(format!("link rule on collection `{id}`"))
            }
            (MasterBlockType::Function | MasterBlockType::Value, _, Some(trigger)) => {
                unsupported(format!("{} does not take a {trigger:?} trigger", self.master))
            }
            (MasterBlockType::Function | MasterBlockType::Value, RuleEntity::Collection(id), None) => {
                Ok(vec![SeedVariable::record("thisRecord", id)])
            }
            (MasterBlockType::Function | MasterBlockType::Value, RuleEntity::LinkType(id), None) => {
                Ok(vec![SeedVariable::link("thisLink", id)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Collection, LinkType};
    use crate::tag::TypeTag;

    fn catalog() -> Catalog {
        Catalog {
            collections: vec![
                Collection {
                    id: "ord".into(),
                    name: "Orders".into(),
                    icon: String::new(),
                    color: String::new(),
                    attributes: vec![],
                    default_attribute_id: None,
                },
                Collection {
                    id: "cus".into(),
                    name: "Customers".into(),
                    icon: String::new(),
                    color: String::new(),
                    attributes: vec![],
                    default_attribute_id: None,
                },
            ],
            link_types: vec![LinkType {
                id: "oc".into(),
                name: "orders-customer".into(),
                collection_ids: ["ord".into(), "cus".into()],
                attributes: vec![],
            }],
            ..Catalog::default()
        }
    }

    #[test]
    fn rule_seeds_old_and_new_record() {
        let seeds = AutomationTarget::rule("ord", RuleTrigger::Update)
            .seed_variables(&catalog())
            .unwrap();
        let names: Vec<_> = seeds.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["oldRecord", "newRecord"]);
        assert!(seeds.iter().all(|s| s.tag() == TypeTag::Record("ord".into())));
    }

    #[test]
    fn cron_rule_seeds_record_list() {
        let seeds = AutomationTarget::rule("ord", RuleTrigger::Cron)
            .seed_variables(&catalog())
            .unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].tag(), TypeTag::RecordArray("ord".into()));
    }

    #[test]
    fn cron_on_link_type_is_unsupported() {
        let err = AutomationTarget::link_rule("oc", RuleTrigger::Cron)
            .seed_variables(&catalog())
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedConfiguration(_)));
        assert!(err.to_string().contains("Unsupported Cron rule type"));
    }

    #[test]
    fn function_on_link_seeds_this_link() {
        let seeds = AutomationTarget::function(RuleEntity::LinkType("oc".into()))
            .seed_variables(&catalog())
            .unwrap();
        assert_eq!(seeds[0].name, "thisLink");
        assert_eq!(seeds[0].tag(), TypeTag::Link("oc".into()));
    }

    #[test]
    fn unknown_entity_is_unsupported() {
        let err = AutomationTarget::rule("nope", RuleTrigger::Create)
            .seed_variables(&catalog())
            .unwrap_err();
        assert!(err.to_string().contains("unknown collection `nope`"));
    }

    #[test]
    fn visibility_masks() {
        let v = Visibility::only(&[MasterBlockType::Rule, MasterBlockType::Link]);
        assert!(v.allows(MasterBlockType::Rule));
        assert!(!v.allows(MasterBlockType::Function));
        assert_eq!(v.iter().count(), 2);
        assert!(MasterBlockType::ALL.iter().all(|m| Visibility::ALL.allows(*m)));
    }
}

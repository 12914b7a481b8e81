//! Transform engine - turns one raw source entity into its portable form

use serde_json::{json, Value};

use super::decode::decode_variables;
use crate::api::StoreClient;
use crate::error::PortError;
use crate::transfer::catalog::{self, CatalogRule, Relation, TypeHook};
use crate::transfer::{
    check_node_references, EntityType, NameRef, PortableEntity, RawEntity, Related, WorkflowNode,
};

/// Applies catalog rules to source entities, fetching related data on demand
pub struct Transformer<'a> {
    pub(super) source: &'a StoreClient,
    pub(super) organization: &'a str,
}

impl<'a> Transformer<'a> {
    pub fn new(source: &'a StoreClient, organization: &'a str) -> Self {
        Self {
            source,
            organization,
        }
    }

    /// Transform one raw entity of `kind`
    ///
    /// Fails with a data-consistency error when a set foreign key has no
    /// summary to take the name from, when a variables blob does not parse,
    /// or when workflow edges point outside their workflow.
    pub async fn transform(
        &self,
        kind: EntityType,
        raw: &RawEntity,
    ) -> Result<PortableEntity, PortError> {
        let rule = catalog::rule(kind);
        if rule.hook == TypeHook::WorkflowNode {
            let node = self.transform_node(raw).await?;
            return node_entity(kind, &raw.display_name(), &node);
        }

        let name = raw.display_name();
        let excluded = rule.hook.excluded_fields(raw);
        let mut entity = PortableEntity::new(kind);

        for field in rule.keep_fields {
            if excluded.contains(field) {
                continue;
            }
            let Some(value) = raw.get(field) else {
                continue;
            };
            let value = if rule.is_decoded(field) {
                if let Some(text) = value.as_str().filter(|t| !t.trim().is_empty()) {
                    entity.source_text.insert(field.to_string(), text.to_string());
                }
                decode_variables(value)
                    .map_err(|e| PortError::data(kind, &name, format!("field '{}': {}", field, e)))?
            } else {
                value.clone()
            };
            entity.fields.insert(field.to_string(), value);
        }

        for fk in rule.foreign_keys {
            if excluded.contains(&fk.field) || !raw.is_set(fk.field) {
                continue;
            }
            let target = raw.summary_name(fk.field).ok_or_else(|| {
                PortError::data(
                    kind,
                    &name,
                    format!("'{}' is set but summary_fields.{} has no name", fk.field, fk.field),
                )
            })?;
            entity
                .references
                .insert(fk.field.to_string(), NameRef::new(fk.target, target));
        }

        if rule.organization_scoped {
            entity.references.insert(
                "organization".to_string(),
                NameRef::new(EntityType::Organization, self.organization),
            );
        }

        for relation in rule.related {
            let related = self.transform_relation(rule, raw, *relation).await?;
            entity.related.insert(*relation, related);
        }

        log::debug!(
            "Transformed {} '{}' ({} fields, {} references, {} relations)",
            kind,
            name,
            entity.fields.len(),
            entity.references.len(),
            entity.related.len()
        );

        Ok(entity)
    }

    async fn transform_relation(
        &self,
        rule: &CatalogRule,
        raw: &RawEntity,
        relation: Relation,
    ) -> Result<Related, PortError> {
        match relation {
            Relation::SurveySpec => {
                let enabled = rule.survey_supported
                    && raw.get("survey_enabled").and_then(Value::as_bool).unwrap_or(false);
                if !enabled {
                    return Ok(Related::Survey(json!({})));
                }
                let url = related_url(rule.kind, raw, relation)?;
                Ok(Related::Survey(self.source.get(url).await?))
            }
            Relation::WorkflowNodes => {
                let url = related_url(rule.kind, raw, relation)?;
                let mut nodes = Vec::new();
                for node in self.source.get_results(url).await? {
                    nodes.push(self.transform_node(&node).await?);
                }
                check_node_references(&nodes)
                    .map_err(|e| PortError::data(rule.kind, raw.display_name(), e.to_string()))?;
                Ok(Related::Nodes(nodes))
            }
            Relation::Credentials | Relation::Groups | Relation::Hosts => {
                self.related_names(rule.kind, raw, relation).await
            }
        }
    }

    async fn related_names(
        &self,
        kind: EntityType,
        raw: &RawEntity,
        relation: Relation,
    ) -> Result<Related, PortError> {
        let target = relation.target().ok_or_else(|| {
            PortError::data(kind, raw.display_name(), format!("{} is not a named relation", relation.key()))
        })?;
        let url = related_url(kind, raw, relation)?;
        let names = self
            .source
            .get_results(url)
            .await?
            .iter()
            .map(|related| {
                related
                    .name()
                    .map(|n| NameRef::new(target, n))
                    .ok_or_else(|| {
                        PortError::data(
                            kind,
                            raw.display_name(),
                            format!("{} entry {} has no name", relation.key(), related.display_name()),
                        )
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Related::Names(names))
    }
}

fn related_url<'r>(
    kind: EntityType,
    raw: &'r RawEntity,
    relation: Relation,
) -> Result<&'r str, PortError> {
    raw.related_url(relation.key()).ok_or_else(|| {
        PortError::data(
            kind,
            raw.display_name(),
            format!("no related.{} locator", relation.key()),
        )
    })
}

/// Wrap a standalone workflow node as a portable entity
fn node_entity(
    kind: EntityType,
    name: &str,
    node: &WorkflowNode,
) -> Result<PortableEntity, PortError> {
    let Value::Object(fields) =
        serde_json::to_value(node).map_err(|e| PortError::data(kind, name, e.to_string()))?
    else {
        return Err(PortError::data(kind, name, "node did not serialize to a mapping"));
    };

    let mut entity = PortableEntity::new(kind);
    entity.fields = fields.into_iter().collect();
    Ok(entity)
}

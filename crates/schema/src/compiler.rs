//! Schema compiler
//!
//! Resolves a configuration with parent/template chains into one flat
//! `Entity` per concrete type. Each type first resolves its parent (the
//! explicit one, or `@defaults` when present), then applies its own
//! overrides: identity field, targets (shallow-merged, same-named targets
//! replaced), `autoKey` and logging.

use crate::config::{DEFAULTS_TEMPLATE, EntityConfig, SchemaConfig, TargetConfig};
use crate::entity::{Entity, StoreLogConfig, Target};
use crate::validation::Validator;
use crate::Schema;
use normdb_core::{NdbError, NdbResult};
use std::collections::{BTreeMap, HashMap};

/// Compile a configuration into a schema
pub fn compile(config: &SchemaConfig) -> NdbResult<Schema> {
    let mut compiler = Compiler::new(config);
    let mut entities = BTreeMap::new();

    for name in config.concrete_types() {
        let resolved = compiler.resolve(name)?;
        let key = resolved.key.ok_or_else(|| NdbError::MissingKeyPath {
            entity: name.to_string(),
        })?;
        entities.insert(
            name.to_string(),
            Entity {
                key,
                targets: resolved.targets,
                auto_key: resolved.auto_key,
                logging: resolved.logging,
            },
        );
    }

    let schema = Schema::new(entities);
    let report = Validator::with_default_rules().validate(&schema);
    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }
    report.into_result()?;

    tracing::debug!("Compiled schema with {} types", schema.len());
    Ok(schema)
}

// ============================================================================
// Resolution
// ============================================================================

/// A partially resolved entry; templates may lack an identity field
#[derive(Debug, Clone, Default)]
struct Resolved {
    key: Option<String>,
    targets: BTreeMap<String, Target>,
    auto_key: bool,
    logging: StoreLogConfig,
}

struct Compiler<'c> {
    config: &'c SchemaConfig,
    resolved: HashMap<&'c str, Resolved>,
    in_progress: Vec<&'c str>,
}

impl<'c> Compiler<'c> {
    fn new(config: &'c SchemaConfig) -> Self {
        Self {
            config,
            resolved: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    fn entry(&self, name: &str, referrer: &str) -> NdbResult<(&'c str, &'c EntityConfig)> {
        self.config
            .types
            .get_key_value(name)
            .map(|(name, entry)| (name.as_str(), entry))
            .ok_or_else(|| NdbError::UnknownParent {
                entity: referrer.to_string(),
                parent: name.to_string(),
                known: self.config.known_names(),
            })
    }

    fn parent_of(&self, name: &str, entry: &'c EntityConfig) -> Option<&'c str> {
        if name == DEFAULTS_TEMPLATE {
            return None;
        }
        entry.parent().or_else(|| {
            self.config
                .types
                .get_key_value(DEFAULTS_TEMPLATE)
                .map(|(name, _)| name.as_str())
        })
    }

    fn resolve(&mut self, name: &str) -> NdbResult<Resolved> {
        let (name, entry) = self.entry(name, name)?;
        self.resolve_entry(name, entry)
    }

    fn resolve_entry(&mut self, name: &'c str, entry: &'c EntityConfig) -> NdbResult<Resolved> {
        if let Some(done) = self.resolved.get(name) {
            return Ok(done.clone());
        }
        if self.in_progress.contains(&name) {
            let mut chain: Vec<&str> = self.in_progress.clone();
            chain.push(name);
            return Err(NdbError::CyclicParent {
                entity: chain[0].to_string(),
                chain: chain.join(" -> "),
            });
        }

        self.in_progress.push(name);
        let inherited = match self.parent_of(name, entry) {
            Some(parent) => {
                let (parent, parent_entry) = self.entry(parent, name)?;
                self.resolve_entry(parent, parent_entry)?
            }
            None => Resolved::default(),
        };
        self.in_progress.pop();

        let resolved = apply_overrides(name, inherited, entry)?;
        self.resolved.insert(name, resolved.clone());
        Ok(resolved)
    }
}

fn apply_overrides(name: &str, mut resolved: Resolved, entry: &EntityConfig) -> NdbResult<Resolved> {
    let Some(spec) = entry.spec() else {
        return Ok(resolved);
    };

    if let Some(key) = &spec.key {
        resolved.key = Some(key.clone());
    }

    if let Some(targets) = &spec.targets {
        for (property, target) in targets {
            resolved
                .targets
                .insert(property.clone(), build_target(name, property, target.as_ref())?);
        }
    }

    if let Some(data_store) = &spec.data_store {
        if let Some(auto_key) = data_store.auto_key {
            resolved.auto_key = auto_key;
        }
        if let Some(logging) = &data_store.logging {
            resolved.logging = logging.clone();
        }
    }

    Ok(resolved)
}

fn build_target(entity: &str, property: &str, config: Option<&TargetConfig>) -> NdbResult<Target> {
    let missing = || NdbError::MissingTargetType {
        entity: entity.to_string(),
        property: property.to_string(),
    };

    match config.ok_or_else(missing)? {
        TargetConfig::Type(entity_type) if !entity_type.is_empty() => Ok(Target::one(entity_type.as_str())),
        TargetConfig::Type(_) => Err(missing()),
        TargetConfig::Spec(spec) => {
            let entity_type = spec
                .entity_type
                .as_deref()
                .filter(|t| !t.is_empty())
                .ok_or_else(missing)?;
            Ok(Target {
                entity_type: entity_type.to_string(),
                is_array: spec.is_array.unwrap_or(false),
                cascade_removal: spec
                    .data_store
                    .as_ref()
                    .and_then(|ds| ds.cascade_removal)
                    .unwrap_or(false),
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

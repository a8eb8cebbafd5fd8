//! Validation rules for compiled schemas
//!
//! Rules inspect a resolved `Schema` and report errors (which abort
//! compilation) and warnings (which are logged).

use crate::Schema;
use normdb_core::{NdbError, NdbResult};
use std::collections::BTreeSet;

// ============================================================================
// ValidationResult
// ============================================================================

/// Result of a validation operation
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Configuration errors (empty if valid)
    pub errors: Vec<NdbError>,

    /// Non-fatal issues
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Create a successful validation result
    pub fn ok() -> Self {
        Self::default()
    }

    /// Add an error to the result
    pub fn add_error(&mut self, error: NdbError) {
        self.errors.push(error);
    }

    /// Add a warning to the result
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Convert to NdbResult.
    ///
    /// A single error is returned as is; several are folded into one
    /// `InvalidConfig` listing all messages.
    pub fn into_result(mut self) -> NdbResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => {
                let msg = self
                    .errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(NdbError::config(msg))
            }
        }
    }
}

// ============================================================================
// ValidationWarning
// ============================================================================

/// A validation warning (non-fatal issue)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Warning code
    pub code: ValidationWarningCode,

    /// Human-readable warning message
    pub message: String,

    /// Path to the element (e.g., "user.bestFriend")
    pub path: Option<String>,
}

impl ValidationWarning {
    /// Create a new warning
    pub fn new(code: ValidationWarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Add a path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "[{}] Warning: {}", path, self.message)
        } else {
            write!(f, "Warning: {}", self.message)
        }
    }
}

/// Warning codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationWarningCode {
    /// A type refers to itself directly
    SelfReference,
    /// A type is part of a longer reference cycle
    ReferenceCycle,
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait for validation rules
pub trait ValidationRule {
    /// Get the rule name
    fn name(&self) -> &'static str;

    /// Get the rule description
    fn description(&self) -> &'static str;

    /// Validate a schema and return the result
    fn validate(&self, schema: &Schema) -> ValidationResult;
}

// ============================================================================
// Validator
// ============================================================================

/// Schema validator that runs multiple validation rules
#[derive(Default)]
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a validator with default rules
    pub fn with_default_rules() -> Self {
        let mut validator = Self::new();
        validator.add_rule(Box::new(TargetTypesRule));
        validator.add_rule(Box::new(KeyTargetRule));
        validator.add_rule(Box::new(ReferenceCycleRule));
        validator
    }

    /// Add a validation rule
    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    /// Validate a schema with all rules
    pub fn validate(&self, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for rule in &self.rules {
            result.merge(rule.validate(schema));
        }
        result
    }
}

// ============================================================================
// Built-in Validation Rules
// ============================================================================

/// Rule: every target refers to a concrete type of the schema
pub struct TargetTypesRule;

impl ValidationRule for TargetTypesRule {
    fn name(&self) -> &'static str {
        "target_types"
    }

    fn description(&self) -> &'static str {
        "Validates that every target refers to a defined type"
    }

    fn validate(&self, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for (name, entity) in schema.iter() {
            for (property, target) in &entity.targets {
                if !schema.contains(&target.entity_type) {
                    result.add_error(NdbError::UnknownTargetType {
                        entity: name.to_string(),
                        property: property.clone(),
                        target: target.entity_type.clone(),
                    });
                }
            }
        }
        result
    }
}

/// Rule: the identity field is never a relation
pub struct KeyTargetRule;

impl ValidationRule for KeyTargetRule {
    fn name(&self) -> &'static str {
        "key_target"
    }

    fn description(&self) -> &'static str {
        "Validates that no target is declared on the identity field"
    }

    fn validate(&self, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for (name, entity) in schema.iter() {
            if entity.targets.contains_key(&entity.key) {
                result.add_error(NdbError::TargetShadowsKey {
                    entity: name.to_string(),
                    property: entity.key.clone(),
                });
            }
        }
        result
    }
}

/// Rule: warn about types that can reach themselves through targets
///
/// Such schemas are valid, but unbounded denormalization of a cyclic
/// instance graph fails.
pub struct ReferenceCycleRule;

impl ValidationRule for ReferenceCycleRule {
    fn name(&self) -> &'static str {
        "reference_cycles"
    }

    fn description(&self) -> &'static str {
        "Warns about self-referential and mutually referential types"
    }

    fn validate(&self, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for (name, entity) in schema.iter() {
            if let Some((property, _)) = entity
                .targets
                .iter()
                .find(|(_, target)| target.entity_type == name)
            {
                result.add_warning(
                    ValidationWarning::new(
                        ValidationWarningCode::SelfReference,
                        format!("'{}' references itself", name),
                    )
                    .with_path(format!("{}.{}", name, property)),
                );
            } else if reaches(schema, name, name) {
                result.add_warning(
                    ValidationWarning::new(
                        ValidationWarningCode::ReferenceCycle,
                        format!("'{}' is part of a reference cycle", name),
                    )
                    .with_path(name),
                );
            }
        }
        result
    }
}

/// Whether `goal` is reachable from `start` through one or more targets
fn reaches(schema: &Schema, start: &str, goal: &str) -> bool {
    let mut seen = BTreeSet::new();
    let mut pending = vec![start];
    while let Some(current) = pending.pop() {
        let Some(entity) = schema.get(current) else { continue };
        for target in entity.targets.values() {
            if target.entity_type == goal {
                return true;
            }
            if seen.insert(target.entity_type.as_str()) {
                pending.push(&target.entity_type);
            }
        }
    }
    false
}

// ============================================================================
// Tests
// ============================================================================

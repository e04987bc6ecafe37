//! # Planner boundary
//!
//! The planner turns a free-text instruction into one structured edit. It is
//! an external collaborator and its output is untrusted data: the raw JSON is
//! parsed into the closed [`Mutation`] union (unknown operations and unknown
//! fields are rejected, never coerced) and then checked against the registry
//! before anything is executed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::component::{is_identity_attribute, ComponentRecord, EditKind, ElementKind};
use crate::config::EditorConfig;
use crate::errors::{EditError, EditResult};
use crate::mutations::Mutation;
use crate::registry::ComponentRegistry;

/// What the planner is told about the target component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerRequest {
    pub component_id: String,
    pub document: String,
    pub element_kind: ElementKind,
    pub edit_kind: EditKind,
    pub current_value: String,
    pub instruction: String,
}

/// A planner's structured answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlannedEdit {
    pub component_id: String,
    pub action: Mutation,
    pub justification: String,
}

/// Natural-language planner. Implementations return raw JSON text.
pub trait EditPlanner {
    fn plan(&self, request: &PlannerRequest) -> EditResult<String>;
}

/// Parse raw planner output. Malformed output is an invalid operation, not a server error.
pub fn parse_plan(raw: &str) -> EditResult<PlannedEdit> {
    serde_json::from_str(raw)
        .map_err(|e| EditError::invalid_operation(format!("malformed planner output: {}", e)))
}

/// Whether `mutation` may be applied to a component of `kind`
pub fn is_compatible(kind: EditKind, mutation: &Mutation, config: &EditorConfig) -> bool {
    match (kind, mutation) {
        (EditKind::Link | EditKind::Button, _) => true,
        (EditKind::Text, Mutation::SetStyleProperty { .. }) => config.allow_style_on_text,
        (EditKind::Text, _) => true,
        (EditKind::Image | EditKind::Element, Mutation::SetText { .. }) => false,
        (EditKind::Image | EditKind::Element, _) => true,
    }
}

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction", "xlink:href", "poster"];

/// Check a planned edit against the registry and the edit-kind matrix.
/// Returns the target component on success.
pub fn validate_plan(
    plan: &PlannedEdit,
    registry: &ComponentRegistry,
    config: &EditorConfig,
) -> EditResult<ComponentRecord> {
    let record = registry.get(&plan.component_id)?;
    check_mutation(&record, &plan.action, config)?;

    debug!(
        component_id = %record.id,
        operation = plan.action.name(),
        justification = %plan.justification,
        "Validated planned edit"
    );
    Ok(record)
}

/// Edit-kind and parameter checks shared by planned and direct edits
pub fn check_mutation(
    record: &ComponentRecord,
    mutation: &Mutation,
    config: &EditorConfig,
) -> EditResult<()> {
    if !is_compatible(record.edit_kind, mutation, config) {
        return Err(EditError::invalid_operation(format!(
            "{} is not allowed on {} component {}",
            mutation.name(),
            record.edit_kind,
            record.id
        )));
    }
    validate_parameters(mutation)
}

fn validate_parameters(mutation: &Mutation) -> EditResult<()> {
    match mutation {
        Mutation::SetText { text } if text.trim().is_empty() => {
            Err(EditError::invalid_operation("setText requires non-empty text"))
        }
        Mutation::SetAttribute { attribute, value } => {
            let name = attribute.to_ascii_lowercase();
            if name.starts_with("on") {
                return Err(EditError::invalid_operation(format!(
                    "event handler attribute `{}` is not editable",
                    attribute
                )));
            }
            if is_identity_attribute(&name) {
                return Err(EditError::invalid_operation(format!(
                    "`{}` is managed by the identifier scheme",
                    attribute
                )));
            }
            if URL_ATTRIBUTES.contains(&name.as_str()) && is_script_url(value) {
                return Err(EditError::invalid_operation(format!(
                    "script URL rejected for `{}`",
                    attribute
                )));
            }
            Ok(())
        }
        Mutation::SetStyleProperty { value, .. } => {
            let lower = value.to_ascii_lowercase();
            if lower.contains("javascript:") || lower.contains("expression(") {
                return Err(EditError::invalid_operation("script in CSS value rejected"));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

// Browsers ignore whitespace and control characters inside the scheme
fn is_script_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.starts_with("javascript:") || compact.starts_with("vbscript:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ComponentRegistry {
        let registry = ComponentRegistry::in_memory();
        registry
            .register(ComponentRecord::new("ncd-0001", "index.html", ElementKind::Heading))
            .unwrap();
        registry
            .register(ComponentRecord::new("ncd-0002", "index.html", ElementKind::Link))
            .unwrap();
        registry
            .register(ComponentRecord::new("ncd-0003", "index.html", ElementKind::Image))
            .unwrap();
        registry
    }

    fn plan(raw: &str) -> EditResult<ComponentRecord> {
        let parsed = parse_plan(raw)?;
        validate_plan(&parsed, &registry(), &EditorConfig::default())
    }

    #[test]
    fn test_valid_plan() {
        let record = plan(
            r#"{"componentId":"ncd-0001","action":{"operation":"setText","text":"Hello"},"justification":"asked"}"#,
        )
        .unwrap();
        assert_eq!(record.id, "ncd-0001");
    }

    #[test]
    fn test_rejects_unknown_shapes() {
        for raw in [
            r#"{"componentId":"ncd-0001","action":{"operation":"eval","code":"x"},"justification":""}"#,
            r#"{"componentId":"ncd-0001","action":{"operation":"setText"},"justification":""}"#,
            r#"{"componentId":"ncd-0001","action":{"operation":"setText","text":"x"},"justification":"","extra":1}"#,
            r#"not json"#,
        ] {
            assert!(matches!(plan(raw), Err(EditError::InvalidOperation(_))), "{}", raw);
        }
    }

    #[test]
    fn test_unknown_component() {
        let err = plan(
            r#"{"componentId":"ncd-0404","action":{"operation":"setText","text":"x"},"justification":""}"#,
        )
        .unwrap_err();
        assert!(matches!(err, EditError::ComponentNotFound(_)));
    }

    #[test]
    fn test_compatibility_matrix() {
        let config = EditorConfig::default();
        let style = Mutation::SetStyleProperty {
            property: "color".into(),
            value: "red".into(),
        };
        let text = Mutation::SetText { text: "x".into() };

        assert!(!is_compatible(EditKind::Text, &style, &config));
        assert!(is_compatible(EditKind::Link, &style, &config));
        assert!(!is_compatible(EditKind::Image, &text, &config));
        assert!(is_compatible(EditKind::Element, &style, &config));

        let permissive = EditorConfig {
            allow_style_on_text: true,
            ..EditorConfig::default()
        };
        assert!(is_compatible(EditKind::Text, &style, &permissive));

        let err = plan(
            r#"{"componentId":"ncd-0003","action":{"operation":"setText","text":"x"},"justification":""}"#,
        )
        .unwrap_err();
        assert!(matches!(err, EditError::InvalidOperation(_)));
    }

    #[test]
    fn test_rejects_script_injection() {
        for raw in [
            r#"{"componentId":"ncd-0002","action":{"operation":"setAttribute","attribute":"onclick","value":"steal()"},"justification":""}"#,
            r#"{"componentId":"ncd-0002","action":{"operation":"setAttribute","attribute":"href","value":" Java\tScript:alert(1)"},"justification":""}"#,
            r#"{"componentId":"ncd-0002","action":{"operation":"setAttribute","attribute":"data-ncd-id","value":"ncd-9999"},"justification":""}"#,
            r#"{"componentId":"ncd-0002","action":{"operation":"setStyleProperty","property":"background","value":"url(javascript:alert(1))"},"justification":""}"#,
        ] {
            assert!(matches!(plan(raw), Err(EditError::InvalidOperation(_))), "{}", raw);
        }

        assert!(plan(
            r#"{"componentId":"ncd-0002","action":{"operation":"setAttribute","attribute":"href","value":"pricing.html"},"justification":""}"#
        )
        .is_ok());
    }
}

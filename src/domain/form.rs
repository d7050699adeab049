//! Form template and submission domain models

use super::common::{Metadata, StringUuid};
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::request::RequestPriority;

/// Declared type of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Boolean,
    /// Value must be a non-empty string naming a department id.
    DepartmentSelect,
}

/// One field in a template's schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    #[serde(default, rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
}

/// Request-creation settings a template may carry. When enabled, each
/// submission materializes exactly one work request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSettings {
    pub enabled: bool,
    pub department_id: Option<StringUuid>,
    /// When set and the submission carries this field, its value overrides
    /// `department_id` as the routing target.
    pub department_field_key: Option<String>,
    #[serde(default)]
    pub priority: RequestPriority,
    pub title_template: Option<String>,
    pub description_template: Option<String>,
}

/// Form template entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormTemplate {
    pub id: StringUuid,
    pub name: String,
    #[sqlx(json)]
    pub fields: Vec<FieldSpec>,
    pub workspace_id: StringUuid,
    #[sqlx(json)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_id: Option<StringUuid>,
    pub updated_by_id: Option<StringUuid>,
}

const REQUEST_SETTINGS_KEY: &str = "request_settings";

impl FormTemplate {
    pub fn request_settings(&self) -> Option<RequestSettings> {
        self.metadata
            .get(REQUEST_SETTINGS_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_request_settings(&mut self, settings: &RequestSettings) {
        if let Ok(value) = serde_json::to_value(settings) {
            self.metadata.set(REQUEST_SETTINGS_KEY, value);
        }
    }

    /// Validate submitted data against this template's field schema.
    /// Errors carry the offending field's label.
    pub fn validate_data(&self, data: &serde_json::Map<String, serde_json::Value>) -> Result<()> {
        for field in &self.fields {
            let value = data.get(&field.key);
            let missing = match value {
                None | Some(serde_json::Value::Null) => true,
                Some(serde_json::Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if field.required && missing {
                return Err(AppError::Validation(format!(
                    "Field '{}' is required",
                    field.label
                )));
            }
            let Some(value) = value else { continue };
            if value.is_null() {
                continue;
            }
            match field.field_type {
                FieldType::Text => {}
                FieldType::Number => {
                    if !value.is_number() {
                        return Err(AppError::Validation(format!(
                            "Field '{}' must be a number",
                            field.label
                        )));
                    }
                }
                FieldType::Boolean => {
                    if !value.is_boolean() {
                        return Err(AppError::Validation(format!(
                            "Field '{}' must be true/false",
                            field.label
                        )));
                    }
                }
                FieldType::DepartmentSelect => {
                    let ok = value.as_str().map(|s| !s.trim().is_empty()).unwrap_or(false);
                    if !ok {
                        return Err(AppError::Validation(format!(
                            "Field '{}' must be a department id",
                            field.label
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Description used when the template's request settings carry none:
    /// one "label: value" line per schema field.
    pub fn default_description(&self, data: &serde_json::Map<String, serde_json::Value>) -> String {
        let mut lines = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = data
                .get(&field.key)
                .map(render_value)
                .unwrap_or_default();
            lines.push(format!("{}: {}", field.label, value));
        }
        lines.join("\n")
    }
}

impl Default for FormTemplate {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            name: String::new(),
            fields: Vec::new(),
            workspace_id: StringUuid::nil(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
            created_by_id: None,
            updated_by_id: None,
        }
    }
}

/// Form submission entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FormSubmission {
    pub id: StringUuid,
    pub template_id: StringUuid,
    #[sqlx(json)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[sqlx(json)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_id: Option<StringUuid>,
    pub updated_by_id: Option<StringUuid>,
}

const REQUEST_ID_KEY: &str = "request_id";

impl FormSubmission {
    /// The linked work request, if this submission materialized one.
    pub fn linked_request_id(&self) -> Option<StringUuid> {
        self.metadata
            .get_str(REQUEST_ID_KEY)
            .and_then(|s| StringUuid::parse_str(s).ok())
    }

    pub fn link_request(&mut self, request_id: StringUuid) {
        self.metadata.set_str(REQUEST_ID_KEY, &request_id.to_string());
    }

    pub fn detach_request(&mut self) {
        self.metadata.remove(REQUEST_ID_KEY);
    }
}

impl Default for FormSubmission {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            template_id: StringUuid::nil(),
            data: serde_json::Map::new(),
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
            created_by_id: None,
            updated_by_id: None,
        }
    }
}

/// Input for creating a form template
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTemplateInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub fields: Vec<FieldSpec>,
    pub request_settings: Option<RequestSettings>,
}

/// Input for updating a form template
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTemplateInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub fields: Option<Vec<FieldSpec>>,
    pub request_settings: Option<RequestSettings>,
}

/// Input for submitting a form
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitFormInput {
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Literal `{key}` substitution against submitted field values.
/// Unresolved keys are left as literal text.
pub fn render_template(text: &str, data: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut rendered = text.to_string();
    for (key, value) in data {
        rendered = rendered.replace(&format!("{{{}}}", key), &render_value(value));
    }
    rendered
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn field(key: &str, label: &str, field_type: FieldType, required: bool) -> FieldSpec {
        FieldSpec {
            key: key.to_string(),
            label: label.to_string(),
            field_type,
            required,
        }
    }

    fn data(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_required_field_missing() {
        let template = FormTemplate {
            fields: vec![field("name", "Customer name", FieldType::Text, true)],
            ..Default::default()
        };
        let err = template.validate_data(&data(&[])).unwrap_err();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("Customer name")),
            other => panic!("expected Validation, got {:?}", other),
        }
    }

    #[test]
    fn test_type_checks() {
        let template = FormTemplate {
            fields: vec![
                field("count", "Count", FieldType::Number, false),
                field("urgent", "Urgent", FieldType::Boolean, false),
                field("dept", "Department", FieldType::DepartmentSelect, false),
            ],
            ..Default::default()
        };

        assert!(template
            .validate_data(&data(&[("count", serde_json::json!(3))]))
            .is_ok());
        assert!(template
            .validate_data(&data(&[("count", serde_json::json!("3"))]))
            .is_err());
        assert!(template
            .validate_data(&data(&[("urgent", serde_json::json!(true))]))
            .is_ok());
        assert!(template
            .validate_data(&data(&[("urgent", serde_json::json!("yes"))]))
            .is_err());
        assert!(template
            .validate_data(&data(&[("dept", serde_json::json!("d-1"))]))
            .is_ok());
        assert!(template
            .validate_data(&data(&[("dept", serde_json::json!("  "))]))
            .is_err());
    }

    #[test]
    fn test_render_template_substitution() {
        let data = data(&[
            ("name", serde_json::json!("Printer")),
            ("floor", serde_json::json!(3)),
        ]);
        assert_eq!(
            render_template("Fix {name} on floor {floor} ({missing})", &data),
            "Fix Printer on floor 3 ({missing})"
        );
    }

    #[test]
    fn test_default_description_lists_all_fields() {
        let template = FormTemplate {
            fields: vec![
                field("name", "Name", FieldType::Text, true),
                field("notes", "Notes", FieldType::Text, false),
            ],
            ..Default::default()
        };
        let desc = template.default_description(&data(&[("name", serde_json::json!("X"))]));
        assert_eq!(desc, "Name: X\nNotes: ");
    }

    #[test]
    fn test_request_settings_roundtrip() {
        let mut template = FormTemplate::default();
        assert!(template.request_settings().is_none());

        let settings = RequestSettings {
            enabled: true,
            department_field_key: Some("dept".to_string()),
            ..Default::default()
        };
        template.set_request_settings(&settings);
        assert_eq!(template.request_settings().unwrap(), settings);
    }

    #[test]
    fn test_submission_link_roundtrip() {
        let mut submission = FormSubmission::default();
        let request_id = StringUuid::new_v4();
        submission.link_request(request_id);
        assert_eq!(submission.linked_request_id(), Some(request_id));
        submission.detach_request();
        assert!(submission.linked_request_id().is_none());
    }
}

//! Condition rule engine
//!
//! A condition node holds an ordered list of rules, each comparing one field
//! of the node's bound form against a value. Rules are edited as drafts and
//! only the valid ones are persisted on commit; a half-filled rule is a
//! normal editing state, not an error.
//!
//! # Rule lifecycle
//!
//! ```text
//! Unset (field = none)
//!   -> FieldChosen (operator = none)
//!   -> OperatorChosen (value pending)
//!   -> Valid
//! ```
//!
//! Choosing another field always returns the rule to `FieldChosen`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{FieldInfo, FieldType, FormCatalog, NO_FIELD};
use crate::types::RecordId;

/// Comparison operator of a rule
///
/// An empty name decodes to [`Operator::None`]. Names this crate does not
/// know are kept as [`Operator::Other`] and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    #[default]
    None,
    Equals,
    NotEquals,
    IsEmpty,
    IsNotEmpty,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
    Before,
    After,
    On,
    NotOn,
    In,
    NotIn,
    Other(String),
}

impl Operator {
    const NAMED: [Operator; 19] = [
        Operator::None,
        Operator::Equals,
        Operator::NotEquals,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::GreaterThan,
        Operator::GreaterThanOrEquals,
        Operator::LessThan,
        Operator::LessThanOrEquals,
        Operator::Before,
        Operator::After,
        Operator::On,
        Operator::NotOn,
        Operator::In,
        Operator::NotIn,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Operator::None => "none",
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::GreaterThan => "greater_than",
            Operator::GreaterThanOrEquals => "greater_than_or_equals",
            Operator::LessThan => "less_than",
            Operator::LessThanOrEquals => "less_than_or_equals",
            Operator::Before => "before",
            Operator::After => "after",
            Operator::On => "on",
            Operator::NotOn => "not_on",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Other(name) => name.as_str(),
        }
    }

    /// Human-readable label for operator pickers
    pub fn label(&self) -> &str {
        match self {
            Operator::None => "Select operator",
            Operator::Equals => "Equals",
            Operator::NotEquals => "Does not equal",
            Operator::IsEmpty => "Is empty",
            Operator::IsNotEmpty => "Is not empty",
            Operator::Contains => "Contains",
            Operator::NotContains => "Does not contain",
            Operator::StartsWith => "Starts with",
            Operator::EndsWith => "Ends with",
            Operator::GreaterThan => "Greater than",
            Operator::GreaterThanOrEquals => "Greater than or equals",
            Operator::LessThan => "Less than",
            Operator::LessThanOrEquals => "Less than or equals",
            Operator::Before => "Before",
            Operator::After => "After",
            Operator::On => "On",
            Operator::NotOn => "Not on",
            Operator::In => "Is one of",
            Operator::NotIn => "Is not one of",
            Operator::Other(name) => name.as_str(),
        }
    }

    /// Whether the operator compares against a value
    pub fn requires_value(&self) -> bool {
        !matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }

    /// Whether the value is a comma-joined list of options
    pub fn is_set_membership(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn named(value: &str) -> Option<Operator> {
    Operator::NAMED.into_iter().find(|op| op.as_str() == value)
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        if value.is_empty() {
            return Operator::None;
        }
        named(&value).unwrap_or(Operator::Other(value))
    }
}

impl From<&str> for Operator {
    fn from(value: &str) -> Self {
        Operator::from(value.to_string())
    }
}

impl From<Operator> for String {
    fn from(value: Operator) -> Self {
        match value {
            Operator::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// An operator with its display label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperatorOption {
    pub operator: Operator,
    pub label: String,
}

const BASE_OPERATORS: [Operator; 4] = [
    Operator::Equals,
    Operator::NotEquals,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

const TEXT_OPERATORS: [Operator; 4] = [
    Operator::Contains,
    Operator::NotContains,
    Operator::StartsWith,
    Operator::EndsWith,
];

const NUMBER_OPERATORS: [Operator; 4] = [
    Operator::GreaterThan,
    Operator::GreaterThanOrEquals,
    Operator::LessThan,
    Operator::LessThanOrEquals,
];

const DATE_OPERATORS: [Operator; 4] = [
    Operator::Before,
    Operator::After,
    Operator::On,
    Operator::NotOn,
];

const OPTION_OPERATORS: [Operator; 2] = [Operator::In, Operator::NotIn];

/// Operators available for a field type, base set first
///
/// Types this crate does not know get the base set only.
pub fn operators_for(field_type: &FieldType) -> Vec<OperatorOption> {
    let extra: &[Operator] = match field_type {
        FieldType::Text | FieldType::Textarea | FieldType::Email => &TEXT_OPERATORS,
        FieldType::Number => &NUMBER_OPERATORS,
        FieldType::Date => &DATE_OPERATORS,
        FieldType::Select | FieldType::Radio | FieldType::Checkbox | FieldType::Relation => {
            &OPTION_OPERATORS
        }
        FieldType::Unknown | FieldType::Other(_) => &[],
    };

    BASE_OPERATORS
        .iter()
        .chain(extra)
        .map(|operator| OperatorOption {
            label: operator.label().to_string(),
            operator: operator.clone(),
        })
        .collect()
}

/// Split a set-membership value into its members
pub fn split_values(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join set-membership members into a stored value
pub fn join_values<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| v.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// A single comparison test, as persisted in condition node data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionRule {
    pub field_id: String,
    pub field_label: String,
    pub field_type: FieldType,
    pub operator: Operator,
    pub value: String,
}

impl Default for ConditionRule {
    fn default() -> Self {
        Self {
            field_id: NO_FIELD.to_string(),
            field_label: String::new(),
            field_type: FieldType::Unknown,
            operator: Operator::None,
            value: String::new(),
        }
    }
}

/// Editing state of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    Unset,
    FieldChosen,
    OperatorChosen,
    Valid,
}

impl ConditionRule {
    pub fn has_field(&self) -> bool {
        !self.field_id.is_empty() && self.field_id != NO_FIELD
    }

    pub fn state(&self) -> RuleState {
        if !self.has_field() {
            RuleState::Unset
        } else if self.operator == Operator::None {
            RuleState::FieldChosen
        } else if self.operator.requires_value() && self.value.is_empty() {
            RuleState::OperatorChosen
        } else {
            RuleState::Valid
        }
    }

    /// Whether the rule is complete enough to persist
    pub fn is_valid(&self) -> bool {
        self.state() == RuleState::Valid
    }
}

/// Keep only the valid rules, in their original order
///
/// Incomplete rules are dropped silently.
pub fn commit_rules(rules: &[ConditionRule]) -> Vec<ConditionRule> {
    rules.iter().filter(|rule| rule.is_valid()).cloned().collect()
}

const RULE_HANDLE_PREFIX: &str = "rule-";

/// Output handle name for the rule at `index` of a condition node
pub fn rule_handle(index: usize) -> String {
    format!("{}{}", RULE_HANDLE_PREFIX, index)
}

/// Rule index named by an output handle
pub fn parse_rule_handle(handle: &str) -> Option<usize> {
    handle.strip_prefix(RULE_HANDLE_PREFIX)?.parse().ok()
}

/// Which part of a rule an edit targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKey {
    Field,
    Operator,
    Value,
}

/// A rule being edited, with its resolved field
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    pub rule: ConditionRule,
    pub field_info: Option<FieldInfo>,
    /// Index of the persisted rule this draft was loaded from
    origin: Option<usize>,
}

impl RuleDraft {
    fn empty() -> Self {
        Self {
            rule: ConditionRule::default(),
            field_info: None,
            origin: None,
        }
    }

    /// Operators the rule's field type allows
    pub fn operators(&self) -> Vec<OperatorOption> {
        operators_for(&self.rule.field_type)
    }

    pub fn origin(&self) -> Option<usize> {
        self.origin
    }
}

/// Result of committing a draft list
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedRules {
    /// The valid rules, projected for persistence
    pub rules: Vec<ConditionRule>,
    /// Old output handle -> new output handle, for rules that survived
    pub handle_map: HashMap<String, String>,
}

/// Draft rule list bound to one form's fields
#[derive(Debug, Clone, Default)]
pub struct RuleEditor {
    form_id: Option<RecordId>,
    fields: Vec<FieldInfo>,
    drafts: Vec<RuleDraft>,
}

impl RuleEditor {
    /// Start editing persisted rules against a form
    pub fn load(form_id: Option<RecordId>, rules: &[ConditionRule], catalog: &FormCatalog) -> Self {
        let fields = form_id
            .as_ref()
            .map(|id| catalog.fields(id))
            .unwrap_or_default();
        let drafts = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| RuleDraft {
                rule: rule.clone(),
                field_info: catalog.resolve_field(form_id.as_ref(), Some(&rule.field_id)),
                origin: Some(index),
            })
            .collect();
        Self {
            form_id,
            fields,
            drafts,
        }
    }

    pub fn form_id(&self) -> Option<&RecordId> {
        self.form_id.as_ref()
    }

    /// Fields of the bound form
    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn drafts(&self) -> &[RuleDraft] {
        &self.drafts
    }

    /// Re-resolve fields after the bound form's schema arrived or changed
    ///
    /// Rules whose field no longer resolves keep their stored values and
    /// show as unresolved.
    pub fn refresh_fields(&mut self, catalog: &FormCatalog) {
        self.fields = self
            .form_id
            .as_ref()
            .map(|id| catalog.fields(id))
            .unwrap_or_default();
        for draft in &mut self.drafts {
            draft.field_info = self
                .fields
                .iter()
                .find(|field| field.id == draft.rule.field_id)
                .cloned();
        }
    }

    /// Rebind to another form; drafts are kept as they are
    pub fn rebind(&mut self, form_id: Option<RecordId>, catalog: &FormCatalog) {
        self.form_id = form_id;
        self.refresh_fields(catalog);
    }

    /// Append an empty rule
    pub fn add_rule(&mut self) -> usize {
        self.drafts.push(RuleDraft::empty());
        self.drafts.len() - 1
    }

    /// Update one part of a rule
    ///
    /// Choosing a real field resets operator and value and refreshes the
    /// field type and options. Other keys are updated in place. Returns
    /// false if `index` is out of range.
    pub fn update_rule(&mut self, index: usize, key: RuleKey, value: &str) -> bool {
        let Some(draft) = self.drafts.get_mut(index) else {
            log::debug!("Ignoring update of missing rule {}", index);
            return false;
        };

        match key {
            RuleKey::Field if value.is_empty() || value == NO_FIELD => {
                draft.rule.field_id = NO_FIELD.to_string();
            }
            RuleKey::Field => {
                let info = self.fields.iter().find(|field| field.id == value).cloned();
                draft.rule.field_id = value.to_string();
                draft.rule.operator = Operator::None;
                draft.rule.value = String::new();
                match &info {
                    Some(field) => {
                        draft.rule.field_label = field.label.clone();
                        draft.rule.field_type = field.field_type.clone();
                    }
                    None => {
                        log::warn!("Field '{}' is not part of the bound form", value);
                        draft.rule.field_label = String::new();
                        draft.rule.field_type = FieldType::Unknown;
                    }
                }
                draft.field_info = info;
            }
            RuleKey::Operator => draft.rule.operator = Operator::from(value),
            RuleKey::Value => draft.rule.value = value.to_string(),
        }
        true
    }

    /// Remove the rule at `index`; the list may become empty
    pub fn remove_rule(&mut self, index: usize) -> Option<RuleDraft> {
        if index < self.drafts.len() {
            Some(self.drafts.remove(index))
        } else {
            None
        }
    }

    /// Project the valid drafts for persistence
    ///
    /// The handle map lets the caller move edges that left a persisted
    /// rule's handle onto the rule's new position.
    pub fn commit(&self) -> CommittedRules {
        let mut rules = Vec::new();
        let mut handle_map = HashMap::new();
        for draft in self.drafts.iter().filter(|d| d.rule.is_valid()) {
            if let Some(origin) = draft.origin {
                handle_map.insert(rule_handle(origin), rule_handle(rules.len()));
            }
            rules.push(draft.rule.clone());
        }
        CommittedRules { rules, handle_map }
    }

    /// Mark the drafts as matching the given committed list
    pub(crate) fn mark_committed(&mut self) {
        let mut next = 0;
        for draft in &mut self.drafts {
            if draft.rule.is_valid() {
                draft.origin = Some(next);
                next += 1;
            } else {
                draft.origin = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FormDocument, FormField, FormSchema, SchemaPayload};
    use serde_json::json;

    fn catalog() -> FormCatalog {
        let mut catalog = FormCatalog::new();
        catalog.insert(&FormDocument {
            id: RecordId::Number(7),
            title: "Leave Request".to_string(),
            schema: Some(SchemaPayload::Decoded(FormSchema {
                fields: vec![
                    FormField {
                        id: "3".to_string(),
                        label: "Days".to_string(),
                        field_type: FieldType::Number,
                        options: None,
                    },
                    FormField {
                        id: "4".to_string(),
                        label: "Type".to_string(),
                        field_type: FieldType::Radio,
                        options: Some(vec![json!("Annual"), json!({"value": "sick", "label": "Sick"})]),
                    },
                ],
            })),
        });
        catalog
    }

    fn ops(field_type: &FieldType) -> Vec<Operator> {
        operators_for(field_type).into_iter().map(|o| o.operator).collect()
    }

    #[test]
    fn test_operators_by_field_type() {
        assert_eq!(ops(&FieldType::Unknown), BASE_OPERATORS.to_vec());
        assert_eq!(ops(&FieldType::Other("phone".into())), BASE_OPERATORS.to_vec());
        assert_eq!(&ops(&FieldType::Email)[4..], &TEXT_OPERATORS);
        assert_eq!(&ops(&FieldType::Number)[4..], &NUMBER_OPERATORS);
        assert_eq!(&ops(&FieldType::Date)[4..], &DATE_OPERATORS);
        for field_type in [FieldType::Select, FieldType::Radio, FieldType::Checkbox, FieldType::Relation] {
            assert_eq!(ops(&field_type).len(), 6);
            assert!(ops(&field_type).contains(&Operator::NotIn));
        }
    }

    #[test]
    fn test_operator_wire_names() {
        let json = serde_json::to_value(Operator::GreaterThanOrEquals).unwrap();
        assert_eq!(json, json!("greater_than_or_equals"));
        let parsed: Operator = serde_json::from_value(json!("between")).unwrap();
        assert_eq!(parsed, Operator::Other("between".to_string()));
        assert_eq!(serde_json::to_value(&parsed).unwrap(), json!("between"));
        assert_eq!(Operator::from(""), Operator::None);
        assert_eq!(Operator::from("none"), Operator::None);
    }

    #[test]
    fn test_unrecognised_operator_keeps_rule_valid() {
        let rule: ConditionRule = serde_json::from_value(json!({
            "fieldId": "3",
            "fieldLabel": "Phone",
            "fieldType": "phone",
            "operator": "matches",
            "value": "^0"
        }))
        .unwrap();
        assert_eq!(rule.field_type, FieldType::Other("phone".to_string()));
        assert_eq!(rule.state(), RuleState::Valid);
        assert_eq!(commit_rules(&[rule.clone()]), vec![rule]);
    }

    #[test]
    fn test_rule_states() {
        let mut rule = ConditionRule::default();
        assert_eq!(rule.state(), RuleState::Unset);
        rule.field_id = "3".to_string();
        assert_eq!(rule.state(), RuleState::FieldChosen);
        rule.operator = Operator::GreaterThan;
        assert_eq!(rule.state(), RuleState::OperatorChosen);
        rule.value = "10".to_string();
        assert_eq!(rule.state(), RuleState::Valid);

        rule.operator = Operator::IsEmpty;
        rule.value.clear();
        assert!(rule.is_valid());
    }

    #[test]
    fn test_commit_rules_filters_invalid() {
        let valid = ConditionRule {
            field_id: "3".to_string(),
            field_label: "Days".to_string(),
            field_type: FieldType::Number,
            operator: Operator::GreaterThan,
            value: "10".to_string(),
        };
        let committed = commit_rules(&[valid.clone(), ConditionRule::default()]);
        assert_eq!(committed, vec![valid]);

        let json = serde_json::to_value(&committed[0]).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 5);
        assert_eq!(json["fieldType"], "number");
    }

    #[test]
    fn test_field_change_cascades_reset() {
        let mut editor = RuleEditor::load(Some(RecordId::Number(7)), &[], &catalog());
        let index = editor.add_rule();
        assert!(editor.update_rule(index, RuleKey::Field, "3"));
        assert!(editor.update_rule(index, RuleKey::Operator, "greater_than"));
        assert!(editor.update_rule(index, RuleKey::Value, "10"));
        assert!(editor.drafts()[0].rule.is_valid());

        editor.update_rule(index, RuleKey::Field, "4");
        let draft = &editor.drafts()[0];
        assert_eq!(draft.rule.state(), RuleState::FieldChosen);
        assert_eq!(draft.rule.field_type, FieldType::Radio);
        assert_eq!(draft.rule.field_label, "Type");
        assert!(draft.rule.value.is_empty());
        assert_eq!(draft.field_info.as_ref().unwrap().options[1].label, "Sick");
        assert_eq!(draft.operators().len(), 6);
    }

    #[test]
    fn test_non_field_keys_update_in_place() {
        let mut editor = RuleEditor::load(Some(RecordId::Number(7)), &[], &catalog());
        editor.add_rule();
        editor.update_rule(0, RuleKey::Field, "4");
        editor.update_rule(0, RuleKey::Value, &join_values(&["Annual", "sick"]));
        editor.update_rule(0, RuleKey::Operator, "in");
        let rule = &editor.drafts()[0].rule;
        assert_eq!(rule.value, "Annual,sick");
        assert_eq!(split_values(&rule.value), vec!["Annual", "sick"]);
        assert!(!editor.update_rule(5, RuleKey::Value, "x"));
    }

    #[test]
    fn test_remove_rule_allows_empty() {
        let mut editor = RuleEditor::default();
        editor.add_rule();
        assert!(editor.remove_rule(0).is_some());
        assert!(editor.drafts().is_empty());
        assert!(editor.remove_rule(0).is_none());
    }

    #[test]
    fn test_commit_maps_surviving_handles() {
        let rule = |field: &str, value: &str| ConditionRule {
            field_id: field.to_string(),
            field_label: String::new(),
            field_type: FieldType::Number,
            operator: Operator::Equals,
            value: value.to_string(),
        };
        let persisted = vec![rule("3", "1"), rule("3", "2"), rule("3", "3")];
        let mut editor = RuleEditor::load(Some(RecordId::Number(7)), &persisted, &catalog());

        editor.remove_rule(0);
        editor.update_rule(0, RuleKey::Value, "");
        let committed = editor.commit();

        assert_eq!(committed.rules.len(), 1);
        assert_eq!(committed.rules[0].value, "3");
        assert_eq!(committed.handle_map.get("rule-2"), Some(&"rule-0".to_string()));
        assert!(!committed.handle_map.contains_key("rule-0"));
        assert!(!committed.handle_map.contains_key("rule-1"));
    }

    #[test]
    fn test_rule_handles() {
        assert_eq!(rule_handle(2), "rule-2");
        assert_eq!(parse_rule_handle("rule-2"), Some(2));
        assert_eq!(parse_rule_handle("Yes"), None);
    }
}

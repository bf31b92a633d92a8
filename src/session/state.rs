//! Locally persisted session schema.
//!
//! `SessionState` is the record the client keeps across reloads. Every field
//! carries a serde default so a record written by an older build merges over
//! the current-version defaults at read time; fields the old build never
//! knew about simply come back as their defaults.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File name of the persisted session record.
pub const STATE_FILE_NAME: &str = "session-state.json";

/// Character budget for the ellipsis strategy.
pub const ELLIPSIS_LIMIT: usize = 100;

/// Sentence budget for the summarize strategy.
pub const SUMMARY_SENTENCES: usize = 2;

/// The pluggable generation engine producing the final artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Engine {
    #[serde(rename = "gamma")]
    Gamma,
    #[serde(rename = "claude-pptx")]
    ClaudePptx,
    #[serde(rename = "claude-html")]
    ClaudeHtml,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Gamma => "gamma",
            Engine::ClaudePptx => "claude-pptx",
            Engine::ClaudeHtml => "claude-html",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gamma" => Ok(Engine::Gamma),
            "claude-pptx" => Ok(Engine::ClaudePptx),
            "claude-html" => Ok(Engine::ClaudeHtml),
            other => Err(format!(
                "unknown engine {other:?} (expected gamma, claude-pptx or claude-html)"
            )),
        }
    }
}

/// How long text fields are handled during generation. Chosen once per
/// generation attempt, re-selectable before regenerating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LongTextStrategy {
    /// Cap the field at [`SUMMARY_SENTENCES`] sentences.
    Summarize,
    /// Truncate at [`ELLIPSIS_LIMIT`] characters and append a marker.
    Ellipsis,
    /// Drop the field entirely.
    Omit,
}

impl LongTextStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LongTextStrategy::Summarize => "summarize",
            LongTextStrategy::Ellipsis => "ellipsis",
            LongTextStrategy::Omit => "omit",
        }
    }

    /// Apply the strategy's transformation policy to one text field.
    /// `None` means the field is dropped.
    pub fn apply(&self, text: &str) -> Option<String> {
        match self {
            LongTextStrategy::Summarize => Some(first_sentences(text, SUMMARY_SENTENCES)),
            LongTextStrategy::Ellipsis => {
                if text.chars().count() <= ELLIPSIS_LIMIT {
                    Some(text.to_string())
                } else {
                    let truncated: String = text.chars().take(ELLIPSIS_LIMIT).collect();
                    Some(format!("{truncated}..."))
                }
            }
            LongTextStrategy::Omit => None,
        }
    }
}

impl std::fmt::Display for LongTextStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LongTextStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summarize" => Ok(LongTextStrategy::Summarize),
            "ellipsis" => Ok(LongTextStrategy::Ellipsis),
            "omit" => Ok(LongTextStrategy::Omit),
            other => Err(format!(
                "unknown long-text strategy {other:?} (expected summarize, ellipsis or omit)"
            )),
        }
    }
}

fn first_sentences(text: &str, count: usize) -> String {
    let mut seen = 0;
    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?') {
            seen += 1;
            if seen == count {
                return text[..idx + ch.len_utf8()].to_string();
            }
        }
    }
    text.to_string()
}

/// A project referenced by a smartview selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

/// The current data scope: a chosen smartview plus its resolved projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartviewSelection {
    pub smartview_id: String,
    pub smartview_name: String,
    #[serde(default)]
    pub projects: Vec<ProjectRef>,
}

impl SmartviewSelection {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

/// Client-persisted, resumable session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Generated once per session, immutable for the session's life.
    #[serde(default = "new_session_id")]
    pub session_id: String,
    #[serde(default)]
    pub engine: Option<Engine>,
    #[serde(default)]
    pub last_template_id: Option<String>,
    #[serde(default)]
    pub last_mapping_id: Option<String>,
    #[serde(default)]
    pub last_fetched_data_id: Option<String>,
    /// Best/accepted artifact of the most recent generation run.
    #[serde(default)]
    pub last_artifact_id: Option<String>,
    #[serde(default)]
    pub has_fetched_data: bool,
    #[serde(default)]
    pub smartview_selection: Option<SmartviewSelection>,
    /// Deprecated free-form scope. Readable for old records, normalised into
    /// `smartview_selection` on load, never written back.
    #[serde(default, skip_serializing)]
    pub projects_config: Option<serde_json::Value>,
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session_id: new_session_id(),
            engine: None,
            last_template_id: None,
            last_mapping_id: None,
            last_fetched_data_id: None,
            last_artifact_id: None,
            has_fetched_data: false,
            smartview_selection: None,
            projects_config: None,
        }
    }
}

impl SessionState {
    /// Fold a legacy `projectsConfig` blob into `smartview_selection` so no
    /// downstream logic has to branch on which format was stored. Keeps the
    /// current selection when both are present.
    pub fn normalize_legacy_scope(&mut self) {
        if self.smartview_selection.is_some() {
            return;
        }
        let Some(legacy) = self.projects_config.as_ref() else {
            return;
        };
        let Some(items) = legacy.as_array() else {
            return;
        };
        let projects: Vec<ProjectRef> = items
            .iter()
            .filter_map(|item| {
                if let Some(id) = item.as_str() {
                    return Some(ProjectRef {
                        id: id.to_string(),
                        name: id.to_string(),
                    });
                }
                let obj = item.as_object()?;
                let id = obj.get("id")?.as_str()?.to_string();
                let name = obj
                    .get("name")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| id.clone());
                Some(ProjectRef { id, name })
            })
            .collect();
        if projects.is_empty() {
            return;
        }
        self.smartview_selection = Some(SmartviewSelection {
            smartview_id: "legacy".to_string(),
            smartview_name: "Imported project list".to_string(),
            projects,
        });
    }

    /// Start a fresh session while keeping the artifacts a user would not
    /// want to re-upload: template, mapping, fetched-data reference and the
    /// smartview selection.
    pub fn reset(&self) -> SessionState {
        SessionState {
            session_id: new_session_id(),
            engine: None,
            last_template_id: self.last_template_id.clone(),
            last_mapping_id: self.last_mapping_id.clone(),
            last_fetched_data_id: self.last_fetched_data_id.clone(),
            last_artifact_id: None,
            has_fetched_data: false,
            smartview_selection: self.smartview_selection.clone(),
            projects_config: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_has_fresh_session_id_and_empty_fields() {
        let a = SessionState::default();
        let b = SessionState::default();
        assert_ne!(a.session_id, b.session_id);
        assert!(a.engine.is_none());
        assert!(!a.has_fetched_data);
        assert!(a.smartview_selection.is_none());
    }

    #[test]
    fn engine_serde_uses_wire_names() {
        let json = serde_json::to_string(&Engine::ClaudePptx).unwrap();
        assert_eq!(json, "\"claude-pptx\"");
        let engine: Engine = serde_json::from_str("\"gamma\"").unwrap();
        assert_eq!(engine, Engine::Gamma);
    }

    #[test]
    fn old_schema_record_gets_defaults_for_new_fields() {
        // A record written before lastArtifactId and smartviewSelection existed.
        let json = r#"{
            "sessionId": "abc-123",
            "engine": "claude-pptx",
            "lastTemplateId": "tpl-1",
            "hasFetchedData": true
        }"#;
        let state: SessionState = serde_json::from_str(json).unwrap();
        assert_eq!(state.session_id, "abc-123");
        assert_eq!(state.engine, Some(Engine::ClaudePptx));
        assert_eq!(state.last_template_id.as_deref(), Some("tpl-1"));
        assert!(state.has_fetched_data);
        assert!(state.last_artifact_id.is_none());
        assert!(state.smartview_selection.is_none());
    }

    #[test]
    fn record_without_session_id_generates_one() {
        let state: SessionState = serde_json::from_str("{}").unwrap();
        assert!(!state.session_id.is_empty());
    }

    #[test]
    fn full_record_round_trips_losslessly() {
        let state = SessionState {
            engine: Some(Engine::Gamma),
            last_template_id: Some("tpl-9".into()),
            last_mapping_id: Some("map-9".into()),
            last_fetched_data_id: Some("data-9".into()),
            last_artifact_id: Some("art-9".into()),
            has_fetched_data: true,
            smartview_selection: Some(SmartviewSelection {
                smartview_id: "sv-1".into(),
                smartview_name: "Active projects".into(),
                projects: vec![ProjectRef {
                    id: "p-1".into(),
                    name: "Apollo".into(),
                }],
            }),
            ..SessionState::default()
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn legacy_projects_config_normalises_to_selection() {
        let json = r#"{
            "sessionId": "abc",
            "projectsConfig": [
                {"id": "p-1", "name": "Apollo"},
                "p-2"
            ]
        }"#;
        let mut state: SessionState = serde_json::from_str(json).unwrap();
        state.normalize_legacy_scope();
        let selection = state.smartview_selection.as_ref().unwrap();
        assert_eq!(selection.projects.len(), 2);
        assert_eq!(selection.projects[0].name, "Apollo");
        assert_eq!(selection.projects[1].id, "p-2");

        // The legacy blob is never serialised back out.
        let out = serde_json::to_string(&state).unwrap();
        assert!(!out.contains("projectsConfig"));
    }

    #[test]
    fn legacy_config_does_not_override_current_selection() {
        let json = r#"{
            "sessionId": "abc",
            "smartviewSelection": {
                "smartviewId": "sv-1",
                "smartviewName": "Kept",
                "projects": [{"id": "p-1", "name": "Apollo"}]
            },
            "projectsConfig": ["p-9"]
        }"#;
        let mut state: SessionState = serde_json::from_str(json).unwrap();
        state.normalize_legacy_scope();
        let selection = state.smartview_selection.as_ref().unwrap();
        assert_eq!(selection.smartview_name, "Kept");
        assert_eq!(selection.projects[0].id, "p-1");
    }

    #[test]
    fn reset_carries_forward_reusable_artifacts() {
        let state = SessionState {
            engine: Some(Engine::ClaudeHtml),
            last_template_id: Some("tpl-1".into()),
            last_mapping_id: Some("map-1".into()),
            last_fetched_data_id: Some("data-1".into()),
            last_artifact_id: Some("art-1".into()),
            has_fetched_data: true,
            smartview_selection: Some(SmartviewSelection {
                smartview_id: "sv-1".into(),
                smartview_name: "Active".into(),
                projects: vec![ProjectRef {
                    id: "p-1".into(),
                    name: "Apollo".into(),
                }],
            }),
            ..SessionState::default()
        };
        let fresh = state.reset();
        assert_ne!(fresh.session_id, state.session_id);
        assert_eq!(fresh.last_template_id, state.last_template_id);
        assert_eq!(fresh.last_mapping_id, state.last_mapping_id);
        assert_eq!(fresh.last_fetched_data_id, state.last_fetched_data_id);
        assert_eq!(fresh.smartview_selection, state.smartview_selection);
        assert!(fresh.engine.is_none());
        assert!(!fresh.has_fetched_data);
        assert!(fresh.last_artifact_id.is_none());
    }

    #[test]
    fn summarize_caps_at_two_sentences() {
        let text = "First sentence. Second one! Third should go. Fourth too.";
        let out = LongTextStrategy::Summarize.apply(text).unwrap();
        assert_eq!(out, "First sentence. Second one!");
    }

    #[test]
    fn summarize_keeps_short_text_whole() {
        let out = LongTextStrategy::Summarize.apply("No terminator here").unwrap();
        assert_eq!(out, "No terminator here");
    }

    #[test]
    fn ellipsis_truncates_at_limit_with_marker() {
        let text = "x".repeat(150);
        let out = LongTextStrategy::Ellipsis.apply(&text).unwrap();
        assert_eq!(out.chars().count(), ELLIPSIS_LIMIT + 3);
        assert!(out.ends_with("..."));

        let short = LongTextStrategy::Ellipsis.apply("short").unwrap();
        assert_eq!(short, "short");
    }

    #[test]
    fn omit_drops_the_field() {
        assert!(LongTextStrategy::Omit.apply("anything").is_none());
    }

    #[test]
    fn strategy_parses_from_cli_spelling() {
        assert_eq!(
            "ellipsis".parse::<LongTextStrategy>().unwrap(),
            LongTextStrategy::Ellipsis
        );
        assert!("shorten".parse::<LongTextStrategy>().is_err());
    }
}

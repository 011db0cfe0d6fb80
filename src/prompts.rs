use std::collections::HashSet;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a senior MEAN stack engineer reviewing the following code diff for \
bugs, performance issues, or best practices. Provide concise, actionable \
feedback for this specific chunk of the diff. If this is part of a larger \
diff, focus only on the provided chunk.";

pub const STRICT_PROMPT_TEMPLATE: &str = "You are a senior engineer reviewing the following code diff. Refactor the \
code for modularity, performance, and clarity. Suggest exact code changes \
where possible for this specific chunk of the diff. If this is part of a \
larger diff, focus only on the provided chunk.";

pub const LIGHT_PROMPT_TEMPLATE: &str = "You are reviewing the following code diff for readability and style \
consistency. Highlight minor improvements for this specific chunk of the \
diff. If this is part of a larger diff, focus only on the provided chunk.";

/// Review mode selected from PR labels. Strict wins over light wins over an
/// explicit default label wins over no matching label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    Strict,
    Light,
    Default,
}

impl ReviewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewMode::Strict => "strict",
            ReviewMode::Light => "light",
            ReviewMode::Default => "default",
        }
    }

    pub fn template(self) -> &'static str {
        match self {
            ReviewMode::Strict => STRICT_PROMPT_TEMPLATE,
            ReviewMode::Light => LIGHT_PROMPT_TEMPLATE,
            ReviewMode::Default => DEFAULT_PROMPT_TEMPLATE,
        }
    }
}

/// Pick the review mode from a JSON array of `{"name": ...}` label objects.
/// Unparseable input degrades to the default template with a warning; label
/// selection must never abort a run.
pub fn select_mode(labels_json: Option<&str>) -> ReviewMode {
    let raw = labels_json.unwrap_or("[]");
    let parsed: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Warning: Label parsing failed: {}. Falling back to default prompt.", e);
            return ReviewMode::Default;
        }
    };
    let names: HashSet<&str> = parsed
        .as_array()
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| label.get("name").and_then(|n| n.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if names.contains("gpt-review-strict") {
        ReviewMode::Strict
    } else if names.contains("gpt-review-light") {
        ReviewMode::Light
    } else {
        ReviewMode::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_wins_over_light() {
        let labels = r#"[{"name":"gpt-review-light"},{"name":"gpt-review-strict"}]"#;
        assert_eq!(select_mode(Some(labels)), ReviewMode::Strict);
    }

    #[test]
    fn light_wins_over_default() {
        let labels = r#"[{"name":"gpt-review-default"},{"name":"gpt-review-light"}]"#;
        assert_eq!(select_mode(Some(labels)), ReviewMode::Light);
    }

    #[test]
    fn explicit_default_label() {
        let labels = r#"[{"name":"gpt-review-default"}]"#;
        assert_eq!(select_mode(Some(labels)), ReviewMode::Default);
    }

    #[test]
    fn unmatched_labels_use_default() {
        let labels = r#"[{"name":"bug"},{"name":"enhancement"}]"#;
        assert_eq!(select_mode(Some(labels)), ReviewMode::Default);
    }

    #[test]
    fn missing_and_malformed_input_use_default() {
        assert_eq!(select_mode(None), ReviewMode::Default);
        assert_eq!(select_mode(Some("not json")), ReviewMode::Default);
        assert_eq!(select_mode(Some(r#"{"name":"gpt-review-strict"}"#)), ReviewMode::Default);
    }

    #[test]
    fn non_string_names_are_ignored() {
        let labels = r#"[{"name":42},{"name":"gpt-review-light"}]"#;
        assert_eq!(select_mode(Some(labels)), ReviewMode::Light);
    }
}

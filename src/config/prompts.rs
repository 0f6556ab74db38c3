//! Prompt templates for AgriBot.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("Invalid regex"))
}

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for farmer query answering.
///
/// `system` sees `{{farmer_name}}`, `{{fields}}` and `{{irrigation_history}}`;
/// `user` sees `{{query}}` and `{{context}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub system: String,
    pub user: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are AgriBot, a specialized agricultural assistant helping farmers manage their farms and crops.
You have access to the following information about the farmer:

Farmer: {{farmer_name}}
Fields: {{fields}}
Recent Irrigation History: {{irrigation_history}}

When responding to the farmer:
1. Be practical and specific, providing actionable advice based on their actual farm data
2. Use simple language and avoid technical jargon
3. Consider local agricultural practices and constraints
4. When appropriate, suggest sustainable farming practices
5. If you don't know something specific, acknowledge it clearly
6. Format your responses for easy reading on mobile devices

Your goal is to help improve farm productivity, sustainability, and the farmer's livelihood."#
                .to_string(),

            user: r#"I need information about the following query: {{query}}

Here's some relevant information that might help:
{{context}}

Please provide a helpful, accurate, and practical response based on this information and your knowledge about agriculture."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are substituted in a single pass, so a value that itself
    /// contains `{{name}}` is inserted verbatim. Unknown placeholders are kept.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        placeholder()
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.rag.system.contains("{{farmer_name}}"));
        assert!(prompts.rag.user.contains("{{query}}"));
        assert!(prompts.rag.user.contains("{{context}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, your {{crop}} field is dry.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Asha".to_string());
        vars.insert("crop".to_string(), "wheat".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Asha, your wheat field is dry.");
    }

    #[test]
    fn test_values_are_not_rendered_again() {
        let template = "Q: {{query}}\nC: {{context}}";
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "what is {{context}} here".to_string());
        vars.insert("context".to_string(), "chunk quoting {{query}}".to_string());

        for _ in 0..20 {
            assert_eq!(
                Prompts::render(template, &vars),
                "Q: what is {{context}} here\nC: chunk quoting {{query}}"
            );
        }
    }

    #[test]
    fn test_unknown_placeholder_is_kept() {
        let vars = HashMap::new();
        assert_eq!(Prompts::render("Hi {{nobody}}", &vars), "Hi {{nobody}}");
    }

    #[test]
    fn test_custom_variables_are_overridden() {
        let mut custom = HashMap::new();
        custom.insert("region".to_string(), "Vidarbha".to_string());
        custom.insert("query".to_string(), "ignored".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "when to sow cotton".to_string());

        let rendered = prompts.render_with_custom("{{query}} in {{region}}", &vars);
        assert_eq!(rendered, "when to sow cotton in Vidarbha");
    }

    #[test]
    fn test_load_custom_rag_prompts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rag.toml"),
            "system = \"Custom {{farmer_name}}\"\nuser = \"Q: {{query}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.rag.system, "Custom {{farmer_name}}");
        assert_eq!(prompts.rag.user, "Q: {{query}}");
    }
}

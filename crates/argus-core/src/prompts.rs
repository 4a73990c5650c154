//! Prompt set loading.
//!
//! A prompt set is an ordered list of [`PromptSpec`]s, stored either as TOML
//! (`[[prompts]]` tables) or JSON (`{"prompts": [...]}` or a bare array).

use crate::error::{ArgusError, Result};
use crate::types::PromptSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// The ordered work template applied to every image of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub prompts: Vec<PromptSpec>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonPromptFile {
    Wrapped { prompts: Vec<PromptSpec> },
    Bare(Vec<PromptSpec>),
}

impl PromptSet {
    /// Build a validated prompt set.
    pub fn new(prompts: Vec<PromptSpec>) -> Result<Self> {
        let set = Self { prompts };
        set.validate()?;
        Ok(set)
    }

    /// Load a prompt set from a `.toml` or `.json` file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let prompts = if is_json {
            match serde_json::from_str::<JsonPromptFile>(&content)? {
                JsonPromptFile::Wrapped { prompts } | JsonPromptFile::Bare(prompts) => prompts,
            }
        } else {
            toml::from_str::<PromptSet>(&content)
                .map_err(|e| ArgusError::Prompt(format!("{}: {e}", path.display())))?
                .prompts
        };

        tracing::debug!("Loaded {} prompts from {:?}", prompts.len(), path);
        Self::new(prompts)
    }

    /// Reject empty sets, blank ids and duplicate ids.
    pub fn validate(&self) -> Result<()> {
        if self.prompts.is_empty() {
            return Err(ArgusError::Prompt("prompt set is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for prompt in &self.prompts {
            if prompt.id.trim().is_empty() {
                return Err(ArgusError::Prompt(format!(
                    "prompt '{}' has an empty id",
                    prompt.name
                )));
            }
            if !seen.insert(prompt.id.as_str()) {
                return Err(ArgusError::Prompt(format!(
                    "duplicate prompt id '{}'",
                    prompt.id
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn into_inner(self) -> Vec<PromptSpec> {
        self.prompts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_SET: &str = r#"
[[prompts]]
id = "vehicles"
name = "Vehicle count"
objective = "Count vehicles on the road"
lookingFor = "Cars, buses, trucks"
criteria = "Match if more than five vehicles"

[[prompts]]
id = "crowd"
name = "Crowd detection"
objective = "Detect gatherings"
looking_for = "Groups of people"
criteria = "Match if more than ten people"
"#;

    #[test]
    fn test_load_toml_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.toml");
        std::fs::write(&path, TOML_SET).unwrap();

        let set = PromptSet::load_from(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.prompts[0].id, "vehicles");
        assert_eq!(set.prompts[0].looking_for, "Cars, buses, trucks");
        assert_eq!(set.prompts[1].looking_for, "Groups of people");
    }

    #[test]
    fn test_load_json_bare_and_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let entry = r#"{"id":"a","name":"A","objective":"o","lookingFor":"l","criteria":"c"}"#;

        let bare = dir.path().join("bare.json");
        std::fs::write(&bare, format!("[{entry}]")).unwrap();
        assert_eq!(PromptSet::load_from(&bare).unwrap().len(), 1);

        let wrapped = dir.path().join("wrapped.JSON");
        std::fs::write(&wrapped, format!("{{\"prompts\":[{entry}]}}")).unwrap();
        assert_eq!(PromptSet::load_from(&wrapped).unwrap().prompts[0].id, "a");
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(PromptSet::new(Vec::new()).is_err());

        let prompt = PromptSpec {
            id: "dup".to_string(),
            name: "Dup".to_string(),
            objective: String::new(),
            looking_for: String::new(),
            criteria: String::new(),
        };
        let err = PromptSet::new(vec![prompt.clone(), prompt]).unwrap_err();
        assert!(err.to_string().contains("duplicate prompt id 'dup'"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PromptSet::load_from(Path::new("/nonexistent/prompts.toml")).unwrap_err();
        assert!(matches!(err, ArgusError::Io(_)));
    }
}

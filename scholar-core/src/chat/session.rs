use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
}

impl Role {
    /// Speaker label used when the history is shown to the model.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Human => "Human",
            Role::Assistant => "AI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// The ordered turns of one conversation.
///
/// Sessions only grow; `clear` starts over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    turns: Vec<Turn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_human(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::Human,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::Assistant,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Renders the history as `Human: ...` / `AI: ...` lines.
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Writes the session as JSON, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write transcript {}", path.display()))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid transcript {}", path.display()))
    }
}

impl fmt::Display for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, turn) in self.turns.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", turn.role.label(), turn.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let mut session = ChatSession::new();
        assert_eq!(session.render(), "");

        session.push_human("hi");
        session.push_assistant("hello, how can I help?");
        session.push_human("what is BERT?");

        assert_eq!(
            session.render(),
            "Human: hi\nAI: hello, how can I help?\nHuman: what is BERT?"
        );
        assert_eq!(session.len(), 3);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("transcript.json");

        let mut session = ChatSession::new();
        session.push_human("hi");
        session.push_assistant("hello");
        session.save(&path).unwrap();

        let loaded = ChatSession::load(&path).unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.turns()[1].role, Role::Assistant);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"human\""));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(ChatSession::load(&path).is_err());
        assert!(ChatSession::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_clear() {
        let mut session = ChatSession::new();
        session.push_human("hi");
        session.clear();
        assert!(session.is_empty());
    }
}

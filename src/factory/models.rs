use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted, shareable template describing how to instantiate a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactoryRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Ordered, uniquely named attributes attached to the factory.
    #[serde(default)]
    pub attributes: Vec<FactoryAttribute>,
    pub config: FactoryConfig,
    #[serde(default)]
    pub created_at: String,
}

impl FactoryRecord {
    /// A new record with a generated id. Callers may also construct records
    /// with a pre-assigned id directly.
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, config: FactoryConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            attributes: vec![],
            config,
            created_at: String::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(FactoryAttribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactoryAttribute {
    pub name: String,
    pub value: String,
}

/// The workspace template a factory stamps out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactoryConfig {
    pub workspace_name: String,
    /// Recipe describing the environment to provision.
    pub recipe: Recipe,
    /// Commands made available in the created workspace.
    #[serde(default)]
    pub commands: Vec<CommandDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    /// Recipe content type, e.g. an image reference or a compose file.
    pub kind: RecipeKind,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecipeKind {
    Image,
    Dockerfile,
    Compose,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandDef {
    pub name: String,
    pub command_line: String,
}

/// Minimal owner record backing the factory ownership constraint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Owner {
    pub id: String,
    pub name: String,
}

use crate::report::TaskId;

const PLACEHOLDER: &str = "{id}";

/// Deterministic prompt per task id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Templates without `{id}` get the id prefixed so prompts stay distinct.
    pub fn render(&self, id: TaskId) -> String {
        if self.0.contains(PLACEHOLDER) {
            self.0.replace(PLACEHOLDER, &id.to_string())
        } else {
            format!("Request {id}: {}", self.0)
        }
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(genbench_common::config::DEFAULT_PROMPT_TEMPLATE)
    }
}

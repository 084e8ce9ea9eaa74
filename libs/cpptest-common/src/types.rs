use serde::{Deserialize, Serialize};

/// A single stored test case.
///
/// Every field is defaulted on read so that older test files which only
/// carry `name` and `forbidden` still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRecord {
    pub name: String,
    pub description: String,
    pub forbidden: Vec<String>,
    pub input: String,
    pub expected: String,
}

impl TestRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_forbidden<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.forbidden = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .collect();
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = expected.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Split a comma-separated forbidden list as typed into a single line.
///
/// Items are trimmed and empty items dropped, so `"goto, ,while "` yields
/// `["goto", "while"]`.
pub fn parse_forbidden_list(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// How forbidden tokens are matched against source text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseMatching {
    #[default]
    Insensitive,
    Sensitive,
}

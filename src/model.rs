use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub question: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub hints: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[serde(alias = "Easy")]
    Easy,
    #[default]
    #[serde(alias = "Medium")]
    Medium,
    #[serde(alias = "Hard")]
    Hard,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Review {
    #[serde(deserialize_with = "score_in_range")]
    pub score: u8,
    pub quality: Quality,
    #[serde(default)]
    pub feedback: Feedback,
    #[serde(default)]
    pub errors: Vec<CodeIssue>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Quality {
    #[serde(rename = "good", alias = "Good")]
    Good,
    #[serde(rename = "not bad", alias = "Not Bad", alias = "not_bad")]
    NotBad,
    #[serde(rename = "bad", alias = "Bad")]
    Bad,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CodeIssue {
    /// 1-based; 0 means the issue is not tied to a line.
    #[serde(default)]
    pub line: u32,
    #[serde(rename = "type", default)]
    pub kind: IssueKind,
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Syntax,
    Logic,
    Style,
    Runtime,
    #[default]
    #[serde(other)]
    Other,
}

fn default_topic() -> String {
    "Python Programming".to_string()
}

fn score_in_range<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "good",
            Quality::NotBad => "not bad",
            Quality::Bad => "bad",
        }
    }
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Syntax => "syntax",
            IssueKind::Logic => "logic",
            IssueKind::Style => "style",
            IssueKind::Runtime => "runtime",
            IssueKind::Other => "error",
        }
    }
}

impl Review {
    /// Lines the review flagged, ignoring general (line 0) issues.
    pub fn error_lines(&self) -> BTreeSet<u32> {
        self.errors
            .iter()
            .map(|issue| issue.line)
            .filter(|line| *line > 0)
            .collect()
    }
}

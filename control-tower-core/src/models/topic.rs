use serde::{Deserialize, Serialize};

/// Coarse category label for a task.
///
/// `Unclassified` marks records stored before topics existed. Labels this
/// build does not know are kept verbatim as `Custom` so a file written by
/// another tool still parses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum Topic {
    Frontend,
    Backend,
    Infrastructure,
    Data,
    Testing,
    Documentation,
    Bugfix,
    Research,
    General,
    #[default]
    Unclassified,
    Custom(String),
}

impl Topic {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Infrastructure => "infrastructure",
            Self::Data => "data",
            Self::Testing => "testing",
            Self::Documentation => "documentation",
            Self::Bugfix => "bugfix",
            Self::Research => "research",
            Self::General => "general",
            Self::Unclassified => "unclassified",
            Self::Custom(label) => label,
        }
    }

    /// Parses a label. Never fails: unknown labels become `Custom`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "frontend" => Self::Frontend,
            "backend" => Self::Backend,
            "infrastructure" => Self::Infrastructure,
            "data" => Self::Data,
            "testing" => Self::Testing,
            "documentation" => Self::Documentation,
            "bugfix" => Self::Bugfix,
            "research" => Self::Research,
            "general" => Self::General,
            "" | "unclassified" => Self::Unclassified,
            _ => Self::Custom(s.trim().to_string()),
        }
    }

    pub fn is_unclassified(&self) -> bool {
        matches!(self, Self::Unclassified)
    }
}

impl From<Option<String>> for Topic {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(Topic::parse).unwrap_or_default()
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        match topic {
            Topic::Custom(label) => label,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Earlier rows win ties.
const RULES: &[(Topic, &[&str])] = &[
    (
        Topic::Bugfix,
        &["bug", "fix", "crash", "broken", "regression", "error", "issue", "hotfix"],
    ),
    (
        Topic::Testing,
        &["test", "spec", "coverage", "e2e", "qa", "flaky", "assert"],
    ),
    (
        Topic::Documentation,
        &["doc", "docs", "readme", "guide", "tutorial", "changelog", "comment"],
    ),
    (
        Topic::Infrastructure,
        &[
            "deploy", "docker", "kubernetes", "k8s", "ci", "cd", "pipeline", "terraform", "infra",
            "server", "cloud", "aws", "azure", "build", "release",
        ],
    ),
    (
        Topic::Frontend,
        &[
            "ui", "ux", "css", "react", "component", "frontend", "layout", "page", "button",
            "style", "theme", "html", "tailwind", "view",
        ],
    ),
    (
        Topic::Backend,
        &[
            "api", "endpoint", "backend", "service", "auth", "handler", "route", "rest", "grpc",
            "websocket", "middleware",
        ],
    ),
    (
        Topic::Data,
        &[
            "data", "database", "db", "sql", "schema", "migration", "query", "etl", "analytics",
            "model", "dataset",
        ],
    ),
    (
        Topic::Research,
        &[
            "research", "investigate", "explore", "spike", "prototype", "evaluate", "compare",
            "study",
        ],
    ),
];

/// Assigns a topic from free text by keyword score. Falls back to `General`.
pub fn classify(title: &str, description: &str) -> Topic {
    let text = format!("{} {}", title, description).to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut best: Option<(&Topic, usize)> = None;
    for (topic, keywords) in RULES {
        let score = words
            .iter()
            .filter(|word| keywords.iter().any(|kw| keyword_matches(word, kw)))
            .count();
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((topic, score));
        }
    }

    best.map(|(topic, _)| topic.clone()).unwrap_or(Topic::General)
}

// Short keywords must match exactly; longer ones also match inflections
// ("test" -> "tests", "testing").
fn keyword_matches(word: &str, keyword: &str) -> bool {
    if keyword.len() < 4 {
        word == keyword
    } else {
        word.starts_with(keyword)
    }
}

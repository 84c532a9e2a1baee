use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::RegexBuilder;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::oracle::{SkillExtractor, SkillRequirements};

/// Keyword table: pattern over ticket text -> canonical skill name.
/// Order inside each tier is preserved into the requirement sets.
const CRITICAL_PATTERNS: &[(&str, &str)] = &[
    (r"\baws\b|\bamazon web services\b", "aws"),
    (r"\bs3\b|\bbucket\b", "s3"),
    (r"\bgcp\b|\bgoogle cloud\b|\bbigquery\b", "gcp"),
    (r"\bazure\b", "azure"),
    (r"\bkubernetes\b|\bk8s\b", "kubernetes"),
    (r"\bdns\b|\bvpn\b|\bfirewall\b|\bnetwork", "networking"),
    (r"\bpostgres\b|\bmysql\b|\bdatabase\b|\bsql\b", "sql"),
    (r"\bactive directory\b|\bwindows server\b", "windows"),
    (r"\blinux\b|\bssh\b", "linux"),
    (r"\bsecurity\b|\bphishing\b|\bmalware\b", "security"),
];

const IMPORTANT_PATTERNS: &[(&str, &str)] = &[
    (r"\bterraform\b", "terraform"),
    (r"\bdocker\b|\bcontainer", "docker"),
    (r"\bpython\b", "python"),
    (r"\bci/cd\b|\bpipeline\b|\bjenkins\b", "ci-cd"),
    (r"\bgrafana\b|\bprometheus\b|\bmonitoring\b|\balert", "monitoring"),
    (r"\biam\b|\bpermission\b|\baccess denied\b", "iam"),
];

const NICE_PATTERNS: &[(&str, &str)] = &[
    (r"\bdocumentation\b|\brunbook\b", "documentation"),
    (r"\bscript|\bautomation\b", "scripting"),
];

struct CompiledTier {
    patterns: Vec<(regex::Regex, &'static str)>,
}

impl CompiledTier {
    fn new(table: &[(&'static str, &'static str)]) -> Self {
        let patterns = table
            .iter()
            .map(|(pattern, skill)| {
                let re = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("static skill pattern must compile");
                (re, *skill)
            })
            .collect();
        Self { patterns }
    }

    fn matches(&self, text: &str) -> Vec<String> {
        self.patterns
            .iter()
            .filter(|(re, _)| re.is_match(text))
            .map(|(_, skill)| skill.to_string())
            .collect()
    }
}

/// Deterministic extractor over a fixed keyword/category table. Backs
/// development and tests; production typically points at the remote
/// extraction service instead.
pub struct KeywordSkillExtractor {
    critical: CompiledTier,
    important: CompiledTier,
    nice: CompiledTier,
}

impl KeywordSkillExtractor {
    pub fn new() -> Self {
        Self {
            critical: CompiledTier::new(CRITICAL_PATTERNS),
            important: CompiledTier::new(IMPORTANT_PATTERNS),
            nice: CompiledTier::new(NICE_PATTERNS),
        }
    }
}

impl Default for KeywordSkillExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SkillExtractor for KeywordSkillExtractor {
    async fn extract(&self, ticket_text: &str, category: &str) -> Result<SkillRequirements> {
        let mut critical = Vec::new();

        // The declared category leads the critical set when it names a
        // known platform.
        let category = category.trim().to_lowercase();
        if !category.is_empty() {
            let category_hit = self
                .critical
                .patterns
                .iter()
                .find(|(re, _)| re.is_match(&category));
            if let Some((_, skill)) = category_hit {
                critical.push(skill.to_string());
            }
        }

        critical.extend(self.critical.matches(ticket_text));
        let important = self.important.matches(ticket_text);
        let nice = self.nice.matches(ticket_text);

        Ok(SkillRequirements::new(critical, important, nice))
    }
}

#[derive(Serialize)]
struct ExtractionRequest<'a> {
    text: &'a str,
    category: &'a str,
}

#[derive(Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    critical: Vec<String>,
    #[serde(default)]
    important: Vec<String>,
    #[serde(default)]
    nice_to_have: Vec<String>,
}

/// Calls the external skill-extraction service (the model behind it is not
/// this crate's concern).
pub struct RemoteSkillExtractor {
    client: Client,
    endpoint: String,
}

impl RemoteSkillExtractor {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/extract_skills", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl SkillExtractor for RemoteSkillExtractor {
    async fn extract(&self, ticket_text: &str, category: &str) -> Result<SkillRequirements> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ExtractionRequest {
                text: ticket_text,
                category,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("skill extraction failed ({}): {}", status, body));
        }

        let parsed: ExtractionResponse = response.json().await?;
        Ok(SkillRequirements::new(
            parsed.critical,
            parsed.important,
            parsed.nice_to_have,
        ))
    }
}

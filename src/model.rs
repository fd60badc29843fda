use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// Severity class. The declaration order is the report order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum RiskLevel {
    #[serde(alias = "critical", alias = "CRITICAL", alias = "C")]
    Critical,
    #[serde(alias = "high", alias = "HIGH", alias = "H")]
    High,
    #[serde(alias = "medium", alias = "MEDIUM", alias = "M")]
    Medium,
    #[serde(alias = "low", alias = "LOW", alias = "L")]
    Low,
    #[serde(
        alias = "informational",
        alias = "INFORMATIONAL",
        alias = "Info",
        alias = "info",
        alias = "INFO",
        alias = "I"
    )]
    Informational,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 5] = [
        RiskLevel::Critical,
        RiskLevel::High,
        RiskLevel::Medium,
        RiskLevel::Low,
        RiskLevel::Informational,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RiskLevel::Critical => "Critical",
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
            RiskLevel::Informational => "Informational",
        }
    }

    /// Identifier prefix letter ("H" in "H1").
    pub fn id_prefix(self) -> char {
        match self {
            RiskLevel::Critical => 'C',
            RiskLevel::High => 'H',
            RiskLevel::Medium => 'M',
            RiskLevel::Low => 'L',
            RiskLevel::Informational => 'I',
        }
    }

    /// Upper-case tag used in token names and summary status cells.
    pub fn tag(self) -> &'static str {
        match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
            RiskLevel::Informational => "INFO",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One finding. Field aliases cover the column headers and key spellings
/// accepted from upstream exports.
#[derive(Clone, Debug, Deserialize)]
pub struct Finding {
    #[serde(alias = "Vulnerability ID", alias = "vuln_id", alias = "ID", alias = "Id")]
    pub id: String,
    #[serde(alias = "Title", alias = "Vulnerability Title", alias = "name")]
    pub title: String,
    #[serde(default, alias = "Description", alias = "Details")]
    pub description: String,
    #[serde(alias = "Risk Level", alias = "risk", alias = "Risk", alias = "severity", alias = "Severity")]
    pub risk_level: RiskLevel,
    #[serde(
        default,
        alias = "CVSS Score",
        alias = "cvss",
        alias = "CVSS",
        alias = "cvss_score"
    )]
    pub score: Option<f32>,
    #[serde(
        default,
        alias = "Affected Components",
        alias = "affected",
        alias = "Affected"
    )]
    pub affected_components: String,
    #[serde(default, alias = "Recommendation", alias = "remediation", alias = "Remediation")]
    pub recommendation: String,
    #[serde(default, alias = "Steps", alias = "poc_steps", alias = "PoC Steps")]
    pub steps: Vec<String>,
    #[serde(default, alias = "PoC Folder", alias = "poc_folder", alias = "asset_folder")]
    pub poc_folder: Option<String>,
    #[serde(default, alias = "CWE ID", alias = "cwe", alias = "CWE")]
    pub cwe_id: Option<String>,
    #[serde(default, alias = "Impact")]
    pub impact: Option<String>,
    #[serde(default, alias = "References")]
    pub references: Option<String>,
    #[serde(default, alias = "Remediation Effort", alias = "effort")]
    pub remediation_effort: Option<String>,
}

impl Finding {
    pub fn new(id: &str, title: &str, risk_level: RiskLevel) -> Self {
        Finding {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            risk_level,
            score: None,
            affected_components: String::new(),
            recommendation: String::new(),
            steps: Vec::new(),
            poc_folder: None,
            cwe_id: None,
            impact: None,
            references: None,
            remediation_effort: None,
        }
    }

    /// Normalize the identifier to upper case and check `[C|H|M|L|I]<digits>`
    /// and the score range.
    pub fn validate(&mut self) -> Result<(), Error> {
        let id = self.id.trim().to_uppercase();
        let invalid = |reason: String| Error::InvalidFinding {
            id: self.id.clone(),
            reason,
        };
        let mut chars = id.chars();
        let prefix_ok = chars.next().is_some_and(|c| "CHMLI".contains(c));
        let digits = chars.as_str();
        if !prefix_ok || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid(
                "expected format [C|H|M|L|I]<number> (e.g. H1, M2, L3)".into(),
            ));
        }
        if let Some(score) = self.score
            && !(0.0..=10.0).contains(&score)
        {
            return Err(invalid(format!("score {score} is outside 0.0..=10.0")));
        }
        self.id = id;
        Ok(())
    }

    /// "`<id>. <title>`", as used in headings and summary rows.
    pub fn heading(&self) -> String {
        format!("{}. {}", self.id, self.title)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Report {
    #[serde(default, alias = "report_title", alias = "Report Title")]
    pub title: String,
    #[serde(default)]
    pub app_url: Option<String>,
    #[serde(alias = "vulnerabilities")]
    pub findings: Vec<Finding>,
}

impl Report {
    /// Validate every finding and order them by risk level. The sort is
    /// stable, so findings keep their input order within a level.
    pub fn new(title: &str, mut findings: Vec<Finding>) -> Result<Self, Error> {
        for finding in &mut findings {
            finding.validate()?;
        }
        findings.sort_by_key(|f| f.risk_level);
        Ok(Report {
            title: title.to_string(),
            app_url: None,
            findings,
        })
    }

    pub fn load_json(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())))
        })?;
        let raw: Report = serde_json::from_str(&text)?;
        let mut report = Report::new(&raw.title, raw.findings)?;
        report.app_url = raw.app_url;
        Ok(report)
    }

    pub fn by_level(&self, level: RiskLevel) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.risk_level == level)
    }

    pub fn count(&self, level: RiskLevel) -> usize {
        self.by_level(level).count()
    }

    pub fn total(&self) -> usize {
        self.findings.len()
    }
}

//! Rule-based quality gate over generated findings text.
//!
//! Pure and deterministic: the same text always yields the same report.

use serde::{Deserialize, Serialize};

/// Minimum trimmed length, in UTF-8 bytes.
pub const MIN_FINDINGS_LEN: usize = 20;

/// Marker appended to `safety` when a blocked result is downgraded to review.
pub const BLOCKED_DOWNGRADED: &str = "blocked_downgraded";

const LESION_TERMS: &[&str] = &[
    "病灶", "病变", "结节", "肿块", "占位", "lesion", "nodule", "mass",
];

const CHANGE_TERMS: &[&str] = &[
    "变化", "较前", "进展", "缩小", "增大", "稳定", "趋势", "change", "progress", "stable",
    "trend",
];

const SOFT_TERMS: &[&str] = &["不确定", "建议结合临床", "可能", "疑似", "uncertain", "possible"];

const DANGER_TERMS: &[&str] = &["无法判断", "危急值", "大出血", "张力性气胸", "critical finding"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcStatus {
    Pass,
    ReviewRequired,
    Blocked,
}

impl QcStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QcStatus::Pass => "pass",
            QcStatus::ReviewRequired => "review_required",
            QcStatus::Blocked => "blocked",
        }
    }
}

impl core::fmt::Display for QcStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issues grouped by category, each in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcIssues {
    pub format: Vec<String>,
    pub completeness: Vec<String>,
    pub safety: Vec<String>,
}

impl QcIssues {
    pub fn is_empty(&self) -> bool {
        self.format.is_empty() && self.completeness.is_empty() && self.safety.is_empty()
    }

    /// `category:issue` strings, categories in fixed order.
    pub fn flatten(&self) -> Vec<String> {
        let groups = [
            ("format", &self.format),
            ("completeness", &self.completeness),
            ("safety", &self.safety),
        ];
        groups
            .into_iter()
            .flat_map(|(category, issues)| {
                issues.iter().map(move |issue| format!("{category}:{issue}"))
            })
            .collect()
    }

    fn has_danger_flag(&self) -> bool {
        self.safety.iter().any(|issue| issue.starts_with("danger_flag:"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QcReport {
    pub status: QcStatus,
    pub issues: QcIssues,
}

impl QcReport {
    /// Rewrites `blocked` to `review_required` and records the downgrade.
    /// Other statuses are returned unchanged.
    pub fn downgrade_blocked(mut self) -> Self {
        if self.status == QcStatus::Blocked {
            self.status = QcStatus::ReviewRequired;
            self.issues.safety.push(BLOCKED_DOWNGRADED.to_string());
        }
        self
    }
}

fn mentions_any(raw: &str, lowered: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| raw.contains(term) || lowered.contains(term))
}

/// Classify a block of findings text.
pub fn evaluate_findings(findings: &str) -> QcReport {
    let text = findings.trim();
    let lowered = text.to_lowercase();
    let mut issues = QcIssues::default();

    if text.len() < MIN_FINDINGS_LEN {
        issues.format.push("findings_too_short".to_string());
    }

    if !mentions_any(text, &lowered, LESION_TERMS) {
        issues.completeness.push("missing_lesion_mention".to_string());
    }
    if !mentions_any(text, &lowered, CHANGE_TERMS) {
        issues.completeness.push("missing_change_mention".to_string());
    }

    for term in SOFT_TERMS {
        if lowered.contains(term) {
            issues.safety.push(format!("soft_flag:{term}"));
        }
    }
    for term in DANGER_TERMS {
        if lowered.contains(term) {
            issues.safety.push(format!("danger_flag:{term}"));
        }
    }

    let status = if issues.has_danger_flag() {
        QcStatus::Blocked
    } else if !issues.is_empty() {
        QcStatus::ReviewRequired
    } else {
        QcStatus::Pass
    };

    QcReport { status, issues }
}

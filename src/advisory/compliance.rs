use serde::Serialize;

const PROHIBITED_TOPICS: [&str; 8] = [
    "insider trading",
    "front run",
    "front-running",
    "stock manipulation",
    "market manipulation",
    "tax evasion",
    "black money",
    "laundering",
];

const GUARANTEE_CLAIMS: [&str; 6] = [
    "guaranteed returns",
    "sure shot",
    "sure-shot",
    "risk free",
    "risk-free",
    "double my money quickly",
];

const BANNED_PHRASES: [&str; 5] = [
    "guaranteed returns",
    "risk free return",
    "risk-free return",
    "sure shot profit",
    "sure-shot profit",
];

const REDACTION: &str = "[removed non-compliant phrase]";

pub const DISCLAIMER: &str = "Disclaimer: Mutual fund and market-linked investments are subject \
    to market risks. Please read all scheme-related documents carefully and, if needed, consult \
    a SEBI-registered advisor.";

const PROJECTION_NOTICE: &str = "These figures are probabilistic projections from a Monte Carlo \
    simulation, not guaranteed outcomes.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardVerdict {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Screens a user message before it reaches the advisory layer.
pub fn check_input(text: &str) -> GuardVerdict {
    let lowered = text.to_lowercase();

    if let Some(topic) = PROHIBITED_TOPICS.iter().find(|kw| lowered.contains(*kw)) {
        tracing::info!(topic, "blocked prohibited request");
        return GuardVerdict {
            allowed: false,
            message: Some(format!(
                "I cannot help with requests related to illegal or unethical financial activity \
                 (such as '{topic}'). Please ask about legitimate investment planning instead."
            )),
        };
    }

    if GUARANTEE_CLAIMS.iter().any(|kw| lowered.contains(kw)) {
        return GuardVerdict {
            allowed: false,
            message: Some(
                "No legitimate financial product can offer guaranteed or risk-free returns. \
                 I can help you understand risk-reward trade-offs, asset allocation, and \
                 SEBI-compliant products instead."
                    .to_string(),
            ),
        };
    }

    GuardVerdict {
        allowed: true,
        message: None,
    }
}

/// Redacts banned phrases (case-insensitive); returns the text and whether it changed.
pub fn sanitize_output(text: &str) -> (String, bool) {
    let mut sanitized = text.to_string();
    let mut modified = false;

    for phrase in BANNED_PHRASES {
        while let Some(start) = sanitized.to_ascii_lowercase().find(phrase) {
            sanitized.replace_range(start..start + phrase.len(), REDACTION);
            modified = true;
        }
    }

    (sanitized, modified)
}

pub fn append_disclaimer(text: &str) -> String {
    let normalized = text.trim();
    if normalized
        .to_lowercase()
        .contains(&DISCLAIMER.to_lowercase())
    {
        return normalized.to_string();
    }
    format!("{normalized}\n\n{DISCLAIMER}")
}

/// Label attached to every simulated outcome shown to an end user.
pub fn projection_notice() -> String {
    format!("{PROJECTION_NOTICE} {DISCLAIMER}")
}

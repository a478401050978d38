pub const DEFINITION_NOT_FOUND: &str = "Definition not found.";

const TERMS: &[(&str, &str)] = &[
    (
        "sip",
        "SIP (Systematic Investment Plan) is a method of investing a fixed amount at regular intervals into a mutual fund.",
    ),
    (
        "stp",
        "STP (Systematic Transfer Plan) allows investors to periodically transfer a fixed sum from one mutual fund to another.",
    ),
    (
        "swp",
        "SWP (Systematic Withdrawal Plan) enables periodic withdrawals from your investment while remaining invested.",
    ),
    (
        "cagr",
        "CAGR (Compound Annual Growth Rate) is the annualized growth rate of an investment over a given period.",
    ),
    (
        "expense_ratio",
        "Expense Ratio is the annual fee charged by a mutual fund, expressed as a percentage of its assets.",
    ),
    (
        "sharpe",
        "Sharpe Ratio measures risk-adjusted returns by comparing excess return to volatility.",
    ),
    (
        "alpha",
        "Alpha measures a fund's ability to outperform its benchmark on a risk-adjusted basis.",
    ),
    (
        "beta",
        "Beta measures a fund's volatility relative to the market. A beta above 1 indicates higher volatility.",
    ),
    (
        "nav",
        "NAV (Net Asset Value) is the market value per unit of a mutual fund.",
    ),
    (
        "aum",
        "AUM (Assets Under Management) is the total market value managed by a mutual fund or asset manager.",
    ),
    (
        "reit",
        "REIT (Real Estate Investment Trust) is a company that owns or operates income-generating real estate.",
    ),
    (
        "etf",
        "ETF (Exchange Traded Fund) is a fund traded on stock exchanges, tracking an index or asset class.",
    ),
    (
        "arbitrage_fund",
        "Arbitrage Funds exploit price differences in cash and derivatives markets, typically low-risk.",
    ),
];

/// Normalises a user-supplied term to its table key, so "Expense Ratio" and
/// "expense-ratio" both find `expense_ratio`.
fn normalize(term: &str) -> String {
    term.trim()
        .to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn lookup_term(term: &str) -> Option<&'static str> {
    let key = normalize(term);
    TERMS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, definition)| *definition)
}

/// Every term the glossary defines, in table order.
pub fn glossary_terms() -> impl Iterator<Item = &'static str> {
    TERMS.iter().map(|(name, _)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_padding() {
        let definition = lookup_term("  SIP ").expect("sip is defined");
        assert!(definition.starts_with("SIP (Systematic Investment Plan)"));
        assert_eq!(lookup_term("nav"), lookup_term("NAV"));
    }

    #[test]
    fn multi_word_terms_accept_spaces_and_hyphens() {
        let expected = lookup_term("expense_ratio").expect("defined");
        assert_eq!(lookup_term("Expense Ratio"), Some(expected));
        assert_eq!(lookup_term("expense-ratio"), Some(expected));
        assert!(lookup_term("arbitrage fund").is_some());
    }

    #[test]
    fn unknown_terms_are_not_found() {
        assert_eq!(lookup_term("crypto"), None);
        assert_eq!(lookup_term(""), None);
    }

    #[test]
    fn every_listed_term_resolves() {
        assert_eq!(glossary_terms().count(), 13);
        for term in glossary_terms() {
            assert!(lookup_term(term).is_some(), "{term} should resolve");
        }
    }
}

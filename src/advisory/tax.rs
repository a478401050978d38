use serde::{Deserialize, Serialize};

use crate::core::{Result, SimulationError};

/// Section 80C deduction ceiling.
pub const SECTION_80C_LIMIT: f64 = 150_000.0;
/// Section 80CCD(1B) NPS deduction ceiling.
pub const NPS_80CCD_1B_LIMIT: f64 = 50_000.0;

const SECTION_80C_SHARE: f64 = 0.6;
const ELSS_SHARE_OF_80C: f64 = 0.5;
const NPS_SHARE: f64 = 0.2;

const UNKNOWN_REGIME_MESSAGE: &str = "Unknown tax regime. Please specify 'old' or 'new'.";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TaxRegime {
    /// Allows 80C deductions as well as NPS.
    Old,
    /// Allows only the NPS deduction.
    New,
}

impl TaxRegime {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "old" => Some(TaxRegime::Old),
            "new" => Some(TaxRegime::New),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaxSavingRequest {
    pub income: f64,
    pub regime: String,
    pub hra: f64,
    #[serde(alias = "investment_amount")]
    pub investment_amount: f64,
}

/// Suggested split of an investable amount across deduction sections.
///
/// Sections the regime does not allow are left out; an unrecognised regime
/// yields only `message` next to the echoed inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSavingPlan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_80c_elss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_80c_ppf_epf_lic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nps_80ccd_1b: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub user_income: f64,
    pub user_regime: String,
    pub user_hra: f64,
    pub investment_amount: f64,
}

fn non_negative(value: f64, field: &'static str) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimulationError::invalid(field, "must be finite and >= 0"));
    }
    Ok(value)
}

pub fn suggest_tax_saving_options(request: &TaxSavingRequest) -> Result<TaxSavingPlan> {
    let income = non_negative(request.income, "income")?;
    let hra = non_negative(request.hra, "hra")?;
    let amount = non_negative(request.investment_amount, "investment_amount")?;
    let regime_label = request.regime.trim().to_ascii_lowercase();

    let mut plan = TaxSavingPlan {
        section_80c_elss: None,
        section_80c_ppf_epf_lic: None,
        nps_80ccd_1b: None,
        message: None,
        user_income: income,
        user_regime: regime_label,
        user_hra: hra,
        investment_amount: amount,
    };
    let nps = (amount * NPS_SHARE).min(NPS_80CCD_1B_LIMIT);

    match TaxRegime::parse(&request.regime) {
        Some(TaxRegime::Old) => {
            let section_80c = (amount * SECTION_80C_SHARE).min(SECTION_80C_LIMIT);
            let elss = section_80c * ELSS_SHARE_OF_80C;
            plan.section_80c_elss = Some(elss);
            plan.section_80c_ppf_epf_lic = Some(section_80c - elss);
            plan.nps_80ccd_1b = Some(nps);
        }
        Some(TaxRegime::New) => plan.nps_80ccd_1b = Some(nps),
        None => {
            tracing::debug!(regime = %plan.user_regime, "unknown tax regime");
            plan.message = Some(UNKNOWN_REGIME_MESSAGE);
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(regime: &str, investment_amount: f64) -> TaxSavingRequest {
        TaxSavingRequest {
            income: 1_200_000.0,
            regime: regime.to_string(),
            hra: 0.0,
            investment_amount,
        }
    }

    #[test]
    fn old_regime_splits_80c_and_adds_nps() {
        let plan = suggest_tax_saving_options(&request("old", 100_000.0)).expect("valid request");
        assert_eq!(plan.section_80c_elss, Some(30_000.0));
        assert_eq!(plan.section_80c_ppf_epf_lic, Some(30_000.0));
        assert_eq!(plan.nps_80ccd_1b, Some(20_000.0));
        assert_eq!(plan.message, None);
        assert_eq!(plan.user_regime, "old");
    }

    #[test]
    fn large_amounts_hit_both_ceilings() {
        let plan = suggest_tax_saving_options(&request("OLD", 1_000_000.0)).expect("valid request");
        let elss = plan.section_80c_elss.expect("elss");
        let other = plan.section_80c_ppf_epf_lic.expect("ppf");
        assert_eq!(elss + other, SECTION_80C_LIMIT);
        assert_eq!(elss, 75_000.0);
        assert_eq!(plan.nps_80ccd_1b, Some(NPS_80CCD_1B_LIMIT));
        assert_eq!(plan.user_regime, "old");
    }

    #[test]
    fn new_regime_only_suggests_nps() {
        let plan = suggest_tax_saving_options(&request(" New ", 400_000.0)).expect("valid request");
        assert_eq!(plan.section_80c_elss, None);
        assert_eq!(plan.section_80c_ppf_epf_lic, None);
        assert_eq!(plan.nps_80ccd_1b, Some(NPS_80CCD_1B_LIMIT));

        let plan = suggest_tax_saving_options(&request("new", 10_000.0)).expect("valid request");
        assert_eq!(plan.nps_80ccd_1b, Some(2_000.0));
    }

    #[test]
    fn unknown_regime_returns_a_message_and_echoes_inputs() {
        let plan = suggest_tax_saving_options(&request("Flat", 50_000.0)).expect("valid request");
        assert_eq!(plan.message, Some(UNKNOWN_REGIME_MESSAGE));
        assert_eq!(plan.nps_80ccd_1b, None);
        assert_eq!(plan.user_regime, "flat");
        assert_eq!(plan.user_income, 1_200_000.0);
        assert_eq!(plan.investment_amount, 50_000.0);
    }

    #[test]
    fn negative_or_non_finite_inputs_name_the_field() {
        let err = suggest_tax_saving_options(&request("old", -1.0)).expect_err("negative amount");
        assert_eq!(err.field(), Some("investment_amount"));

        let mut bad_income = request("new", 1.0);
        bad_income.income = f64::NAN;
        let err = suggest_tax_saving_options(&bad_income).expect_err("nan income");
        assert_eq!(err.field(), Some("income"));
    }

    #[test]
    fn plan_serialises_only_allowed_sections() {
        let plan = suggest_tax_saving_options(&request("new", 10_000.0)).expect("valid request");
        let value = serde_json::to_value(&plan).expect("serialise");
        assert_eq!(value["nps80ccd1b"], 2_000.0);
        assert!(value.get("section80cElss").is_none());
        assert!(value.get("message").is_none());
        assert_eq!(value["userRegime"], "new");
    }
}

//! Rule tables that sit around the projection engine: risk scoring, model
//! allocations, the compliance keyword guard, tax-saving splits and a
//! glossary of investment terms.

mod allocation;
mod compliance;
mod glossary;
mod risk;
mod tax;

pub use allocation::{allocation_for_label, explain_allocation, model_allocation};
pub use compliance::{
    DISCLAIMER, GuardVerdict, append_disclaimer, check_input, projection_notice, sanitize_output,
};
pub use glossary::{DEFINITION_NOT_FOUND, glossary_terms, lookup_term};
pub use risk::{Level, RiskCategory, RiskProfile, RiskQuestionnaire, score_risk};
pub use tax::{
    NPS_80CCD_1B_LIMIT, SECTION_80C_LIMIT, TaxRegime, TaxSavingPlan, TaxSavingRequest,
    suggest_tax_saving_options,
};

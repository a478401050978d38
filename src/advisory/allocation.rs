use crate::core::{Allocation, AssetClass};

use super::risk::RiskCategory;

/// Model allocation (equity/debt/gold/other percentages) for a risk category.
pub fn model_allocation(category: RiskCategory) -> Allocation {
    match category {
        RiskCategory::Conservative => Allocation::from_classes(20.0, 60.0, 10.0, 10.0),
        RiskCategory::Moderate => Allocation::from_classes(40.0, 40.0, 10.0, 10.0),
        RiskCategory::Aggressive => Allocation::from_classes(70.0, 20.0, 5.0, 5.0),
    }
}

/// Allocation for a free-form category label; unknown labels get a balanced mix.
pub fn allocation_for_label(label: &str) -> Allocation {
    match RiskCategory::parse(label) {
        Some(category) => model_allocation(category),
        None => {
            tracing::debug!(label, "unknown risk category, using balanced allocation");
            Allocation::from_classes(50.0, 40.0, 5.0, 5.0)
        }
    }
}

pub fn explain_allocation(allocation: &Allocation, category_label: &str) -> String {
    let weight = |class: AssetClass| allocation.weight(class.key()).unwrap_or(0.0);
    format!(
        "The recommended portfolio for a '{category_label}' investor is:\n\n\
         - Equity: {}%\n\
         - Debt: {}%\n\
         - Gold: {}%\n\
         - Other Assets (REITs, Arbitrage funds): {}%\n\n\
         This allocation is based on your risk appetite and aims to balance growth potential \
         with stability. Equity provides long-term growth, debt offers stability and \
         predictable returns, gold acts as a hedge against inflation, and other assets \
         provide diversification.",
        weight(AssetClass::Equity),
        weight(AssetClass::Debt),
        weight(AssetClass::Gold),
        weight(AssetClass::Other),
    )
}

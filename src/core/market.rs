use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{Result, SimulationError};
use super::types::{AssetClass, Allocation, BlendedParameters};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Annual return and volatility assumed for one asset class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAssumption {
    #[serde(alias = "expected_return")]
    pub expected_return: f64,
    pub volatility: f64,
}

impl AssetAssumption {
    pub const fn new(expected_return: f64, volatility: f64) -> Self {
        Self {
            expected_return,
            volatility,
        }
    }
}

/// Return/volatility table used to price an allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnModel {
    pub assets: BTreeMap<String, AssetAssumption>,
    /// Applied to any asset name missing from `assets`.
    #[serde(default = "default_fallback")]
    pub fallback: AssetAssumption,
}

fn default_fallback() -> AssetAssumption {
    AssetAssumption::new(0.06, 0.10)
}

impl Default for ReturnModel {
    fn default() -> Self {
        let mut assets = BTreeMap::new();
        for (class, assumption) in [
            (AssetClass::Equity, AssetAssumption::new(0.12, 0.18)),
            (AssetClass::Debt, AssetAssumption::new(0.07, 0.05)),
            (AssetClass::Gold, AssetAssumption::new(0.08, 0.12)),
            (AssetClass::Other, AssetAssumption::new(0.06, 0.08)),
        ] {
            assets.insert(class.key().to_string(), assumption);
        }
        Self {
            assets,
            fallback: default_fallback(),
        }
    }
}

impl ReturnModel {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let model: ReturnModel = serde_json::from_str(&raw)?;
        model.validate()?;
        Ok(model)
    }

    pub fn with_asset(mut self, asset: impl Into<String>, assumption: AssetAssumption) -> Self {
        self.assets.insert(asset.into(), assumption);
        self
    }

    pub fn assumption(&self, asset: &str) -> Option<AssetAssumption> {
        self.assets.get(asset).copied()
    }

    pub fn validate(&self) -> Result<()> {
        let entries = self
            .assets
            .iter()
            .map(|(name, a)| (name.as_str(), a))
            .chain(std::iter::once(("fallback", &self.fallback)));
        for (asset, assumption) in entries {
            if !assumption.expected_return.is_finite() {
                return Err(SimulationError::InvalidModel {
                    asset: asset.to_string(),
                    reason: "expected return must be finite".to_string(),
                });
            }
            if !assumption.volatility.is_finite() || assumption.volatility < 0.0 {
                return Err(SimulationError::InvalidModel {
                    asset: asset.to_string(),
                    reason: "volatility must be finite and >= 0".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Weighted blend of per-asset assumptions.
    ///
    /// Each weight counts as `weight / 100` on its own; the allocation is not
    /// renormalised, so weights summing to 60 yield an under-invested blend.
    pub fn blend(&self, allocation: &Allocation) -> BlendedParameters {
        let mut expected_return = 0.0;
        let mut volatility = 0.0;
        let mut unknown_assets = Vec::new();

        for (asset, weight) in allocation.iter() {
            let fraction = weight / 100.0;
            let assumption = match self.assumption(asset) {
                Some(assumption) => assumption,
                None => {
                    tracing::warn!(
                        asset,
                        expected_return = self.fallback.expected_return,
                        volatility = self.fallback.volatility,
                        "unknown asset class, using fallback assumption"
                    );
                    unknown_assets.push(asset.to_string());
                    self.fallback
                }
            };
            expected_return += fraction * assumption.expected_return;
            volatility += fraction * assumption.volatility;
        }

        let total_weight = allocation.total_weight();
        if (total_weight - 100.0).abs() > WEIGHT_SUM_TOLERANCE {
            tracing::debug!(total_weight, "allocation weights do not sum to 100");
        }

        BlendedParameters {
            expected_return,
            volatility,
            unknown_assets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn blend_weights_each_asset_by_percentage() {
        let model = ReturnModel::default();
        let blended = model.blend(&Allocation::from_classes(50.0, 40.0, 5.0, 5.0));
        assert_approx(
            blended.expected_return,
            0.5 * 0.12 + 0.4 * 0.07 + 0.05 * 0.08 + 0.05 * 0.06,
        );
        assert_approx(
            blended.volatility,
            0.5 * 0.18 + 0.4 * 0.05 + 0.05 * 0.12 + 0.05 * 0.08,
        );
        assert!(blended.unknown_assets.is_empty());
    }

    #[test]
    fn blend_does_not_renormalise_partial_allocations() {
        let model = ReturnModel::default();
        let mut allocation = Allocation::new();
        allocation.set(AssetClass::Equity, 60.0);

        let blended = model.blend(&allocation);
        assert_approx(blended.expected_return, 0.6 * 0.12);
        assert_approx(blended.volatility, 0.6 * 0.18);
    }

    #[test]
    fn unknown_assets_use_fallback_and_are_reported() {
        let model = ReturnModel::default();
        let mut allocation = Allocation::new();
        allocation.insert("crypto", 100.0);

        let blended = model.blend(&allocation);
        assert_approx(blended.expected_return, 0.06);
        assert_approx(blended.volatility, 0.10);
        assert_eq!(blended.unknown_assets, vec!["crypto".to_string()]);
    }

    #[test]
    fn empty_allocation_blends_to_zero() {
        let blended = ReturnModel::default().blend(&Allocation::new());
        assert_eq!(blended.expected_return, 0.0);
        assert_eq!(blended.volatility, 0.0);
    }

    #[test]
    fn overridden_assumptions_take_effect() {
        let model = ReturnModel::default().with_asset("equity", AssetAssumption::new(0.10, 0.0));
        let mut allocation = Allocation::new();
        allocation.set(AssetClass::Equity, 100.0);

        let blended = model.blend(&allocation);
        assert_approx(blended.expected_return, 0.10);
        assert_approx(blended.volatility, 0.0);
    }

    #[test]
    fn validate_rejects_negative_volatility() {
        let model =
            ReturnModel::default().with_asset("gold", AssetAssumption::new(0.08, -0.01));
        let err = model.validate().expect_err("negative volatility must fail");
        assert!(err.to_string().contains("gold"));
    }

    #[test]
    fn model_deserializes_with_default_fallback() {
        let json = r#"{"assets": {"equity": {"expectedReturn": 0.1, "volatility": 0.2}}}"#;
        let model: ReturnModel = serde_json::from_str(json).expect("valid model json");
        assert_eq!(model.assumption("equity"), Some(AssetAssumption::new(0.1, 0.2)));
        assert_eq!(model.fallback, AssetAssumption::new(0.06, 0.10));
        assert!(model.validate().is_ok());
    }
}

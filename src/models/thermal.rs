//! # Thermal モジュール
//!
//! 消費電力・対気速度・高度・環境条件から、機体表面の温度差 ΔT と
//! 赤外線（IR）／視覚の被探知スコア（0〜100）を算出します。
//!
//! ## 算出モデル
//!
//! 1. 廃熱 `Q = P·(1 − η)`、表皮温度 `T_s = T_a + Q·R_th`（熱抵抗モデル）
//! 2. 対流寄与 `c_conv · V · A · (T_s − T_a)`
//! 3. 放射寄与 `ε·(T_s⁴ − T_a⁴) / (4·T_a³)`（線形化放射コンダクタンスで温度換算）
//! 4. `ΔT = (対流 + 放射) × シグネチャ係数`、0未満は0
//! 5. IRスコア: `100·ΔT / ir_saturation_k` を [0, 100] で打ち切り（単調・有界）
//! 6. 視覚スコア: 断面積項 × 速度項 × 高度項（高度に対して単調減少）
//! 7. リスク区分: `max(IR, 視覚)` を閾値で Low / Moderate / High / Critical に分割

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::models::common::math_utils::clamp_finite;
use crate::models::platform::Platform;

/// 摂氏→ケルビン
const KELVIN_OFFSET: f64 = 273.15;

/// リスク区分
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// リスク区分の閾値（スコアがこの値以上でその区分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub moderate: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            moderate: 25.0,
            high: 50.0,
            critical: 75.0,
        }
    }
}

impl RiskThresholds {
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// 被探知スコアの曲線パラメータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectabilityConfig {
    /// IRスコアが100に達するΔT [K]
    pub ir_saturation_k: f64,
    /// 視覚スコアの断面積基準値 [m²]
    pub visual_reference_area_m2: f64,
    /// 視覚スコアの速度基準値 [m/s]
    pub visual_reference_speed_mps: f64,
    /// 視覚スコアが半減する高度 [m]
    pub visual_reference_altitude_m: f64,
    pub thresholds: RiskThresholds,
}

impl Default for DetectabilityConfig {
    fn default() -> Self {
        Self {
            ir_saturation_k: 30.0,
            visual_reference_area_m2: 1.0,
            visual_reference_speed_mps: 20.0,
            visual_reference_altitude_m: 300.0,
            thresholds: RiskThresholds::default(),
        }
    }
}

impl DetectabilityConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("ir_saturation_k", self.ir_saturation_k),
            ("visual_reference_area_m2", self.visual_reference_area_m2),
            ("visual_reference_speed_mps", self.visual_reference_speed_mps),
            ("visual_reference_altitude_m", self.visual_reference_altitude_m),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SimError::invalid(format!("detectability.{} must be positive", name)));
            }
        }

        let t = &self.thresholds;
        if !(0.0 < t.moderate && t.moderate < t.high && t.high < t.critical && t.critical <= 100.0) {
            return Err(SimError::invalid(format!(
                "risk thresholds must satisfy 0 < moderate < high < critical <= 100 (got {}, {}, {})",
                t.moderate, t.high, t.critical
            )));
        }
        Ok(())
    }
}

/// 熱・視覚評価の入力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalInput {
    pub power_w: f64,
    pub airspeed_mps: f64,
    pub altitude_m: f64,
    pub ambient_c: f64,
    /// ステルス・地形マスキングによるシグネチャ係数 (0, 1]
    pub signature_modifier: f64,
}

/// 1ティック分の被探知評価
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detectability {
    pub delta_t_k: f64,
    pub skin_temp_k: f64,
    pub ir_score: f64,
    pub visual_score: f64,
    pub risk: RiskLevel,
}

impl Detectability {
    pub fn peak_score(&self) -> f64 {
        self.ir_score.max(self.visual_score)
    }
}

/// 熱・被探知モデル
pub struct ThermalModel;

impl ThermalModel {
    pub fn assess(platform: &Platform, input: &ThermalInput, config: &DetectabilityConfig) -> Detectability {
        let sig = &platform.signature;
        let modifier = clamp_finite(input.signature_modifier, 0.0, 1.0);
        let airspeed = clamp_finite(input.airspeed_mps, 0.0, f64::MAX);
        let altitude = clamp_finite(input.altitude_m, 0.0, f64::MAX);
        let ambient_k = clamp_finite(input.ambient_c + KELVIN_OFFSET, 1.0, f64::MAX);

        let waste_heat = clamp_finite(input.power_w, 0.0, f64::MAX) * (1.0 - sig.conversion_efficiency);
        let skin_rise = waste_heat * sig.thermal_resistance_k_per_w;
        let skin_temp_k = ambient_k + skin_rise;

        let convective = sig.convective_coefficient * airspeed * sig.surface_area_m2 * skin_rise;
        let radiative = sig.emissivity * (skin_temp_k.powi(4) - ambient_k.powi(4)) / (4.0 * ambient_k.powi(3));

        let delta_t_k = clamp_finite((convective + radiative) * modifier, 0.0, f64::MAX);
        let ir_score = Self::ir_score(delta_t_k, config);
        let visual_score = Self::visual_score(platform.cross_section_m2(), airspeed, altitude, modifier, config);
        let risk = config.thresholds.classify(ir_score.max(visual_score));

        Detectability {
            delta_t_k,
            skin_temp_k,
            ir_score,
            visual_score,
            risk,
        }
    }

    /// ΔTに対して単調増加、100で飽和
    pub fn ir_score(delta_t_k: f64, config: &DetectabilityConfig) -> f64 {
        clamp_finite(100.0 * delta_t_k / config.ir_saturation_k, 0.0, 100.0)
    }

    /// 断面積・速度に対して増加、高度に対して減少
    pub fn visual_score(
        cross_section_m2: f64,
        airspeed_mps: f64,
        altitude_m: f64,
        modifier: f64,
        config: &DetectabilityConfig,
    ) -> f64 {
        let area = cross_section_m2.max(0.0);
        let size_term = area / (area + config.visual_reference_area_m2);
        let speed_term =
            0.5 + 0.5 * airspeed_mps / (airspeed_mps + config.visual_reference_speed_mps);
        let altitude_term = 1.0 / (1.0 + altitude_m / config.visual_reference_altitude_m);
        clamp_finite(100.0 * size_term * speed_term * altitude_term * modifier, 0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::platform::test_platforms::{fixed_wing, quad};

    fn input(power_w: f64, airspeed: f64, altitude: f64) -> ThermalInput {
        ThermalInput {
            power_w,
            airspeed_mps: airspeed,
            altitude_m: altitude,
            ambient_c: 15.0,
            signature_modifier: 1.0,
        }
    }

    #[test]
    fn test_scores_bounded() {
        let config = DetectabilityConfig::default();
        for platform in [fixed_wing(), quad()] {
            for power in [0.0, 10.0, 500.0, 1e6, 1e12] {
                for speed in [0.0, 5.0, 100.0] {
                    for altitude in [0.0, 50.0, 10_000.0] {
                        let d = ThermalModel::assess(&platform, &input(power, speed, altitude), &config);
                        assert!((0.0..=100.0).contains(&d.ir_score));
                        assert!((0.0..=100.0).contains(&d.visual_score));
                        assert!(d.delta_t_k >= 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_ir_score_monotonic_in_power() {
        let config = DetectabilityConfig::default();
        let platform = fixed_wing();
        let mut previous = -1.0;
        for power in (0..40).map(|i| i as f64 * 25.0) {
            let d = ThermalModel::assess(&platform, &input(power, 15.0, 100.0), &config);
            assert!(d.ir_score >= previous);
            previous = d.ir_score;
        }
        assert_eq!(ThermalModel::ir_score(1_000.0, &config), 100.0);
    }

    #[test]
    fn test_unbounded_contrast_saturates_ir_score() {
        let config = DetectabilityConfig::default();
        assert_eq!(ThermalModel::ir_score(f64::INFINITY, &config), 100.0);
        assert_eq!(ThermalModel::ir_score(f64::NAN, &config), 0.0);

        let d = ThermalModel::assess(&fixed_wing(), &input(f64::INFINITY, 15.0, 100.0), &config);
        assert_eq!(d.ir_score, 100.0);
        assert_eq!(d.risk, RiskLevel::Critical);
    }

    #[test]
    fn test_visual_score_decreases_with_altitude() {
        let config = DetectabilityConfig::default();
        let platform = quad();
        let low = ThermalModel::assess(&platform, &input(100.0, 10.0, 30.0), &config);
        let high = ThermalModel::assess(&platform, &input(100.0, 10.0, 3_000.0), &config);
        assert!(high.visual_score < low.visual_score);
    }

    #[test]
    fn test_zero_power_has_no_thermal_contrast() {
        let config = DetectabilityConfig::default();
        let d = ThermalModel::assess(&fixed_wing(), &input(0.0, 15.0, 100.0), &config);
        assert_eq!(d.delta_t_k, 0.0);
        assert_eq!(d.ir_score, 0.0);
    }

    #[test]
    fn test_signature_modifier_reduces_scores() {
        let config = DetectabilityConfig::default();
        let platform = fixed_wing();
        let open = ThermalModel::assess(&platform, &input(300.0, 18.0, 100.0), &config);
        let mut masked_input = input(300.0, 18.0, 100.0);
        masked_input.signature_modifier = 0.5;
        let masked = ThermalModel::assess(&platform, &masked_input, &config);
        assert!(masked.ir_score < open.ir_score);
        assert!((masked.visual_score - open.visual_score * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_risk_partition() {
        let t = RiskThresholds::default();
        assert_eq!(t.classify(0.0), RiskLevel::Low);
        assert_eq!(t.classify(24.9), RiskLevel::Low);
        assert_eq!(t.classify(25.0), RiskLevel::Moderate);
        assert_eq!(t.classify(50.0), RiskLevel::High);
        assert_eq!(t.classify(99.0), RiskLevel::Critical);
    }

    #[test]
    fn test_threshold_validation() {
        let mut config = DetectabilityConfig::default();
        assert!(config.validate().is_ok());
        config.thresholds.high = 10.0;
        assert!(config.validate().is_err());
        config = DetectabilityConfig::default();
        config.thresholds.critical = 120.0;
        assert!(config.validate().is_err());
    }
}

//! # Atmosphere モジュール
//!
//! 国際標準大気（ISA）近似による大気密度モデルを提供します。
//!
//! 対流圏（0〜11km、気温減率 -6.5K/km）と成層圏下部（11〜20km、等温）の
//! 2層のみをモデル化します。範囲外の高度は例外とせず、最後の有効な層に
//! クランプします。

use crate::models::common::GRAVITY_MPS2;

/// 海面気温 [K]
pub const SEA_LEVEL_TEMPERATURE_K: f64 = 288.15;
/// 海面気圧 [Pa]
pub const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;
/// 海面密度 [kg/m³]
pub const SEA_LEVEL_DENSITY: f64 = 1.225;
/// 乾燥空気の気体定数 [J/(kg·K)]
pub const GAS_CONSTANT_AIR: f64 = 287.052_87;
/// 対流圏の気温減率 [K/m]
pub const TROPOSPHERE_LAPSE_RATE: f64 = 0.0065;
/// 対流圏界面高度 [m]
pub const TROPOPAUSE_ALTITUDE_M: f64 = 11_000.0;
/// モデル上限高度 [m]
pub const MAX_MODEL_ALTITUDE_M: f64 = 20_000.0;

/// ISA大気モデル
#[derive(Debug, Clone, Copy, Default)]
pub struct AtmosphereModel;

impl AtmosphereModel {
    /// モデル適用範囲へ高度をクランプ（負値・非有限値は0m扱い）
    pub fn clamp_altitude(altitude_m: f64) -> f64 {
        if !altitude_m.is_finite() || altitude_m < 0.0 {
            return 0.0;
        }
        altitude_m.min(MAX_MODEL_ALTITUDE_M)
    }

    /// 高度における気温 [K]
    pub fn temperature_at(altitude_m: f64) -> f64 {
        let h = Self::clamp_altitude(altitude_m);
        if h <= TROPOPAUSE_ALTITUDE_M {
            SEA_LEVEL_TEMPERATURE_K - TROPOSPHERE_LAPSE_RATE * h
        } else {
            SEA_LEVEL_TEMPERATURE_K - TROPOSPHERE_LAPSE_RATE * TROPOPAUSE_ALTITUDE_M
        }
    }

    /// 高度における気圧 [Pa]
    pub fn pressure_at(altitude_m: f64) -> f64 {
        let h = Self::clamp_altitude(altitude_m);
        let exponent = GRAVITY_MPS2 / (TROPOSPHERE_LAPSE_RATE * GAS_CONSTANT_AIR);

        if h <= TROPOPAUSE_ALTITUDE_M {
            let t = Self::temperature_at(h);
            SEA_LEVEL_PRESSURE_PA * (t / SEA_LEVEL_TEMPERATURE_K).powf(exponent)
        } else {
            // 圏界面の気圧から等温層の指数減衰
            let t_tropopause = Self::temperature_at(TROPOPAUSE_ALTITUDE_M);
            let p_tropopause =
                SEA_LEVEL_PRESSURE_PA * (t_tropopause / SEA_LEVEL_TEMPERATURE_K).powf(exponent);
            let scale = GRAVITY_MPS2 / (GAS_CONSTANT_AIR * t_tropopause);
            p_tropopause * (-scale * (h - TROPOPAUSE_ALTITUDE_M)).exp()
        }
    }

    /// 高度における大気密度 [kg/m³]
    ///
    /// 理想気体の状態方程式 ρ = p / (R·T) による。常に正の値を返します。
    pub fn density_at(altitude_m: f64) -> f64 {
        let h = Self::clamp_altitude(altitude_m);
        Self::pressure_at(h) / (GAS_CONSTANT_AIR * Self::temperature_at(h))
    }

    /// 海面密度に対する密度比 σ
    pub fn density_ratio(altitude_m: f64) -> f64 {
        Self::density_at(altitude_m) / Self::density_at(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sea_level_density() {
        let rho = AtmosphereModel::density_at(0.0);
        assert!((rho - SEA_LEVEL_DENSITY).abs() < 1e-3);
        assert!((AtmosphereModel::density_ratio(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_density_positive_and_non_increasing() {
        let mut previous = f64::INFINITY;
        let mut h = 0.0;
        while h <= 30_000.0 {
            let rho = AtmosphereModel::density_at(h);
            assert!(rho > 0.0, "高度{}mで密度が正でない", h);
            assert!(rho <= previous, "高度{}mで密度が増加した", h);
            previous = rho;
            h += 250.0;
        }
    }

    #[test]
    fn test_known_values() {
        // ISA表: 5000m ≈ 0.7364, 11000m ≈ 0.3639
        assert!((AtmosphereModel::density_at(5_000.0) - 0.7364).abs() < 2e-3);
        assert!((AtmosphereModel::density_at(11_000.0) - 0.3639).abs() < 2e-3);
        assert!((AtmosphereModel::temperature_at(15_000.0) - 216.65).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_altitudes_are_clamped() {
        assert_eq!(
            AtmosphereModel::density_at(50_000.0),
            AtmosphereModel::density_at(MAX_MODEL_ALTITUDE_M)
        );
        assert_eq!(AtmosphereModel::density_at(-100.0), AtmosphereModel::density_at(0.0));
        assert_eq!(AtmosphereModel::density_at(f64::NAN), AtmosphereModel::density_at(0.0));
    }
}

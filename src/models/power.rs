//! # Power モジュール
//!
//! 対気速度・重量・高度・機体種別から推進系の瞬時消費電力 [W] を計算します。
//!
//! - **固定翼**: ドラッグポーラー（有害抗力＋誘導抗力）× 対気速度 / 推進効率、風速に比例した抗力増加
//! - **回転翼**: ホバー誘導電力（密度の-1/2乗に比例）＋ 有害抗力 ＋ 突風ペナルティ
//!
//! いずれも純粋関数で、副作用はありません。

use crate::error::{Result, SimError};
use crate::models::atmosphere::AtmosphereModel;
use crate::models::platform::{Airframe, FixedWingParams, Platform, RotorcraftParams};

/// 降下時に回収できる位置エネルギーの割合
pub const DESCENT_RECOVERY_FRACTION: f64 = 0.2;
/// 降下中でも維持される水平飛行電力の下限割合
pub const MIN_DRAW_FRACTION: f64 = 0.1;
/// 固定翼の風速1km/hあたりの電力増加率
pub const FIXED_WING_WIND_DRAG_PER_KMH: f64 = 0.01;

const MPS_TO_KMH: f64 = 3.6;

/// 電力計算の入力
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerInput {
    pub airspeed_mps: f64,
    pub altitude_m: f64,
    /// 突風強度 [m/s]
    pub gust_mps: f64,
    /// 地形追従／ステルス抗力倍率（1.0以上）
    pub drag_multiplier: f64,
    /// 上昇率 [m/s]（負値は降下）
    pub climb_rate_mps: f64,
}

impl PowerInput {
    /// 無風・水平飛行の入力
    pub fn level(airspeed_mps: f64, altitude_m: f64) -> Self {
        Self {
            airspeed_mps,
            altitude_m,
            gust_mps: 0.0,
            drag_multiplier: 1.0,
            climb_rate_mps: 0.0,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.airspeed_mps.is_finite() && self.airspeed_mps > 0.0) {
            return Err(SimError::invalid(format!(
                "airspeed must be positive, got {}",
                self.airspeed_mps
            )));
        }
        if !(self.gust_mps.is_finite() && self.gust_mps >= 0.0) {
            return Err(SimError::invalid(format!(
                "gust magnitude must be non-negative, got {}",
                self.gust_mps
            )));
        }
        if !(self.drag_multiplier.is_finite() && self.drag_multiplier >= 1.0) {
            return Err(SimError::invalid(format!(
                "drag multiplier must be >= 1.0, got {}",
                self.drag_multiplier
            )));
        }
        if !self.climb_rate_mps.is_finite() {
            return Err(SimError::invalid("climb rate must be finite"));
        }
        Ok(())
    }
}

/// 推進電力モデル
pub struct PowerModel;

impl PowerModel {
    /// 瞬時消費電力 [W]
    ///
    /// # 引数
    ///
    /// * `platform` - 機体パラメータ
    /// * `input` - 対気速度・高度・突風・抗力倍率・上昇率
    ///
    /// # 戻り値
    ///
    /// 有効な入力に対しては常に正の値。対気速度が0以下の場合は
    /// 前提条件違反として `SimError::InvalidInput`
    pub fn draw(platform: &Platform, input: &PowerInput) -> Result<f64> {
        input.validate()?;

        let density = AtmosphereModel::density_at(input.altitude_m);
        let weight = platform.weight_n();

        let base = match platform.fixed_draw_w {
            Some(draw) => draw,
            None => match &platform.airframe {
                Airframe::FixedWing(params) => {
                    Self::fixed_wing_power(params, weight, input.airspeed_mps, density)
                }
                Airframe::Rotorcraft(params) => {
                    Self::rotorcraft_power(params, weight, input.airspeed_mps, density)
                }
            },
        };

        let level = Self::apply_wind(platform, base, input.gust_mps)
            * platform.payload_penalty()
            * input.drag_multiplier;
        let climb = Self::climb_power(platform, input.climb_rate_mps);

        Ok((level + climb).max(level * MIN_DRAW_FRACTION))
    }

    /// 固定翼のドラッグポーラーによる所要電力
    pub fn fixed_wing_power(params: &FixedWingParams, weight_n: f64, airspeed: f64, density: f64) -> f64 {
        let q = 0.5 * density * airspeed.powi(2);
        let cl = weight_n / (q * params.wing_area_m2);
        let k = 1.0 / (std::f64::consts::PI * params.oswald_efficiency * params.aspect_ratio);
        let cd = params.cd0 + k * cl.powi(2);
        let drag = q * params.wing_area_m2 * cd;
        drag * airspeed / params.propulsive_efficiency
    }

    /// 回転翼の所要電力（ホバー誘導電力＋有害抗力）
    pub fn rotorcraft_power(params: &RotorcraftParams, weight_n: f64, airspeed: f64, density: f64) -> f64 {
        let induced = weight_n.powf(1.5)
            / (params.figure_of_merit * (2.0 * density * params.rotor_disc_area_m2).sqrt());
        let parasite = 0.5 * density * airspeed.powi(3) * params.flat_plate_area_m2;
        induced + parasite
    }

    /// 風の影響を加えた水平飛行電力
    ///
    /// 回転翼は姿勢保持の加算ペナルティ（風速の2乗）、固定翼は
    /// 風速に比例した倍率で増加します。
    pub fn apply_wind(platform: &Platform, base_w: f64, gust_mps: f64) -> f64 {
        match &platform.airframe {
            Airframe::Rotorcraft(params) => base_w + params.gust_coefficient_w_per_mps2 * gust_mps.powi(2),
            Airframe::FixedWing(_) => base_w * (1.0 + FIXED_WING_WIND_DRAG_PER_KMH * gust_mps * MPS_TO_KMH),
        }
    }

    /// 上昇・降下に伴う位置エネルギー変化分の電力
    pub fn climb_power(platform: &Platform, climb_rate_mps: f64) -> f64 {
        let potential = platform.weight_n() * climb_rate_mps;
        if potential >= 0.0 {
            potential
        } else {
            potential * DESCENT_RECOVERY_FRACTION
        }
    }

    /// 固定翼の最小抗力速度 [m/s]（回転翼ではNone）
    pub fn min_drag_speed(platform: &Platform, altitude_m: f64) -> Option<f64> {
        match &platform.airframe {
            Airframe::FixedWing(params) => {
                let density = AtmosphereModel::density_at(altitude_m);
                let k = 1.0 / (std::f64::consts::PI * params.oswald_efficiency * params.aspect_ratio);
                let v = (2.0 * platform.weight_n() / (density * params.wing_area_m2)).sqrt()
                    * (k / params.cd0).powf(0.25);
                Some(v)
            }
            Airframe::Rotorcraft(_) => None,
        }
    }
}

//! # Platform モジュール
//!
//! 機体諸元（固定翼／回転翼）を表すデータ型を提供します。
//!
//! 機体種別はタグ付き列挙型 [`Airframe`] で表現し、電力モデルでは
//! `match` による網羅的な分岐を行います。未知の機体種別はシナリオ読み込み時の
//! デシリアライズで失敗するため、暗黙に無視されることはありません。

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::models::common::GRAVITY_MPS2;

/// 固定翼機の空力パラメータ（ドラッグポーラー）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedWingParams {
    pub wing_area_m2: f64,
    pub aspect_ratio: f64,
    /// 零揚力抗力係数 C_D0
    #[serde(default = "default_cd0")]
    pub cd0: f64,
    /// オズワルド効率 e
    #[serde(default = "default_oswald")]
    pub oswald_efficiency: f64,
    /// プロペラ推進効率 η
    #[serde(default = "default_propulsive_efficiency")]
    pub propulsive_efficiency: f64,
}

/// 回転翼機の誘導電力パラメータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotorcraftParams {
    /// ロータ円盤面積の合計 [m²]
    pub rotor_disc_area_m2: f64,
    /// フィギュア・オブ・メリット（ホバー効率）
    #[serde(default = "default_figure_of_merit")]
    pub figure_of_merit: f64,
    /// 等価平板面積 [m²]（前進飛行の有害抗力）
    #[serde(default = "default_flat_plate_area")]
    pub flat_plate_area_m2: f64,
    /// 突風ペナルティ係数 [W/(m/s)²]
    #[serde(default = "default_gust_coefficient")]
    pub gust_coefficient_w_per_mps2: f64,
}

/// 機体種別
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum Airframe {
    FixedWing(FixedWingParams),
    Rotorcraft(RotorcraftParams),
}

impl Airframe {
    pub fn class_name(&self) -> &'static str {
        match self {
            Airframe::FixedWing(_) => "fixed_wing",
            Airframe::Rotorcraft(_) => "rotorcraft",
        }
    }

    /// 被視認断面積の代理値（翼面積またはロータ円盤面積）
    pub fn reference_area_m2(&self) -> f64 {
        match self {
            Airframe::FixedWing(p) => p.wing_area_m2,
            Airframe::Rotorcraft(p) => p.rotor_disc_area_m2,
        }
    }
}

/// 熱・視覚シグネチャのパラメータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureParams {
    /// 放熱表面積 [m²]
    pub surface_area_m2: f64,
    /// 表面放射率 ε
    pub emissivity: f64,
    /// 推進系の変換効率（残りが廃熱になる）
    pub conversion_efficiency: f64,
    /// 熱抵抗 [K/W]
    pub thermal_resistance_k_per_w: f64,
    /// 対流寄与の比例係数
    pub convective_coefficient: f64,
    /// ステルス進入時のシグネチャ低減率（1.0で低減なし）
    pub stealth_signature_factor: f64,
    /// 視認断面積の上書き値 [m²]（未指定時は翼面積／円盤面積）
    pub cross_section_m2: Option<f64>,
}

impl Default for SignatureParams {
    fn default() -> Self {
        Self {
            surface_area_m2: 0.5,
            emissivity: 0.9,
            conversion_efficiency: 0.8,
            thermal_resistance_k_per_w: 0.05,
            convective_coefficient: 0.002,
            stealth_signature_factor: 0.6,
            cross_section_m2: None,
        }
    }
}

/// 機体諸元
///
/// シナリオ内で不変。複数UAVから読み取り専用で共有されます。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    /// 機体質量（バッテリ・燃料込み、ペイロード除く）[kg]
    pub mass_kg: f64,
    #[serde(default)]
    pub payload_kg: f64,
    #[serde(default)]
    pub max_payload_kg: Option<f64>,
    pub cruise_speed_mps: f64,
    pub max_speed_mps: f64,
    #[serde(default = "default_max_altitude")]
    pub max_altitude_m: f64,
    /// 帰投判断の残量閾値（割合）
    #[serde(default = "default_reserve_fraction")]
    pub reserve_fraction: f64,
    /// ステルス進入時の抗力倍率（地形追従・迂回の代理）
    #[serde(default = "default_stealth_drag")]
    pub stealth_drag_multiplier: f64,
    /// カタログ値の消費電力 [W]（指定時は空力モデルの代わりに使用）
    #[serde(default)]
    pub fixed_draw_w: Option<f64>,
    #[serde(default)]
    pub signature: SignatureParams,
    pub airframe: Airframe,
}

fn default_cd0() -> f64 {
    0.03
}
fn default_oswald() -> f64 {
    0.8
}
fn default_propulsive_efficiency() -> f64 {
    0.7
}
fn default_figure_of_merit() -> f64 {
    0.7
}
fn default_flat_plate_area() -> f64 {
    0.05
}
fn default_gust_coefficient() -> f64 {
    0.5
}
fn default_max_altitude() -> f64 {
    5_000.0
}
fn default_reserve_fraction() -> f64 {
    0.2
}
fn default_stealth_drag() -> f64 {
    1.15
}

impl Platform {
    /// 総質量（機体＋ペイロード）[kg]
    pub fn total_mass_kg(&self) -> f64 {
        self.mass_kg + self.payload_kg
    }

    /// 重量 [N]
    pub fn weight_n(&self) -> f64 {
        self.total_mass_kg() * GRAVITY_MPS2
    }

    pub fn cross_section_m2(&self) -> f64 {
        self.signature
            .cross_section_m2
            .unwrap_or_else(|| self.airframe.reference_area_m2())
    }

    /// ペイロード搭載率（最大ペイロード未設定なら0）
    pub fn load_ratio(&self) -> f64 {
        match self.max_payload_kg {
            Some(max) if max > 0.0 => self.payload_kg / max,
            _ => 0.0,
        }
    }

    /// 搭載率に応じた効率ペナルティ倍率
    ///
    /// 最大ペイロード超過は `validate` で拒否されるため、搭載率は1以下です。
    pub fn payload_penalty(&self) -> f64 {
        let ratio = self.load_ratio();
        if ratio < 0.7 {
            1.0
        } else if ratio < 0.9 {
            1.1
        } else {
            1.25
        }
    }

    /// 速度を機体の最大速度で制限
    pub fn clamp_speed(&self, speed_mps: f64) -> f64 {
        speed_mps.min(self.max_speed_mps)
    }

    /// 諸元の検証
    pub fn validate(&self) -> Result<()> {
        let name = &self.name;
        if !(self.mass_kg.is_finite() && self.mass_kg > 0.0) {
            return Err(SimError::invalid(format!("{}: mass_kg must be positive", name)));
        }
        if !(self.payload_kg.is_finite() && self.payload_kg >= 0.0) {
            return Err(SimError::invalid(format!("{}: payload_kg must be non-negative", name)));
        }
        if let Some(max) = self.max_payload_kg {
            if !(max.is_finite() && max >= 0.0) {
                return Err(SimError::invalid(format!(
                    "{}: max_payload_kg must be non-negative",
                    name
                )));
            }
            if self.payload_kg > max {
                return Err(SimError::invalid(format!(
                    "{}: payload {} kg exceeds max payload {} kg, cannot take off",
                    name, self.payload_kg, max
                )));
            }
        }
        if !(self.cruise_speed_mps.is_finite() && self.cruise_speed_mps > 0.0) {
            return Err(SimError::invalid(format!("{}: cruise_speed_mps must be positive", name)));
        }
        if !(self.max_speed_mps.is_finite() && self.max_speed_mps >= self.cruise_speed_mps) {
            return Err(SimError::invalid(format!(
                "{}: max_speed_mps must be >= cruise_speed_mps",
                name
            )));
        }
        if !(self.max_altitude_m.is_finite() && self.max_altitude_m > 0.0) {
            return Err(SimError::invalid(format!("{}: max_altitude_m must be positive", name)));
        }
        if !(0.0..1.0).contains(&self.reserve_fraction) {
            return Err(SimError::invalid(format!(
                "{}: reserve_fraction must be in [0, 1)",
                name
            )));
        }
        if !(self.stealth_drag_multiplier.is_finite() && self.stealth_drag_multiplier >= 1.0) {
            return Err(SimError::invalid(format!(
                "{}: stealth_drag_multiplier must be >= 1.0",
                name
            )));
        }
        if let Some(draw) = self.fixed_draw_w {
            if !(draw.is_finite() && draw > 0.0) {
                return Err(SimError::invalid(format!("{}: fixed_draw_w must be positive", name)));
            }
        }

        match &self.airframe {
            Airframe::FixedWing(p) => {
                let positive = [p.wing_area_m2, p.aspect_ratio, p.cd0, p.oswald_efficiency];
                if positive.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
                    return Err(SimError::invalid(format!(
                        "{}: fixed-wing drag polar parameters must be positive",
                        name
                    )));
                }
                if !(p.propulsive_efficiency > 0.0 && p.propulsive_efficiency <= 1.0) {
                    return Err(SimError::invalid(format!(
                        "{}: propulsive_efficiency must be in (0, 1]",
                        name
                    )));
                }
            }
            Airframe::Rotorcraft(p) => {
                if !(p.rotor_disc_area_m2.is_finite() && p.rotor_disc_area_m2 > 0.0) {
                    return Err(SimError::invalid(format!(
                        "{}: rotor_disc_area_m2 must be positive",
                        name
                    )));
                }
                if !(p.figure_of_merit > 0.0 && p.figure_of_merit <= 1.0) {
                    return Err(SimError::invalid(format!(
                        "{}: figure_of_merit must be in (0, 1]",
                        name
                    )));
                }
                if !(p.flat_plate_area_m2 >= 0.0 && p.gust_coefficient_w_per_mps2 >= 0.0) {
                    return Err(SimError::invalid(format!(
                        "{}: rotorcraft drag and gust coefficients must be non-negative",
                        name
                    )));
                }
            }
        }

        let sig = &self.signature;
        if !(sig.surface_area_m2 > 0.0 && sig.thermal_resistance_k_per_w >= 0.0) {
            return Err(SimError::invalid(format!(
                "{}: signature surface area must be positive",
                name
            )));
        }
        if !(sig.emissivity > 0.0 && sig.emissivity <= 1.0) {
            return Err(SimError::invalid(format!("{}: emissivity must be in (0, 1]", name)));
        }
        if !(0.0..=1.0).contains(&sig.conversion_efficiency) {
            return Err(SimError::invalid(format!(
                "{}: conversion_efficiency must be in [0, 1]",
                name
            )));
        }
        if !(sig.stealth_signature_factor > 0.0 && sig.stealth_signature_factor <= 1.0) {
            return Err(SimError::invalid(format!(
                "{}: stealth_signature_factor must be in (0, 1]",
                name
            )));
        }
        if !(sig.convective_coefficient >= 0.0) {
            return Err(SimError::invalid(format!(
                "{}: convective_coefficient must be non-negative",
                name
            )));
        }
        if let Some(cs) = sig.cross_section_m2 {
            if !(cs.is_finite() && cs > 0.0) {
                return Err(SimError::invalid(format!("{}: cross_section_m2 must be positive", name)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_platforms {
    use super::*;

    /// テスト用の小型固定翼機
    pub fn fixed_wing() -> Platform {
        Platform {
            name: "test-fixed-wing".to_string(),
            mass_kg: 6.0,
            payload_kg: 0.0,
            max_payload_kg: Some(1.0),
            cruise_speed_mps: 18.0,
            max_speed_mps: 30.0,
            max_altitude_m: 4_000.0,
            reserve_fraction: 0.2,
            stealth_drag_multiplier: 1.2,
            fixed_draw_w: None,
            signature: SignatureParams::default(),
            airframe: Airframe::FixedWing(FixedWingParams {
                wing_area_m2: 0.8,
                aspect_ratio: 10.0,
                cd0: 0.03,
                oswald_efficiency: 0.8,
                propulsive_efficiency: 0.7,
            }),
        }
    }

    /// テスト用のクアッドコプター
    pub fn quad() -> Platform {
        Platform {
            name: "test-quad".to_string(),
            mass_kg: 1.4,
            payload_kg: 0.2,
            max_payload_kg: Some(0.5),
            cruise_speed_mps: 10.0,
            max_speed_mps: 16.0,
            max_altitude_m: 500.0,
            reserve_fraction: 0.25,
            stealth_drag_multiplier: 1.1,
            fixed_draw_w: None,
            signature: SignatureParams::default(),
            airframe: Airframe::Rotorcraft(RotorcraftParams {
                rotor_disc_area_m2: 0.2,
                figure_of_merit: 0.65,
                flat_plate_area_m2: 0.03,
                gust_coefficient_w_per_mps2: 0.8,
            }),
        }
    }
}

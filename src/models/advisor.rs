//! # Advisor モジュール
//!
//! スウォーム各機の状態遷移を決める決定的ステートマシンを提供します。
//!
//! ## 遷移規則（優先順、最初に一致したものを採用）
//!
//! 1. エネルギー枯渇 → 終端（Depleted）
//! 2. 経路終端に到達 → 終端（MissionComplete）
//! 3. 残量割合 ≤ 予備閾値 かつ 帰投中でない → 帰投（Rtb）
//! 4. 脅威圏内 かつ Active → ステルス進入（StealthIngress）
//!    脅威圏外 かつ StealthIngress → Active に復帰
//! 5. それ以外は現状維持
//!
//! 外部アドバイザリ（[`crate::advisory`]）は説明文のみを付与でき、
//! ここで決まった遷移を覆すことはできません。

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::models::common::{GeoPosition, UavStatus};
use crate::models::mission::distance_and_heading;
use crate::models::traits::IAdvisor;

/// 脅威圏（中心＋半径）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatZone {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub radius_m: f64,
    #[serde(default = "default_risk_weight")]
    pub risk_weight: f64,
}

fn default_risk_weight() -> f64 {
    1.0
}

impl ThreatZone {
    pub fn center(&self) -> GeoPosition {
        GeoPosition::new(self.lat, self.lon, 0.0)
    }

    /// 水平距離で圏内判定（高度は考慮しない）
    pub fn contains(&self, position: &GeoPosition) -> bool {
        distance_and_heading(&self.center(), position).0 <= self.radius_m
    }

    pub fn validate(&self) -> Result<()> {
        if !self.center().is_valid() {
            return Err(SimError::invalid(format!("threat zone {}: center out of range", self.id)));
        }
        if !(self.radius_m.is_finite() && self.radius_m > 0.0) {
            return Err(SimError::invalid(format!("threat zone {}: radius_m must be positive", self.id)));
        }
        if !(self.risk_weight.is_finite() && self.risk_weight >= 0.0) {
            return Err(SimError::invalid(format!(
                "threat zone {}: risk_weight must be non-negative",
                self.id
            )));
        }
        Ok(())
    }
}

/// 指定位置を含む脅威圏の一覧（入力順）
pub fn zones_containing<'a>(position: &GeoPosition, zones: &'a [ThreatZone]) -> Vec<&'a ThreatZone> {
    zones.iter().filter(|zone| zone.contains(position)).collect()
}

/// 終端の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Depleted,
    MissionComplete,
}

/// アドバイザーの指示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// 現状維持
    Hold,
    Terminate(Terminal),
    /// 発進地点への直行経路に切り替え
    ReturnToBase,
    EnterStealth,
    ExitStealth,
}

impl Directive {
    /// 指示適用後の状態
    pub fn next_status(&self, current: UavStatus) -> UavStatus {
        match self {
            Directive::Hold => current,
            Directive::Terminate(Terminal::Depleted) => UavStatus::Depleted,
            Directive::Terminate(Terminal::MissionComplete) => UavStatus::MissionComplete,
            Directive::ReturnToBase => UavStatus::Rtb,
            Directive::EnterStealth => UavStatus::StealthIngress,
            Directive::ExitStealth => UavStatus::Active,
        }
    }
}

/// 判定に必要な1機分の状態
#[derive(Debug, Clone, Copy)]
pub struct AdvisorContext {
    pub status: UavStatus,
    pub energy_depleted: bool,
    pub mission_complete: bool,
    pub fraction_remaining: f64,
    pub reserve_fraction: f64,
    pub inside_threat_zone: bool,
}

/// 決定的ヒューリスティックによるスウォームアドバイザー
#[derive(Debug, Clone, Copy, Default)]
pub struct SwarmAdvisor;

impl IAdvisor for SwarmAdvisor {
    fn evaluate(&self, ctx: &AdvisorContext) -> Directive {
        // 終端状態からは遷移しない
        if ctx.status.is_terminal() {
            return Directive::Hold;
        }
        if ctx.energy_depleted {
            return Directive::Terminate(Terminal::Depleted);
        }
        if ctx.mission_complete {
            return Directive::Terminate(Terminal::MissionComplete);
        }
        if ctx.fraction_remaining <= ctx.reserve_fraction && ctx.status != UavStatus::Rtb {
            return Directive::ReturnToBase;
        }
        match (ctx.status, ctx.inside_threat_zone) {
            (UavStatus::Active, true) => Directive::EnterStealth,
            (UavStatus::StealthIngress, false) => Directive::ExitStealth,
            _ => Directive::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(status: UavStatus) -> AdvisorContext {
        AdvisorContext {
            status,
            energy_depleted: false,
            mission_complete: false,
            fraction_remaining: 0.8,
            reserve_fraction: 0.2,
            inside_threat_zone: false,
        }
    }

    #[test]
    fn test_depleted_beats_reserve_low() {
        let mut c = ctx(UavStatus::Active);
        c.energy_depleted = true;
        c.fraction_remaining = 0.0;
        c.mission_complete = true;
        c.inside_threat_zone = true;
        assert_eq!(SwarmAdvisor.evaluate(&c), Directive::Terminate(Terminal::Depleted));
    }

    #[test]
    fn test_mission_complete_beats_reserve() {
        let mut c = ctx(UavStatus::Rtb);
        c.mission_complete = true;
        c.fraction_remaining = 0.1;
        assert_eq!(SwarmAdvisor.evaluate(&c), Directive::Terminate(Terminal::MissionComplete));
    }

    #[test]
    fn test_reserve_triggers_rtb_once() {
        let mut c = ctx(UavStatus::StealthIngress);
        c.fraction_remaining = 0.2;
        c.inside_threat_zone = true;
        assert_eq!(SwarmAdvisor.evaluate(&c), Directive::ReturnToBase);

        c.status = UavStatus::Rtb;
        assert_eq!(SwarmAdvisor.evaluate(&c), Directive::Hold);
    }

    #[test]
    fn test_stealth_toggle() {
        let mut c = ctx(UavStatus::Active);
        c.inside_threat_zone = true;
        assert_eq!(SwarmAdvisor.evaluate(&c), Directive::EnterStealth);

        c.status = UavStatus::StealthIngress;
        assert_eq!(SwarmAdvisor.evaluate(&c), Directive::Hold);

        c.inside_threat_zone = false;
        assert_eq!(SwarmAdvisor.evaluate(&c), Directive::ExitStealth);

        // 帰投中は圏内でもステルスに入らない
        let mut rtb = ctx(UavStatus::Rtb);
        rtb.inside_threat_zone = true;
        assert_eq!(SwarmAdvisor.evaluate(&rtb), Directive::Hold);
    }

    #[test]
    fn test_terminal_is_sticky() {
        let mut c = ctx(UavStatus::Depleted);
        c.fraction_remaining = 0.0;
        assert_eq!(SwarmAdvisor.evaluate(&c), Directive::Hold);
        assert_eq!(Directive::Hold.next_status(UavStatus::Depleted), UavStatus::Depleted);
    }

    #[test]
    fn test_threat_zone_contains() {
        let zone = ThreatZone {
            id: "SAM-1".to_string(),
            lat: 0.0,
            lon: 0.0,
            radius_m: 1_000.0,
            risk_weight: 2.0,
        };
        assert!(zone.contains(&GeoPosition::new(0.005, 0.0, 300.0)));
        assert!(!zone.contains(&GeoPosition::new(0.01, 0.0, 300.0)));
        let zones = vec![zone];
        assert_eq!(zones_containing(&GeoPosition::new(0.0, 0.0, 0.0), &zones).len(), 1);
    }
}

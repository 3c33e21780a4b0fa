//! # UAV エージェント
//!
//! 1機分の状態（エネルギー・経路再生・状態遷移・ピーク値）を保持し、
//! 1ティックごとに以下の順序で更新します。
//!
//! 1. 経路上を前進（位置・上昇率）
//! 2. 消費電力の計算
//! 3. エネルギー積分
//! 4. 熱・被探知評価、脅威圏滞在の集計
//! 5. アドバイザーによる状態遷移
//! 6. 時系列レコードの生成

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, SimError};
use crate::models::advisor::{AdvisorContext, Directive, ThreatZone, zones_containing};
use crate::models::common::{GeoPosition, UavStatus};
use crate::models::energy::EnergyState;
use crate::models::mission::{MissionPath, Playback};
use crate::models::platform::Platform;
use crate::models::power::{PowerInput, PowerModel};
use crate::models::thermal::{Detectability, DetectabilityConfig, ThermalInput, ThermalModel};
use crate::models::traits::{IAdvisor, IAgent};
use crate::timeline::{Outcome, TimelineRecord, UavSummary};

/// 全機共通のティック環境
#[derive(Debug, Clone, Copy)]
pub struct TickEnvironment<'a> {
    pub tick: u64,
    /// ティック終了時刻 [s]
    pub time_s: f64,
    pub dt_s: f64,
    pub ambient_c: f64,
    pub gust_mps: f64,
    pub zones: &'a [ThreatZone],
    pub detectability: &'a DetectabilityConfig,
}

/// 状態遷移の記録
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: UavStatus,
    pub to: UavStatus,
    /// 遷移時点で滞在していた脅威圏ID
    pub zones: Vec<String>,
}

/// 1ティック分の結果
#[derive(Debug, Clone)]
pub struct UavTickReport {
    pub record: TimelineRecord,
    pub detectability: Detectability,
    pub transition: Option<Transition>,
    /// このティックで初めて予備残量を下回ったか
    pub reserve_crossed_now: bool,
    /// 実際に供給された平均電力 [W]
    ///
    /// `record.power_w` は要求電力のまま記録します。枯渇ティックでは
    /// 残量が不足するため、こちらが要求電力を下回ります。
    pub delivered_power_w: f64,
}

/// UAV エージェント
#[derive(Debug, Clone)]
pub struct Uav {
    pub id: String,
    pub platform: Arc<Platform>,
    pub energy: EnergyState,
    playback: Playback,
    pub launch: GeoPosition,
    pub status: UavStatus,
    pub rtb_engaged: bool,
    pub speed_mps: f64,

    // 集計値
    pub odometer_m: f64,
    pub elapsed_s: f64,
    pub peak_ir_score: f64,
    pub peak_visual_score: f64,
    pub threat_exposure: f64,
    pub rtb_time_s: Option<f64>,
    pub terminal_time_s: Option<f64>,
    pub initial_endurance_s: Option<f64>,
    reserve_crossed: bool,
}

impl Uav {
    pub fn new(
        id: String,
        platform: Arc<Platform>,
        energy: EnergyState,
        path: MissionPath,
        speed_mps: f64,
    ) -> Result<Self> {
        if !(speed_mps.is_finite() && speed_mps > 0.0) {
            return Err(SimError::invalid(format!(
                "uav {}: speed must be positive, got {}",
                id, speed_mps
            )));
        }

        let launch = path.start();
        let cruise_draw = PowerModel::draw(&platform, &PowerInput::level(speed_mps, launch.alt_m))?;
        let initial_endurance_s = Some(energy.endurance_at(cruise_draw)).filter(|s| s.is_finite());

        if let Some(v_md) = PowerModel::min_drag_speed(&platform, launch.alt_m) {
            if speed_mps < v_md {
                warn!(
                    uav_id = %id,
                    speed_mps,
                    min_drag_speed_mps = v_md,
                    "UAV_SLOW_CRUISE: 巡航速度が最小抗力速度を下回っています"
                );
            }
        }

        Ok(Self {
            id,
            platform,
            energy,
            playback: Playback::new(path),
            launch,
            status: UavStatus::Active,
            rtb_engaged: false,
            speed_mps,
            odometer_m: 0.0,
            elapsed_s: 0.0,
            peak_ir_score: 0.0,
            peak_visual_score: 0.0,
            threat_exposure: 0.0,
            rtb_time_s: None,
            terminal_time_s: None,
            initial_endurance_s,
            reserve_crossed: false,
        })
    }

    pub fn position(&self) -> GeoPosition {
        self.playback.position()
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    /// ステルス進入中の抗力倍率とシグネチャ係数
    fn stealth_factors(&self) -> (f64, f64) {
        if self.status == UavStatus::StealthIngress {
            (
                self.platform.stealth_drag_multiplier,
                self.platform.signature.stealth_signature_factor,
            )
        } else {
            (1.0, 1.0)
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self.status {
            UavStatus::Depleted => Outcome::Depleted,
            UavStatus::MissionComplete if !self.rtb_engaged => Outcome::MissionComplete,
            _ => Outcome::Aborted,
        }
    }

    pub fn summary(&self) -> UavSummary {
        UavSummary {
            uav_id: self.id.clone(),
            outcome: self.outcome(),
            total_distance_m: self.odometer_m,
            total_time_s: self.terminal_time_s.unwrap_or(self.elapsed_s),
            peak_ir_score: self.peak_ir_score,
            peak_visual_score: self.peak_visual_score,
            peak_detectability: self.peak_ir_score.max(self.peak_visual_score),
            final_energy_fraction: self.energy.fraction_remaining(),
            threat_exposure: self.threat_exposure,
            platform: self.platform.name.clone(),
            energy_kind: self.energy.kind().to_string(),
            rtb_time_s: self.rtb_time_s,
            estimated_endurance_s: self.initial_endurance_s,
        }
    }

    fn apply_directive(&mut self, directive: Directive, time_s: f64) {
        let next = directive.next_status(self.status);
        match directive {
            Directive::ReturnToBase => {
                let here = self.playback.position();
                self.playback.retarget(MissionPath::direct(here, self.launch));
                self.rtb_engaged = true;
                self.rtb_time_s = Some(time_s);
                info!(
                    uav_id = %self.id,
                    time_s,
                    energy_fraction = self.energy.fraction_remaining(),
                    reserve_fraction = self.platform.reserve_fraction,
                    latitude = here.lat_deg,
                    longitude = here.lon_deg,
                    distance_to_base_m = self.playback.path().total_length_m(),
                    "UAV_RTB: 予備残量に到達したため帰投を開始しました"
                );
            }
            Directive::Terminate(_) if next == UavStatus::Depleted => {
                self.terminal_time_s = Some(time_s);
                warn!(
                    uav_id = %self.id,
                    time_s,
                    total_distance_m = self.odometer_m,
                    rtb_engaged = self.rtb_engaged,
                    "UAV_DEPLETED: エネルギーが枯渇しました"
                );
            }
            Directive::Terminate(_) => {
                self.terminal_time_s = Some(time_s);
                info!(
                    uav_id = %self.id,
                    time_s,
                    total_distance_m = self.odometer_m,
                    energy_fraction = self.energy.fraction_remaining(),
                    rtb_engaged = self.rtb_engaged,
                    "UAV_MISSION_COMPLETE: 経路終端に到達しました"
                );
            }
            Directive::EnterStealth => {
                info!(uav_id = %self.id, time_s, "UAV_STEALTH_INGRESS: 脅威圏に進入、低被探知飛行に移行");
            }
            Directive::ExitStealth => {
                info!(uav_id = %self.id, time_s, "UAV_STEALTH_EXIT: 脅威圏を離脱、通常飛行に復帰");
            }
            Directive::Hold => {}
        }
        self.status = next;
    }
}

impl IAgent for Uav {
    fn tick(&mut self, env: &TickEnvironment, advisor: &dyn IAdvisor) -> Result<Option<UavTickReport>> {
        if self.status.is_terminal() {
            debug!(uav_id = %self.id, status = self.status.as_str(), "終端状態のためティックをスキップ");
            return Ok(None);
        }

        // 1. 前進
        let previous_alt = self.playback.position().alt_m;
        let step = self.playback.advance(env.dt_s, self.speed_mps);
        let position = self.playback.position();
        let climb_rate = if env.dt_s > 0.0 {
            (position.alt_m - previous_alt) / env.dt_s
        } else {
            0.0
        };
        if let Some(index) = step.reached_waypoint {
            debug!(uav_id = %self.id, waypoint = index, time_s = env.time_s, "ウェイポイント到達");
        }

        // 2. 消費電力
        let (drag_multiplier, signature_modifier) = self.stealth_factors();
        let power_w = PowerModel::draw(
            &self.platform,
            &PowerInput {
                airspeed_mps: self.speed_mps,
                altitude_m: position.alt_m,
                gust_mps: env.gust_mps,
                drag_multiplier,
                climb_rate_mps: climb_rate,
            },
        )?;

        // 3. エネルギー積分
        let energy_tick = self.energy.tick(power_w, env.dt_s);
        let fraction = self.energy.fraction_remaining();
        let delivered_power_w = if env.dt_s > 0.0 {
            energy_tick.supplied_j / env.dt_s
        } else {
            power_w
        };
        if energy_tick.depleted_now {
            debug!(
                uav_id = %self.id,
                demand_w = power_w,
                delivered_w = delivered_power_w,
                "最終ティックの供給不足"
            );
        }

        // 4. 被探知評価と脅威圏
        let detectability = ThermalModel::assess(
            &self.platform,
            &ThermalInput {
                power_w,
                airspeed_mps: self.speed_mps,
                altitude_m: position.alt_m,
                ambient_c: env.ambient_c,
                signature_modifier,
            },
            env.detectability,
        );
        let zones = zones_containing(&position, env.zones);
        self.threat_exposure += zones.iter().map(|z| z.risk_weight).sum::<f64>() * env.dt_s;

        self.odometer_m += step.moved_m;
        self.elapsed_s = env.time_s;
        self.peak_ir_score = self.peak_ir_score.max(detectability.ir_score);
        self.peak_visual_score = self.peak_visual_score.max(detectability.visual_score);

        let reserve_crossed_now = !self.reserve_crossed && self.energy.below_reserve(self.platform.reserve_fraction);
        self.reserve_crossed |= reserve_crossed_now;

        // 5. 状態遷移
        let directive = advisor.evaluate(&AdvisorContext {
            status: self.status,
            energy_depleted: self.energy.is_depleted(),
            mission_complete: self.playback.is_complete(),
            fraction_remaining: fraction,
            reserve_fraction: self.platform.reserve_fraction,
            inside_threat_zone: !zones.is_empty(),
        });
        let from = self.status;
        self.apply_directive(directive, env.time_s);
        let transition = (from != self.status).then(|| Transition {
            from,
            to: self.status,
            zones: zones.iter().map(|z| z.id.clone()).collect(),
        });

        // 6. 記録
        let record = TimelineRecord {
            time_s: env.time_s,
            uav_id: self.id.clone(),
            latitude: position.lat_deg,
            longitude: position.lon_deg,
            power_w,
            energy_remaining_fraction: fraction,
            ir_score: detectability.ir_score,
            visual_score: detectability.visual_score,
            risk: detectability.risk,
            status: self.status,
        };

        Ok(Some(UavTickReport {
            record,
            detectability,
            transition,
            reserve_crossed_now,
            delivered_power_w,
        }))
    }

    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::advisor::SwarmAdvisor;
    use crate::models::mission::Waypoint;
    use crate::models::platform::test_platforms::{fixed_wing, quad};

    fn straight_path(length_m: f64) -> MissionPath {
        let lat = crate::models::common::math_utils::rad_to_deg(length_m / crate::models::common::EARTH_RADIUS_M);
        MissionPath::from_waypoints(
            &[
                Waypoint { lat: 0.0, lon: 0.0, alt_m: None },
                Waypoint { lat, lon: 0.0, alt_m: None },
            ],
            100.0,
        )
        .unwrap()
    }

    fn env<'a>(tick: u64, dt: f64, zones: &'a [ThreatZone], config: &'a DetectabilityConfig) -> TickEnvironment<'a> {
        TickEnvironment {
            tick,
            time_s: tick as f64 * dt,
            dt_s: dt,
            ambient_c: 20.0,
            gust_mps: 0.0,
            zones,
            detectability: config,
        }
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        let result = Uav::new(
            "U1".into(),
            Arc::new(quad()),
            EnergyState::battery(100.0).unwrap(),
            straight_path(1_000.0),
            0.0,
        );
        assert!(matches!(result, Err(SimError::InvalidInput(_))));
    }

    #[test]
    fn test_tick_drains_energy_and_moves() {
        let config = DetectabilityConfig::default();
        let mut uav = Uav::new(
            "U1".into(),
            Arc::new(fixed_wing()),
            EnergyState::battery(500.0).unwrap(),
            straight_path(5_000.0),
            18.0,
        )
        .unwrap();

        let report = uav.tick(&env(1, 1.0, &[], &config), &SwarmAdvisor).unwrap().unwrap();
        assert!(report.record.power_w > 0.0);
        assert!(report.record.energy_remaining_fraction < 1.0);
        assert!((uav.odometer_m - 18.0).abs() < 1e-6);
        assert_eq!(report.record.status, UavStatus::Active);
        assert!(report.transition.is_none());
    }

    #[test]
    fn test_terminal_uav_tick_is_noop() {
        let config = DetectabilityConfig::default();
        let mut uav = Uav::new(
            "U1".into(),
            Arc::new(quad()),
            EnergyState::battery(100.0).unwrap(),
            straight_path(5.0),
            10.0,
        )
        .unwrap();
        let report = uav.tick(&env(1, 1.0, &[], &config), &SwarmAdvisor).unwrap().unwrap();
        assert_eq!(report.record.status, UavStatus::MissionComplete);
        assert!(!uav.is_active());
        assert_eq!(uav.outcome(), Outcome::MissionComplete);

        let before = uav.clone();
        let again = uav.tick(&env(2, 1.0, &[], &config), &SwarmAdvisor).unwrap();
        assert!(again.is_none());
        assert_eq!(uav.status, UavStatus::MissionComplete);
        assert_eq!(uav.odometer_m, before.odometer_m);
        assert_eq!(uav.elapsed_s, before.elapsed_s);
        assert_eq!(uav.energy, before.energy);
        assert_eq!(uav.terminal_time_s, before.terminal_time_s);
    }

    #[test]
    fn test_depletion_tick_reports_delivered_power() {
        let config = DetectabilityConfig::default();
        let mut platform = fixed_wing();
        platform.fixed_draw_w = Some(100.0);
        // 0.01Wh = 36J しか残っていない
        let mut uav = Uav::new(
            "U1".into(),
            Arc::new(platform),
            EnergyState::battery(0.01).unwrap(),
            straight_path(5_000.0),
            18.0,
        )
        .unwrap();

        let report = uav.tick(&env(1, 1.0, &[], &config), &SwarmAdvisor).unwrap().unwrap();
        assert_eq!(report.record.status, UavStatus::Depleted);
        assert!(report.record.power_w >= 100.0);
        assert!((report.delivered_power_w - 36.0).abs() < 1e-6);
        assert_eq!(report.record.energy_remaining_fraction, 0.0);
        assert_eq!(uav.outcome(), Outcome::Depleted);
    }

    #[test]
    fn test_stealth_raises_draw_on_following_tick() {
        let config = DetectabilityConfig::default();
        let zones = vec![ThreatZone {
            id: "Z1".into(),
            lat: 0.0,
            lon: 0.0,
            radius_m: 50_000.0,
            risk_weight: 1.5,
        }];
        let mut uav = Uav::new(
            "U1".into(),
            Arc::new(fixed_wing()),
            EnergyState::battery(500.0).unwrap(),
            straight_path(10_000.0),
            18.0,
        )
        .unwrap();

        let first = uav.tick(&env(1, 1.0, &zones, &config), &SwarmAdvisor).unwrap().unwrap();
        assert_eq!(first.record.status, UavStatus::StealthIngress);
        assert_eq!(first.transition.as_ref().map(|t| t.zones.clone()), Some(vec!["Z1".to_string()]));

        let second = uav.tick(&env(2, 1.0, &zones, &config), &SwarmAdvisor).unwrap().unwrap();
        assert!(second.record.power_w > first.record.power_w * 1.1);
        assert!((uav.threat_exposure - 3.0).abs() < 1e-9);
    }
}

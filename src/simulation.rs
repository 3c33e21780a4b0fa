//! # Simulation モジュール
//!
//! UAVスウォームの時間駆動シミュレーションエンジンを提供します。
//!
//! 固定時間刻み（Δt）でクロックを進め、各ティックでシナリオの入力順に全UAVを更新します。
//! グローバルな可変状態は持たず、全ての状態は [`SimulationHandle`] が所有します。
//!
//! ## ティック処理
//!
//! 1. クロックを1ティック進める
//! 2. 終端状態でない各UAVを複製上で更新（前進 → 電力 → エネルギー → 被探知 → 状態遷移）
//! 3. 全機の更新が成功した場合のみ状態を反映（失敗時はティック前の状態のまま）
//! 4. 状態遷移にアドバイザリ注記を付与
//! 5. 停止条件（全機終端・最大時間・予備残量到達）を判定
//!
//! ## 使用例
//!
//! ```no_run
//! use uavsim::scenario::ScenarioConfig;
//! use uavsim::simulation::SimulationHandle;
//!
//! let config = ScenarioConfig::from_file("scenarios/swarm_recon.yaml")?;
//! let mut handle = SimulationHandle::construct(config)?;
//! let log = handle.run_to_completion()?;
//! println!("records: {}", log.len());
//! println!("{:?}", handle.summary().stop_reason);
//! # Ok::<(), uavsim::error::SimError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::advisory::{AdvisoryBackend, AdvisoryClient, AdvisoryContext, CommandBackend};
use crate::error::Result;
use crate::models::advisor::SwarmAdvisor;
use crate::models::mission::MissionPath;
use crate::models::traits::IAgent;
use crate::models::uav::{TickEnvironment, Transition, Uav, UavTickReport};
use crate::scenario::{AdvisorBackendConfig, ScenarioConfig};
use crate::timeline::{StopReason, SummaryReport, TimelineLog, TimelineRecord};

/// 固定刻みのシミュレーションクロック
///
/// 時刻は `tick × dt` で求め、加算誤差を蓄積させません。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    dt_s: f64,
    max_time_s: f64,
    tick: u64,
}

impl SimulationClock {
    pub fn new(dt_s: f64, max_time_s: f64) -> Self {
        Self {
            dt_s,
            max_time_s,
            tick: 0,
        }
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time_s(&self) -> f64 {
        self.tick as f64 * self.dt_s
    }

    /// 最大時間に到達するまでのティック数
    pub fn max_ticks(&self) -> u64 {
        ((self.max_time_s / self.dt_s) - 1e-9).ceil().max(0.0) as u64
    }

    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn expired(&self) -> bool {
        self.tick >= self.max_ticks()
    }

    pub fn progress(&self) -> f64 {
        (self.time_s() / self.max_time_s).min(1.0)
    }
}

/// 停止条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub halt_on_reserve: bool,
}

impl TerminationPolicy {
    /// ティック終了時点の停止判定（全機終端を最優先）
    pub fn evaluate(&self, clock: &SimulationClock, all_terminal: bool, reserve_crossed: bool) -> Option<StopReason> {
        if all_terminal {
            Some(StopReason::AllTerminal)
        } else if self.halt_on_reserve && reserve_crossed {
            Some(StopReason::ReserveReached)
        } else if clock.expired() {
            Some(StopReason::TimeLimit)
        } else {
            None
        }
    }
}

/// UAVごとの静的な補助情報（注記用）
#[derive(Debug, Clone)]
struct UavProfile {
    elevation_gain_m: f64,
    battery_capacity_wh: Option<f64>,
}

/// シミュレーションの全状態を所有するハンドル
#[derive(Debug)]
pub struct SimulationHandle {
    scenario: ScenarioConfig,
    clock: SimulationClock,
    policy: TerminationPolicy,
    uavs: Vec<Uav>,
    profiles: Vec<UavProfile>,
    advisor: SwarmAdvisor,
    advisory: AdvisoryClient,
    log: TimelineLog,
    stop_reason: Option<StopReason>,
    verbose_level: u8,
}

impl SimulationHandle {
    /// シナリオを検証し、全UAVを構築する
    ///
    /// 検証エラーはここで全て報告され、実行中には発生しません。
    ///
    /// # 引数
    ///
    /// * `scenario` - 読み込み済みのシナリオ設定
    ///
    /// # 戻り値
    ///
    /// 時刻0のハンドル。不正な入力の場合は `SimError::InvalidInput`
    pub fn construct(scenario: ScenarioConfig) -> Result<Self> {
        scenario.validate()?;

        let mut uavs = Vec::with_capacity(scenario.uavs.len());
        let mut profiles = Vec::with_capacity(scenario.uavs.len());
        for uav_config in &scenario.uavs {
            let resolved = scenario.resolve_uav(uav_config)?;
            let path = MissionPath::from_waypoints(&uav_config.waypoints, resolved.altitude_m)?;
            let energy = resolved.energy.build(scenario.environment.temperature_c)?;

            profiles.push(UavProfile {
                elevation_gain_m: elevation_gain(&path),
                battery_capacity_wh: resolved.energy.battery_capacity_wh(),
            });

            let uav = Uav::new(uav_config.id.clone(), resolved.platform, energy, path, resolved.speed_mps)?;
            debug!(
                uav_id = %uav.id,
                platform = %uav.platform.name,
                energy = uav.energy.kind(),
                speed_mps = uav.speed_mps,
                path_length_m = uav.playback().path().total_length_m(),
                estimated_endurance_s = ?uav.initial_endurance_s,
                "UAV初期化"
            );
            uavs.push(uav);
        }

        let advisory = match &scenario.advisor.backend {
            AdvisorBackendConfig::Heuristic => AdvisoryClient::heuristic(),
            AdvisorBackendConfig::Command { program, args } => AdvisoryClient::with_backend(
                Arc::new(CommandBackend::new(program.clone(), args.clone())),
                Duration::from_millis(scenario.advisor.timeout_ms),
            )?,
        };

        info!(
            scenario = %scenario.meta.name,
            uavs = uavs.len(),
            threat_zones = scenario.threat_zones.len(),
            advisory_backend = advisory.backend_name(),
            "シミュレーションを初期化しました"
        );

        Ok(Self {
            clock: SimulationClock::new(scenario.sim.dt_s, scenario.sim.t_max_s),
            policy: TerminationPolicy {
                halt_on_reserve: scenario.sim.halt_on_reserve,
            },
            uavs,
            profiles,
            advisor: SwarmAdvisor,
            advisory,
            log: TimelineLog::default(),
            stop_reason: None,
            verbose_level: 0,
            scenario,
        })
    }

    /// 外部アドバイザリバックエンドを差し替える
    pub fn with_advisory_backend(mut self, backend: Arc<dyn AdvisoryBackend>, timeout: Duration) -> Result<Self> {
        self.advisory = AdvisoryClient::with_backend(backend, timeout)?;
        Ok(self)
    }

    pub fn with_verbose(mut self, verbose_level: u8) -> Self {
        self.verbose_level = verbose_level;
        self
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn uavs(&self) -> &[Uav] {
        &self.uavs
    }

    pub fn log(&self) -> &TimelineLog {
        &self.log
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn is_finished(&self) -> bool {
        self.stop_reason.is_some()
    }

    /// 1ティック進める
    ///
    /// 稼働中の全機を同じ時刻で更新し、停止条件を評価します。
    /// 終端状態の機体はスキップされます。
    ///
    /// # 戻り値
    ///
    /// このティックで追加されたレコード（UAV宣言順）。停止済みなら空
    ///
    /// # エラー
    ///
    /// いずれかの機体の更新が失敗した場合は `SimError` を返します。
    /// このときクロックとUAV状態とログはいずれも変更されません。
    pub fn step(&mut self) -> Result<Vec<TimelineRecord>> {
        if self.is_finished() {
            return Ok(Vec::new());
        }

        let tick = self.clock.tick() + 1;
        let env = TickEnvironment {
            tick,
            time_s: tick as f64 * self.clock.dt_s(),
            dt_s: self.clock.dt_s(),
            ambient_c: self.scenario.environment.temperature_c,
            gust_mps: self.scenario.environment.gust_mps,
            zones: &self.scenario.threat_zones,
            detectability: &self.scenario.detectability,
        };

        // 複製上で全機を更新し、全て成功した場合のみ反映する
        let mut staged: Vec<(usize, Uav, UavTickReport)> = Vec::new();
        for (index, uav) in self.uavs.iter().enumerate() {
            if !uav.is_active() {
                continue;
            }
            let mut next = uav.clone();
            if let Some(report) = next.tick(&env, &self.advisor)? {
                staged.push((index, next, report));
            }
        }

        self.clock.advance();
        let time_s = self.clock.time_s();
        let mut records = Vec::with_capacity(staged.len());
        let mut reserve_crossed = false;

        for (index, next, report) in staged {
            self.uavs[index] = next;
            reserve_crossed |= report.reserve_crossed_now;
            if let Some(transition) = &report.transition {
                let note = self.advisory.annotate(&self.advisory_context(index, transition, time_s));
                self.log.advisories.push(note);
            }
            trace!(
                uav_id = %report.record.uav_id,
                time_s,
                power_w = report.record.power_w,
                delivered_w = report.delivered_power_w,
                energy_fraction = report.record.energy_remaining_fraction,
                delta_t_k = report.detectability.delta_t_k,
                risk = report.record.risk.as_str(),
                "ティック更新"
            );
            records.push(report.record);
        }
        self.log.records.extend(records.iter().cloned());

        let all_terminal = self.uavs.iter().all(|u| !u.is_active());
        self.stop_reason = self.policy.evaluate(&self.clock, all_terminal, reserve_crossed);

        if self.verbose_level > 0 && self.clock.tick() % self.scenario.sim.progress_interval == 0 {
            let active = self.uavs.iter().filter(|u| u.is_active()).count();
            info!(
                "進行状況: {:.1}% ({:.1}/{:.1}秒) 稼働中 {}/{}機",
                self.clock.progress() * 100.0,
                time_s,
                self.scenario.sim.t_max_s,
                active,
                self.uavs.len()
            );
        }

        Ok(records)
    }

    /// 停止条件を満たすまで実行
    pub fn run_to_completion(&mut self) -> Result<&TimelineLog> {
        info!("=== シミュレーション実行開始 ===");
        while !self.is_finished() {
            self.step()?;
        }
        self.log_completion();
        Ok(&self.log)
    }

    /// キャンセルフラグを各ティック境界で確認しながら実行
    pub fn run_until_cancelled(&mut self, cancel: &AtomicBool) -> Result<&TimelineLog> {
        info!("=== シミュレーション実行開始 ===");
        while !self.is_finished() {
            if cancel.load(Ordering::Relaxed) {
                self.stop_reason = Some(StopReason::Cancelled);
                info!(tick = self.clock.tick(), "シミュレーションがキャンセルされました");
                break;
            }
            self.step()?;
        }
        self.log_completion();
        Ok(&self.log)
    }

    fn log_completion(&self) {
        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", self.clock.time_s());
        info!("総ステップ数: {}", self.clock.tick());
        info!("停止理由: {:?}", self.stop_reason);
    }

    /// 現時点のサマリー
    pub fn summary(&self) -> SummaryReport {
        SummaryReport {
            scenario: self.scenario.meta.name.clone(),
            ticks: self.clock.tick(),
            simulated_time_s: self.clock.time_s(),
            stop_reason: self.stop_reason.unwrap_or(StopReason::Running),
            uavs: self.uavs.iter().map(Uav::summary).collect(),
            advisories: self.log.advisories.clone(),
        }
    }

    pub fn into_log(mut self) -> TimelineLog {
        std::mem::take(&mut self.log)
    }

    fn advisory_context(&self, index: usize, transition: &Transition, time_s: f64) -> AdvisoryContext {
        let uav = &self.uavs[index];
        let profile = &self.profiles[index];
        let position = uav.position();
        AdvisoryContext {
            uav_id: uav.id.clone(),
            time_s,
            from: transition.from,
            to: transition.to,
            energy_remaining_fraction: uav.energy.fraction_remaining(),
            reserve_fraction: uav.platform.reserve_fraction,
            latitude: position.lat_deg,
            longitude: position.lon_deg,
            altitude_m: position.alt_m,
            threat_zones: transition.zones.clone(),
            platform: uav.platform.name.clone(),
            load_ratio: uav.platform.load_ratio(),
            speed_mps: uav.speed_mps,
            max_speed_mps: uav.platform.max_speed_mps,
            gust_mps: self.scenario.environment.gust_mps,
            ambient_c: self.scenario.environment.temperature_c,
            energy_kind: uav.energy.kind().to_string(),
            battery_capacity_wh: profile.battery_capacity_wh,
            elevation_gain_m: profile.elevation_gain_m,
        }
    }
}

/// 経路の累積上昇量 [m]
fn elevation_gain(path: &MissionPath) -> f64 {
    (1..path.len())
        .filter_map(|i| Some(path.waypoint(i)?.alt_m - path.waypoint(i - 1)?.alt_m))
        .filter(|delta| *delta > 0.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_counts_ticks_exactly() {
        let mut clock = SimulationClock::new(0.1, 1.0);
        assert_eq!(clock.max_ticks(), 10);
        for _ in 0..9 {
            clock.advance();
            assert!(!clock.expired());
        }
        clock.advance();
        assert!(clock.expired());
        assert!((clock.time_s() - 1.0).abs() < 1e-12);

        assert_eq!(SimulationClock::new(60.0, 18_000.0).max_ticks(), 300);
        assert_eq!(SimulationClock::new(7.0, 20.0).max_ticks(), 3);
    }

    #[test]
    fn test_termination_priority() {
        let mut clock = SimulationClock::new(1.0, 1.0);
        clock.advance();
        let policy = TerminationPolicy { halt_on_reserve: true };
        assert_eq!(policy.evaluate(&clock, true, true), Some(StopReason::AllTerminal));
        assert_eq!(policy.evaluate(&clock, false, true), Some(StopReason::ReserveReached));
        assert_eq!(policy.evaluate(&clock, false, false), Some(StopReason::TimeLimit));

        let relaxed = TerminationPolicy { halt_on_reserve: false };
        let fresh = SimulationClock::new(1.0, 10.0);
        assert_eq!(relaxed.evaluate(&fresh, false, true), None);
    }
}

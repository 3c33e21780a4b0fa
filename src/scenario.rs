//! # Scenario モジュール
//!
//! YAML形式のシナリオファイルを読み込み、検証します。
//!
//! ```yaml
//! meta: { name: "...", version: "1.0", description: "..." }
//! sim: { dt_s: 1.0, t_max_s: 3600.0, halt_on_reserve: false }
//! environment: { temperature_c: 15.0, gust_mps: 0.0 }
//! detectability: { ir_saturation_k: 30.0, thresholds: { moderate: 25, high: 50, critical: 75 } }
//! advisor: { timeout_ms: 500, backend: { kind: heuristic } }
//! platforms: [ ... ]        # 機体諸元（name で参照）
//! uavs: [ ... ]             # platform または preset を指定
//! threat_zones: [ ... ]
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::advisory::DEFAULT_TIMEOUT_MS;
use crate::error::{Result, SimError};
use crate::models::advisor::ThreatZone;
use crate::models::catalog;
use crate::models::energy::EnergyState;
use crate::models::mission::{MissionPath, Waypoint};
use crate::models::platform::Platform;
use crate::models::thermal::DetectabilityConfig;

/// 高度未指定のウェイポイントに使う既定高度 [m]
pub const DEFAULT_CRUISE_ALTITUDE_M: f64 = 120.0;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    /// いずれかの機体が予備残量を下回った時点で停止
    #[serde(default)]
    pub halt_on_reserve: bool,
    /// 進行状況ログの間隔（ステップ数）
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_progress_interval() -> u64 {
    100
}

/// 環境条件（シナリオ全体で一定）
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    pub temperature_c: f64,
    pub gust_mps: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            temperature_c: 15.0,
            gust_mps: 0.0,
        }
    }
}

/// アドバイザリバックエンドの種類
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvisorBackendConfig {
    /// 組み込みのヒューリスティックのみ
    #[default]
    Heuristic,
    /// 外部コマンド（JSONを標準入力で受け取り説明文を標準出力に返す）
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub backend: AdvisorBackendConfig,
    pub timeout_ms: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            backend: AdvisorBackendConfig::default(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// ハイブリッド補助バッテリ
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HybridAssistConfig {
    /// バッテリ側が負担する電力の割合 [0, 1]
    pub fraction: f64,
    pub battery_wh: f64,
}

/// エネルギー源の設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EnergyConfig {
    Battery {
        capacity_wh: f64,
    },
    Fuel {
        capacity_kg: f64,
        bsfc_g_per_kwh: f64,
        #[serde(default)]
        hybrid_assist: Option<HybridAssistConfig>,
    },
}

impl EnergyConfig {
    /// 状態を構築し、気温補正を適用
    pub fn build(&self, ambient_c: f64) -> Result<EnergyState> {
        let mut state = match self {
            EnergyConfig::Battery { capacity_wh } => EnergyState::battery(*capacity_wh)?,
            EnergyConfig::Fuel {
                capacity_kg,
                bsfc_g_per_kwh,
                hybrid_assist: None,
            } => EnergyState::fuel(*capacity_kg, *bsfc_g_per_kwh)?,
            EnergyConfig::Fuel {
                capacity_kg,
                bsfc_g_per_kwh,
                hybrid_assist: Some(assist),
            } => EnergyState::hybrid(*capacity_kg, *bsfc_g_per_kwh, assist.fraction, assist.battery_wh)?,
        };
        state.derate_for_temperature(ambient_c);
        Ok(state)
    }

    /// バッテリ容量（補正前）
    pub fn battery_capacity_wh(&self) -> Option<f64> {
        match self {
            EnergyConfig::Battery { capacity_wh } => Some(*capacity_wh),
            EnergyConfig::Fuel { hybrid_assist, .. } => hybrid_assist.as_ref().map(|a| a.battery_wh),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            EnergyConfig::Battery { capacity_wh } => format!("バッテリ {:.0}Wh", capacity_wh),
            EnergyConfig::Fuel {
                capacity_kg,
                hybrid_assist: None,
                ..
            } => format!("燃料 {:.1}kg", capacity_kg),
            EnergyConfig::Fuel {
                capacity_kg,
                hybrid_assist: Some(assist),
                ..
            } => format!(
                "ハイブリッド 燃料 {:.1}kg + バッテリ {:.0}Wh ({:.0}%)",
                capacity_kg,
                assist.battery_wh,
                assist.fraction * 100.0
            ),
        }
    }
}

/// UAV設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UavConfig {
    pub id: String,
    /// `platforms` 内の name
    #[serde(default)]
    pub platform: Option<String>,
    /// 組み込みカタログのプリセット名
    #[serde(default)]
    pub preset: Option<String>,
    /// 未指定時はプリセットの既定値
    #[serde(default)]
    pub energy: Option<EnergyConfig>,
    /// 未指定時は機体の巡航速度
    #[serde(default)]
    pub speed_mps: Option<f64>,
    /// 高度未指定のウェイポイントに使う高度
    #[serde(default)]
    pub altitude_m: Option<f64>,
    /// ペイロードの上書き [kg]
    #[serde(default)]
    pub payload_kg: Option<f64>,
    pub waypoints: Vec<Waypoint>,
}

/// 解決済みのUAV設定
#[derive(Debug, Clone)]
pub struct ResolvedUav {
    pub platform: Arc<Platform>,
    pub energy: EnergyConfig,
    pub speed_mps: f64,
    pub altitude_m: f64,
}

/// シナリオ全体の設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub detectability: DetectabilityConfig,
    #[serde(default)]
    pub advisor: AdvisorConfig,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    pub uavs: Vec<UavConfig>,
    #[serde(default)]
    pub threat_zones: Vec<ThreatZone>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオを読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(SimError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        Self::parse(&content, path)
    }

    /// YAML文字列からシナリオを読み込み
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Self::parse(content, Path::new("<inline>"))
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: ScenarioConfig = serde_yaml::from_str(content).map_err(|e| SimError::Parse {
            path: PathBuf::from(path),
            source: e,
        })?;

        config.validate()?;

        Ok(config)
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<()> {
        if !(self.sim.dt_s.is_finite() && self.sim.dt_s > 0.0) {
            return Err(SimError::invalid("sim.dt_s must be positive"));
        }
        if !(self.sim.t_max_s.is_finite() && self.sim.t_max_s > 0.0) {
            return Err(SimError::invalid("sim.t_max_s must be positive"));
        }
        if self.sim.progress_interval == 0 {
            return Err(SimError::invalid("sim.progress_interval must be at least 1"));
        }
        if !self.environment.temperature_c.is_finite() {
            return Err(SimError::invalid("environment.temperature_c must be finite"));
        }
        if !(self.environment.gust_mps.is_finite() && self.environment.gust_mps >= 0.0) {
            return Err(SimError::invalid("environment.gust_mps must be non-negative"));
        }
        if self.advisor.timeout_ms == 0 {
            return Err(SimError::invalid("advisor.timeout_ms must be positive"));
        }
        self.detectability.validate()?;

        let mut names = HashSet::new();
        for platform in &self.platforms {
            if !names.insert(platform.name.as_str()) {
                return Err(SimError::invalid(format!("duplicate platform name: {}", platform.name)));
            }
            platform.validate()?;
        }

        let mut zone_ids = HashSet::new();
        for zone in &self.threat_zones {
            if !zone_ids.insert(zone.id.as_str()) {
                return Err(SimError::invalid(format!("duplicate threat zone id: {}", zone.id)));
            }
            zone.validate()?;
        }

        if self.uavs.is_empty() {
            return Err(SimError::invalid("scenario has no uavs"));
        }
        let mut uav_ids = HashSet::new();
        for uav in &self.uavs {
            if !uav_ids.insert(uav.id.as_str()) {
                return Err(SimError::invalid(format!("duplicate uav id: {}", uav.id)));
            }
            let resolved = self.resolve_uav(uav)?;
            resolved.energy.build(self.environment.temperature_c)?;
            MissionPath::from_waypoints(&uav.waypoints, resolved.altitude_m)
                .map_err(|e| SimError::invalid(format!("uav {}: {}", uav.id, e)))?;
        }

        Ok(())
    }

    /// 機体・エネルギー・速度・高度を解決
    ///
    /// 速度と高度は機体の上限で制限します。
    pub fn resolve_uav(&self, uav: &UavConfig) -> Result<ResolvedUav> {
        let (mut platform, default_energy) = match (&uav.platform, &uav.preset) {
            (Some(name), None) => {
                let platform = self
                    .platforms
                    .iter()
                    .find(|p| &p.name == name)
                    .ok_or_else(|| SimError::invalid(format!("uav {}: unknown platform '{}'", uav.id, name)))?;
                (platform.clone(), None)
            }
            (None, Some(key)) => {
                let preset = catalog::find(key)
                    .ok_or_else(|| SimError::invalid(format!("uav {}: unknown preset '{}'", uav.id, key)))?;
                (preset.platform, Some(preset.energy))
            }
            _ => {
                return Err(SimError::invalid(format!(
                    "uav {}: exactly one of platform or preset must be given",
                    uav.id
                )));
            }
        };

        // 上書き後に最大ペイロードを再検証
        if let Some(payload) = uav.payload_kg {
            platform.payload_kg = payload;
            platform
                .validate()
                .map_err(|e| SimError::invalid(format!("uav {}: {}", uav.id, e)))?;
        }

        let energy = uav
            .energy
            .clone()
            .or(default_energy)
            .ok_or_else(|| SimError::invalid(format!("uav {}: energy source is not specified", uav.id)))?;

        let speed_mps = uav.speed_mps.unwrap_or(platform.cruise_speed_mps);
        if !(speed_mps.is_finite() && speed_mps > 0.0) {
            return Err(SimError::invalid(format!("uav {}: speed_mps must be positive", uav.id)));
        }
        let speed_mps = platform.clamp_speed(speed_mps);

        let altitude_m = uav.altitude_m.unwrap_or(DEFAULT_CRUISE_ALTITUDE_M);
        if !(altitude_m.is_finite() && altitude_m >= 0.0) {
            return Err(SimError::invalid(format!("uav {}: altitude_m must be non-negative", uav.id)));
        }
        let altitude_m = altitude_m.min(platform.max_altitude_m);

        Ok(ResolvedUav {
            platform: Arc::new(platform),
            energy,
            speed_mps,
            altitude_m,
        })
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        if !self.meta.description.is_empty() {
            println!("説明: {}", self.meta.description);
        }
        if !self.meta.version.is_empty() {
            println!("バージョン: {}", self.meta.version);
        }
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒 ({:.1}分)", self.sim.t_max_s, self.sim.t_max_s / 60.0);
        println!("予備残量で停止: {}", if self.sim.halt_on_reserve { "有効" } else { "無効" });
        println!(
            "環境: 気温 {:.1}°C, 突風 {:.1}m/s",
            self.environment.temperature_c, self.environment.gust_mps
        );
        println!();

        println!("=== スウォーム構成 ===");
        println!("UAV: {}機", self.uavs.len());
        for uav in &self.uavs {
            match self.resolve_uav(uav) {
                Ok(resolved) => println!(
                    "  {}: {} ({}) {} / 速度 {:.1}m/s / 高度 {:.0}m / ウェイポイント {}点",
                    uav.id,
                    resolved.platform.name,
                    resolved.platform.airframe.class_name(),
                    resolved.energy.describe(),
                    resolved.speed_mps,
                    resolved.altitude_m,
                    uav.waypoints.len()
                ),
                Err(e) => println!("  {}: 設定エラー ({})", uav.id, e),
            }
        }
        println!();

        println!("=== 脅威圏 ===");
        println!("脅威圏数: {}", self.threat_zones.len());
        for zone in &self.threat_zones {
            println!(
                "  {}: 中心 ({:.4}, {:.4}) 半径 {:.0}m 重み {:.1}",
                zone.id, zone.lat, zone.lon, zone.radius_m, zone.risk_weight
            );
        }
    }
}

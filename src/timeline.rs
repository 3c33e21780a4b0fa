//! # Timeline モジュール
//!
//! シミュレーション結果のレコード型（時系列・サマリー）を定義します。
//! フィールドの並びは出力列の順序と一致させています。

use serde::{Deserialize, Serialize};

use crate::advisory::AdvisoryNote;
use crate::models::common::UavStatus;
use crate::models::thermal::RiskLevel;

/// 1機・1ティック分の記録
///
/// 列順: `time_s, uav_id, latitude, longitude, power_w,
/// energy_remaining_fraction, ir_score, visual_score, risk, status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRecord {
    pub time_s: f64,
    pub uav_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// 要求電力 [W]（枯渇ティックも要求値のまま）
    pub power_w: f64,
    pub energy_remaining_fraction: f64,
    pub ir_score: f64,
    pub visual_score: f64,
    pub risk: RiskLevel,
    pub status: UavStatus,
}

/// 時系列ログ（追記のみ）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineLog {
    pub records: Vec<TimelineRecord>,
    /// 遷移時の説明文。判定には影響しない
    #[serde(default)]
    pub advisories: Vec<AdvisoryNote>,
}

impl TimelineLog {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 指定UAVのレコードのみ（時刻順）
    pub fn for_uav<'a>(&'a self, uav_id: &'a str) -> impl Iterator<Item = &'a TimelineRecord> + 'a {
        self.records.iter().filter(move |r| r.uav_id == uav_id)
    }
}

/// 最終結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Depleted,
    MissionComplete,
    /// 帰投して終了、または時間切れで未終端
    Aborted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Depleted => "depleted",
            Outcome::MissionComplete => "mission_complete",
            Outcome::Aborted => "aborted",
        }
    }
}

/// シミュレーション停止理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// 全機が終端状態
    AllTerminal,
    /// 最大時間に到達
    TimeLimit,
    /// いずれかの機体が予備残量を下回った（halt_on_reserve）
    ReserveReached,
    /// 外部からのキャンセル
    Cancelled,
    /// まだ実行中
    Running,
}

/// 1機分のサマリー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UavSummary {
    pub uav_id: String,
    pub outcome: Outcome,
    pub total_distance_m: f64,
    pub total_time_s: f64,
    pub peak_ir_score: f64,
    pub peak_visual_score: f64,
    pub peak_detectability: f64,
    pub final_energy_fraction: f64,
    /// 脅威圏内滞在の重み付き時間 Σ(risk_weight·dt) [s]
    pub threat_exposure: f64,
    pub platform: String,
    pub energy_kind: String,
    /// 帰投開始時刻
    #[serde(default)]
    pub rtb_time_s: Option<f64>,
    /// 開始時点の推定航続時間 [s]
    #[serde(default)]
    pub estimated_endurance_s: Option<f64>,
}

/// シナリオ全体のサマリー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub scenario: String,
    pub ticks: u64,
    pub simulated_time_s: f64,
    pub stop_reason: StopReason,
    pub uavs: Vec<UavSummary>,
    #[serde(default)]
    pub advisories: Vec<AdvisoryNote>,
}

impl SummaryReport {
    pub fn uav(&self, uav_id: &str) -> Option<&UavSummary> {
        self.uavs.iter().find(|u| u.uav_id == uav_id)
    }
}

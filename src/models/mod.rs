// 基本的なデータ型と数学ユーティリティ
pub mod common;

// エージェントの基本インターフェース（trait）定義
pub mod traits;

// 物理モデル
pub mod atmosphere;
pub mod platform;
pub mod power;
pub mod energy;
pub mod thermal;
pub mod mission;

// 状態遷移とエージェント
pub mod advisor;
pub mod uav;

// 機体プリセット
pub mod catalog;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use atmosphere::AtmosphereModel;
pub use platform::{Airframe, FixedWingParams, Platform, RotorcraftParams, SignatureParams};
pub use power::{PowerInput, PowerModel};
pub use energy::{EnergyState, EnergyTick};
pub use thermal::{Detectability, DetectabilityConfig, RiskLevel, RiskThresholds, ThermalInput, ThermalModel};
pub use mission::{distance_and_heading, MissionPath, Playback, Waypoint};
pub use advisor::{AdvisorContext, Directive, SwarmAdvisor, Terminal, ThreatZone};
pub use uav::{TickEnvironment, Transition, Uav, UavTickReport};

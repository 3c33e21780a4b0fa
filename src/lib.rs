//! # uavsim
//!
//! UAVミッションの航続性と被探知リスクを時間駆動で評価するシミュレーションエンジンです。
//!
//! - 大気・空力モデルによる推進電力の計算
//! - バッテリ／燃料／ハイブリッドのエネルギー積分
//! - 熱・視覚シグネチャからの被探知スコア
//! - 複数機（スウォーム）の経路再生と帰投・ステルス進入の状態遷移
//!
//! 全ての状態は [`simulation::SimulationHandle`] が所有し、グローバルな可変状態はありません。

pub mod advisory;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod scenario;
pub mod simulation;
pub mod timeline;

pub use error::{Result, SimError};
pub use scenario::ScenarioConfig;
pub use simulation::SimulationHandle;
pub use timeline::{Outcome, SummaryReport, TimelineLog, TimelineRecord};

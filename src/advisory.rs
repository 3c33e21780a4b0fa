//! # Advisory モジュール
//!
//! 状態遷移に説明文（根拠・運用上の助言）を付与する外部バックエンドの境界です。
//!
//! 遷移そのものは [`crate::models::advisor::SwarmAdvisor`] が決定的に決めます。
//! バックエンドはテキストを返すだけで、シミュレーション状態には触れません。
//! 呼び出しは専用の tokio ランタイム上でタイムアウト付きで行い、失敗・タイムアウト時は
//! [`HeuristicRationale`] にフォールバックして `advisory backend unavailable` を記録します。

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use crate::error::{Result, SimError};
use crate::models::common::UavStatus;

/// フォールバック時に記録する注記
pub const UNAVAILABLE_NOTE: &str = "advisory backend unavailable";

/// 既定のタイムアウト [ms]
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// 強風とみなす突風強度 [m/s]（約20km/h）
const STRONG_GUST_MPS: f64 = 5.5;
/// 小容量とみなすバッテリ [Wh]
const SMALL_BATTERY_WH: f64 = 30.0;
/// 上昇量の多い経路 [m]
const LARGE_ELEVATION_GAIN_M: f64 = 300.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvisoryError {
    #[error("バックエンド利用不可: {0}")]
    Unavailable(String),
    #[error("バックエンド応答がタイムアウトしました ({0} ms)")]
    Timeout(u64),
}

/// バックエンドへ渡す読み取り専用のスナップショット
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryContext {
    pub uav_id: String,
    pub time_s: f64,
    pub from: UavStatus,
    pub to: UavStatus,
    pub energy_remaining_fraction: f64,
    pub reserve_fraction: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    /// 滞在中の脅威圏ID
    pub threat_zones: Vec<String>,
    pub platform: String,
    pub load_ratio: f64,
    pub speed_mps: f64,
    pub max_speed_mps: f64,
    pub gust_mps: f64,
    pub ambient_c: f64,
    pub energy_kind: String,
    pub battery_capacity_wh: Option<f64>,
    /// 元の経路の累積上昇量 [m]
    pub elevation_gain_m: f64,
}

/// 説明文を生成するバックエンド
#[async_trait]
pub trait AdvisoryBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn propose_rationale(&self, ctx: &AdvisoryContext) -> std::result::Result<String, AdvisoryError>;
}

/// 遷移1件分の注記（時系列レコードとは別管理）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryNote {
    pub time_s: f64,
    pub uav_id: String,
    pub from: UavStatus,
    pub to: UavStatus,
    /// 説明文の生成元（バックエンド名または "heuristic"）
    pub source: String,
    pub rationale: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// 決定的なルールベースの説明文
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicRationale;

impl HeuristicRationale {
    /// 遷移理由
    pub fn reason(ctx: &AdvisoryContext) -> String {
        let percent = ctx.energy_remaining_fraction * 100.0;
        match ctx.to {
            UavStatus::Rtb => format!(
                "残量 {:.1}% が予備閾値 {:.1}% 以下のため帰投",
                percent,
                ctx.reserve_fraction * 100.0
            ),
            UavStatus::StealthIngress => {
                format!("脅威圏 [{}] に進入したため低被探知飛行に移行", ctx.threat_zones.join(", "))
            }
            UavStatus::Active => "脅威圏を離脱したため通常飛行に復帰".to_string(),
            UavStatus::Depleted => "エネルギー枯渇により飛行継続不能".to_string(),
            UavStatus::MissionComplete if ctx.from == UavStatus::Rtb => {
                format!("帰投完了（残量 {:.1}%）", percent)
            }
            UavStatus::MissionComplete => format!("経路終端に到達（残量 {:.1}%）", percent),
        }
    }

    /// 運用上の助言
    pub fn tips(ctx: &AdvisoryContext) -> Vec<String> {
        let mut tips = Vec::new();
        if ctx.load_ratio > 0.9 {
            tips.push("最大ペイロード付近での運用は効率を大きく低下させます".to_string());
        } else if ctx.load_ratio >= 0.7 {
            tips.push(format!(
                "ペイロードを最大の70%未満（現在 {:.0}%）に抑えると航続時間が伸びます",
                ctx.load_ratio * 100.0
            ));
        }
        if ctx.gust_mps > STRONG_GUST_MPS {
            tips.push("強風により消費電力が増加しています。運用延期を検討してください".to_string());
        }
        if ctx.battery_capacity_wh.is_some_and(|wh| wh < SMALL_BATTERY_WH) {
            tips.push("バッテリ容量が30Wh未満です。大容量化を検討してください".to_string());
        }
        if ctx.speed_mps >= 0.9 * ctx.max_speed_mps {
            tips.push("高速飛行で抗力と消費電力が増大しています。減速を検討してください".to_string());
        }
        if ctx.elevation_gain_m > LARGE_ELEVATION_GAIN_M {
            tips.push("300m を超える上昇は航続距離を大きく減らします".to_string());
        }
        if ctx.ambient_c < 0.0 || ctx.ambient_c > 40.0 {
            tips.push("極端な気温はバッテリ効率を低下させます".to_string());
        }
        tips
    }

    pub fn rationale(ctx: &AdvisoryContext) -> String {
        let mut parts = vec![Self::reason(ctx)];
        parts.extend(Self::tips(ctx));
        parts.join(" / ")
    }
}

#[async_trait]
impl AdvisoryBackend for HeuristicRationale {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn propose_rationale(&self, ctx: &AdvisoryContext) -> std::result::Result<String, AdvisoryError> {
        Ok(Self::rationale(ctx))
    }
}

/// 外部コマンドを呼び出すバックエンド
///
/// コンテキストをJSONで標準入力に渡し、標準出力の1行目以降を説明文として受け取ります。
/// タイムアウト時はプロセスを強制終了します。
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl AdvisoryBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.program
    }

    async fn propose_rationale(&self, ctx: &AdvisoryContext) -> std::result::Result<String, AdvisoryError> {
        let unavailable = |e: std::io::Error| AdvisoryError::Unavailable(e.to_string());
        let payload = serde_json::to_vec(ctx).map_err(|e| AdvisoryError::Unavailable(e.to_string()))?;

        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(unavailable)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await.map_err(unavailable)?;
        }

        let output = child.wait_with_output().await.map_err(unavailable)?;
        if !output.status.success() {
            return Err(AdvisoryError::Unavailable(format!("exit status {}", output.status)));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(AdvisoryError::Unavailable("empty response".to_string()));
        }
        Ok(text)
    }
}

/// バックエンド呼び出しを同期側から行うクライアント
pub struct AdvisoryClient {
    backend: Option<Arc<dyn AdvisoryBackend>>,
    runtime: Option<Runtime>,
    timeout: Duration,
}

impl std::fmt::Debug for AdvisoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisoryClient")
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AdvisoryClient {
    /// バックエンドなし（ヒューリスティックのみ）
    pub fn heuristic() -> Self {
        Self {
            backend: None,
            runtime: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_backend(backend: Arc<dyn AdvisoryBackend>, timeout: Duration) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("uavsim-advisory")
            .enable_all()
            .build()
            .map_err(SimError::AdvisoryRuntime)?;

        Ok(Self {
            backend: Some(backend),
            runtime: Some(runtime),
            timeout,
        })
    }

    pub fn backend_name(&self) -> &str {
        self.backend.as_ref().map_or("heuristic", |b| b.name())
    }

    /// 遷移1件に注記を付ける。失敗しても必ず注記を返す
    pub fn annotate(&self, ctx: &AdvisoryContext) -> AdvisoryNote {
        let (source, rationale, note) = match (&self.backend, &self.runtime) {
            (Some(backend), Some(runtime)) => match self.consult(backend, runtime, ctx) {
                Ok(text) => (backend.name().to_string(), text, None),
                Err(e) => {
                    warn!(
                        uav_id = %ctx.uav_id,
                        time_s = ctx.time_s,
                        backend = backend.name(),
                        error = %e,
                        "ADVISORY_FALLBACK: バックエンド応答なし、ヒューリスティックで代替"
                    );
                    (
                        "heuristic".to_string(),
                        HeuristicRationale::rationale(ctx),
                        Some(format!("{}: {}", UNAVAILABLE_NOTE, e)),
                    )
                }
            },
            _ => ("heuristic".to_string(), HeuristicRationale::rationale(ctx), None),
        };

        debug!(uav_id = %ctx.uav_id, source = %source, rationale = %rationale, "遷移注記");

        AdvisoryNote {
            time_s: ctx.time_s,
            uav_id: ctx.uav_id.clone(),
            from: ctx.from,
            to: ctx.to,
            source,
            rationale,
            note,
        }
    }

    fn consult(
        &self,
        backend: &Arc<dyn AdvisoryBackend>,
        runtime: &Runtime,
        ctx: &AdvisoryContext,
    ) -> std::result::Result<String, AdvisoryError> {
        // 非同期コンテキスト内からの block_on はパニックするため呼ばない
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(AdvisoryError::Unavailable(
                "called from within an async runtime".to_string(),
            ));
        }

        let backend = Arc::clone(backend);
        let owned = ctx.clone();
        let handle = runtime.spawn(async move { backend.propose_rationale(&owned).await });
        let abort = handle.abort_handle();
        let timeout = self.timeout;

        match runtime.block_on(async move { tokio::time::timeout(timeout, handle).await }) {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(AdvisoryError::Unavailable(join_error.to_string())),
            Err(_) => {
                abort.abort();
                Err(AdvisoryError::Timeout(timeout.as_millis() as u64))
            }
        }
    }
}

impl Drop for AdvisoryClient {
    fn drop(&mut self) {
        // 応答しないバックエンドを待たずに終了する
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn context(to: UavStatus) -> AdvisoryContext {
        AdvisoryContext {
            uav_id: "U1".to_string(),
            time_s: 120.0,
            from: UavStatus::Active,
            to,
            energy_remaining_fraction: 0.2,
            reserve_fraction: 0.2,
            latitude: 35.0,
            longitude: 139.0,
            altitude_m: 120.0,
            threat_zones: vec!["SAM-1".to_string()],
            platform: "Test".to_string(),
            load_ratio: 0.0,
            speed_mps: 10.0,
            max_speed_mps: 20.0,
            gust_mps: 0.0,
            ambient_c: 15.0,
            energy_kind: "battery".to_string(),
            battery_capacity_wh: Some(100.0),
            elevation_gain_m: 0.0,
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl AdvisoryBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }
        async fn propose_rationale(&self, _ctx: &AdvisoryContext) -> std::result::Result<String, AdvisoryError> {
            Err(AdvisoryError::Unavailable("connection refused".to_string()))
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl AdvisoryBackend for SlowBackend {
        fn name(&self) -> &str {
            "slow"
        }
        async fn propose_rationale(&self, _ctx: &AdvisoryContext) -> std::result::Result<String, AdvisoryError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    struct FixedBackend;

    #[async_trait]
    impl AdvisoryBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn propose_rationale(&self, ctx: &AdvisoryContext) -> std::result::Result<String, AdvisoryError> {
            Ok(format!("{} -> {}", ctx.from.as_str(), ctx.to.as_str()))
        }
    }

    #[test]
    fn test_heuristic_only_client() {
        let client = AdvisoryClient::heuristic();
        let note = client.annotate(&context(UavStatus::Rtb));
        assert_eq!(note.source, "heuristic");
        assert!(note.rationale.contains("帰投"));
        assert!(note.note.is_none());
    }

    #[test]
    fn test_failing_backend_falls_back() {
        let client = AdvisoryClient::with_backend(Arc::new(FailingBackend), Duration::from_millis(200)).unwrap();
        let note = client.annotate(&context(UavStatus::Rtb));
        assert_eq!(note.source, "heuristic");
        assert!(note.note.as_deref().unwrap_or_default().starts_with(UNAVAILABLE_NOTE));
        assert_eq!(note.rationale, HeuristicRationale::rationale(&context(UavStatus::Rtb)));
    }

    #[test]
    fn test_slow_backend_times_out() {
        let client = AdvisoryClient::with_backend(Arc::new(SlowBackend), Duration::from_millis(50)).unwrap();
        let started = Instant::now();
        let note = client.annotate(&context(UavStatus::StealthIngress));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(note.source, "heuristic");
        assert!(note.note.as_deref().unwrap_or_default().contains("50 ms"));
        drop(client);
    }

    #[test]
    fn test_backend_text_is_used() {
        let client = AdvisoryClient::with_backend(Arc::new(FixedBackend), Duration::from_millis(500)).unwrap();
        let note = client.annotate(&context(UavStatus::Rtb));
        assert_eq!(note.source, "fixed");
        assert_eq!(note.rationale, "active -> rtb");
        assert_eq!(note.to, UavStatus::Rtb);
    }

    #[test]
    fn test_tips_follow_conditions() {
        let mut ctx = context(UavStatus::Rtb);
        assert!(HeuristicRationale::tips(&ctx).is_empty());

        ctx.load_ratio = 0.95;
        ctx.gust_mps = 8.0;
        ctx.battery_capacity_wh = Some(25.0);
        ctx.speed_mps = 19.0;
        ctx.elevation_gain_m = 400.0;
        ctx.ambient_c = -5.0;
        assert_eq!(HeuristicRationale::tips(&ctx).len(), 6);
    }

    #[tokio::test]
    async fn test_heuristic_backend_is_async_compatible() {
        let ctx = context(UavStatus::StealthIngress);
        let text = HeuristicRationale.propose_rationale(&ctx).await.unwrap();
        assert!(text.contains("SAM-1"));
    }

    #[test]
    fn test_client_inside_runtime_falls_back() {
        let outer = Builder::new_current_thread().enable_all().build().unwrap();
        let client = AdvisoryClient::with_backend(Arc::new(FixedBackend), Duration::from_millis(200)).unwrap();
        let note = outer.block_on(async { client.annotate(&context(UavStatus::Rtb)) });
        assert_eq!(note.source, "heuristic");
        assert!(note.note.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_backend() {
        let ok = CommandBackend::new("sh", vec!["-c".into(), "cat > /dev/null; echo climb out".into()]);
        let client = AdvisoryClient::with_backend(Arc::new(ok), Duration::from_secs(5)).unwrap();
        let note = client.annotate(&context(UavStatus::Rtb));
        assert_eq!(note.source, "sh");
        assert_eq!(note.rationale, "climb out");

        let failing = CommandBackend::new("sh", vec!["-c".into(), "cat > /dev/null; exit 3".into()]);
        let client = AdvisoryClient::with_backend(Arc::new(failing), Duration::from_secs(5)).unwrap();
        assert!(client.annotate(&context(UavStatus::Rtb)).note.is_some());
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// ライブラリ共通のResult型
pub type Result<T> = std::result::Result<T, SimError>;

/// シミュレーションエラー
///
/// シナリオ構築時の検証エラーとファイル入出力エラーを表します。
/// エネルギー枯渇は終端状態であり、エラーとしては扱いません。
#[derive(Debug, Error)]
pub enum SimError {
    /// シナリオファイルが存在しない
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    /// ファイル読み書きエラー
    #[error("ファイル入出力エラー {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML解析エラー
    #[error("YAML解析エラー {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// 入力値の前提条件違反（構築時に即座に失敗させる）
    #[error("入力値エラー: {0}")]
    InvalidInput(String),

    /// CSV入出力エラー
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// JSON入出力エラー
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// アドバイザリ用ランタイムの起動失敗
    #[error("アドバイザリランタイムを起動できません: {0}")]
    AdvisoryRuntime(#[source] std::io::Error),
}

impl SimError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SimError::InvalidInput(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SimError::Io {
            path: path.into(),
            source,
        }
    }
}

//! # Export モジュール
//!
//! 時系列ログとサマリーを CSV / JSON で書き出し、読み戻します。
//!
//! - `timeline.csv` / `timeline.json`: 列順は [`TimelineRecord`] のフィールド順
//! - `summary.csv` / `summary.json`: 機体ごとの結果（JSONはアドバイザリ注記を含む）
//!
//! 浮動小数点は最短表現で出力するため、読み戻すと同じ値になります。

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use tracing::info;

use crate::error::{Result, SimError};
use crate::timeline::{SummaryReport, TimelineLog, TimelineRecord, UavSummary};

pub const TIMELINE_CSV: &str = "timeline.csv";
pub const TIMELINE_JSON: &str = "timeline.json";
pub const SUMMARY_CSV: &str = "summary.csv";
pub const SUMMARY_JSON: &str = "summary.json";

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Both,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "both" | "all" => Ok(ExportFormat::Both),
            _ => Err(format!("無効な出力形式: {}. 利用可能: csv, json, both", s)),
        }
    }
}

impl ExportFormat {
    fn csv(&self) -> bool {
        matches!(self, ExportFormat::Csv | ExportFormat::Both)
    }

    fn json(&self) -> bool {
        matches!(self, ExportFormat::Json | ExportFormat::Both)
    }
}

pub fn write_timeline_csv<W: Write>(writer: W, records: &[TimelineRecord]) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush().map_err(|e| SimError::io("<timeline csv>", e))?;
    Ok(())
}

pub fn read_timeline_csv<R: Read>(reader: R) -> Result<Vec<TimelineRecord>> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::Fields).from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

pub fn write_summary_csv<W: Write>(writer: W, uavs: &[UavSummary]) -> Result<()> {
    let mut csv_writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for summary in uavs {
        csv_writer.serialize(summary)?;
    }
    csv_writer.flush().map_err(|e| SimError::io("<summary csv>", e))?;
    Ok(())
}

pub fn read_summary_csv<R: Read>(reader: R) -> Result<Vec<UavSummary>> {
    let mut csv_reader = ReaderBuilder::new().trim(Trim::Fields).from_reader(reader);
    let mut rows = Vec::new();
    for row in csv_reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| SimError::io(path, e))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(SimError::FileNotFound(path.to_path_buf()));
    }
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| SimError::io(path, e))
}

pub fn write_timeline_csv_file(path: &Path, records: &[TimelineRecord]) -> Result<()> {
    write_timeline_csv(create(path)?, records)
}

pub fn read_timeline_csv_file(path: &Path) -> Result<Vec<TimelineRecord>> {
    read_timeline_csv(open(path)?)
}

pub fn write_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| SimError::io(path, e))?;
    Ok(())
}

pub fn read_timeline_json_file(path: &Path) -> Result<TimelineLog> {
    Ok(serde_json::from_reader(open(path)?)?)
}

pub fn read_summary_json_file(path: &Path) -> Result<SummaryReport> {
    Ok(serde_json::from_reader(open(path)?)?)
}

/// 指定ディレクトリに全ファイルを書き出す
///
/// ディレクトリが存在しない場合は作成します。
///
/// # 引数
///
/// * `dir` - 出力先ディレクトリ
/// * `log` - 時系列ログ
/// * `summary` - 機体ごとの結果
/// * `format` - 書き出す形式（CSV / JSON / 両方）
///
/// # 戻り値
///
/// 作成したファイルのパス。書き込みに失敗した場合は `SimError::Io`
pub fn export_all(dir: &Path, log: &TimelineLog, summary: &SummaryReport, format: ExportFormat) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| SimError::io(dir, e))?;

    let mut written = Vec::new();
    if format.csv() {
        let timeline = dir.join(TIMELINE_CSV);
        write_timeline_csv_file(&timeline, &log.records)?;
        written.push(timeline);

        let path = dir.join(SUMMARY_CSV);
        write_summary_csv(create(&path)?, &summary.uavs)?;
        written.push(path);
    }
    if format.json() {
        let timeline = dir.join(TIMELINE_JSON);
        write_json_file(&timeline, log)?;
        written.push(timeline);

        let path = dir.join(SUMMARY_JSON);
        write_json_file(&path, summary)?;
        written.push(path);
    }

    info!(
        output_dir = %dir.display(),
        files = written.len(),
        records = log.records.len(),
        "EXPORT_COMPLETE: 結果を書き出しました"
    );
    Ok(written)
}

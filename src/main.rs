use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Arg, ArgAction, Command};
use tracing::error;

use uavsim::export::{self, ExportFormat};
use uavsim::logging::{self, LogConfig, LogOutput};
use uavsim::models::catalog;
use uavsim::scenario::ScenarioConfig;
use uavsim::simulation::SimulationHandle;
use uavsim::timeline::SummaryReport;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("uavsim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("UAVミッション航続・被探知リスクシミュレーション")
        .long_about(
            "時間駆動型のUAVスウォームシミュレーション\n\
             推進電力・エネルギー消費・熱/視覚シグネチャを積分し、\n\
             帰投・ステルス進入を含むミッションの航続性とリスクを評価します。",
        )
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .default_value("output")
                .help("結果の出力ディレクトリ"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .value_name("FORMAT")
                .default_value("both")
                .value_parser(["csv", "json", "both"])
                .help("出力形式 (csv, json, both)"),
        )
        .arg(
            Arg::new("list-presets")
                .long("list-presets")
                .action(ArgAction::SetTrue)
                .help("組み込みの機体プリセット一覧を表示して終了"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)"),
        )
        .get_matches();

    println!("UAVミッションシミュレーション - uavsim v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let verbose_level = matches.get_count("verbose");

    // ログ設定
    let output = matches
        .get_one::<String>("log-output")
        .map_or(Ok(LogOutput::Console), |s| LogOutput::from_str(s))
        .unwrap_or_else(|e| {
            eprintln!("警告: {}. コンソールに出力します", e);
            LogOutput::Console
        });
    let level = matches
        .get_one::<String>("log-level")
        .map(|s| logging::parse_log_level(s))
        .unwrap_or_else(|| logging::level_for_verbosity(verbose_level));
    let log_config = LogConfig {
        level,
        output,
        ..LogConfig::default()
    };
    let _guard = match logging::init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("警告: ログ初期化に失敗しました: {}", e);
            None
        }
    };

    if matches.get_flag("list-presets") {
        catalog::print_catalog();
        return;
    }

    let Some(scenario_path) = matches.get_one::<String>("scenario") else {
        show_default_help();
        return;
    };

    let format = matches
        .get_one::<String>("format")
        .and_then(|s| ExportFormat::from_str(s).ok())
        .unwrap_or(ExportFormat::Both);
    let output_dir = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("output"));

    match run_scenario(scenario_path, matches.get_flag("info"), &output_dir, format, verbose_level) {
        Ok(_) => {
            if verbose_level > 0 {
                println!("シナリオ実行が正常に完了しました。");
            }
        }
        Err(e) => {
            error!(error = %e, "シナリオ実行に失敗しました");
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    }
}

/// シナリオファイルを読み込んで実行
fn run_scenario(
    scenario_path: &str,
    info_only: bool,
    output_dir: &Path,
    format: ExportFormat,
    verbose_level: u8,
) -> uavsim::Result<()> {
    let scenario = ScenarioConfig::from_file(scenario_path)?;

    if verbose_level > 0 {
        println!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    scenario.print_summary();
    println!();

    if verbose_level > 0 {
        println!("シミュレーション設定:");
        println!("  時間刻み: {:.3}秒", scenario.sim.dt_s);
        println!("  最大時間: {:.1}秒", scenario.sim.t_max_s);
        println!();
    }

    let mut simulation = SimulationHandle::construct(scenario)?.with_verbose(verbose_level);
    simulation.run_to_completion()?;

    let summary = simulation.summary();
    print_report(&summary);

    let written = export::export_all(output_dir, simulation.log(), &summary, format)?;
    println!();
    println!("出力ファイル:");
    for path in written {
        println!("  {}", path.display());
    }

    Ok(())
}

/// 結果サマリーの表示
fn print_report(summary: &SummaryReport) {
    println!();
    println!("=== 結果サマリー ===");
    println!(
        "停止理由: {:?} / 経過時間: {:.1}秒 ({}ステップ)",
        summary.stop_reason, summary.simulated_time_s, summary.ticks
    );
    for uav in &summary.uavs {
        println!(
            "  {:<10} {:<16} 距離 {:>9.1}m  時間 {:>8.1}秒  残量 {:>5.1}%  IR最大 {:>5.1}  視覚最大 {:>5.1}  脅威曝露 {:>7.1}",
            uav.uav_id,
            uav.outcome.as_str(),
            uav.total_distance_m,
            uav.total_time_s,
            uav.final_energy_fraction * 100.0,
            uav.peak_ir_score,
            uav.peak_visual_score,
            uav.threat_exposure
        );
    }
    if !summary.advisories.is_empty() {
        println!();
        println!("=== 状態遷移 ===");
        for note in &summary.advisories {
            println!(
                "  {:>8.1}秒 {} {} -> {}: {}",
                note.time_s,
                note.uav_id,
                note.from.as_str(),
                note.to.as_str(),
                note.rationale
            );
            if let Some(extra) = &note.note {
                println!("           ({})", extra);
            }
        }
    }
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  uavsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>   シナリオファイルを指定して実行");
    println!("  -i, --info              シナリオ情報のみ表示");
    println!("  -o, --output <DIR>      出力ディレクトリ (既定: output)");
    println!("      --format <FORMAT>   出力形式 csv / json / both");
    println!("      --list-presets      機体プリセット一覧");
    println!("  -v, --verbose           詳細出力 (複数指定で詳細レベル上昇)");
    println!("  -h, --help              このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/endurance_baseline.yaml  - 単機の航続・帰投確認");
    println!("  scenarios/swarm_recon.yaml         - 脅威圏を含むスウォーム偵察");
    println!();
    println!("例:");
    println!("  uavsim -s scenarios/swarm_recon.yaml");
    println!("  uavsim -s scenarios/swarm_recon.yaml -i");
    println!("  uavsim -s scenarios/endurance_baseline.yaml -o out --format csv -vv");
}

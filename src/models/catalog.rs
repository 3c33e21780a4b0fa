//! # Catalog モジュール
//!
//! 代表的な機体のプリセット（カタログ値の消費電力・バッテリ容量・最大ペイロード）を
//! 提供します。プリセットの消費電力は `fixed_draw_w` として設定されるため、
//! 空力モデルの代わりにカタログ値を基準に計算されます。

use crate::models::platform::{Airframe, FixedWingParams, Platform, RotorcraftParams, SignatureParams};
use crate::scenario::{EnergyConfig, HybridAssistConfig};

/// プリセット（機体諸元＋既定エネルギー源）
#[derive(Debug, Clone)]
pub struct Preset {
    pub key: &'static str,
    pub platform: Platform,
    pub energy: EnergyConfig,
}

struct Datasheet {
    key: &'static str,
    name: &'static str,
    mass_kg: f64,
    max_payload_kg: f64,
    draw_w: f64,
    battery_wh: f64,
    cruise_mps: f64,
    max_mps: f64,
    max_alt_m: f64,
}

fn rotorcraft(sheet: Datasheet, disc_area_m2: f64) -> Preset {
    Preset {
        key: sheet.key,
        platform: base_platform(
            &sheet,
            Airframe::Rotorcraft(RotorcraftParams {
                rotor_disc_area_m2: disc_area_m2,
                figure_of_merit: 0.7,
                flat_plate_area_m2: 0.05,
                gust_coefficient_w_per_mps2: 0.5,
            }),
        ),
        energy: EnergyConfig::Battery {
            capacity_wh: sheet.battery_wh,
        },
    }
}

fn fixed_wing(sheet: Datasheet, wing_area_m2: f64, aspect_ratio: f64, energy: Option<EnergyConfig>) -> Preset {
    let energy = energy.unwrap_or(EnergyConfig::Battery {
        capacity_wh: sheet.battery_wh,
    });
    Preset {
        key: sheet.key,
        platform: base_platform(
            &sheet,
            Airframe::FixedWing(FixedWingParams {
                wing_area_m2,
                aspect_ratio,
                cd0: 0.03,
                oswald_efficiency: 0.8,
                propulsive_efficiency: 0.7,
            }),
        ),
        energy,
    }
}

fn hybrid(fuel_kg: f64, bsfc_g_per_kwh: f64, battery_wh: f64) -> EnergyConfig {
    EnergyConfig::Fuel {
        capacity_kg: fuel_kg,
        bsfc_g_per_kwh,
        hybrid_assist: Some(HybridAssistConfig {
            fraction: 0.2,
            battery_wh,
        }),
    }
}

fn base_platform(sheet: &Datasheet, airframe: Airframe) -> Platform {
    Platform {
        name: sheet.name.to_string(),
        mass_kg: sheet.mass_kg,
        payload_kg: 0.0,
        max_payload_kg: Some(sheet.max_payload_kg),
        cruise_speed_mps: sheet.cruise_mps,
        max_speed_mps: sheet.max_mps,
        max_altitude_m: sheet.max_alt_m,
        reserve_fraction: 0.2,
        stealth_drag_multiplier: 1.15,
        fixed_draw_w: Some(sheet.draw_w),
        signature: SignatureParams::default(),
        airframe,
    }
}

/// 全プリセット
pub fn presets() -> Vec<Preset> {
    vec![
        rotorcraft(
            Datasheet { key: "generic_quad", name: "Generic Quad", mass_kg: 1.2, max_payload_kg: 0.8, draw_w: 150.0, battery_wh: 60.0, cruise_mps: 10.0, max_mps: 18.0, max_alt_m: 500.0 },
            0.28,
        ),
        rotorcraft(
            Datasheet { key: "dji_phantom", name: "DJI Phantom", mass_kg: 1.4, max_payload_kg: 0.5, draw_w: 120.0, battery_wh: 68.0, cruise_mps: 10.0, max_mps: 20.0, max_alt_m: 500.0 },
            0.2,
        ),
        rotorcraft(
            Datasheet { key: "skydio_2_plus", name: "Skydio 2+", mass_kg: 0.8, max_payload_kg: 0.15, draw_w: 90.0, battery_wh: 45.0, cruise_mps: 10.0, max_mps: 16.0, max_alt_m: 500.0 },
            0.12,
        ),
        rotorcraft(
            Datasheet { key: "freefly_alta_8", name: "Freefly Alta 8", mass_kg: 6.2, max_payload_kg: 9.0, draw_w: 400.0, battery_wh: 710.0, cruise_mps: 10.0, max_mps: 15.0, max_alt_m: 1_000.0 },
            1.2,
        ),
        fixed_wing(
            Datasheet { key: "rq11_raven", name: "RQ-11 Raven", mass_kg: 1.9, max_payload_kg: 0.0, draw_w: 90.0, battery_wh: 50.0, cruise_mps: 12.5, max_mps: 22.0, max_alt_m: 4_500.0 },
            0.25,
            7.0,
            None,
        ),
        fixed_wing(
            Datasheet { key: "rq20_puma", name: "RQ-20 Puma", mass_kg: 6.3, max_payload_kg: 0.6, draw_w: 180.0, battery_wh: 275.0, cruise_mps: 13.0, max_mps: 23.0, max_alt_m: 4_500.0 },
            0.55,
            10.0,
            None,
        ),
        fixed_wing(
            Datasheet { key: "quantum_vector", name: "Quantum Systems Vector", mass_kg: 2.3, max_payload_kg: 1.5, draw_w: 160.0, battery_wh: 150.0, cruise_mps: 15.0, max_mps: 22.0, max_alt_m: 3_000.0 },
            0.45,
            9.0,
            None,
        ),
        fixed_wing(
            Datasheet { key: "teal_golden_eagle", name: "Teal Golden Eagle", mass_kg: 2.2, max_payload_kg: 2.0, draw_w: 220.0, battery_wh: 100.0, cruise_mps: 14.0, max_mps: 22.0, max_alt_m: 3_000.0 },
            0.4,
            8.0,
            Some(hybrid(0.5, 550.0, 100.0)),
        ),
        fixed_wing(
            Datasheet { key: "mq1_predator", name: "MQ-1 Predator", mass_kg: 512.0, max_payload_kg: 204.0, draw_w: 650.0, battery_wh: 150.0, cruise_mps: 36.0, max_mps: 60.0, max_alt_m: 7_600.0 },
            11.5,
            19.0,
            Some(hybrid(6.0, 350.0, 150.0)),
        ),
        fixed_wing(
            Datasheet { key: "mq9_reaper", name: "MQ-9 Reaper", mass_kg: 2_223.0, max_payload_kg: 1_700.0, draw_w: 800.0, battery_wh: 200.0, cruise_mps: 80.0, max_mps: 130.0, max_alt_m: 15_000.0 },
            24.0,
            19.0,
            Some(hybrid(10.0, 300.0, 200.0)),
        ),
    ]
}

/// キーまたは表示名（大文字小文字を区別しない）で検索
pub fn find(key: &str) -> Option<Preset> {
    presets()
        .into_iter()
        .find(|p| p.key.eq_ignore_ascii_case(key) || p.platform.name.eq_ignore_ascii_case(key))
}

/// カタログ一覧を表示
pub fn print_catalog() {
    println!("=== 機体プリセット ===");
    for preset in presets() {
        let p = &preset.platform;
        println!(
            "  {:<18} {:<24} {:<10} 質量 {:>7.1}kg  最大ペイロード {:>7.2}kg  消費 {:>5.0}W  {}",
            preset.key,
            p.name,
            p.airframe.class_name(),
            p.mass_kg,
            p.max_payload_kg.unwrap_or(0.0),
            p.fixed_draw_w.unwrap_or(0.0),
            preset.energy.describe()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_valid() {
        for preset in presets() {
            assert!(preset.platform.validate().is_ok(), "{}", preset.key);
            assert!(preset.energy.build(20.0).is_ok(), "{}", preset.key);
        }
    }

    #[test]
    fn test_find_by_key_or_name() {
        assert_eq!(find("dji_phantom").map(|p| p.platform.name), Some("DJI Phantom".to_string()));
        assert_eq!(find("RQ-20 Puma").map(|p| p.key), Some("rq20_puma"));
        assert!(find("unknown").is_none());
    }

    #[test]
    fn test_hybrid_presets() {
        let preset = find("mq1_predator").unwrap();
        assert_eq!(preset.energy.build(20.0).unwrap().kind(), "hybrid");
        assert!(matches!(preset.platform.airframe, Airframe::FixedWing(_)));
    }
}

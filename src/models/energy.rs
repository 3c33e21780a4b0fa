//! # Energy モジュール
//!
//! バッテリ（残容量Wh）およびレシプロエンジン燃料（BSFCベースの燃料消費）の
//! 枯渇積分を提供します。ハイブリッド機は燃料系に並列バッテリを持ち、
//! 消費電力の一定割合をバッテリで分担します。
//!
//! 残量は0でクランプされ、単調非増加です。0到達は一度だけ報告され、
//! 以降の `tick` は何もしません。予備残量の判定は提供しますが、帰投の
//! 強制は行いません（判断は [`crate::models::advisor`] 側の責務）。

use crate::error::{Result, SimError};

/// 1Wh = 3600J
const JOULES_PER_WH: f64 = 3_600.0;
/// 1kWh = 3.6e6J
const JOULES_PER_KWH: f64 = 3_600_000.0;
/// 残量を0とみなす相対許容誤差
const DEPLETION_TOLERANCE: f64 = 1e-9;

/// 低温時のバッテリ容量係数（15℃未満）
pub const COLD_DERATING: f64 = 0.90;
/// 高温時のバッテリ容量係数（35℃超）
pub const HOT_DERATING: f64 = 0.95;
pub const COLD_THRESHOLD_C: f64 = 15.0;
pub const HOT_THRESHOLD_C: f64 = 35.0;

/// 気温によるバッテリ容量係数
pub fn temperature_derating(ambient_c: f64) -> f64 {
    if ambient_c < COLD_THRESHOLD_C {
        COLD_DERATING
    } else if ambient_c > HOT_THRESHOLD_C {
        HOT_DERATING
    } else {
        1.0
    }
}

/// バッテリ状態
#[derive(Debug, Clone, PartialEq)]
pub struct BatteryState {
    pub capacity_wh: f64,
    pub remaining_wh: f64,
    consumed_j: f64, // 累積消費エネルギー（丸め誤差の蓄積を避けるためJで保持）
}

impl BatteryState {
    pub fn new(capacity_wh: f64) -> Self {
        Self {
            capacity_wh,
            remaining_wh: capacity_wh,
            consumed_j: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining_wh <= 0.0
    }

    pub fn fraction_remaining(&self) -> f64 {
        if self.capacity_wh > 0.0 {
            (self.remaining_wh / self.capacity_wh).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// エネルギーを引き出し、供給できなかった分 [J] を返す
    fn drain(&mut self, energy_j: f64) -> f64 {
        if self.is_empty() || energy_j <= 0.0 {
            return energy_j.max(0.0);
        }
        let available_j = self.remaining_wh * JOULES_PER_WH;
        let supplied_j = energy_j.min(available_j);
        self.consumed_j += supplied_j;

        let remaining = self.capacity_wh - self.consumed_j / JOULES_PER_WH;
        self.remaining_wh = if remaining <= self.capacity_wh * DEPLETION_TOLERANCE {
            0.0
        } else {
            remaining.min(self.remaining_wh)
        };
        energy_j - supplied_j
    }
}

/// ハイブリッド補助（並列バッテリ）
#[derive(Debug, Clone, PartialEq)]
pub struct HybridAssist {
    /// バッテリが分担する消費電力の割合 [0, 1]
    pub fraction: f64,
    pub battery: BatteryState,
}

/// 燃料状態
#[derive(Debug, Clone, PartialEq)]
pub struct FuelState {
    pub capacity_kg: f64,
    pub remaining_kg: f64,
    /// 正味燃料消費率 [g/kWh]
    pub bsfc_g_per_kwh: f64,
    pub assist: Option<HybridAssist>,
    burned_kg: f64,
}

impl FuelState {
    pub fn new(capacity_kg: f64, bsfc_g_per_kwh: f64) -> Self {
        Self {
            capacity_kg,
            remaining_kg: capacity_kg,
            bsfc_g_per_kwh,
            assist: None,
            burned_kg: 0.0,
        }
    }

    pub fn with_assist(mut self, fraction: f64, battery_wh: f64) -> Self {
        self.assist = Some(HybridAssist {
            fraction,
            battery: BatteryState::new(battery_wh),
        });
        self
    }

    pub fn tank_empty(&self) -> bool {
        self.remaining_kg <= 0.0
    }

    /// 燃料消費率 [kg/s]
    pub fn burn_rate_kg_per_s(&self, power_w: f64) -> f64 {
        self.bsfc_g_per_kwh * power_w / (1_000.0 * JOULES_PER_KWH)
    }

    /// 燃料質量から取り出せる軸出力エネルギー [Wh]
    pub fn deliverable_wh(&self, fuel_kg: f64) -> f64 {
        fuel_kg * 1_000.0 / self.bsfc_g_per_kwh * 1_000.0
    }

    /// エネルギーを燃焼で賄い、供給できなかった分 [J] を返す
    fn burn(&mut self, energy_j: f64) -> f64 {
        if self.tank_empty() || energy_j <= 0.0 {
            return energy_j.max(0.0);
        }
        let required_kg = self.bsfc_g_per_kwh * energy_j / (1_000.0 * JOULES_PER_KWH);
        let burned = required_kg.min(self.remaining_kg);
        self.burned_kg += burned;

        let remaining = self.capacity_kg - self.burned_kg;
        self.remaining_kg = if remaining <= self.capacity_kg * DEPLETION_TOLERANCE {
            0.0
        } else {
            remaining.min(self.remaining_kg)
        };

        if required_kg > 0.0 {
            energy_j * (1.0 - burned / required_kg)
        } else {
            0.0
        }
    }
}

/// 1ティック分の積分結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyTick {
    /// 実際に供給されたエネルギー [J]
    pub supplied_j: f64,
    /// このティックで枯渇に到達したか（一度だけtrue）
    pub depleted_now: bool,
}

/// エネルギー源の状態
#[derive(Debug, Clone, PartialEq)]
pub enum EnergyState {
    Battery(BatteryState),
    Fuel(FuelState),
}

impl EnergyState {
    pub fn battery(capacity_wh: f64) -> Result<Self> {
        if !(capacity_wh.is_finite() && capacity_wh > 0.0) {
            return Err(SimError::invalid(format!(
                "battery capacity must be positive, got {}",
                capacity_wh
            )));
        }
        Ok(EnergyState::Battery(BatteryState::new(capacity_wh)))
    }

    pub fn fuel(capacity_kg: f64, bsfc_g_per_kwh: f64) -> Result<Self> {
        if !(capacity_kg.is_finite() && capacity_kg > 0.0) {
            return Err(SimError::invalid(format!(
                "fuel capacity must be positive, got {}",
                capacity_kg
            )));
        }
        if !(bsfc_g_per_kwh.is_finite() && bsfc_g_per_kwh > 0.0) {
            return Err(SimError::invalid(format!(
                "bsfc must be positive, got {}",
                bsfc_g_per_kwh
            )));
        }
        Ok(EnergyState::Fuel(FuelState::new(capacity_kg, bsfc_g_per_kwh)))
    }

    pub fn hybrid(capacity_kg: f64, bsfc_g_per_kwh: f64, assist_fraction: f64, battery_wh: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&assist_fraction) {
            return Err(SimError::invalid(format!(
                "hybrid assist fraction must be in [0, 1], got {}",
                assist_fraction
            )));
        }
        if !(battery_wh.is_finite() && battery_wh > 0.0) {
            return Err(SimError::invalid(format!(
                "hybrid assist battery must be positive, got {}",
                battery_wh
            )));
        }
        match Self::fuel(capacity_kg, bsfc_g_per_kwh)? {
            EnergyState::Fuel(fuel) => Ok(EnergyState::Fuel(fuel.with_assist(assist_fraction, battery_wh))),
            other => Ok(other),
        }
    }

    /// 気温によるバッテリ容量補正（構築時に一度だけ適用）
    pub fn derate_for_temperature(&mut self, ambient_c: f64) -> f64 {
        let factor = temperature_derating(ambient_c);
        let battery = match self {
            EnergyState::Battery(battery) => Some(battery),
            EnergyState::Fuel(fuel) => fuel.assist.as_mut().map(|a| &mut a.battery),
        };
        if let Some(battery) = battery {
            *battery = BatteryState::new(battery.capacity_wh * factor);
        }
        factor
    }

    /// 消費電力 [W] を dt [s] の間積分する
    pub fn tick(&mut self, power_w: f64, dt_s: f64) -> EnergyTick {
        if self.is_depleted() {
            return EnergyTick {
                supplied_j: 0.0,
                depleted_now: false,
            };
        }

        let demand_j = (power_w * dt_s).max(0.0);
        let unmet_j = match self {
            EnergyState::Battery(battery) => battery.drain(demand_j),
            EnergyState::Fuel(fuel) => match fuel.assist.take() {
                None => fuel.burn(demand_j),
                Some(mut assist) => {
                    // 分担割合で按分し、片方が空なら残りをもう一方が負担
                    let battery_share = demand_j * assist.fraction;
                    let mut fuel_share = demand_j - battery_share;
                    fuel_share += assist.battery.drain(battery_share);
                    let unmet_fuel = fuel.burn(fuel_share);
                    let unmet = assist.battery.drain(unmet_fuel);
                    fuel.assist = Some(assist);
                    unmet
                }
            },
        };

        EnergyTick {
            supplied_j: demand_j - unmet_j,
            depleted_now: self.is_depleted(),
        }
    }

    pub fn is_depleted(&self) -> bool {
        match self {
            EnergyState::Battery(battery) => battery.is_empty(),
            EnergyState::Fuel(fuel) => {
                fuel.tank_empty() && fuel.assist.as_ref().is_none_or(|a| a.battery.is_empty())
            }
        }
    }

    /// 残量割合 [0, 1]
    ///
    /// ハイブリッドは燃料の取り出し可能エネルギーとバッテリWhの合計比。
    pub fn fraction_remaining(&self) -> f64 {
        match self {
            EnergyState::Battery(battery) => battery.fraction_remaining(),
            EnergyState::Fuel(fuel) => match &fuel.assist {
                None => (fuel.remaining_kg / fuel.capacity_kg).clamp(0.0, 1.0),
                Some(assist) => {
                    let remaining = fuel.deliverable_wh(fuel.remaining_kg) + assist.battery.remaining_wh;
                    let capacity = fuel.deliverable_wh(fuel.capacity_kg) + assist.battery.capacity_wh;
                    (remaining / capacity).clamp(0.0, 1.0)
                }
            },
        }
    }

    /// 予備残量を下回っているか（判定のみ、強制はしない）
    pub fn below_reserve(&self, reserve_fraction: f64) -> bool {
        self.fraction_remaining() <= reserve_fraction
    }

    /// 取り出し可能な残エネルギー [Wh]
    pub fn remaining_energy_wh(&self) -> f64 {
        match self {
            EnergyState::Battery(battery) => battery.remaining_wh,
            EnergyState::Fuel(fuel) => {
                fuel.deliverable_wh(fuel.remaining_kg)
                    + fuel.assist.as_ref().map_or(0.0, |a| a.battery.remaining_wh)
            }
        }
    }

    /// 一定電力での推定航続時間 [s]
    pub fn endurance_at(&self, power_w: f64) -> f64 {
        if power_w <= 0.0 {
            return f64::INFINITY;
        }
        self.remaining_energy_wh() * JOULES_PER_WH / power_w
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EnergyState::Battery(_) => "battery",
            EnergyState::Fuel(fuel) if fuel.assist.is_some() => "hybrid",
            EnergyState::Fuel(_) => "fuel",
        }
    }
}

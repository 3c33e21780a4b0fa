use serde::{Deserialize, Serialize};

/// 重力加速度 [m/s²]
pub const GRAVITY_MPS2: f64 = 9.80665;

/// 地球平均半径 [m]（haversine計算用）
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// 地理座標（緯度・経度・高度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64, // 対地高度
}

impl GeoPosition {
    pub fn new(lat_deg: f64, lon_deg: f64, alt_m: f64) -> Self {
        Self {
            lat_deg,
            lon_deg,
            alt_m: alt_m.max(0.0), // 地表より下は扱わない
        }
    }

    /// 緯度経度が有効範囲内かどうか
    pub fn is_valid(&self) -> bool {
        self.lat_deg.is_finite()
            && self.lon_deg.is_finite()
            && self.alt_m.is_finite()
            && (-90.0..=90.0).contains(&self.lat_deg)
            && (-180.0..=180.0).contains(&self.lon_deg)
    }

    /// 2点間の線形補間（t=0でself、t=1でother）
    ///
    /// 経度差は短い方向（±180度以内）で補間するため、日付変更線を
    /// 跨ぐ区間でも地球を逆回りしません。
    pub fn lerp(&self, other: &GeoPosition, t: f64) -> GeoPosition {
        let t = t.clamp(0.0, 1.0);
        let lon_delta = math_utils::wrap_longitude(other.lon_deg - self.lon_deg);
        GeoPosition::new(
            self.lat_deg + (other.lat_deg - self.lat_deg) * t,
            math_utils::wrap_longitude(self.lon_deg + lon_delta * t),
            self.alt_m + (other.alt_m - self.alt_m) * t,
        )
    }
}

/// UAVの状態を表す列挙型
///
/// `Depleted` と `MissionComplete` は終端状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UavStatus {
    Active,          // 通常飛行
    StealthIngress,  // 脅威圏内の低被探知進入
    Rtb,             // 帰投中
    Depleted,        // エネルギー枯渇
    MissionComplete, // 経路終端に到達
}

impl UavStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UavStatus::Depleted | UavStatus::MissionComplete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UavStatus::Active => "active",
            UavStatus::StealthIngress => "stealth_ingress",
            UavStatus::Rtb => "rtb",
            UavStatus::Depleted => "depleted",
            UavStatus::MissionComplete => "mission_complete",
        }
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    /// 度をラジアンに変換
    pub fn deg_to_rad(degrees: f64) -> f64 {
        degrees * std::f64::consts::PI / 180.0
    }

    /// ラジアンを度に変換
    pub fn rad_to_deg(radians: f64) -> f64 {
        radians * 180.0 / std::f64::consts::PI
    }

    /// 方位角を0度〜360度の範囲に正規化
    pub fn normalize_bearing(angle_deg: f64) -> f64 {
        let normalized = angle_deg.rem_euclid(360.0);
        // rem_euclidは丸めで360.0を返すことがある
        if normalized >= 360.0 { 0.0 } else { normalized }
    }

    /// 経度を (-180, 180] の範囲に折り返す
    ///
    /// 範囲内の値はそのまま返します。
    pub fn wrap_longitude(lon_deg: f64) -> f64 {
        if lon_deg > -180.0 && lon_deg <= 180.0 {
            lon_deg
        } else {
            180.0 - (180.0 - lon_deg).rem_euclid(360.0)
        }
    }

    /// 指定範囲にクランプ
    ///
    /// +∞は上限、NaNと-∞は下限として扱います。
    pub fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
        if value.is_nan() {
            min
        } else {
            value.clamp(min, max)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bearing() {
        assert_eq!(math_utils::normalize_bearing(-90.0), 270.0);
        assert_eq!(math_utils::normalize_bearing(360.0), 0.0);
        assert_eq!(math_utils::normalize_bearing(725.0), 5.0);
    }

    #[test]
    fn test_terminal_status() {
        assert!(UavStatus::Depleted.is_terminal());
        assert!(UavStatus::MissionComplete.is_terminal());
        assert!(!UavStatus::Rtb.is_terminal());
        assert!(!UavStatus::StealthIngress.is_terminal());
    }

    #[test]
    fn test_geo_position_clamps_altitude() {
        let p = GeoPosition::new(35.0, 139.0, -20.0);
        assert_eq!(p.alt_m, 0.0);
        assert!(p.is_valid());
        assert!(!GeoPosition::new(95.0, 0.0, 0.0).is_valid());
    }

    #[test]
    fn test_clamp_finite() {
        assert_eq!(math_utils::clamp_finite(f64::NAN, 0.0, 100.0), 0.0);
        assert_eq!(math_utils::clamp_finite(150.0, 0.0, 100.0), 100.0);
        assert_eq!(math_utils::clamp_finite(f64::INFINITY, 0.0, 100.0), 100.0);
        assert_eq!(math_utils::clamp_finite(f64::NEG_INFINITY, 0.0, 100.0), 0.0);
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(math_utils::wrap_longitude(120.0), 120.0);
        assert_eq!(math_utils::wrap_longitude(-180.0), 180.0);
        assert!((math_utils::wrap_longitude(190.0) + 170.0).abs() < 1e-9);
        assert!((math_utils::wrap_longitude(-359.8) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_lerp_takes_short_way_across_antimeridian() {
        let a = GeoPosition::new(10.0, 179.0, 100.0);
        let b = GeoPosition::new(10.0, -179.0, 100.0);
        let mid = a.lerp(&b, 0.5);
        assert!((mid.lon_deg.abs() - 180.0).abs() < 1e-9);
        let near_end = a.lerp(&b, 0.75);
        assert!((near_end.lon_deg + 179.5).abs() < 1e-9);
        assert!(near_end.is_valid());
    }
}

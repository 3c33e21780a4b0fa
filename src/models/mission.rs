//! # Mission モジュール
//!
//! ウェイポイント経路の幾何計算と、経路上の再生（プレイバック）を提供します。
//!
//! 位置は物理シミュレーションではなく、累積移動距離による経路セグメント上の
//! 線形補間で求めます。距離・方位は大圏（haversine）計算で、出力ログの
//! 再現性のため計算式は固定です。

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::models::common::{EARTH_RADIUS_M, GeoPosition, math_utils};

/// ウェイポイント到達判定の許容距離 [m]
pub const ARRIVAL_EPSILON_M: f64 = 1e-3;

/// ウェイポイント（高度は省略可能）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub alt_m: Option<f64>,
}

impl Waypoint {
    pub fn to_position(&self, default_alt_m: f64) -> GeoPosition {
        GeoPosition::new(self.lat, self.lon, self.alt_m.unwrap_or(default_alt_m))
    }
}

/// 2点間の大圏距離 [m] と初期方位 [deg]
///
/// 同一点の場合は `(0.0, 0.0)` を返します。
pub fn distance_and_heading(a: &GeoPosition, b: &GeoPosition) -> (f64, f64) {
    let phi1 = math_utils::deg_to_rad(a.lat_deg);
    let phi2 = math_utils::deg_to_rad(b.lat_deg);
    let d_phi = phi2 - phi1;
    let d_lambda = math_utils::deg_to_rad(b.lon_deg - a.lon_deg);

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let distance = 2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    let heading = math_utils::normalize_bearing(math_utils::rad_to_deg(y.atan2(x)));

    (distance, heading)
}

/// ミッション経路（構築後は不変）
#[derive(Debug, Clone, PartialEq)]
pub struct MissionPath {
    points: Vec<GeoPosition>,
    cumulative_m: Vec<f64>, // 各点までの累積距離
}

impl MissionPath {
    /// シナリオのウェイポイント列から経路を構築
    ///
    /// 2点未満、または総延長0の経路は `InvalidInput` になります。
    pub fn from_waypoints(waypoints: &[Waypoint], default_alt_m: f64) -> Result<Self> {
        if waypoints.len() < 2 {
            return Err(SimError::invalid(format!(
                "mission path needs at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        let points: Vec<GeoPosition> = waypoints.iter().map(|w| w.to_position(default_alt_m)).collect();
        if let Some(bad) = points.iter().find(|p| !p.is_valid()) {
            return Err(SimError::invalid(format!(
                "waypoint out of range: ({}, {})",
                bad.lat_deg, bad.lon_deg
            )));
        }

        let path = Self::from_points(points);
        if path.total_length_m() <= ARRIVAL_EPSILON_M {
            return Err(SimError::invalid("mission path has zero length"));
        }
        Ok(path)
    }

    /// 2点を直結する経路（帰投用、長さ0も許容）
    pub fn direct(from: GeoPosition, to: GeoPosition) -> Self {
        Self::from_points(vec![from, to])
    }

    fn from_points(points: Vec<GeoPosition>) -> Self {
        let mut cumulative_m = Vec::with_capacity(points.len());
        let mut total = 0.0;
        cumulative_m.push(0.0);
        for pair in points.windows(2) {
            total += distance_and_heading(&pair[0], &pair[1]).0;
            cumulative_m.push(total);
        }
        Self { points, cumulative_m }
    }

    pub fn total_length_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> GeoPosition {
        self.points[0]
    }

    pub fn end(&self) -> GeoPosition {
        self.points[self.points.len() - 1]
    }

    pub fn waypoint(&self, index: usize) -> Option<&GeoPosition> {
        self.points.get(index)
    }

    /// 経路開始点からウェイポイントまでの累積距離
    pub fn distance_to_waypoint(&self, index: usize) -> Option<f64> {
        self.cumulative_m.get(index).copied()
    }

    /// 累積距離に対応するセグメント番号
    fn segment_at(&self, distance_m: f64) -> usize {
        let last_segment = self.points.len().saturating_sub(2);
        (0..=last_segment)
            .find(|&i| distance_m <= self.cumulative_m[i + 1])
            .unwrap_or(last_segment)
    }

    /// 累積距離における位置（線形補間）と終端到達フラグ
    ///
    /// 総延長を超えた距離は最終ウェイポイントにクランプされます。
    pub fn position_at(&self, distance_m: f64) -> (GeoPosition, bool) {
        let total = self.total_length_m();
        if distance_m >= total - ARRIVAL_EPSILON_M {
            return (self.end(), true);
        }
        let distance_m = distance_m.max(0.0);

        let i = self.segment_at(distance_m);
        let segment_length = self.cumulative_m[i + 1] - self.cumulative_m[i];
        let t = if segment_length > 0.0 {
            (distance_m - self.cumulative_m[i]) / segment_length
        } else {
            0.0
        };
        (self.points[i].lerp(&self.points[i + 1], t), false)
    }

    /// 累積距離における進行方位 [deg]
    pub fn heading_at(&self, distance_m: f64) -> f64 {
        let i = self.segment_at(distance_m.clamp(0.0, self.total_length_m()));
        distance_and_heading(&self.points[i], &self.points[i + 1]).1
    }
}

/// 1回の前進処理の結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStep {
    pub moved_m: f64,
    pub reached_waypoint: Option<usize>,
    /// このステップで経路終端に到達したか（一度だけtrue）
    pub completed_now: bool,
}

/// 経路再生カーソル
#[derive(Debug, Clone, PartialEq)]
pub struct Playback {
    path: MissionPath,
    distance_m: f64,
    target_index: usize, // 次に到達するウェイポイント
    position: GeoPosition,
    complete: bool,
}

impl Playback {
    pub fn new(path: MissionPath) -> Self {
        let position = path.start();
        let complete = path.total_length_m() <= ARRIVAL_EPSILON_M;
        let target_index = if complete { path.len() - 1 } else { 1 };
        Self {
            path,
            distance_m: 0.0,
            target_index,
            position,
            complete,
        }
    }

    pub fn path(&self) -> &MissionPath {
        &self.path
    }

    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    pub fn target_index(&self) -> usize {
        self.target_index
    }

    pub fn position(&self) -> GeoPosition {
        self.position
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn heading_deg(&self) -> f64 {
        self.path.heading_at(self.distance_m)
    }

    /// 速度×時間だけ経路上を前進
    pub fn advance(&mut self, dt_s: f64, speed_mps: f64) -> PlaybackStep {
        if self.complete {
            return PlaybackStep {
                moved_m: 0.0,
                reached_waypoint: None,
                completed_now: false,
            };
        }

        let total = self.path.total_length_m();
        let before = self.distance_m;
        self.distance_m = (self.distance_m + speed_mps.max(0.0) * dt_s.max(0.0)).min(total);

        let (position, complete) = self.path.position_at(self.distance_m);
        self.position = position;
        if complete {
            self.distance_m = total;
        }

        let mut reached_waypoint = None;
        while self.target_index < self.path.len() - 1 {
            match self.path.distance_to_waypoint(self.target_index) {
                Some(d) if d - self.distance_m <= ARRIVAL_EPSILON_M => {
                    reached_waypoint = Some(self.target_index);
                    self.target_index += 1;
                }
                _ => break,
            }
        }

        let completed_now = complete && !self.complete;
        if completed_now {
            reached_waypoint = Some(self.path.len() - 1);
        }
        self.complete = complete;

        PlaybackStep {
            moved_m: self.distance_m - before,
            reached_waypoint,
            completed_now,
        }
    }

    /// 新しい経路に付け替える（帰投時）
    pub fn retarget(&mut self, path: MissionPath) {
        *self = Playback::new(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(lat: f64, lon: f64) -> Waypoint {
        Waypoint { lat, lon, alt_m: None }
    }

    /// 子午線上で北へ `meters` 離れた点
    pub(crate) fn north_of(lat: f64, meters: f64) -> f64 {
        lat + math_utils::rad_to_deg(meters / EARTH_RADIUS_M)
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = GeoPosition::new(35.68, 139.76, 0.0);
        assert_eq!(distance_and_heading(&a, &a), (0.0, 0.0));
    }

    #[test]
    fn test_known_distance_and_heading() {
        // 東京→大阪 約 403km、方位 約 255.6度
        let tokyo = GeoPosition::new(35.6812, 139.7671, 0.0);
        let osaka = GeoPosition::new(34.7025, 135.4959, 0.0);
        let (d, h) = distance_and_heading(&tokyo, &osaka);
        assert!((d - 403_000.0).abs() < 3_000.0, "distance {}", d);
        assert!((h - 255.6).abs() < 0.5, "heading {}", h);

        let north = GeoPosition::new(1.0, 0.0, 0.0);
        let origin = GeoPosition::new(0.0, 0.0, 0.0);
        assert!(distance_and_heading(&origin, &north).1.abs() < 1e-9);
        let east = GeoPosition::new(0.0, 1.0, 0.0);
        assert!((distance_and_heading(&origin, &east).1 - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_paths_rejected() {
        assert!(MissionPath::from_waypoints(&[wp(10.0, 10.0)], 100.0).is_err());
        assert!(MissionPath::from_waypoints(&[wp(10.0, 10.0), wp(10.0, 10.0)], 100.0).is_err());
        assert!(MissionPath::from_waypoints(&[wp(95.0, 10.0), wp(10.0, 10.0)], 100.0).is_err());
    }

    #[test]
    fn test_position_interpolation_and_clamp() {
        let path = MissionPath::from_waypoints(
            &[
                Waypoint { lat: 0.0, lon: 0.0, alt_m: Some(100.0) },
                Waypoint { lat: 0.0, lon: 0.01, alt_m: Some(300.0) },
            ],
            0.0,
        )
        .unwrap();
        let total = path.total_length_m();

        let (mid, complete) = path.position_at(total / 2.0);
        assert!(!complete);
        assert!((mid.lon_deg - 0.005).abs() < 1e-9);
        assert!((mid.alt_m - 200.0).abs() < 1e-6);

        let (end, complete) = path.position_at(total * 2.0);
        assert!(complete);
        assert_eq!(end, path.end());
    }

    #[test]
    fn test_path_across_antimeridian_stays_near_it() {
        let path = MissionPath::from_waypoints(&[wp(0.0, 179.9), wp(0.0, -179.9)], 100.0).unwrap();
        let total = path.total_length_m();
        assert!((total - 22_239.0).abs() < 1.0, "total {}", total);

        let (mid, complete) = path.position_at(total / 2.0);
        assert!(!complete);
        assert!((mid.lon_deg.abs() - 180.0).abs() < 1e-6, "midpoint lon {}", mid.lon_deg);

        for i in 0..=20 {
            let (p, _) = path.position_at(total * i as f64 / 20.0);
            assert!(p.is_valid());
            assert!(p.lon_deg.abs() >= 179.9 - 1e-9, "lon {} at step {}", p.lon_deg, i);
        }

        // 東向き（約90度）で進む
        assert!((path.heading_at(total / 4.0) - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_mission_complete_at_exact_tick() {
        // 10,000m を 10m/s、dt=1s → 1000ティックで完了
        let path = MissionPath::from_waypoints(&[wp(0.0, 0.0), wp(north_of(0.0, 10_000.0), 0.0)], 50.0).unwrap();
        assert!((path.total_length_m() - 10_000.0).abs() < 1e-6);

        let mut playback = Playback::new(path);
        let mut completed_at = None;
        for tick in 1..=1_200u32 {
            let step = playback.advance(1.0, 10.0);
            if step.completed_now {
                assert!(completed_at.is_none(), "完了が二度報告された");
                completed_at = Some(tick);
            }
            assert!(playback.distance_m() <= playback.path().total_length_m());
        }
        assert_eq!(completed_at, Some(1000));
        assert!(playback.is_complete());
    }

    #[test]
    fn test_waypoint_index_advances() {
        let path = MissionPath::from_waypoints(
            &[wp(0.0, 0.0), wp(north_of(0.0, 100.0), 0.0), wp(north_of(0.0, 200.0), 0.0)],
            50.0,
        )
        .unwrap();
        let mut playback = Playback::new(path);
        assert_eq!(playback.target_index(), 1);

        let step = playback.advance(10.0, 10.0); // 100m
        assert_eq!(step.reached_waypoint, Some(1));
        assert_eq!(playback.target_index(), 2);
        assert!(!playback.is_complete());

        let step = playback.advance(50.0, 10.0);
        assert!(step.completed_now);
        assert!((step.moved_m - 100.0).abs() < 1e-6);
        assert_eq!(playback.position(), playback.path().end());
    }

    #[test]
    fn test_zero_length_direct_path_completes_immediately() {
        let here = GeoPosition::new(1.0, 1.0, 100.0);
        let mut playback = Playback::new(MissionPath::direct(here, here));
        assert!(playback.is_complete());
        let step = playback.advance(1.0, 10.0);
        assert!(!step.completed_now);
    }
}

use chrono::NaiveTime;

/// Straight line to road distance
pub const ROAD_CORRECTION_FACTOR: f64 = 1.3;

pub const LOCAL_SPEED_KMH: f64 = 40.0;
pub const OUTSTATION_SPEED_KMH: f64 = 60.0;

/// Parking / pickup friction added to every hop
pub const LOCAL_BUFFER_MINUTES: i64 = 10;
pub const OUTSTATION_BUFFER_MINUTES: i64 = 20;

pub const REFRESHMENT_INTERVAL_MINUTES: i64 = 240;
pub const REFRESHMENT_DURATION_MINUTES: i64 = 60;
pub const PARKING_DURATION_MINUTES: i64 = 15;

pub fn default_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

pub fn default_day_end() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).unwrap_or(NaiveTime::MIN)
}

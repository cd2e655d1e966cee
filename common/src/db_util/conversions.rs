//! Checked conversions between rust and sql types.
//! Postgres has no unsigned integers, so ids and points are stored signed.

use super::*;

pub fn i32_to_u32(i: i32) -> Result<u32> {
    u32::try_from(i)
        .map_err(|_| anyhow!("i32 value {i} is negative and cannot be converted to u32"))
}
pub fn u32_to_i32(i: u32) -> Result<i32> {
    i32::try_from(i)
        .map_err(|_| anyhow!("u32 value {i} exceeds i32::MAX and cannot be converted to i32"))
}

pub fn ids_to_i32(ids: &[u32]) -> Result<Vec<i32>> {
    ids.iter().copied().map(u32_to_i32).collect()
}

pub fn optu32_to_opti32(i: Option<u32>) -> Result<Option<i32>> {
    i.map(u32_to_i32).transpose()
}

pub fn deserialize_group(i: &str) -> Result<DriverGroup> {
    i.parse::<DriverGroup>().map_err(|e| anyhow!(e))
}
pub fn serialize_group(i: DriverGroup) -> String {
    i.as_str().to_string()
}

pub fn deserialize_weekly_points(i: Value) -> Result<WeeklyPoints> {
    serde_json::from_value(i).context("Invalid weekly points in standings row")
}
pub fn serialize_weekly_points(i: &WeeklyPoints) -> Result<Value> {
    serde_json::to_value(i).context("Could not serialize weekly points")
}

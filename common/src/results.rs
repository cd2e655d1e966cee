//! Match uploaded result rows to the drivers of a season.

use crate::{DriverRecord, MAX_FINISHING_POSITION, MAX_RESULT_POINTS, ResultRow};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultsRejection {
    #[error("Driver number {0} appears more than once in the upload")]
    DuplicateDriverNumber(String),
    #[error("Driver number {number} has an invalid finishing position of {position}")]
    InvalidPosition { number: String, position: u32 },
    #[error(
        "Driver number {number} scored {points} points (at most {max} allowed)",
        max = MAX_RESULT_POINTS
    )]
    PointsOutOfRange { number: String, points: u32 },
}

/// A result row resolved to a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedResult {
    pub driver_id: u32,
    pub position: u32,
    pub points: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMatch {
    pub matched: Vec<MatchedResult>,
    /// Driver numbers with no driver in the season, in upload order.
    pub unmatched: Vec<String>,
}

fn normalize_number(number: &str) -> &str {
    number.trim().trim_start_matches('#')
}

/// Resolve each row by exact car number among `season_drivers`.
///
/// The driver name in a row is only a hint for the person uploading; a row
/// whose name disagrees with the matched driver is still accepted, with a
/// warning. Rows without a matching number are skipped and reported.
///
/// # Errors
/// Rejects the whole upload if a number appears twice, a position is 0 or
/// above [`MAX_FINISHING_POSITION`], or points are above [`MAX_RESULT_POINTS`].
pub fn match_results(
    season_drivers: &[DriverRecord],
    rows: &[ResultRow],
) -> Result<ResultMatch, ResultsRejection> {
    let by_number: HashMap<&str, &DriverRecord> = season_drivers
        .iter()
        .map(|driver| (normalize_number(&driver.number), driver))
        .collect();

    let mut seen = HashSet::new();
    let mut outcome = ResultMatch::default();
    for row in rows {
        let number = normalize_number(&row.driver_number);
        if !seen.insert(number) {
            return Err(ResultsRejection::DuplicateDriverNumber(number.to_string()));
        }
        if row.position == 0 || row.position > MAX_FINISHING_POSITION {
            return Err(ResultsRejection::InvalidPosition {
                number: number.to_string(),
                position: row.position,
            });
        }
        if row.points > MAX_RESULT_POINTS {
            return Err(ResultsRejection::PointsOutOfRange {
                number: number.to_string(),
                points: row.points,
            });
        }

        let Some(driver) = by_number.get(number) else {
            log::warn!("No driver with number {number} this season, skipping result row");
            outcome.unmatched.push(number.to_string());
            continue;
        };

        if let Some(name) = row.driver_name.as_deref()
            && !name.trim().is_empty()
            && !driver.name.eq_ignore_ascii_case(name.trim())
        {
            log::warn!(
                "Result row for #{number} names {name:?} but the driver is {:?}",
                driver.name
            );
        }

        outcome.matched.push(MatchedResult {
            driver_id: driver.driver_id,
            position: row.position,
            points: row.points,
        });
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DriverGroup;

    fn drivers() -> Vec<DriverRecord> {
        [
            (1, "Kyle Larson", "5", DriverGroup::A),
            (2, "Kyle Busch", "8", DriverGroup::A),
            (3, "Ross Chastain", "1", DriverGroup::B),
            (4, "Bubba Wallace", "23", DriverGroup::B),
        ]
        .into_iter()
        .map(|(driver_id, name, number, group)| DriverRecord {
            driver_id,
            name: name.to_string(),
            number: number.to_string(),
            group,
            season: 2024,
            active: true,
        })
        .collect()
    }

    fn row(number: &str, name: Option<&str>, position: u32, points: u32) -> ResultRow {
        ResultRow {
            driver_number: number.to_string(),
            driver_name: name.map(str::to_string),
            position,
            points,
        }
    }

    #[test_log::test]
    fn test_match_by_exact_number() {
        let rows = vec![
            row("5", Some("Kyle Larson"), 1, 40),
            row("1", None, 2, 35),
            row(" #23 ", Some("Bubba Wallace"), 3, 34),
        ];
        let outcome = match_results(&drivers(), &rows).unwrap();
        assert_eq!(
            outcome.matched,
            vec![
                MatchedResult {
                    driver_id: 1,
                    position: 1,
                    points: 40
                },
                MatchedResult {
                    driver_id: 3,
                    position: 2,
                    points: 35
                },
                MatchedResult {
                    driver_id: 4,
                    position: 3,
                    points: 34
                },
            ]
        );
        assert!(outcome.unmatched.is_empty());
    }

    #[test_log::test]
    fn test_name_is_not_used_for_matching() {
        // "Kyle" would have matched two drivers by substring, and "51" contains "5"
        let rows = vec![row("51", Some("Kyle"), 4, 33), row("8", Some("Kyle"), 5, 32)];
        let outcome = match_results(&drivers(), &rows).unwrap();
        assert_eq!(
            outcome.matched,
            vec![MatchedResult {
                driver_id: 2,
                position: 5,
                points: 32
            }]
        );
        assert_eq!(outcome.unmatched, vec!["51".to_string()]);
    }

    #[test]
    fn test_duplicate_numbers_rejected() {
        let rows = vec![row("5", None, 1, 40), row("#5", None, 2, 35)];
        assert_eq!(
            match_results(&drivers(), &rows),
            Err(ResultsRejection::DuplicateDriverNumber("5".to_string()))
        );
    }

    #[test]
    fn test_zero_position_rejected() {
        let rows = vec![row("8", None, 0, 40)];
        assert_eq!(
            match_results(&drivers(), &rows),
            Err(ResultsRejection::InvalidPosition {
                number: "8".to_string(),
                position: 0
            })
        );
    }

    #[test]
    fn test_position_out_of_range_rejected() {
        let rows = vec![row("8", None, MAX_FINISHING_POSITION + 1, 40)];
        assert!(matches!(
            match_results(&drivers(), &rows),
            Err(ResultsRejection::InvalidPosition { .. })
        ));
    }

    #[test]
    fn test_points_above_cap_rejected() {
        let rows = vec![
            row("5", None, 1, MAX_RESULT_POINTS),
            row("8", None, 2, i32::MAX.unsigned_abs() + 1),
        ];
        assert_eq!(
            match_results(&drivers(), &rows),
            Err(ResultsRejection::PointsOutOfRange {
                number: "8".to_string(),
                points: 2_147_483_648
            })
        );

        // the cap itself is accepted
        let rows = vec![row("5", None, 1, MAX_RESULT_POINTS)];
        let outcome = match_results(&drivers(), &rows).unwrap();
        assert_eq!(outcome.matched[0].points, MAX_RESULT_POINTS);
    }

    #[test]
    fn test_empty_upload() {
        assert_eq!(match_results(&drivers(), &[]), Ok(ResultMatch::default()));
    }
}

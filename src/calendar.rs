// src/calendar.rs
//! UTC day bucketing for block timestamps.

pub const SECONDS_PER_DAY: u64 = 86_400;

const DAYS_IN_YEAR: u64 = 365;
const DAYS_IN_LEAP_YEAR: u64 = 366;

/// Days since the Unix epoch, floored.
pub fn day_index(timestamp: u64) -> u64 {
    timestamp / SECONDS_PER_DAY
}

pub fn is_leap_year(year: u64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn seconds_in_year(year: u64) -> u64 {
    let days = if is_leap_year(year) { DAYS_IN_LEAP_YEAR } else { DAYS_IN_YEAR };
    days * SECONDS_PER_DAY
}

/// Format a Unix timestamp as `YYYY-MM-DD` (proleptic Gregorian, UTC).
pub fn date_string(timestamp: u64) -> String {
    let mut remaining = timestamp;

    let mut year = 1970;
    while remaining >= seconds_in_year(year) {
        remaining -= seconds_in_year(year);
        year += 1;
    }

    let mut days_in_month = [31u64, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if is_leap_year(year) {
        days_in_month[1] = 29;
    }

    // remaining < one year here, so the scan stops before running off December
    let mut month = 0;
    while remaining >= days_in_month[month] * SECONDS_PER_DAY {
        remaining -= days_in_month[month] * SECONDS_PER_DAY;
        month += 1;
    }

    let day = 1 + remaining / SECONDS_PER_DAY;

    format!("{year}-{:02}-{:02}", month + 1, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn ts(date: &str) -> u64 {
        let dt = DateTime::parse_from_rfc3339(&format!("{date}T00:00:00Z")).unwrap();
        dt.timestamp() as u64
    }

    #[test]
    fn epoch_is_first_day() {
        assert_eq!(date_string(0), "1970-01-01");
        assert_eq!(date_string(SECONDS_PER_DAY - 1), "1970-01-01");
        assert_eq!(date_string(SECONDS_PER_DAY), "1970-01-02");
        assert_eq!(day_index(SECONDS_PER_DAY - 1), 0);
        assert_eq!(day_index(SECONDS_PER_DAY), 1);
    }

    #[test]
    fn leap_day_only_in_leap_years() {
        assert_eq!(date_string(ts("2024-02-29")), "2024-02-29");
        assert_eq!(date_string(ts("2024-02-29") + 86_399), "2024-02-29");
        assert_eq!(date_string(ts("2024-03-01")), "2024-03-01");
        // 2023-02-28 + 1 day rolls straight into March
        assert_eq!(date_string(ts("2023-02-28") + SECONDS_PER_DAY), "2023-03-01");
        assert_eq!(date_string(ts("2000-02-29")), "2000-02-29");
    }

    #[test]
    fn century_rule() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2100));
        assert!(!is_leap_year(2023));
        assert_eq!(date_string(ts("2100-03-01") - 1), "2100-02-28");
    }

    #[test]
    fn year_boundaries() {
        assert_eq!(date_string(ts("2023-12-31") + 86_399), "2023-12-31");
        assert_eq!(date_string(ts("2024-01-01")), "2024-01-01");
        assert_eq!(date_string(ts("2024-12-31")), "2024-12-31");
    }

    #[test]
    fn matches_chrono_over_ten_years() {
        // every day from 2019 through 2028, probed at several offsets within the day
        let start = ts("2019-01-01");
        let end = ts("2029-01-01");
        let offsets = [0, 1, 3_600, 43_200, SECONDS_PER_DAY - 1];

        let mut day_start = start;
        while day_start < end {
            for offset in offsets {
                let t = day_start + offset;
                let expected = DateTime::from_timestamp(t as i64, 0)
                    .unwrap()
                    .format("%Y-%m-%d")
                    .to_string();
                assert_eq!(date_string(t), expected, "timestamp {t}");
                assert_eq!(day_index(t), day_start / SECONDS_PER_DAY);
            }
            day_start += SECONDS_PER_DAY;
        }
    }

    #[test]
    fn matches_chrono_from_epoch() {
        let mut t = 0u64;
        while t < 10 * 366 * SECONDS_PER_DAY {
            let expected = DateTime::from_timestamp(t as i64, 0)
                .unwrap()
                .format("%Y-%m-%d")
                .to_string();
            assert_eq!(date_string(t), expected, "timestamp {t}");
            t += 7_919;
        }
    }
}

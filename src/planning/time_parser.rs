use chrono::{Duration, NaiveDateTime};

use crate::error::ParseError;

/// Resolve a wall-clock end time such as `"5:30 PM"` or `"17:30"` into the next
/// matching timestamp after `now`.
///
/// Markers are case-insensitive. Seconds are zeroed, and a time that is not
/// strictly after `now` rolls over to the same time tomorrow.
pub fn parse_end_time(input: &str, now: NaiveDateTime) -> Result<NaiveDateTime, ParseError> {
    let upper = input.to_uppercase();
    let is_pm = upper.contains("PM");
    let is_am = upper.contains("AM");

    let clock = upper.replace("PM", "").replace("AM", "");
    let clock = clock.trim();
    if clock.is_empty() {
        return Err(ParseError::Empty);
    }

    let (hour_part, minute_part) = clock
        .split_once(':')
        .ok_or_else(|| ParseError::MissingColon(input.trim().to_string()))?;

    let mut hour = parse_component(hour_part)?;
    let minute = parse_component(minute_part)?;

    if is_pm && hour != 12 {
        hour += 12;
    } else if is_am && hour == 12 {
        hour = 0;
    }

    if hour > 23 {
        return Err(ParseError::HourOutOfRange(hour));
    }
    if minute >= 60 {
        return Err(ParseError::MinuteOutOfRange(minute));
    }

    let end = now
        .date()
        .and_hms_opt(hour, minute, 0)
        .ok_or(ParseError::HourOutOfRange(hour))?;

    if end <= now {
        Ok(end + Duration::days(1))
    } else {
        Ok(end)
    }
}

fn parse_component(raw: &str) -> Result<u32, ParseError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<u32>()
        .map_err(|_| ParseError::NotNumeric(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 14)
            .unwrap()
            .and_hms_milli_opt(hour, minute, second, 250)
            .unwrap()
    }

    #[test]
    fn test_pm_adds_twelve_hours() {
        let end = parse_end_time("5:30 PM", at(9, 0, 0)).unwrap();
        assert_eq!(end, at(17, 30, 0).with_nanosecond(0).unwrap());
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        let now = at(9, 0, 0);
        assert_eq!(
            parse_end_time("5:30 pm", now).unwrap(),
            parse_end_time("5:30PM", now).unwrap()
        );
    }

    #[test]
    fn test_twelve_pm_stays_noon() {
        let end = parse_end_time("12:15 PM", at(8, 0, 0)).unwrap();
        assert_eq!((end.hour(), end.minute()), (12, 15));
        assert_eq!(end.date(), at(8, 0, 0).date());
    }

    #[test]
    fn test_twelve_am_is_midnight_tomorrow() {
        let now = at(10, 0, 0);
        let end = parse_end_time("12:00 AM", now).unwrap();
        assert_eq!((end.hour(), end.minute(), end.second()), (0, 0, 0));
        assert_eq!(end.date(), now.date().succ_opt().unwrap());
    }

    #[test]
    fn test_twenty_four_hour_without_marker() {
        let end = parse_end_time("17:05", at(9, 0, 0)).unwrap();
        assert_eq!((end.hour(), end.minute()), (17, 5));
    }

    #[test]
    fn test_past_time_rolls_to_tomorrow() {
        let now = at(18, 0, 0);
        let end = parse_end_time("9:00 AM", now).unwrap();
        assert_eq!(end.date(), now.date().succ_opt().unwrap());
        assert_eq!(end.hour(), 9);
    }

    #[test]
    fn test_same_minute_rolls_to_tomorrow() {
        // now is 14:30:00.250; 14:30:00 is not in the future
        let now = at(14, 30, 0);
        let end = parse_end_time("2:30 PM", now).unwrap();
        assert_eq!(end.date(), now.date().succ_opt().unwrap());
    }

    #[test]
    fn test_seconds_are_zeroed() {
        let end = parse_end_time("23:59", at(1, 2, 3)).unwrap();
        assert_eq!(end.second(), 0);
        assert_eq!(end.nanosecond(), 0);
    }

    #[test]
    fn test_hour_overflow_after_pm_is_rejected() {
        assert_eq!(
            parse_end_time("13:00 PM", at(9, 0, 0)),
            Err(ParseError::HourOutOfRange(25))
        );
        assert_eq!(
            parse_end_time("24:00", at(9, 0, 0)),
            Err(ParseError::HourOutOfRange(24))
        );
    }

    #[test]
    fn test_malformed_inputs() {
        let now = at(9, 0, 0);
        assert_eq!(parse_end_time("", now), Err(ParseError::Empty));
        assert_eq!(parse_end_time(" pm ", now), Err(ParseError::Empty));
        assert!(matches!(
            parse_end_time("530 PM", now),
            Err(ParseError::MissingColon(_))
        ));
        assert!(matches!(
            parse_end_time("ab:30", now),
            Err(ParseError::NotNumeric(_))
        ));
        assert!(matches!(
            parse_end_time("-1:30", now),
            Err(ParseError::NotNumeric(_))
        ));
        assert!(matches!(
            parse_end_time("10:30:15", now),
            Err(ParseError::NotNumeric(_))
        ));
        assert_eq!(
            parse_end_time("10:60", now),
            Err(ParseError::MinuteOutOfRange(60))
        );
    }

    #[test]
    fn test_twelve_hour_inputs_always_land_in_the_future() {
        let nows = [at(0, 0, 0), at(11, 59, 59), at(12, 0, 0), at(23, 59, 59), at(7, 45, 30)];
        for now in nows {
            for hour in 1..=12 {
                for minute in [0, 1, 29, 30, 59] {
                    for marker in ["AM", "PM"] {
                        let input = format!("{hour}:{minute:02} {marker}");
                        let end = parse_end_time(&input, now).unwrap();
                        assert!(end > now, "{input} resolved to {end} at {now}");
                        assert!(end - now <= Duration::days(1), "{input} too far out");
                    }
                }
            }
        }
    }
}

/// Human-readable time left in a fast.
///
/// Under an hour it is rounded to the nearest minute (`"6 minutes"`),
/// otherwise whole hours plus the minute remainder (`"1h 36m"`, `"2 hours"`).
pub fn format_remaining(hours: f64) -> String {
    let hours = hours.max(0.0);

    if hours < 1.0 {
        let minutes = (hours * 60.0).round() as u64;
        return plural(minutes, "minute");
    }

    let total_minutes = (hours * 60.0).round() as u64;
    let (whole_hours, minutes) = (total_minutes / 60, total_minutes % 60);
    if minutes == 0 {
        plural(whole_hours, "hour")
    } else {
        format!("{whole_hours}h {minutes}m")
    }
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1.6, "1h 36m")]
    #[case(0.1, "6 minutes")]
    #[case(1.0 / 60.0, "1 minute")]
    #[case(0.0, "0 minutes")]
    #[case(2.0, "2 hours")]
    #[case(1.0, "1 hour")]
    #[case(3.25, "3h 15m")]
    #[case(-0.5, "0 minutes")]
    fn formats_remaining_time(#[case] hours: f64, #[case] expected: &str) {
        assert_eq!(format_remaining(hours), expected);
    }
}

use super::schema::GradebookField;

pub const FINAL_GRADE_WEIGHTS: [(GradebookField, f64); 3] = [
    (GradebookField::Assignment1, 0.3),
    (GradebookField::Quiz1, 0.3),
    (GradebookField::Exam1, 0.4),
];

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Weighted final grade, rounded to 2 decimal places.
pub fn final_grade(assignment: f64, quiz: f64, exam: f64) -> f64 {
    let [(_, w_assignment), (_, w_quiz), (_, w_exam)] = FINAL_GRADE_WEIGHTS;
    round_to_cents(w_assignment * assignment + w_quiz * quiz + w_exam * exam)
}

/// `total_classes` must be positive; configuration loading guarantees it.
pub fn attendance_percentage(attended: f64, total_classes: u32) -> f64 {
    round_to_cents(attended / f64::from(total_classes) * 100.0)
}

/// Parses a cell value as a finite number. Surrounding whitespace is ignored.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Formats with at least one fractional digit, so whole values read `79.0` rather than `79`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_grade_weights() {
        assert_eq!(final_grade(80.0, 90.0, 70.0), 79.0);
        assert_eq!(final_grade(100.0, 100.0, 100.0), 100.0);
        assert_eq!(final_grade(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_final_grade_is_rounded() {
        // 0.3 * 85 + 0.3 * 77 + 0.4 * 91.3 = 85.12
        assert_eq!(final_grade(85.0, 77.0, 91.3), 85.12);
        // 0.3 * 33 + 0.3 * 67 + 0.4 * 66.67 = 56.668
        assert_eq!(final_grade(33.0, 67.0, 66.67), 56.67);
    }

    #[test]
    fn test_attendance_percentage() {
        assert_eq!(attendance_percentage(8.0, 10), 80.0);
        assert_eq!(attendance_percentage(0.0, 10), 0.0);
        assert_eq!(attendance_percentage(2.0, 3), 66.67);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("80"), Some(80.0));
        assert_eq!(parse_number(" 72.5 "), Some(72.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("eighty"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(79.0), "79.0");
        assert_eq!(format_number(80.0), "80.0");
        assert_eq!(format_number(66.67), "66.67");
        assert_eq!(format_number(0.0), "0.0");
    }
}

//! Derived artifact and post title naming
//!
//! Filenames are path-safe: ASCII alphanumerics survive lowercased, every
//! other character folds to an underscore. Display titles keep the
//! submitted casing.

use chrono::NaiveDate;

/// Fixed suffix appended to every post title
pub const POST_TITLE_SUFFIX: &str = "SUNDAY SERVICE";

/// Fold a title into the path-safe `[a-z0-9_]` alphabet. Idempotent.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Derived artifact filename: `{YYYY-MM-DD}_{sanitized_title}.mp3`
pub fn derived_filename(date: NaiveDate, title: &str) -> String {
    format!("{}_{}.mp3", date.format("%Y-%m-%d"), sanitize_title(title))
}

/// Human-readable post title: `{MM/DD/YYYY} | {title} | {suffix}`
pub fn display_title(date: NaiveDate, title: &str) -> String {
    format!(
        "{} | {} | {}",
        date.format("%m/%d/%Y"),
        title,
        POST_TITLE_SUFFIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn easter_service_example() {
        let d = date(2024, 3, 10);
        assert_eq!(
            derived_filename(d, "Easter Service!"),
            "2024-03-10_easter_service_.mp3"
        );
        assert_eq!(
            display_title(d, "Easter Service!"),
            "03/10/2024 | Easter Service! | SUNDAY SERVICE"
        );
    }

    #[test]
    fn sanitization_is_idempotent() {
        for title in ["Easter Service!", "über & MORE", "already_clean_1", "  "] {
            let once = sanitize_title(title);
            assert_eq!(sanitize_title(&once), once);
        }
    }

    #[test]
    fn sanitized_output_alphabet_is_lowercase_alnum_and_underscore() {
        let out = sanitize_title("Mid-Week Prayer (5/7) — évening");
        assert!(out
            .chars()
            .all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn non_ascii_folds_to_separator() {
        assert_eq!(sanitize_title("café"), "caf_");
    }

    #[test]
    fn display_title_preserves_casing() {
        let d = date(2025, 12, 25);
        assert_eq!(
            display_title(d, "CHRISTMAS eve"),
            "12/25/2025 | CHRISTMAS eve | SUNDAY SERVICE"
        );
    }
}

//! Minimal handling of VTIMEZONE text.
//!
//! The cache never interprets offset rules; it only needs to find the TZID
//! of a definition and to wrap bare VTIMEZONE fragments into a VCALENDAR.

/// PRODID written into calendars this crate assembles.
pub const PRODID: &str = "-//TZCache//tzcache//EN";

/// Returns the value of the first `TZID` property in `text`.
///
/// Folded lines are not unfolded; TZID values are short in practice.
#[must_use]
pub fn extract_tzid(text: &str) -> Option<&str> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .find_map(|line| {
            let rest = line.strip_prefix("TZID")?;
            let value = match rest.as_bytes().first() {
                Some(b':') => &rest[1..],
                Some(b';') => &rest[rest.find(':')? + 1..],
                _ => return None,
            };
            let value = value.trim();
            (!value.is_empty()).then_some(value)
        })
}

/// Wraps a VTIMEZONE fragment into a complete VCALENDAR.
///
/// Text that already is a VCALENDAR is returned unchanged.
#[must_use]
pub fn wrap_vtimezone(fragment: &str) -> String {
    let trimmed = fragment.trim();
    if trimmed.starts_with("BEGIN:VCALENDAR") {
        return fragment.to_string();
    }

    let mut calendar = String::with_capacity(trimmed.len() + 96);
    calendar.push_str("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:");
    calendar.push_str(PRODID);
    calendar.push_str("\r\n");
    for line in trimmed.lines() {
        calendar.push_str(line.trim_end_matches('\r'));
        calendar.push_str("\r\n");
    }
    calendar.push_str("END:VCALENDAR\r\n");
    calendar
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = "BEGIN:VTIMEZONE\nTZID:Europe/Paris\nEND:VTIMEZONE\n";

    #[test]
    fn extracts_plain_and_parameterised_tzid() {
        assert_eq!(extract_tzid(FRAGMENT), Some("Europe/Paris"));
        assert_eq!(
            extract_tzid("BEGIN:VTIMEZONE\r\nTZID;X-LIC-LOCATION=Paris:Europe/Paris\r\n"),
            Some("Europe/Paris")
        );
        assert_eq!(extract_tzid("TZOFFSETFROM:+0100\n"), None);
        assert_eq!(extract_tzid("TZID:\n"), None);
    }

    #[test]
    fn wraps_fragment_once() {
        let wrapped = wrap_vtimezone(FRAGMENT);
        assert!(wrapped.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(wrapped.contains("TZID:Europe/Paris\r\n"));
        assert!(wrapped.ends_with("END:VCALENDAR\r\n"));
        assert_eq!(wrap_vtimezone(&wrapped), wrapped);
    }
}

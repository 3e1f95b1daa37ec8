use regex::Regex;

/// Convert a textual duration into decimal hours.
///
/// Accepts plain decimals (`"7.5"`), unit forms (`"8h30m"`, `"8 hrs"`,
/// `"45 min"`) and clock forms (`"8:30"`).
pub fn parse_hours(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(v) = text.parse::<f64>() {
        return Some(v);
    }

    parse_units(text)
        .or_else(|| parse_hours_bare_minutes(text))
        .or_else(|| parse_clock(text))
}

fn parse_units(text: &str) -> Option<f64> {
    let re = Regex::new(
        r"(?i)^(?:(\d+(?:\.\d+)?)\s*h(?:ours?|rs?)?)?\s*(?:(\d+(?:\.\d+)?)\s*m(?:in(?:ute)?s?)?)?$",
    )
    .ok()?;
    let cap = re.captures(text)?;
    let hours = cap.get(1).map(|m| m.as_str().parse::<f64>());
    let minutes = cap.get(2).map(|m| m.as_str().parse::<f64>());

    match (hours, minutes) {
        (None, None) => None,
        (h, m) => {
            let h = h.transpose().ok()?.unwrap_or(0.0);
            let m = m.transpose().ok()?.unwrap_or(0.0);
            Some(h + m / 60.0)
        }
    }
}

/// `8h30`: minutes after an hours unit may drop their own unit.
fn parse_hours_bare_minutes(text: &str) -> Option<f64> {
    let re = Regex::new(r"(?i)^(\d+)\s*h(?:ours?|rs?)?\s*([0-5]?\d)$").ok()?;
    let cap = re.captures(text)?;
    let h: f64 = cap[1].parse().ok()?;
    let m: f64 = cap[2].parse().ok()?;
    Some(h + m / 60.0)
}

fn parse_clock(text: &str) -> Option<f64> {
    let re = Regex::new(r"^(\d{1,3}):([0-5]\d)$").ok()?;
    let cap = re.captures(text)?;
    let h: f64 = cap[1].parse().ok()?;
    let m: f64 = cap[2].parse().ok()?;
    Some(h + m / 60.0)
}

use std::sync::LazyLock;

use regex::Regex;

static HEIGHT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)'\s*([0-9]+)").unwrap());
static WEIGHT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)").unwrap());

const CM_PER_INCH: f64 = 2.54;
const KG_PER_LB: f64 = 0.453592;

/// `5' 11"` → 180.3. Anything not starting with feet'inches is `None`.
pub fn parse_height_cm(text: &str) -> Option<f64> {
    let caps = HEIGHT_RE.captures(text)?;
    let feet: f64 = caps[1].parse().ok()?;
    let inches: f64 = caps[2].parse().ok()?;
    Some(round1((feet * 12.0 + inches) * CM_PER_INCH))
}

/// `185 lbs.` → 83.9. Needs a leading integer.
pub fn parse_weight_kg(text: &str) -> Option<f64> {
    let caps = WEIGHT_RE.captures(text)?;
    let lbs: f64 = caps[1].parse().ok()?;
    Some(round1(lbs * KG_PER_LB))
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

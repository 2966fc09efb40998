// ── Value formatting ──
//
// Maps a raw data-point value to a typed display value. Never fails:
// anything that does not parse is shown as the raw text.

use std::fmt;

use serde::Serialize;

/// Canonical boolean tokens the controllers emit.
const TRUE_TOKEN: &str = "True";
const FALSE_TOKEN: &str = "False";

/// How a data point should be shown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DisplayValue {
    /// Single ON/OFF indicator.
    Indicator(bool),
    /// Indexed ON/OFF indicators, in array order.
    Bits(Vec<Bit>),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bit {
    pub index: usize,
    pub on: bool,
}

/// Format `raw` for display. `field` is accepted so callers can pass the
/// data-point name through; formatting is driven by the value alone.
pub fn format_value(_field: &str, raw: &serde_json::Value) -> DisplayValue {
    match raw {
        serde_json::Value::String(s) => format_text(s),
        serde_json::Value::Bool(b) => DisplayValue::Indicator(*b),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => DisplayValue::Number(f),
            _ => DisplayValue::Text(n.to_string()),
        },
        serde_json::Value::Array(items) => {
            bool_bits(items).unwrap_or_else(|| DisplayValue::Text(raw.to_string()))
        }
        other => DisplayValue::Text(other.to_string()),
    }
}

fn format_text(s: &str) -> DisplayValue {
    if s == TRUE_TOKEN {
        return DisplayValue::Indicator(true);
    }
    if s == FALSE_TOKEN {
        return DisplayValue::Indicator(false);
    }
    if s.starts_with('[') {
        return parse_bool_array(s)
            .and_then(|items| bool_bits(&items))
            .unwrap_or_else(|| DisplayValue::Text(s.to_owned()));
    }
    match s.trim().parse::<f64>() {
        Ok(f) if f.is_finite() => DisplayValue::Number(f),
        _ => DisplayValue::Text(s.to_owned()),
    }
}

/// Parse `[True, False]`-style text, tolerating single quotes.
fn parse_bool_array(s: &str) -> Option<Vec<serde_json::Value>> {
    // Quoted tokens first, or the quote swap would turn them into strings.
    let normalized = s
        .replace("'True'", "true")
        .replace("'False'", "false")
        .replace("\"True\"", "true")
        .replace("\"False\"", "false")
        .replace('\'', "\"")
        .replace(TRUE_TOKEN, "true")
        .replace(FALSE_TOKEN, "false");
    serde_json::from_str(&normalized).ok()
}

/// Non-empty, all-boolean arrays become bits; anything else is rejected.
fn bool_bits(items: &[serde_json::Value]) -> Option<DisplayValue> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .enumerate()
        .map(|(index, v)| v.as_bool().map(|on| Bit { index, on }))
        .collect::<Option<Vec<_>>>()
        .map(DisplayValue::Bits)
}

/// Switch position of a two-element switch encoding: on means element 0
/// set and element 1 clear. `None` if `raw` is not such an encoding.
pub fn switch_is_on(raw: &serde_json::Value) -> Option<bool> {
    match format_value("", raw) {
        DisplayValue::Bits(bits) if bits.len() == 2 => Some(bits[0].on && !bits[1].on),
        _ => None,
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Indicator(on) => f.write_str(on_off(*on)),
            Self::Bits(bits) => {
                for (i, bit) in bits.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "[{}] {}", bit.index, on_off(bit.on))?;
                }
                Ok(())
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fmt(raw: serde_json::Value) -> DisplayValue {
        format_value("field", &raw)
    }

    #[test]
    fn canonical_tokens_are_indicators() {
        assert_eq!(fmt(json!("True")), DisplayValue::Indicator(true));
        assert_eq!(fmt(json!("False")), DisplayValue::Indicator(false));
        assert_eq!(fmt(json!(true)), DisplayValue::Indicator(true));
    }

    #[test]
    fn lowercase_true_is_just_text() {
        assert_eq!(fmt(json!("true")), DisplayValue::Text("true".into()));
    }

    #[test]
    fn bracketed_array_becomes_indexed_bits() {
        let DisplayValue::Bits(bits) = fmt(json!("[True, False, True]")) else {
            panic!("expected bits");
        };
        let got: Vec<(usize, bool)> = bits.iter().map(|b| (b.index, b.on)).collect();
        assert_eq!(got, [(0, true), (1, false), (2, true)]);
    }

    #[test]
    fn single_quoted_literals_are_tolerated() {
        let DisplayValue::Bits(bits) = fmt(json!("['True', 'False']")) else {
            panic!("expected bits");
        };
        let got: Vec<(usize, bool)> = bits.iter().map(|b| (b.index, b.on)).collect();
        assert_eq!(got, [(0, true), (1, false)]);
        assert_eq!(switch_is_on(&json!("['True', 'False']")), Some(true));
    }

    #[test]
    fn double_quoted_literals_are_tolerated() {
        assert!(matches!(fmt(json!(r#"["False", "True"]"#)), DisplayValue::Bits(_)));
        assert_eq!(switch_is_on(&json!(r#"["False", "True"]"#)), Some(false));
    }

    #[test]
    fn quoted_non_tokens_stay_text() {
        assert_eq!(fmt(json!("['yes', 'no']")), DisplayValue::Text("['yes', 'no']".into()));
    }

    #[test]
    fn broken_bracket_falls_back_to_text() {
        assert_eq!(fmt(json!("not-json[")), DisplayValue::Text("not-json[".into()));
        assert_eq!(fmt(json!("[True, oops")), DisplayValue::Text("[True, oops".into()));
        assert_eq!(fmt(json!("[1, 2]")), DisplayValue::Text("[1, 2]".into()));
        assert_eq!(fmt(json!("[]")), DisplayValue::Text("[]".into()));
    }

    #[test]
    fn numbers_render_as_numbers() {
        assert_eq!(fmt(json!("231.4")), DisplayValue::Number(231.4));
        assert_eq!(fmt(json!(50)), DisplayValue::Number(50.0));
        assert_eq!(fmt(json!("-0.98")), DisplayValue::Number(-0.98));
    }

    #[test]
    fn non_finite_numbers_are_text() {
        assert_eq!(fmt(json!("NaN")), DisplayValue::Text("NaN".into()));
        assert_eq!(fmt(json!("inf")), DisplayValue::Text("inf".into()));
    }

    #[test]
    fn other_values_are_verbatim() {
        assert_eq!(fmt(json!("Running")), DisplayValue::Text("Running".into()));
        assert_eq!(fmt(json!(null)), DisplayValue::Text("null".into()));
    }

    #[test]
    fn switch_on_means_first_set_second_clear() {
        assert_eq!(switch_is_on(&json!("[True, False]")), Some(true));
        assert_eq!(switch_is_on(&json!("[False, True]")), Some(false));
        assert_eq!(switch_is_on(&json!("[True, True]")), Some(false));
        assert_eq!(switch_is_on(&json!([true, false])), Some(true));
        assert_eq!(switch_is_on(&json!("True")), None);
        assert_eq!(switch_is_on(&json!("[True, False, True]")), None);
    }

    #[test]
    fn display_renders_on_off() {
        assert_eq!(fmt(json!("[True, False]")).to_string(), "[0] ON [1] OFF");
        assert_eq!(fmt(json!("False")).to_string(), "OFF");
        assert_eq!(fmt(json!("12.5")).to_string(), "12.5");
    }
}

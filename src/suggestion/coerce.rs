//! Turn a model's free-form JSON reply into bounded, typed suggestion fields.
//! Values that do not parse are dropped rather than failing the whole reply.

use chrono::Datelike;
use serde_json::{Map, Value};

use super::{VehicleSuggestion, VisionError};
use crate::models::{ListingCondition, VehicleType};

/// First year a production automobile existed.
const MIN_YEAR: i32 = 1886;

pub fn parse_reply(reply: &str) -> Result<VehicleSuggestion, VisionError> {
    let json = extract_object(reply)
        .ok_or_else(|| VisionError::Malformed("no JSON object in reply".to_string()))?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| VisionError::Malformed(format!("invalid JSON: {e}")))?;
    let obj = value
        .as_object()
        .ok_or_else(|| VisionError::Malformed("reply is not an object".to_string()))?;

    let suggestion = VehicleSuggestion {
        brand: text(obj, &["brand", "make"]),
        model: text(obj, &["model"]),
        year: year(obj),
        color: text(obj, &["color", "colour"]),
        estimated_price: number(obj, &["estimated_price", "estimatedPrice", "price"])
            .filter(|p| *p >= 0.0),
        condition: text(obj, &["condition"]).and_then(|c| condition(&c)),
        mileage: whole(obj, &["mileage", "kilometers", "km"]),
        vehicle_type: text(obj, &["vehicle_type", "vehicleType", "type"])
            .and_then(|t| vehicle_type(&t)),
        category: text(obj, &["category", "body_type", "bodyType"]),
        power: whole(obj, &["power", "horsepower", "hp"]),
        displacement: displacement(obj),
        confidence: clamp_confidence(number(obj, &["confidence"]).unwrap_or(0.0)),
    };

    if suggestion.brand.is_none() && suggestion.model.is_none() && suggestion.vehicle_type.is_none() {
        return Err(VisionError::Malformed(
            "reply identifies no brand, model or vehicle type".to_string(),
        ));
    }

    Ok(suggestion)
}

/// Slice from the first `{` to the last `}`; tolerates code fences and prose.
fn extract_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Parse the leading number out of strings like `"$12,500"` or `"15 000 km"`.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '\u{a0}'))
        .collect();
    let is_numeric = |c: char| c.is_ascii_digit() || c == '-' || c == '.';
    let start = cleaned.find(is_numeric)?;
    let rest = &cleaned[start..];
    let end = rest.find(|c: char| !is_numeric(c)).unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    let raw = match lookup(obj, keys)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let lowered = raw.to_lowercase();
    if raw.is_empty() || matches!(lowered.as_str(), "unknown" | "n/a" | "null" | "none") {
        None
    } else {
        Some(raw)
    }
}

fn number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    match lookup(obj, keys)? {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_numeric(s),
        _ => None,
    }
}

/// Non-negative whole number that fits the listing columns.
fn whole(obj: &Map<String, Value>, keys: &[&str]) -> Option<i32> {
    number(obj, keys)
        .filter(|n| *n >= 0.0 && *n <= i32::MAX as f64)
        .map(|n| n.round() as i32)
}

fn year(obj: &Map<String, Value>) -> Option<i32> {
    let latest = chrono::Utc::now().year() + 1;
    number(obj, &["year"])
        .map(|n| n.round())
        .filter(|n| *n >= MIN_YEAR as f64 && *n <= latest as f64)
        .map(|n| n as i32)
}

fn condition(raw: &str) -> Option<ListingCondition> {
    match raw.to_lowercase().as_str() {
        "new" | "brand new" | "neuf" => Some(ListingCondition::New),
        "used" | "second hand" | "second-hand" | "pre-owned" | "preowned" | "occasion" => {
            Some(ListingCondition::Used)
        }
        _ => None,
    }
}

/// Engine size in cc. A litre figure such as `"1.6L"` is not a cc count.
fn displacement(obj: &Map<String, Value>) -> Option<i32> {
    const KEYS: &[&str] = &["displacement", "engine_cc", "cc"];
    if let Some(Value::String(raw)) = lookup(obj, KEYS) {
        if in_litres(raw) {
            return None;
        }
    }
    whole(obj, KEYS)
}

fn in_litres(raw: &str) -> bool {
    raw.to_lowercase()
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ',' | ' '))
        .starts_with('l')
}

const MOTORCYCLE_WORDS: &[&str] = &["motorcycle", "motorbike", "bike", "scooter", "moto", "moped"];

const CAR_WORDS: &[&str] = &[
    "car", "sedan", "suv", "hatchback", "coupe", "convertible", "wagon", "pickup", "truck", "van",
    "minivan", "crossover", "automobile",
];

/// Whole-word match, so "motorhome" or "cargo" match nothing.
fn vehicle_type(raw: &str) -> Option<VehicleType> {
    let lowered = raw.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.strip_suffix('s').filter(|s| s.len() > 2).unwrap_or(w))
        .collect();
    let has = |list: &[&str]| words.iter().any(|w| list.contains(w));

    if has(MOTORCYCLE_WORDS) {
        Some(VehicleType::Motorcycle)
    } else if has(CAR_WORDS) {
        Some(VehicleType::Car)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_reply_is_typed() {
        let s = parse_reply(
            r#"{"brand":"Toyota","model":"Corolla","year":2018,"color":"white",
                "estimated_price":14500,"condition":"used","mileage":82000,
                "vehicle_type":"car","category":"sedan","power":132,
                "displacement":1798,"confidence":0.86}"#,
        )
        .unwrap();
        assert_eq!(s.brand.as_deref(), Some("Toyota"));
        assert_eq!(s.model.as_deref(), Some("Corolla"));
        assert_eq!(s.year, Some(2018));
        assert_eq!(s.estimated_price, Some(14500.0));
        assert_eq!(s.condition, Some(ListingCondition::Used));
        assert_eq!(s.mileage, Some(82000));
        assert_eq!(s.vehicle_type, Some(VehicleType::Car));
        assert_eq!(s.category.as_deref(), Some("sedan"));
        assert_eq!(s.power, Some(132));
        assert_eq!(s.displacement, Some(1798));
        assert!((s.confidence - 0.86).abs() < f64::EPSILON);
    }

    #[test]
    fn fenced_reply_is_accepted() {
        let s = parse_reply("```json\n{\"make\": \"Ducati\", \"type\": \"Motorbike\"}\n```").unwrap();
        assert_eq!(s.brand.as_deref(), Some("Ducati"));
        assert_eq!(s.vehicle_type, Some(VehicleType::Motorcycle));
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn numeric_strings_are_coerced_and_junk_dropped() {
        let s = parse_reply(
            r#"{"brand":"BMW","year":"2021","estimated_price":"$32,900",
                "mileage":"15 000 km","power":"about lots","displacement":"abc",
                "confidence":"0.5"}"#,
        )
        .unwrap();
        assert_eq!(s.year, Some(2021));
        assert_eq!(s.estimated_price, Some(32900.0));
        assert_eq!(s.mileage, Some(15000));
        assert_eq!(s.power, None);
        assert_eq!(s.displacement, None);
        assert_eq!(s.confidence, 0.5);
    }

    #[test]
    fn out_of_range_values_are_dropped() {
        let s = parse_reply(
            r#"{"brand":"Ford","year":1700,"estimated_price":-5,"mileage":-1,"confidence":7}"#,
        )
        .unwrap();
        assert_eq!(s.year, None);
        assert_eq!(s.estimated_price, None);
        assert_eq!(s.mileage, None);
        assert_eq!(s.confidence, 1.0);

        let s = parse_reply(r#"{"brand":"Ford","year":9999,"confidence":-0.3}"#).unwrap();
        assert_eq!(s.year, None);
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn placeholder_strings_become_absent() {
        let s = parse_reply(r#"{"brand":"Kia","model":"unknown","color":"  ","condition":"mint"}"#)
            .unwrap();
        assert_eq!(s.model, None);
        assert_eq!(s.color, None);
        assert_eq!(s.condition, None);
    }

    #[test]
    fn replies_without_identification_are_malformed() {
        assert!(parse_reply("I cannot see a vehicle").is_err());
        assert!(parse_reply("{not json}").is_err());
        assert!(parse_reply("[1,2,3]").is_err());
        assert!(parse_reply(r#"{"brand":null,"model":"unknown","confidence":0.9}"#).is_err());
    }

    #[test]
    fn confidence_clamp_handles_non_finite() {
        assert_eq!(clamp_confidence(f64::NAN), 0.0);
        assert_eq!(clamp_confidence(f64::INFINITY), 0.0);
        assert_eq!(clamp_confidence(0.25), 0.25);
    }

    #[test]
    fn vehicle_type_matches_whole_words() {
        assert_eq!(vehicle_type("Sport Motorcycle"), Some(VehicleType::Motorcycle));
        assert_eq!(vehicle_type("dirt-bike"), Some(VehicleType::Motorcycle));
        assert_eq!(vehicle_type("Scooters"), Some(VehicleType::Motorcycle));
        assert_eq!(vehicle_type("Passenger car"), Some(VehicleType::Car));
        assert_eq!(vehicle_type("cargo van"), Some(VehicleType::Car));
        assert_eq!(vehicle_type("SUV"), Some(VehicleType::Car));
        assert_eq!(vehicle_type("motorhome"), None);
        assert_eq!(vehicle_type("cargo"), None);
        assert_eq!(vehicle_type("boat"), None);
    }

    #[test]
    fn litre_displacement_is_dropped() {
        let s = parse_reply(r#"{"brand":"VW","displacement":"1.6L"}"#).unwrap();
        assert_eq!(s.displacement, None);
        let s = parse_reply(r#"{"brand":"VW","displacement":"2.0 litre"}"#).unwrap();
        assert_eq!(s.displacement, None);
        let s = parse_reply(r#"{"brand":"Honda","displacement":"1,600 cc"}"#).unwrap();
        assert_eq!(s.displacement, Some(1600));
        let s = parse_reply(r#"{"brand":"Honda","displacement":649}"#).unwrap();
        assert_eq!(s.displacement, Some(649));
    }

    #[test]
    fn parse_numeric_cases() {
        assert_eq!(parse_numeric("12,500"), Some(12500.0));
        assert_eq!(parse_numeric("USD 8 999.50"), Some(8999.5));
        assert_eq!(parse_numeric("125cc"), Some(125.0));
        assert_eq!(parse_numeric("n/a"), None);
        assert_eq!(parse_numeric(""), None);
    }
}

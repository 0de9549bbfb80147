use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use super::error::TypeError;

pub type FormData = Map<String, Value>;

/// Typed, lenient view over a schema-less document field map.
///
/// `null` is treated the same as a missing key.
pub struct Form<'a> {
    inner: &'a FormData,
}

impl<'a> Form<'a> {
    pub fn from_data(data: &'a FormData) -> Self {
        Self { inner: data }
    }

    fn get(&self, key: &str) -> Result<&'a Value, TypeError> {
        match self.inner.get(key) {
            Some(Value::Null) | None => Err(TypeError::new("Invalid key")),
            Some(value) => Ok(value),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.get(key)?.as_str() {
            Some(v) => Ok(v.to_string()),
            None => Err(TypeError::new("Failed to parse value as str")),
        }
    }

    /// Strings and numbers both render as text, e.g. an ingredient quantity.
    pub fn get_text(&self, key: &str) -> Result<String, TypeError> {
        match self.get(key)? {
            Value::String(v) => Ok(v.to_owned()),
            Value::Number(v) => Ok(v.to_string()),
            _ => Err(TypeError::new("Failed to parse value as text")),
        }
    }

    /// Numbers are read directly, strings are parsed.
    pub fn get_number<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: FromStr,
    {
        let value = self.get(key)?;
        let text = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => return Err(TypeError::new("Failed to parse value as number")),
        };

        text.parse()
            .map_err(|_e| TypeError::new("Invalid type conversion"))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, TypeError> {
        let value = self.get_number::<f64>(key)?;
        if !value.is_finite() {
            return Err(TypeError::new("Non finite number"));
        }
        Ok(value)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, TypeError> {
        self.get(key)?
            .as_bool()
            .ok_or(TypeError::new("Failed to parse value as bool"))
    }

    pub fn get_list(&self, key: &str) -> Result<&'a Vec<Value>, TypeError> {
        self.get(key)?
            .as_array()
            .ok_or(TypeError::new("Failed to parse value as list"))
    }

    /// Non-string entries are skipped.
    pub fn get_str_list(&self, key: &str) -> Result<Vec<String>, TypeError> {
        Ok(self
            .get_list(key)?
            .iter()
            .filter_map(|value| value.as_str().map(|s| s.to_string()))
            .collect())
    }

    /// Accepts RFC 3339 strings, epoch milliseconds, or `{seconds, nanoseconds}` maps.
    pub fn get_timestamp(&self, key: &str) -> Result<DateTime<Utc>, TypeError> {
        parse_timestamp(self.get(key)?).ok_or(TypeError::new("Malformed timestamp"))
    }
}

/// Leading unsigned integer of a duration such as `"30 min"`.
pub fn leading_integer(value: &str) -> Option<u64> {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().ok()
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|date| date.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(map) => {
            let seconds = map.get("seconds").or_else(|| map.get("_seconds"))?.as_i64()?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(|n| n.as_u64())
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos as u32).single()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn data(value: Value) -> FormData {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn null_counts_as_missing() {
        let fields = data(json!({ "title": null }));
        let form = Form::from_data(&fields);

        assert!(!form.has("title"));
        assert!(form.get_str("title").is_err());
    }

    #[test]
    fn numbers_parse_from_strings_and_numbers() {
        let fields = data(json!({ "a": "4.5", "b": 3, "c": "x" }));
        let form = Form::from_data(&fields);

        assert_eq!(form.get_f64("a").unwrap(), 4.5);
        assert_eq!(form.get_number::<u32>("b").unwrap(), 3);
        assert!(form.get_f64("c").is_err());
    }

    #[test]
    fn minutes_take_the_leading_integer() {
        assert_eq!(leading_integer("30 min"), Some(30));
        assert_eq!(leading_integer(" 5"), Some(5));
        assert_eq!(leading_integer("circa 10"), None);
        assert_eq!(leading_integer("-5 min"), None);
    }

    #[test]
    fn timestamps_accept_the_stored_shapes() {
        let rfc = parse_timestamp(&json!("2024-03-01T10:00:00.000Z")).unwrap();
        let millis = parse_timestamp(&json!(1709287200000i64)).unwrap();
        let map = parse_timestamp(&json!({ "seconds": 1709287200, "nanoseconds": 0 })).unwrap();

        assert_eq!(rfc, millis);
        assert_eq!(rfc, map);
        assert!(parse_timestamp(&json!("yesterday")).is_none());
        assert!(parse_timestamp(&json!(true)).is_none());
    }

    #[test]
    fn string_lists_skip_foreign_entries() {
        let fields = data(json!({ "hashtags": ["dolce", 3, "forno"] }));
        let form = Form::from_data(&fields);

        assert_eq!(form.get_str_list("hashtags").unwrap(), vec!["dolce", "forno"]);
    }
}

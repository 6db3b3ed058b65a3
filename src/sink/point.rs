use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::Utc;

use crate::common::Time;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::Integer(i64::from(v))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}

/// Single time series sample destined for InfluxDB.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    // Sorted so rendered lines are stable.
    tags: BTreeMap<String, String>,
    fields: Vec<(String, FieldValue)>,
    timestamp: Time,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn timestamp(mut self, timestamp: Time) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn get_field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn time(&self) -> Time {
        self.timestamp
    }

    // Line protocol rejects points without fields.
    pub fn has_fields(&self) -> bool {
        self.fields.iter().any(|(_, v)| is_writable(v))
    }

    /// Render the point in InfluxDB line protocol with nanosecond precision.
    pub fn to_line(&self) -> String {
        let mut line = String::with_capacity(128);

        escape_into(&mut line, &self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            line.push(',');
            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            escape_into(&mut line, value, &[',', '=', ' ']);
        }

        let mut first = true;
        for (key, value) in self.fields.iter().filter(|(_, v)| is_writable(v)) {
            line.push(if first { ' ' } else { ',' });
            first = false;

            escape_into(&mut line, key, &[',', '=', ' ']);
            line.push('=');
            match value {
                FieldValue::Float(v) => {
                    let _ = write!(line, "{}", v);
                }
                FieldValue::Integer(v) => {
                    let _ = write!(line, "{}i", v);
                }
                FieldValue::Boolean(v) => {
                    let _ = write!(line, "{}", v);
                }
                FieldValue::String(v) => {
                    line.push('"');
                    escape_into(&mut line, v, &['"', '\\']);
                    line.push('"');
                }
            }
        }

        if let Some(nanos) = self.timestamp.timestamp_nanos_opt() {
            let _ = write!(line, " {}", nanos);
        }

        line
    }
}

// NaN and infinity have no line protocol representation.
fn is_writable(value: &FieldValue) -> bool {
    match value {
        FieldValue::Float(v) => v.is_finite(),
        _ => true,
    }
}

fn escape_into(buf: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if special.contains(&c) {
            buf.push('\\');
        }
        buf.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> Time {
        Utc.timestamp_opt(1_700_000_000, 5).unwrap()
    }

    #[test]
    fn render_typed_fields() {
        let point = Point::new("ut1300")
            .tag("name", "UT1300 BT")
            .tag("address", "AA:BB")
            .field("total_voltage", 13.25)
            .field("cycle_count", 12u8)
            .field("balanced", true)
            .field("state", "charging")
            .timestamp(at());

        assert_eq!(
            point.to_line(),
            r#"ut1300,address=AA:BB,name=UT1300\ BT total_voltage=13.25,cycle_count=12i,balanced=true,state="charging" 1700000000000000005"#
        );
    }

    #[test]
    fn escape_special_characters() {
        let point = Point::new("bat tery,x")
            .tag("k=1", "a,b")
            .field("msg", r#"say "hi" \o/"#)
            .timestamp(at());

        assert_eq!(
            point.to_line(),
            r#"bat\ tery\,x,k\=1=a\,b msg="say \"hi\" \\o/" 1700000000000000005"#
        );
    }

    #[test]
    fn non_finite_floats_are_skipped() {
        let point = Point::new("m")
            .field("bad", f64::NAN)
            .field("good", 1.5)
            .timestamp(at());

        assert_eq!(point.to_line(), "m good=1.5 1700000000000000005");

        let only_bad = Point::new("m").field("bad", f64::INFINITY);
        assert!(!only_bad.has_fields());
    }
}

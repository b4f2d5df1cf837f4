//! Wire formatting of native handler results.
//!
//! Capabilities return a [`Native`] value in whatever shape is natural for
//! them; the [`Formatter`] attached to their entry turns it into a
//! JSON-safe [`serde_json::Value`]. Non-finite floats have no JSON
//! representation and become `null`.

use datalink_types::Vector3;
use serde_json::{Map, Number, Value};

/// A value produced by a capability before wire formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    /// No value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A string.
    Text(String),
    /// A three-component vector.
    Vector(Vector3),
    /// An ordered sequence.
    List(Vec<Self>),
    /// An ordered record of named fields.
    Record(Vec<(String, Self)>),
}

impl From<bool> for Native {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Native {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for Native {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<usize> for Native {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(Self::Null, Self::Int)
    }
}

impl From<f64> for Native {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for Native {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Native {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vector3> for Native {
    fn from(value: Vector3) -> Self {
        Self::Vector(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Native {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Native {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

/// Converts a [`Native`] value into its wire representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Formatter {
    /// Canonical mapping: vectors become `[x, y, z]`, records become objects.
    #[default]
    Default,
    /// Like [`Formatter::Default`], with every float rounded to the given
    /// number of decimal places.
    Rounded(u8),
    /// Like [`Formatter::Default`], with every float normalized into
    /// `[0, 360)` degrees.
    Angle,
    /// Like [`Formatter::Default`], with vectors rendered as
    /// `{"x": .., "y": .., "z": ..}` objects.
    Components,
}

impl Formatter {
    /// Format a native value for the wire.
    pub fn format(self, value: Native) -> Value {
        match value {
            Native::Null => Value::Null,
            Native::Bool(b) => Value::Bool(b),
            Native::Int(i) => Value::from(i),
            Native::Float(f) => self.float(f),
            Native::Text(s) => Value::String(s),
            Native::Vector(v) => self.vector(v),
            Native::List(items) => {
                Value::Array(items.into_iter().map(|item| self.format(item)).collect())
            }
            Native::Record(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for (key, field) in fields {
                    map.insert(key, self.format(field));
                }
                Value::Object(map)
            }
        }
    }

    fn float(self, f: f64) -> Value {
        let adjusted = match self {
            Self::Default | Self::Components => f,
            Self::Rounded(decimals) => {
                let factor = 10_f64.powi(i32::from(decimals));
                (f * factor).round() / factor
            }
            Self::Angle => f.rem_euclid(360.0),
        };
        Number::from_f64(adjusted).map_or(Value::Null, Value::Number)
    }

    fn vector(self, v: Vector3) -> Value {
        if self == Self::Components {
            let mut map = Map::with_capacity(3);
            map.insert("x".to_owned(), self.float(v.x));
            map.insert("y".to_owned(), self.float(v.y));
            map.insert("z".to_owned(), self.float(v.z));
            Value::Object(map)
        } else {
            Value::Array(vec![self.float(v.x), self.float(v.y), self.float(v.z)])
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_maps_scalars() {
        let f = Formatter::Default;
        assert_eq!(f.format(Native::Null), Value::Null);
        assert_eq!(f.format(true.into()), json!(true));
        assert_eq!(f.format(7_i64.into()), json!(7));
        assert_eq!(f.format(1.5.into()), json!(1.5));
        assert_eq!(f.format("kerbin".into()), json!("kerbin"));
    }

    #[test]
    fn non_finite_floats_become_null() {
        let f = Formatter::Default;
        assert_eq!(f.format(f64::NAN.into()), Value::Null);
        assert_eq!(f.format(f64::INFINITY.into()), Value::Null);
    }

    #[test]
    fn vectors_render_as_arrays_or_components() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(Formatter::Default.format(v.into()), json!([1.0, 2.0, 3.0]));
        assert_eq!(
            Formatter::Components.format(v.into()),
            json!({"x": 1.0, "y": 2.0, "z": 3.0})
        );
    }

    #[test]
    fn rounded_applies_to_nested_floats() {
        let value = Native::List(vec![1.23456.into(), Vector3::new(0.555, 0.0, 9.9999).into()]);
        assert_eq!(
            Formatter::Rounded(2).format(value),
            json!([1.23, [0.56, 0.0, 10.0]])
        );
    }

    #[test]
    fn angle_normalizes_into_range() {
        assert_eq!(Formatter::Angle.format((-90.0).into()), json!(270.0));
        assert_eq!(Formatter::Angle.format(720.0.into()), json!(0.0));
    }

    #[test]
    fn record_preserves_field_order() {
        let value = Native::Record(vec![
            ("zeta".to_owned(), 1_i64.into()),
            ("alpha".to_owned(), 2_i64.into()),
        ]);
        let out = Formatter::Default.format(value);
        let keys: Vec<&String> = out.as_object().map(|m| m.keys().collect()).unwrap_or_default();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn optional_values_map_to_null() {
        let none: Option<f64> = None;
        assert_eq!(Formatter::Default.format(none.into()), Value::Null);
    }
}

//! Review envelope construction and serialization.
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// The `{parameters, review: {object}}` wrapper Gatekeeper constraint
/// templates read their input from.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct ReviewEnvelope<'a> {
    pub parameters: &'a Value,
    pub review: Review<'a>,
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct Review<'a> {
    pub object: &'a Value,
}

pub fn build<'a>(parameters: &'a Value, object: &'a Value) -> ReviewEnvelope<'a> {
    ReviewEnvelope {
        parameters,
        review: Review { object },
    }
}

impl ReviewEnvelope<'_> {
    /// Compact JSON; object keys come out sorted, so identical input always
    /// produces identical bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_has_exactly_two_fields() {
        let object = json!({"kind": "Pod", "metadata": {"name": "p"}});
        let bytes = build(&Value::Null, &object).to_bytes().expect("serialize");
        let parsed: Value = serde_json::from_slice(&bytes).expect("parse");
        assert_eq!(
            parsed,
            json!({"parameters": null, "review": {"object": {"kind": "Pod", "metadata": {"name": "p"}}}})
        );
        assert_eq!(parsed.as_object().map(|map| map.len()), Some(2));
    }

    #[test]
    fn serialization_is_stable() {
        let parameters = json!({"foo": 1, "bar": [true, null]});
        let object = json!({"z": 1, "a": {"y": 2, "b": 3}});
        let first = build(&parameters, &object).to_bytes().expect("serialize");
        let second = build(&parameters.clone(), &object.clone())
            .to_bytes()
            .expect("serialize");
        assert_eq!(first, second);
        assert_eq!(
            String::from_utf8(first).expect("utf8"),
            r#"{"parameters":{"bar":[true,null],"foo":1},"review":{"object":{"a":{"b":3,"y":2},"z":1}}}"#
        );
    }
}

use crate::{Array, KeyValue, Value};
use std::fmt::{self, Write};

/// Encodes a sequence of labels into a string for presentation.
pub trait Encoder: fmt::Debug {
    /// Encode labels
    fn encode(&self, labels: &mut dyn Iterator<Item = &KeyValue>) -> String;
}

/// Default encoding, `k1=v1,k2=v2`, with `\`, `,` and `=` escaped.
#[derive(Clone, Debug, Default)]
pub struct DefaultLabelEncoder;

impl Encoder for DefaultLabelEncoder {
    fn encode(&self, labels: &mut dyn Iterator<Item = &KeyValue>) -> String {
        labels
            .enumerate()
            .fold(String::new(), |mut acc, (idx, kv)| {
                if idx > 0 {
                    acc.push(',')
                }
                escape_into(&mut acc, kv.key.as_str());
                acc.push('=');
                escape_into(&mut acc, &kv.value.as_str());
                acc
            })
    }
}

fn escape_into(dst: &mut String, s: &str) {
    for c in s.chars() {
        if matches!(c, '\\' | ',' | '=') {
            dst.push('\\');
        }
        dst.push(c);
    }
}

/// Build a new default encoder
pub fn default_encoder() -> Box<dyn Encoder + Send + Sync> {
    Box::new(DefaultLabelEncoder)
}

/// The identity encoding of a sequence of labels.
///
/// Every key and string is length prefixed and every value carries a type tag,
/// so distinct label sequences always produce distinct encodings: the string
/// `"1"`, the integer `1`, the float `1.0` and the array `[1]` are all
/// different. Floats are encoded by their bit pattern.
pub fn canonical_encoding(labels: &mut dyn Iterator<Item = &KeyValue>) -> String {
    let mut out = String::new();
    for kv in labels {
        encode_str(&mut out, kv.key.as_str());
        encode_value(&mut out, &kv.value);
    }
    out
}

fn encode_str(out: &mut String, s: &str) {
    let _ = write!(out, "{}:{}", s.len(), s);
}

fn encode_value(out: &mut String, value: &Value) {
    match value {
        Value::Bool(b) => out.push_str(if *b { "bT" } else { "bF" }),
        Value::I64(i) => {
            let _ = write!(out, "i{};", i);
        }
        Value::F64(f) => {
            let _ = write!(out, "f{:016x}", f.to_bits());
        }
        Value::String(s) => {
            out.push('s');
            encode_str(out, s.as_str());
        }
        Value::Array(array) => encode_array(out, array),
        Value::Unsupported(type_name) => {
            out.push('u');
            encode_str(out, type_name);
        }
    }
}

fn encode_array(out: &mut String, array: &Array) {
    match array {
        Array::Bool(values) => {
            let _ = write!(out, "B{}:", values.len());
            for b in values {
                out.push(if *b { 'T' } else { 'F' });
            }
        }
        Array::I64(values) => {
            let _ = write!(out, "I{}:", values.len());
            for i in values {
                let _ = write!(out, "{};", i);
            }
        }
        Array::F64(values) => {
            let _ = write!(out, "F{}:", values.len());
            for f in values {
                let _ = write!(out, "{:016x}", f.to_bits());
            }
        }
        Array::String(values) => {
            let _ = write!(out, "S{}:", values.len());
            for s in values {
                encode_str(out, s.as_str());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::LabelSet;

    #[test]
    fn default_encoder_escapes_separators() {
        let set = LabelSet::from(&[
            KeyValue::new("route", "/a,b"),
            KeyValue::new("code", 200),
            KeyValue::new("eq", "x=y"),
        ]);

        assert_eq!(
            set.encoded_with(&DefaultLabelEncoder),
            "code=200,eq=x\\=y,route=/a\\,b"
        );
    }

    #[rustfmt::skip]
    #[test]
    fn canonical_encoding_layout() {
        let cases: Vec<(KeyValue, &str)> = vec![
            (KeyValue::new("k", true),                 "1:kbT"),
            (KeyValue::new("k", -4),                   "1:ki-4;"),
            (KeyValue::new("k", 1.0),                  "1:kf3ff0000000000000"),
            (KeyValue::new("k", "ab"),                 "1:ks2:ab"),
            (KeyValue::new("k", Array::I64(vec![1, 2])), "1:kI2:1;2;"),
            (KeyValue::new("k", Value::Unsupported("()")), "1:ku2:()"),
        ];

        for (kv, expected) in cases {
            assert_eq!(canonical_encoding(&mut std::iter::once(&kv)), expected);
        }
    }
}

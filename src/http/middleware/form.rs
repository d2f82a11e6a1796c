//! Extended `application/x-www-form-urlencoded` decoding.
//!
//! Bracketed keys build nested values:
//!
//! ```text
//! user[name]=ada&user[langs][]=rust&user[langs][]=c
//!     → {"user": {"name": "ada", "langs": ["rust", "c"]}}
//! ```
//!
//! Numeric segments up to [`MAX_ARRAY_INDEX`] become array positions,
//! repeated plain keys collect into arrays, and nesting stops after
//! [`MAX_DEPTH`] bracket groups (the remainder is kept as one literal key).

use serde_json::{Map, Value};

/// Bracket groups honoured below the top-level key.
pub const MAX_DEPTH: usize = 5;

/// Largest numeric segment treated as an array index.
pub const MAX_ARRAY_INDEX: usize = 20;

/// Maximum number of `key=value` pairs in one body.
pub const MAX_PARAMETERS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("too many parameters (limit {MAX_PARAMETERS})")]
    TooManyParameters,
}

/// Decode an urlencoded body into a JSON object.
pub fn decode_extended(input: &[u8]) -> Result<Value, FormError> {
    let mut root = Map::new();

    for (count, (key, value)) in url::form_urlencoded::parse(input).enumerate() {
        if count >= MAX_PARAMETERS {
            return Err(FormError::TooManyParameters);
        }
        if key.is_empty() {
            continue;
        }

        let segments = split_key(&key);
        insert(&mut root, &segments[0], &segments[1..], value.into_owned());
    }

    // The root always stays an object, even for keys like `0=a`.
    Ok(Value::Object(
        root.into_iter().map(|(k, v)| (k, compact(v))).collect(),
    ))
}

fn split_key(key: &str) -> Vec<String> {
    let open = match key.find('[') {
        Some(i) if i > 0 && key[i..].contains(']') => i,
        _ => return vec![key.to_string()],
    };

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];

    while segments.len() <= MAX_DEPTH {
        let Some(inner) = rest.strip_prefix('[') else { break };
        let Some(close) = inner.find(']') else { break };
        segments.push(inner[..close].to_string());
        rest = &inner[close + 1..];
    }

    if segments.len() > MAX_DEPTH && rest.starts_with('[') {
        segments.push(rest.to_string());
    }

    segments
}

fn insert(node: &mut Map<String, Value>, key: &str, rest: &[String], value: String) {
    let Some((next, deeper)) = rest.split_first() else {
        match node.get_mut(key) {
            Some(slot) => push_value(slot, Value::String(value)),
            None => {
                node.insert(key.to_string(), Value::String(value));
            }
        }
        return;
    };

    if next.is_empty() {
        let item = match deeper.split_first() {
            None => Value::String(value),
            Some((child_key, child_rest)) => {
                let mut child = Map::new();
                insert(&mut child, child_key, child_rest, value);
                Value::Object(child)
            }
        };
        let slot = node
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        push_value(slot, item);
        return;
    }

    match node
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
    {
        Value::Object(child) => insert(child, next, deeper, value),
        other => {
            let mut child = Map::new();
            insert(&mut child, next, deeper, value);
            push_value(other, Value::Object(child));
        }
    }
}

fn push_value(slot: &mut Value, item: Value) {
    match slot {
        Value::Array(items) => items.push(item),
        other => {
            let previous = other.take();
            *other = Value::Array(vec![previous, item]);
        }
    }
}

/// Turn objects keyed only by small indices into arrays ordered by index.
fn compact(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let indexed: Option<Vec<usize>> = map
                .keys()
                .map(|k| k.parse::<usize>().ok().filter(|i| *i <= MAX_ARRAY_INDEX))
                .collect();

            match indexed {
                Some(indices) if !indices.is_empty() => {
                    let mut items: Vec<(usize, Value)> = indices
                        .into_iter()
                        .zip(map.into_iter().map(|(_, v)| compact(v)))
                        .collect();
                    items.sort_by_key(|(i, _)| *i);
                    Value::Array(items.into_iter().map(|(_, v)| v).collect())
                }
                _ => Value::Object(map.into_iter().map(|(k, v)| (k, compact(v))).collect()),
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(compact).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(input: &str) -> Value {
        decode_extended(input.as_bytes()).unwrap()
    }

    #[test]
    fn flat_pairs_and_escapes() {
        assert_eq!(
            decode("name=ada+lovelace&note=hi%21"),
            json!({"name": "ada lovelace", "note": "hi!"})
        );
    }

    #[test]
    fn nested_objects_and_push_arrays() {
        assert_eq!(
            decode("user[name]=ada&user[langs][]=rust&user[langs][]=c"),
            json!({"user": {"name": "ada", "langs": ["rust", "c"]}})
        );
    }

    #[test]
    fn indices_order_array_items() {
        assert_eq!(
            decode("list[1]=second&list[0]=first"),
            json!({"list": ["first", "second"]})
        );
        assert_eq!(decode("list[21]=far"), json!({"list": {"21": "far"}}));
    }

    #[test]
    fn repeated_keys_collect() {
        assert_eq!(decode("tag=a&tag=b&tag=c"), json!({"tag": ["a", "b", "c"]}));
    }

    #[test]
    fn objects_inside_push_arrays() {
        assert_eq!(
            decode("items[][id]=1&items[][id]=2"),
            json!({"items": [{"id": "1"}, {"id": "2"}]})
        );
    }

    #[test]
    fn depth_is_capped() {
        assert_eq!(
            decode("a[b][c][d][e][f][g]=deep"),
            json!({"a": {"b": {"c": {"d": {"e": {"f": {"[g]": "deep"}}}}}}})
        );
    }

    #[test]
    fn unbalanced_keys_stay_literal() {
        assert_eq!(decode("a[b=1&=skipped"), json!({"a[b": "1"}));
    }

    #[test]
    fn parameter_count_is_limited() {
        let body = (0..=MAX_PARAMETERS)
            .map(|i| format!("k{i}=v"))
            .collect::<Vec<_>>()
            .join("&");
        assert_eq!(
            decode_extended(body.as_bytes()),
            Err(FormError::TooManyParameters)
        );
    }
}

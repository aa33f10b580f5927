use serde_json::Value;
use crate::models::PoolRecord;
use crate::services::PoolNormalizer;

type Shape = fn(&Value) -> Option<&Vec<Value>>;

fn data_pools(v: &Value) -> Option<&Vec<Value>> {
    v.get("data")?.get("pools")?.as_array()
}

fn data_array(v: &Value) -> Option<&Vec<Value>> {
    v.get("data")?.as_array()
}

fn pools(v: &Value) -> Option<&Vec<Value>> {
    v.get("pools")?.as_array()
}

fn pairs(v: &Value) -> Option<&Vec<Value>> {
    v.get("pairs")?.as_array()
}

fn bare_array(v: &Value) -> Option<&Vec<Value>> {
    v.as_array()
}

/// Tried in order; the first shape with a parseable entity wins.
const SHAPES: &[(&str, Shape)] = &[
    ("data.pools", data_pools),
    ("data", data_array),
    ("pools", pools),
    ("pairs", pairs),
    ("array", bare_array),
];

/// Parses a response body, logging and returning `None` when it is not JSON.
pub fn parse_body(source: &str, body: &str) -> Option<Value> {
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            let preview: String = body.chars().take(200).collect();
            tracing::warn!("⚠️ {} returned non-JSON body ({}): {}", source, e, preview);
            None
        }
    }
}

fn top_level_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(_) => vec!["<array>".to_string()],
        _ => vec![],
    }
}

/// Locates the pool list inside `value` and normalizes it.
pub fn extract_pools(source: &str, value: &Value, normalizer: &PoolNormalizer) -> Vec<PoolRecord> {
    for &(shape, locate) in SHAPES {
        let Some(entities) = locate(value) else {
            continue;
        };

        let parsed: Vec<PoolRecord> = entities.iter().filter_map(|e| normalizer.parse(e)).collect();
        if parsed.is_empty() {
            continue;
        }

        let failed = entities.len() - parsed.len();
        let total = parsed.len();
        let kept: Vec<PoolRecord> = parsed.into_iter().filter(|p| normalizer.accepts(p)).collect();
        tracing::debug!(
            source,
            shape,
            parsed = total,
            failed,
            kept = kept.len(),
            "envelope matched"
        );
        return kept;
    }

    tracing::warn!(
        "⚠️ {}: no pool list found in response (keys: {:?})",
        source,
        top_level_keys(value)
    );
    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::services::PoolFilter;
    use serde_json::json;

    fn normalizer() -> PoolNormalizer {
        PoolNormalizer::new("test", "https://example.com", PoolFilter::new(&FilterConfig::default()))
    }

    fn entity(id: &str) -> Value {
        json!({ "id": id, "tokens": [{ "symbol": "ABC" }, { "symbol": "USDT" }] })
    }

    #[test]
    fn test_each_shape() {
        let n = normalizer();
        let bodies = vec![
            json!({ "code": 0, "data": { "pools": [entity("a")] } }),
            json!({ "data": [entity("a")] }),
            json!({ "pools": [entity("a")] }),
            json!({ "pairs": [entity("a")] }),
            json!([entity("a")]),
        ];
        for body in bodies {
            let pools = extract_pools("test", &body, &n);
            assert_eq!(pools.len(), 1, "body: {}", body);
            assert_eq!(pools[0].id, "a");
        }
    }

    #[test]
    fn test_earlier_shape_wins() {
        let body = json!({
            "data": { "pools": [entity("first")] },
            "pools": [entity("second")]
        });
        let pools = extract_pools("test", &body, &normalizer());
        assert_eq!(pools[0].id, "first");
    }

    #[test]
    fn test_unparseable_shape_falls_through() {
        // data.pools holds nothing with an id, so `pools` is used
        let body = json!({
            "data": { "pools": [{ "name": "anonymous" }] },
            "pools": [entity("b")]
        });
        let pools = extract_pools("test", &body, &normalizer());
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].id, "b");
    }

    #[test]
    fn test_unknown_shape_and_bad_json() {
        assert!(extract_pools("test", &json!({ "result": [] }), &normalizer()).is_empty());
        assert!(parse_body("test", "<html>oops</html>").is_none());
        assert!(parse_body("test", "[]").is_some());
    }

    #[test]
    fn test_filtered_after_shape_match() {
        let body = json!({ "pools": [
            { "id": "w", "tokens": [{ "symbol": "WETH" }, { "symbol": "USDT" }] },
            entity("ok")
        ]});
        let pools = extract_pools("test", &body, &normalizer());
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].id, "ok");
    }
}

//! Configuration merge logic
//!
//! - Objects: deep-merge by key
//! - Arrays: replace (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge two JSON values; `overlay` wins on conflicts.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let result = deep_merge(json!({"debug": false}), json!({"debug": true}));
        assert_eq!(result["debug"], true);
    }

    #[test]
    fn test_object_deep_merge() {
        let base = json!({"log": {"sink": "tracing", "file": "/var/log/app.log"}});
        let overlay = json!({"log": {"sink": "file"}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["log"]["sink"], "file");
        assert_eq!(result["log"]["file"], "/var/log/app.log");
    }

    #[test]
    fn test_array_replace() {
        let result = deep_merge(json!({"tags": ["a", "b"]}), json!({"tags": ["c"]}));
        assert_eq!(result["tags"], json!(["c"]));
    }

    #[test]
    fn test_merge_layers_precedence() {
        let builtin = json!({"debug": false, "interface": "auto", "log": {"sink": "tracing"}});
        let file = json!({"interface": "network", "log": {"sink": "stderr"}});
        let env = json!({"debug": true});
        let cli = json!({"interface": "cli"});

        let result = merge_layers(vec![builtin, file, env, cli]);

        assert_eq!(result["debug"], true);
        assert_eq!(result["interface"], "cli");
        assert_eq!(result["log"]["sink"], "stderr");
    }
}

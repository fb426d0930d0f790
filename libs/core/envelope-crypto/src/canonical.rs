// [libs/core/envelope-crypto/src/canonical.rs]
/*!
 * Serialización canónica (claves ordenadas) de un `serde_json::Value`,
 * usada para construir el AAD atado al tag de GCM. `serde_json::Map`
 * no garantiza orden de claves salvo que el feature `preserve_order`
 * esté activo en algún dependiente transitivo; esta función no confía
 * en eso y ordena explícitamente en cada nivel.
 */

use std::collections::BTreeMap;

use serde_json::Value;

pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    canonicalize(value).into_bytes()
}

fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let entries: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), canonicalize(v)))
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(items) => {
            let entries: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", entries.join(","))
        }
        other => serde_json::to_string(other).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_regardless_of_insertion_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json_bytes(&a), canonical_json_bytes(&b));
    }

    #[test]
    fn differs_when_a_value_changes() {
        let a = json!({"key_version": 1});
        let b = json!({"key_version": 2});
        assert_ne!(canonical_json_bytes(&a), canonical_json_bytes(&b));
    }
}

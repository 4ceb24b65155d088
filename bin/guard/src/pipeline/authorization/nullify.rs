use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::ast::operation::FieldPath;

/// An executed GraphQL response, as produced by the execution layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

/// Deferred nullification of withheld fields.
///
/// Attached to the request context when fields were removed from the operation. The
/// execution layer applies it to the final payload, so that the removed fields show up
/// as explicit `null`s instead of being absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTransform {
    paths: Vec<FieldPath>,
}

impl ResultTransform {
    pub fn new(paths: Vec<FieldPath>) -> Self {
        ResultTransform { paths }
    }

    pub fn paths(&self) -> &[FieldPath] {
        &self.paths
    }

    pub fn apply<'r>(&self, payload: &'r mut ResponsePayload) -> &'r mut ResponsePayload {
        nullify(&self.paths, payload)
    }
}

/// Sets every missing field named by `paths` to `null` in `result.data`, in place.
pub fn nullify<'r>(paths: &[FieldPath], result: &'r mut ResponsePayload) -> &'r mut ResponsePayload {
    if let Some(data) = result.data.as_mut() {
        nullify_data(paths, data);
    }
    result
}

/// Walks each path from `data`.
///
/// Lists along the way are flattened, so the next segment applies to every element.
/// A missing key is inserted as `null` and ends the walk for that branch; present values
/// are never modified. Scalars and `null`s end the walk.
pub fn nullify_data(paths: &[FieldPath], data: &mut Value) {
    for path in paths {
        let mut cursor = Vec::new();
        splice(data, &mut cursor);

        for key in path.keys() {
            if cursor.is_empty() {
                break;
            }
            let mut next = Vec::with_capacity(cursor.len());
            for value in cursor {
                descend(value, key, &mut next);
            }
            cursor = next;
        }

        trace!(path = path.property.as_str(), "nullified");
    }
}

fn descend<'a>(value: &'a mut Value, key: &str, next: &mut Vec<&'a mut Value>) {
    let Value::Object(object) = value else {
        return;
    };

    if !object.contains_key(key) {
        object.insert(key.to_string(), Value::Null);
        return;
    }

    if let Some(child) = object.get_mut(key) {
        splice(child, next);
    }
}

/// Pushes `value` into `into`, or its elements when it is a list (recursively).
fn splice<'a>(value: &'a mut Value, into: &mut Vec<&'a mut Value>) {
    if value.is_array() {
        if let Value::Array(items) = value {
            for item in items.iter_mut() {
                splice(item, into);
            }
        }
    } else {
        into.push(value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn paths(properties: &[&str]) -> Vec<FieldPath> {
        properties.iter().map(|p| FieldPath::new(*p)).collect()
    }

    #[test]
    fn sets_missing_fields_on_every_list_element() {
        let mut payload = ResponsePayload {
            data: Some(json!({
                "products": [
                    { "id": 1 },
                    { "id": 2, "owner": "alice" },
                    { "id": 3 }
                ]
            })),
            ..Default::default()
        };

        nullify(&paths(&["products.owner"]), &mut payload);

        assert_eq!(
            payload.data,
            Some(json!({
                "products": [
                    { "id": 1, "owner": null },
                    { "id": 2, "owner": "alice" },
                    { "id": 3, "owner": null }
                ]
            }))
        );
    }

    #[test]
    fn walks_nested_lists() {
        let mut data = json!({
            "shops": [
                { "products": [{ "id": 1 }, { "id": 2 }] },
                { "products": [[{ "id": 3 }]] },
                { "products": null }
            ]
        });

        nullify_data(&paths(&["shops.products.name"]), &mut data);

        assert_eq!(
            data,
            json!({
                "shops": [
                    { "products": [{ "id": 1, "name": null }, { "id": 2, "name": null }] },
                    { "products": [[{ "id": 3, "name": null }]] },
                    { "products": null }
                ]
            })
        );
    }

    #[test]
    fn stops_at_missing_object() {
        let mut data = json!({ "products": [{ "id": 1 }] });

        nullify_data(&paths(&["me.email", "products.owner.email"]), &mut data);

        assert_eq!(
            data,
            json!({ "products": [{ "id": 1, "owner": null }], "me": null })
        );
    }

    #[test]
    fn stops_at_scalars() {
        let mut data = json!({ "count": 3, "products": ["a", "b"] });

        nullify_data(&paths(&["count.value", "products.name"]), &mut data);

        assert_eq!(data, json!({ "count": 3, "products": ["a", "b"] }));
    }

    #[test]
    fn strips_type_disambiguators() {
        let mut data = json!({ "search": [{ "title": "t" }, { "id": 1, "name": "n" }] });

        nullify_data(&paths(&["search.name:Article"]), &mut data);

        assert_eq!(
            data,
            json!({ "search": [{ "title": "t", "name": null }, { "id": 1, "name": "n" }] })
        );
    }

    #[test]
    fn is_idempotent() {
        let mut data = json!({ "products": [{ "id": 1 }] });
        let withheld = paths(&["products.owner"]);

        nullify_data(&withheld, &mut data);
        let once = data.clone();
        nullify_data(&withheld, &mut data);

        assert_eq!(data, once);
    }

    #[test]
    fn ignores_absent_data() {
        let mut payload = ResponsePayload {
            data: None,
            errors: Some(vec![json!({ "message": "boom" })]),
            extensions: None,
        };
        let before = payload.clone();

        ResultTransform::new(paths(&["products.owner"])).apply(&mut payload);

        assert_eq!(payload, before);
    }

    #[test]
    fn treats_null_data_as_absent() {
        let mut payload: ResponsePayload =
            serde_json::from_value(json!({ "data": null, "errors": [] })).unwrap();

        nullify(&paths(&["products"]), &mut payload);

        assert_eq!(payload.data, None);
    }
}

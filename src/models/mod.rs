use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A link as the backend serializes it in rich fields.
///
/// The backend has been observed to use `title`/`name`/`label` for the caption and
/// `url`/`href`/`link` for the target; both are folded here once.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LinkObject {
    pub title: String,
    pub url: String,
}

/// Decoded shape of a loosely typed field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Link(LinkObject),
    Links(Vec<LinkObject>),
}

impl FieldValue {
    /// Decode a raw JSON field. Returns `None` for null and for shapes that carry nothing
    /// displayable.
    pub fn decode(v: &Value) -> Option<FieldValue> {
        match v {
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Number(n) => Some(FieldValue::Text(n.to_string())),
            Value::Bool(b) => Some(FieldValue::Text(b.to_string())),
            Value::Object(map) => decode_link(map).map(FieldValue::Link),
            Value::Array(items) => {
                let links: Vec<LinkObject> = items
                    .iter()
                    .filter_map(|item| item.as_object().and_then(decode_link))
                    .collect();
                if links.is_empty() {
                    // An array of plain strings reads as one comma-separated text.
                    let texts: Vec<&str> = items.iter().filter_map(|i| i.as_str()).collect();
                    if texts.is_empty() {
                        None
                    } else {
                        Some(FieldValue::Text(texts.join(", ")))
                    }
                } else {
                    Some(FieldValue::Links(links))
                }
            }
            Value::Null => None,
        }
    }

    /// Best display text: the text itself, or the caption(s) of the link(s).
    pub fn display_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Link(l) => l.title.clone(),
            FieldValue::Links(ls) => ls
                .iter()
                .map(|l| l.title.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    pub fn links(&self) -> Vec<LinkObject> {
        match self {
            FieldValue::Text(_) => vec![],
            FieldValue::Link(l) => vec![l.clone()],
            FieldValue::Links(ls) => ls.clone(),
        }
    }
}

fn decode_link(map: &Map<String, Value>) -> Option<LinkObject> {
    let get_s = |keys: &[&str]| {
        keys.iter()
            .filter_map(|k| map.get(*k).and_then(|v| v.as_str()))
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
    };

    let url = get_s(&["url", "href", "link", "file"])?;
    let title = get_s(&["title", "name", "label"]).unwrap_or_else(|| url.clone());
    Some(LinkObject { title, url })
}

/// Decode a named field of a record.
pub fn field(record: &Value, name: &str) -> Option<FieldValue> {
    record.get(name).and_then(FieldValue::decode)
}

/// Boundary normalization for records coming from the remote API.
///
/// Numeric ids become strings so overlay keys and base ids compare equal. Non-object items are
/// passed through untouched (convocations may arrive as bare labels).
pub fn normalize_record(mut record: Value) -> Value {
    if let Some(map) = record.as_object_mut() {
        if let Some(Value::Number(n)) = map.get("id") {
            let id = n.to_string();
            map.insert("id".to_string(), Value::String(id));
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_text() {
        assert_eq!(
            FieldValue::decode(&json!("Комитет")),
            Some(FieldValue::Text("Комитет".to_string()))
        );
        assert_eq!(FieldValue::decode(&json!(12)), Some(FieldValue::Text("12".to_string())));
        assert_eq!(FieldValue::decode(&json!(null)), None);
    }

    #[test]
    fn test_decode_link_object_aliases() {
        let v = json!({"name": "Устав", "href": "/docs/ustav.pdf"});
        assert_eq!(
            FieldValue::decode(&v),
            Some(FieldValue::Link(LinkObject {
                title: "Устав".to_string(),
                url: "/docs/ustav.pdf".to_string(),
            }))
        );

        // No caption: the url doubles as the title.
        let v = json!({"url": "https://example.org"});
        assert_eq!(
            FieldValue::decode(&v).map(|f| f.display_text()),
            Some("https://example.org".to_string())
        );

        assert_eq!(FieldValue::decode(&json!({"title": "no target"})), None);
    }

    #[test]
    fn test_decode_link_array_skips_garbage() {
        let v = json!([
            {"title": "A", "url": "/a"},
            {"title": "broken"},
            {"label": "B", "link": "/b"}
        ]);
        let f = FieldValue::decode(&v).expect("links");
        assert_eq!(f.links().len(), 2);
        assert_eq!(f.display_text(), "A, B");
    }

    #[test]
    fn test_decode_string_array() {
        assert_eq!(
            FieldValue::decode(&json!(["a", "b"])),
            Some(FieldValue::Text("a, b".to_string()))
        );
        assert_eq!(FieldValue::decode(&json!([])), None);
    }

    #[test]
    fn test_normalize_record_stringifies_numeric_id() {
        assert_eq!(
            normalize_record(json!({"id": 7, "title": "x"})),
            json!({"id": "7", "title": "x"})
        );
        assert_eq!(normalize_record(json!("VIII созыв")), json!("VIII созыв"));
    }

    #[test]
    fn test_field_lookup() {
        let r = json!({"title": "Новость", "files": [{"title": "f", "url": "/f"}]});
        assert_eq!(field(&r, "title").map(|f| f.display_text()), Some("Новость".to_string()));
        assert_eq!(field(&r, "files").map(|f| f.links().len()), Some(1));
        assert_eq!(field(&r, "missing"), None);
    }
}

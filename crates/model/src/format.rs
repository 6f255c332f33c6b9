use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// One answer shape the model may choose.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseVariant {
    /// The discriminator of this variant.
    pub kind: String,
    /// The JSON schema of the variant's value.
    pub schema: Value,
}

/// A closed set of answer shapes for a chat request.
///
/// The model must answer with exactly one variant, wrapped as
/// `{"response": {"kind": <kind>, "value": <value>}}`. Providers that
/// support structured outputs can pass [`ResponseFormat::json_schema`]
/// to the model directly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormat {
    variants: Vec<ResponseVariant>,
}

impl ResponseFormat {
    /// Creates an empty response format.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variant to the format.
    ///
    /// Adding a variant whose kind is already present replaces its schema.
    pub fn with_variant<S: Into<String>>(
        mut self,
        kind: S,
        schema: Value,
    ) -> Self {
        let kind = kind.into();
        match self.variants.iter_mut().find(|v| v.kind == kind) {
            Some(variant) => variant.schema = schema,
            None => self.variants.push(ResponseVariant { kind, schema }),
        }
        self
    }

    /// Returns the variants in declaration order.
    #[inline]
    pub fn variants(&self) -> &[ResponseVariant] {
        &self.variants
    }

    /// Returns `true` if the format declares a variant named `kind`.
    #[inline]
    pub fn contains(&self, kind: &str) -> bool {
        self.variants.iter().any(|v| v.kind == kind)
    }

    /// Renders the wrapper schema the model's answer must match.
    ///
    /// Definitions of the variant schemas are hoisted to the root, since
    /// their refs resolve against the document root.
    pub fn json_schema(&self) -> Value {
        let mut defs = Map::new();
        let any_of: Vec<Value> = self
            .variants
            .iter()
            .map(|variant| {
                let value =
                    hoist_definitions(variant.schema.clone(), &mut defs);
                json!({
                    "type": "object",
                    "properties": {
                        "kind": { "type": "string", "const": variant.kind },
                        "value": value,
                    },
                    "required": ["kind", "value"],
                    "additionalProperties": false,
                })
            })
            .collect();
        let mut schema = json!({
            "type": "object",
            "properties": {
                "response": { "anyOf": any_of },
            },
            "required": ["response"],
            "additionalProperties": false,
        });
        if !defs.is_empty() {
            schema["$defs"] = Value::Object(defs);
        }
        schema
    }
}

/// Moves the definitions of `schema` into `defs` and rewrites its refs.
///
/// A definition whose name is taken gets a numeric suffix.
fn hoist_definitions(
    mut schema: Value,
    defs: &mut Map<String, Value>,
) -> Value {
    let mut local = Map::new();
    if let Some(root) = schema.as_object_mut() {
        root.remove("$schema");
        for key in ["$defs", "definitions"] {
            if let Some(Value::Object(found)) = root.remove(key) {
                local.extend(found);
            }
        }
    }

    let mut renames = HashMap::new();
    for name in local.keys() {
        let mut target = name.clone();
        let mut suffix = 1;
        while defs.contains_key(&target)
            || renames.values().any(|taken| taken == &target)
        {
            suffix += 1;
            target = format!("{name}{suffix}");
        }
        renames.insert(name.clone(), target);
    }

    for (name, mut def) in local {
        rewrite_refs(&mut def, &renames);
        let target = renames.get(&name).cloned().unwrap_or(name);
        defs.insert(target, def);
    }
    rewrite_refs(&mut schema, &renames);
    schema
}

fn rewrite_refs(value: &mut Value, renames: &HashMap<String, String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get_mut("$ref") {
                if let Some(rewritten) = rewrite_ref(reference, renames) {
                    *reference = rewritten;
                }
            }
            for (key, child) in map.iter_mut() {
                if key != "$ref" {
                    rewrite_refs(child, renames);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, renames);
            }
        }
        _ => {}
    }
}

fn rewrite_ref(
    reference: &str,
    renames: &HashMap<String, String>,
) -> Option<String> {
    let path = reference
        .strip_prefix("#/$defs/")
        .or_else(|| reference.strip_prefix("#/definitions/"))?;
    let (name, rest) = match path.find('/') {
        Some(idx) => path.split_at(idx),
        None => (path, ""),
    };
    let target = renames.get(name)?;
    Some(format!("#/$defs/{target}{rest}"))
}

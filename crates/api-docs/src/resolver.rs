//! JSON Schema $ref resolver for API descriptions

use serde_json::Value;

/// Resolves local `$ref` pointers (`#/components/schemas/..`, `#/definitions/..`)
pub struct SchemaResolver<'a> {
    /// Whole document the pointers refer into
    root: &'a Value,
    /// Maximum recursion depth, guards against self-referencing schemas
    max_depth: usize,
}

impl<'a> SchemaResolver<'a> {
    /// Create a resolver over a document root
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            max_depth: 10,
        }
    }

    /// Resolve a schema, following $ref references
    pub fn resolve(&self, schema: &Value) -> Value {
        self.resolve_with_depth(schema, 0)
    }

    fn resolve_with_depth(&self, schema: &Value, depth: usize) -> Value {
        if depth > self.max_depth {
            return schema.clone();
        }

        match schema {
            Value::Object(obj) => {
                if let Some(target) = obj
                    .get("$ref")
                    .and_then(Value::as_str)
                    .and_then(|pointer| self.lookup(pointer))
                {
                    return self.resolve_with_depth(target, depth + 1);
                }

                let mut result = serde_json::Map::new();
                for (key, value) in obj {
                    let resolved = match key.as_str() {
                        "properties" => self.resolve_properties(value, depth),
                        "items" => self.resolve_with_depth(value, depth + 1),
                        "additionalProperties" if value.is_object() => {
                            self.resolve_with_depth(value, depth + 1)
                        }
                        "allOf" | "oneOf" | "anyOf" => self.resolve_array(value, depth),
                        _ => value.clone(),
                    };
                    result.insert(key.clone(), resolved);
                }
                Value::Object(result)
            }
            _ => schema.clone(),
        }
    }

    fn lookup(&self, reference: &str) -> Option<&'a Value> {
        // Only document-local references; remote ones are left as-is
        reference
            .strip_prefix('#')
            .and_then(|pointer| self.root.pointer(pointer))
    }

    fn resolve_properties(&self, value: &Value, depth: usize) -> Value {
        match value.as_object() {
            Some(obj) => Value::Object(
                obj.iter()
                    .map(|(key, prop)| (key.clone(), self.resolve_with_depth(prop, depth + 1)))
                    .collect(),
            ),
            None => value.clone(),
        }
    }

    fn resolve_array(&self, value: &Value, depth: usize) -> Value {
        match value.as_array() {
            Some(arr) => Value::Array(
                arr.iter()
                    .map(|item| self.resolve_with_depth(item, depth + 1))
                    .collect(),
            ),
            None => value.clone(),
        }
    }
}

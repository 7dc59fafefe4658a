//! Self-describing JSON rendering of variables and type nodes.
//!
//! Every object carries a `_type` tag naming its variant. Type references are
//! resolved through the registry while rendering; a reference that resolves
//! to nothing is emitted as its bare name.
//!
//! ## Cycles
//!
//! A node that is already being rendered further up (a list node reached
//! again through its `next` pointer) is emitted as a marker instead of being
//! expanded a second time:
//!
//! ```json
//! {"_type": "Reference", "kind": "Structure", "name": "list_node"}
//! ```

use std::collections::HashSet;

use serde_json::{json, Value};

use super::graph::{Field, TypeCategory, TypeNode, TypeRef, TypeRegistry, Variable};

/// Variant tag of the cycle marker object.
pub const REFERENCE_TAG: &str = "Reference";

pub struct JsonWriter<'a>
{
    registry: &'a TypeRegistry,
    in_progress: HashSet<(TypeCategory, &'a str)>,
}

impl<'a> JsonWriter<'a>
{
    pub fn new(registry: &'a TypeRegistry) -> Self
    {
        Self {
            registry,
            in_progress: HashSet::new(),
        }
    }

    pub fn variable(&mut self, variable: &'a Variable) -> Value
    {
        json!({
            "_type": "Variable",
            "name": variable.name,
            "address": variable.address.value(),
            "type": self.reference(&variable.ty),
        })
    }

    /// Render whatever `reference` resolves to.
    pub fn reference(&mut self, reference: &'a TypeRef) -> Value
    {
        match self.registry.resolve_ref(reference).node() {
            Some(node) => self.node(node),
            None => Value::String(reference.name().to_string()),
        }
    }

    pub fn node(&mut self, node: &'a TypeNode) -> Value
    {
        let key = (node.category(), node.name());
        if !self.in_progress.insert(key) {
            return json!({
                "_type": REFERENCE_TAG,
                "kind": node.kind(),
                "name": node.name(),
            });
        }

        let value = match node {
            TypeNode::Base { name, size } => json!({
                "_type": node.kind(),
                "name": name,
                "size": size,
            }),
            TypeNode::Typedef { name, target } | TypeNode::Pointer { name, target } | TypeNode::Constant { name, target } => {
                json!({
                    "_type": node.kind(),
                    "name": name,
                    "type": self.reference(target),
                })
            }
            TypeNode::Structure { name, size, fields } => {
                let fields: Vec<Value> = fields.iter().map(|field| self.field(field)).collect();
                json!({
                    "_type": node.kind(),
                    "name": name,
                    "size": size,
                    "fields": fields,
                })
            }
            TypeNode::Union { name, size, members } => {
                let members: Vec<Value> = members
                    .iter()
                    .map(|member| {
                        json!({
                            "_type": "Member",
                            "name": member.name,
                            "type": self.reference(&member.ty),
                        })
                    })
                    .collect();
                json!({
                    "_type": node.kind(),
                    "name": name,
                    "size": size,
                    "members": members,
                })
            }
            TypeNode::Enumeration { name, size, enumerators } => {
                let enumerators: Vec<Value> = enumerators
                    .iter()
                    .map(|e| json!({ "_type": "Enumerator", "name": e.name, "value": e.value }))
                    .collect();
                json!({
                    "_type": node.kind(),
                    "name": name,
                    "size": size,
                    "enumerators": enumerators,
                })
            }
            TypeNode::Array { name, element, dimensions } => json!({
                "_type": node.kind(),
                "name": name,
                "type": self.reference(element),
                "dimension": dimensions.as_slice(),
            }),
            TypeNode::SubRoutine { name } => json!({
                "_type": node.kind(),
                "name": name,
            }),
        };

        self.in_progress.remove(&key);
        value
    }

    fn field(&mut self, field: &'a Field) -> Value
    {
        json!({
            "_type": "Field",
            "name": field.name,
            "offset": field.offset,
            "bit_offset": field.bit_offset,
            "bit_size": field.bit_size,
            "type": self.reference(&field.ty),
        })
    }
}

#[cfg(test)]
mod tests
{
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::symbols::graph::{Enumerator, Member};
    use crate::types::Address;

    fn registry(nodes: Vec<TypeNode>) -> TypeRegistry
    {
        let mut registry = TypeRegistry::new();
        for node in nodes {
            registry.insert(node);
        }
        registry
    }

    #[test]
    fn test_variable_of_base_type()
    {
        let registry = registry(vec![TypeNode::Base {
            name: "unsigned char".to_string(),
            size: 1,
        }]);
        let variable = Variable {
            name: "v".to_string(),
            address: Address::new(0x0840_0000),
            ty: TypeRef::from("unsigned char"),
        };

        assert_eq!(
            JsonWriter::new(&registry).variable(&variable),
            json!({
                "_type": "Variable",
                "name": "v",
                "address": 0x0840_0000,
                "type": {"_type": "BaseType", "name": "unsigned char", "size": 1},
            })
        );
    }

    #[test]
    fn test_structure_keeps_field_order_and_null_bits()
    {
        let registry = registry(vec![
            TypeNode::Base {
                name: "int".to_string(),
                size: 4,
            },
            TypeNode::Structure {
                name: "point".to_string(),
                size: 8,
                fields: vec![
                    Field {
                        name: "y".to_string(),
                        ty: TypeRef::from("int"),
                        offset: 0,
                        bit_offset: None,
                        bit_size: None,
                    },
                    Field {
                        name: "x".to_string(),
                        ty: TypeRef::from("int"),
                        offset: 4,
                        bit_offset: Some(0),
                        bit_size: Some(4),
                    },
                ],
            },
        ]);
        let point = registry.resolve("point").node().unwrap();
        let value = JsonWriter::new(&registry).node(point);

        let fields = value["fields"].as_array().unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["y", "x"]);
        assert_eq!(fields[0]["bit_offset"], Value::Null);
        assert_eq!(fields[0]["bit_size"], Value::Null);
        assert_eq!(fields[1]["bit_size"], json!(4));
        assert_eq!(value["size"], json!(8));
    }

    #[test]
    fn test_self_referential_structure_emits_marker()
    {
        let registry = registry(vec![
            TypeNode::Pointer {
                name: "anonymous_60".to_string(),
                target: TypeRef::from("node"),
            },
            TypeNode::Structure {
                name: "node".to_string(),
                size: 4,
                fields: vec![Field {
                    name: "next".to_string(),
                    ty: TypeRef::from("anonymous_60"),
                    offset: 0,
                    bit_offset: None,
                    bit_size: None,
                }],
            },
        ]);
        let node = registry.resolve("node").node().unwrap();
        let value = JsonWriter::new(&registry).node(node);

        assert_eq!(
            value["fields"][0]["type"],
            json!({
                "_type": "Pointer",
                "name": "anonymous_60",
                "type": {"_type": "Reference", "kind": "Structure", "name": "node"},
            })
        );
    }

    #[test]
    fn test_sibling_references_are_expanded_twice()
    {
        let registry = registry(vec![
            TypeNode::Base {
                name: "int".to_string(),
                size: 4,
            },
            TypeNode::Union {
                name: "word".to_string(),
                size: 4,
                members: vec![
                    Member {
                        name: "a".to_string(),
                        ty: TypeRef::from("int"),
                    },
                    Member {
                        name: "b".to_string(),
                        ty: TypeRef::from("int"),
                    },
                ],
            },
        ]);
        let word = registry.resolve("word").node().unwrap();
        let value = JsonWriter::new(&registry).node(word);
        assert_eq!(value["members"][0]["type"], value["members"][1]["type"]);
        assert_eq!(value["members"][1]["type"]["_type"], json!("BaseType"));
    }

    #[test]
    fn test_unresolved_reference_is_bare_name()
    {
        let registry = registry(vec![
            TypeNode::Typedef {
                name: "handle_t".to_string(),
                target: TypeRef::from("void"),
            },
            TypeNode::Enumeration {
                name: "state".to_string(),
                size: 1,
                enumerators: vec![Enumerator {
                    name: "IDLE".to_string(),
                    value: 0,
                }],
            },
        ]);
        let mut writer = JsonWriter::new(&registry);
        let handle = registry.resolve("handle_t").node().unwrap();
        assert_eq!(writer.node(handle)["type"], json!("void"));

        let state = registry.resolve("state").node().unwrap();
        assert_eq!(
            writer.node(state)["enumerators"],
            json!([{"_type": "Enumerator", "name": "IDLE", "value": 0}])
        );
    }

    #[test]
    fn test_typedef_sharing_its_structure_name_resolves_to_itself()
    {
        // typedef struct sensor { ... } sensor;
        let registry = registry(vec![
            TypeNode::Typedef {
                name: "sensor".to_string(),
                target: TypeRef::from("sensor"),
            },
            TypeNode::Structure {
                name: "sensor".to_string(),
                size: 4,
                fields: vec![Field {
                    name: "raw".to_string(),
                    ty: TypeRef::from("void"),
                    offset: 0,
                    bit_offset: None,
                    bit_size: None,
                }],
            },
        ]);
        let sensor = registry.resolve("sensor").node().unwrap();
        assert_eq!(
            JsonWriter::new(&registry).node(sensor),
            json!({
                "_type": "TypedefType",
                "name": "sensor",
                "type": {"_type": "Reference", "kind": "TypedefType", "name": "sensor"},
            })
        );
    }
}

//! The flattened descriptor graph.
//!
//! Entities reference one another only by fully-qualified name; the raw
//! descriptors are never stored here. The context is serialized as the
//! plugin's JSON payload.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::options::CustomOptions;
use crate::raw_options::RawOptions;

/// Options resolved on one descriptor, keyed by the option's fully-qualified
/// name.
pub type OptionMap = BTreeMap<String, Value>;

/// The kind of a stored entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    File,
    Service,
    Method,
    Message,
    Field,
    Enum,
    EnumValue,
}

impl EntityKind {
    /// The name of the entity mapping holding the full record.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::File => "files",
            EntityKind::Service => "services",
            EntityKind::Method => "methods",
            EntityKind::Message => "messages",
            EntityKind::Field => "fields",
            EntityKind::Enum => "enums",
            EntityKind::EnumValue => "enum_values",
        }
    }
}

/// A cross-reference record: where the full entity lives, which file owns
/// it, and the fully-qualified name of its enclosing declaration, if any.
#[derive(Clone, Debug, Serialize)]
pub struct IndexEntry {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub collection: &'static str,
    pub file: String,
    pub parent: String,
}

/// A parsed Protobuf file.
///
/// The six child lists are flattened across all nesting levels within the
/// file and preserve declaration order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct File {
    pub name: String,
    pub package: String,
    pub description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: OptionMap,
    pub services: Vec<String>,
    pub methods: Vec<String>,
    pub messages: Vec<String>,
    pub fields: Vec<String>,
    pub enums: Vec<String>,
    pub enum_values: Vec<String>,
}

/// A parsed service.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Service {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: OptionMap,
}

/// A parsed service method.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Method {
    pub name: String,
    pub full_name: String,
    pub input_type: String,
    pub output_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: OptionMap,
}

/// A parsed message.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Message {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub is_map_entry: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: OptionMap,
    pub fields: Vec<String>,
    pub messages: Vec<String>,
    pub enums: Vec<String>,
}

/// A parsed message field.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Field {
    pub name: String,
    pub full_name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub r#type: String,
    pub full_type: String,
    pub description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: OptionMap,
}

/// A parsed enum.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Enum {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub values: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: OptionMap,
}

/// A parsed enum value.
#[derive(Clone, Debug, Default, Serialize)]
pub struct EnumValue {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub value: i32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: OptionMap,
}

/// Carries state through the compilation and serializes as the JSON payload.
///
/// Callers must not store the same fully-qualified name twice within one
/// compilation unit; writes are last-one-wins.
#[derive(Debug, Default, Serialize)]
pub struct Context {
    #[serde(skip)]
    pub custom_options: CustomOptions,
    #[serde(skip)]
    pub raw_options: RawOptions,
    pub index: BTreeMap<String, IndexEntry>,
    pub files: BTreeMap<String, File>,
    pub services: BTreeMap<String, Service>,
    pub methods: BTreeMap<String, Method>,
    pub messages: BTreeMap<String, Message>,
    pub fields: BTreeMap<String, Field>,
    pub enums: BTreeMap<String, Enum>,
    pub enum_values: BTreeMap<String, EnumValue>,
}

impl Context {
    pub fn new() -> Context {
        Context::default()
    }

    /// Stores a file under its name. Files have no parent.
    pub fn store_file(&mut self, file: File) {
        self.index_entity(file.name.clone(), EntityKind::File, &file.name, None);
        self.files.insert(file.name.clone(), file);
    }

    pub fn store_service(&mut self, service: Service, file: &str) {
        self.index_entity(service.full_name.clone(), EntityKind::Service, file, None);
        self.services.insert(service.full_name.clone(), service);
    }

    pub fn store_method(&mut self, method: Method, file: &str, service: &str) {
        self.index_entity(
            method.full_name.clone(),
            EntityKind::Method,
            file,
            Some(service),
        );
        self.methods.insert(method.full_name.clone(), method);
    }

    pub fn store_message(&mut self, message: Message, file: &str, parent: Option<&str>) {
        self.index_entity(message.full_name.clone(), EntityKind::Message, file, parent);
        self.messages.insert(message.full_name.clone(), message);
    }

    pub fn store_field(&mut self, field: Field, file: &str, message: &str) {
        self.index_entity(
            field.full_name.clone(),
            EntityKind::Field,
            file,
            Some(message),
        );
        self.fields.insert(field.full_name.clone(), field);
    }

    pub fn store_enum(&mut self, enumeration: Enum, file: &str, parent: Option<&str>) {
        self.index_entity(
            enumeration.full_name.clone(),
            EntityKind::Enum,
            file,
            parent,
        );
        self.enums.insert(enumeration.full_name.clone(), enumeration);
    }

    pub fn store_enum_value(&mut self, value: EnumValue, file: &str, enumeration: &str) {
        self.index_entity(
            value.full_name.clone(),
            EntityKind::EnumValue,
            file,
            Some(enumeration),
        );
        self.enum_values.insert(value.full_name.clone(), value);
    }

    fn index_entity(&mut self, fqn: String, kind: EntityKind, file: &str, parent: Option<&str>) {
        self.index.insert(
            fqn,
            IndexEntry {
                kind,
                collection: kind.collection(),
                file: file.to_string(),
                parent: parent.unwrap_or("").to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_index_entry_names_its_collection() {
        let mut context = Context::new();
        context.store_file(File {
            name: "a.proto".to_string(),
            ..File::default()
        });
        context.store_message(
            Message {
                full_name: "p.M".to_string(),
                ..Message::default()
            },
            "a.proto",
            None,
        );
        context.store_field(
            Field {
                full_name: "p.M.x".to_string(),
                ..Field::default()
            },
            "a.proto",
            "p.M",
        );

        let entry = &context.index["a.proto"];
        assert_eq!(EntityKind::File, entry.kind);
        assert_eq!("files", entry.collection);
        assert_eq!("a.proto", entry.file);
        assert_eq!("", entry.parent);

        let entry = &context.index["p.M.x"];
        assert_eq!(EntityKind::Field, entry.kind);
        assert_eq!("fields", entry.collection);
        assert_eq!("p.M", entry.parent);
    }

    #[test]
    fn entity_kinds_serialize_snake_case() {
        assert_eq!(
            "\"enum_value\"",
            serde_json::to_string(&EntityKind::EnumValue).unwrap()
        );
        assert_eq!("\"file\"", serde_json::to_string(&EntityKind::File).unwrap());
    }

    #[test]
    fn empty_options_are_omitted_from_json() {
        let message = Message {
            full_name: "p.M".to_string(),
            ..Message::default()
        };
        let json = serde_json::to_value(&message).unwrap();
        assert!(json.get("options").is_none());
        assert_eq!(serde_json::json!([]), json["fields"]);
        assert_eq!(serde_json::json!(false), json["is_map_entry"]);
    }
}

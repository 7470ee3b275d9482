//! Custom option discovery and decoding.
//!
//! Custom options are extensions of the seven `google.protobuf.*Options`
//! messages. Their schemas are collected from the extension declarations in
//! the compiled files; their values are decoded from the raw bytes of each
//! descriptor's options message, because the declared proto type (not the
//! wire type alone) decides how the payload bits are interpreted.

use std::collections::BTreeMap;

use base64::prelude::BASE64_STANDARD;
use base64::Engine as _;
use log::warn;
use prost_types::field_descriptor_proto::Type;
use prost_types::{FieldDescriptorProto, FileDescriptorProto};
use serde_json::{json, Value};

use crate::context::{Context, OptionMap};
use crate::fqn;
use crate::raw_options::RawOptions;
use crate::wire::{self, WireType};

/// A custom option declared by an extension in one of the compiled files.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomOptionDef {
    pub number: i32,
    pub name: String,
    pub full_name: String,
    pub r#type: Type,
    pub type_name: String,
}

impl CustomOptionDef {
    fn from_extension(
        file: &FileDescriptorProto,
        extension: &FieldDescriptorProto,
    ) -> CustomOptionDef {
        // The declaring file's package scopes the option's name.
        let full_name = fqn::join(file.package(), extension.name());

        // The type name is empty for scalar extensions; fall back to the
        // type enumerator so the definition always names something.
        let mut type_name = extension.type_name().to_string();
        if type_name.is_empty() {
            type_name = extension.r#type().as_str_name().to_string();
        }

        CustomOptionDef {
            number: extension.number(),
            name: extension.name().to_string(),
            full_name,
            r#type: extension.r#type(),
            type_name,
        }
    }
}

/// The schemas of every custom option declared in the compilation unit, one
/// submap per extendable options message, keyed by extension number.
#[derive(Clone, Debug, Default)]
pub struct CustomOptions {
    pub file: BTreeMap<i32, CustomOptionDef>,
    pub message: BTreeMap<i32, CustomOptionDef>,
    pub field: BTreeMap<i32, CustomOptionDef>,
    pub enumeration: BTreeMap<i32, CustomOptionDef>,
    pub enum_value: BTreeMap<i32, CustomOptionDef>,
    pub service: BTreeMap<i32, CustomOptionDef>,
    pub method: BTreeMap<i32, CustomOptionDef>,
}

impl CustomOptions {
    /// Routes an extendee name to the submap it feeds. Extensions of
    /// anything but the seven well-known options messages get `None`.
    fn defs_mut(&mut self, extendee: &str) -> Option<&mut BTreeMap<i32, CustomOptionDef>> {
        match extendee {
            ".google.protobuf.FileOptions" => Some(&mut self.file),
            ".google.protobuf.MessageOptions" => Some(&mut self.message),
            ".google.protobuf.FieldOptions" => Some(&mut self.field),
            ".google.protobuf.EnumOptions" => Some(&mut self.enumeration),
            ".google.protobuf.EnumValueOptions" => Some(&mut self.enum_value),
            ".google.protobuf.ServiceOptions" => Some(&mut self.service),
            ".google.protobuf.MethodOptions" => Some(&mut self.method),
            _ => None,
        }
    }
}

/// Collects the custom option extensions declared by any of `files`.
///
/// Later extensions with the same number overwrite earlier ones in the same
/// submap.
pub fn collect_definitions(files: &[FileDescriptorProto]) -> CustomOptions {
    let mut options = CustomOptions::default();
    for file in files {
        for extension in &file.extension {
            let defs = match options.defs_mut(extension.extendee()) {
                Some(defs) => defs,
                None => continue,
            };
            defs.insert(
                extension.number(),
                CustomOptionDef::from_extension(file, extension),
            );
        }
    }
    options
}

/// Seeds an options map with the predefined options every descriptor kind
/// shares. `deprecated` is the only one carried over.
pub(crate) fn predefined(deprecated: bool) -> OptionMap {
    let mut options = OptionMap::new();
    if deprecated {
        options.insert("deprecated".to_string(), Value::from(true));
    }
    options
}

/// Decodes the options set on every stored entity against the collected
/// schemas.
///
/// Must run after the graph walk: a message-typed option may name an entity
/// any of the walked files created.
pub fn resolve_all(context: &mut Context) {
    let Context {
        custom_options,
        raw_options,
        files,
        services,
        methods,
        messages,
        fields,
        enums,
        enum_values,
        ..
    } = context;

    resolve_kind(
        files.iter_mut().map(|(name, file)| (name.as_str(), &mut file.options)),
        &custom_options.file,
        raw_options,
    );
    resolve_kind(
        messages.iter_mut().map(|(fqn, message)| (fqn.as_str(), &mut message.options)),
        &custom_options.message,
        raw_options,
    );
    resolve_kind(
        fields.iter_mut().map(|(fqn, field)| (fqn.as_str(), &mut field.options)),
        &custom_options.field,
        raw_options,
    );
    resolve_kind(
        enums.iter_mut().map(|(fqn, enumeration)| (fqn.as_str(), &mut enumeration.options)),
        &custom_options.enumeration,
        raw_options,
    );
    resolve_kind(
        enum_values.iter_mut().map(|(fqn, value)| (fqn.as_str(), &mut value.options)),
        &custom_options.enum_value,
        raw_options,
    );
    resolve_kind(
        services.iter_mut().map(|(fqn, service)| (fqn.as_str(), &mut service.options)),
        &custom_options.service,
        raw_options,
    );
    resolve_kind(
        methods.iter_mut().map(|(fqn, method)| (fqn.as_str(), &mut method.options)),
        &custom_options.method,
        raw_options,
    );
}

fn resolve_kind<'a>(
    entities: impl Iterator<Item = (&'a str, &'a mut OptionMap)>,
    defs: &BTreeMap<i32, CustomOptionDef>,
    raw_options: &RawOptions,
) {
    for (name, options) in entities {
        if let Some(raw) = raw_options.get(name) {
            options.extend(decode_options(name, raw, defs));
        }
    }
}

/// Decodes the raw bytes of one options message against the schema submap
/// for its extendee kind, yielding a value per recognized option keyed by
/// the option's fully-qualified name.
///
/// Unknown field numbers are skipped by wire type. A malformed byte stream
/// abandons the whole blob: the failure is logged with the entity's name and
/// the result is empty.
pub fn decode_options(
    entity_name: &str,
    raw: &[u8],
    defs: &BTreeMap<i32, CustomOptionDef>,
) -> OptionMap {
    let mut options = OptionMap::new();
    let mut buf = raw;
    while !buf.is_empty() {
        match decode_next(&mut buf, defs) {
            Ok(Some((name, value))) => {
                options.insert(name, value);
            }
            Ok(None) => {}
            Err(error) => {
                warn!(
                    "failed to parse options for entity {}: {} (raw: {:?})",
                    entity_name, error, raw
                );
                return OptionMap::new();
            }
        }
    }
    options
}

fn decode_next(
    buf: &mut &[u8],
    defs: &BTreeMap<i32, CustomOptionDef>,
) -> Result<Option<(String, Value)>, wire::DecodeError> {
    let (tag, wire_type) = wire::decode_key(buf)?;

    let def = match defs.get(&(tag as i32)) {
        Some(def) => def,
        None => {
            wire::skip_field(tag, wire_type, buf)?;
            return Ok(None);
        }
    };

    // Decode the payload by its wire type first; the declared proto type
    // decides below how the bits are interpreted.
    let mut uint = 0u64;
    let mut payload: &[u8] = &[];
    match wire_type {
        WireType::Varint => uint = wire::decode_varint(buf)?,
        WireType::SixtyFourBit => uint = wire::decode_fixed64(buf)?,
        WireType::LengthDelimited => payload = wire::decode_length_delimited(buf)?,
        WireType::StartGroup => payload = wire::decode_group(tag, buf)?,
        // An end-group key has no payload and cannot open an option value.
        WireType::EndGroup => return Ok(None),
        WireType::ThirtyTwoBit => uint = u64::from(wire::decode_fixed32(buf)?),
    }

    // `sint32` and `int32` are both varints on the wire; only the declared
    // type tells the encodings apart.
    let value = match def.r#type {
        Type::Double => Value::from(f64::from_bits(uint)),
        Type::Float => Value::from(f64::from(f32::from_bits(uint as u32))),
        Type::Int64 | Type::Int32 | Type::Sfixed64 | Type::Sfixed32 => Value::from(uint as i64),
        Type::Uint64 | Type::Uint32 | Type::Fixed64 | Type::Fixed32 => Value::from(uint),
        Type::Bool => Value::from(uint != 0),
        Type::String => Value::from(String::from_utf8_lossy(payload).into_owned()),
        Type::Group => Value::from("TODO: PARSE GROUPS"),
        Type::Message => Value::from(def.type_name.clone()),
        Type::Bytes => Value::from(BASE64_STANDARD.encode(payload)),
        Type::Enum => json!({
            "enum_type": fqn::strip_leading_dot(&def.type_name),
            "enum_value": uint,
        }),
        Type::Sint32 | Type::Sint64 => Value::from(wire::decode_zigzag(uint)),
    };

    Ok(Some((def.full_name.clone(), value)))
}

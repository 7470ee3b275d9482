//! Recovers the raw bytes of every descriptor's options message.
//!
//! Custom option values live in the unknown fields of the standard options
//! messages, and `prost-types` drops unknown fields while decoding the
//! request. The harvest walks the serialized request again at the wire
//! level, in lockstep with the decoded descriptor set, and records each
//! options submessage under its owner's fully-qualified name (file options
//! are keyed by file name). Option values are decoded from these bytes once
//! the graph walk is done.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use bytes::Bytes;
use log::warn;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FileDescriptorProto, ServiceDescriptorProto,
};

use crate::fqn;
use crate::locations::{
    CodeGeneratorRequestLocations, DescriptorProtoLocations, EnumDescriptorProtoLocations,
    EnumValueDescriptorProtoLocations, FieldDescriptorProtoLocations,
    FileDescriptorProtoLocations, MethodDescriptorProtoLocations,
    ServiceDescriptorProtoLocations,
};
use crate::wire::{self, WireType};

/// Raw options bytes keyed by the owning descriptor's fully-qualified name.
pub type RawOptions = HashMap<String, Bytes>;

/// Walks the serialized request and collects the raw options bytes of every
/// descriptor in it.
///
/// The bytes come straight from `protoc`, so a parse failure means the
/// request itself is damaged; the harvest logs it and keeps whatever it
/// collected so far. Descriptors without a recorded entry simply resolve to
/// no options later.
pub fn harvest(request: &[u8], files: &[FileDescriptorProto]) -> RawOptions {
    let mut table = RawOptions::new();
    if let Err(error) = harvest_request(request, files, &mut table) {
        warn!("failed to re-read descriptor options from the request: {}", error);
    }
    table
}

fn harvest_request(
    mut buf: &[u8],
    files: &[FileDescriptorProto],
    table: &mut RawOptions,
) -> Result<(), wire::DecodeError> {
    // proto_file payloads appear in the order the decoded vector holds them.
    let mut file_idx = 0;
    while !buf.is_empty() {
        let (tag, wire_type) = wire::decode_key(&mut buf)?;
        match tag as i32 {
            CodeGeneratorRequestLocations::PROTO_FILE
                if wire_type == WireType::LengthDelimited =>
            {
                let payload = wire::decode_length_delimited(&mut buf)?;
                if let Some(file) = files.get(file_idx) {
                    harvest_file(payload, file, table)?;
                }
                file_idx += 1;
            }
            _ => wire::skip_field(tag, wire_type, &mut buf)?,
        }
    }
    Ok(())
}

fn harvest_file(
    mut buf: &[u8],
    file: &FileDescriptorProto,
    table: &mut RawOptions,
) -> Result<(), wire::DecodeError> {
    let package = file.package();
    let mut messages = 0;
    let mut enums = 0;
    let mut services = 0;
    while !buf.is_empty() {
        let (tag, wire_type) = wire::decode_key(&mut buf)?;
        match tag as i32 {
            FileDescriptorProtoLocations::MESSAGE_TYPE
                if wire_type == WireType::LengthDelimited =>
            {
                let payload = wire::decode_length_delimited(&mut buf)?;
                if let Some(message) = file.message_type.get(messages) {
                    harvest_message(payload, message, package, table)?;
                }
                messages += 1;
            }
            FileDescriptorProtoLocations::ENUM_TYPE
                if wire_type == WireType::LengthDelimited =>
            {
                let payload = wire::decode_length_delimited(&mut buf)?;
                if let Some(enumeration) = file.enum_type.get(enums) {
                    harvest_enum(payload, enumeration, package, table)?;
                }
                enums += 1;
            }
            FileDescriptorProtoLocations::SERVICE if wire_type == WireType::LengthDelimited => {
                let payload = wire::decode_length_delimited(&mut buf)?;
                if let Some(service) = file.service.get(services) {
                    harvest_service(payload, service, package, table)?;
                }
                services += 1;
            }
            FileDescriptorProtoLocations::OPTIONS if wire_type == WireType::LengthDelimited => {
                let payload = wire::decode_length_delimited(&mut buf)?;
                record(table, file.name().to_string(), payload);
            }
            _ => wire::skip_field(tag, wire_type, &mut buf)?,
        }
    }
    Ok(())
}

fn harvest_message(
    mut buf: &[u8],
    message: &DescriptorProto,
    prefix: &str,
    table: &mut RawOptions,
) -> Result<(), wire::DecodeError> {
    let full_name = fqn::join(prefix, message.name());
    let mut fields = 0;
    let mut nested = 0;
    let mut enums = 0;
    while !buf.is_empty() {
        let (tag, wire_type) = wire::decode_key(&mut buf)?;
        match tag as i32 {
            DescriptorProtoLocations::FIELD if wire_type == WireType::LengthDelimited => {
                let payload = wire::decode_length_delimited(&mut buf)?;
                if let Some(field) = message.field.get(fields) {
                    harvest_leaf(
                        payload,
                        FieldDescriptorProtoLocations::OPTIONS,
                        fqn::join(&full_name, field.name()),
                        table,
                    )?;
                }
                fields += 1;
            }
            DescriptorProtoLocations::NESTED_TYPE
                if wire_type == WireType::LengthDelimited =>
            {
                let payload = wire::decode_length_delimited(&mut buf)?;
                if let Some(inner) = message.nested_type.get(nested) {
                    harvest_message(payload, inner, &full_name, table)?;
                }
                nested += 1;
            }
            DescriptorProtoLocations::ENUM_TYPE if wire_type == WireType::LengthDelimited => {
                let payload = wire::decode_length_delimited(&mut buf)?;
                if let Some(enumeration) = message.enum_type.get(enums) {
                    harvest_enum(payload, enumeration, &full_name, table)?;
                }
                enums += 1;
            }
            DescriptorProtoLocations::OPTIONS if wire_type == WireType::LengthDelimited => {
                let payload = wire::decode_length_delimited(&mut buf)?;
                record(table, full_name.clone(), payload);
            }
            _ => wire::skip_field(tag, wire_type, &mut buf)?,
        }
    }
    Ok(())
}

fn harvest_enum(
    mut buf: &[u8],
    enumeration: &EnumDescriptorProto,
    prefix: &str,
    table: &mut RawOptions,
) -> Result<(), wire::DecodeError> {
    let full_name = fqn::join(prefix, enumeration.name());
    let mut values = 0;
    while !buf.is_empty() {
        let (tag, wire_type) = wire::decode_key(&mut buf)?;
        match tag as i32 {
            EnumDescriptorProtoLocations::VALUE if wire_type == WireType::LengthDelimited => {
                let payload = wire::decode_length_delimited(&mut buf)?;
                if let Some(value) = enumeration.value.get(values) {
                    harvest_leaf(
                        payload,
                        EnumValueDescriptorProtoLocations::OPTIONS,
                        fqn::join(&full_name, value.name()),
                        table,
                    )?;
                }
                values += 1;
            }
            EnumDescriptorProtoLocations::OPTIONS
                if wire_type == WireType::LengthDelimited =>
            {
                let payload = wire::decode_length_delimited(&mut buf)?;
                record(table, full_name.clone(), payload);
            }
            _ => wire::skip_field(tag, wire_type, &mut buf)?,
        }
    }
    Ok(())
}

fn harvest_service(
    mut buf: &[u8],
    service: &ServiceDescriptorProto,
    prefix: &str,
    table: &mut RawOptions,
) -> Result<(), wire::DecodeError> {
    let full_name = fqn::join(prefix, service.name());
    let mut methods = 0;
    while !buf.is_empty() {
        let (tag, wire_type) = wire::decode_key(&mut buf)?;
        match tag as i32 {
            ServiceDescriptorProtoLocations::METHOD
                if wire_type == WireType::LengthDelimited =>
            {
                let payload = wire::decode_length_delimited(&mut buf)?;
                if let Some(method) = service.method.get(methods) {
                    harvest_leaf(
                        payload,
                        MethodDescriptorProtoLocations::OPTIONS,
                        fqn::join(&full_name, method.name()),
                        table,
                    )?;
                }
                methods += 1;
            }
            ServiceDescriptorProtoLocations::OPTIONS
                if wire_type == WireType::LengthDelimited =>
            {
                let payload = wire::decode_length_delimited(&mut buf)?;
                record(table, full_name.clone(), payload);
            }
            _ => wire::skip_field(tag, wire_type, &mut buf)?,
        }
    }
    Ok(())
}

/// Records the options submessage (field number `options_tag`) of a leaf
/// descriptor that has no descriptor children of its own.
fn harvest_leaf(
    mut buf: &[u8],
    options_tag: i32,
    owner: String,
    table: &mut RawOptions,
) -> Result<(), wire::DecodeError> {
    while !buf.is_empty() {
        let (tag, wire_type) = wire::decode_key(&mut buf)?;
        if tag as i32 == options_tag && wire_type == WireType::LengthDelimited {
            let payload = wire::decode_length_delimited(&mut buf)?;
            record(table, owner.clone(), payload);
        } else {
            wire::skip_field(tag, wire_type, &mut buf)?;
        }
    }
    Ok(())
}

fn record(table: &mut RawOptions, owner: String, payload: &[u8]) {
    match table.entry(owner) {
        // Split submessages merge by concatenation on the wire.
        Entry::Occupied(mut entry) => {
            let mut merged = entry.get().to_vec();
            merged.extend_from_slice(payload);
            entry.insert(Bytes::from(merged));
        }
        Entry::Vacant(entry) => {
            entry.insert(Bytes::copy_from_slice(payload));
        }
    }
}

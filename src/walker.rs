//! Recursive descent over one file's descriptor tree.
//!
//! The walker builds the projected entities, appends their fully-qualified
//! names to the enclosing file's (and parent declaration's) child lists, and
//! stores everything in the context. Comments are resolved against the
//! file's `SourceCodeInfo` by tracking the descriptor path of the node being
//! visited.

use log::debug;
use prost_types::source_code_info::Location;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MethodDescriptorProto, ServiceDescriptorProto,
};

use crate::context::{Context, Enum, EnumValue, Field, File, Message, Method, Service};
use crate::fqn;
use crate::locations::{
    DescriptorProtoLocations, EnumDescriptorProtoLocations, FileDescriptorProtoLocations,
    ServiceDescriptorProtoLocations,
};
use crate::options;

pub struct FileWalker<'a> {
    context: &'a mut Context,
    file_name: String,
    package: String,
    locations: Vec<Location>,
    path: Vec<i32>,
}

impl<'a> FileWalker<'a> {
    /// Walks `file`, storing every declaration it contains in `context`.
    pub fn walk(file: &FileDescriptorProto, context: &mut Context) {
        debug!("file: {:?}, package: {:?}", file.name(), file.package());

        let mut locations = file
            .source_code_info
            .as_ref()
            .map(|info| info.location.clone())
            .unwrap_or_default();
        locations.retain(|location| !location.path.is_empty());
        locations.sort_by(|a, b| a.path.cmp(&b.path));

        let mut walker = FileWalker {
            context,
            file_name: file.name().to_string(),
            package: file.package().to_string(),
            locations,
            path: Vec::new(),
        };
        walker.append_file(file);
    }

    fn append_file(&mut self, descriptor: &FileDescriptorProto) {
        let deprecated = descriptor
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());
        let mut file = File {
            name: self.file_name.clone(),
            package: self.package.clone(),
            description: self.comments(&[FileDescriptorProtoLocations::PACKAGE]),
            options: options::predefined(deprecated),
            ..File::default()
        };

        self.path.push(FileDescriptorProtoLocations::SERVICE);
        for (idx, service) in descriptor.service.iter().enumerate() {
            self.path.push(idx as i32);
            self.append_service(service, &mut file);
            self.path.pop();
        }
        self.path.pop();

        self.path.push(FileDescriptorProtoLocations::MESSAGE_TYPE);
        for (idx, message) in descriptor.message_type.iter().enumerate() {
            self.path.push(idx as i32);
            self.append_message(message, None, &mut file);
            self.path.pop();
        }
        self.path.pop();

        self.path.push(FileDescriptorProtoLocations::ENUM_TYPE);
        for (idx, enumeration) in descriptor.enum_type.iter().enumerate() {
            self.path.push(idx as i32);
            self.append_enum(enumeration, None, &mut file);
            self.path.pop();
        }
        self.path.pop();

        self.context.store_file(file);
    }

    fn append_service(&mut self, descriptor: &ServiceDescriptorProto, file: &mut File) {
        debug!("  service: {:?}", descriptor.name());

        let full_name = fqn::join(&self.package, descriptor.name());
        let deprecated = descriptor
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());
        let mut service = Service {
            name: descriptor.name().to_string(),
            full_name: full_name.clone(),
            description: self.description(),
            methods: Vec::new(),
            options: options::predefined(deprecated),
        };

        file.services.push(full_name);

        self.path.push(ServiceDescriptorProtoLocations::METHOD);
        for (idx, method) in descriptor.method.iter().enumerate() {
            self.path.push(idx as i32);
            self.append_method(method, &mut service, file);
            self.path.pop();
        }
        self.path.pop();

        self.context.store_service(service, &self.file_name);
    }

    fn append_method(
        &mut self,
        descriptor: &MethodDescriptorProto,
        service: &mut Service,
        file: &mut File,
    ) {
        let full_name = fqn::join(&service.full_name, descriptor.name());
        let deprecated = descriptor
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());
        let method = Method {
            name: descriptor.name().to_string(),
            full_name: full_name.clone(),
            input_type: fqn::strip_leading_dot(descriptor.input_type()).to_string(),
            output_type: fqn::strip_leading_dot(descriptor.output_type()).to_string(),
            description: self.description(),
            options: options::predefined(deprecated),
        };

        file.methods.push(full_name.clone());
        service.methods.push(full_name);
        self.context
            .store_method(method, &self.file_name, &service.full_name);
    }

    fn append_message(
        &mut self,
        descriptor: &DescriptorProto,
        mut parent: Option<&mut Message>,
        file: &mut File,
    ) {
        debug!("  message: {:?}", descriptor.name());

        let prefix = match parent {
            Some(ref parent) => parent.full_name.clone(),
            None => self.package.clone(),
        };
        let full_name = fqn::join(&prefix, descriptor.name());
        let deprecated = descriptor
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());
        let is_map_entry = descriptor
            .options
            .as_ref()
            .map_or(false, |options| options.map_entry());

        let mut message = Message {
            name: descriptor.name().to_string(),
            full_name: full_name.clone(),
            description: self.description(),
            is_map_entry,
            options: options::predefined(deprecated),
            fields: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
        };

        file.messages.push(full_name.clone());
        if let Some(ref mut parent) = parent {
            parent.messages.push(full_name);
        }

        self.path.push(DescriptorProtoLocations::FIELD);
        for (idx, field) in descriptor.field.iter().enumerate() {
            self.path.push(idx as i32);
            self.append_field(field, &mut message, file);
            self.path.pop();
        }
        self.path.pop();

        self.path.push(DescriptorProtoLocations::NESTED_TYPE);
        for (idx, nested) in descriptor.nested_type.iter().enumerate() {
            self.path.push(idx as i32);
            self.append_message(nested, Some(&mut message), file);
            self.path.pop();
        }
        self.path.pop();

        self.path.push(DescriptorProtoLocations::ENUM_TYPE);
        for (idx, enumeration) in descriptor.enum_type.iter().enumerate() {
            self.path.push(idx as i32);
            self.append_enum(enumeration, Some(&mut message), file);
            self.path.pop();
        }
        self.path.pop();

        let parent_name = parent.map(|parent| parent.full_name.clone());
        self.context
            .store_message(message, &self.file_name, parent_name.as_deref());
    }

    fn append_field(
        &mut self,
        descriptor: &FieldDescriptorProto,
        message: &mut Message,
        file: &mut File,
    ) {
        let full_name = fqn::join(&message.full_name, descriptor.name());

        // Scalar fields carry no type name, so the declared type enumerator
        // is the type; references carry the fully-qualified type name and
        // shorten to its last segment.
        let (r#type, full_type) = if descriptor.type_name().is_empty() {
            let scalar = descriptor
                .r#type()
                .as_str_name()
                .trim_start_matches("TYPE_")
                .to_ascii_lowercase();
            (scalar.clone(), scalar)
        } else {
            let full_type = fqn::strip_leading_dot(descriptor.type_name()).to_string();
            let r#type = full_type
                .rsplit('.')
                .next()
                .unwrap_or(&full_type)
                .to_string();
            (r#type, full_type)
        };
        debug!("    field: {:?}, type: {:?}", descriptor.name(), r#type);

        let deprecated = descriptor
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());
        let field = Field {
            name: descriptor.name().to_string(),
            full_name: full_name.clone(),
            label: descriptor.label().as_str_name().to_string(),
            r#type,
            full_type,
            description: self.description(),
            options: options::predefined(deprecated),
        };

        file.fields.push(full_name.clone());
        message.fields.push(full_name);
        self.context
            .store_field(field, &self.file_name, &message.full_name);
    }

    fn append_enum(
        &mut self,
        descriptor: &EnumDescriptorProto,
        mut parent: Option<&mut Message>,
        file: &mut File,
    ) {
        debug!("  enum: {:?}", descriptor.name());

        let prefix = match parent {
            Some(ref parent) => parent.full_name.clone(),
            None => self.package.clone(),
        };
        let full_name = fqn::join(&prefix, descriptor.name());
        let deprecated = descriptor
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());

        let mut enumeration = Enum {
            name: descriptor.name().to_string(),
            full_name: full_name.clone(),
            description: self.description(),
            values: Vec::new(),
            options: options::predefined(deprecated),
        };

        file.enums.push(full_name.clone());
        if let Some(ref mut parent) = parent {
            parent.enums.push(full_name);
        }

        self.path.push(EnumDescriptorProtoLocations::VALUE);
        for (idx, value) in descriptor.value.iter().enumerate() {
            self.path.push(idx as i32);
            self.append_enum_value(value, &mut enumeration, file);
            self.path.pop();
        }
        self.path.pop();

        let parent_name = parent.map(|parent| parent.full_name.clone());
        self.context
            .store_enum(enumeration, &self.file_name, parent_name.as_deref());
    }

    fn append_enum_value(
        &mut self,
        descriptor: &EnumValueDescriptorProto,
        enumeration: &mut Enum,
        file: &mut File,
    ) {
        let full_name = fqn::join(&enumeration.full_name, descriptor.name());
        let deprecated = descriptor
            .options
            .as_ref()
            .map_or(false, |options| options.deprecated());
        let value = EnumValue {
            name: descriptor.name().to_string(),
            full_name: full_name.clone(),
            description: self.description(),
            value: descriptor.number(),
            options: options::predefined(deprecated),
        };

        file.enum_values.push(full_name.clone());
        enumeration.values.push(full_name);
        self.context
            .store_enum_value(value, &self.file_name, &enumeration.full_name);
    }

    /// Comments attached to the node the path cursor points at.
    fn description(&self) -> String {
        self.comments(&self.path)
    }

    fn comments(&self, path: &[i32]) -> String {
        let idx = match self
            .locations
            .binary_search_by(|location| location.path.as_slice().cmp(path))
        {
            Ok(idx) => idx,
            Err(_) => return String::new(),
        };
        let location = &self.locations[idx];
        let comment = if location.leading_comments().is_empty() {
            location.trailing_comments()
        } else {
            location.leading_comments()
        };
        comment.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{MessageOptions, SourceCodeInfo};

    use super::*;
    use crate::context::EntityKind;

    fn file(name: &str, package: &str) -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some(name.to_string()),
            package: Some(package.to_string()),
            ..FileDescriptorProto::default()
        }
    }

    fn message(name: &str) -> DescriptorProto {
        DescriptorProto {
            name: Some(name.to_string()),
            ..DescriptorProto::default()
        }
    }

    fn scalar_field(name: &str, number: i32, r#type: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(Label::Optional as i32),
            r#type: Some(r#type as i32),
            ..FieldDescriptorProto::default()
        }
    }

    fn walk(descriptor: &FileDescriptorProto) -> Context {
        let mut context = Context::new();
        FileWalker::walk(descriptor, &mut context);
        context
    }

    #[test]
    fn empty_file_has_empty_child_lists() {
        let context = walk(&file("a.proto", "a"));

        let stored = &context.files["a.proto"];
        assert_eq!("a", stored.package);
        assert!(stored.services.is_empty());
        assert!(stored.methods.is_empty());
        assert!(stored.messages.is_empty());
        assert!(stored.fields.is_empty());
        assert!(stored.enums.is_empty());
        assert!(stored.enum_values.is_empty());

        let entry = &context.index["a.proto"];
        assert_eq!(EntityKind::File, entry.kind);
        assert_eq!("files", entry.collection);
        assert_eq!("a.proto", entry.file);
        assert_eq!("", entry.parent);
    }

    #[test]
    fn message_fields_are_projected_and_indexed() {
        let mut descriptor = file("a.proto", "a");
        let mut m = message("M");
        m.field.push(scalar_field("x", 1, Type::Int32));
        descriptor.message_type.push(m);

        let context = walk(&descriptor);

        let stored = &context.messages["a.M"];
        assert_eq!(vec!["a.M.x".to_string()], stored.fields);
        assert!(stored.messages.is_empty());
        assert!(stored.enums.is_empty());
        assert!(!stored.is_map_entry);

        let field = &context.fields["a.M.x"];
        assert_eq!("int32", field.r#type);
        assert_eq!("int32", field.full_type);
        assert_eq!("LABEL_OPTIONAL", field.label);

        assert_eq!("a.M", context.index["a.M.x"].parent);
        assert_eq!("", context.index["a.M"].parent);
    }

    #[test]
    fn nested_messages_link_to_their_parents() {
        let mut descriptor = file("a.proto", "p");
        let mut outer = message("Outer");
        outer.nested_type.push(message("Inner"));
        descriptor.message_type.push(outer);

        let context = walk(&descriptor);

        assert_eq!(
            vec!["p.Outer.Inner".to_string()],
            context.messages["p.Outer"].messages
        );
        assert_eq!("p.Outer", context.index["p.Outer.Inner"].parent);
        assert_eq!(
            vec!["p.Outer".to_string(), "p.Outer.Inner".to_string()],
            context.files["a.proto"].messages
        );
    }

    #[test]
    fn reference_fields_shorten_the_type_name() {
        let mut descriptor = file("a.proto", "pkg");
        let mut m = message("M");
        m.field.push(FieldDescriptorProto {
            name: Some("inner".to_string()),
            number: Some(1),
            label: Some(Label::Optional as i32),
            r#type: Some(Type::Message as i32),
            type_name: Some(".pkg.Outer.Inner".to_string()),
            ..FieldDescriptorProto::default()
        });
        descriptor.message_type.push(m);

        let context = walk(&descriptor);
        let field = &context.fields["pkg.M.inner"];
        assert_eq!("Inner", field.r#type);
        assert_eq!("pkg.Outer.Inner", field.full_type);
    }

    #[test]
    fn services_and_methods_are_projected() {
        let mut descriptor = file("a.proto", "p");
        descriptor.service.push(ServiceDescriptorProto {
            name: Some("S".to_string()),
            method: vec![MethodDescriptorProto {
                name: Some("Do".to_string()),
                input_type: Some(".p.In".to_string()),
                output_type: Some(".p.Out".to_string()),
                ..MethodDescriptorProto::default()
            }],
            options: None,
        });

        let context = walk(&descriptor);

        assert_eq!(vec!["p.S".to_string()], context.files["a.proto"].services);
        assert_eq!(vec!["p.S.Do".to_string()], context.files["a.proto"].methods);
        assert_eq!(vec!["p.S.Do".to_string()], context.services["p.S"].methods);

        let method = &context.methods["p.S.Do"];
        assert_eq!("p.In", method.input_type);
        assert_eq!("p.Out", method.output_type);

        assert_eq!("p.S", context.index["p.S.Do"].parent);
        assert_eq!("", context.index["p.S"].parent);
        assert_eq!(EntityKind::Service, context.index["p.S"].kind);
        assert_eq!(EntityKind::Method, context.index["p.S.Do"].kind);
    }

    #[test]
    fn enums_and_values_are_projected() {
        let mut descriptor = file("a.proto", "p");
        descriptor.enum_type.push(EnumDescriptorProto {
            name: Some("E".to_string()),
            value: vec![EnumValueDescriptorProto {
                name: Some("A".to_string()),
                number: Some(-4),
                options: None,
            }],
            ..EnumDescriptorProto::default()
        });
        let mut m = message("M");
        m.enum_type.push(EnumDescriptorProto {
            name: Some("N".to_string()),
            ..EnumDescriptorProto::default()
        });
        descriptor.message_type.push(m);

        let context = walk(&descriptor);

        assert_eq!(vec!["p.E.A".to_string()], context.enums["p.E"].values);
        assert_eq!(-4, context.enum_values["p.E.A"].value);
        assert_eq!("p.E", context.index["p.E.A"].parent);
        assert_eq!("", context.index["p.E"].parent);
        assert_eq!("p.M", context.index["p.M.N"].parent);
        assert_eq!(vec!["p.M.N".to_string()], context.messages["p.M"].enums);
        assert_eq!(
            vec!["p.E".to_string(), "p.M.N".to_string()],
            context.files["a.proto"].enums
        );
    }

    #[test]
    fn map_entry_messages_are_flagged() {
        let mut descriptor = file("a.proto", "p");
        let mut entry = message("XEntry");
        entry.options = Some(MessageOptions {
            map_entry: Some(true),
            ..MessageOptions::default()
        });
        descriptor.message_type.push(entry);

        let context = walk(&descriptor);
        assert!(context.messages["p.XEntry"].is_map_entry);
    }

    #[test]
    fn deprecated_descriptors_seed_their_options() {
        let mut descriptor = file("a.proto", "p");
        let mut m = message("M");
        m.options = Some(MessageOptions {
            deprecated: Some(true),
            ..MessageOptions::default()
        });
        descriptor.message_type.push(m);

        let context = walk(&descriptor);
        assert_eq!(
            serde_json::Value::from(true),
            context.messages["p.M"].options["deprecated"]
        );
        assert!(context.files["a.proto"].options.is_empty());
    }

    #[test]
    fn comments_resolve_through_source_info() {
        let mut descriptor = file("a.proto", "p");
        descriptor.message_type.push(message("M"));
        descriptor.source_code_info = Some(SourceCodeInfo {
            location: vec![
                Location {
                    path: vec![2],
                    leading_comments: Some(" Package docs.\n".to_string()),
                    ..Location::default()
                },
                Location {
                    path: vec![4, 0],
                    trailing_comments: Some(" A message.\n".to_string()),
                    ..Location::default()
                },
            ],
        });

        let context = walk(&descriptor);
        assert_eq!("Package docs.", context.files["a.proto"].description);
        assert_eq!("A message.", context.messages["p.M"].description);
    }

    #[test]
    fn files_without_a_package_use_bare_names() {
        let mut descriptor = file("a.proto", "");
        descriptor.message_type.push(message("M"));

        let context = walk(&descriptor);
        assert!(context.messages.contains_key("M"));
        assert_eq!(vec!["M".to_string()], context.files["a.proto"].messages);
    }
}

//! Field numbers of the descriptor protos.
//!
//! The same integers serve two purposes: as `SourceCodeInfo` path components
//! when looking up comments, and as wire field numbers when re-reading the
//! serialized request for raw options bytes.

pub(crate) struct CodeGeneratorRequestLocations;

impl CodeGeneratorRequestLocations {
    pub const PROTO_FILE: i32 = 15;
}

pub(crate) struct FileDescriptorProtoLocations;

impl FileDescriptorProtoLocations {
    pub const PACKAGE: i32 = 2;
    pub const MESSAGE_TYPE: i32 = 4;
    pub const ENUM_TYPE: i32 = 5;
    pub const SERVICE: i32 = 6;
    pub const OPTIONS: i32 = 8;
}

pub(crate) struct DescriptorProtoLocations;

impl DescriptorProtoLocations {
    pub const FIELD: i32 = 2;
    pub const NESTED_TYPE: i32 = 3;
    pub const ENUM_TYPE: i32 = 4;
    pub const OPTIONS: i32 = 7;
}

pub(crate) struct FieldDescriptorProtoLocations;

impl FieldDescriptorProtoLocations {
    pub const OPTIONS: i32 = 8;
}

pub(crate) struct EnumDescriptorProtoLocations;

impl EnumDescriptorProtoLocations {
    pub const VALUE: i32 = 2;
    pub const OPTIONS: i32 = 3;
}

pub(crate) struct EnumValueDescriptorProtoLocations;

impl EnumValueDescriptorProtoLocations {
    pub const OPTIONS: i32 = 3;
}

pub(crate) struct ServiceDescriptorProtoLocations;

impl ServiceDescriptorProtoLocations {
    pub const METHOD: i32 = 2;
    pub const OPTIONS: i32 = 3;
}

pub(crate) struct MethodDescriptorProtoLocations;

impl MethodDescriptorProtoLocations {
    pub const OPTIONS: i32 = 4;
}

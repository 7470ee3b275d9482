//! A `protoc` plugin that flattens the compiler's descriptor set into a
//! single JSON document of cross-referenced entities.
//!
//! Every file, service, method, message, field, enum, and enum value is
//! projected into one of seven flat mappings keyed by fully-qualified name,
//! with parent/child relationships expressed as lists of those keys and a
//! central index describing where each name lives. Custom options declared
//! as extensions of the standard `google.protobuf.*Options` messages are
//! decoded from their raw wire bytes into typed JSON values.
//!
//! Generation runs in strictly ordered phases: harvest the raw options
//! bytes from the serialized request, collect the custom option schemas,
//! walk the descriptor graph, then resolve option values against the
//! schemas. Values must resolve last because a message-typed option may
//! reference an entity defined anywhere in the compilation unit.

mod context;
mod fqn;
mod locations;
mod options;
mod raw_options;
mod walker;
mod wire;

pub use crate::context::{
    Context, EntityKind, Enum, EnumValue, Field, File, IndexEntry, Message, Method, OptionMap,
    Service,
};
pub use crate::options::{CustomOptionDef, CustomOptions};

use log::debug;
use prost::Message as _;
use prost_types::compiler::{code_generator_response, CodeGeneratorRequest, CodeGeneratorResponse};

use crate::walker::FileWalker;

/// Response file name used when the request carries no parameter.
const DEFAULT_OUTPUT_FILE: &str = "output.json";

/// Runs the plugin over a serialized `CodeGeneratorRequest` and produces the
/// response to hand back to `protoc`.
///
/// A JSON encoding failure is reported through the response's error field;
/// only a request that cannot be decoded at all is an `Err`.
pub fn generate(buf: &[u8]) -> Result<CodeGeneratorResponse, prost::DecodeError> {
    let request = CodeGeneratorRequest::decode(buf)?;

    let mut context = Context::new();
    context.raw_options = raw_options::harvest(buf, &request.proto_file);
    context.custom_options = options::collect_definitions(&request.proto_file);

    for file in &request.proto_file {
        FileWalker::walk(file, &mut context);
    }

    options::resolve_all(&mut context);

    // The feature flag is advertised whether or not encoding succeeds.
    let mut response = CodeGeneratorResponse {
        supported_features: Some(code_generator_response::Feature::Proto3Optional as u64),
        ..CodeGeneratorResponse::default()
    };

    match encode_context(&context) {
        Ok(content) => {
            let name = match request.parameter() {
                "" => DEFAULT_OUTPUT_FILE,
                parameter => parameter,
            };
            debug!("writing {} index entries to {}", context.index.len(), name);
            response.file.push(code_generator_response::File {
                name: Some(name.to_string()),
                content: Some(content),
                ..code_generator_response::File::default()
            });
        }
        Err(error) => {
            response.error = Some(format!("failed to encode the descriptor graph: {}", error));
        }
    }

    Ok(response)
}

/// Renders the context as indented JSON, newline-terminated.
fn encode_context(context: &Context) -> serde_json::Result<String> {
    let mut content = serde_json::to_string_pretty(context)?;
    content.push('\n');
    Ok(content)
}

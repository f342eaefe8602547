//! Builds a small server configuration schema, parses the process argument
//! list against it, and prints the reconstructed value as JSON.
//!
//! Try:
//!
//! ```text
//! cargo run -p example-app -- --port 8080 --log.level debug
//! cargo run -p example-app -- --no-reuse-address
//! ```

use declargs_schema::{FieldSchema, RecordSchema, ScalarKind, TypeNode, Value};

fn config_schema() -> TypeNode {
    let log = RecordSchema::new(
        "Log",
        vec![
            FieldSchema::new(
                "level",
                TypeNode::Literal(vec![
                    Value::String("error".into()),
                    Value::String("warn".into()),
                    Value::String("info".into()),
                    Value::String("debug".into()),
                ]),
            )
            .with_default(Value::String("info".into()))
            .with_help("Log verbosity"),
            FieldSchema::new("file", TypeNode::optional(TypeNode::Scalar(ScalarKind::Path)))
                .with_default(Value::Null)
                .with_help("Log destination, or none for stderr"),
        ],
    );

    let config = RecordSchema::new(
        "ServerConfig",
        vec![
            FieldSchema::new("host", TypeNode::Scalar(ScalarKind::String))
                .with_default(Value::String("127.0.0.1".into())),
            FieldSchema::new("port", TypeNode::Scalar(ScalarKind::UInt))
                .with_help("Port to bind"),
            FieldSchema::new("reuse_address", TypeNode::Scalar(ScalarKind::Bool))
                .with_default(Value::Bool(true)),
            FieldSchema::new("log", TypeNode::Record(log)),
        ],
    );
    TypeNode::Record(config)
}

fn main() {
    let config = declargs::cli(&config_schema(), None);
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(err) => eprintln!("serialization failed: {}", err),
    }
}

use clap::{Parser, Subcommand};

use declargs::Error;
use declargs_schema::{
    ConstructorRegistry, FieldSchema, RecordSchema, ScalarKind, TypeNode, Value,
};

#[derive(Parser)]
#[command(name = "declargs-cli")]
#[command(about = "Inspect or exercise the declargs demo schema", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the parser tree of the demo schema as JSON
    Inspect,

    /// Parse the given arguments against the demo schema and print the
    /// reconstructed value as JSON
    Parse {
        /// Arguments to parse, as they would appear on a command line
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

/// A small training-run configuration, nested one level deep, with a variant
/// field lowered to subcommands.
fn demo_schema() -> TypeNode {
    let sgd = RecordSchema::new(
        "Sgd",
        vec![
            FieldSchema::new("learning_rate", TypeNode::Scalar(ScalarKind::Float))
                .with_default(Value::Float(0.01))
                .with_help("Step size"),
            FieldSchema::new("momentum", TypeNode::Scalar(ScalarKind::Float))
                .with_default(Value::Float(0.9)),
        ],
    );
    let adam = RecordSchema::new(
        "Adam",
        vec![
            FieldSchema::new("learning_rate", TypeNode::Scalar(ScalarKind::Float))
                .with_default(Value::Float(0.001)),
            FieldSchema::new("beta1", TypeNode::Scalar(ScalarKind::Float))
                .with_default(Value::Float(0.9)),
        ],
    );
    let data = RecordSchema::new(
        "Data",
        vec![
            FieldSchema::new("path", TypeNode::Scalar(ScalarKind::Path))
                .with_help("Dataset root directory"),
            FieldSchema::new("shuffle", TypeNode::Scalar(ScalarKind::Bool))
                .with_default(Value::Bool(true)),
        ],
    );
    let config = RecordSchema::new(
        "TrainConfig",
        vec![
            FieldSchema::new("seed", TypeNode::Scalar(ScalarKind::Int))
                .with_default(Value::Int(0)),
            FieldSchema::new("tags", TypeNode::list(TypeNode::Scalar(ScalarKind::String)))
                .with_default(Value::List(vec![])),
            FieldSchema::new("data", TypeNode::Record(data)),
            FieldSchema::new(
                "optimizer",
                TypeNode::union(vec![TypeNode::Record(sgd), TypeNode::Record(adam)]),
            )
            .with_help("Optimizer to train with"),
        ],
    );
    TypeNode::Record(config)
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ty = demo_schema();

    match &cli.command {
        Commands::Inspect => {
            let spec = declargs::parser_spec(ConstructorRegistry::new(), &ty)?;
            let json = serde_json::to_string_pretty(&spec)
                .map_err(|e| Error::Usage(e.to_string()))?;
            println!("{}", json);
        }
        Commands::Parse { args } => {
            let value = declargs::try_cli(&ty, None, args)?;
            let json = serde_json::to_string_pretty(&value)
                .map_err(|e| Error::Usage(e.to_string()))?;
            println!("{}", json);
        }
    }

    Ok(())
}

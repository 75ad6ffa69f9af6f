//! Validates compiled documents against the formal template schema at
//! schema/template-schema.json: every fixture under fixtures/valid, and
//! templates assembled through the builder API.

use serde_json::{json, Value};
use stackform_core::{
    exprs, load, DeletionPolicy, Expr, Mapping, Output, Parameter, Pseudo, Resource, Template,
};
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn schema_validator() -> jsonschema::Validator {
    let schema_path = workspace_root().join("schema/template-schema.json");
    let schema_src = std::fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("Failed to read schema at {}: {}", schema_path.display(), e));
    let schema_value: Value = serde_json::from_str(&schema_src).unwrap();
    jsonschema::validator_for(&schema_value)
        .unwrap_or_else(|e| panic!("Failed to compile schema: {}", e))
}

fn collect_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |e| e == "json"))
        .collect();
    paths.sort();
    paths
}

#[test]
fn compiled_fixtures_conform_to_schema() {
    let validator = schema_validator();
    let mut tested = 0usize;
    let mut failures = Vec::new();

    for path in collect_json_files(&workspace_root().join("fixtures/valid")) {
        let src = std::fs::read_to_string(&path).unwrap();
        let mut template = load::from_str(&src)
            .unwrap_or_else(|e| panic!("{}: failed to load: {}", path.display(), e));
        let doc = template
            .compile()
            .unwrap_or_else(|e| panic!("{}: failed to compile: {}", path.display(), e));
        if let Err(error) = validator.validate(&doc) {
            failures.push(format!("{}: {}", path.display(), error));
        }
        tested += 1;
    }

    assert!(tested > 0, "No fixtures found under fixtures/valid -- check paths");
    assert!(
        failures.is_empty(),
        "Schema validation failed for {} of {} files:\n{}",
        failures.len(),
        tested,
        failures.join("\n")
    );
}

#[test]
fn canonical_fixtures_compile_to_themselves() {
    for path in collect_json_files(&workspace_root().join("fixtures/valid")) {
        let src = std::fs::read_to_string(&path).unwrap();
        let original: Value = serde_json::from_str(&src).unwrap();
        let compiled = load::from_document(&original).unwrap().compile().unwrap();
        assert_eq!(compiled, original, "{} is not canonical", path.display());
    }
}

#[test]
fn builder_template_conforms_to_schema() {
    let mut t = Template::new();
    t.set_format_version().unwrap();
    t.set_description("queue worker").unwrap();
    let stage = t
        .add_parameter(
            "Stage",
            Parameter::string()
                .with_allowed_values(["dev", "prod"])
                .with_default("dev"),
        )
        .unwrap();
    t.add_mapping(
        "Sizing",
        Mapping::new()
            .with_entry("dev", [("Memory", 512)])
            .with_entry("prod", [("Memory", 2048)]),
    )
    .unwrap();
    t.add_condition(
        "IsProd",
        Expr::or([
            Expr::equals(&stage, "prod"),
            Expr::equals(Pseudo::Region, "eu-west-1"),
        ])
        .unwrap(),
    )
    .unwrap();
    let queue = t
        .add_resource(
            "Queue",
            Resource::new("AWS::SQS::Queue")
                .with_property("VisibilityTimeout", 60)
                .with_deletion_policy(DeletionPolicy::Delete),
        )
        .unwrap();
    t.add_resource(
        "Worker",
        Resource::new("AWS::Lambda::Function")
            .with_property(
                "MemorySize",
                Expr::map_lookup("Sizing", &stage, "Memory").unwrap(),
            )
            .with_property(
                "Environment",
                Expr::object([(
                    "Variables",
                    Expr::object([("QUEUE_URL", Expr::from(&queue))]),
                )]),
            )
            .with_property("Code", Expr::object([("ZipFile", Expr::encode("exports.handler=()=>{}"))]))
            .with_condition("IsProd"),
    )
    .unwrap();
    t.add_output(
        "QueueArn",
        Output::new(queue.attr("Arn").unwrap())
            .with_export(Expr::join("-", exprs![Pseudo::StackName, "queue-arn"])),
    )
    .unwrap();

    let doc = t.compile().unwrap();
    let validator = schema_validator();
    let errors: Vec<String> = validator.iter_errors(&doc).map(|e| e.to_string()).collect();
    assert!(errors.is_empty(), "schema errors: {:#?}", errors);
}

#[test]
fn schema_rejects_boolean_intrinsics_in_properties() {
    let validator = schema_validator();
    let doc = json!({
        "Resources": {
            "Topic": {
                "Type": "AWS::SNS::Topic",
                "Properties": {"Flag": {"Fn::Equals": ["a", "b"]}}
            }
        }
    });
    assert!(!validator.is_valid(&doc));
}

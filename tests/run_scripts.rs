mod utils;

use bindex::btype::BType;
use bindex::bvalue::{ArrayValue, Metadata, Value};
use bindex::services::TypeResolver;
use bindex::{parse_with_bindings, CompilerOptions, ExpressionCompiler, InvokeLimits};
use glob::glob;
use itertools::Itertools;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use stdext::function_name;
use utils::fixtures::{ada, bob, eve, fixture_services};

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LimitsConfig {
    depth_limit: Option<usize>,
}

#[derive(Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    expected: Option<String>,
    expected_type: Option<String>,
    expected_compilation_error: Option<String>,
    /// how many diagnostics the compilation error must carry
    expected_error_count: Option<usize>,
    expected_invoke_error: Option<String>,
    /// the invocation target, one of `ada`, `bob`, `eve` or `null`
    target: String,
    /// the static type the target is compiled against
    target_type: String,
    args: Vec<toml::Value>,
    /// compile binding values as `object` rather than their runtime type
    untyped_args: bool,
    optimize: bool,
    limits: LimitsConfig,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            expected: None,
            expected_type: None,
            expected_compilation_error: None,
            expected_error_count: None,
            expected_invoke_error: None,
            target: "ada".to_string(),
            target_type: "Person".to_string(),
            args: vec![],
            untyped_args: false,
            optimize: true,
            limits: Default::default(),
        }
    }
}

fn to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::str(s),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Double(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Array(items) => {
            let items = items.iter().map(to_value).collect_vec();
            let element_type = items
                .iter()
                .map(Value::runtime_type)
                .dedup()
                .exactly_one()
                .unwrap_or(BType::Object);
            ArrayValue::new(element_type, items)
        }
        other => panic!("unsupported argument {other:?}"),
    }
}

impl ScriptConfig {
    fn run(&self, input: &str) {
        let services = fixture_services();
        let compiler = CompilerOptions {
            optimize: self.optimize,
            limits: InvokeLimits {
                depth_limit: self.limits.depth_limit,
            },
            ..Default::default()
        }
        .to_compiler(services.clone());

        let args = self.args.iter().map(to_value).collect_vec();
        let binding_types = args
            .iter()
            .map(|a| {
                if self.untyped_args {
                    BType::Object
                } else {
                    a.runtime_type()
                }
            })
            .collect_vec();
        let target = match self.target.as_str() {
            "ada" => ada(),
            "bob" => bob(),
            "eve" => eve(),
            "null" => Value::Null,
            other => panic!("unknown target {other}"),
        };
        let target_type = services
            .types
            .try_resolve_type(&self.target_type)
            .unwrap_or_else(|| panic!("unknown type {}", self.target_type));
        let metadata = Metadata::new().with_target_type(target_type);

        let compiled = parse_with_bindings(input.trim(), services.types.as_ref(), &binding_types)
            .map_err(|e| (e.to_string(), 1))
            .and_then(|node| {
                compiler
                    .compile(&node, &metadata)
                    .map_err(|e| (e.to_string(), e.len()))
            });
        let compiled = match (compiled, &self.expected_compilation_error) {
            (Ok(c), None) => c,
            (Err((e, _)), None) => panic!("{e}"),
            (Ok(_), Some(_)) => panic!("expected compilation error"),
            (Err((e, count)), Some(pat)) => {
                if let Some(expected_count) = self.expected_error_count {
                    assert_eq!(expected_count, count, "{e}");
                }
                let pat = Regex::new(pat).unwrap();
                if pat.is_match(&e) {
                    return;
                }
                panic!("expected error that matches {pat:?}, got \"{e}\"")
            }
        };

        if let Some(expected_type) = &self.expected_type {
            assert_eq!(expected_type, &compiled.result_type().to_string());
        }

        let result = compiled.invoke(&target, &args, None);
        let value = match (result, &self.expected_invoke_error) {
            (Ok(v), None) => v,
            (Err(e), None) => panic!("invocation failed: {e}"),
            (Ok(v), Some(kind)) => panic!("expected {kind}, got {v:?}"),
            (Err(e), Some(kind)) => {
                assert_eq!(kind, e.kind(), "{e}");
                return;
            }
        };
        if let Some(expected) = &self.expected {
            assert_eq!(expected, &value.to_string());
        }
    }
}

fn test_script(script_number: usize) {
    let file_pattern = format!("test_scripts/{script_number:0>3}_*.bind");
    let file_path = glob(&file_pattern)
        .unwrap()
        .exactly_one()
        .map_err(|e| {
            format!(
                "multiple files matched {file_pattern}: {}",
                e.map(|b| format!("{b:?}")).join(", ")
            )
        })
        .unwrap()
        .unwrap();
    let input = fs::read_to_string(&file_path)
        .unwrap_or_else(|_| panic!("{}", file_path.to_str().unwrap().to_string()));

    let config: ScriptConfig =
        match fs::read_to_string(format!("test_scripts/{script_number:0>3}.toml")) {
            Ok(content) => toml::from_str(&content).unwrap(),
            Err(e) => match e.kind() {
                std::io::ErrorKind::NotFound => Default::default(),
                _ => panic!("{e:?}"),
            },
        };

    config.run(&input);
}

fn run_script_from_name(fn_name: &str) {
    let script_number = fn_name[fn_name.len() - 3..].parse().unwrap();
    test_script(script_number)
}

#[test]
fn test_script_001() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_002() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_003() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_004() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_005() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_006() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_007() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_008() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_009() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_010() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_011() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_012() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_013() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_014() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_015() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_016() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_017() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_018() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_019() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_020() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_021() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_022() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_023() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_024() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_025() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_026() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_027() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_028() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_029() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_030() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_031() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_032() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_033() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_034() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_035() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_036() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_037() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_038() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_039() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_040() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_041() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_042() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_043() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_044() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_045() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_046() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_047() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_048() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_049() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_050() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_051() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_052() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_053() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_054() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_055() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_056() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_057() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_058() {
    run_script_from_name(function_name!());
}

#[test]
fn test_script_059() {
    run_script_from_name(function_name!());
}

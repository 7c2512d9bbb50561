use std::{fs, path::Path};

use tempfile::tempdir;

use bdl_cli::{Args, Stage};

const DRIVER: &str = r#"
component Driver {
config:
    port = Integer(1) [min(1) max(4)];
interface:
    method open() [init];
}
"#;

const MAIN: &str = r#"
use "driver.bdl"
composition {
    driver = Driver(port = 2);
}
"#;

fn args(inputs: &[&Path], output: &Path, stage: Stage) -> Args {
    Args {
        inputs: inputs.iter().map(|path| path.to_path_buf()).collect(),
        stage,
        targets: Vec::new(),
        include: Vec::new(),
        output: Some(output.to_path_buf()),
        config: None,
        no_cache: true,
        plain: true,
        log_level: "off".to_string(),
    }
}

#[test]
fn e2e_compose_writes_views() {
    let dir = tempdir().expect("Failed to create temp directory");
    fs::write(dir.path().join("driver.bdl"), DRIVER).unwrap();
    let main = dir.path().join("main.bdl");
    fs::write(&main, MAIN).unwrap();
    let output = dir.path().join("views.json");

    bdl_cli::run(&args(&[&main], &output, Stage::Compose)).expect("Failed to compose");

    let views: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let view = &views[0];
    assert_eq!(view["target"], "default");
    assert_eq!(view["registry"]["driver"]["symbol"], "Driver");
    assert_eq!(view["registry"]["driver"]["parameters"]["port"], 2);
}

#[test]
fn e2e_targets_from_command_line() {
    let dir = tempdir().expect("Failed to create temp directory");
    let main = dir.path().join("main.bdl");
    fs::write(
        &main,
        "component Test {\n}\ncomposition linux {\n    host = Test();\n}\n",
    )
    .unwrap();
    let output = dir.path().join("views.json");

    let mut args = args(&[&main], &output, Stage::Compose);
    args.targets = vec!["linux".to_string(), "esp32".to_string()];
    bdl_cli::run(&args).expect("Failed to compose");

    let views: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(views.as_array().map(Vec::len), Some(2));
    assert_eq!(views[0]["target"], "linux");
    assert!(views[0]["registry"].get("linux.host").is_some());
    assert!(views[1]["registry"].get("linux.host").is_none());
}

#[test]
fn e2e_contract_violation_is_reported() {
    let dir = tempdir().expect("Failed to create temp directory");
    fs::write(dir.path().join("driver.bdl"), DRIVER).unwrap();
    let main = dir.path().join("main.bdl");
    fs::write(&main, MAIN.replace("port = 2", "port = 9")).unwrap();
    let output = dir.path().join("views.json");

    let err = bdl_cli::run(&args(&[&main], &output, Stage::Compose)).unwrap_err();

    let rendered = bdl_cli::error_adapter::render_plain(&err);
    assert!(rendered.contains("main.bdl:4:"), "{rendered}");
    assert!(rendered.contains("higher than the maximum of 4"), "{rendered}");
    assert!(!output.exists());
}

#[test]
fn e2e_preprocess_writes_artifact() {
    let dir = tempdir().expect("Failed to create temp directory");
    let unit = dir.path().join("driver.bdl");
    fs::write(&unit, DRIVER).unwrap();
    let output = dir.path().join("driver.json");

    let mut args = args(&[&unit], &output, Stage::Preprocess);
    args.no_cache = false;
    bdl_cli::run(&args).expect("Failed to preprocess");

    assert!(dir.path().join("driver.bdl.o").exists());
    let object: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert!(object.is_object());
}

#[test]
fn e2e_missing_input() {
    let dir = tempdir().expect("Failed to create temp directory");
    let output = dir.path().join("views.json");

    let err = bdl_cli::run(&args(&[&dir.path().join("missing.bdl")], &output, Stage::Compose))
        .unwrap_err();

    assert!(matches!(err, bdl::BdlError::Io { .. }), "{err}");
}

//! Integration tests for `use` directives and the unit cache.

use std::{
    fs,
    path::Path,
    time::{Duration, SystemTime},
};

use bdl::{Compiler, config::AppConfig};
use bdl_parser::error::ErrorCode;
use tempfile::tempdir;

const DRIVER: &str = r#"
    component Driver {
    interface:
        method open() [init];
    }
    composition default {
        local = Driver();
    }
"#;

const MAIN: &str = r#"
    use "driver.bdl"
    composition default {
        driver = Driver();
    }
"#;

fn compiler(config: AppConfig) -> Compiler {
    Compiler::new(config).expect("Failed to build the grammar")
}

fn set_modified(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(time))
        .expect("Failed to set the modification time");
}

#[test]
fn test_include_next_to_source() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("driver.bdl"), DRIVER).unwrap();
    let main = dir.path().join("main.bdl");
    fs::write(&main, MAIN).unwrap();

    let compiler = compiler(AppConfig::default().with_cache_enabled(false));
    let object = compiler.compile(&main).expect("Failed to compile");
    assert_eq!(object.includes(), [dir.path().join("driver.bdl")]);

    let views = compiler.compose(&[object]).expect("Failed to compose");
    let instances: Vec<_> = views[0].registry().map(|(fqn, _)| fqn).collect();
    assert_eq!(instances, ["default.driver"]);
    assert_eq!(views[0].init(), ["default.driver.open"]);
}

#[test]
fn test_include_from_search_path() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("lib");
    fs::create_dir(&lib).unwrap();
    fs::write(lib.join("driver.bdl"), DRIVER).unwrap();
    let main = dir.path().join("main.bdl");
    fs::write(&main, MAIN).unwrap();

    let compiler = compiler(
        AppConfig::default()
            .with_cache_enabled(false)
            .with_search_paths([lib.clone()]),
    );
    let object = compiler.compile(&main).expect("Failed to compile");

    assert_eq!(object.includes(), [lib.join("driver.bdl")]);
    assert!(object.symbols().contains("Driver"));
}

#[test]
fn test_missing_include() {
    let dir = tempdir().unwrap();
    let main = dir.path().join("main.bdl");
    fs::write(&main, MAIN).unwrap();

    let compiler = compiler(AppConfig::default().with_cache_enabled(false));
    let err = compiler.compile(&main).unwrap_err();

    let diagnostic = &err.diagnostics()[0];
    assert_eq!(diagnostic.code(), Some(ErrorCode::E207));
    assert_eq!(diagnostic.message(), "Could not find include 'driver.bdl'.");
}

#[test]
fn test_circular_include() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.bdl"), "use \"b.bdl\"\nvalue_a = 1;").unwrap();
    fs::write(dir.path().join("b.bdl"), "use \"a.bdl\"\nvalue_b = 2;").unwrap();

    let compiler = compiler(AppConfig::default().with_cache_enabled(false));
    let err = compiler.compile(&dir.path().join("a.bdl")).unwrap_err();

    let diagnostic = err
        .diagnostics()
        .iter()
        .find(|diagnostic| diagnostic.code() == Some(ErrorCode::E206))
        .expect("missing circular include diagnostic");
    assert!(diagnostic.message().starts_with("Circular dependency detected:\n"));
    assert!(diagnostic.message().contains("a.bdl"));
    assert!(diagnostic.message().contains("b.bdl"));
}

#[test]
fn test_conflict_across_units() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("driver.bdl"), DRIVER).unwrap();
    let main = dir.path().join("main.bdl");
    fs::write(&main, "use \"driver.bdl\"\ncomponent Driver {\n}").unwrap();

    let compiler = compiler(AppConfig::default().with_cache_enabled(false));
    let err = compiler.compile(&main).unwrap_err();

    assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E205));
    let rendered = err.diagnostics()[0].render();
    assert!(rendered.contains("main.bdl:2:"), "{rendered}");
    assert!(rendered.contains("driver.bdl:2:"), "{rendered}");
}

#[test]
fn test_cached_unit_is_reused_while_fresh() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("driver.bdl"), DRIVER).unwrap();
    let main = dir.path().join("main.bdl");
    fs::write(&main, MAIN).unwrap();
    let past = SystemTime::now() - Duration::from_secs(3600);
    set_modified(&main, past);
    set_modified(&dir.path().join("driver.bdl"), past);

    let compiler = compiler(AppConfig::default());
    let first = compiler.compile(&main).expect("Failed to compile");
    assert!(dir.path().join("main.bdl.o").exists());
    assert!(dir.path().join("driver.bdl.o").exists());

    // The artifact is newer than the broken source, so it is used as is.
    fs::write(&main, "value = Missing;").unwrap();
    set_modified(&main, past);
    let cached = compiler.compile(&main).expect("Failed to load the cache");
    assert_eq!(cached.tree(), first.tree());

    let views = compiler.compose(&[cached]).expect("Failed to compose");
    assert_eq!(views[0].init(), ["default.driver.open"]);

    // Once the source is newer, it is compiled again.
    set_modified(&main, SystemTime::now() + Duration::from_secs(3600));
    assert!(compiler.compile(&main).is_err());
}

#[test]
fn test_unreadable_cache_is_ignored() {
    let dir = tempdir().unwrap();
    let unit = dir.path().join("unit.bdl");
    fs::write(&unit, "value = 1;").unwrap();
    set_modified(&unit, SystemTime::now() - Duration::from_secs(3600));
    fs::write(dir.path().join("unit.bdl.o"), "{ not json").unwrap();

    let compiler = compiler(AppConfig::default());
    let object = compiler.compile(&unit).expect("Failed to compile");

    assert!(object.symbols().contains("value"));
    let artifact = fs::read_to_string(dir.path().join("unit.bdl.o")).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&artifact).is_ok());
}

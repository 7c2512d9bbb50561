//! Integration tests for the composition stage.

use bdl::{BdlError, Compiler, CompositionView, config::AppConfig};
use bdl_parser::error::ErrorCode;

fn compose_with(config: AppConfig, source: &str) -> Result<Vec<CompositionView>, BdlError> {
    let compiler = Compiler::new(config.with_cache_enabled(false))
        .expect("Failed to build the grammar");
    let object = compiler.compile_source(source, None)?;
    compiler.compose(&[object])
}

fn compose(source: &str) -> Result<CompositionView, BdlError> {
    let mut views = compose_with(AppConfig::default(), source)?;
    assert_eq!(views.len(), 1, "expected a single target");
    Ok(views.remove(0))
}

fn codes(err: &BdlError) -> Vec<ErrorCode> {
    err.diagnostics()
        .iter()
        .filter_map(|diagnostic| diagnostic.code())
        .collect()
}

const IO: &str = r#"
    component Sensor {
    interface:
        out = Float;
        count = Integer;
        in = const Float;
    }
"#;

fn with_io(composition: &str) -> String {
    format!("{IO}\ncomposition default {{\n{composition}\n}}")
}

#[test]
fn test_connection() {
    let view = compose(&with_io(
        r#"
        a = Sensor();
        b = Sensor();
        c = Sensor();
        connect(a.out, b.in, c.in);
        "#,
    ))
    .expect("Failed to compose");

    let wires: Vec<_> = view
        .connections()
        .iter()
        .map(|connection| (connection.source.as_str(), connection.sink.as_str()))
        .collect();
    assert_eq!(
        wires,
        [("default.a.out", "default.b.in"), ("default.a.out", "default.c.in")]
    );
    assert_eq!(view.connections()[0].type_fqn, "Float");
}

#[test]
fn test_connection_to_non_const_sink() {
    let err = compose(&with_io(
        r#"
        a = Sensor();
        b = Sensor();
        connect(a.out, b.out);
        "#,
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E400]);
    assert_eq!(
        err.diagnostics()[0].message(),
        "'default.b.out' is not a valid sink IO."
    );
}

#[test]
fn test_connection_from_const_source() {
    let err = compose(&with_io(
        r#"
        a = Sensor();
        b = Sensor();
        connect(a.in, b.in);
        "#,
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E401]);
}

#[test]
fn test_connection_between_types() {
    let err = compose(&with_io(
        r#"
        a = Sensor();
        b = Sensor();
        connect(a.count, b.in);
        "#,
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E402]);
    assert_eq!(
        err.diagnostics()[0].message(),
        "Connections must be between the same types, got 'Integer' and 'Float'."
    );
}

#[test]
fn test_sink_connected_twice() {
    let err = compose(&with_io(
        r#"
        a = Sensor();
        b = Sensor();
        connect(a.out, b.in);
        connect(b.out, b.in);
        "#,
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E403]);
    assert_eq!(
        err.diagnostics()[0].message(),
        "'default.b.in' is already connected to 'default.a.out'."
    );
}

#[test]
fn test_this_is_bound_per_instance() {
    let view = compose(
        r#"
        component Test {
        interface:
            method run();
        composition:
            this.run();
        }
        composition default {
            test1 = Test();
            test2 = Test();
        }
        "#,
    )
    .expect("Failed to compose");

    let services: Vec<_> = view.services().iter().map(|call| call.id()).collect();
    assert_eq!(services, ["default.test1.run", "default.test2.run"]);
    assert!(view.workloads().is_empty());
    assert_eq!(view.entry("default.test1").unwrap().intra(), ["default.test1.run"]);
}

#[test]
fn test_nested_instances() {
    let view = compose(
        r#"
        component World {
        interface:
            method run();
        }
        component Hello {
        composition:
            world = World();
            world.run();
        }
        composition default {
            test1 = Hello();
        }
        "#,
    )
    .expect("Failed to compose");

    let instances: Vec<_> = view.registry().map(|(fqn, _)| fqn).collect();
    assert!(instances.contains(&"default.test1"));
    assert!(instances.contains(&"default.test1.world"));
    assert_eq!(view.entry("default.test1.world").unwrap().symbol(), "World");
    let services: Vec<_> = view.services().iter().map(|call| call.id()).collect();
    assert_eq!(services, ["default.test1.world.run"]);
}

#[test]
fn test_workload_supersedes_service() {
    let view = compose(
        r#"
        component Test {
        interface:
            method run();
        composition:
            this.run();
        }
        composition default {
            test = Test();
            test.run();
        }
        "#,
    )
    .expect("Failed to compose");

    let workloads: Vec<_> = view.workloads().iter().map(|call| call.id()).collect();
    assert_eq!(workloads, ["default.test.run"]);
    assert!(view.services().is_empty());
}

#[test]
fn test_recursive_composition() {
    let err = compose(
        r#"
        component Loop {
        composition:
            inner = Loop();
        }
        composition default {
            root = Loop();
        }
        "#,
    )
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E409]);
}

const EXECUTORS: &str = r#"
    component Core {
    }
    component Test {
    interface:
        method run();
    }
"#;

#[test]
fn test_executor_assignment() {
    let view = compose(&format!(
        r#"{EXECUTORS}
        composition default {{
            core1 = Core() [executor];
            core2 = Core() [executor];
            test = Test() [executor(core2)];
            test.run() [executor(core2)];
        }}
        "#
    ))
    .expect("Failed to compose");

    assert_eq!(view.executors(), ["default.core1", "default.core2"]);
    assert_eq!(view.entry("default.test").unwrap().executor(), Some("default.core2"));
    assert_eq!(view.workloads()[0].executor(), Some("default.core2"));
}

#[test]
fn test_single_executor_is_implicit() {
    let view = compose(&format!(
        r#"{EXECUTORS}
        composition default {{
            core = Core() [executor];
            test = Test();
            test.run();
        }}
        "#
    ))
    .expect("Failed to compose");

    assert_eq!(view.entry("default.test").unwrap().executor(), Some("default.core"));
}

#[test]
fn test_executor_mismatch() {
    let err = compose(&format!(
        r#"{EXECUTORS}
        composition default {{
            core1 = Core() [executor];
            core2 = Core() [executor];
            test = Test() [executor(core1)];
            test.run() [executor(core2)];
        }}
        "#
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E404]);
    let diagnostic = &err.diagnostics()[0];
    assert_eq!(
        diagnostic.message(),
        "Mismatch of executors between this expression and 'default.test'."
    );
    assert!(diagnostic.labels().iter().any(|label| label.is_secondary()));
}

#[test]
fn test_missing_executor_on_multi_executor_composition() {
    let err = compose(&format!(
        r#"{EXECUTORS}
        composition default {{
            core1 = Core() [executor];
            core2 = Core() [executor];
            test = Test();
        }}
        "#
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E407]);
}

#[test]
fn test_executor_bound_to_any_entry() {
    let view = compose(&format!(
        r#"{EXECUTORS}
        composition default {{
            hello = Void;
            a = Test() [executor(default.hello)];
            b = a.run();
        }}
        "#
    ))
    .expect("Failed to compose");

    assert_eq!(view.entry("default.a").unwrap().executor(), Some("default.hello"));
    assert_eq!(view.workloads()[0].executor(), Some("default.hello"));
    assert_eq!(view.executors(), ["default.hello"]);
}

#[test]
fn test_unresolved_executor() {
    let err = compose(&format!(
        r#"{EXECUTORS}
        composition default {{
            a = Test() [executor(missing)];
        }}
        "#
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E200]);
    assert_eq!(
        err.diagnostics()[0].message(),
        "Executor 'missing' could not be resolved."
    );
}

#[test]
fn test_method_with_parameters_and_return_type() {
    let view = compose(
        r#"
        component Engine {
        interface:
            method run(speed = Integer) -> Float;
        }
        composition default {
            engine = Engine();
            engine.run(1);
        }
        "#,
    )
    .expect("Failed to compose");

    let workloads: Vec<_> = view.workloads().iter().map(|call| call.id()).collect();
    assert_eq!(workloads, ["default.engine.run"]);
    assert_eq!(view.workloads()[0].parameters()["speed"], 1);
}

const TYPED: &str = r#"
    component A {
    }
    component B {
    }
    component Derived : A {
    }
    struct S {
    interface:
        x = Integer;
    }
    component Hello {
    config:
        var = A;
    }
    component Sink {
    config:
        var = Any [convertible(A)];
    }
    component Counter {
    config:
        var = Integer;
    }
"#;

fn with_types(composition: &str) -> String {
    format!("{TYPED}\ncomposition default {{\n{composition}\n}}")
}

#[test]
fn test_argument_of_unrelated_type() {
    let err = compose(&with_types(
        r#"
        test = Hello(var = b);
        b = B();
        "#,
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E300]);
    assert_eq!(
        err.diagnostics()[0].message(),
        "Type 'B' is not convertible to 'A'."
    );
}

#[test]
fn test_convertible_contract_restricts_any() {
    let err = compose(&with_types(
        r#"
        test = Sink(var = b);
        b = B();
        "#,
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E300]);
    let diagnostic = &err.diagnostics()[0];
    assert_eq!(diagnostic.message(), "Type 'B' is not convertible to 'A'.");
    assert!(diagnostic.labels().iter().any(|label| label.is_secondary()));
}

#[test]
fn test_struct_for_builtin_parameter() {
    let err = compose(&with_types(
        r#"
        s = S(x = 1);
        test = Counter(var = s);
        "#,
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E300]);
    assert_eq!(
        err.diagnostics()[0].message(),
        "Type 'S' is not convertible to 'Integer'."
    );
}

#[test]
fn test_argument_of_same_or_derived_type() {
    let view = compose(&with_types(
        r#"
        a = A();
        d = Derived();
        direct = Hello(var = a);
        derived = Hello(var = d);
        sink = Sink(var = d);
        count = Counter(var = 12);
        "#,
    ))
    .expect("Failed to compose");

    assert_eq!(view.entry("default.derived").unwrap().deps(), ["default.d"]);
    assert_eq!(view.entry("default.count").unwrap().parameters()["var"], 12);
}

const HELLO: &str = r#"
    component Hello {
    config:
        var = Integer(10) [min(10)];
    }
"#;

#[test]
fn test_value_declared_after_its_use() {
    let view = compose(&format!(
        r#"{HELLO}
        composition Comp {{
            test = Hello(var = default);
            default = Integer(32);
        }}
        "#
    ))
    .expect("Failed to compose");

    assert_eq!(view.entry("Comp.test").unwrap().parameters()["var"], 32);
}

#[test]
fn test_value_declared_after_its_use_violates_contract() {
    let err = compose(&format!(
        r#"{HELLO}
        composition Comp {{
            test = Hello(var = default);
            default = Integer(9);
        }}
        "#
    ))
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E300]);
    assert_eq!(
        err.diagnostics()[0].message(),
        "The value 9 is lower than the minimum of 10."
    );
}

#[test]
fn test_lifecycle_follows_dependencies() {
    let view = compose(
        r#"
        composition default {
            app = App(driver = driver);
            driver = Driver();
        }
        component App {
        config:
            driver = Any;
        interface:
            method start() [init];
            method stop() [shutdown];
        }
        component Driver {
        interface:
            method open() [init];
            method close() [shutdown];
        }
        "#,
    )
    .expect("Failed to compose");

    let order: Vec<_> = view.registry().map(|(fqn, _)| fqn).collect();
    assert_eq!(order, ["default.driver", "default.app"]);
    assert_eq!(view.entry("default.app").unwrap().deps(), ["default.driver"]);
    assert_eq!(view.init(), ["default.driver.open", "default.app.start"]);
    assert_eq!(view.shutdown(), ["default.app.stop", "default.driver.close"]);
}

#[test]
fn test_lifecycle_method_without_arguments() {
    let err = compose(
        r#"
        component Driver {
        interface:
            method open(port = Integer) [init];
        }
        composition default {
            driver = Driver();
        }
        "#,
    )
    .unwrap_err();

    assert_eq!(codes(&err), [ErrorCode::E405]);
    assert_eq!(
        err.diagnostics()[0].message(),
        "Method 'open' is tagged 'init' and must not take arguments."
    );
}

#[test]
fn test_dependency_cycle_is_rejected() {
    let err = compose(
        r#"
        component Node {
        config:
            peer = Any;
        }
        composition default {
            a = Node(peer = b);
            b = Node(peer = a);
        }
        "#,
    )
    .unwrap_err();

    assert!(
        codes(&err).contains(&ErrorCode::E211),
        "unexpected diagnostics: {:?}",
        err.diagnostics()
    );
}

#[test]
fn test_blocks_named_after_targets() {
    let config = AppConfig::default().with_targets(vec!["linux".to_string(), "esp32".to_string()]);
    let views = compose_with(
        config,
        r#"
        component Test {
        }
        composition {
            shared = Test();
        }
        composition linux {
            host = Test();
        }
        composition esp32 {
            board = Test();
        }
        "#,
    )
    .expect("Failed to compose");

    assert_eq!(views.len(), 2);
    let linux: Vec<_> = views[0].registry().map(|(fqn, _)| fqn).collect();
    let esp32: Vec<_> = views[1].registry().map(|(fqn, _)| fqn).collect();
    assert_eq!(views[0].target(), "linux");
    assert_eq!(linux, ["shared", "linux.host"]);
    assert_eq!(esp32, ["shared", "esp32.board"]);
}

#[test]
fn test_view_serializes_for_generators() {
    let view = compose(
        r#"
        component Hello {
        config:
            greeting = String("hello");
        }
        composition default {
            hello = Hello();
        }
        "#,
    )
    .expect("Failed to compose");

    let json: serde_json::Value = serde_json::from_str(&view.to_json().unwrap()).unwrap();
    assert_eq!(json["target"], "default");
    assert_eq!(json["registry"]["default.hello"]["symbol"], "Hello");
    assert_eq!(json["registry"]["default.hello"]["parameters"]["greeting"], "hello");
}

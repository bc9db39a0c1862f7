//! End-to-end runs of `affected-tests` with an explicit change set (no git).

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_affected-tests"))
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write source");
}

fn run_ok(args: &[&str]) -> String {
    let out = bin().args(args).output().expect("run affected-tests");
    assert!(
        out.status.success(),
        "affected-tests {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).to_string()
}

fn run_err(args: &[&str]) -> Output {
    let out = bin().args(args).output().expect("run affected-tests");
    assert!(!out.status.success(), "expected failure for {:?}", args);
    out
}

fn seed_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();

    write(
        root,
        "orders/src/main/java/com/shop/orders/OrderService.java",
        "package com.shop.orders;\n\npublic interface OrderService { Order place(Cart cart); }\n",
    );
    write(
        root,
        "orders/src/main/java/com/shop/orders/OrderServiceImpl.java",
        "package com.shop.orders;\n\npublic class OrderServiceImpl implements OrderService {\n    private final PriceCalculator calculator = new PriceCalculator();\n    public Order place(Cart cart) { return null; }\n}\n",
    );
    write(
        root,
        "orders/src/main/java/com/shop/orders/PriceCalculator.java",
        "package com.shop.orders;\n\npublic class PriceCalculator {}\n",
    );
    write(
        root,
        "orders/src/test/java/com/shop/orders/PriceCalculatorTest.java",
        "package com.shop.orders;\n\nclass PriceCalculatorTest {}\n",
    );
    write(
        root,
        "orders/src/test/java/com/shop/orders/OrderServiceImplTest.java",
        "package com.shop.orders;\n\nclass OrderServiceImplTest {}\n",
    );
    write(
        root,
        "web/src/test/java/com/shop/web/CheckoutIT.java",
        "package com.shop.web;\n\nimport com.shop.orders.OrderService;\n\nclass CheckoutIT {\n    @Autowired private OrderService orders;\n}\n",
    );
    dir
}

#[test]
fn gradle_format_lists_affected_tests() {
    let project = seed_project();
    let root = project.path().to_str().expect("utf-8 path");

    let out = run_ok(&[
        "run",
        root,
        "--changed",
        "orders/src/main/java/com/shop/orders/OrderService.java",
        "--format",
        "gradle",
    ]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            "--tests com.shop.orders.OrderServiceImplTest",
            "--tests com.shop.web.CheckoutIT",
        ]
    );
}

#[test]
fn json_format_reports_full_result() {
    let project = seed_project();
    let root = project.path().to_str().expect("utf-8 path");

    let out = run_ok(&[
        "run",
        root,
        "--changed",
        "orders/src/main/java/com/shop/orders/PriceCalculator.java",
        "--changed",
        "orders/src/test/java/com/shop/orders/PriceCalculatorTest.java",
        "--format",
        "json",
    ]);
    let value: serde_json::Value = serde_json::from_str(&out).expect("json output");
    let tests: Vec<&str> = value["testFqns"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    // PriceCalculator is a field of OrderServiceImpl, one transitive hop away.
    assert_eq!(
        tests,
        vec![
            "com.shop.orders.OrderServiceImplTest",
            "com.shop.orders.PriceCalculatorTest",
        ]
    );
    assert_eq!(value["changedTestClasses"][0], "com.shop.orders.PriceCalculatorTest");
    assert_eq!(value["runAll"], false);
}

#[test]
fn strategy_and_depth_flags_narrow_the_search() {
    let project = seed_project();
    let root = project.path().to_str().expect("utf-8 path");

    let out = run_ok(&[
        "run",
        root,
        "--changed",
        "orders/src/main/java/com/shop/orders/PriceCalculator.java",
        "--strategy",
        "naming",
        "--strategy",
        "transitive",
        "--depth",
        "0",
        "--format",
        "gradle",
    ]);
    assert_eq!(out, "--tests com.shop.orders.PriceCalculatorTest\n");
}

#[test]
fn config_file_is_honoured() {
    let project = seed_project();
    let root = project.path();
    fs::write(
        root.join("affected-tests.toml"),
        "strategies = [\"usage\"]\nrun_all_if_no_matches = true\n",
    )
    .expect("write config");

    let out = run_ok(&[
        "run",
        root.to_str().expect("utf-8 path"),
        "--changed",
        "orders/src/main/java/com/shop/orders/PriceCalculator.java",
    ]);
    assert!(out.contains("run the full suite"), "{out}");
}

#[test]
fn config_subcommand_prints_effective_settings() {
    let project = seed_project();
    let out = run_ok(&["config", project.path().to_str().expect("utf-8 path")]);
    assert!(out.contains("(default config, file not created)"));
    assert!(out.contains("base_ref = \"origin/master\""));
    assert!(out.contains("transitive_depth = 2"));
}

#[test]
fn suspicious_base_ref_is_fatal() {
    let project = seed_project();
    let out = run_err(&[
        "run",
        project.path().to_str().expect("utf-8 path"),
        "--base-ref",
        "../../etc/passwd",
        "--changed",
        "orders/src/main/java/com/shop/orders/PriceCalculator.java",
    ]);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("path traversal"), "{stderr}");
    assert!(out.stdout.is_empty());
}

#[test]
fn malformed_config_is_fatal() {
    let project = seed_project();
    fs::write(project.path().join("affected-tests.toml"), "strategies = [\"magic\"]\n")
        .expect("write config");
    let out = run_err(&["config", project.path().to_str().expect("utf-8 path")]);
    assert!(String::from_utf8_lossy(&out.stderr).contains("cannot parse config file"));
}

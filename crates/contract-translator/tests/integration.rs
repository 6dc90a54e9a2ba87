// Copyright (c) Asymptotic Labs
// SPDX-License-Identifier: Apache-2.0

use assert_cmd::Command;
use contract_translator::translate::{load_interface, load_program, summary, translate, Failure};
use model_to_ir::{TranslationOptions, TypeDomainFactory};
use program_model::{analyze, InterfaceDecls, Model, ScopeRef};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs::{copy, write};
use std::path::{Path, PathBuf};
use verification_ir::{Expr, Method, Program, Stmt};

fn options() -> TranslationOptions {
    TranslationOptions {
        main_method: true,
        ..TranslationOptions::default()
    }
}

fn input(name: &str) -> PathBuf {
    Path::new("tests/inputs").join(name)
}

/// Runs analysis and translation on the given file
fn run_translator(path: &Path, options: &TranslationOptions) -> Result<Program, Failure> {
    let program = load_program(path).unwrap();
    let interface = load_interface(None).unwrap();
    translate(program, &interface, options)
}

fn model_of(path: &Path) -> Model {
    let program = load_program(path).unwrap();
    analyze(&program, &InterfaceDecls::builtins().unwrap()).unwrap()
}

fn all_stmts(method: &Method) -> Vec<Stmt> {
    let mut all = vec![];
    for stmt in method.body.iter().flatten() {
        stmt.visit(&mut |s| all.push(s.clone()));
    }
    all
}

/// Fresh-name suffixes vary with the built-in table; compare names by stem
fn post_process_output(output: &str) -> String {
    let re = Regex::new(r"_\d+\b").unwrap();
    re.replace_all(output, "_N").to_string()
}

#[test]
fn run_input_programs() {
    let mut seen = 0;
    for entry in glob::glob("tests/inputs/*.json").expect("Invalid glob pattern") {
        let path = entry.expect("Failed to read file path");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        seen += 1;
        let first = run_translator(&path, &options());
        if name.starts_with("invalid_") {
            assert!(first.is_err(), "{} should be rejected", name);
            continue;
        }
        let first = first.unwrap_or_else(|f| panic!("{}: {}", name, f.error));
        let second = run_translator(&path, &options()).unwrap_or_else(|f| panic!("{}: {}", name, f.error));
        assert_eq!(first, second, "{} translates deterministically", name);
        assert!(first.domains.contains_key(model_to_ir::TYPE_DOMAIN));
    }
    assert!(seen > 0);
}

#[test]
fn test_dog_gets_one_distinct_override_check() {
    let path = input("animals.json");
    let model = model_of(&path);
    let program = run_translator(&path, &options()).unwrap();

    let module = model.main_modules[0];
    let dog = model.lookup_class(module, "Dog").unwrap();
    let speak = &model.method(model.class(dog).methods["speak"]).sil_name;
    let checks = program
        .methods
        .values()
        .filter(|m| m.name.contains("override_check"))
        .collect::<Vec<_>>();
    assert_eq!(checks.len(), 1);
    assert_ne!(&checks[0].name, speak);

    let literal = TypeDomainFactory::raw_literal(&model, dog);
    let mut mentions_dog = false;
    for pre in &checks[0].pres {
        pre.expr.visit(&mut |e| mentions_dog |= *e == literal);
    }
    assert!(mentions_dog);
    // Animal.speak takes only the receiver
    assert_eq!(checks[0].params.len(), 1);
}

#[test]
fn test_for_loop_invariants_reference_list_sequence() {
    let path = input("for_loop.json");
    let model = model_of(&path);
    let program = run_translator(&path, &options()).unwrap();
    let f = model.lookup_function(model.main_modules[0], "f").unwrap();
    let method = &program.methods[&model.method(f).sil_name];

    let invariants = all_stmts(method)
        .into_iter()
        .find_map(|s| match s {
            Stmt::While { invariants, .. } => Some(invariants),
            _ => None,
        })
        .expect("expected a loop");
    let mut mentions_list_acc = false;
    for invariant in &invariants {
        invariant.visit(&mut |e| {
            mentions_list_acc |= matches!(e, Expr::Field { field, .. } if field.name == "list_acc")
        });
    }
    assert!(mentions_list_acc);
    assert!(invariants.len() >= 2);
}

#[test]
fn test_locally_caught_exception_needs_no_failure_branch() {
    let path = input("try_except.json");
    let model = model_of(&path);
    let program = run_translator(&path, &options()).unwrap();
    let main = model.module(model.main_modules[0]).main.unwrap();
    let stmts = all_stmts(&program.methods[&model.method(main).sil_name]);
    assert!(stmts.iter().any(|s| matches!(s, Stmt::If { .. })));
    assert!(!stmts.iter().any(|s| matches!(s, Stmt::Exhale(e, _) if *e == Expr::ff())));
}

#[test]
fn test_return_inside_try_reaches_finally() {
    let path = input("try_finally.json");
    let model = model_of(&path);
    let program = run_translator(&path, &options()).unwrap();
    let f = model.lookup_function(model.main_modules[0], "f").unwrap();
    let block = model.try_block(model.method(f).try_blocks[0]);
    let method = &program.methods[&model.method(f).sil_name];
    let body = method.body.as_ref().unwrap();

    let position = |label: &str| {
        body.iter()
            .position(|s| matches!(s, Stmt::Label { name, .. } if name == label))
            .unwrap()
    };
    let code = &model.var(block.finally_var).sil_name;
    let sets_return_code = all_stmts(method)
        .iter()
        .any(|s| matches!(s, Stmt::LocalAssign { target, value } if &target.name == code && *value == Expr::int(1)));
    assert!(sets_return_code);
    assert!(position(&block.finally_name) < position(&method_end(method)));
}

fn method_end(method: &Method) -> String {
    match method.body.as_ref().and_then(|b| b.last()) {
        Some(Stmt::Label { name, .. }) => name.clone(),
        _ => panic!("expected the exit label last"),
    }
}

#[test]
fn test_rejections_name_the_violation() {
    let failure = run_translator(&input("invalid_decorators.json"), &options()).unwrap_err();
    insta::assert_snapshot!(
        failure.error.to_string(),
        @"invalid program (decorators.incompatible): incompatible decorators: Pure, Predicate"
    );
    let failure = run_translator(&input("invalid_multiple_inheritance.json"), &options()).unwrap_err();
    insta::assert_snapshot!(failure.error.to_string(), @"unsupported: multiple inheritance in class `C`");
}

#[test]
fn test_invalid_overrides_are_rejected() {
    for entry in glob::glob("tests/inputs/invalid_override_*.json").expect("Invalid glob pattern") {
        let path = entry.expect("Failed to read file path");
        let failure = run_translator(&path, &options()).unwrap_err();
        assert_eq!(failure.error.code(), "invalid.override", "{}", path.display());
    }
    let failure = run_translator(&input("invalid_override_default.json"), &options()).unwrap_err();
    insta::assert_snapshot!(
        failure.error.to_string(),
        @"invalid program (invalid.override): default value of `x` differs from overridden method"
    );
}

#[test]
fn test_local_names_are_unique_across_the_program() {
    for name in ["animals.json", "try_except.json", "try_finally.json", "for_loop.json"] {
        let model = model_of(&input(name));
        let mut seen = BTreeSet::new();
        for var in &model.vars {
            let ScopeRef::Method(owner) = var.owner else {
                continue;
            };
            if model.method(owner).interface || var.sil_name.is_empty() {
                continue;
            }
            assert!(seen.insert(var.sil_name.clone()), "{}: `{}` handed out twice", name, var.sil_name);
        }
        for block in &model.try_blocks {
            for label in [&block.try_name, &block.post_name, &block.else_name, &block.finally_name] {
                assert!(seen.insert(label.clone()), "{}: label `{}` handed out twice", name, label);
            }
        }
    }
}

#[test]
fn test_selection_slices_unselected_members() {
    let path = input("animals.json");
    let options = TranslationOptions {
        select: vec!["Animal.speak".to_string()],
        ..options()
    };
    let sliced = run_translator(&path, &options).unwrap();
    let full = run_translator(&path, &self::options()).unwrap();
    assert!(sliced.len() < full.len());
    assert!(!sliced.methods.keys().any(|name| name.contains("override_check")));
    assert!(sliced.domains.contains_key(model_to_ir::TYPE_DOMAIN));
}

#[test]
fn test_cli_prints_summary() {
    let output = Command::cargo_bin("contract-translator")
        .unwrap()
        .arg(input("animals.json"))
        .args(["--format", "summary", "--main-method"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = post_process_output(&String::from_utf8_lossy(&output.stdout));
    assert!(stdout.lines().any(|line| line == "domain PyType"));
    assert!(stdout.lines().any(|line| line.starts_with("method Dog_speak_override_check")));
}

#[test]
fn test_cli_reads_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let program = dir.path().join("animals.json");
    copy(input("animals.json"), &program).unwrap();
    write(dir.path().join("translator.toml"), "select = [\"Animal.speak\"]\ncheck_inheritance = false\n").unwrap();

    let output = Command::cargo_bin("contract-translator")
        .unwrap()
        .arg(&program)
        .args(["--format", "summary"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("override_check"));
    assert!(!stdout.contains("inherit_check"));
}

#[test]
fn test_cli_reports_invalid_program() {
    let output = Command::cargo_bin("contract-translator")
        .unwrap()
        .arg(input("invalid_decorators.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("decorators.incompatible"));
    assert!(stderr.contains("decorated.py"));
}

#[test]
fn test_summary_lists_every_declaration() {
    let program = run_translator(&input("for_loop.json"), &options()).unwrap();
    assert_eq!(summary(&program).lines().count(), program.len());
}

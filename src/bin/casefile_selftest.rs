//! casefile-selftest: a runner binary over a small built-in case set
//!
//! Exercises every case kind through the standard runner entry point, and
//! doubles as the reference for wiring a runner binary.
//!
//! ```bash
//! casefile-selftest --list
//! casefile-selftest --exclude-tag broken --kind test
//! casefile-selftest --run perf/sum_loop --max-total-time 0.1 --json
//! ```

use std::any::Any;
use std::collections::BTreeMap;

use casefile_core::{CaseFailure, Fixture, Invoker, UnitBuilder, UnitRecords};
use casefile_types::{Annotation, ArgValue, Declaration, DeclarationShape, ParamType, ScalarType, SourceLocation};

const FILE: &str = "src/bin/casefile_selftest.rs";

fn decl(symbol: &str, line: u32, suite: &str) -> Declaration {
    Declaration::new(DeclarationShape::free_fn(symbol, SourceLocation::new(FILE, line)).with_scope(suite))
}

#[derive(Default)]
struct KvStore {
    entries: BTreeMap<String, i64>,
}

impl Fixture for KvStore {
    fn set_up(&mut self) -> Result<(), String> {
        self.entries.insert("seed".into(), 1);
        Ok(())
    }

    fn tear_down(&mut self) {
        self.entries.clear();
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn kv(fx: &mut dyn Fixture) -> Result<&mut KvStore, CaseFailure> {
    fx.downcast_mut::<KvStore>()
        .ok_or_else(|| CaseFailure::failed("fixture `kv` has an unexpected type"))
}

fn math_unit() -> UnitRecords {
    let int = ParamType::Scalar(ScalarType::I32);
    UnitBuilder::new("selftest/math")
        .case(
            decl("add", 40, "math")
                .annotate(Annotation::new("test").arg("add"))
                .annotate(Annotation::new("tags").args(["fast"])),
            Invoker::no_arg(|ctx| {
                ctx.expect_eq(2 + 2, 4, "sum");
                Ok(())
            }),
        )
        .case(
            Declaration::new(
                DeclarationShape::free_fn("square_is_non_negative", SourceLocation::new(FILE, 50))
                    .with_scope("math")
                    .with_param("n", int.clone()),
            )
            .annotate(Annotation::new("test").arg("square_is_non_negative"))
            .annotate(Annotation::new("tags").args(["fast"]))
            .annotate(Annotation::new("parameters").args(["n", "-3", "0", "7"])),
            Invoker::typed(|ctx, args| {
                let n = args[0].as_i64().unwrap_or_default();
                ctx.require(n * n >= 0, format!("{}^2 is negative", n))
            }),
        )
        .case(
            Declaration::new(
                DeclarationShape::free_fn("parse_roundtrip", SourceLocation::new(FILE, 60))
                    .with_scope("math")
                    .with_param("digits", ParamType::String),
            )
            .annotate(Annotation::new("fuzz").arg("parse_roundtrip"))
            .annotate(Annotation::new("domains").arg("numeric_string(9)"))
            .annotate(Annotation::new("seed").arg("\"042\"")),
            Invoker::typed(|ctx, args| {
                let digits = args[0].as_str().unwrap_or_default();
                if digits.is_empty() {
                    return Ok(());
                }
                let parsed: u64 = digits
                    .parse()
                    .map_err(|e| CaseFailure::failed(format!("`{}`: {}", digits, e)))?;
                let trimmed = digits.trim_start_matches('0');
                let expected = if trimmed.is_empty() { "0" } else { trimmed };
                ctx.require(parsed.to_string() == expected, "roundtrip mismatch")
            }),
        )
        .build()
}

fn io_unit() -> UnitRecords {
    UnitBuilder::new("selftest/io")
        .fixture("kv", || Box::new(KvStore::default()) as Box<dyn Fixture>)
        .case(
            decl("kv_insert", 90, "store")
                .annotate(Annotation::new("test").arg("insert"))
                .annotate(Annotation::new("fixture").arg("kv").named("lifetime", "suite")),
            Invoker::fixture(|ctx, fx| {
                let store = kv(fx)?;
                store.entries.insert("answer".into(), 42);
                ctx.log(format!("{} entries", store.entries.len()));
                Ok(())
            }),
        )
        .case(
            decl("kv_read", 100, "store")
                .annotate(Annotation::new("test").arg("read_back"))
                .annotate(Annotation::new("fixture").arg("kv").named("lifetime", "suite")),
            Invoker::fixture(|ctx, fx| {
                let store = kv(fx)?;
                ctx.require(store.entries.get("answer") == Some(&42), "insert not visible")
            }),
        )
        .case(
            decl("dial", 110, "net")
                .annotate(Annotation::new("test").arg("dial"))
                .annotate(Annotation::new("requires").args(["network"])),
            Invoker::no_arg(|_| Ok(())),
        )
        .case(
            decl("legacy", 115, "net")
                .annotate(Annotation::new("test").arg("legacy"))
                .annotate(Annotation::new("skip").named("reason", "protocol retired")),
            Invoker::no_arg(|ctx| ctx.fail("must not run")),
        )
        .case(
            decl("always_fails", 120, "broken")
                .annotate(Annotation::new("test").arg("always_fails"))
                .annotate(Annotation::new("tags").args(["broken"])),
            Invoker::no_arg(|ctx| {
                ctx.expect(ArgValue::Int(1) == ArgValue::Int(2), "one equals two");
                Ok(())
            }),
        )
        .build()
}

fn perf_unit() -> UnitRecords {
    let sum = |n: u64| std::hint::black_box((0..n).sum::<u64>());
    UnitBuilder::new("selftest/perf")
        .case(
            decl("sum_reference", 140, "perf").annotate(Annotation::new("baseline").arg("sum_reference")),
            Invoker::no_arg(move |_| {
                sum(64);
                Ok(())
            }),
        )
        .case(
            decl("sum_loop", 150, "perf").annotate(Annotation::new("bench").arg("sum_loop")),
            Invoker::no_arg(move |_| {
                sum(128);
                Ok(())
            }),
        )
        .case(
            decl("sum_jitter", 160, "perf").annotate(Annotation::new("jitter").arg("sum_jitter").named("bins", "5")),
            Invoker::no_arg(move |_| {
                sum(32);
                Ok(())
            }),
        )
        .build()
}

fn main() {
    let code = casefile::run_main(vec![math_unit(), io_unit(), perf_unit()]);
    std::process::exit(code);
}

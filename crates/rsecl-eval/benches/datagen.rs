//! Synthetic rules and events for the rsecl-eval benchmarks.
//!
//! Rules are generated as syntax trees over the fields of the test schema.
//! All generators are seeded for reproducibility.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rsecl_ast::{Array, BooleanExpression, Comparison, Expression, Primary, StringMember};
use serde_json::json;

/// Fixed seed for reproducible benchmarks.
const SEED: u64 = 0xDEAD_BEEF_CAFE;

pub const SCHEMA: &str = include_str!("../tests/fixtures/schema.yaml");

/// Evaluation time for duration comparisons: 2024-01-01T00:00:00Z.
pub const NOW: i64 = 1_704_067_200_000_000_000;

pub fn rng() -> StdRng {
    StdRng::seed_from_u64(SEED)
}

// ---------------------------------------------------------------------------
// Value pools
// ---------------------------------------------------------------------------

const NAMES: &[&str] = &[
    "bash", "zsh", "sh", "python3", "perl", "curl", "wget", "nc", "sshd", "systemd", "cron",
    "nginx",
];

const PATHS: &[&str] = &[
    "/usr/bin/curl",
    "/usr/bin/wget",
    "/bin/bash",
    "/bin/sh",
    "/tmp/payload",
    "/usr/sbin/sshd",
    "/opt/app/bin/server",
    "/dev/shm/x",
];

const PATTERNS: &[&str] = &["/usr/bin/*", "/tmp/*", "*/sh", "/dev/shm/*", "*sshd", "/opt/*/bin/*"];

const REGEXPS: &[&str] = &[
    "^/(usr/)?s?bin/[a-z]+$",
    "^/tmp/.*\\.(sh|py)$",
    "(curl|wget)$",
    "^/dev/shm/",
];

const HOSTS: &[&str] = &["10.0.0.1", "192.168.1.20", "example.com", "203.0.113.7"];

const PORTS: &[i64] = &[22, 53, 80, 443, 4444, 8080, 31337];

fn pick<'a, T>(rng: &mut StdRng, pool: &'a [T]) -> &'a T {
    &pool[rng.random_range(0..pool.len())]
}

// ---------------------------------------------------------------------------
// Rule generators
// ---------------------------------------------------------------------------

fn ident(name: &str) -> Primary {
    Primary::ident(name)
}

fn gen_comparison(rng: &mut StdRng) -> Comparison {
    match rng.random_range(0..8u8) {
        0 => Comparison::scalar(ident("process.name"), "==", Primary::string(*pick(rng, NAMES))),
        1 => Comparison::scalar(
            ident("process.pid"),
            ">",
            Primary::number(rng.random_range(1..5000)),
        ),
        2 => Comparison::scalar(
            ident("process.file.path"),
            "=~",
            Primary::string(*pick(rng, PATTERNS)),
        ),
        3 => {
            let n = rng.random_range(2..6usize);
            let members = (0..n)
                .map(|_| StringMember::String(pick(rng, NAMES).to_string()))
                .collect::<Vec<_>>();
            Comparison::array(ident("process.name"), "in", Array::strings(members))
        }
        4 => Comparison::scalar(
            ident("process.created_at"),
            ">",
            Primary::duration(rng.random_range(1..600) * 1_000_000_000),
        ),
        5 => Comparison::scalar(
            ident("process.ancestors.name"),
            "==",
            Primary::string(*pick(rng, NAMES)),
        ),
        6 => Comparison::array(
            ident("network.destinations.port"),
            "in",
            Array::numbers((0..3).map(|_| *pick(rng, PORTS)).collect::<Vec<_>>()),
        ),
        _ => Comparison::scalar(ident("process.is_root"), "==", ident("process.is_root")),
    }
}

pub fn gen_rule(rng: &mut StdRng) -> BooleanExpression {
    let n = rng.random_range(1..=4usize);
    let mut expr = Expression::from(gen_comparison(rng));
    for _ in 1..n {
        expr = if rng.random_bool(0.3) {
            Expression::or(gen_comparison(rng), expr)
        } else {
            Expression::and(gen_comparison(rng), expr)
        };
    }
    expr.into()
}

/// Rules matching paths against pattern and regexp arrays.
pub fn gen_pattern_rule(rng: &mut StdRng) -> BooleanExpression {
    let members = (0..rng.random_range(2..6usize))
        .map(|_| {
            if rng.random_bool(0.5) {
                StringMember::Pattern(pick(rng, PATTERNS).to_string())
            } else {
                StringMember::Regexp(pick(rng, REGEXPS).to_string())
            }
        })
        .collect::<Vec<_>>();
    Expression::from(Comparison::array(
        Primary::ident("process.file.path"),
        "in",
        Array::strings(members),
    ))
    .into()
}

pub fn gen_n_rules(n: usize) -> Vec<BooleanExpression> {
    let mut rng = rng();
    (0..n).map(|_| gen_rule(&mut rng)).collect()
}

pub fn gen_n_pattern_rules(n: usize) -> Vec<BooleanExpression> {
    let mut rng = rng();
    (0..n).map(|_| gen_pattern_rule(&mut rng)).collect()
}

// ---------------------------------------------------------------------------
// Event generators
// ---------------------------------------------------------------------------

pub fn gen_event_value(rng: &mut StdRng) -> serde_json::Value {
    let ancestors: Vec<_> = (0..rng.random_range(0..5usize))
        .map(|_| json!({"name": pick(rng, NAMES), "pid": rng.random_range(1..5000i64)}))
        .collect();
    let destinations: Vec<_> = (0..rng.random_range(0..3usize))
        .map(|_| json!({"port": pick(rng, PORTS), "host": pick(rng, HOSTS)}))
        .collect();
    json!({
        "process": {
            "name": pick(rng, NAMES),
            "pid": rng.random_range(1..5000i64),
            "uid": rng.random_range(0..2000i64),
            "is_root": rng.random_bool(0.2),
            "file": {"path": pick(rng, PATHS)},
            "created_at": NOW - rng.random_range(0..3600i64) * 1_000_000_000,
            "ancestors": ancestors,
        },
        "network": {"destinations": destinations},
    })
}

pub fn gen_event_values(n: usize) -> Vec<serde_json::Value> {
    let mut rng = rng();
    (0..n).map(|_| gen_event_value(&mut rng)).collect()
}

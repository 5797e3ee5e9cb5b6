//! Greedy input minimization.
//!
//! Arguments are shrunk one at a time. A candidate replaces the current
//! value only if it stays inside the input's domain and the target still
//! fails the same way. Passes repeat until nothing improves or the attempt
//! budget runs out.

use casefile_types::ArgValue;

use crate::case::FuzzInput;
use crate::domain::ResolvedDomain;

#[derive(Debug, Clone, PartialEq)]
pub struct ShrinkOutcome {
    pub minimized: Vec<ArgValue>,
    pub attempts: usize,
}

/// Minimize `failing`. `reproduces` runs the target on a candidate tuple
/// and reports whether the original failure class came back.
pub fn shrink<F>(
    inputs: &[FuzzInput],
    failing: Vec<ArgValue>,
    budget: usize,
    mut reproduces: F,
) -> ShrinkOutcome
where
    F: FnMut(&[ArgValue]) -> bool,
{
    let mut current = failing;
    let mut attempts = 0usize;

    'passes: loop {
        let mut progressed = false;
        for i in 0..current.len() {
            let domain = inputs.get(i).and_then(|input| input.domain());
            loop {
                let mut accepted = false;
                for candidate in candidates(domain, &current[i]) {
                    if attempts >= budget {
                        break 'passes;
                    }
                    attempts += 1;
                    let mut trial = current.clone();
                    trial[i] = candidate;
                    if reproduces(&trial) {
                        current = trial;
                        accepted = true;
                        progressed = true;
                        break;
                    }
                }
                if !accepted {
                    break;
                }
            }
        }
        if !progressed {
            break;
        }
    }

    ShrinkOutcome {
        minimized: current,
        attempts,
    }
}

/// Simpler replacements for `value`, most aggressive first. Every
/// candidate is inside `domain` and differs from `value`.
fn candidates(domain: Option<&ResolvedDomain>, value: &ArgValue) -> Vec<ArgValue> {
    let raw = match (domain, value) {
        (Some(ResolvedDomain::Choice(options)), v) => {
            let own = v.complexity();
            options
                .iter()
                .filter(|o| o.complexity() < own)
                .cloned()
                .collect()
        }
        (
            Some(ResolvedDomain::Int {
                min,
                max,
                exclude_zero,
            }),
            ArgValue::Int(v),
        ) => {
            let mut target = 0i128.clamp(*min, *max);
            if *exclude_zero && target == 0 {
                target = if *max >= 1 { 1 } else { -1 };
            }
            halving(*v, target).into_iter().map(ArgValue::Int).collect()
        }
        (Some(ResolvedDomain::Float { min, max, .. }), ArgValue::Float(v)) => {
            let target = 0.0f64.clamp(*min, *max);
            let mut out = vec![target, v.trunc(), target + (v - target) / 2.0];
            out.dedup();
            out.into_iter().map(ArgValue::Float).collect()
        }
        (_, ArgValue::Bool(true)) => vec![ArgValue::Bool(false)],
        (_, ArgValue::Str(s)) => {
            let chars: Vec<char> = s.chars().collect();
            shorter(&chars)
                .into_iter()
                .map(|c| ArgValue::Str(c.into_iter().collect()))
                .collect()
        }
        (_, ArgValue::Bytes(b)) => shorter(b).into_iter().map(ArgValue::Bytes).collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .filter(|c| c != value)
        .filter(|c| domain.map_or(true, |d| d.contains(c)))
        .collect()
}

/// `target`, then points moving from `target` back toward `v` by halving
/// the remaining distance.
fn halving(v: i128, target: i128) -> Vec<i128> {
    let mut out = Vec::new();
    let mut step = v.saturating_sub(target);
    while step != 0 {
        out.push(v - step);
        step /= 2;
    }
    out
}

/// Empty, halves, then every chunk removal from large chunks to single
/// elements.
fn shorter<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    let n = items.len();
    if n == 0 {
        return Vec::new();
    }
    let mut out = vec![Vec::new()];
    if n > 1 {
        out.push(items[..n / 2].to_vec());
        out.push(items[n / 2..].to_vec());
    }
    let mut chunk = n / 2;
    while chunk >= 1 {
        let mut start = 0;
        while start + chunk <= n {
            let mut v = items[..start].to_vec();
            v.extend_from_slice(&items[start + chunk..]);
            out.push(v);
            start += chunk;
        }
        chunk /= 2;
    }
    out
}

use anyhow::{Context, Result};
use libloading::Library;
use std::path::{Path, PathBuf};

use crate::boundary::{self, NumberPair};

pub type AddFn = unsafe extern "C" fn(a: i32, b: i32) -> i32;
pub type AddStructFn = unsafe extern "C" fn(pair: NumberPair) -> i32;

/// The two entry points of one implementation
#[derive(Clone, Copy)]
pub struct BoundaryFns {
    add: AddFn,
    add_struct: AddStructFn,
}

impl BoundaryFns {
    /// This crate's own exports
    pub fn native() -> Self {
        BoundaryFns {
            add: boundary::add,
            add_struct: boundary::add_struct,
        }
    }

    /// # Safety
    ///
    /// Both pointers must be valid for the whole lifetime of the value and
    /// follow the C ABI with exactly these signatures.
    pub unsafe fn from_raw(add: AddFn, add_struct: AddStructFn) -> Self {
        BoundaryFns { add, add_struct }
    }

    pub fn add(&self, a: i32, b: i32) -> i32 {
        // SAFETY: upheld by the constructor
        unsafe { (self.add)(a, b) }
    }

    pub fn add_struct(&self, pair: NumberPair) -> i32 {
        // SAFETY: upheld by the constructor
        unsafe { (self.add_struct)(pair) }
    }
}

/// A shared library resolved to its boundary functions.
///
/// The library stays loaded for as long as this value lives, which keeps the
/// copied function pointers valid.
pub struct LoadedBoundary {
    fns: BoundaryFns,
    path: PathBuf,
    _library: Library,
}

impl LoadedBoundary {
    /// # Safety
    ///
    /// Loading runs the library's initialisers, and the resolved symbols are
    /// trusted to have the C signatures of `add` and `add_struct`. Neither can
    /// be verified.
    pub unsafe fn open(path: &Path) -> Result<Self> {
        let library = unsafe { Library::new(path) }
            .context(format!("Failed to load library: {}", path.display()))?;

        let add: AddFn = unsafe { library.get::<AddFn>(b"add\0") }
            .map(|symbol| *symbol)
            .context(format!("Library {} does not export `add`", path.display()))?;
        let add_struct: AddStructFn = unsafe { library.get::<AddStructFn>(b"add_struct\0") }
            .map(|symbol| *symbol)
            .context(format!("Library {} does not export `add_struct`", path.display()))?;

        Ok(LoadedBoundary {
            fns: unsafe { BoundaryFns::from_raw(add, add_struct) },
            path: path.to_path_buf(),
            _library: library,
        })
    }

    pub fn fns(&self) -> &BoundaryFns {
        &self.fns
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Add,
    AddStruct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCase {
    pub name: &'static str,
    pub entry: Entry,
    pub a: i32,
    pub b: i32,
    pub expected: i32,
}

impl ProbeCase {
    fn new(name: &'static str, entry: Entry, a: i32, b: i32) -> Self {
        ProbeCase {
            name,
            entry,
            a,
            b,
            expected: a.wrapping_add(b),
        }
    }
}

/// Reference cases: the documented scenarios plus both wraparound edges
pub fn conformance_cases() -> Vec<ProbeCase> {
    vec![
        ProbeCase::new("add 2 + 3", Entry::Add, 2, 3),
        ProbeCase::new("add_struct {2, 3}", Entry::AddStruct, 2, 3),
        ProbeCase::new("add wraps at i32::MAX", Entry::Add, 2147483647, 1),
        ProbeCase::new("add_struct {-10, 4}", Entry::AddStruct, -10, 4),
        ProbeCase::new("add wraps at i32::MIN", Entry::Add, i32::MIN, -1),
        ProbeCase::new("add i32::MIN + i32::MIN", Entry::Add, i32::MIN, i32::MIN),
        ProbeCase::new("add_struct wraps at i32::MAX", Entry::AddStruct, i32::MAX, i32::MAX),
        ProbeCase::new("add 0 + 0", Entry::Add, 0, 0),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Wrong result
    Value { case: ProbeCase, actual: i32 },
    /// Second call with the same arguments returned something else
    Unstable { case: ProbeCase, first: i32, second: i32 },
    /// add_struct({a, b}) != add(a, b)
    Disagree { a: i32, b: i32, add: i32, add_struct: i32 },
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Value { case, actual } => write!(
                f,
                "{}: expected {}, got {}",
                case.name, case.expected, actual
            ),
            Failure::Unstable { case, first, second } => write!(
                f,
                "{}: first call returned {}, second returned {}",
                case.name, first, second
            ),
            Failure::Disagree { a, b, add, add_struct } => write!(
                f,
                "add({a}, {b}) = {add} but add_struct({{a: {a}, b: {b}}}) = {add_struct}"
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct ProbeReport {
    pub cases_run: usize,
    pub failures: Vec<Failure>,
}

impl ProbeReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run every conformance case against `fns`, twice each, and check that
/// `add_struct` agrees with `add`
pub fn run_conformance(fns: &BoundaryFns) -> ProbeReport {
    let mut report = ProbeReport::default();

    for case in conformance_cases() {
        let call = || match case.entry {
            Entry::Add => fns.add(case.a, case.b),
            Entry::AddStruct => fns.add_struct(NumberPair::new(case.a, case.b)),
        };

        let first = call();
        let second = call();
        report.cases_run += 1;

        if first != case.expected {
            report.failures.push(Failure::Value { case: case.clone(), actual: first });
        } else if first != second {
            report.failures.push(Failure::Unstable { case: case.clone(), first, second });
        }

        let via_add = fns.add(case.a, case.b);
        let via_struct = fns.add_struct(NumberPair::new(case.a, case.b));
        if via_add != via_struct {
            report.failures.push(Failure::Disagree {
                a: case.a,
                b: case.b,
                add: via_add,
                add_struct: via_struct,
            });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn saturating_add(a: i32, b: i32) -> i32 {
        a.saturating_add(b)
    }

    extern "C" fn swapped_sub(pair: NumberPair) -> i32 {
        pair.b.wrapping_sub(pair.a)
    }

    #[test]
    fn test_native_passes() {
        let report = run_conformance(&BoundaryFns::native());
        assert!(report.passed(), "{:?}", report.failures);
        assert_eq!(report.cases_run, conformance_cases().len());
    }

    #[test]
    fn test_cases_include_documented_scenarios() {
        let cases = conformance_cases();
        let expected: Vec<(Entry, i32, i32, i32)> = cases
            .iter()
            .map(|c| (c.entry, c.a, c.b, c.expected))
            .collect();

        assert!(expected.contains(&(Entry::Add, 2, 3, 5)));
        assert!(expected.contains(&(Entry::AddStruct, 2, 3, 5)));
        assert!(expected.contains(&(Entry::Add, 2147483647, 1, -2147483648)));
        assert!(expected.contains(&(Entry::AddStruct, -10, 4, -6)));
    }

    #[test]
    fn test_saturating_implementation_fails() {
        let fns = unsafe { BoundaryFns::from_raw(saturating_add, boundary::add_struct) };
        let report = run_conformance(&fns);

        assert!(!report.passed());
        assert!(report.failures.iter().any(|f| matches!(
            f,
            Failure::Value { case, actual } if case.a == i32::MAX && case.b == 1 && *actual == i32::MAX
        )));
        assert!(report.failures.iter().any(|f| matches!(f, Failure::Disagree { .. })));
    }

    #[test]
    fn test_wrong_struct_semantics_fail() {
        let fns = unsafe { BoundaryFns::from_raw(boundary::add, swapped_sub) };
        let report = run_conformance(&fns);

        let message = report
            .failures
            .iter()
            .find(|f| matches!(f, Failure::Value { .. }))
            .unwrap()
            .to_string();
        assert!(message.contains("add_struct {2, 3}: expected 5, got 1"));
    }

    #[test]
    fn test_open_missing_library() {
        let result = unsafe { LoadedBoundary::open(Path::new("/no/such/libadd.so")) };
        let err = result.err().unwrap();
        assert!(err.to_string().contains("Failed to load library"));
    }
}

use anyhow::{Context, Result};
use std::fmt;

use crate::layout::LayoutTable;
use crate::surface::{CType, Surface};

/// One disagreement between the Rust exports and a header
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    /// Exported by Rust, not declared in the header
    MissingFunction { name: String },
    /// Declared in the header, not exported by Rust
    ExtraFunction { name: String },
    ParamCount { function: String, expected: usize, found: usize },
    ParamType { function: String, index: usize, expected: CType, found: CType },
    ReturnType { function: String, expected: CType, found: CType },
    /// A signature uses a struct the header never defines
    MissingStruct { name: String },
    /// A signature uses a Rust struct that is not #[repr(C)]
    NotReprC { name: String },
    FieldList { rust_struct: String, header_struct: String, expected: Vec<String>, found: Vec<String> },
    FieldType { rust_struct: String, field: String, expected: CType, found: CType },
    Layout { rust_struct: String, header_struct: String, detail: String },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::MissingFunction { name } => {
                write!(f, "function '{}' is exported but not declared in the header", name)
            }
            Mismatch::ExtraFunction { name } => {
                write!(f, "function '{}' is declared in the header but not exported", name)
            }
            Mismatch::ParamCount { function, expected, found } => write!(
                f,
                "function '{}' takes {} parameter(s), header declares {}",
                function, expected, found
            ),
            Mismatch::ParamType { function, index, expected, found } => write!(
                f,
                "parameter {} of '{}' is {}, header declares {}",
                index + 1,
                function,
                expected,
                found
            ),
            Mismatch::ReturnType { function, expected, found } => write!(
                f,
                "'{}' returns {}, header declares {}",
                function, expected, found
            ),
            Mismatch::MissingStruct { name } => {
                write!(f, "struct '{}' is used but not defined in the header", name)
            }
            Mismatch::NotReprC { name } => {
                write!(f, "struct '{}' crosses the boundary but is not #[repr(C)]", name)
            }
            Mismatch::FieldList { rust_struct, header_struct, expected, found } => write!(
                f,
                "struct '{}' has fields [{}], header '{}' has [{}]",
                rust_struct,
                expected.join(", "),
                header_struct,
                found.join(", ")
            ),
            Mismatch::FieldType { rust_struct, field, expected, found } => write!(
                f,
                "field '{}.{}' is {}, header declares {}",
                rust_struct, field, expected, found
            ),
            Mismatch::Layout { rust_struct, header_struct, detail } => write!(
                f,
                "layout of '{}' differs from header '{}': {}",
                rust_struct, header_struct, detail
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub mismatches: Vec<Mismatch>,
    pub functions_checked: usize,
    pub structs_checked: usize,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

struct Checker<'a> {
    rust: &'a Surface,
    header: &'a Surface,
    rust_layouts: LayoutTable,
    header_layouts: LayoutTable,
    compared: Vec<(String, String)>,
    report: CheckReport,
}

/// Compare the Rust surface (authoritative) against a header surface.
///
/// Struct and parameter names are not part of the ABI, so structs are matched
/// by position in the signatures and compared field by field. Field order is
/// compared by name since swapping `a` and `b` keeps the layout but not the
/// meaning.
pub fn compare_surfaces(rust: &Surface, header: &Surface) -> Result<CheckReport> {
    let rust_layouts = LayoutTable::build(&rust.structs)
        .context("Failed to lay out Rust structs")?;
    let header_layouts = LayoutTable::build(&header.structs)
        .context("Failed to lay out header structs")?;

    let mut checker = Checker {
        rust,
        header,
        rust_layouts,
        header_layouts,
        compared: Vec::new(),
        report: CheckReport::default(),
    };
    checker.run();
    Ok(checker.report)
}

impl Checker<'_> {
    fn run(&mut self) {
        let rust = self.rust;
        let header = self.header;

        for function in &rust.functions {
            self.report.functions_checked += 1;

            let Some(declared) = header.find_function(&function.name) else {
                self.push(Mismatch::MissingFunction { name: function.name.clone() });
                continue;
            };

            if function.params.len() != declared.params.len() {
                self.push(Mismatch::ParamCount {
                    function: function.name.clone(),
                    expected: function.params.len(),
                    found: declared.params.len(),
                });
            } else {
                for (index, ((_, expected), (_, found))) in
                    function.params.iter().zip(&declared.params).enumerate()
                {
                    if !self.types_agree(expected, found) {
                        self.push(Mismatch::ParamType {
                            function: function.name.clone(),
                            index,
                            expected: expected.clone(),
                            found: found.clone(),
                        });
                    }
                }
            }

            if !self.types_agree(&function.return_type, &declared.return_type) {
                self.push(Mismatch::ReturnType {
                    function: function.name.clone(),
                    expected: function.return_type.clone(),
                    found: declared.return_type.clone(),
                });
            }
        }

        for declared in &header.functions {
            if rust.find_function(&declared.name).is_none() {
                self.push(Mismatch::ExtraFunction { name: declared.name.clone() });
            }
        }
    }

    fn push(&mut self, mismatch: Mismatch) {
        self.report.mismatches.push(mismatch);
    }

    /// Scalars must match exactly. Struct pairs always "agree" here; their
    /// differences are reported by `compare_structs`.
    fn types_agree(&mut self, expected: &CType, found: &CType) -> bool {
        match (expected, found) {
            (CType::Struct(rust_name), CType::Struct(header_name)) => {
                self.compare_structs(rust_name, header_name);
                true
            }
            _ => expected == found,
        }
    }

    fn compare_structs(&mut self, rust_name: &str, header_name: &str) {
        let key = (rust_name.to_string(), header_name.to_string());
        if self.compared.contains(&key) {
            return;
        }
        self.compared.push(key);
        self.report.structs_checked += 1;

        let rust = self.rust;
        let header = self.header;

        let Some(rust_def) = rust.find_struct(rust_name) else {
            self.push(Mismatch::NotReprC { name: rust_name.to_string() });
            return;
        };
        let Some(header_def) = header.find_struct(header_name) else {
            self.push(Mismatch::MissingStruct { name: header_name.to_string() });
            return;
        };

        let expected: Vec<String> = rust_def.fields.iter().map(|(n, _)| n.clone()).collect();
        let found: Vec<String> = header_def.fields.iter().map(|(n, _)| n.clone()).collect();
        if expected != found {
            self.push(Mismatch::FieldList {
                rust_struct: rust_name.to_string(),
                header_struct: header_name.to_string(),
                expected,
                found,
            });
        }

        for ((field, rust_ty), (_, header_ty)) in rust_def.fields.iter().zip(&header_def.fields) {
            if !self.types_agree(rust_ty, header_ty) {
                self.push(Mismatch::FieldType {
                    rust_struct: rust_name.to_string(),
                    field: field.clone(),
                    expected: rust_ty.clone(),
                    found: header_ty.clone(),
                });
            }
        }

        self.compare_layouts(rust_name, header_name);
    }

    fn compare_layouts(&mut self, rust_name: &str, header_name: &str) {
        let (Some(rust_layout), Some(header_layout)) =
            (self.rust_layouts.get(rust_name), self.header_layouts.get(header_name))
        else {
            return;
        };

        let mut details = Vec::new();
        if rust_layout.size != header_layout.size {
            details.push(format!("size {} vs {}", rust_layout.size, header_layout.size));
        }
        if rust_layout.align != header_layout.align {
            details.push(format!("align {} vs {}", rust_layout.align, header_layout.align));
        }
        for (rust_field, header_field) in rust_layout.fields.iter().zip(&header_layout.fields) {
            if rust_field.offset != header_field.offset {
                details.push(format!(
                    "field {} at offset {} vs {}",
                    rust_field.name, rust_field.offset, header_field.offset
                ));
            }
        }

        if !details.is_empty() {
            self.push(Mismatch::Layout {
                rust_struct: rust_name.to_string(),
                header_struct: header_name.to_string(),
                detail: details.join(", "),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi_parser::{parse_c_header_from_string, parse_rust_exports_from_string};
    use std::path::Path;

    const RUST: &str = r#"
        #[repr(C)]
        pub struct NumberPair { pub a: i32, pub b: i32 }

        #[unsafe(no_mangle)]
        pub extern "C" fn add(a: i32, b: i32) -> i32 { a.wrapping_add(b) }

        #[unsafe(no_mangle)]
        pub extern "C" fn add_struct(pair: NumberPair) -> i32 { add(pair.a, pair.b) }
    "#;

    fn check(header: &str) -> CheckReport {
        let rust = parse_rust_exports_from_string(RUST, Path::new("boundary.rs")).unwrap();
        let header = parse_c_header_from_string(header, Path::new("numbers.h")).unwrap();
        compare_surfaces(&rust, &header).unwrap()
    }

    #[test]
    fn test_matching_header_is_clean() {
        let report = check(r#"
            typedef struct Numbers { int a; int b; } Numbers;
            int add(int x, int y);
            int add_struct(Numbers nums);
        "#);

        assert!(report.is_clean(), "{:?}", report.mismatches);
        assert_eq!(report.functions_checked, 2);
        assert_eq!(report.structs_checked, 1);
    }

    #[test]
    fn test_reordered_fields() {
        let report = check(r#"
            typedef struct Numbers { int b; int a; } Numbers;
            int add(int a, int b);
            int add_struct(Numbers nums);
        "#);

        assert_eq!(report.mismatches.len(), 1);
        assert!(matches!(report.mismatches[0], Mismatch::FieldList { .. }));
    }

    #[test]
    fn test_wider_field() {
        let report = check(r#"
            typedef struct Numbers { int64_t a; int32_t b; } Numbers;
            int add(int a, int b);
            int add_struct(Numbers nums);
        "#);

        assert!(report.mismatches.contains(&Mismatch::FieldType {
            rust_struct: "NumberPair".into(),
            field: "a".into(),
            expected: CType::Int32,
            found: CType::Int64,
        }));
        let layout = report
            .mismatches
            .iter()
            .find(|m| matches!(m, Mismatch::Layout { .. }))
            .unwrap();
        assert!(layout.to_string().contains("size 8 vs 16"));
        assert!(layout.to_string().contains("field b at offset 4 vs 8"));
    }

    #[test]
    fn test_missing_and_extra_functions() {
        let report = check(r#"
            typedef struct Numbers { int a; int b; } Numbers;
            int add(int a, int b);
            int subtract(int a, int b);
        "#);

        assert_eq!(
            report.mismatches,
            vec![
                Mismatch::MissingFunction { name: "add_struct".into() },
                Mismatch::ExtraFunction { name: "subtract".into() },
            ]
        );
    }

    #[test]
    fn test_scalar_signature_mismatches() {
        let report = check(r#"
            typedef struct Numbers { int a; int b; } Numbers;
            int64_t add(int a, int64_t b);
            int add_struct(Numbers nums, int extra);
        "#);

        assert!(report.mismatches.contains(&Mismatch::ParamType {
            function: "add".into(),
            index: 1,
            expected: CType::Int32,
            found: CType::Int64,
        }));
        assert!(report.mismatches.contains(&Mismatch::ReturnType {
            function: "add".into(),
            expected: CType::Int32,
            found: CType::Int64,
        }));
        assert!(report.mismatches.contains(&Mismatch::ParamCount {
            function: "add_struct".into(),
            expected: 1,
            found: 2,
        }));
    }

    #[test]
    fn test_struct_passed_as_scalar() {
        let report = check(r#"
            int add(int a, int b);
            int add_struct(int64_t packed);
        "#);

        assert_eq!(report.mismatches.len(), 1);
        assert!(report.mismatches[0].to_string().contains("parameter 1 of 'add_struct'"));
    }

    #[test]
    fn test_undefined_header_struct() {
        let report = check(r#"
            int add(int a, int b);
            int add_struct(struct Numbers nums);
        "#);

        assert_eq!(report.mismatches, vec![Mismatch::MissingStruct { name: "Numbers".into() }]);
    }
}

use anyhow::{bail, Result};
use std::fmt::Write;
use std::path::Path;

use crate::layout::{LayoutTable, StructLayout};
use crate::surface::{CType, Surface};

#[derive(Debug, Clone)]
pub struct HeaderOptions {
    /// Include guard macro, e.g. `NUMBERS_ABI_H`
    pub guard: String,
    /// Where the surface came from, as shown in the banner
    pub source_label: String,
}

/// Derive an include guard from a header file name: `numbers_abi.h` -> `NUMBERS_ABI_H`
pub fn guard_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("boundary.h");

    let mut guard: String = file_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();

    if guard.starts_with(|c: char| c.is_ascii_digit()) {
        guard.insert(0, '_');
    }
    guard
}

/// Prefix for the helper macros, derived from the guard
fn macro_prefix(guard: &str) -> &str {
    guard.strip_suffix("_H").unwrap_or(guard)
}

pub fn generate_c_header(surface: &Surface, layouts: &LayoutTable, options: &HeaderOptions) -> Result<String> {
    for function in &surface.functions {
        let types = function
            .params
            .iter()
            .map(|(_, ty)| ty)
            .chain(std::iter::once(&function.return_type));
        for ty in types {
            if let CType::Struct(name) = ty {
                if layouts.get(name).is_none() {
                    bail!(
                        "function '{}' passes struct '{}' which is not declared #[repr(C)]",
                        function.name,
                        name
                    );
                }
            }
        }
    }

    let guard = &options.guard;
    let prefix = macro_prefix(guard);
    let uses_bool = uses_type(surface, &CType::Bool);

    let mut out = String::new();

    writeln!(out, "/*")?;
    writeln!(out, " * Generated by numbers-abi from {}. Do not edit by hand.", options.source_label)?;
    writeln!(out, " */")?;
    writeln!(out)?;
    writeln!(out, "#ifndef {}", guard)?;
    writeln!(out, "#define {}", guard)?;
    writeln!(out)?;
    if !layouts.is_empty() {
        writeln!(out, "#include <stddef.h>")?;
    }
    if uses_bool {
        writeln!(out, "#include <stdbool.h>")?;
    }
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out)?;

    if !layouts.is_empty() {
        writeln!(out, "#if defined(__cplusplus)")?;
        writeln!(out, "#define {}_STATIC_ASSERT(cond, msg) static_assert(cond, msg)", prefix)?;
        writeln!(out, "#define {}_ALIGNOF(type) alignof(type)", prefix)?;
        writeln!(out, "#else")?;
        writeln!(out, "#define {}_STATIC_ASSERT(cond, msg) _Static_assert(cond, msg)", prefix)?;
        writeln!(out, "#define {}_ALIGNOF(type) _Alignof(type)", prefix)?;
        writeln!(out, "#endif")?;
        writeln!(out)?;
    }

    writeln!(out, "#ifdef __cplusplus")?;
    writeln!(out, "extern \"C\" {{")?;
    writeln!(out, "#endif")?;

    for layout in layouts.iter() {
        writeln!(out)?;
        write_struct(&mut out, layout, prefix)?;
    }

    for function in &surface.functions {
        writeln!(out)?;
        writeln!(out, "{};", function.display_c())?;
    }

    writeln!(out)?;
    writeln!(out, "#ifdef __cplusplus")?;
    writeln!(out, "}}")?;
    writeln!(out, "#endif")?;
    writeln!(out)?;
    writeln!(out, "#endif /* {} */", guard)?;

    Ok(out)
}

fn write_struct(out: &mut String, layout: &StructLayout, prefix: &str) -> Result<()> {
    let name = &layout.name;

    writeln!(out, "/* size {}, align {} */", layout.size, layout.align)?;
    writeln!(out, "typedef struct {} {{", name)?;
    for field in &layout.fields {
        if field.padding_before > 0 {
            writeln!(
                out,
                "    {} {}; /* offset {}, after {} byte(s) padding */",
                field.ty.to_c_type(),
                field.name,
                field.offset,
                field.padding_before
            )?;
        } else {
            writeln!(out, "    {} {}; /* offset {} */", field.ty.to_c_type(), field.name, field.offset)?;
        }
    }
    if layout.trailing_padding > 0 {
        writeln!(out, "    /* {} byte(s) trailing padding */", layout.trailing_padding)?;
    }
    writeln!(out, "}} {};", name)?;
    writeln!(out)?;

    writeln!(
        out,
        "{}_STATIC_ASSERT(sizeof({}) == {}, \"{}: size\");",
        prefix, name, layout.size, name
    )?;
    writeln!(
        out,
        "{}_STATIC_ASSERT({}_ALIGNOF({}) == {}, \"{}: alignment\");",
        prefix, prefix, name, layout.align, name
    )?;
    for field in &layout.fields {
        writeln!(
            out,
            "{}_STATIC_ASSERT(offsetof({}, {}) == {}, \"{}.{}: offset\");",
            prefix, name, field.name, field.offset, name, field.name
        )?;
    }

    Ok(())
}

fn uses_type(surface: &Surface, wanted: &CType) -> bool {
    let in_structs = surface
        .structs
        .iter()
        .flat_map(|s| s.fields.iter().map(|(_, ty)| ty));
    let in_functions = surface.functions.iter().flat_map(|f| {
        f.params
            .iter()
            .map(|(_, ty)| ty)
            .chain(std::iter::once(&f.return_type))
    });
    in_structs.chain(in_functions).any(|ty| ty == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{FunctionSig, StructDef};

    fn number_pair_surface() -> Surface {
        Surface {
            structs: vec![StructDef {
                name: "NumberPair".into(),
                fields: vec![("a".into(), CType::Int32), ("b".into(), CType::Int32)],
            }],
            functions: vec![
                FunctionSig {
                    name: "add".into(),
                    params: vec![("a".into(), CType::Int32), ("b".into(), CType::Int32)],
                    return_type: CType::Int32,
                },
                FunctionSig {
                    name: "add_struct".into(),
                    params: vec![("pair".into(), CType::Struct("NumberPair".into()))],
                    return_type: CType::Int32,
                },
            ],
            sources: Vec::new(),
        }
    }

    fn options() -> HeaderOptions {
        HeaderOptions {
            guard: "NUMBERS_ABI_H".into(),
            source_label: "src/boundary.rs".into(),
        }
    }

    #[test]
    fn test_guard_from_path() {
        assert_eq!(guard_from_path(Path::new("include/numbers_abi.h")), "NUMBERS_ABI_H");
        assert_eq!(guard_from_path(Path::new("add-struct.hpp")), "ADD_STRUCT_HPP");
        assert_eq!(guard_from_path(Path::new("3d.h")), "_3D_H");
    }

    #[test]
    fn test_generates_struct_and_prototypes() {
        let surface = number_pair_surface();
        let layouts = LayoutTable::build(&surface.structs).unwrap();
        let header = generate_c_header(&surface, &layouts, &options()).unwrap();

        assert!(header.contains("#ifndef NUMBERS_ABI_H\n#define NUMBERS_ABI_H\n"));
        assert!(header.contains("typedef struct NumberPair {\n    int32_t a; /* offset 0 */\n    int32_t b; /* offset 4 */\n} NumberPair;\n"));
        assert!(header.contains("NUMBERS_ABI_STATIC_ASSERT(sizeof(NumberPair) == 8, \"NumberPair: size\");"));
        assert!(header.contains("NUMBERS_ABI_STATIC_ASSERT(offsetof(NumberPair, b) == 4, \"NumberPair.b: offset\");"));
        assert!(header.contains("\nint32_t add(int32_t a, int32_t b);\n"));
        assert!(header.contains("\nint32_t add_struct(NumberPair pair);\n"));
        assert!(header.ends_with("#endif /* NUMBERS_ABI_H */\n"));
        assert!(!header.contains("stdbool.h"));
    }

    #[test]
    fn test_struct_before_functions() {
        let surface = number_pair_surface();
        let layouts = LayoutTable::build(&surface.structs).unwrap();
        let header = generate_c_header(&surface, &layouts, &options()).unwrap();

        let struct_pos = header.find("typedef struct NumberPair").unwrap();
        let fn_pos = header.find("int32_t add_struct(").unwrap();
        assert!(struct_pos < fn_pos);
    }

    #[test]
    fn test_padding_comments() {
        let surface = Surface {
            structs: vec![StructDef {
                name: "Flagged".into(),
                fields: vec![("flag".into(), CType::Bool), ("value".into(), CType::Int32)],
            }],
            functions: Vec::new(),
            sources: Vec::new(),
        };
        let layouts = LayoutTable::build(&surface.structs).unwrap();
        let header = generate_c_header(&surface, &layouts, &options()).unwrap();

        assert!(header.contains("#include <stdbool.h>"));
        assert!(header.contains("    int32_t value; /* offset 4, after 3 byte(s) padding */"));
    }

    #[test]
    fn test_no_struct_helpers_without_structs() {
        let surface = Surface {
            structs: Vec::new(),
            functions: vec![FunctionSig {
                name: "tick".into(),
                params: Vec::new(),
                return_type: CType::Void,
            }],
            sources: Vec::new(),
        };
        let layouts = LayoutTable::build(&surface.structs).unwrap();
        let header = generate_c_header(&surface, &layouts, &options()).unwrap();

        assert!(!header.contains("STATIC_ASSERT"));
        assert!(!header.contains("stddef.h"));
        assert!(header.contains("\nvoid tick(void);\n"));
    }

    #[test]
    fn test_rejects_unknown_struct_parameter() {
        let mut surface = number_pair_surface();
        surface.structs.clear();
        let layouts = LayoutTable::build(&surface.structs).unwrap();

        let err = generate_c_header(&surface, &layouts, &options()).unwrap_err();
        assert!(err.to_string().contains("not declared #[repr(C)]"));
    }
}

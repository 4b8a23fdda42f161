use std::path::Path;
use std::fs;
use anyhow::{Result, Context, bail};
use quote::ToTokens;
use syn::{self, Abi, Attribute, Fields, FnArg, Item, ItemFn, ItemStruct, Pat, ReturnType, Type};
use walkdir::WalkDir;

use crate::surface::{CType, FunctionSig, StructDef, Surface};

impl CType {
    /// Parse a by-value Rust type from syn::Type
    pub fn from_syn_type(ty: &Type) -> Result<Self> {
        match ty {
            Type::Path(type_path) => {
                if type_path.qself.is_some() {
                    bail!("Qualified paths are not supported: '{}'", render(ty));
                }

                let segments = &type_path.path.segments;
                let Some(last_segment) = segments.last() else {
                    bail!("Empty type path");
                };

                if !last_segment.arguments.is_empty() {
                    bail!("Generic types cannot cross the C boundary: '{}'", render(ty));
                }

                let type_name = last_segment.ident.to_string();
                match type_name.as_str() {
                    "i32" | "c_int" => Ok(CType::Int32),
                    "i64" | "c_longlong" => Ok(CType::Int64),
                    "u32" | "c_uint" => Ok(CType::UInt32),
                    "u64" | "c_ulonglong" => Ok(CType::UInt64),
                    "f32" | "c_float" => Ok(CType::Float),
                    "f64" | "c_double" => Ok(CType::Double),
                    "bool" => Ok(CType::Bool),
                    "c_long" | "c_ulong" | "isize" | "usize" => bail!(
                        "'{}' has a platform-defined width; use a fixed-width type such as i32 or i64",
                        type_name
                    ),
                    "i8" | "i16" | "u8" | "u16" | "i128" | "u128" | "char" | "String" | "str" => {
                        bail!("Unsupported Rust type: '{}'. Supported: i32, i64, u32, u64, f32, f64, bool, #[repr(C)] structs", type_name)
                    }
                    _ => Ok(CType::Struct(type_name)),
                }
            }
            Type::Tuple(tuple) => {
                if tuple.elems.is_empty() {
                    Ok(CType::Void)
                } else {
                    bail!("Tuple types not supported (except unit type ())")
                }
            }
            Type::Reference(_) | Type::Ptr(_) => {
                bail!("'{}' passes by reference; the boundary only passes values", render(ty))
            }
            Type::Paren(inner) => CType::from_syn_type(&inner.elem),
            _ => bail!("Unsupported Rust type structure: '{}'", render(ty)),
        }
    }
}

fn render(ty: &Type) -> String {
    ty.to_token_stream().to_string()
}

/// Discover exported functions and #[repr(C)] structs under `source`,
/// which may be a single .rs file or a directory.
pub fn discover_rust_exports(source: &Path) -> Result<Surface> {
    if !source.exists() {
        bail!("Rust source not found: {}", source.display());
    }

    let mut surface = Surface::default();

    if source.is_file() {
        surface.extend(parse_rust_file(source)?);
        return Ok(surface);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source) {
        let entry = entry
            .context(format!("Failed to walk directory: {}", source.display()))?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs") {
            files.push(path.to_path_buf());
        }
    }

    // Sort for deterministic header output
    files.sort();

    for path in &files {
        surface.extend(parse_rust_file(path)?);
    }

    Ok(surface)
}

/// Parse a single Rust file
fn parse_rust_file(path: &Path) -> Result<Surface> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read file: {}", path.display()))?;

    parse_rust_exports_from_string(&content, path)
}

/// Parse Rust source code for exports (testable)
pub fn parse_rust_exports_from_string(content: &str, source_file: &Path) -> Result<Surface> {
    let syntax = syn::parse_file(content)
        .context(format!("Failed to parse Rust file: {}", source_file.display()))?;

    let mut surface = Surface {
        sources: vec![source_file.to_path_buf()],
        ..Default::default()
    };
    collect_items(&syntax.items, source_file, &mut surface)?;

    Ok(surface)
}

fn collect_items(items: &[Item], source_file: &Path, surface: &mut Surface) -> Result<()> {
    for item in items {
        match item {
            Item::Fn(func) => {
                if let Some(symbol) = export_symbol(&func.attrs) {
                    surface.functions.push(parse_exported_function(func, symbol, source_file)?);
                }
            }
            Item::Struct(item_struct) => {
                if has_repr_c(&item_struct.attrs, source_file)? {
                    surface.structs.push(parse_repr_c_struct(item_struct, source_file)?);
                }
            }
            Item::Mod(module) => {
                if let Some((_, inner)) = &module.content {
                    collect_items(inner, source_file, surface)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Symbol name if the function is exported unmangled
///
/// Recognizes `#[no_mangle]`, `#[export_name = "..."]` and their
/// `#[unsafe(...)]` forms.
fn export_symbol(attrs: &[Attribute]) -> Option<Option<String>> {
    for attr in attrs {
        if attr.path().is_ident("no_mangle") {
            return Some(None);
        }
        if attr.path().is_ident("export_name") {
            if let Ok(name) = export_name_value(&attr.meta) {
                return Some(Some(name));
            }
        }
        if attr.path().is_ident("unsafe") {
            if let Ok(inner) = attr.parse_args::<syn::Meta>() {
                if inner.path().is_ident("no_mangle") {
                    return Some(None);
                }
                if inner.path().is_ident("export_name") {
                    if let Ok(name) = export_name_value(&inner) {
                        return Some(Some(name));
                    }
                }
            }
        }
    }
    None
}

fn export_name_value(meta: &syn::Meta) -> Result<String> {
    if let syn::Meta::NameValue(name_value) = meta {
        if let syn::Expr::Lit(syn::ExprLit { lit: syn::Lit::Str(s), .. }) = &name_value.value {
            return Ok(s.value());
        }
    }
    bail!("export_name must be a string literal")
}

/// Check for #[repr(C)], rejecting modifiers that change the C layout
fn has_repr_c(attrs: &[Attribute], source_file: &Path) -> Result<bool> {
    let mut is_c = false;
    let mut modifier = None;
    for attr in attrs {
        if !attr.path().is_ident("repr") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("C") {
                is_c = true;
            } else if meta.path.is_ident("packed") || meta.path.is_ident("align") {
                modifier = meta.path.get_ident().map(|i| i.to_string());
                if meta.input.peek(syn::token::Paren) {
                    let content;
                    syn::parenthesized!(content in meta.input);
                    content.parse::<syn::LitInt>()?;
                }
            }
            Ok(())
        })
        .context(format!("Failed to parse #[repr] in {}", source_file.display()))?;
    }

    if let (true, Some(modifier)) = (is_c, modifier) {
        bail!("#[repr(C, {})] is not supported at {}; only plain C layout crosses the boundary",
              modifier, source_file.display());
    }
    Ok(is_c)
}

fn parse_repr_c_struct(item: &ItemStruct, source_file: &Path) -> Result<StructDef> {
    let struct_name = item.ident.to_string();

    if !item.generics.params.is_empty() {
        bail!("#[repr(C)] struct '{}' at {} cannot be generic", struct_name, source_file.display());
    }

    let named = match &item.fields {
        Fields::Named(named) => named,
        Fields::Unnamed(_) => bail!("Tuple struct '{}' at {} is not supported; use named fields",
                                    struct_name, source_file.display()),
        Fields::Unit => bail!("Unit struct '{}' at {} has no C layout", struct_name, source_file.display()),
    };

    let mut fields = Vec::new();
    for field in &named.named {
        let field_name = field
            .ident
            .as_ref()
            .map(|i| i.to_string())
            .unwrap_or_default();
        let field_type = CType::from_syn_type(&field.ty)
            .context(format!(
                "In field '{}' of struct '{}' at {}",
                field_name, struct_name, source_file.display()
            ))?;
        if field_type == CType::Void {
            bail!("Field '{}' of struct '{}' at {} cannot be ()", field_name, struct_name, source_file.display());
        }
        fields.push((field_name, field_type));
    }

    Ok(StructDef {
        name: struct_name,
        fields,
    })
}

/// Check that the function uses the C ABI
fn check_abi(abi: &Option<Abi>, function_name: &str, source_file: &Path) -> Result<()> {
    match abi {
        None => bail!(
            "Exported function '{}' at {} is not `extern \"C\"`; it would use the Rust calling convention",
            function_name, source_file.display()
        ),
        Some(Abi { name: None, .. }) => Ok(()),
        Some(Abi { name: Some(name), .. }) if name.value() == "C" => Ok(()),
        Some(Abi { name: Some(name), .. }) => bail!(
            "Exported function '{}' at {} uses ABI \"{}\"; only \"C\" is supported",
            function_name, source_file.display(), name.value()
        ),
    }
}

/// Parse an exported function
fn parse_exported_function(func: &ItemFn, symbol: Option<String>, source_file: &Path) -> Result<FunctionSig> {
    let function_name = func.sig.ident.to_string();

    check_abi(&func.sig.abi, &function_name, source_file)?;

    if !func.sig.generics.params.is_empty() {
        bail!("Exported function '{}' at {} cannot be generic", function_name, source_file.display());
    }
    if func.sig.variadic.is_some() {
        bail!("Exported function '{}' at {} cannot be variadic", function_name, source_file.display());
    }

    // Parse parameters
    let mut params = Vec::new();
    for input in &func.sig.inputs {
        match input {
            FnArg::Typed(pat_type) => {
                // Get parameter name
                let param_name = match &*pat_type.pat {
                    Pat::Ident(pat_ident) => pat_ident.ident.to_string(),
                    Pat::Wild(_) => format!("arg{}", params.len()),
                    _ => bail!("Unsupported parameter pattern in function '{}' at {}",
                              function_name, source_file.display()),
                };

                // Get parameter type
                let param_type = CType::from_syn_type(&pat_type.ty)
                    .context(format!(
                        "In parameter '{}' of function '{}' at {}",
                        param_name, function_name, source_file.display()
                    ))?;

                if param_type == CType::Void {
                    bail!("Parameter '{}' of function '{}' at {} cannot be ()",
                          param_name, function_name, source_file.display());
                }

                params.push((param_name, param_type));
            }
            FnArg::Receiver(_) => {
                bail!("Exported functions cannot have 'self' parameter in function '{}' at {}",
                      function_name, source_file.display());
            }
        }
    }

    let return_type = match &func.sig.output {
        ReturnType::Default => CType::Void,
        ReturnType::Type(_, ty) => CType::from_syn_type(ty)
            .context(format!("In return type of '{}' at {}", function_name, source_file.display()))?,
    };

    Ok(FunctionSig {
        name: symbol.unwrap_or(function_name),
        params,
        return_type,
    })
}

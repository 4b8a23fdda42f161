use std::path::Path;
use std::fs;
use regex::Regex;
use anyhow::{Result, Context, bail};

use crate::surface::{CType, FunctionSig, StructDef, Surface};

impl CType {
    /// Parse a C type spelling. `struct_names` are typedef'd names known in the header.
    pub fn from_c_str(type_str: &str, struct_names: &[String]) -> Result<Self> {
        let normalized = type_str
            .split_whitespace()
            .filter(|word| *word != "const")
            .collect::<Vec<_>>()
            .join(" ");

        if normalized.contains('*') || normalized.contains('[') {
            bail!("'{}' passes by reference; the boundary only passes values", type_str.trim());
        }

        if let Some(name) = normalized.strip_prefix("struct ") {
            return Ok(CType::Struct(name.trim().to_string()));
        }

        match normalized.as_str() {
            "void" => Ok(CType::Void),
            "int" | "signed" | "signed int" | "int32_t" => Ok(CType::Int32),
            "unsigned" | "unsigned int" | "uint32_t" => Ok(CType::UInt32),
            "long long" | "long long int" | "signed long long" | "int64_t" => Ok(CType::Int64),
            "unsigned long long" | "unsigned long long int" | "uint64_t" => Ok(CType::UInt64),
            "float" => Ok(CType::Float),
            "double" => Ok(CType::Double),
            "bool" | "_Bool" => Ok(CType::Bool),
            "long" | "long int" | "unsigned long" | "unsigned long int" | "size_t" | "ssize_t" => bail!(
                "'{}' has a platform-defined width; use a fixed-width type such as int32_t or int64_t",
                normalized
            ),
            name if struct_names.iter().any(|n| n == name) => Ok(CType::Struct(name.to_string())),
            _ => bail!("Unsupported C type: '{}'. Supported: int32_t, int64_t, uint32_t, uint64_t, float, double, bool, structs", normalized),
        }
    }
}

/// Discover struct definitions and prototypes in a C header
pub fn discover_c_header(path: &Path) -> Result<Surface> {
    let content = fs::read_to_string(path)
        .context(format!("Failed to read header: {}", path.display()))?;

    parse_c_header_from_string(&content, path)
}

/// Parse C header text (testable)
pub fn parse_c_header_from_string(content: &str, source_file: &Path) -> Result<Surface> {
    let code = strip_comments_and_directives(content);

    // The tag is optional: `typedef struct { ... } Alias;`
    let struct_regex = Regex::new(
        r"(?s)(typedef\s+)?\bstruct\b\s*(\w*)\s*\{([^}]*)\}\s*(\w*)\s*;"
    ).unwrap();

    // First pass: every name a struct can be referred to by, and the
    // typedef alias that `struct tag` resolves to
    let mut struct_names = Vec::new();
    let mut aliases: Vec<(String, String)> = Vec::new();
    for cap in struct_regex.captures_iter(&code) {
        let tag = cap.get(2).unwrap().as_str();
        let alias = cap.get(4).unwrap().as_str();
        if cap.get(1).is_some() && !alias.is_empty() {
            struct_names.push(alias.to_string());
            if !tag.is_empty() {
                aliases.push((tag.to_string(), alias.to_string()));
            }
        }
        if !tag.is_empty() {
            struct_names.push(tag.to_string());
        }
    }

    let mut surface = Surface {
        sources: vec![source_file.to_path_buf()],
        ..Default::default()
    };

    for cap in struct_regex.captures_iter(&code) {
        let tag = cap.get(2).unwrap().as_str();
        let body = cap.get(3).unwrap().as_str();
        let alias = cap.get(4).unwrap().as_str();

        let name = if cap.get(1).is_some() && !alias.is_empty() { alias } else { tag };
        // An untagged, untypedef'd struct only declares a variable
        if name.is_empty() {
            continue;
        }
        let fields = parse_fields(body, name, &struct_names, source_file)?;

        surface.structs.push(StructDef {
            name: name.to_string(),
            fields,
        });
    }

    // Second pass: prototypes, once struct bodies are out of the way
    let remaining = struct_regex.replace_all(&code, ";");
    let prototype_regex = Regex::new(
        r"^(?:extern\s+)?([A-Za-z_][\w\s]*?)\s*\b(\w+)\s*\(([^()]*)\)$"
    ).unwrap();
    // `__attribute__((...))` and `__declspec(...)` do not change the signature
    let attribute_regex = Regex::new(
        r"__attribute__\s*\(\((?:[^()]|\([^()]*\))*\)\)|__declspec\s*\([^()]*\)"
    ).unwrap();

    for statement in remaining.split(';') {
        // Drop anything up to the last brace, e.g. `extern "C" {`
        let statement = match statement.rfind(['{', '}']) {
            Some(pos) => &statement[pos + 1..],
            None => statement,
        };
        let statement = attribute_regex.replace_all(statement, " ");
        let statement = statement.split_whitespace().collect::<Vec<_>>().join(" ");

        if statement.starts_with("typedef") {
            continue;
        }

        let Some(cap) = prototype_regex.captures(&statement) else {
            continue;
        };

        let return_type_str = cap.get(1).unwrap().as_str().trim();
        let function_name = cap.get(2).unwrap().as_str().trim();
        let params_str = cap.get(3).unwrap().as_str().trim();

        let return_type = CType::from_c_str(return_type_str, &struct_names)
            .context(format!("In return type of '{}' at {}", function_name, source_file.display()))?;

        let params = parse_parameters(params_str, function_name, &struct_names, source_file)?;

        surface.functions.push(FunctionSig {
            name: function_name.to_string(),
            params,
            return_type,
        });
    }

    for def in &mut surface.structs {
        for (_, ty) in &mut def.fields {
            canonicalize(ty, &aliases);
        }
    }
    for function in &mut surface.functions {
        for (_, ty) in &mut function.params {
            canonicalize(ty, &aliases);
        }
        canonicalize(&mut function.return_type, &aliases);
    }

    Ok(surface)
}

/// Refer to typedef'd structs by their alias, whichever spelling was used
fn canonicalize(ty: &mut CType, aliases: &[(String, String)]) {
    if let CType::Struct(name) = ty {
        if let Some((_, alias)) = aliases.iter().find(|(tag, _)| tag == name) {
            *name = alias.clone();
        }
    }
}

/// Remove comments and preprocessor lines
fn strip_comments_and_directives(content: &str) -> String {
    let block_comment = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    let line_comment = Regex::new(r"//[^\n]*").unwrap();

    let without_comments = block_comment.replace_all(content, " ");
    let without_comments = line_comment.replace_all(&without_comments, "");

    // Directives may continue over several lines with a trailing backslash
    let mut lines = Vec::new();
    let mut in_directive = false;
    for line in without_comments.lines() {
        let trimmed = line.trim();
        if in_directive || trimmed.starts_with('#') {
            in_directive = trimmed.ends_with('\\');
            continue;
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// Parse a struct body: "int32_t a; int32_t b;" -> [("a", Int32), ("b", Int32)]
fn parse_fields(body: &str, struct_name: &str, struct_names: &[String], source_file: &Path) -> Result<Vec<(String, CType)>> {
    let mut fields = Vec::new();

    for declaration in body.split(';') {
        let declaration = declaration.trim();
        if declaration.is_empty() {
            continue;
        }

        // "int32_t a, b" declares two fields of the same type
        let mut declarators = declaration.split(',');
        let first = declarators.next().unwrap_or_default().trim();
        let parts: Vec<&str> = first.split_whitespace().collect();

        if parts.len() < 2 {
            bail!(
                "Invalid field '{}' in struct '{}' at {}. Expected format: 'type name'",
                declaration, struct_name, source_file.display()
            );
        }

        let type_str = parts[..parts.len() - 1].join(" ");
        let field_type = CType::from_c_str(&type_str, struct_names)
            .context(format!(
                "In field '{}' of struct '{}' at {}",
                parts[parts.len() - 1], struct_name, source_file.display()
            ))?;

        let mut names = vec![parts[parts.len() - 1].to_string()];
        names.extend(declarators.map(|d| d.trim().to_string()));

        for name in names {
            if !is_identifier(&name) {
                bail!(
                    "Unsupported declarator '{}' in struct '{}' at {}",
                    name, struct_name, source_file.display()
                );
            }
            fields.push((name, field_type.clone()));
        }
    }

    Ok(fields)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse parameter list: "int32_t a, NumberPair pair" -> [("a", Int32), ("pair", Struct)]
/// Unnamed parameters are given positional names.
fn parse_parameters(params_str: &str, function_name: &str, struct_names: &[String], source_file: &Path) -> Result<Vec<(String, CType)>> {
    if params_str.is_empty() || params_str == "void" {
        return Ok(Vec::new());
    }

    let mut params = Vec::new();

    for (index, param) in params_str.split(',').enumerate() {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        if param == "..." {
            bail!("Variadic function '{}' at {} is not supported", function_name, source_file.display());
        }

        // Try "type name" first, then the whole thing as an unnamed type
        let parts: Vec<&str> = param.split_whitespace().collect();
        let named = if parts.len() >= 2 {
            let type_str = parts[..parts.len() - 1].join(" ");
            CType::from_c_str(&type_str, struct_names)
                .ok()
                .map(|ty| (parts[parts.len() - 1].to_string(), ty))
                .filter(|(name, _)| is_identifier(name))
        } else {
            None
        };

        let (param_name, param_type) = match named {
            Some(named) => named,
            None => {
                let ty = CType::from_c_str(param, struct_names)
                    .context(format!(
                        "In parameter {} of function '{}' at {}",
                        index + 1, function_name, source_file.display()
                    ))?;
                (format!("arg{}", index), ty)
            }
        };

        if param_type == CType::Void {
            bail!("Parameter '{}' of function '{}' at {} cannot be void",
                  param_name, function_name, source_file.display());
        }

        params.push((param_name, param_type));
    }

    Ok(params)
}

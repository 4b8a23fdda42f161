use std::fmt;
use std::path::PathBuf;

/// A type that may cross the boundary by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CType {
    Void,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    /// A by-value struct, referenced by its name
    Struct(String),
}

impl CType {
    /// Spelling used in the generated C header
    pub fn to_c_type(&self) -> String {
        match self {
            CType::Void => "void".to_string(),
            CType::Int32 => "int32_t".to_string(),
            CType::Int64 => "int64_t".to_string(),
            CType::UInt32 => "uint32_t".to_string(),
            CType::UInt64 => "uint64_t".to_string(),
            CType::Float => "float".to_string(),
            CType::Double => "double".to_string(),
            CType::Bool => "bool".to_string(),
            CType::Struct(name) => name.clone(),
        }
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_c_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    /// Fields in declaration order
    pub fields: Vec<(String, CType)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSig {
    /// Symbol name as seen by the linker
    pub name: String,
    pub params: Vec<(String, CType)>,
    pub return_type: CType,
}

impl FunctionSig {
    /// C-style rendering, e.g. `int32_t add(int32_t a, int32_t b)`
    pub fn display_c(&self) -> String {
        let params = if self.params.is_empty() {
            "void".to_string()
        } else {
            self.params
                .iter()
                .map(|(name, ty)| format!("{} {}", ty.to_c_type(), name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("{} {}({})", self.return_type.to_c_type(), self.name, params)
    }
}

/// Everything one side declares: structs and exported functions, in source order.
#[derive(Debug, Clone, Default)]
pub struct Surface {
    pub structs: Vec<StructDef>,
    pub functions: Vec<FunctionSig>,
    pub sources: Vec<PathBuf>,
}

impl Surface {
    pub fn find_struct(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionSig> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn extend(&mut self, other: Surface) {
        self.structs.extend(other.structs);
        self.functions.extend(other.functions);
        self.sources.extend(other.sources);
    }

    /// Names of structs reachable from exported signatures, in first-use order
    pub fn used_structs(&self) -> Vec<String> {
        let mut used: Vec<String> = Vec::new();
        for function in &self.functions {
            let types = function
                .params
                .iter()
                .map(|(_, ty)| ty)
                .chain(std::iter::once(&function.return_type));
            for ty in types {
                if let CType::Struct(name) = ty {
                    self.collect_struct(name, &mut used);
                }
            }
        }
        used
    }

    fn collect_struct(&self, name: &str, used: &mut Vec<String>) {
        if used.iter().any(|n| n == name) {
            return;
        }
        used.push(name.to_string());
        if let Some(def) = self.find_struct(name) {
            for (_, ty) in &def.fields {
                if let CType::Struct(inner) = ty {
                    self.collect_struct(inner, used);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str, params: &[(&str, CType)], ret: CType) -> FunctionSig {
        FunctionSig {
            name: name.to_string(),
            params: params
                .iter()
                .map(|(n, t)| (n.to_string(), t.clone()))
                .collect(),
            return_type: ret,
        }
    }

    #[test]
    fn test_display_c() {
        let add = sig("add", &[("a", CType::Int32), ("b", CType::Int32)], CType::Int32);
        assert_eq!(add.display_c(), "int32_t add(int32_t a, int32_t b)");

        let nothing = sig("tick", &[], CType::Void);
        assert_eq!(nothing.display_c(), "void tick(void)");
    }

    #[test]
    fn test_type_spellings() {
        assert_eq!(CType::Int32.to_c_type(), "int32_t");
        assert_eq!(CType::UInt64.to_c_type(), "uint64_t");
        assert_eq!(CType::Struct("NumberPair".into()).to_c_type(), "NumberPair");
    }

    #[test]
    fn test_used_structs_follows_nesting() {
        let surface = Surface {
            structs: vec![
                StructDef {
                    name: "Inner".into(),
                    fields: vec![("x".into(), CType::Int32)],
                },
                StructDef {
                    name: "Outer".into(),
                    fields: vec![("inner".into(), CType::Struct("Inner".into()))],
                },
                StructDef {
                    name: "Unused".into(),
                    fields: vec![("y".into(), CType::Int32)],
                },
            ],
            functions: vec![sig("f", &[("o", CType::Struct("Outer".into()))], CType::Int32)],
            sources: Vec::new(),
        };

        assert_eq!(surface.used_structs(), vec!["Outer".to_string(), "Inner".to_string()]);
    }
}

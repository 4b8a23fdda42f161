use anyhow::{bail, Result};
use std::collections::HashMap;
use std::fmt;

use crate::surface::{CType, StructDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeLayout {
    pub size: usize,
    pub align: usize,
}

/// Size and alignment of a scalar type
pub fn scalar_layout(ty: &CType) -> Result<TypeLayout> {
    let (size, align) = match ty {
        CType::Int32 | CType::UInt32 | CType::Float => (4, 4),
        CType::Int64 | CType::UInt64 | CType::Double => (8, 8),
        CType::Bool => (1, 1),
        CType::Void => bail!("`void` has no layout"),
        CType::Struct(name) => bail!("`{}` is a struct, not a scalar", name),
    };
    Ok(TypeLayout { size, align })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: String,
    pub ty: CType,
    pub offset: usize,
    pub size: usize,
    pub align: usize,
    /// Bytes inserted between the previous field and this one
    pub padding_before: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub name: String,
    pub size: usize,
    pub align: usize,
    pub fields: Vec<FieldLayout>,
    pub trailing_padding: usize,
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

impl StructLayout {
    /// Lay out `def` with the C rules: fields at the next multiple of their
    /// alignment, size rounded up to the largest field alignment. Struct-typed
    /// fields must already be present in `known`.
    pub fn compute(def: &StructDef, known: &HashMap<String, StructLayout>) -> Result<Self> {
        if def.fields.is_empty() {
            bail!("struct `{}` has no fields; empty structs are not valid C", def.name);
        }

        let mut fields = Vec::with_capacity(def.fields.len());
        let mut offset = 0;
        let mut align = 1;

        for (name, ty) in &def.fields {
            let field_layout = match ty {
                CType::Struct(inner) => match known.get(inner) {
                    Some(inner_layout) => inner_layout.as_type(),
                    None => bail!(
                        "field `{}` of struct `{}` has unknown struct type `{}`",
                        name,
                        def.name,
                        inner
                    ),
                },
                CType::Void => bail!("field `{}` of struct `{}` cannot be void", name, def.name),
                _ => scalar_layout(ty)?,
            };

            let start = round_up(offset, field_layout.align);
            fields.push(FieldLayout {
                name: name.clone(),
                ty: ty.clone(),
                offset: start,
                size: field_layout.size,
                align: field_layout.align,
                padding_before: start - offset,
            });
            offset = start + field_layout.size;
            align = align.max(field_layout.align);
        }

        let size = round_up(offset, align);
        Ok(StructLayout {
            name: def.name.clone(),
            size,
            align,
            fields,
            trailing_padding: size - offset,
        })
    }

    pub fn as_type(&self) -> TypeLayout {
        TypeLayout {
            size: self.size,
            align: self.align,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_padding(&self) -> bool {
        self.trailing_padding > 0 || self.fields.iter().any(|f| f.padding_before > 0)
    }
}

impl fmt::Display for StructLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "struct {} (size {}, align {})", self.name, self.size, self.align)?;
        for field in &self.fields {
            if field.padding_before > 0 {
                writeln!(f, "  [{} byte(s) padding]", field.padding_before)?;
            }
            writeln!(
                f,
                "  {:>4}  {} {} (size {}, align {})",
                field.offset, field.ty, field.name, field.size, field.align
            )?;
        }
        if self.trailing_padding > 0 {
            writeln!(f, "  [{} byte(s) trailing padding]", self.trailing_padding)?;
        }
        Ok(())
    }
}

/// Layouts of every struct in a surface, keyed by name
#[derive(Debug, Clone, Default)]
pub struct LayoutTable {
    layouts: HashMap<String, StructLayout>,
    order: Vec<String>,
}

impl LayoutTable {
    /// Compute all layouts, resolving nested structs regardless of declaration order
    pub fn build(structs: &[StructDef]) -> Result<Self> {
        let mut seen = HashMap::new();
        for def in structs {
            if seen.insert(def.name.as_str(), ()).is_some() {
                bail!("struct `{}` is defined more than once", def.name);
            }
        }

        let mut table = LayoutTable::default();
        let mut pending: Vec<&StructDef> = structs.iter().collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut still_pending = Vec::new();

            for def in pending {
                let ready = def.fields.iter().all(|(_, ty)| match ty {
                    CType::Struct(inner) => table.layouts.contains_key(inner),
                    _ => true,
                });
                if ready {
                    let layout = StructLayout::compute(def, &table.layouts)?;
                    table.order.push(def.name.clone());
                    table.layouts.insert(def.name.clone(), layout);
                } else {
                    still_pending.push(def);
                }
            }

            if still_pending.len() == before {
                // Nothing resolved this round: either an unknown name or a cycle
                let def = still_pending[0];
                for (field, ty) in &def.fields {
                    if let CType::Struct(inner) = ty {
                        if !structs.iter().any(|s| &s.name == inner) {
                            bail!(
                                "field `{}` of struct `{}` has unknown struct type `{}`",
                                field,
                                def.name,
                                inner
                            );
                        }
                    }
                }
                bail!(
                    "struct `{}` contains itself by value (directly or through another struct)",
                    def.name
                );
            }
            pending = still_pending;
        }

        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&StructLayout> {
        self.layouts.get(name)
    }

    /// Layouts in resolution order
    pub fn iter(&self) -> impl Iterator<Item = &StructLayout> {
        self.order.iter().filter_map(|name| self.layouts.get(name))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, fields: &[(&str, CType)]) -> StructDef {
        StructDef {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(n, t)| (n.to_string(), t.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_number_pair_layout() {
        let pair = def("NumberPair", &[("a", CType::Int32), ("b", CType::Int32)]);
        let layout = StructLayout::compute(&pair, &HashMap::new()).unwrap();

        assert_eq!(layout.size, 8);
        assert_eq!(layout.align, 4);
        assert_eq!(layout.field("a").unwrap().offset, 0);
        assert_eq!(layout.field("b").unwrap().offset, 4);
        assert!(!layout.has_padding());
    }

    #[test]
    fn test_interior_padding() {
        let s = def("Mixed", &[("flag", CType::Bool), ("value", CType::Int64)]);
        let layout = StructLayout::compute(&s, &HashMap::new()).unwrap();

        assert_eq!(layout.field("value").unwrap().offset, 8);
        assert_eq!(layout.field("value").unwrap().padding_before, 7);
        assert_eq!(layout.size, 16);
        assert_eq!(layout.align, 8);
        assert_eq!(layout.trailing_padding, 0);
    }

    #[test]
    fn test_trailing_padding() {
        let s = def("Tail", &[("value", CType::Int32), ("flag", CType::Bool)]);
        let layout = StructLayout::compute(&s, &HashMap::new()).unwrap();

        assert_eq!(layout.size, 8);
        assert_eq!(layout.trailing_padding, 3);
        assert!(layout.has_padding());
    }

    #[test]
    fn test_field_order_changes_layout() {
        let ab = def("P", &[("a", CType::Int32), ("b", CType::Int64)]);
        let ba = def("P", &[("b", CType::Int64), ("a", CType::Int32)]);
        let ab = StructLayout::compute(&ab, &HashMap::new()).unwrap();
        let ba = StructLayout::compute(&ba, &HashMap::new()).unwrap();

        assert_eq!(ab.field("b").unwrap().offset, 8);
        assert_eq!(ba.field("b").unwrap().offset, 0);
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_empty_struct_rejected() {
        let s = def("Empty", &[]);
        assert!(StructLayout::compute(&s, &HashMap::new()).is_err());
    }

    #[test]
    fn test_nested_out_of_order() {
        let structs = vec![
            def("Outer", &[("flag", CType::Bool), ("pair", CType::Struct("Pair".into()))]),
            def("Pair", &[("a", CType::Int32), ("b", CType::Int32)]),
        ];
        let table = LayoutTable::build(&structs).unwrap();

        assert_eq!(table.len(), 2);
        let outer = table.get("Outer").unwrap();
        assert_eq!(outer.field("pair").unwrap().offset, 4);
        assert_eq!(outer.size, 12);
        assert_eq!(outer.align, 4);
    }

    #[test]
    fn test_unknown_struct() {
        let structs = vec![def("Outer", &[("x", CType::Struct("Missing".into()))])];
        let err = LayoutTable::build(&structs).unwrap_err();
        assert!(err.to_string().contains("unknown struct type `Missing`"));
    }

    #[test]
    fn test_recursive_struct() {
        let structs = vec![
            def("A", &[("b", CType::Struct("B".into()))]),
            def("B", &[("a", CType::Struct("A".into()))]),
        ];
        let err = LayoutTable::build(&structs).unwrap_err();
        assert!(err.to_string().contains("contains itself"));
    }

    #[test]
    fn test_duplicate_struct() {
        let structs = vec![
            def("A", &[("x", CType::Int32)]),
            def("A", &[("y", CType::Int32)]),
        ];
        assert!(LayoutTable::build(&structs).is_err());
    }
}

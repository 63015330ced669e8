//! Ordered category catalog shared by all statistic tables of one run.

use ahash::AHashSet as HashSet;

use crate::model::mapping::Mapping;

/// Name of the summary row, always at index 0.
pub const TOTAL: &str = "total";

/// Categories every table shows, in display order.
pub const BUILTIN_CATEGORIES: [&str; 6] = [TOTAL, "code", "data", "heap", "anon", "stack"];

/// Built-ins followed by every other category observed in the data, in
/// order of first appearance. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCatalog {
    names: Vec<String>,
}

impl Default for CategoryCatalog {
    fn default() -> Self {
        Self {
            names: BUILTIN_CATEGORIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CategoryCatalog {
    pub fn from_mappings<'a, I>(maps: I) -> Self
    where
        I: IntoIterator<Item = &'a Mapping>,
    {
        let mut catalog = Self::default();
        let mut seen: HashSet<String> = catalog.names.iter().cloned().collect();
        for m in maps {
            if seen.insert(m.category.clone()) {
                catalog.names.push(m.category.clone());
            }
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, category: &str) -> Option<usize> {
        self.names.iter().position(|n| n == category)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// All categories except the summary row.
    pub fn classes(&self) -> &[String] {
        &self.names[1..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(category: &str) -> Mapping {
        Mapping {
            category: category.to_string(),
            ..Mapping::default()
        }
    }

    #[test]
    fn test_builtins_first_then_discovered() {
        let maps = vec![mapping("code"), mapping("vdso"), mapping("heap"), mapping("vectors"), mapping("vdso")];
        let catalog = CategoryCatalog::from_mappings(&maps);

        assert_eq!(
            catalog.names(),
            &["total", "code", "data", "heap", "anon", "stack", "vdso", "vectors"]
        );
        assert_eq!(catalog.index_of(TOTAL), Some(0));
        assert_eq!(catalog.index_of("vectors"), Some(7));
        assert_eq!(catalog.classes().len(), 7);
    }
}

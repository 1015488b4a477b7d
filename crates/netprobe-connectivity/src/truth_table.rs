//! Square matrix keyed by an ordered list of entity names
//!
//! The entity set and its order are fixed at construction. Rows and columns
//! share the same order, and every ordered pair (including self pairs) holds a
//! value. Values can be mutated in place but the shape never changes.

use std::collections::HashMap;

use crate::grid::render_grid;

/// N x N matrix over generic cell payloads
#[derive(Clone, Debug)]
pub struct TruthTable<T> {
    items: Vec<String>,
    index: HashMap<String, usize>,
    values: Vec<T>,
}

impl<T> TruthTable<T> {
    /// Build a table over `items`, invoking `f(from, to)` once per ordered pair.
    ///
    /// Pairs are visited row-major in the order given. Panics if `items`
    /// contains duplicates.
    pub fn from_items<F>(items: Vec<String>, mut f: F) -> Self
    where
        F: FnMut(&str, &str) -> T,
    {
        let mut index = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if index.insert(item.clone(), i).is_some() {
                panic!("truth table: duplicate entity name {}", item);
            }
        }

        let mut values = Vec::with_capacity(items.len() * items.len());
        for from in &items {
            for to in &items {
                values.push(f(from, to));
            }
        }

        Self {
            items,
            index,
            values,
        }
    }

    /// Entity names in construction order
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Whether `name` is one of the table's entities
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Value at (from, to). Panics if either name is unknown.
    pub fn get(&self, from: &str, to: &str) -> &T {
        let idx = self.offset(from, to);
        &self.values[idx]
    }

    /// Mutable value at (from, to). Panics if either name is unknown.
    pub fn get_mut(&mut self, from: &str, to: &str) -> &mut T {
        let idx = self.offset(from, to);
        &mut self.values[idx]
    }

    /// All (from, to) pairs, row-major in construction order
    pub fn keys(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.items.iter().flat_map(move |from| {
            self.items
                .iter()
                .map(move |to| (from.as_str(), to.as_str()))
        })
    }

    /// All cells with their (from, to) pair, in the same order as [`keys`](Self::keys)
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str, &T)> + '_ {
        self.keys().zip(self.values.iter()).map(|((fr, to), v)| (fr, to, v))
    }

    /// Render the matrix as a grid with one row per source entity.
    ///
    /// In multi-line mode `schema` labels the corner cell and rows are
    /// separated by lines; otherwise the corner is left blank.
    pub fn render<F>(&self, schema: &str, is_multiline: bool, print: F) -> String
    where
        F: Fn(&str, &str, &T) -> String,
    {
        let corner = if is_multiline { schema } else { "" };
        let header: Vec<String> = std::iter::once(corner.to_string())
            .chain(self.items.iter().cloned())
            .collect();

        let rows: Vec<Vec<String>> = self
            .items
            .iter()
            .map(|from| {
                std::iter::once(from.clone())
                    .chain(
                        self.items
                            .iter()
                            .map(|to| print(from, to, self.get(from, to))),
                    )
                    .collect()
            })
            .collect();

        render_grid(&header, &rows, is_multiline)
    }

    fn offset(&self, from: &str, to: &str) -> usize {
        let row = self.position(from);
        let col = self.position(to);
        row * self.items.len() + col
    }

    fn position(&self, name: &str) -> usize {
        match self.index.get(name) {
            Some(i) => *i,
            None => panic!("truth table: unknown entity {}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn factory_runs_once_per_ordered_pair() {
        let mut calls = Vec::new();
        let table = TruthTable::from_items(names(&["a", "b"]), |fr, to| {
            calls.push(format!("{}{}", fr, to));
            format!("{}->{}", fr, to)
        });

        assert_eq!(calls, vec!["aa", "ab", "ba", "bb"]);
        assert_eq!(table.get("b", "a"), "b->a");
        assert_eq!(table.get("a", "a"), "a->a");
    }

    #[test]
    fn keys_are_row_major_in_construction_order() {
        let table = TruthTable::from_items(names(&["z", "a"]), |_, _| ());
        let keys: Vec<(&str, &str)> = table.keys().collect();
        assert_eq!(keys, vec![("z", "z"), ("z", "a"), ("a", "z"), ("a", "a")]);
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut table = TruthTable::from_items(names(&["a", "b"]), |_, _| 0);
        *table.get_mut("a", "b") += 5;
        assert_eq!(*table.get("a", "b"), 5);
        assert_eq!(*table.get("b", "a"), 0);
    }

    #[test]
    #[should_panic(expected = "unknown entity c")]
    fn unknown_entity_panics() {
        let table = TruthTable::from_items(names(&["a", "b"]), |_, _| 0);
        table.get("a", "c");
    }

    #[test]
    #[should_panic(expected = "duplicate entity name a")]
    fn duplicate_entities_panic() {
        TruthTable::from_items(names(&["a", "a"]), |_, _| 0);
    }

    #[test]
    fn schema_label_only_in_multiline_mode() {
        let table = TruthTable::from_items(names(&["a"]), |_, _| ());

        let simple = table.render("tcp/80", false, |_, _, _| ".".to_string());
        assert!(!simple.contains("tcp/80"));

        let multi = table.render("tcp/80", true, |_, _, _| ".".to_string());
        assert!(multi.contains("| tcp/80 |"));
    }

    #[test]
    fn cells_pair_values_with_keys() {
        let table = TruthTable::from_items(names(&["a", "b"]), |fr, to| fr == to);
        let loopbacks: Vec<&str> = table
            .cells()
            .filter(|(_, _, is_self)| **is_self)
            .map(|(fr, _, _)| fr)
            .collect();
        assert_eq!(loopbacks, vec!["a", "b"]);
    }
}

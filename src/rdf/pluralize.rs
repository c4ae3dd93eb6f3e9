//! Table-name pluralization for semantic collection predicates.
//!
//! A forward edge `books.author_id → authors` gets a collection predicate
//! `authors.<plural(books)>` pointing back at the referencing rows. The
//! rules here are deliberately simple English heuristics; a table whose
//! name is already plural double-pluralizes (`series` → `serieses`),
//! which is a documented cosmetic artifact of the generated schema.

/// Pluralize a (lowercased) table name.
///
/// Deterministic and side-effect free: the same input always yields the
/// same output, so predicate names are stable across runs.
pub fn pluralize(name: &str) -> String {
    let name = name.to_lowercase();

    if name.ends_with('s')
        || name.ends_with('x')
        || name.ends_with('z')
        || name.ends_with("ch")
        || name.ends_with("sh")
    {
        return format!("{name}es");
    }

    if name.ends_with('y') && name.len() > 1 {
        let second_last = name.as_bytes()[name.len() - 2];
        if !matches!(second_last, b'a' | b'e' | b'i' | b'o' | b'u') {
            return format!("{}ies", &name[..name.len() - 1]);
        }
    }

    if name.ends_with("fe") {
        return format!("{}ves", &name[..name.len() - 2]);
    }

    if name.ends_with('f') {
        return format!("{}ves", &name[..name.len() - 1]);
    }

    format!("{name}s")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibilant_endings() {
        assert_eq!(pluralize("bus"), "buses");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("quiz"), "quizes");
        assert_eq!(pluralize("match"), "matches");
        assert_eq!(pluralize("dish"), "dishes");
    }

    #[test]
    fn test_consonant_y() {
        assert_eq!(pluralize("company"), "companies");
        assert_eq!(pluralize("category"), "categories");
    }

    #[test]
    fn test_vowel_y() {
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("key"), "keys");
    }

    #[test]
    fn test_f_endings() {
        assert_eq!(pluralize("leaf"), "leaves");
        assert_eq!(pluralize("knife"), "knives");
    }

    #[test]
    fn test_default() {
        assert_eq!(pluralize("user"), "users");
        assert_eq!(pluralize("author"), "authors");
    }

    #[test]
    fn test_already_plural_double_pluralizes() {
        // Known imperfection, accepted: s-terminal names get +es.
        assert_eq!(pluralize("series"), "serieses");
        assert_eq!(pluralize("books"), "bookses");
    }

    #[test]
    fn test_case_folding() {
        assert_eq!(pluralize("User"), "users");
    }
}

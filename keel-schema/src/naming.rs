//! Naming rules for tables, pivot tables and foreign keys.
//!
//! Table names are the snake_cased plural of the model name. Only the last
//! word of a snake_cased name is inflected, so `OrderItem` becomes
//! `order_items`.

use convert_case::{Case, Casing};

/// Words whose singular and plural are identical.
const UNCOUNTABLE: &[&str] = &[
    "data",
    "equipment",
    "feedback",
    "fish",
    "information",
    "media",
    "metadata",
    "money",
    "news",
    "rice",
    "series",
    "sheep",
    "species",
];

/// Irregular `(singular, plural)` pairs.
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("ox", "oxen"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("knife", "knives"),
    ("wife", "wives"),
    ("half", "halves"),
    ("shelf", "shelves"),
    ("status", "statuses"),
    ("bus", "buses"),
    ("campus", "campuses"),
    ("virus", "viruses"),
    ("bonus", "bonuses"),
    ("quiz", "quizzes"),
];

/// Convert an identifier to snake_case.
pub fn snake_case(name: &str) -> String {
    name.to_case(Case::Snake)
}

/// Pluralize the last word of a snake_case name.
pub fn pluralize(name: &str) -> String {
    inflect_last_word(name, pluralize_word)
}

/// Singularize the last word of a snake_case name.
pub fn singularize(name: &str) -> String {
    inflect_last_word(name, singularize_word)
}

/// Table name for a model: `snake_case(plural(name))`.
pub fn table_name(model_name: &str) -> String {
    pluralize(&snake_case(model_name))
}

/// Default foreign key column pointing at a model: `{snake_case(name)}_id`.
pub fn foreign_key_name(model_name: &str) -> String {
    format!("{}_id", snake_case(model_name))
}

/// Default pivot key pointing at a table: `{singular(table)}_{primary_key}`.
pub fn pivot_key_name(table: &str, primary_key: &str) -> String {
    format!("{}_{}", singularize(table), primary_key)
}

/// Default pivot table for two tables.
///
/// The names are sorted so both sides of a relation agree, then the first
/// is singularized: `posts` + `tags` gives `post_tags`.
pub fn pivot_table_name(first_table: &str, second_table: &str) -> String {
    let mut tables = [first_table, second_table];
    tables.sort_unstable();
    format!("{}_{}", singularize(tables[0]), tables[1])
}

/// Default polymorphic prefix for a model: `{snake_case(name)}able`.
pub fn morph_name(model_name: &str) -> String {
    format!("{}able", snake_case(model_name))
}

fn inflect_last_word(name: &str, inflect: fn(&str) -> String) -> String {
    match name.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, inflect(last)),
        None => inflect(name),
    }
}

fn pluralize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        return (*plural).to_string();
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == lower) {
        return word.to_string();
    }

    if lower.ends_with("ss")
        || lower.ends_with("us")
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{}es", word);
    }
    if let Some(stem) = lower.strip_suffix("is") {
        return format!("{}es", &word[..stem.len()]);
    }
    if lower.ends_with('s') {
        // Already plural.
        return word.to_string();
    }
    if let Some(stem) = lower.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", &word[..stem.len()]);
        }
    }
    format!("{}s", word)
}

fn singularize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, plural)| *plural == lower) {
        return (*singular).to_string();
    }
    if IRREGULAR.iter().any(|(singular, _)| *singular == lower) {
        return word.to_string();
    }

    if let Some(stem) = lower.strip_suffix("ies") {
        if stem.len() > 1 {
            return format!("{}y", &word[..stem.len()]);
        }
    }
    for suffix in ["sses", "ches", "shes", "xes", "zes"] {
        if lower.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("is") {
        return word.to_string();
    }
    if lower.ends_with('s') {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

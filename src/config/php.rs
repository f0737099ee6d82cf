// ABOUTME: Reader for PHP-style application config files (e.g. wp-config.php).
// ABOUTME: Extracts define('NAME', 'value') constants and $name = "value"; assignments.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// `define('DB_NAME', 'wordpress')`
static CONSTANT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"define\(\s*['"]([^'"]+)['"]\s*,\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("constant pattern is valid")
});

/// `$table_prefix = "wp_";`
static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$(\w+)\s*=\s*['"]([^'"]+)['"]\s*;"#).expect("variable pattern is valid")
});

/// Extract settings from the text of a single file.
///
/// Keys are lower-cased. Within one file, assignments override constants of
/// the same name.
pub fn parse_str(raw: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for caps in CONSTANT_PATTERN.captures_iter(raw) {
        values.insert(caps[1].to_lowercase(), caps[2].to_string());
    }
    for caps in VARIABLE_PATTERN.captures_iter(raw) {
        values.insert(caps[1].to_lowercase(), caps[2].to_string());
    }
    values
}

/// Read and merge several files in order. Later files win on key collision;
/// files that do not exist are skipped.
pub fn parse_files<P: AsRef<Path>>(paths: &[P]) -> std::io::Result<BTreeMap<String, String>> {
    let mut merged = BTreeMap::new();
    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("config file {} not found, skipping", path.display());
            continue;
        }
        let raw = std::fs::read_to_string(path)?;
        merged.extend(parse_str(&raw));
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_constants_and_assignments() {
        let raw = r#"<?php
define('DB_NAME','wordpress');
define( "DB_HOST" , "localhost" );
$table_prefix = "wp_";
"#;
        let values = parse_str(raw);
        assert_eq!(values.get("db_name").map(String::as_str), Some("wordpress"));
        assert_eq!(values.get("db_host").map(String::as_str), Some("localhost"));
        assert_eq!(values.get("table_prefix").map(String::as_str), Some("wp_"));
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn assignment_overrides_constant_in_same_file() {
        let raw = "define('PREFIX', 'a');\n$prefix = 'b';";
        assert_eq!(parse_str(raw).get("prefix").map(String::as_str), Some("b"));
    }

    #[test]
    fn ignores_empty_values() {
        assert!(parse_str("define('EMPTY', '');").is_empty());
    }
}

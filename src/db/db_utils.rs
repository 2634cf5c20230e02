use std::path::{Path, PathBuf};

/// Double-quotes an identifier, doubling any embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Builds the insert-or-update statement for one table and column list.
pub fn insert_or_replace_sql(table: &str, columns: &[String]) -> String {
    let column_list: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");

    format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        column_list.join(", "),
        placeholders
    )
}

/// Location of the database file for a project/instance/database triple.
pub fn database_path(data_dir: &Path, project: &str, instance: &str, database: &str) -> PathBuf {
    data_dir
        .join(project)
        .join(instance)
        .join(format!("{}.duckdb", database))
}

//! SQL dialect adapters
//!
//! A [`Dialect`] supplies the bookkeeping SQL for the metadata table and the
//! policy for splitting a migration script into statements. Every dialect is a
//! zero-sized struct; CockroachDB and MariaDB wrap and delegate to the dialect
//! they are compatible with.
//!
//! | Dialect | Placeholders | Split policy |
//! |---------|--------------|--------------|
//! | [`Postgres`], [`CockroachDb`] | `$1` | whole script |
//! | [`MySql`], [`MariaDb`] | `?` | `;` or a `delimiter` directive |
//! | [`Sqlite`] | `?` | whole script |
//! | [`MsSql`] | `?` | whole script |

use std::fmt;
use std::str::FromStr;

/// Name of the table that records applied migrations
pub const MIGRATIONS_TABLE: &str = "updown_migrations";

/// First-line prefix that selects a custom statement delimiter
const DELIMITER_DIRECTIVE: &str = "delimiter ";

/// Dialect-specific SQL used by the migrator
pub trait Dialect: Send + Sync {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Query returning a row when the table named by the single parameter exists
    fn select_migration_table_sql(&self) -> String;

    /// Statement creating the metadata table
    fn create_migration_table_sql(&self) -> String;

    /// Query returning a row when the migration id parameter is recorded as applied
    fn get_migration_sql(&self) -> String;

    /// Statement recording the migration id parameter as applied
    fn migration_log_insert_sql(&self) -> String;

    /// Statement removing the migration id parameter from the metadata table
    fn migration_log_delete_sql(&self) -> String;

    /// Split a script into statements the driver can execute one at a time
    fn migration_commands(&self, sql: &str) -> Vec<String> {
        vec![sql.to_string()]
    }
}

/// PostgreSQL
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn select_migration_table_sql(&self) -> String {
        "SELECT tablename FROM pg_catalog.pg_tables WHERE tablename = $1".to_string()
    }

    fn create_migration_table_sql(&self) -> String {
        format!(
            "CREATE TABLE {MIGRATIONS_TABLE} (\n    \
                id           SERIAL       PRIMARY KEY,\n    \
                migration_id BIGINT       UNIQUE NOT NULL\n\
            )"
        )
    }

    fn get_migration_sql(&self) -> String {
        format!("SELECT migration_id FROM {MIGRATIONS_TABLE} WHERE migration_id = $1")
    }

    fn migration_log_insert_sql(&self) -> String {
        format!("INSERT INTO {MIGRATIONS_TABLE} (migration_id) VALUES ($1)")
    }

    fn migration_log_delete_sql(&self) -> String {
        format!("DELETE FROM {MIGRATIONS_TABLE} WHERE migration_id = $1")
    }
}

/// CockroachDB, which speaks the PostgreSQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct CockroachDb {
    inner: Postgres,
}

impl Dialect for CockroachDb {
    fn name(&self) -> &'static str {
        "cockroachdb"
    }

    fn select_migration_table_sql(&self) -> String {
        self.inner.select_migration_table_sql()
    }

    fn create_migration_table_sql(&self) -> String {
        self.inner.create_migration_table_sql()
    }

    fn get_migration_sql(&self) -> String {
        self.inner.get_migration_sql()
    }

    fn migration_log_insert_sql(&self) -> String {
        self.inner.migration_log_insert_sql()
    }

    fn migration_log_delete_sql(&self) -> String {
        self.inner.migration_log_delete_sql()
    }

    fn migration_commands(&self, sql: &str) -> Vec<String> {
        self.inner.migration_commands(sql)
    }
}

/// MySQL
///
/// MySQL drivers reject multi-statement batches, so scripts are split on `;`.
/// A script whose first line is `delimiter <value>` is split on `<value>`
/// instead, which lets stored procedure bodies keep their semicolons.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn select_migration_table_sql(&self) -> String {
        "SELECT table_name FROM information_schema.tables \
         WHERE table_name = ? AND table_schema = (SELECT DATABASE())"
            .to_string()
    }

    fn create_migration_table_sql(&self) -> String {
        format!(
            "CREATE TABLE {MIGRATIONS_TABLE} (\n    \
                id           INT          NOT NULL AUTO_INCREMENT,\n    \
                migration_id BIGINT       NOT NULL UNIQUE,\n    \
                PRIMARY KEY (id)\n\
            )"
        )
    }

    fn get_migration_sql(&self) -> String {
        format!("SELECT migration_id FROM {MIGRATIONS_TABLE} WHERE migration_id = ?")
    }

    fn migration_log_insert_sql(&self) -> String {
        format!("INSERT INTO {MIGRATIONS_TABLE} (migration_id) VALUES (?)")
    }

    fn migration_log_delete_sql(&self) -> String {
        format!("DELETE FROM {MIGRATIONS_TABLE} WHERE migration_id = ?")
    }

    fn migration_commands(&self, sql: &str) -> Vec<String> {
        split_delimited(sql)
    }
}

/// MariaDB, which speaks the MySQL dialect
#[derive(Debug, Clone, Copy, Default)]
pub struct MariaDb {
    inner: MySql,
}

impl Dialect for MariaDb {
    fn name(&self) -> &'static str {
        "mariadb"
    }

    fn select_migration_table_sql(&self) -> String {
        self.inner.select_migration_table_sql()
    }

    fn create_migration_table_sql(&self) -> String {
        self.inner.create_migration_table_sql()
    }

    fn get_migration_sql(&self) -> String {
        self.inner.get_migration_sql()
    }

    fn migration_log_insert_sql(&self) -> String {
        self.inner.migration_log_insert_sql()
    }

    fn migration_log_delete_sql(&self) -> String {
        self.inner.migration_log_delete_sql()
    }

    fn migration_commands(&self, sql: &str) -> Vec<String> {
        self.inner.migration_commands(sql)
    }
}

/// SQLite
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn select_migration_table_sql(&self) -> String {
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?".to_string()
    }

    fn create_migration_table_sql(&self) -> String {
        format!(
            "CREATE TABLE {MIGRATIONS_TABLE} (\n    \
                id INTEGER PRIMARY KEY,\n    \
                migration_id INTEGER NOT NULL UNIQUE\n\
            )"
        )
    }

    fn get_migration_sql(&self) -> String {
        format!("SELECT migration_id FROM {MIGRATIONS_TABLE} WHERE migration_id = ?")
    }

    fn migration_log_insert_sql(&self) -> String {
        format!("INSERT INTO {MIGRATIONS_TABLE} (migration_id) VALUES (?)")
    }

    fn migration_log_delete_sql(&self) -> String {
        format!("DELETE FROM {MIGRATIONS_TABLE} WHERE migration_id = ?")
    }
}

/// Microsoft SQL Server
#[derive(Debug, Clone, Copy, Default)]
pub struct MsSql;

impl Dialect for MsSql {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn select_migration_table_sql(&self) -> String {
        "SELECT table_name FROM information_schema.tables WHERE table_name = ?".to_string()
    }

    fn create_migration_table_sql(&self) -> String {
        format!(
            "CREATE TABLE {MIGRATIONS_TABLE} (\n    \
                id           INT          NOT NULL IDENTITY,\n    \
                migration_id BIGINT       NOT NULL UNIQUE,\n    \
                PRIMARY KEY (id)\n\
            )"
        )
    }

    fn get_migration_sql(&self) -> String {
        format!("SELECT migration_id FROM {MIGRATIONS_TABLE} WHERE migration_id = ?")
    }

    fn migration_log_insert_sql(&self) -> String {
        format!("INSERT INTO {MIGRATIONS_TABLE} (migration_id) VALUES (?)")
    }

    fn migration_log_delete_sql(&self) -> String {
        format!("DELETE FROM {MIGRATIONS_TABLE} WHERE migration_id = ?")
    }
}

/// Splits a script on `;`, or on the delimiter named by a leading
/// `delimiter <value>` line.
///
/// The directive line is removed before splitting. Fragments are returned
/// verbatim, so a trailing delimiter yields a final blank statement.
pub fn split_delimited(sql: &str) -> Vec<String> {
    let (delimiter, body) = match sql.strip_prefix(DELIMITER_DIRECTIVE) {
        Some(rest) => {
            let (line, body) = rest.split_once('\n').unwrap_or((rest, ""));
            let raw = line.trim();
            let delimiter = unquote(raw).unwrap_or_else(|| raw.to_string());
            (delimiter, body)
        }
        None => (";".to_string(), sql),
    };

    // An empty delimiter would split between every character
    if delimiter.is_empty() {
        return vec![body.to_string()];
    }

    body.split(delimiter.as_str()).map(str::to_string).collect()
}

/// Unquotes a double-quoted, single-quoted (one character) or backquoted literal.
///
/// Recognized escapes: `\a \b \f \n \r \t \v \\`, `\xNN`,
/// three-digit octal, `\uNNNN`, `\UNNNNNNNN` and the enclosing quote.
/// Returns `None` when `raw` is not a well-formed quoted literal.
fn unquote(raw: &str) -> Option<String> {
    let quote = raw.chars().next()?;
    if !matches!(quote, '"' | '\'' | '`') || raw.len() < 2 || !raw.ends_with(quote) {
        return None;
    }
    let inner = &raw[1..raw.len() - 1];

    match quote {
        '`' => (!inner.contains('`')).then(|| inner.replace('\r', "")),
        '"' => unescape(inner, quote),
        _ => unescape(inner, quote).filter(|value| value.chars().count() == 1),
    }
}

fn unescape(inner: &str, quote: char) -> Option<String> {
    let mut out: Vec<u8> = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == quote || c == '\n' {
            return None;
        }
        if c != '\\' {
            push_char(&mut out, c);
            continue;
        }

        let escape = chars.next()?;
        match escape {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' => out.push(b'\\'),
            '"' | '\'' if escape == quote => push_char(&mut out, escape),
            // \x and octal escapes produce raw bytes
            'x' => out.push(u8::try_from(take_digits(&mut chars, 2, 16)?).ok()?),
            '0'..='7' => {
                let rest = take_digits(&mut chars, 2, 8)?;
                let value = escape.to_digit(8)? * 64 + rest;
                out.push(u8::try_from(value).ok()?);
            }
            'u' => push_char(&mut out, char::from_u32(take_digits(&mut chars, 4, 16)?)?),
            'U' => push_char(&mut out, char::from_u32(take_digits(&mut chars, 8, 16)?)?),
            _ => return None,
        }
    }

    String::from_utf8(out).ok()
}

fn take_digits(chars: &mut std::str::Chars<'_>, count: usize, radix: u32) -> Option<u32> {
    (0..count).try_fold(0u32, |acc, _| Some(acc * radix + chars.next()?.to_digit(radix)?))
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

/// Selects a dialect by name, e.g. from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    Postgres,
    CockroachDb,
    Mysql,
    Mariadb,
    Sqlite,
    Mssql,
}

impl DialectKind {
    /// Build the dialect adapter for this kind
    pub fn dialect(self) -> Box<dyn Dialect> {
        match self {
            DialectKind::Postgres => Box::new(Postgres),
            DialectKind::CockroachDb => Box::new(CockroachDb::default()),
            DialectKind::Mysql => Box::new(MySql),
            DialectKind::Mariadb => Box::new(MariaDb::default()),
            DialectKind::Sqlite => Box::new(Sqlite),
            DialectKind::Mssql => Box::new(MsSql),
        }
    }
}

impl FromStr for DialectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(DialectKind::Postgres),
            "cockroachdb" | "cockroach" => Ok(DialectKind::CockroachDb),
            "mysql" => Ok(DialectKind::Mysql),
            "mariadb" => Ok(DialectKind::Mariadb),
            "sqlite" | "sqlite3" => Ok(DialectKind::Sqlite),
            "mssql" | "sqlserver" => Ok(DialectKind::Mssql),
            other => Err(format!("unknown dialect '{other}'")),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dialect().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split_keeps_whole_script() {
        let sql = "CREATE TABLE a (x INT);\nCREATE TABLE b (y INT);";
        assert_eq!(Postgres.migration_commands(sql), vec![sql.to_string()]);
        assert_eq!(Sqlite.migration_commands(sql), vec![sql.to_string()]);
        assert_eq!(MsSql.migration_commands(sql), vec![sql.to_string()]);
    }

    #[test]
    fn test_mysql_splits_on_semicolon() {
        let cmds = MySql.migration_commands("CREATE TABLE a (x INT);CREATE TABLE b (y INT);");
        assert_eq!(cmds, vec!["CREATE TABLE a (x INT)", "CREATE TABLE b (y INT)", ""]);
    }

    #[test]
    fn test_mysql_delimiter_directive() {
        let sql = "delimiter #\nCREATE TABLE t(x int)#CREATE TABLE u(y int)#";
        let cmds = MySql.migration_commands(sql);
        let non_empty: Vec<_> = cmds.iter().filter(|c| !c.trim().is_empty()).collect();
        assert_eq!(non_empty, vec!["CREATE TABLE t(x int)", "CREATE TABLE u(y int)"]);
        assert!(cmds.iter().all(|c| !c.contains("delimiter")));
    }

    #[test]
    fn test_mysql_quoted_delimiter() {
        let sql = "delimiter \"$$\"\nCREATE PROCEDURE p() BEGIN SELECT 1; END$$SELECT 2$$";
        let cmds = split_delimited(sql);
        assert_eq!(
            cmds,
            vec!["CREATE PROCEDURE p() BEGIN SELECT 1; END", "SELECT 2", ""]
        );
    }

    #[test]
    fn test_delimiter_line_is_trimmed() {
        let cmds = split_delimited("delimiter   //  \r\nSELECT 1//SELECT 2");
        assert_eq!(cmds, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_directive_is_case_sensitive() {
        let sql = "DELIMITER #\nSELECT 1#SELECT 2";
        let cmds = split_delimited(sql);
        assert_eq!(cmds, vec![sql.to_string()]);
    }

    #[test]
    fn test_directive_requires_trailing_space() {
        let sql = "delimiter\nSELECT 1;SELECT 2";
        let cmds = split_delimited(sql);
        assert_eq!(cmds, vec!["delimiter\nSELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_directive_without_body() {
        assert_eq!(split_delimited("delimiter #"), vec![""]);
    }

    #[test]
    fn test_empty_delimiter_keeps_body() {
        let cmds = split_delimited("delimiter \"\"\nSELECT 1; SELECT 2");
        assert_eq!(cmds, vec!["SELECT 1; SELECT 2"]);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"#\""), Some("#".to_string()));
        assert_eq!(unquote("\"\\t\""), Some("\t".to_string()));
        assert_eq!(unquote("`//`"), Some("//".to_string()));
        assert_eq!(unquote("'#'"), Some("#".to_string()));
        assert_eq!(unquote("'##'"), None);
        assert_eq!(unquote("\""), None);
        assert_eq!(unquote("$$"), None);
        assert_eq!(unquote("\"unterminated"), None);
    }

    #[test]
    fn test_unquote_simple_escapes() {
        assert_eq!(
            unquote(r#""\a\b\f\n\r\t\v\\""#),
            Some("\u{7}\u{8}\u{c}\n\r\t\u{b}\\".to_string())
        );
        assert_eq!(unquote(r#""\"""#), Some("\"".to_string()));
        assert_eq!(unquote(r"'\''"), Some("'".to_string()));
        assert_eq!(unquote(r"'\\'"), Some("\\".to_string()));
    }

    #[test]
    fn test_unquote_numeric_escapes() {
        assert_eq!(unquote(r#""\x24\x24""#), Some("$$".to_string()));
        assert_eq!(unquote(r#""\044\044""#), Some("$$".to_string()));
        assert_eq!(unquote(r#""\u0024/""#), Some("$/".to_string()));
        assert_eq!(unquote(r#""\U0001F600""#), Some("\u{1F600}".to_string()));
        assert_eq!(unquote(r"'\x23'"), Some("#".to_string()));
        assert_eq!(unquote(r"'\043'"), Some("#".to_string()));
    }

    #[test]
    fn test_unquote_rejects_malformed_escapes() {
        // Wrong quote escaped
        assert_eq!(unquote(r#""\'""#), None);
        assert_eq!(unquote(r#"'\"'"#), None);
        // Bare quote or newline inside
        assert_eq!(unquote(r#""a"b""#), None);
        assert_eq!(unquote("\"a\nb\""), None);
        // Short or invalid digits
        assert_eq!(unquote(r#""\x2""#), None);
        assert_eq!(unquote(r#""\xzz""#), None);
        assert_eq!(unquote(r#""\777""#), None);
        assert_eq!(unquote(r#""\uD800""#), None);
        // Unknown escape
        assert_eq!(unquote(r#""\q""#), None);
        // Raw bytes that are not UTF-8
        assert_eq!(unquote(r#""\xff""#), None);
    }

    #[test]
    fn test_escaped_delimiters_split() {
        assert_eq!(
            split_delimited("delimiter \"\\x24\\x24\"\nSELECT 1$$SELECT 2"),
            vec!["SELECT 1", "SELECT 2"]
        );
        assert_eq!(
            split_delimited("delimiter '\\''\nSELECT 1'SELECT 2"),
            vec!["SELECT 1", "SELECT 2"]
        );
        assert_eq!(
            split_delimited("delimiter \"\\u002F\\u002F\"\nSELECT 1//SELECT 2"),
            vec!["SELECT 1", "SELECT 2"]
        );
    }

    #[test]
    fn test_delegating_dialects_match_parent() {
        let pg = Postgres;
        let crdb = CockroachDb::default();
        assert_eq!(pg.create_migration_table_sql(), crdb.create_migration_table_sql());
        assert_eq!(pg.get_migration_sql(), crdb.get_migration_sql());
        assert_eq!(crdb.name(), "cockroachdb");

        let my = MySql;
        let maria = MariaDb::default();
        assert_eq!(my.select_migration_table_sql(), maria.select_migration_table_sql());
        assert_eq!(
            maria.migration_commands("SELECT 1;SELECT 2"),
            vec!["SELECT 1", "SELECT 2"]
        );
    }

    #[test]
    fn test_templates_reference_metadata_table() {
        for kind in [
            DialectKind::Postgres,
            DialectKind::CockroachDb,
            DialectKind::Mysql,
            DialectKind::Mariadb,
            DialectKind::Sqlite,
            DialectKind::Mssql,
        ] {
            let d = kind.dialect();
            assert!(d.create_migration_table_sql().contains(MIGRATIONS_TABLE));
            assert!(d.create_migration_table_sql().contains("UNIQUE"));
            assert!(d.get_migration_sql().contains("migration_id"));
            assert!(d.migration_log_insert_sql().starts_with("INSERT INTO"));
            assert!(d.migration_log_delete_sql().starts_with("DELETE FROM"));
        }
    }

    #[test]
    fn test_dialect_kind_from_str() {
        assert_eq!("postgres".parse::<DialectKind>(), Ok(DialectKind::Postgres));
        assert_eq!("SQLite3".parse::<DialectKind>(), Ok(DialectKind::Sqlite));
        assert_eq!("mariadb".parse::<DialectKind>(), Ok(DialectKind::Mariadb));
        assert!("oracle".parse::<DialectKind>().is_err());
        assert_eq!(DialectKind::Mssql.to_string(), "mssql");
    }
}

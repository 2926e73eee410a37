//! # Schema Generation
//!
//! Turns model metadata into DDL for the selected driver. Statements are
//! returned in execution order so callers can run them one by one.

use crate::{
    database::Drivers,
    model::{ColumnInfo, ForeignKey, ManyToManyInfo, OnDelete, SqlType},
    Model,
};

/// CREATE statements for `T`: the table, its indexes, then its join tables.
///
/// With `if_not_exists` the statements tolerate objects that already exist
/// (indexes excepted on MySQL, which has no such clause for them).
pub fn create_table_statements<T: Model>(driver: Drivers, if_not_exists: bool) -> Vec<String> {
    let table = T::table_name();
    let columns = T::columns();

    let mut definitions: Vec<String> = columns.iter().map(|c| column_definition(c, driver)).collect();
    for column in &columns {
        if let Some(fk) = &column.foreign_key {
            definitions.push(foreign_key_constraint(table, column.name, fk, driver));
        }
    }

    let mut statements = vec![create_table(table, &definitions, driver, if_not_exists)];

    for column in &columns {
        if column.index && !column.is_primary_key && !column.unique {
            statements.push(create_index(table, column.name, driver, if_not_exists));
        }
    }

    for relation in T::many_to_many() {
        statements.extend(join_table_statements(&relation, driver, if_not_exists));
    }

    statements
}

/// DROP statements for `T`: join tables first, then the table itself.
pub fn drop_table_statements<T: Model>(driver: Drivers) -> Vec<String> {
    let mut statements: Vec<String> = T::many_to_many()
        .iter()
        .map(|relation| format!("DROP TABLE {}", driver.quote(&relation.join_table)))
        .collect();
    statements.push(format!("DROP TABLE {}", driver.quote(T::table_name())));
    statements
}

/// Column definition as it appears inside CREATE TABLE.
pub fn column_definition(column: &ColumnInfo, driver: Drivers) -> String {
    let name = driver.quote(column.name);

    if column.is_primary_key && column.auto_increment {
        return match driver {
            // only the exact `INTEGER PRIMARY KEY` spelling aliases SQLite's rowid
            Drivers::SQLite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name),
            Drivers::Postgres => {
                format!("{} {} GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY", name, column.sql_type.render(driver))
            }
            Drivers::MySQL => format!("{} {} AUTO_INCREMENT PRIMARY KEY", name, column.sql_type.render(driver)),
        };
    }

    let mut def = format!("{} {}", name, column.sql_type.render(driver));

    if column.is_primary_key {
        def.push_str(" PRIMARY KEY");
    } else if !column.is_nullable {
        def.push_str(" NOT NULL");
    }

    if column.unique && !column.is_primary_key {
        def.push_str(" UNIQUE");
    }

    if let Some(default) = column.default {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    } else if column.create_time {
        def.push_str(match (driver, column.sql_type) {
            (Drivers::MySQL, SqlType::Timestamp) => " DEFAULT CURRENT_TIMESTAMP(6)",
            _ => " DEFAULT CURRENT_TIMESTAMP",
        });
    }

    def
}

fn create_table(table: &str, definitions: &[String], driver: Drivers, if_not_exists: bool) -> String {
    format!(
        "CREATE TABLE {}{} ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        driver.quote(table),
        definitions.join(", ")
    )
}

fn foreign_key_constraint(table: &str, column: &str, fk: &ForeignKey, driver: Drivers) -> String {
    format!(
        "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
        driver.quote(&format!("fk_{}_{}", table, column)),
        driver.quote(column),
        driver.quote(fk.table),
        driver.quote(fk.column),
        fk.on_delete.as_sql()
    )
}

fn create_index(table: &str, column: &str, driver: Drivers, if_not_exists: bool) -> String {
    let guard = if if_not_exists && driver != Drivers::MySQL { "IF NOT EXISTS " } else { "" };
    format!(
        "CREATE INDEX {}{} ON {} ({})",
        guard,
        driver.quote(&format!("idx_{}_{}", table, column)),
        driver.quote(table),
        driver.quote(column)
    )
}

/// The join table keyed by both columns, each cascading from its side.
///
/// The composite key already serves lookups by source; the target column gets its own index.
fn join_table_statements(relation: &ManyToManyInfo, driver: Drivers, if_not_exists: bool) -> Vec<String> {
    let join = relation.join_table.as_str();
    let source = relation.source_column.as_str();
    let target = relation.target_column.as_str();
    let key_type = SqlType::BigInt.render(driver);

    let definitions = vec![
        format!("{} {} NOT NULL", driver.quote(source), key_type),
        format!("{} {} NOT NULL", driver.quote(target), key_type),
        format!("PRIMARY KEY ({}, {})", driver.quote(source), driver.quote(target)),
        foreign_key_constraint(
            join,
            source,
            &ForeignKey { table: relation.source_table, column: relation.source_key, on_delete: OnDelete::Cascade },
            driver,
        ),
        foreign_key_constraint(
            join,
            target,
            &ForeignKey { table: relation.target_table, column: relation.target_key, on_delete: OnDelete::Cascade },
            driver,
        ),
    ];

    vec![create_table(join, &definitions, driver, if_not_exists), create_index(join, target, driver, if_not_exists)]
}

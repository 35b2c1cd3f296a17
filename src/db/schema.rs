//! Schema introspection module.
//!
//! Every operation is a fixed catalog query. Schema and table names are
//! always bound as parameters, never formatted into the SQL.
//!
//! # Architecture
//!
//! SQL queries are organized in the `queries` submodule with constants for each
//! database type. Database-specific implementations are in their respective
//! submodules (postgres, sqlite), each providing the same interface.

use crate::db::connector::DbConnection;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnDescriptor, KeyRole, RelationshipDescriptor, TableDescriptor};
use tracing::debug;

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Names of the tables in `schema`, ordered by name.
    ///
    /// An empty or unknown schema yields an empty list.
    pub async fn list_tables(
        conn: &mut DbConnection,
        schema: &str,
        include_views: bool,
    ) -> DbResult<Vec<String>> {
        debug!(schema = schema, include_views, "Listing tables");
        match conn {
            DbConnection::Postgres(c) => postgres::list_tables(c, schema, include_views).await,
            DbConnection::Sqlite(c) => sqlite::list_tables(c, schema, include_views).await,
        }
    }

    /// Describe a table's columns, or fail with `NotFound`.
    pub async fn describe_table(
        conn: &mut DbConnection,
        schema: &str,
        table: &str,
    ) -> DbResult<TableDescriptor> {
        debug!(schema = schema, table = table, "Describing table");
        match conn {
            DbConnection::Postgres(c) => postgres::describe_table(c, schema, table).await,
            DbConnection::Sqlite(c) => sqlite::describe_table(c, schema, table).await,
        }
    }

    /// Foreign-key column pairs whose source table lives in `schema`,
    /// ordered by source table, constraint name and key position.
    pub async fn list_relationships(
        conn: &mut DbConnection,
        schema: &str,
        table: Option<&str>,
    ) -> DbResult<Vec<RelationshipDescriptor>> {
        debug!(schema = schema, table = ?table, "Listing relationships");
        match conn {
            DbConnection::Postgres(c) => postgres::list_relationships(c, schema, table).await,
            DbConnection::Sqlite(c) => sqlite::list_relationships(c, schema, table).await,
        }
    }
}

fn table_not_found(schema: &str, table: &str) -> DbError {
    DbError::not_found(schema, format!("table '{}'", table))
}

// =============================================================================
// SQL Query Templates
// =============================================================================
//
// Centralized SQL queries for schema introspection. Each database has its own
// submodule with queries adapted to its specific system catalogs.

mod queries {
    pub mod postgres {
        pub const LIST_TABLES: &str = r#"
            SELECT t.table_name::text AS table_name
            FROM information_schema.tables t
            WHERE t.table_schema = $1
              AND ($2 OR t.table_type = 'BASE TABLE')
            ORDER BY t.table_name
            "#;

        pub const TABLE_EXISTS: &str = r#"
            SELECT EXISTS (
                SELECT 1
                FROM information_schema.tables t
                WHERE t.table_schema = $1 AND t.table_name = $2
            ) AS found
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT
                c.column_name::text AS column_name,
                c.data_type::text AS data_type,
                (c.is_nullable = 'YES') AS is_nullable,
                c.column_default::text AS column_default,
                (
                    SELECT CASE MAX(CASE tc.constraint_type
                                        WHEN 'PRIMARY KEY' THEN 3
                                        WHEN 'FOREIGN KEY' THEN 2
                                        WHEN 'UNIQUE' THEN 1
                                    END)
                               WHEN 3 THEN 'primary'
                               WHEN 2 THEN 'foreign'
                               WHEN 1 THEN 'unique'
                           END
                    FROM information_schema.key_column_usage kcu
                    JOIN information_schema.table_constraints tc
                      ON tc.constraint_schema = kcu.constraint_schema
                     AND tc.constraint_name = kcu.constraint_name
                     AND tc.table_name = kcu.table_name
                    WHERE kcu.table_schema = c.table_schema
                      AND kcu.table_name = c.table_name
                      AND kcu.column_name = c.column_name
                ) AS key_role
            FROM information_schema.columns c
            WHERE c.table_schema = $1 AND c.table_name = $2
            ORDER BY c.ordinal_position
            "#;

        /// One row per column pair of every foreign key, composite keys
        /// included. Targets outside the schema are schema-qualified.
        pub const LIST_RELATIONSHIPS: &str = r#"
            SELECT
                con.conname::text AS constraint_name,
                src.relname::text AS source_table,
                src_att.attname::text AS source_column,
                CASE WHEN tgt_ns.nspname = ns.nspname
                     THEN tgt.relname::text
                     ELSE tgt_ns.nspname::text || '.' || tgt.relname::text
                END AS target_table,
                tgt_att.attname::text AS target_column
            FROM pg_catalog.pg_constraint con
            JOIN pg_catalog.pg_class src ON src.oid = con.conrelid
            JOIN pg_catalog.pg_namespace ns ON ns.oid = src.relnamespace
            JOIN pg_catalog.pg_class tgt ON tgt.oid = con.confrelid
            JOIN pg_catalog.pg_namespace tgt_ns ON tgt_ns.oid = tgt.relnamespace
            CROSS JOIN LATERAL unnest(con.conkey, con.confkey)
                WITH ORDINALITY AS k(src_attnum, tgt_attnum, position)
            JOIN pg_catalog.pg_attribute src_att
              ON src_att.attrelid = con.conrelid AND src_att.attnum = k.src_attnum
            JOIN pg_catalog.pg_attribute tgt_att
              ON tgt_att.attrelid = con.confrelid AND tgt_att.attnum = k.tgt_attnum
            WHERE con.contype = 'f'
              AND ns.nspname = $1
              AND ($2::text IS NULL OR src.relname = $2::text)
            ORDER BY src.relname, con.conname, k.position
            "#;
    }

    pub mod sqlite {
        pub const LIST_TABLES: &str = r#"
            SELECT name
            FROM pragma_table_list
            WHERE schema = ?1
              AND (type = 'table' OR (?2 AND type = 'view'))
              AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
            ORDER BY name
            "#;

        pub const TABLE_EXISTS: &str = r#"
            SELECT COUNT(*) AS found
            FROM pragma_table_list
            WHERE schema = ?1 AND name = ?2 AND type IN ('table', 'view')
            "#;

        pub const DESCRIBE_COLUMNS: &str = r#"
            SELECT name, type, "notnull" AS not_null, dflt_value, pk
            FROM pragma_table_info(?2, ?1)
            ORDER BY cid
            "#;

        pub const FOREIGN_KEY_COLUMNS: &str = r#"
            SELECT DISTINCT "from" AS column_name
            FROM pragma_foreign_key_list(?2, ?1)
            "#;

        pub const UNIQUE_COLUMNS: &str = r#"
            SELECT DISTINCT ii.name AS column_name
            FROM pragma_index_list(?2, ?1) AS il
            JOIN pragma_index_info(il.name, ?1) AS ii
            WHERE il."unique" = 1 AND il.origin != 'pk' AND ii.name IS NOT NULL
            "#;

        /// Foreign keys of every table in the schema. A NULL `to` column
        /// references the target's primary key, resolved by key position.
        pub const LIST_RELATIONSHIPS: &str = r#"
            SELECT
                m.name AS source_table,
                fk.id AS fk_id,
                fk."from" AS source_column,
                fk."table" AS target_table,
                COALESCE(
                    fk."to",
                    (SELECT ti.name
                     FROM pragma_table_info(fk."table", m.schema) AS ti
                     WHERE ti.pk = fk.seq + 1)
                ) AS target_column
            FROM pragma_table_list AS m
            JOIN pragma_foreign_key_list(m.name, m.schema) AS fk
            WHERE m.schema = ?1
              AND m.type = 'table'
              AND m.name NOT LIKE 'sqlite\_%' ESCAPE '\'
              AND (?2 IS NULL OR m.name = ?2)
            ORDER BY m.name, fk.id, fk.seq
            "#;
    }
}

// =============================================================================
// PostgreSQL Implementation
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::postgres::PgConnection;
    use sqlx::Row;

    pub async fn list_tables(
        conn: &mut PgConnection,
        schema: &str,
        include_views: bool,
    ) -> DbResult<Vec<String>> {
        let rows = sqlx::query(queries::postgres::LIST_TABLES)
            .bind(schema)
            .bind(include_views)
            .fetch_all(&mut *conn)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name").map_err(DbError::from))
            .collect()
    }

    pub async fn describe_table(
        conn: &mut PgConnection,
        schema: &str,
        table: &str,
    ) -> DbResult<TableDescriptor> {
        let rows = sqlx::query(queries::postgres::DESCRIBE_COLUMNS)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

        if rows.is_empty() {
            // A table can exist with zero columns
            let found: bool = sqlx::query_scalar(queries::postgres::TABLE_EXISTS)
                .bind(schema)
                .bind(table)
                .fetch_one(&mut *conn)
                .await?;
            if !found {
                return Err(table_not_found(schema, table));
            }
        }

        let mut descriptor = TableDescriptor::new(schema, table);
        for row in &rows {
            let key_role: Option<String> = row.try_get("key_role")?;
            descriptor = descriptor.with_column(
                ColumnDescriptor::new(
                    row.try_get::<String, _>("column_name")?,
                    row.try_get::<String, _>("data_type")?,
                    row.try_get::<bool, _>("is_nullable")?,
                )
                .with_default(row.try_get("column_default")?)
                .with_key_role(key_role.as_deref().and_then(KeyRole::parse)),
            );
        }
        Ok(descriptor)
    }

    pub async fn list_relationships(
        conn: &mut PgConnection,
        schema: &str,
        table: Option<&str>,
    ) -> DbResult<Vec<RelationshipDescriptor>> {
        let rows = sqlx::query(queries::postgres::LIST_RELATIONSHIPS)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

        rows.iter()
            .map(|row| -> DbResult<RelationshipDescriptor> {
                Ok(RelationshipDescriptor {
                    constraint_name: row.try_get("constraint_name")?,
                    source_table: row.try_get("source_table")?,
                    source_column: row.try_get("source_column")?,
                    target_table: row.try_get("target_table")?,
                    target_column: row.try_get("target_column")?,
                })
            })
            .collect()
    }
}

// =============================================================================
// SQLite Implementation
// =============================================================================

mod sqlite {
    use super::*;
    use sqlx::Row;
    use sqlx::sqlite::SqliteConnection;
    use std::collections::HashSet;

    pub async fn list_tables(
        conn: &mut SqliteConnection,
        schema: &str,
        include_views: bool,
    ) -> DbResult<Vec<String>> {
        let rows = sqlx::query(queries::sqlite::LIST_TABLES)
            .bind(schema)
            .bind(include_views)
            .fetch_all(&mut *conn)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(DbError::from))
            .collect()
    }

    async fn column_set(
        conn: &mut SqliteConnection,
        sql: &str,
        schema: &str,
        table: &str,
    ) -> DbResult<HashSet<String>> {
        let names: Vec<String> = sqlx::query_scalar(sql)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;
        Ok(names.into_iter().collect())
    }

    pub async fn describe_table(
        conn: &mut SqliteConnection,
        schema: &str,
        table: &str,
    ) -> DbResult<TableDescriptor> {
        let found: i64 = sqlx::query_scalar(queries::sqlite::TABLE_EXISTS)
            .bind(schema)
            .bind(table)
            .fetch_one(&mut *conn)
            .await?;
        if found == 0 {
            return Err(table_not_found(schema, table));
        }

        let foreign = column_set(conn, queries::sqlite::FOREIGN_KEY_COLUMNS, schema, table).await?;
        let unique = column_set(conn, queries::sqlite::UNIQUE_COLUMNS, schema, table).await?;

        let rows = sqlx::query(queries::sqlite::DESCRIBE_COLUMNS)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

        let mut descriptor = TableDescriptor::new(schema, table);
        for row in &rows {
            let name: String = row.try_get("name")?;
            let not_null: i64 = row.try_get("not_null")?;
            let pk: i64 = row.try_get("pk")?;

            let role = KeyRole::strongest(
                (pk > 0).then_some(KeyRole::Primary),
                KeyRole::strongest(
                    foreign.contains(&name).then_some(KeyRole::Foreign),
                    unique.contains(&name).then_some(KeyRole::Unique),
                ),
            );
            descriptor = descriptor.with_column(
                // SQLite lets a primary key column hold NULL unless declared NOT NULL;
                // report the declaration as-is.
                ColumnDescriptor::new(name, row.try_get::<String, _>("type")?, not_null == 0)
                    .with_default(row.try_get("dflt_value")?)
                    .with_key_role(role),
            );
        }
        Ok(descriptor)
    }

    pub async fn list_relationships(
        conn: &mut SqliteConnection,
        schema: &str,
        table: Option<&str>,
    ) -> DbResult<Vec<RelationshipDescriptor>> {
        let rows = sqlx::query(queries::sqlite::LIST_RELATIONSHIPS)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

        let mut relationships = rows
            .iter()
            .map(|row| -> DbResult<RelationshipDescriptor> {
                let source_table: String = row.try_get("source_table")?;
                let fk_id: i64 = row.try_get("fk_id")?;
                let target_column: Option<String> = row.try_get("target_column")?;
                Ok(RelationshipDescriptor {
                    constraint_name: format!("fk_{}_{}", source_table, fk_id),
                    source_column: row.try_get("source_column")?,
                    target_table: row.try_get("target_table")?,
                    target_column: target_column.unwrap_or_default(),
                    source_table,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        // Stable sort keeps key position order within a constraint
        relationships.sort_by(|a, b| {
            (&a.source_table, &a.constraint_name).cmp(&(&b.source_table, &b.constraint_name))
        });
        Ok(relationships)
    }
}

//! Parameter binding utilities for database queries.
//!
//! Binds `QueryParam` values positionally to backend-specific query objects.
//! Values are always sent as bound arguments, never spliced into the SQL.

use crate::models::QueryParam;
use sqlx::postgres::PgTypeInfo;
use sqlx::query::Query;
use sqlx::{Database, Postgres, Sqlite, Type};

/// Declared PostgreSQL types for the bound values, in parameter order.
///
/// Must agree with [`bind_postgres_param`]: the statement is prepared with
/// these types and the values are then encoded in binary as those types.
pub(crate) fn postgres_param_types(params: &[QueryParam]) -> Vec<PgTypeInfo> {
    params
        .iter()
        .map(|param| match param {
            QueryParam::Null | QueryParam::String(_) => <String as Type<Postgres>>::type_info(),
            QueryParam::Bool(_) => <bool as Type<Postgres>>::type_info(),
            QueryParam::Int(_) => <i64 as Type<Postgres>>::type_info(),
            QueryParam::Float(_) => <f64 as Type<Postgres>>::type_info(),
        })
        .collect()
}

/// Bind a parameter to a PostgreSQL query (`$1`, `$2`, ...).
///
/// Strings are sent as `text` and NULL as a `text` NULL, so comparing them
/// with columns of other types needs an explicit cast in the SQL (`$1::date`).
pub(crate) fn bind_postgres_param<'q>(
    query: Query<'q, Postgres, <Postgres as Database>::Arguments<'q>>,
    param: &QueryParam,
) -> Query<'q, Postgres, <Postgres as Database>::Arguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.clone()),
    }
}

/// Bind a parameter to a SQLite query (`?`, `?1`, ...).
pub(crate) fn bind_sqlite_param<'q>(
    query: Query<'q, Sqlite, <Sqlite as Database>::Arguments<'q>>,
    param: &QueryParam,
) -> Query<'q, Sqlite, <Sqlite as Database>::Arguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.clone()),
    }
}

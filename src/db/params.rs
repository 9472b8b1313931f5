//! Statement building for the sqlx adapter.
//!
//! `QueryParam` values are bound positionally, so the same builder serves every
//! backend as long as the backend can encode each parameter kind.

use crate::models::QueryParam;
use sqlx::query::Query;
use sqlx::{Database, Encode, Type};

/// Build a query over `sql` with `params` bound in order.
///
/// Nulls are bound as a nullable text value, which every backend accepts in any
/// column position.
pub(crate) fn bound_query<'q, DB>(
    sql: &'q str,
    params: &'q [QueryParam],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    Option<String>: Encode<'q, DB> + Type<DB>,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    &'q str: Encode<'q, DB> + Type<DB>,
    &'q [u8]: Encode<'q, DB> + Type<DB>,
{
    params
        .iter()
        .fold(sqlx::query::<DB>(sql), |query, param| match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
        })
}

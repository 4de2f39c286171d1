use std::error::Error;
use std::str::FromStr;

use bytes::BytesMut;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::types::RowValues;

/// Borrow each value as a driver parameter, in placeholder order.
#[must_use]
pub fn param_refs(params: &[RowValues]) -> Vec<&(dyn ToSql + Sync)> {
    let mut references = Vec::with_capacity(params.len());
    for p in params {
        references.push(p as &(dyn ToSql + Sync));
    }
    references
}

impl ToSql for RowValues {
    /// Encodes to the type the server asked for: `Int` narrows to `int2`/`int4` (failing
    /// on overflow) and `Float` to `float4`; numbers and text convert to `numeric`, text
    /// parses into `uuid`. Any other mismatched variant is a `WrongType` error.
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql_checked(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql_checked(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql_checked(ty, out),
                _ => i.to_sql_checked(ty, out),
            },
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) if *ty == Type::FLOAT4 => (*f as f32).to_sql_checked(ty, out),
            RowValues::Float(f) if *ty == Type::NUMERIC => {
                Decimal::try_from(*f)?.to_sql_checked(ty, out)
            }
            RowValues::Float(f) => f.to_sql_checked(ty, out),
            RowValues::Text(s) => match *ty {
                Type::UUID => Uuid::parse_str(s)?.to_sql_checked(ty, out),
                Type::NUMERIC => Decimal::from_str(s)?.to_sql_checked(ty, out),
                _ => s.to_sql_checked(ty, out),
            },
            RowValues::Bool(b) => b.to_sql_checked(ty, out),
            RowValues::Timestamp(dt) => match *ty {
                Type::TIMESTAMPTZ => Utc.from_utc_datetime(dt).to_sql_checked(ty, out),
                Type::DATE => dt.date().to_sql_checked(ty, out),
                _ => dt.to_sql_checked(ty, out),
            },
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::JSON(jsval) => jsval.to_sql_checked(ty, out),
            RowValues::Blob(bytes) => bytes.to_sql_checked(ty, out),
            RowValues::Uuid(id) => id.to_sql_checked(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
                | Type::UUID
                | Type::NUMERIC
        )
    }

    to_sql_checked!();
}

//! Diesel mappings for enums stored in TEXT columns.
//!
//! Each enum is written as its upper-case wire name and parsed back on read,
//! so the database holds the same strings the API exposes.

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use std::io::Write;

use crate::{Priority, Recurrence};

macro_rules! text_enum {
    ($ty:ident, $label:literal) => {
        impl FromSql<Text, Pg> for $ty {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
                $ty::from_str(&s).ok_or_else(|| format!("unknown {}: {}", $label, s).into())
            }
        }

        impl ToSql<Text, Pg> for $ty {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }
    };
}

text_enum!(Recurrence, "recurrence");
text_enum!(Priority, "priority");

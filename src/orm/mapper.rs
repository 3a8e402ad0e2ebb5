//! Row to entity mapping.

use crate::db::DbRow;
use crate::error::DbResult;
use crate::models::Entity;

pub struct ResultMapper;

impl ResultMapper {
    /// Build an entity from one row.
    ///
    /// Starts from `E::default()` and assigns every field from the column with
    /// exactly the same name. A missing column or an incompatible value is a
    /// mapping error.
    pub fn map_row<E: Entity>(row: &DbRow) -> DbResult<E> {
        let meta = E::meta()?;
        let mut entity = E::default();
        for (index, field) in meta.descriptor().fields.iter().enumerate() {
            let value = row.get(&field.name)?;
            meta.assign(&mut entity, index, value)?;
        }
        Ok(entity)
    }

    /// Map rows in order.
    pub fn map_rows<E: Entity>(rows: &[DbRow]) -> DbResult<Vec<E>> {
        rows.iter().map(Self::map_row::<E>).collect()
    }
}

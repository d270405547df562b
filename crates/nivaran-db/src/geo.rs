use anyhow::Result;
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;

use nivaran_types::models::GeoPoint;

/// Registers `haversine_km(lat1, lng1, lat2, lng2)` so the nearby procedures
/// can filter and sort inside SQL.
pub fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "haversine_km",
        4,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a = GeoPoint::new(ctx.get::<f64>(0)?, ctx.get::<f64>(1)?);
            let b = GeoPoint::new(ctx.get::<f64>(2)?, ctx.get::<f64>(3)?);
            Ok(a.distance_km(&b))
        },
    )?;
    Ok(())
}

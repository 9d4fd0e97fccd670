use async_trait::async_trait;
use common::{AssignmentId, BookingId, DriverId, RouteId, VehicleId};
use domain::{
    Assignment, AssignmentStatus, Booking, BookingStatus, Itinerary, Passenger, RoutePoolEntry,
    RouteStatus,
};
use sqlx::types::Json;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{AssignmentStore, BookingStore, RoutePool},
};

/// PostgreSQL SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed implementation of all three record stores.
///
/// Each store maps to one table; batch writes are single statements and
/// therefore atomic within the table.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_booking(row: PgRow) -> Result<Booking> {
        let status: String = row.try_get("status")?;
        Ok(Booking {
            id: BookingId::new(row.try_get::<String, _>("id")?),
            route_id: RouteId::new(row.try_get::<String, _>("route_id")?),
            user_id: row.try_get::<String, _>("user_id")?.into(),
            user_name: row.try_get("user_name")?,
            user_email: row.try_get("user_email")?,
            origin: row.try_get("origin")?,
            destination: row.try_get("destination")?,
            pickup_time: row.try_get("pickup_time")?,
            dropoff_time: row.try_get("dropoff_time")?,
            booked_at: row.try_get("booked_at")?,
            status: status.parse::<BookingStatus>()?,
            assigned_driver_id: row
                .try_get::<Option<String>, _>("assigned_driver_id")?
                .map(DriverId::new),
            assigned_vehicle_id: row
                .try_get::<Option<String>, _>("assigned_vehicle_id")?
                .map(VehicleId::new),
        })
    }

    fn row_to_itinerary(row: &PgRow) -> Result<Itinerary> {
        let waypoints: Json<Vec<String>> = row.try_get("waypoints")?;
        Ok(Itinerary {
            name: row.try_get("name")?,
            origin: row.try_get("origin")?,
            destination: row.try_get("destination")?,
            waypoints: waypoints.0,
        })
    }

    fn row_to_entry(row: PgRow) -> Result<RoutePoolEntry> {
        Ok(RoutePoolEntry {
            id: RouteId::new(row.try_get::<String, _>("id")?),
            itinerary: Self::row_to_itinerary(&row)?,
            status: RouteStatus::Pending,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_assignment(row: PgRow) -> Result<Assignment> {
        let passengers: Json<Vec<Passenger>> = row.try_get("passengers")?;
        Ok(Assignment {
            id: AssignmentId::new(row.try_get::<String, _>("id")?),
            route_id: RouteId::new(row.try_get::<String, _>("route_id")?),
            itinerary: Self::row_to_itinerary(&row)?,
            assigned_driver_id: DriverId::new(row.try_get::<String, _>("assigned_driver_id")?),
            assigned_driver_name: row.try_get("assigned_driver_name")?,
            assigned_vehicle_id: VehicleId::new(row.try_get::<String, _>("assigned_vehicle_id")?),
            assigned_vehicle_info: row.try_get("assigned_vehicle_info")?,
            passengers: passengers.0,
            assigned_at: row.try_get("assigned_at")?,
            status: AssignmentStatus::Assigned,
        })
    }

    fn map_insert_error(e: sqlx::Error, kind: &'static str, id: &str) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
        {
            let reason = match db_err.constraint() {
                Some("unique_assignment_route") => "route already assigned".to_string(),
                Some(constraint) => format!("violates {constraint}"),
                None => "already exists".to_string(),
            };
            return StoreError::conflict(kind, id, reason);
        }
        StoreError::Database(e)
    }
}

const BOOKING_COLUMNS: &str = "id, route_id, user_id, user_name, user_email, origin, destination, \
     pickup_time, dropoff_time, booked_at, status, assigned_driver_id, assigned_vehicle_id";

const ASSIGNMENT_COLUMNS: &str = "id, route_id, name, origin, destination, waypoints, \
     assigned_driver_id, assigned_driver_name, assigned_vehicle_id, assigned_vehicle_info, \
     passengers, assigned_at, status";

#[async_trait]
impl BookingStore for PostgresStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, route_id, user_id, user_name, user_email, origin, destination,
                                  pickup_time, dropoff_time, booked_at, status,
                                  assigned_driver_id, assigned_vehicle_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(booking.id.as_str())
        .bind(booking.route_id.as_str())
        .bind(booking.user_id.as_str())
        .bind(&booking.user_name)
        .bind(&booking.user_email)
        .bind(&booking.origin)
        .bind(&booking.destination)
        .bind(booking.pickup_time)
        .bind(booking.dropoff_time)
        .bind(booking.booked_at)
        .bind(booking.status.as_str())
        .bind(booking.assigned_driver_id.as_ref().map(|d| d.as_str()))
        .bind(booking.assigned_vehicle_id.as_ref().map(|v| v.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, "Booking", booking.id.as_str()))?;
        Ok(())
    }

    async fn get(&self, id: &BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_booking).transpose()
    }

    async fn list_by_route(&self, route_id: &RouteId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE route_id = $1 ORDER BY pickup_time, id"
        ))
        .bind(route_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = $1 \
             ORDER BY route_id, pickup_time, id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn confirm_pending(&self, route_id: &RouteId) -> Result<usize> {
        let result = sqlx::query(
            "UPDATE bookings SET status = 'confirmed' WHERE route_id = $1 AND status = 'pending'",
        )
        .bind(route_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn confirm_for_assignment(
        &self,
        ids: &[BookingId],
        driver_id: &DriverId,
        vehicle_id: &VehicleId,
    ) -> Result<usize> {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'confirmed', assigned_driver_id = $2, assigned_vehicle_id = $3
            WHERE id = ANY($1)
              AND assigned_driver_id IS NULL
              AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(ids)
        .bind(driver_id.as_str())
        .bind(vehicle_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn reset_confirmed(&self, route_id: &RouteId) -> Result<usize> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'pending', assigned_driver_id = NULL, assigned_vehicle_id = NULL
            WHERE route_id = $1 AND status = 'confirmed'
            "#,
        )
        .bind(route_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl RoutePool for PostgresStore {
    async fn insert(&self, entry: RoutePoolEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO route_pool (id, name, origin, destination, waypoints, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.as_str())
        .bind(&entry.itinerary.name)
        .bind(&entry.itinerary.origin)
        .bind(&entry.itinerary.destination)
        .bind(Json(&entry.itinerary.waypoints))
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, "Route", entry.id.as_str()))?;
        Ok(())
    }

    async fn get(&self, id: &RouteId) -> Result<Option<RoutePoolEntry>> {
        let row = sqlx::query(
            "SELECT id, name, origin, destination, waypoints, created_at, updated_at \
             FROM route_pool WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_entry).transpose()
    }

    async fn list(&self) -> Result<Vec<RoutePoolEntry>> {
        let rows = sqlx::query(
            "SELECT id, name, origin, destination, waypoints, created_at, updated_at \
             FROM route_pool ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn restore(&self, entry: RoutePoolEntry) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO route_pool (id, name, origin, destination, waypoints, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(entry.id.as_str())
        .bind(&entry.itinerary.name)
        .bind(&entry.itinerary.origin)
        .bind(&entry.itinerary.destination)
        .bind(Json(&entry.itinerary.waypoints))
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, id: &RouteId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM route_pool WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl AssignmentStore for PostgresStore {
    async fn create(&self, assignment: Assignment) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO assignments ({ASSIGNMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(assignment.id.as_str())
        .bind(assignment.route_id.as_str())
        .bind(&assignment.itinerary.name)
        .bind(&assignment.itinerary.origin)
        .bind(&assignment.itinerary.destination)
        .bind(Json(&assignment.itinerary.waypoints))
        .bind(assignment.assigned_driver_id.as_str())
        .bind(&assignment.assigned_driver_name)
        .bind(assignment.assigned_vehicle_id.as_str())
        .bind(&assignment.assigned_vehicle_info)
        .bind(Json(&assignment.passengers))
        .bind(assignment.assigned_at)
        .bind(assignment.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, "Assignment", assignment.id.as_str()))?;
        Ok(())
    }

    async fn get(&self, id: &AssignmentId) -> Result<Option<Assignment>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_assignment).transpose()
    }

    async fn find_by_route(&self, route_id: &RouteId) -> Result<Option<Assignment>> {
        let row = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE route_id = $1"
        ))
        .bind(route_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_assignment).transpose()
    }

    async fn list(&self) -> Result<Vec<Assignment>> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments ORDER BY route_id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_assignment).collect()
    }

    async fn remove(&self, id: &AssignmentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

//! Customer queries with visibility scoping.
//!
//! List queries filter with an array-overlap predicate against the
//! `visible_to` column; single fetches load the row and re-apply the scope
//! predicate afterwards.

use auth_core::VisibilityScope;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Customer;

pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub visible_to: Vec<Uuid>,
    pub created_by_tenant: Uuid,
}

pub async fn insert(pool: &PgPool, new: NewCustomer) -> Result<Customer> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        INSERT INTO customers (
            name, email, phone,
            address_line1, address_line2, city, state, postal_code, country,
            visible_to, created_by_tenant
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.phone)
    .bind(&new.address_line1)
    .bind(&new.address_line2)
    .bind(&new.city)
    .bind(&new.state)
    .bind(&new.postal_code)
    .bind(&new.country)
    .bind(&new.visible_to)
    .bind(new.created_by_tenant)
    .fetch_one(pool)
    .await?;

    Ok(customer)
}

/// Customers the scope may observe, newest first.
pub async fn list_visible(pool: &PgPool, scope: &VisibilityScope) -> Result<Vec<Customer>> {
    let customers = match scope.as_filter() {
        None => {
            sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY created_at DESC")
                .fetch_all(pool)
                .await?
        }
        Some(ids) if ids.is_empty() => Vec::new(),
        Some(ids) => {
            sqlx::query_as::<_, Customer>(
                r#"
                SELECT * FROM customers
                WHERE visible_to && $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(ids)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(customers)
}

/// Fetch one customer, applying the scope predicate after retrieval.
pub async fn fetch_visible(
    pool: &PgPool,
    id: Uuid,
    scope: &VisibilityScope,
) -> Result<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(customer.filter(|c| scope.permits(&c.visible_to)))
}

pub struct CustomerUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Update the basic contact fields, returning the fresh row; `None` when the
/// customer does not exist.
pub async fn update(pool: &PgPool, id: Uuid, update: CustomerUpdate) -> Result<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(
        r#"
        UPDATE customers
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            phone = COALESCE($4, phone),
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(update.name)
    .bind(update.email)
    .bind(update.phone)
    .fetch_optional(pool)
    .await?;

    Ok(customer)
}

/// Last-writer-wins coordinate write from the geocode worker. Returns false
/// when the customer does not exist.
pub async fn update_coordinates(
    pool: &PgPool,
    id: Uuid,
    latitude: f64,
    longitude: f64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE customers
        SET latitude = $2, longitude = $3, geocoded_at = now(), updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(latitude)
    .bind(longitude)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

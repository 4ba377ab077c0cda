//! Generic record repository.
//!
//! [`Repository`] is the five-operation CRUD contract, parameterized by the
//! record type. [`SqliteRepository`] implements it for any [`Record`] by
//! building SQL from the record's table and column description. Every
//! mutating call runs as its own statement and commits immediately.

use async_trait::async_trait;
use sqlx::{
    FromRow, QueryBuilder, Sqlite, SqlitePool, query_builder::Separated, sqlite::SqliteRow,
};
use std::{marker::PhantomData, sync::Arc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// A table-backed entity keyed by a UUID `id` column.
pub trait Record: for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    /// Partial field changes accepted by [`Repository::update`].
    type Changes: Send + 'static;

    const TABLE: &'static str;

    /// Column order used for both `SELECT` and `INSERT`; must start with `id`.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Uuid;

    /// Bind one value per entry of [`Record::COLUMNS`], in order.
    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>);

    /// Push `column = ?` assignments for the fields present in `changes`;
    /// returns how many were pushed.
    fn bind_changes<'args>(
        changes: Self::Changes,
        set: &mut Separated<'_, 'args, Sqlite, &'static str>,
    ) -> usize;

    fn new_id() -> Uuid {
        Uuid::new_v4()
    }
}

#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn get_all(&self) -> RepositoryResult<Vec<T>>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<T>>;

    async fn create(&self, item: &T) -> RepositoryResult<()>;

    /// Apply `changes` to the record `id`. Returns false when no such record.
    async fn update(&self, id: Uuid, changes: T::Changes) -> RepositoryResult<bool>;

    /// Returns false when no such record.
    async fn delete(&self, id: Uuid) -> RepositoryResult<bool>;
}

/// [`Repository`] over a shared SQLite pool.
#[derive(Debug)]
pub struct SqliteRepository<T> {
    db: Arc<SqlitePool>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for SqliteRepository<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> SqliteRepository<T> {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self {
            db,
            _record: PhantomData,
        }
    }

    fn select_sql(suffix: &str) -> String {
        format!(
            "SELECT {} FROM {}{}",
            T::COLUMNS.join(", "),
            T::TABLE,
            suffix
        )
    }
}

#[async_trait]
impl<T: Record> Repository<T> for SqliteRepository<T> {
    async fn get_all(&self) -> RepositoryResult<Vec<T>> {
        let sql = Self::select_sql(" ORDER BY rowid ASC");
        let rows = sqlx::query_as::<_, T>(&sql).fetch_all(&*self.db).await?;
        Ok(rows)
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<T>> {
        let sql = Self::select_sql(" WHERE id = ?");
        let row = sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?;
        Ok(row)
    }

    async fn create(&self, item: &T) -> RepositoryResult<()> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "INSERT INTO {} ({}) ",
            T::TABLE,
            T::COLUMNS.join(", ")
        ));
        builder.push_values(std::iter::once(item), |mut row, item| {
            item.bind_columns(&mut row)
        });
        builder.build().execute(&*self.db).await?;
        tracing::debug!("inserted {} row {}", T::TABLE, item.id());
        Ok(())
    }

    async fn update(&self, id: Uuid, changes: T::Changes) -> RepositoryResult<bool> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", T::TABLE));
        let mut set = builder.separated(", ");
        if T::bind_changes(changes, &mut set) == 0 {
            return Ok(self.get_by_id(id).await?.is_some());
        }

        builder.push(" WHERE id = ").push_bind(id);
        let result = builder.build().execute(&*self.db).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&*self.db).await?;
        Ok(result.rows_affected() > 0)
    }
}
